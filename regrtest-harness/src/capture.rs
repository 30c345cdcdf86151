//! Scoped redirection of the process-wide output stream.

use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

use crate::error::CaptureError;

struct StreamState {
    base: Box<dyn Write>,
    capture: Option<Vec<u8>>,
}

/// The operator-visible output stream.
///
/// Clones share the same underlying state. While an [`OutputCapture`] is active,
/// everything written through any clone lands in the capture buffer instead of
/// the base writer.
#[derive(Clone)]
pub struct OutputStream {
    state: Rc<RefCell<StreamState>>,
}

impl OutputStream {
    /// Wraps the given writer.
    pub fn new(base: Box<dyn Write>) -> Self {
        Self {
            state: Rc::new(RefCell::new(StreamState {
                base,
                capture: None,
            })),
        }
    }

    /// Wraps the process's standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a stream backed by memory, returning the buffer it writes to.
    pub fn in_memory() -> (Self, MemoryOutput) {
        let buffer = MemoryOutput::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    /// Returns whether a capture is in progress.
    pub fn is_capturing(&self) -> bool {
        self.state.borrow().capture.is_some()
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("capturing", &self.is_capturing())
            .finish_non_exhaustive()
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        match state.capture.as_mut() {
            Some(captured) => {
                captured.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => state.base.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.capture.is_some() {
            Ok(())
        } else {
            state.base.flush()
        }
    }
}

/// Shared in-memory sink, mostly useful for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput(Rc<RefCell<Vec<u8>>>);

impl MemoryOutput {
    /// Returns everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).to_string()
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An active capture of an [`OutputStream`].
///
/// The original destination is restored when the capture is finished or
/// dropped, whichever comes first.
pub struct OutputCapture {
    stream: OutputStream,
}

impl OutputCapture {
    /// Starts capturing the given stream. Captures do not nest.
    pub fn begin(stream: &OutputStream) -> Result<Self, CaptureError> {
        {
            let mut state = stream.state.borrow_mut();
            if state.capture.is_some() {
                return Err(CaptureError::AlreadyActive);
            }

            // Anything already buffered belongs to the operator, not the test.
            state.base.flush().map_err(CaptureError::Flush)?;
            state.capture = Some(vec![]);
        }

        tracing::debug!(target: crate::trace_categories::CAPTURE, "capture started");

        Ok(Self {
            stream: stream.clone(),
        })
    }

    /// Stops capturing and returns everything written while active.
    pub fn finish(self) -> Vec<u8> {
        let captured = self.stream.state.borrow_mut().capture.take();
        captured.unwrap_or_default()
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        if self.stream.state.borrow_mut().capture.take().is_some() {
            tracing::debug!(target: crate::trace_categories::CAPTURE, "capture released");
        }
    }
}
