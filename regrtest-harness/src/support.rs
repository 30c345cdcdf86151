//! Helpers for authors of in-process test units.

use std::fmt::Debug;

use crate::unit::Signal;

/// Fails with `reason` unless `condition` holds.
pub fn verify(condition: bool, reason: &str) -> Result<(), Signal> {
    if condition {
        Ok(())
    } else {
        Err(Signal::Failure(reason.to_owned()))
    }
}

/// Fails unless the two values are equal.
pub fn vereq<A, B>(a: A, b: B) -> Result<(), Signal>
where
    A: Debug + PartialEq<B>,
    B: Debug,
{
    if a == b {
        Ok(())
    } else {
        Err(Signal::Failure(std::format!("{a:?} == {b:?}")))
    }
}

/// Declines to run the current unit.
pub fn skip<T>(reason: impl Into<String>) -> Result<T, Signal> {
    Err(Signal::Skip(reason.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vereq_reports_both_values() {
        assert_eq!(vereq(1, 1), Ok(()));
        assert_eq!(vereq("a", "b"), Err(Signal::Failure("\"a\" == \"b\"".to_owned())));
    }

    #[test]
    fn verify_and_skip() {
        assert_eq!(verify(true, "unused"), Ok(()));
        assert_eq!(verify(false, "bad"), Err(Signal::Failure("bad".to_owned())));
        assert_eq!(skip::<()>("no curses"), Err(Signal::Skip("no curses".to_owned())));
    }
}
