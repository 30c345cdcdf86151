//! Expansion of `@file` indirect arguments.
//!
//! An argument of the form `@path` is replaced by the arguments parsed from the
//! file at `path`. Each line is split independently: tokens are separated by
//! whitespace, and a token opened with `"` runs to the next unescaped `"`, with
//! `\"` and `\\` standing for a literal quote and backslash.

use std::path::Path;

use crate::error::ConfigurationError;
use crate::filesystem::Filesystem;

/// Prefix marking an argument as a reference to an argument file.
pub const INDIRECT_ARG_PREFIX: char = '@';

#[derive(Clone, Copy, PartialEq, Eq)]
enum LexState {
    Space,
    Unquoted,
    Quoted,
}

/// Splits the text of an argument file into arguments.
///
/// `origin` is only used to describe the location of a parse error.
pub fn parse_argument_text(text: &str, origin: &Path) -> Result<Vec<String>, ConfigurationError> {
    let mut args = vec![];

    for (line_index, line) in text.lines().enumerate() {
        let mut state = LexState::Space;
        let mut current = String::new();
        let mut chars = line.chars();

        while let Some(c) = chars.next() {
            match state {
                LexState::Space => {
                    if c == '"' {
                        state = LexState::Quoted;
                    } else if !c.is_whitespace() {
                        current.push(c);
                        state = LexState::Unquoted;
                    }
                }
                LexState::Unquoted => {
                    if c.is_whitespace() {
                        args.push(std::mem::take(&mut current));
                        state = LexState::Space;
                    } else if c == '"' {
                        args.push(std::mem::take(&mut current));
                        state = LexState::Quoted;
                    } else {
                        current.push(c);
                    }
                }
                LexState::Quoted => match c {
                    '"' => {
                        args.push(std::mem::take(&mut current));
                        state = LexState::Space;
                    }
                    '\\' => match chars.next() {
                        Some(escaped @ ('"' | '\\')) => current.push(escaped),
                        Some(other) => {
                            current.push('\\');
                            current.push(other);
                        }
                        None => current.push('\\'),
                    },
                    _ => current.push(c),
                },
            }
        }

        match state {
            LexState::Quoted => {
                return Err(ConfigurationError::UnterminatedQuote {
                    path: origin.to_path_buf(),
                    line: line_index + 1,
                });
            }
            LexState::Unquoted => args.push(current),
            LexState::Space => (),
        }
    }

    Ok(args)
}

/// Replaces every `@path` argument with the contents of the named argument file.
///
/// Expansion is not recursive: arguments read from a file are taken literally.
pub fn expand_indirect_args<I, S>(
    args: I,
    fs: &dyn Filesystem,
) -> Result<Vec<String>, ConfigurationError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut expanded = vec![];

    for arg in args {
        let arg: String = arg.into();
        if let Some(file_name) = arg.strip_prefix(INDIRECT_ARG_PREFIX) {
            let path = Path::new(file_name);
            let bytes = fs.read_all(path).map_err(|source| {
                ConfigurationError::UnreadableArgumentFile {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

            let text = String::from_utf8_lossy(&bytes);
            let file_args = parse_argument_text(&text, path)?;

            tracing::debug!(
                target: crate::trace_categories::CONFIG,
                "expanded {} into {} argument(s)",
                path.display(),
                file_args.len()
            );

            expanded.extend(file_args);
        } else {
            expanded.push(arg);
        }
    }

    Ok(expanded)
}
