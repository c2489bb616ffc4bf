use std::fmt;
use std::io;
use std::path::Path;

use crate::error::{DictError, InvariantViolation};

/// Error reported by the command line tools: a one-line message for the
/// user plus the underlying cause.
#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Describe a failed file operation on a dictionary path and say what to try.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    use io::ErrorKind::*;
    let suggestion = match err.kind() {
        NotFound if path.extension().is_none() => {
            "Version 4 dictionaries are directories; check the path is correct."
        }
        NotFound => "Check that the dictionary exists and the path is correct.",
        PermissionDenied => "Dictionaries are rewritten in place; check write permissions.",
        UnexpectedEof => "The dictionary is truncated; rebuild it with makedict.",
        AlreadyExists => "Remove the existing output first.",
        WriteZero => "The disk may be full.",
        _ if err.raw_os_error() == Some(28) => "The disk may be full.",
        _ => "Check permissions and free space.",
    };
    format!("Error {operation} '{}': {err}. {suggestion}", path.display())
}

/// Wrap an I/O error for the CLI, keeping it as the source.
pub fn io_cli_error(operation: &str, path: &Path, err: io::Error) -> CliError {
    CliError {
        msg: format_io_error(operation, path, &err),
        source: Some(Box::new(err)),
    }
}

/// Same message as [`format_io_error`], for library code that returns
/// `io::Error`.
pub fn io_error(operation: &str, path: &Path, err: io::Error) -> io::Error {
    io::Error::new(err.kind(), format_io_error(operation, path, &err))
}

pub fn simple_cli_error(msg: &str) -> CliError {
    CliError {
        msg: msg.to_string(),
        source: None,
    }
}

/// Convert a dictionary error into a CLI error with a hint.
pub fn dict_cli_error(context: &str, err: DictError) -> CliError {
    CliError {
        msg: format!("{}: {}", context, cli_hint(&err)),
        source: Some(Box::new(err)),
    }
}

/// Return an actionable hint for a dictionary error variant.
pub fn cli_hint(err: &DictError) -> String {
    use DictError::*;
    match err {
        UnsupportedFormat(msg) => format!("{msg}. Rebuild the dictionary with version 2, 3 or 4."),
        Malformed(msg) => format!("{msg}. The file is truncated or corrupt; rebuild it from source."),
        InvalidInput(msg) => format!("{msg}. Check the word list."),
        Invariant(InvariantViolation::UnplacedBigramTarget(word)) => {
            format!("bigram target \"{word}\" is not a word. Add it to the word list.")
        }
        Invariant(e) => format!("{e}. This is a bug."),
        Io(io) => format!("{io}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_name_the_remedy() {
        let hint = cli_hint(&DictError::Invariant(InvariantViolation::TooManyPasses(25)));
        assert!(hint.ends_with("This is a bug."));
        let hint = cli_hint(&DictError::Malformed("cut short".into()));
        assert!(hint.starts_with("cut short."));
    }

    #[test]
    fn io_messages_carry_path_and_suggestion() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let msg = format_io_error("reading", Path::new("main.dict"), &err);
        assert!(msg.contains("'main.dict'"));
        assert!(msg.ends_with("path is correct."));
        let cli = io_cli_error("reading", Path::new("main.dict"), err);
        assert!(std::error::Error::source(&cli).is_some());
    }
}
