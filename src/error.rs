//! Error types for sqlcell.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for sqlcell operations.
///
/// Every variant aborts only the invocation that raised it. The snippet
/// store and the connection registry are left as they were.
#[derive(Debug, Error)]
pub enum SqlCellError {
    /// A connection name or alias that the registry does not know.
    #[error("Unknown connection: '{0}'")]
    UnknownConnection(String),

    /// No target was given and no connection is current.
    #[error("No active connection. Pass a connection string or an alias")]
    NoActiveConnection,

    /// The `--file` argument could not be read.
    #[error("Could not read '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snippet was requested (directly or as a dependency) but never saved.
    #[error("Unknown snippet: '{name}' (requested by {})", requester_label(.requester))]
    UnknownSnippet {
        name: String,
        requester: Option<String>,
    },

    /// Snippet dependencies loop back on themselves.
    #[error("Cyclic dependency between snippets: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// An output path could not be written.
    #[error("Cannot write output to '{}': {source}", .path.display())]
    OutputPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid snippet name.
    #[error("Invalid snippet name: {0}")]
    InvalidSnippetName(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn requester_label(requester: &Option<String>) -> String {
    match requester {
        Some(name) => format!("snippet '{}'", name),
        None => "the query".to_string(),
    }
}

impl SqlCellError {
    /// Create an unknown snippet error.
    pub fn unknown_snippet(name: impl Into<String>, requester: Option<&str>) -> Self {
        Self::UnknownSnippet {
            name: name.into(),
            requester: requester.map(str::to_string),
        }
    }

    /// Create a file read error for the given path.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for sqlcell operations.
pub type SqlCellResult<T> = Result<T, SqlCellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqlCellError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic dependency between snippets: a -> b -> a"
        );
    }

    #[test]
    fn test_unknown_snippet_names_requester() {
        let err = SqlCellError::unknown_snippet("ghost", Some("b"));
        assert_eq!(
            err.to_string(),
            "Unknown snippet: 'ghost' (requested by snippet 'b')"
        );

        let err = SqlCellError::unknown_snippet("ghost", None);
        assert_eq!(
            err.to_string(),
            "Unknown snippet: 'ghost' (requested by the query)"
        );
    }

    #[test]
    fn test_file_read_keeps_reason() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = SqlCellError::file_read("query.sql", io);
        assert_eq!(err.to_string(), "Could not read 'query.sql': missing");
    }
}
