//! Error taxonomy shared by every stage of an archive run.
//!
//! Each variant maps to one failure class: configuration problems abort the run before
//! any network or file activity, the rest abort the processing of a single URL.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Missing or invalid environment values, or a target that is not a git repository.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No page identifier could be found in the given input.
    #[error("no Notion page id found in {input:?}")]
    InvalidIdentifier { input: String },

    /// A metadata or export request failed (transport, auth, not found, bad payload).
    #[error("{operation} failed for {target}: {message}")]
    RemoteAccess {
        operation: &'static str,
        target: String,
        message: String,
    },

    /// The export call completed but left no PDF behind.
    #[error("no PDF found after exporting {id} in {}", dir.display())]
    ExportNotFound { id: String, dir: PathBuf },

    /// A git command exited unsuccessfully or could not be launched.
    #[error("`{command}` failed ({status}): {stderr}")]
    VersionControl {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn remote(
        operation: &'static str,
        target: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        ArchiveError::RemoteAccess {
            operation,
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ArchiveError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
