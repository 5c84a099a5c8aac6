//! Error types for the notice crate.

use std::path::PathBuf;

/// Errors that can occur while rendering notices.
#[derive(thiserror::Error, Debug)]
pub enum NoticeError {
    /// Template was not found.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Error occurred while rendering a template.
    #[error("template render error: {0}")]
    TemplateRenderError(String),

    /// Built-in template failed to compile.
    #[error("invalid built-in template {name}: {reason}")]
    InvalidBuiltinTemplate {
        /// Template name.
        name: String,
        /// Compiler message.
        reason: String,
    },

    /// Template directory does not exist or is not a directory.
    #[error("template directory not found: {0}")]
    TemplateDirectoryNotFound(PathBuf),

    /// Template directory listing failed.
    #[error("failed to list templates in {path}")]
    TemplateListError {
        /// Path to the template directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for notice operations.
pub type Result<T> = std::result::Result<T, NoticeError>;
