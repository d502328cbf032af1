//! Domain-specific errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one render pipeline run, captured as data for the error page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("template unavailable: {0}")]
    Source(String),
    #[error("compile error: {0}")]
    Compile(String),
    #[error("render error: {0}")]
    Render(String),
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("{} is not inside an open workspace", .0.display())]
    OutsideWorkspace(PathBuf),
    #[error("fragment {} is not under workspace root {}", .path.display(), .root.display())]
    InvalidFragmentPath { path: PathBuf, root: PathBuf },
}
