//! Interfaces the preview engine consumes from its host editor.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::model::{SessionId, WatchOwner, WatchTarget};

/// A sandboxed area showing one preview.
pub trait PreviewSurface {
    /// Replace the whole surface content.
    fn set_content(&mut self, html: &str);

    /// Convert a filesystem path into a reference the surface can load.
    fn resource_uri(&self, path: &Path) -> String;

    fn dispose(&mut self);
}

/// Live subscription created by [`Host::watch`].
pub trait WatchHandle {
    /// Stop delivering events. Calling it twice is harmless.
    fn dispose(&mut self);
}

/// Everything the engine needs from the editor hosting it.
///
/// Surface closure and watch notifications flow back as
/// [`PreviewEvent`](crate::domain::model::PreviewEvent)s carrying the id or
/// owner passed in here.
pub trait Host {
    /// Current text of the document, including unsaved edits.
    fn document_text(&self, path: &Path) -> Result<String>;

    /// Root of the workspace containing `path`, if any.
    fn workspace_root(&self, path: &Path) -> Option<PathBuf>;

    fn create_surface(
        &mut self,
        id: SessionId,
        title: &str,
        resource_roots: &[PathBuf],
    ) -> Result<Box<dyn PreviewSurface>>;

    fn watch(&mut self, owner: WatchOwner, target: WatchTarget) -> Result<Box<dyn WatchHandle>>;

    /// Files under `root` matching any of `globs`.
    fn find_files(&self, root: &Path, globs: &[String]) -> Result<Vec<PathBuf>>;

    /// Advisory message for the author. Must not block.
    fn show_info(&mut self, message: &str);
}
