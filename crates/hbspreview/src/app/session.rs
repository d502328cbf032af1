//! A live preview bound to one template document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::app::context::{load_context, resolve_context_path};
use crate::app::fragments::FragmentRegistry;
use crate::app::render::RenderEngine;
use crate::domain::errors::RenderError;
use crate::domain::host::{Host, PreviewSurface, WatchHandle};
use crate::domain::model::{SessionId, WatchOwner, WatchTarget};

/// Shared, read-only inputs of every render.
#[derive(Clone, Copy)]
pub struct RenderScope<'a> {
    pub engine: &'a RenderEngine,
    pub fragments: &'a FragmentRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Disposed,
}

/// Binding between one template document and one preview surface.
///
/// A session re-renders on every trigger while `Active`. Render failures are
/// shown as an error page and never leave the `Active` state.
pub struct PreviewSession {
    id: SessionId,
    document: PathBuf,
    context_path: PathBuf,
    surface: Box<dyn PreviewSurface>,
    watcher: Box<dyn WatchHandle>,
    state: SessionState,
}

impl PreviewSession {
    /// Create the surface and the context-file watch, then render once.
    ///
    /// On failure nothing created here is left alive.
    pub fn open(
        id: SessionId,
        document: &Path,
        title: &str,
        resource_roots: &[PathBuf],
        host: &mut dyn Host,
        scope: RenderScope<'_>,
    ) -> Result<Self> {
        let context_path = resolve_context_path(document);
        let mut surface = host
            .create_surface(id, title, resource_roots)
            .with_context(|| format!("failed to create preview surface for {}", document.display()))?;

        let watcher = match host.watch(
            WatchOwner::Session(id),
            WatchTarget::File(context_path.clone()),
        ) {
            Ok(watcher) => watcher,
            Err(err) => {
                surface.dispose();
                return Err(err.context(format!("failed to watch {}", context_path.display())));
            }
        };

        let mut session = Self {
            id,
            document: document.to_path_buf(),
            context_path,
            surface,
            watcher,
            state: SessionState::Active,
        };
        tracing::info!(session = %id, document = %document.display(), "preview opened");
        session.refresh(host, scope);
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn context_path(&self) -> &Path {
        &self.context_path
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Whether an edit to `path` affects this preview: the template itself or
    /// its context file edited inside the editor.
    pub fn is_relevant(&self, path: &Path) -> bool {
        path == self.document || path == self.context_path
    }

    /// Re-render if `path` is relevant. Returns whether a render ran.
    pub fn on_document_changed(
        &mut self,
        path: &Path,
        host: &dyn Host,
        scope: RenderScope<'_>,
    ) -> bool {
        if !self.is_active() || !self.is_relevant(path) {
            return false;
        }
        self.refresh(host, scope);
        true
    }

    pub fn on_context_changed(&mut self, host: &dyn Host, scope: RenderScope<'_>) {
        tracing::debug!(session = %self.id, path = %self.context_path.display(), "context file changed");
        self.refresh(host, scope);
    }

    /// Re-render after something not watched per session changed, such as
    /// the fragment registry.
    pub fn update(&mut self, host: &dyn Host, scope: RenderScope<'_>) {
        self.refresh(host, scope);
    }

    /// Explicit teardown: releases the watch and disposes the surface.
    pub fn dispose(&mut self) {
        if !self.is_active() {
            return;
        }
        self.watcher.dispose();
        self.surface.dispose();
        self.state = SessionState::Disposed;
        tracing::info!(session = %self.id, "preview disposed");
    }

    /// The host already closed the surface; only the watch is left to release.
    pub fn on_surface_closed(&mut self) {
        if !self.is_active() {
            return;
        }
        self.watcher.dispose();
        self.state = SessionState::Disposed;
        tracing::info!(session = %self.id, "preview closed");
    }

    fn refresh(&mut self, host: &dyn Host, scope: RenderScope<'_>) {
        if !self.is_active() {
            return;
        }
        let html = match self.render(host, scope) {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "preview render failed");
                scope.engine.error_page(&err.to_string())
            }
        };
        self.surface.set_content(&html);
    }

    fn render(&self, host: &dyn Host, scope: RenderScope<'_>) -> Result<String, RenderError> {
        let text = host
            .document_text(&self.document)
            .map_err(|err| RenderError::Source(format!("{err:#}")))?;
        let context = load_context(&self.context_path);
        let template_dir = self.document.parent().unwrap_or_else(|| Path::new(""));
        tracing::debug!(session = %self.id, "rendering preview");

        scope.engine.compiled_html(
            &text,
            &context,
            template_dir,
            scope.fragments,
            |path| self.surface.resource_uri(path),
        )
    }
}
