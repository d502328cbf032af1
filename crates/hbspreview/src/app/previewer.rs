//! Top-level preview state and host event dispatch.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::app::context::resolve_context_path;
use crate::app::fragments::{FragmentRegistry, derive_fragment_name};
use crate::app::registry::SessionRegistry;
use crate::app::render::RenderEngine;
use crate::app::session::RenderScope;
use crate::domain::errors::PreviewError;
use crate::domain::host::{Host, WatchHandle};
use crate::domain::model::{FileChange, PreviewEvent, SessionId, WatchOwner, WatchTarget};
use crate::infra::config::Config;

/// Owns every piece of mutable preview state and the host it talks to.
///
/// Events are handled one at a time and each handler runs to completion, so
/// renders of one session never interleave.
pub struct Previewer<H: Host> {
    host: H,
    config: Config,
    engine: RenderEngine,
    fragments: FragmentRegistry,
    sessions: SessionRegistry,
    fragment_watchers: Vec<Box<dyn WatchHandle>>,
    hinted: HashSet<PathBuf>,
}

impl<H: Host> Previewer<H> {
    pub fn new(host: H, config: Config) -> Result<Self> {
        let engine = RenderEngine::new(config.render.options())?;
        Ok(Self {
            host,
            config,
            engine,
            fragments: FragmentRegistry::new(),
            sessions: SessionRegistry::new(),
            fragment_watchers: Vec::new(),
            hinted: HashSet::new(),
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn fragments(&self) -> &FragmentRegistry {
        &self.fragments
    }

    pub fn handle(&mut self, event: PreviewEvent) {
        tracing::trace!(?event, "preview event");
        match event {
            PreviewEvent::Open { document } => {
                if let Err(err) = self.open(&document) {
                    let message = format!("{err:#}");
                    tracing::error!(document = %document.display(), error = %message, "failed to open preview");
                    self.host
                        .show_info(&format!("Unable to open preview: {message}"));
                }
            }
            PreviewEvent::DocumentChanged { path } => {
                let scope = RenderScope {
                    engine: &self.engine,
                    fragments: &self.fragments,
                };
                self.sessions
                    .broadcast_document_change(&path, &self.host, scope);
            }
            PreviewEvent::File {
                owner: WatchOwner::Session(id),
                ..
            } => {
                let scope = RenderScope {
                    engine: &self.engine,
                    fragments: &self.fragments,
                };
                self.sessions.context_changed(id, &self.host, scope);
            }
            PreviewEvent::File {
                owner: WatchOwner::Fragments { root },
                change,
                path,
            } => self.fragment_changed(&root, change, &path),
            PreviewEvent::SurfaceClosed(id) => {
                self.sessions.close(id);
            }
        }
    }

    /// Open or replace the preview of `document`.
    ///
    /// The first preview in a workspace bulk-loads its fragments and starts
    /// watching them. Any failure leaves no session behind.
    pub fn open(&mut self, document: &Path) -> Result<SessionId> {
        let root = self
            .host
            .workspace_root(document)
            .ok_or_else(|| PreviewError::OutsideWorkspace(document.to_path_buf()))?;
        if !self.fragments.has_loaded_workspace(&root) {
            self.load_workspace_fragments(&root)?;
        }

        let context_path = resolve_context_path(document);
        if self.config.preview.context_hint()
            && !context_path.exists()
            && self.hinted.insert(context_path.clone())
        {
            self.host.show_info(&format!(
                "No sample data found. Create {} to supply context for this template, \
                 or run with --lenient (HBSPREVIEW_STRICT=0) to render missing values as empty.",
                context_path.display()
            ));
        }

        let file_name = document
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.display().to_string());
        let title = format!("{} {}", self.config.preview.title_prefix(), file_name);

        let mut resource_roots = Vec::with_capacity(2);
        if let Some(dir) = document.parent() {
            resource_roots.push(dir.to_path_buf());
        }
        if !resource_roots.contains(&root) {
            resource_roots.push(root);
        }

        let scope = RenderScope {
            engine: &self.engine,
            fragments: &self.fragments,
        };
        self.sessions
            .open(document, &title, &resource_roots, &mut self.host, scope)
    }

    /// Dispose every session and fragment watch.
    pub fn shutdown(&mut self) {
        self.sessions.dispose_all();
        for mut watcher in self.fragment_watchers.drain(..) {
            watcher.dispose();
        }
    }

    fn load_workspace_fragments(&mut self, root: &Path) -> Result<()> {
        let globs = self.config.fragments.globs();
        let files = self
            .host
            .find_files(root, &globs)
            .with_context(|| format!("failed to discover fragments under {}", root.display()))?;

        let mut entries = Vec::with_capacity(files.len());
        for path in &files {
            let name = derive_fragment_name(path, root)?;
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read fragment {}", path.display()))?;
            entries.push((name, content));
        }

        let watcher = self
            .host
            .watch(
                WatchOwner::Fragments {
                    root: root.to_path_buf(),
                },
                WatchTarget::Tree {
                    root: root.to_path_buf(),
                    globs,
                },
            )
            .with_context(|| format!("failed to watch fragments under {}", root.display()))?;

        let count = entries.len();
        self.fragments.register_bulk(root, entries);
        self.fragments.mark_workspace_loaded(root);
        self.fragment_watchers.push(watcher);
        tracing::info!(root = %root.display(), fragments = count, "loaded workspace fragments");
        Ok(())
    }

    fn fragment_changed(&mut self, root: &Path, change: FileChange, path: &Path) {
        let name = match derive_fragment_name(path, root) {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring fragment event");
                return;
            }
        };

        match change {
            FileChange::Created | FileChange::Changed => match fs::read_to_string(path) {
                Ok(content) => {
                    tracing::debug!(fragment = %name, "fragment updated");
                    self.fragments.register_one(root, name, content);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to read fragment");
                    return;
                }
            },
            FileChange::Removed => {
                if !self.fragments.unregister(root, &name) {
                    return;
                }
                tracing::debug!(fragment = %name, "fragment removed");
            }
        }

        let scope = RenderScope {
            engine: &self.engine,
            fragments: &self.fragments,
        };
        self.sessions.broadcast_update(&self.host, scope);
    }
}
