//! Headless host: previews go to stdout, files are watched with notify.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use anyhow::{Context, Result};
use url::Url;

use crate::domain::host::{Host, PreviewSurface, WatchHandle};
use crate::domain::model::{PreviewEvent, SessionId, WatchOwner, WatchTarget};
use crate::infra::config::Config;
use crate::infra::discovery::FragmentDiscovery;
use crate::infra::watch::NotifyWatch;

/// Host for the command line. Without an event sender, watches are inert.
pub struct CliHost {
    workspace: PathBuf,
    discovery: FragmentDiscovery,
    events: Option<Sender<PreviewEvent>>,
}

impl CliHost {
    pub fn new(
        workspace: PathBuf,
        config: &Config,
        events: Option<Sender<PreviewEvent>>,
    ) -> Result<Self> {
        Ok(Self {
            workspace,
            discovery: FragmentDiscovery::new(&config.fragments.ignore)?,
            events,
        })
    }
}

impl Host for CliHost {
    fn document_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }

    fn workspace_root(&self, path: &Path) -> Option<PathBuf> {
        path.starts_with(&self.workspace)
            .then(|| self.workspace.clone())
    }

    fn create_surface(
        &mut self,
        id: SessionId,
        title: &str,
        resource_roots: &[PathBuf],
    ) -> Result<Box<dyn PreviewSurface>> {
        Ok(Box::new(StdoutSurface {
            id,
            title: title.to_owned(),
            resource_roots: resource_roots.to_vec(),
            renders: 0,
        }))
    }

    fn watch(&mut self, owner: WatchOwner, target: WatchTarget) -> Result<Box<dyn WatchHandle>> {
        let Some(events) = self.events.clone() else {
            return Ok(Box::new(InertWatch));
        };
        let watch = NotifyWatch::start(&target, move |change, path| {
            let event = PreviewEvent::File {
                owner: owner.clone(),
                change,
                path,
            };
            if events.send(event).is_err() {
                tracing::debug!("event loop gone, dropping file event");
            }
        })?;
        Ok(Box::new(watch))
    }

    fn find_files(&self, root: &Path, globs: &[String]) -> Result<Vec<PathBuf>> {
        self.discovery.find_files(root, globs)
    }

    fn show_info(&mut self, message: &str) {
        eprintln!("hbspreview: {message}");
    }
}

/// Writes every render to stdout, preceded by an HTML comment banner.
struct StdoutSurface {
    id: SessionId,
    title: String,
    resource_roots: Vec<PathBuf>,
    renders: u64,
}

impl PreviewSurface for StdoutSurface {
    fn set_content(&mut self, html: &str) {
        self.renders += 1;
        let mut stdout = std::io::stdout().lock();
        let written = writeln!(stdout, "<!-- {} (render {}) -->", self.title, self.renders)
            .and_then(|()| writeln!(stdout, "{html}"))
            .and_then(|()| stdout.flush());
        if let Err(err) = written {
            tracing::warn!(session = %self.id, error = %err, "failed to write preview");
        }
    }

    fn resource_uri(&self, path: &Path) -> String {
        if !self.resource_roots.iter().any(|root| path.starts_with(root)) {
            tracing::debug!(path = %path.display(), "resource outside preview roots");
        }
        Url::from_file_path(path)
            .map(String::from)
            .unwrap_or_else(|()| path.display().to_string())
    }

    fn dispose(&mut self) {
        tracing::debug!(session = %self.id, renders = self.renders, "surface disposed");
    }
}

struct InertWatch;

impl WatchHandle for InertWatch {
    fn dispose(&mut self) {}
}
