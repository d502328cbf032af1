//! File watching on top of `notify`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobSet;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::domain::host::WatchHandle;
use crate::domain::model::{FileChange, WatchTarget};
use crate::infra::discovery::build_globset;

/// Keeps a `notify` watcher alive until disposed.
pub struct NotifyWatch {
    watcher: Option<RecommendedWatcher>,
}

impl NotifyWatch {
    /// Start watching `target`, calling `emit` from the watcher thread for
    /// every matching change.
    ///
    /// A single file is watched through its directory so it may be created
    /// after the watch starts.
    pub fn start<F>(target: &WatchTarget, mut emit: F) -> Result<Self>
    where
        F: FnMut(FileChange, PathBuf) + Send + 'static,
    {
        let (dir, mode, filter) = match target {
            WatchTarget::File(path) => {
                let name = path
                    .file_name()
                    .map(OsString::from)
                    .with_context(|| format!("cannot watch {}", path.display()))?;
                let dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf();
                (dir, RecursiveMode::NonRecursive, PathFilter::FileName(name))
            }
            WatchTarget::Tree { root, globs } => {
                let filter = PathFilter::Globs {
                    roots: vec![root.clone(), root.canonicalize().unwrap_or_else(|_| root.clone())],
                    set: build_globset(globs)?,
                };
                (root.clone(), RecursiveMode::Recursive, filter)
            }
        };

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for (change, path) in changes(event) {
                        if filter.matches(&path) {
                            emit(change, path);
                        }
                    }
                }
                Err(err) => tracing::warn!(error = %err, "file watch error"),
            }
        })
        .context("failed to create file watcher")?;

        watcher
            .watch(&dir, mode)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "watch started");

        Ok(Self {
            watcher: Some(watcher),
        })
    }
}

impl WatchHandle for NotifyWatch {
    fn dispose(&mut self) {
        self.watcher.take();
    }
}

enum PathFilter {
    FileName(OsString),
    Globs { roots: Vec<PathBuf>, set: GlobSet },
}

impl PathFilter {
    fn matches(&self, path: &Path) -> bool {
        match self {
            PathFilter::FileName(name) => path.file_name() == Some(name.as_os_str()),
            PathFilter::Globs { roots, set } => roots
                .iter()
                .find_map(|root| path.strip_prefix(root).ok())
                .is_some_and(|rel| set.is_match(rel)),
        }
    }
}

/// Split an event into per-path changes. A rename reported with both paths
/// removes the old path and creates the new one.
fn changes(event: Event) -> Vec<(FileChange, PathBuf)> {
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind
        && let [from, to] = event.paths.as_slice()
    {
        return vec![
            (FileChange::Removed, from.clone()),
            (FileChange::Created, to.clone()),
        ];
    }
    match classify(&event.kind) {
        Some(change) => event.paths.into_iter().map(|path| (change, path)).collect(),
        None => Vec::new(),
    }
}

fn classify(kind: &EventKind) -> Option<FileChange> {
    match kind {
        EventKind::Create(_) => Some(FileChange::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(FileChange::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(FileChange::Created),
        EventKind::Modify(_) => Some(FileChange::Changed),
        EventKind::Remove(_) => Some(FileChange::Removed),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    #[test]
    fn classifies_event_kinds() {
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), Some(FileChange::Created));
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(FileChange::Changed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(FileChange::Created)
        );
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), Some(FileChange::Removed));
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn rename_with_both_paths_removes_old_and_creates_new() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/proj/partials/old.hbs"))
            .add_path(PathBuf::from("/proj/partials/new.hbs"));

        assert_eq!(
            changes(event),
            vec![
                (FileChange::Removed, PathBuf::from("/proj/partials/old.hbs")),
                (FileChange::Created, PathBuf::from("/proj/partials/new.hbs")),
            ]
        );
    }

    #[test]
    fn other_events_apply_to_every_path() {
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/proj/a.hbs"))
            .add_path(PathBuf::from("/proj/b.hbs"));
        assert_eq!(
            changes(event),
            vec![
                (FileChange::Removed, PathBuf::from("/proj/a.hbs")),
                (FileChange::Removed, PathBuf::from("/proj/b.hbs")),
            ]
        );

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(PathBuf::from("/proj/a.hbs"));
        assert!(changes(access).is_empty());
    }

    #[test]
    fn filters_by_file_name_or_glob() -> Result<()> {
        let single = PathFilter::FileName(OsString::from("page.hbs.json"));
        assert!(single.matches(Path::new("/proj/tpl/page.hbs.json")));
        assert!(!single.matches(Path::new("/proj/tpl/page.hbs")));

        let tree = PathFilter::Globs {
            roots: vec![PathBuf::from("/proj")],
            set: build_globset(&["**/*.hbs".to_string()])?,
        };
        assert!(tree.matches(Path::new("/proj/partials/header.hbs")));
        assert!(!tree.matches(Path::new("/proj/partials/header.txt")));
        assert!(!tree.matches(Path::new("/elsewhere/header.hbs")));
        Ok(())
    }
}
