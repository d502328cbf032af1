//! Domain models for sessions, watches, and host events.

use std::fmt;
use std::path::PathBuf;

/// Identity of one preview session, stable for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Subscriber a file watch reports to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchOwner {
    /// The context-file watch owned by a single session.
    Session(SessionId),
    /// The fragment watch of one workspace root.
    Fragments { root: PathBuf },
}

/// What a watch observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// A single file, which may not exist yet.
    File(PathBuf),
    /// Every file under `root` whose relative path matches one of `globs`.
    Tree { root: PathBuf, globs: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Created,
    Changed,
    Removed,
}

/// Notification delivered by the host. Handled one at a time, to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    /// The user asked to open (or refresh) the preview of a document.
    Open { document: PathBuf },
    /// The text of an open document changed.
    DocumentChanged { path: PathBuf },
    /// A watched file was created, changed, or removed.
    File {
        owner: WatchOwner,
        change: FileChange,
        path: PathBuf,
    },
    /// A preview surface was closed by the user or the host.
    SurfaceClosed(SessionId),
}
