//! Process-wide set of live preview sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::app::session::{PreviewSession, RenderScope};
use crate::domain::host::Host;
use crate::domain::model::SessionId;

/// Active sessions keyed by identity, at most one per document path.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, PreviewSession>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: SessionId) -> Option<&PreviewSession> {
        self.sessions.get(&id)
    }

    pub fn find_by_document(&self, path: &Path) -> Option<&PreviewSession> {
        self.sessions.values().find(|session| session.document() == path)
    }

    /// Open a session for `document`, disposing any session already bound to
    /// the same path first.
    pub fn open(
        &mut self,
        document: &Path,
        title: &str,
        resource_roots: &[PathBuf],
        host: &mut dyn Host,
        scope: RenderScope<'_>,
    ) -> Result<SessionId> {
        if let Some(existing) = self.find_by_document(document).map(PreviewSession::id)
            && let Some(mut previous) = self.sessions.remove(&existing)
        {
            tracing::debug!(session = %existing, "replacing existing preview");
            previous.dispose();
        }

        self.next_id += 1;
        let id = SessionId(self.next_id);
        let session = PreviewSession::open(id, document, title, resource_roots, host, scope)?;
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Forward a document edit to every session. Returns how many re-rendered.
    pub fn broadcast_document_change(
        &mut self,
        path: &Path,
        host: &dyn Host,
        scope: RenderScope<'_>,
    ) -> usize {
        self.sessions
            .values_mut()
            .map(|session| session.on_document_changed(path, host, scope))
            .filter(|rendered| *rendered)
            .count()
    }

    pub fn broadcast_update(&mut self, host: &dyn Host, scope: RenderScope<'_>) {
        for session in self.sessions.values_mut() {
            session.update(host, scope);
        }
    }

    /// Route a context-file event to the session owning the watch.
    pub fn context_changed(
        &mut self,
        id: SessionId,
        host: &dyn Host,
        scope: RenderScope<'_>,
    ) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.on_context_changed(host, scope);
                true
            }
            None => {
                tracing::debug!(session = %id, "context event for unknown session");
                false
            }
        }
    }

    /// Remove a session whose surface the host closed.
    pub fn close(&mut self, id: SessionId) -> Option<PreviewSession> {
        let mut session = self.sessions.remove(&id)?;
        session.on_surface_closed();
        Some(session)
    }

    pub fn dispose_all(&mut self) {
        for (_, mut session) in std::mem::take(&mut self.sessions) {
            session.dispose();
        }
    }
}
