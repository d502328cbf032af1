//! Registry of reusable template fragments shared by every render.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::domain::errors::PreviewError;

/// Derive the fragment name for a file below `root`.
///
/// The name is the relative path with `/` separators and the final extension
/// removed, so `partials/header.hbs` becomes `partials/header`.
pub fn derive_fragment_name(path: &Path, root: &Path) -> Result<String, PreviewError> {
    let invalid = || PreviewError::InvalidFragmentPath {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };
    let relative = path.strip_prefix(root).map_err(|_| invalid())?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }

    let last = segments.pop().ok_or_else(invalid)?;
    let stem = match last.rfind('.') {
        Some(index) if index > 0 => &last[..index],
        _ => last.as_str(),
    };
    segments.push(stem.to_owned());
    Ok(segments.join("/"))
}

/// Global fragment namespace plus per-workspace bulk-load bookkeeping.
///
/// Names are not scoped by workspace: a fragment registered from one root is
/// visible to templates from every root, and the last registration wins.
/// Each entry remembers the root it came from so a deletion under one root
/// cannot drop a fragment that another root now owns.
#[derive(Debug, Default)]
pub struct FragmentRegistry {
    fragments: BTreeMap<String, Fragment>,
    loaded_roots: HashSet<PathBuf>,
}

#[derive(Debug)]
struct Fragment {
    root: PathBuf,
    content: String,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bulk<I>(&mut self, root: &Path, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, content) in entries {
            self.register_one(root, name, content);
        }
    }

    /// Insert or overwrite a single fragment discovered under `root`.
    pub fn register_one(&mut self, root: &Path, name: impl Into<String>, content: impl Into<String>) {
        let fragment = Fragment {
            root: root.to_path_buf(),
            content: content.into(),
        };
        self.fragments.insert(name.into(), fragment);
    }

    /// Drop a fragment whose file under `root` was deleted. Entries owned by
    /// another root are kept. Returns whether anything was removed.
    pub fn unregister(&mut self, root: &Path, name: &str) -> bool {
        match self.fragments.get(name) {
            Some(fragment) if fragment.root == root => {
                self.fragments.remove(name);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fragments.get(name).map(|fragment| fragment.content.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fragments
            .iter()
            .map(|(name, fragment)| (name.as_str(), fragment.content.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn has_loaded_workspace(&self, root: &Path) -> bool {
        self.loaded_roots.contains(root)
    }

    pub fn mark_workspace_loaded(&mut self, root: impl Into<PathBuf>) {
        self.loaded_roots.insert(root.into());
    }
}
