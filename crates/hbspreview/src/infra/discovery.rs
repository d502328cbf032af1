//! Workspace file discovery for fragment bulk loads.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

/// Walks a workspace respecting `.gitignore` and the configured ignore list.
#[derive(Debug, Clone)]
pub struct FragmentDiscovery {
    ignore: GlobSet,
}

impl FragmentDiscovery {
    pub fn new(ignore: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in ignore {
            for expanded in expand_dir_pattern(pattern) {
                builder.add(Glob::new(&expanded).context("invalid fragment ignore pattern")?);
            }
        }
        let ignore = builder.build().context("failed to build ignore matcher")?;
        Ok(Self { ignore })
    }

    /// Files under `root` whose root-relative path matches one of `globs`,
    /// sorted. Any walk error aborts the discovery.
    pub fn find_files(&self, root: &Path, globs: &[String]) -> Result<Vec<PathBuf>> {
        let matcher = build_globset(globs)?;

        let mut builder = WalkBuilder::new(root);
        builder.git_ignore(true).hidden(true);
        builder.filter_entry({
            let ignore = self.ignore.clone();
            let root = root.to_path_buf();
            move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                !ignore.is_match(rel)
            }
        });

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if matcher.is_match(rel) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        tracing::debug!(root = %root.display(), count = files.len(), "discovered fragment files");
        Ok(files)
    }
}

pub(crate) fn build_globset(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(Glob::new(glob).with_context(|| format!("invalid fragment glob '{glob}'"))?);
    }
    builder.build().context("failed to build fragment matcher")
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_matching_files_and_skips_ignored_dirs() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("partials/nav"))?;
        fs::create_dir_all(root.join("node_modules/pkg"))?;
        fs::write(root.join("page.hbs"), "{{> header}}")?;
        fs::write(root.join("partials/header.hbs"), "<h1>Hi</h1>")?;
        fs::write(root.join("partials/nav/menu.hbs"), "<nav/>")?;
        fs::write(root.join("partials/readme.md"), "docs")?;
        fs::write(root.join("node_modules/pkg/dep.hbs"), "ignored")?;

        let discovery = FragmentDiscovery::new(&["node_modules/".to_string()])?;
        let files = discovery.find_files(root, &["**/*.hbs".to_string()])?;
        let rel: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(rel, vec!["page.hbs", "partials/header.hbs", "partials/nav/menu.hbs"]);
        Ok(())
    }

    #[test]
    fn invalid_glob_is_an_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let discovery = FragmentDiscovery::new(&[])?;
        assert!(discovery.find_files(temp.path(), &["a[".to_string()]).is_err());
        Ok(())
    }
}
