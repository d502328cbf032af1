//! Resolution and loading of a template's sidecar JSON context.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// `<template>.json`, next to the template.
pub fn resolve_context_path(template: &Path) -> PathBuf {
    let mut path = OsString::from(template.as_os_str());
    path.push(".json");
    PathBuf::from(path)
}

/// Read and parse the context file, falling back to `{}` on any failure.
pub fn load_context(path: &Path) -> Value {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no context file");
            return empty_context();
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read context file");
            return empty_context();
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "invalid context JSON");
            empty_context()
        }
    }
}

fn empty_context() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn context_path_appends_json() {
        assert_eq!(
            resolve_context_path(Path::new("/proj/tpl/page.hbs")),
            PathBuf::from("/proj/tpl/page.hbs.json")
        );
    }

    #[test]
    fn loads_valid_context() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.hbs.json");
        fs::write(&path, r#"{"name":"World","items":[1,2]}"#)?;

        assert_eq!(load_context(&path), json!({"name": "World", "items": [1, 2]}));
        Ok(())
    }

    #[test]
    fn malformed_or_missing_context_is_empty_object() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let inputs = ["", "   \n", "{\"name\": \"Wor", "name = World", "{} trailing"];
        for (index, contents) in inputs.iter().enumerate() {
            let path = dir.path().join(format!("bad{index}.json"));
            fs::write(&path, contents)?;
            assert_eq!(load_context(&path), json!({}), "input {contents:?}");
        }

        assert_eq!(load_context(&dir.path().join("missing.json")), json!({}));
        assert_eq!(load_context(dir.path()), json!({}));
        Ok(())
    }
}
