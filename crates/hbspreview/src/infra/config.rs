//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::render::RenderOptions;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".hbspreview/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub fragments: Fragments,
    #[serde(default)]
    pub preview: Preview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Render {
    #[serde(default)]
    strict: Option<bool>,
}

impl Render {
    fn default_strict() -> bool {
        true
    }

    pub fn strict(&self) -> bool {
        self.strict.unwrap_or_else(Self::default_strict)
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = Some(strict);
    }

    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            strict: self.strict(),
        }
    }
}

impl Default for Render {
    fn default() -> Self {
        Self {
            strict: Some(Self::default_strict()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragments {
    #[serde(default)]
    globs: Option<Vec<String>>,
    /// Directories and globs never scanned for fragments.
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Fragments {
    fn default_globs() -> Vec<String> {
        vec!["**/*.hbs".into()]
    }

    /// Globs, relative to the workspace root, selecting fragment files.
    pub fn globs(&self) -> Vec<String> {
        self.globs.clone().unwrap_or_else(Self::default_globs)
    }
}

impl Default for Fragments {
    fn default() -> Self {
        Self {
            globs: Some(Self::default_globs()),
            ignore: vec!["node_modules/".into(), "target/".into(), ".git/".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    #[serde(default)]
    title_prefix: Option<String>,
    #[serde(default)]
    context_hint: Option<bool>,
}

impl Preview {
    fn default_title_prefix() -> &'static str {
        "Preview"
    }

    pub fn title_prefix(&self) -> String {
        self.title_prefix
            .clone()
            .unwrap_or_else(|| Self::default_title_prefix().to_owned())
    }

    /// Whether to tell the author once about a missing context file.
    pub fn context_hint(&self) -> bool {
        self.context_hint.unwrap_or(true)
    }
}

impl Default for Preview {
    fn default() -> Self {
        Self {
            title_prefix: Some(Self::default_title_prefix().to_owned()),
            context_hint: Some(true),
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    strict: Option<String>,
    fragment_globs: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            strict: env::var("HBSPREVIEW_STRICT").ok(),
            fragment_globs: env::var("HBSPREVIEW_FRAGMENT_GLOBS").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(strict: &str, fragment_globs: &str) -> Self {
        Self {
            strict: Some(strict.to_owned()),
            fragment_globs: Some(fragment_globs.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, the config of the
    /// repository containing `workspace`, and env overrides.
    pub fn load(workspace: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = Some(workspace_config_path(workspace));
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        // Layers only set what they mention; defaults come from the first layer.
        let layer: Layer =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(layer.into_config())
    }

    fn merge(self, other: Self) -> Self {
        Self {
            render: merge_render(self.render, other.render),
            fragments: merge_fragments(self.fragments, other.fragments),
            preview: merge_preview(self.preview, other.preview),
        }
    }
}

/// On-disk shape of one layer, without serde defaults filling the gaps.
#[derive(Debug, Default, Deserialize)]
struct Layer {
    #[serde(default)]
    render: Option<Render>,
    #[serde(default)]
    fragments: Option<Fragments>,
    #[serde(default)]
    preview: Option<Preview>,
}

impl Layer {
    fn into_config(self) -> Config {
        Config {
            render: self.render.unwrap_or(Render { strict: None }),
            fragments: self.fragments.unwrap_or(Fragments {
                globs: None,
                ignore: Vec::new(),
            }),
            preview: self.preview.unwrap_or(Preview {
                title_prefix: None,
                context_hint: None,
            }),
        }
    }
}

fn merge_render(mut base: Render, overlay: Render) -> Render {
    if let Some(value) = overlay.strict {
        base.strict = Some(value);
    }
    base
}

fn merge_fragments(base: Fragments, overlay: Fragments) -> Fragments {
    let mut ignore: BTreeSet<String> = base.ignore.into_iter().collect();
    ignore.extend(overlay.ignore);

    Fragments {
        globs: overlay.globs.or(base.globs),
        ignore: ignore.into_iter().collect(),
    }
}

fn merge_preview(mut base: Preview, overlay: Preview) -> Preview {
    if let Some(value) = overlay.title_prefix {
        base.title_prefix = Some(value);
    }
    if let Some(value) = overlay.context_hint {
        base.context_hint = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("hbspreview/config.toml"))
}

fn workspace_config_path(start: &Path) -> PathBuf {
    let root = find_repo_root(start).unwrap_or_else(|| start.to_path_buf());
    root.join(DEFAULT_WORKSPACE_CONFIG_PATH)
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(raw) = env.strict {
        match parse_flag(&raw) {
            Some(strict) => config.render.strict = Some(strict),
            None => tracing::warn!(value = %raw, "ignoring invalid HBSPREVIEW_STRICT"),
        }
    }
    if let Some(raw) = env.fragment_globs {
        let globs: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|glob| !glob.is_empty())
            .map(str::to_owned)
            .collect();
        if !globs.is_empty() {
            config.fragments.globs = Some(globs);
        }
    }
    config
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert!(config.render.strict());
        assert_eq!(config.fragments.globs(), vec!["**/*.hbs".to_string()]);
        assert!(config.fragments.ignore.contains(&"node_modules/".into()));
        assert_eq!(config.preview.title_prefix(), "Preview");
        assert!(config.preview.context_hint());
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[render]
strict = false
[fragments]
ignore = ["vendor/"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".hbspreview"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".hbspreview/config.toml"),
            r#"
[fragments]
globs = ["partials/**/*.hbs"]
[preview]
title_prefix = "Live"
"#,
        )?;

        let workspace_path = Some(workspace_config_path(&workspace_dir.join("nested")));
        let config = Config::load_with_layers(Some(global), workspace_path, EnvOverrides::default())?;

        assert!(!config.render.strict());
        assert_eq!(config.fragments.globs(), vec!["partials/**/*.hbs".to_string()]);
        assert!(config.fragments.ignore.contains(&"vendor/".into()));
        assert!(config.fragments.ignore.contains(&"node_modules/".into()));
        assert_eq!(config.preview.title_prefix(), "Live");
        assert!(config.preview.context_hint());
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("off", "a/*.hbs, b/*.handlebars");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert!(!config.render.strict());
        assert_eq!(
            config.fragments.globs(),
            vec!["a/*.hbs".to_string(), "b/*.handlebars".to_string()]
        );
        Ok(())
    }

    #[test]
    fn invalid_env_flag_is_ignored() -> Result<()> {
        let config = Config::load_with_layers(None, None, EnvOverrides::for_tests("maybe", ""))?;
        assert!(config.render.strict());
        assert_eq!(config.fragments.globs(), vec!["**/*.hbs".to_string()]);
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
