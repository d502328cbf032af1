//! Handlebars rendering with resource path rewriting for the preview sandbox.

use std::ops::Range;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, anyhow};
use handlebars::{Handlebars, Template};
use minijinja::{Environment, context};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::app::fragments::FragmentRegistry;
use crate::domain::errors::RenderError;

const PREVIEW_TEMPLATE: &str = "preview";
const ERROR_PAGE: &str = "error.html";

const RESOURCE_TAGS: &[&str] = &["img", "source", "video", "audio", "track", "embed", "input"];
const RESOURCE_ATTRS: &[&str] = &["src", "poster"];

static REMOTE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:data:|http)").expect("remote reference pattern is valid")
});

/// Engine switches read from the `[render]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Treat references to missing values as render errors.
    pub strict: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// A template that parsed successfully and can be rendered repeatedly.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    template: Template,
}

/// Compiles and renders preview templates against a context and the shared
/// fragment registry.
pub struct RenderEngine {
    options: RenderOptions,
    pages: Environment<'static>,
}

impl RenderEngine {
    pub fn new(options: RenderOptions) -> Result<Self> {
        let mut pages = Environment::new();
        pages
            .add_template(ERROR_PAGE, ERROR_PAGE_TEMPLATE)
            .map_err(|err| anyhow!("failed to register error page template: {err}"))?;
        Ok(Self { options, pages })
    }

    pub fn compile(&self, text: &str) -> Result<CompiledTemplate, RenderError> {
        Template::compile(text)
            .map(|template| CompiledTemplate { template })
            .map_err(|err| RenderError::Compile(err.to_string()))
    }

    /// Render a compiled template. Fragments that fail to parse are skipped,
    /// so only templates that actually use them fail.
    pub fn render(
        &self,
        compiled: &CompiledTemplate,
        context: &Value,
        fragments: &FragmentRegistry,
    ) -> Result<String, RenderError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(self.options.strict);
        for (name, content) in fragments.iter() {
            if let Err(err) = registry.register_partial(name, content) {
                tracing::warn!(fragment = name, error = %err, "skipping fragment that does not compile");
            }
        }
        registry.register_template(PREVIEW_TEMPLATE, compiled.template.clone());
        registry
            .render(PREVIEW_TEMPLATE, context)
            .map_err(|err| RenderError::Render(err.to_string()))
    }

    /// Compile, render, then rewrite resource references, stopping at the
    /// first failure.
    pub fn compiled_html<F>(
        &self,
        text: &str,
        context: &Value,
        template_dir: &Path,
        fragments: &FragmentRegistry,
        rewrite: F,
    ) -> Result<String, RenderError>
    where
        F: Fn(&Path) -> String,
    {
        let compiled = self.compile(text)?;
        let html = self.render(&compiled, context, fragments)?;
        Ok(rewrite_resource_paths(&html, template_dir, rewrite))
    }

    /// Minimal page showing `message` centered, HTML-escaped.
    pub fn error_page(&self, message: &str) -> String {
        self.pages
            .get_template(ERROR_PAGE)
            .and_then(|template| template.render(context! { message => message }))
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "failed to render error page");
                format!("<p>{}</p>", handlebars::html_escape(message))
            })
    }
}

/// Point local `src`/`poster` references of media elements at the preview
/// surface. Data URIs and `http*` references are kept as they are.
///
/// Elements and attributes come from a real HTML parse, and only the value
/// bytes of matching attributes are replaced, so the rest of the markup is
/// returned untouched.
pub fn rewrite_resource_paths<F>(html: &str, template_dir: &Path, rewrite: F) -> String
where
    F: Fn(&Path) -> String,
{
    let dom = match tl::parse(html, tl::ParserOptions::default()) {
        Ok(dom) => dom,
        Err(err) => {
            tracing::warn!(error = ?err, "skipping resource rewrite of unparsable html");
            return html.to_owned();
        }
    };

    let mut edits = Vec::new();
    for tag in dom.nodes().iter().filter_map(tl::Node::as_tag) {
        let name = tag.name().as_utf8_str();
        if !RESOURCE_TAGS.iter().any(|t| name.eq_ignore_ascii_case(t)) {
            continue;
        }
        for (key, value) in tag.attributes().iter() {
            if !RESOURCE_ATTRS.iter().any(|a| key.eq_ignore_ascii_case(a)) {
                continue;
            }
            let Some(value) = value else { continue };
            if !is_local_reference(&value) {
                continue;
            }
            let Some(span) = value_span(html, &value) else {
                continue;
            };
            let target = rewrite(&join_relative(template_dir, &value));
            edits.push(quoted_edit(html, span, &target));
        }
    }

    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        if span.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Byte range of an attribute value borrowed from `html`.
fn value_span(html: &str, value: &str) -> Option<Range<usize>> {
    let base = html.as_ptr() as usize;
    let start = (value.as_ptr() as usize).checked_sub(base)?;
    let end = start + value.len();
    (end <= html.len() && html.is_char_boundary(start) && html.is_char_boundary(end))
        .then_some(start..end)
}

/// Replacement for the value at `span`, keeping its quoting. Unquoted values
/// come back double-quoted.
fn quoted_edit(html: &str, span: Range<usize>, target: &str) -> (Range<usize>, String) {
    let before = html[..span.start].chars().next_back();
    let after = html[span.end..].chars().next();
    match (before, after) {
        (Some('\''), Some('\'')) => (span, target.replace('\'', "&#39;")),
        (Some('"'), Some('"')) => (span, target.replace('"', "&quot;")),
        _ => (span, format!("\"{}\"", target.replace('"', "&quot;"))),
    }
}

fn is_local_reference(reference: &str) -> bool {
    !reference.trim().is_empty() && !REMOTE_REFERENCE.is_match(reference)
}

/// Join with path-join semantics: a leading separator does not escape
/// `dir`, and `.`/`..` are resolved lexically.
fn join_relative(dir: &Path, reference: &str) -> PathBuf {
    let relative = reference.trim().trim_start_matches(['/', '\\']);
    let mut joined = dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => joined.push(segment),
            Component::ParentDir => {
                joined.pop();
            }
            _ => {}
        }
    }
    joined
}

const ERROR_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
  html, body { height: 100%; margin: 0; }
  body { display: flex; align-items: center; justify-content: center; font-family: sans-serif; }
  .message { max-width: 80%; text-align: center; white-space: pre-wrap; }
</style>
</head>
<body><div class="message">{{ message }}</div></body>
</html>
"#;
