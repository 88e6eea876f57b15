//! Transform pass.
//!
//! A stateless [`NodeFilter`] applied while converting a chapter to HTML.
//! Each structural node is rewritten on its own:
//!
//! - **Images**: alt text is checked again (the pass may run on its own),
//!   then relative targets get the configured extension rewrites and are
//!   prefixed with the hosting `base_url`. Absolute and root-relative URLs
//!   are left alone.
//! - **Math**: simple script notation (`x_1`, `2^{10}`) becomes
//!   `<sub>`/`<sup>` markup; anything else is shown verbatim in a
//!   `math`-classed code element. Applying a rule to its own output returns
//!   that output unchanged.
//! - **Links**: canonicalized to `<a href="URL">TITLE</a>`; an empty title
//!   falls back to the URL. Link content that is more than text (an image,
//!   emphasis) is kept as rendered inside the canonical anchor.
//!
//! The transform pass never touches the link cache or the corpus metadata,
//! so chapters can be transformed in parallel.

use crate::config::WikiConfig;
use crate::converter::{NodeFilter, Replacement};
use crate::types::{StructuralEvent, Violation};
use crate::validate::require_alt_text;
use maud::html;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// Base character run followed by one or more `_x`, `^x`, `_{..}`, `^{..}`
/// script tokens, each optionally followed by more base characters.
static SIMPLE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(?:[_^](?:\{[A-Za-z0-9+\-]+\}|[A-Za-z0-9])[A-Za-z0-9]*)+$").unwrap()
});

static SCRIPT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([_^])(?:\{([A-Za-z0-9+\-]+)\}|([A-Za-z0-9]))").unwrap()
});

/// Output of [`SIMPLE_SCRIPT`] rewriting.
static EMITTED_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(?:<(?:sub|sup)>[A-Za-z0-9+\-]+</(?:sub|sup)>[A-Za-z0-9]*)+$")
        .unwrap()
});

const INLINE_MATH_OPEN: &str = r#"<code class="math">"#;
const DISPLAY_MATH_OPEN: &str = r#"<pre class="math"><code>"#;

/// Per-chapter rewrite filter.
#[derive(Debug, Clone)]
pub struct Transformer {
    document: String,
    base_url: String,
    extension_rewrites: BTreeMap<String, String>,
}

impl Transformer {
    pub fn new(document: &str, config: &WikiConfig) -> Self {
        Self {
            document: document.to_string(),
            base_url: config.base_url.clone(),
            extension_rewrites: config.assets.extension_rewrites.clone(),
        }
    }
}

impl NodeFilter for Transformer {
    fn rewrite(&self, event: &StructuralEvent) -> Result<Replacement, Violation> {
        match event {
            StructuralEvent::Image { url, description } => {
                require_alt_text(&self.document, url, description)?;
                let src = rewrite_image_url(url, &self.base_url, &self.extension_rewrites);
                let markup = html! { img src=(src) alt=(description.trim()); };
                Ok(Replacement::Html(markup.into_string()))
            }
            StructuralEvent::Math { text, display } => Ok(Replacement::Html(if *display {
                rewrite_display_math(text)
            } else {
                rewrite_math(text)
            })),
            StructuralEvent::Link { url, title } if title.trim().is_empty() => {
                Ok(Replacement::Html(canonical_link(url, title)))
            }
            StructuralEvent::Link { url, .. } => {
                let (open, close) = link_tags(url);
                Ok(Replacement::Wrap { open, close })
            }
            StructuralEvent::Header { .. } | StructuralEvent::Metadata { .. } => {
                Ok(Replacement::Keep)
            }
        }
    }
}

/// Whether `url` is a path relative to the chapter sources: no scheme, not
/// protocol-relative, not root-relative, not a fragment.
pub fn is_relative_url(url: &str) -> bool {
    if url.is_empty() || url.starts_with('/') || url.starts_with('#') {
        return false;
    }
    matches!(Url::parse(url), Err(url::ParseError::RelativeUrlWithoutBase))
}

/// Apply the first matching extension rewrite (case-insensitive) to the path
/// part of `url`, keeping any query or fragment.
pub fn rewrite_extension(url: &str, rewrites: &BTreeMap<String, String>) -> String {
    let split = url.find(['?', '#']).unwrap_or(url.len());
    let (path, rest) = url.split_at(split);
    for (from, to) in rewrites {
        let Some(cut) = path.len().checked_sub(from.len()) else {
            continue;
        };
        if path.is_char_boundary(cut) && path[cut..].eq_ignore_ascii_case(from) {
            return format!("{}{}{}", &path[..cut], to, rest);
        }
    }
    url.to_string()
}

/// Rewrite an image target for hosting under `base_url`.
///
/// - `img/a.eps` with base `https://h/x/` → `https://h/x/img/a.png`
/// - `./img/a.png` with base `/` → `/img/a.png`
/// - `https://cdn/a.png` → unchanged
pub fn rewrite_image_url(
    url: &str,
    base_url: &str,
    rewrites: &BTreeMap<String, String>,
) -> String {
    if !is_relative_url(url) {
        return url.to_string();
    }
    let rewritten = rewrite_extension(url, rewrites);
    let mut relative = rewritten.as_str();
    while let Some(rest) = relative.strip_prefix("./") {
        relative = rest;
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Render inline math.
///
/// `x_1` → `x<sub>1</sub>`, `2^{10}` → `2<sup>10</sup>`. Text already in
/// either output form is returned as is.
pub fn rewrite_math(text: &str) -> String {
    let trimmed = text.trim();
    if EMITTED_SCRIPT.is_match(trimmed) || is_wrapped(trimmed, INLINE_MATH_OPEN, "</code>") {
        return trimmed.to_string();
    }
    if SIMPLE_SCRIPT.is_match(trimmed) {
        return SCRIPT_TOKEN
            .replace_all(trimmed, |caps: &Captures| {
                let tag = if &caps[1] == "_" { "sub" } else { "sup" };
                let body = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
                format!("<{tag}>{body}</{tag}>")
            })
            .into_owned();
    }
    html! { code.math { (trimmed) } }.into_string()
}

/// Render display math verbatim in a preformatted block.
pub fn rewrite_display_math(text: &str) -> String {
    if is_wrapped(text.trim(), DISPLAY_MATH_OPEN, "</code></pre>") {
        return text.trim().to_string();
    }
    html! { pre.math { code { (text.trim()) } } }.into_string()
}

fn is_wrapped(text: &str, open: &str, close: &str) -> bool {
    text.starts_with(open) && text.ends_with(close)
}

/// `<a href="URL">TITLE</a>`, with the URL standing in for an empty title.
pub fn canonical_link(url: &str, title: &str) -> String {
    let title = title.trim();
    let text = if title.is_empty() { url } else { title };
    html! { a href=(url) { (text) } }.into_string()
}

/// Opening and closing tags of the canonical anchor for `url`.
pub fn link_tags(url: &str) -> (String, String) {
    let close = "</a>";
    let markup = html! { a href=(url) {} }.into_string();
    let open = markup.strip_suffix(close).unwrap_or(&markup).to_string();
    (open, close.to_string())
}
