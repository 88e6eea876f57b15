//! Wiki configuration module.
//!
//! Handles loading and validating `wiki.toml`. Every key is optional; stock
//! defaults fill whatever the file leaves out.
//!
//! ## Config File Location
//!
//! By default `wiki.toml` is looked up next to the chapter manifest:
//!
//! ```text
//! book/
//! ├── chapters.toml            # Ordered chapter manifest
//! ├── wiki.toml                # Wiki config (optional)
//! ├── prelude.md               # Prepended to every chapter (optional)
//! ├── intro.md
//! └── processes.md
//! ```
//!
//! Pass `--config <path>` to use a file elsewhere.
//!
//! ## Configuration Options
//!
//! ```toml
//! base_url = "/"             # Hosting base that relative image URLs are rewritten onto
//!
//! [site]
//! title = "Wiki"
//! intro = ""                 # Markdown shown above the chapter list on Home
//! # pdf_base_url = "https://example.org/pdf/"
//!
//! [headers]
//! title_level = 1            # Heading level that names the chapter
//! section_level = 2          # Heading level listed as a subsection
//! untitled = "[Untitled]"    # Title used when a chapter has no title heading
//!
//! [links]
//! freshness_days = 30        # How long a verified link stays trusted
//! timeout_secs = 10
//! retries = 2
//! backoff_ms = 500
//!
//! [assets]
//! require_local = true       # Relative images must exist under the source root
//!
//! [assets.extension_rewrites]
//! ".eps" = ".png"
//!
//! [sources]
//! suffix = ".md"
//! prelude = []
//!
//! [processing]
//! max_processes = 4          # Cap on transform workers (omit for cores - 1)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up next to the manifest.
pub const CONFIG_FILENAME: &str = "wiki.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Wiki configuration loaded from `wiki.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WikiConfig {
    /// Absolute hosting base that relative image URLs are rewritten onto.
    pub base_url: String,
    /// Home page and page chrome settings.
    pub site: SiteConfig,
    /// Which heading levels name chapters and subsections.
    pub headers: HeadersConfig,
    /// External link verification settings.
    pub links: LinksConfig,
    /// Image URL rewriting and existence checks.
    pub assets: AssetsConfig,
    /// Where chapter sources live and what gets prepended to them.
    pub sources: SourcesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: "/".to_string(),
            site: SiteConfig::default(),
            headers: HeadersConfig::default(),
            links: LinksConfig::default(),
            assets: AssetsConfig::default(),
            sources: SourcesConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl WikiConfig {
    /// Whether relative images end up as fully-qualified URLs. A
    /// root-relative `base_url` only works when the wiki is served from the
    /// same host as the images.
    pub fn hosts_absolute_urls(&self) -> bool {
        self.base_url.starts_with("http://") || self.base_url.starts_with("https://")
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://") || base.starts_with('/'))
        {
            return Err(ConfigError::Validation(
                "base_url must be an http(s) URL or start with '/'".into(),
            ));
        }
        let h = &self.headers;
        if h.title_level == 0 || h.section_level > 6 || h.title_level >= h.section_level {
            return Err(ConfigError::Validation(
                "headers: need 1 <= title_level < section_level <= 6".into(),
            ));
        }
        if self.links.freshness_days <= 0 {
            return Err(ConfigError::Validation(
                "links.freshness_days must be positive".into(),
            ));
        }
        if self.links.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "links.timeout_secs must be non-zero".into(),
            ));
        }
        if !self.sources.suffix.starts_with('.') || self.sources.suffix.len() < 2 {
            return Err(ConfigError::Validation(
                "sources.suffix must look like \".md\"".into(),
            ));
        }
        for (from, to) in &self.assets.extension_rewrites {
            if !from.starts_with('.') || !to.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "assets.extension_rewrites: {from:?} -> {to:?} must both start with '.'"
                )));
            }
        }
        Ok(())
    }
}

/// Home page and page chrome settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Wiki title, used as the Home page heading and in page titles.
    pub title: String,
    /// Markdown rendered above the chapter list on the Home page.
    pub intro: String,
    /// When set, every chapter on Home gets a link to `<pdf_base_url><id>.pdf`.
    pub pdf_base_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Wiki".to_string(),
            intro: String::new(),
            pdf_base_url: None,
        }
    }
}

/// Heading levels that carry chapter structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeadersConfig {
    pub title_level: u8,
    pub section_level: u8,
    /// Placeholder title for chapters without a title heading.
    pub untitled: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            title_level: 1,
            section_level: 2,
            untitled: "[Untitled]".to_string(),
        }
    }
}

/// External link verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinksConfig {
    /// Days a successful verification stays valid.
    pub freshness_days: i64,
    /// Per-request timeout. A timeout counts as a broken link.
    pub timeout_secs: u64,
    /// Extra attempts after a failed probe before the link is declared broken.
    pub retries: u32,
    /// Base delay between attempts, doubled after each failure.
    pub backoff_ms: u64,
    pub user_agent: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            freshness_days: 30,
            timeout_secs: 10,
            retries: 2,
            backoff_ms: 500,
            user_agent: concat!("chapterwiki/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Image URL rewriting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Extension replacements applied to relative image URLs (`.eps` → `.png`).
    pub extension_rewrites: BTreeMap<String, String>,
    /// Require relative images to exist under the source root.
    pub require_local: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            extension_rewrites: BTreeMap::from([(".eps".to_string(), ".png".to_string())]),
            require_local: true,
        }
    }
}

/// Chapter source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    /// Suffix appended to a manifest identifier to find its source file.
    pub suffix: String,
    /// Files (relative to the source root) prepended to every chapter.
    pub prelude: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            suffix: ".md".to_string(),
            prelude: Vec::new(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of transform workers.
    /// When absent, defaults to the number of CPU cores minus one.
    pub max_processes: Option<usize>,
}

/// Resolve the transform worker count from config.
///
/// - `None` → `cores - 1`, at least 1
/// - `Some(n)` → `min(n, cores - 1)`, at least 1
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let auto = cores.saturating_sub(1).max(1);
    config
        .max_processes
        .map(|n| n.min(auto))
        .unwrap_or(auto)
        .max(1)
}

/// Load config from a `wiki.toml` path.
///
/// A missing file yields the stock defaults. Unknown keys are rejected and
/// the result is validated.
pub fn load_config(path: &Path) -> Result<WikiConfig, ConfigError> {
    if !path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: WikiConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `wiki.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# chapterwiki configuration
# =========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Hosting base that relative image URLs are rewritten onto, e.g.
# "https://raw.githubusercontent.com/org/book/main/". Must be an http(s)
# URL or start with "/". The default "/" does NOT produce fully-qualified
# image URLs: images become root-relative paths and only resolve when the
# wiki is served from the same host. Builds log a warning in that case.
base_url = "/"

# ---------------------------------------------------------------------------
# Home page
# ---------------------------------------------------------------------------
[site]
title = "Wiki"
# Markdown shown above the chapter list.
intro = ""
# When set, each chapter on Home links to "<pdf_base_url><chapter>.pdf".
# pdf_base_url = "https://example.org/pdf/"

# ---------------------------------------------------------------------------
# Chapter structure
# ---------------------------------------------------------------------------
[headers]
# Heading level that names the chapter (first one wins; later ones are
# listed as subsections).
title_level = 1
# Heading level listed as a subsection on Home. Deeper headings are ignored.
section_level = 2
# Title used when a chapter has no title heading.
untitled = "[Untitled]"

# ---------------------------------------------------------------------------
# External link verification
# ---------------------------------------------------------------------------
[links]
# A verified link is trusted for this many days before it is checked again.
freshness_days = 30
# Per-request timeout; a timeout counts as a broken link.
timeout_secs = 10
# Extra attempts (with doubling backoff) before a link is declared broken.
retries = 2
backoff_ms = 500

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[assets]
# Relative images must exist under the source root.
require_local = true

[assets.extension_rewrites]
".eps" = ".png"

# ---------------------------------------------------------------------------
# Sources
# ---------------------------------------------------------------------------
[sources]
# Appended to each manifest entry to find the chapter file.
suffix = ".md"
# Files prepended to every chapter before conversion.
prelude = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel transform workers.
# Omit to auto-detect (= number of CPU cores minus one).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_header_levels() {
        let config = WikiConfig::default();
        assert_eq!(config.headers.title_level, 1);
        assert_eq!(config.headers.section_level, 2);
        assert_eq!(config.headers.untitled, "[Untitled]");
    }

    #[test]
    fn default_base_url_is_not_absolute() {
        let mut config = WikiConfig::default();
        assert!(!config.hosts_absolute_urls());
        config.base_url = "https://raw.example.org/book".into();
        assert!(config.hosts_absolute_urls());
    }

    #[test]
    fn stock_config_explains_root_relative_default() {
        assert!(stock_config_toml().contains("does NOT produce fully-qualified"));
    }

    #[test]
    fn default_config_rewrites_eps() {
        let config = WikiConfig::default();
        assert_eq!(
            config.assets.extension_rewrites.get(".eps").map(String::as_str),
            Some(".png")
        );
        assert!(config.assets.require_local);
    }

    #[test]
    fn default_link_settings() {
        let links = LinksConfig::default();
        assert_eq!(links.freshness_days, 30);
        assert_eq!(links.timeout_secs, 10);
        assert!(links.user_agent.starts_with("chapterwiki/"));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
base_url = "https://raw.example.org/book/"

[headers]
section_level = 3
"#;
        let config: WikiConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_url, "https://raw.example.org/book/");
        assert_eq!(config.headers.section_level, 3);
        // Defaults preserved
        assert_eq!(config.headers.title_level, 1);
        assert_eq!(config.links.freshness_days, 30);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.base_url, "/");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[site]
title = "Coursebook"

[sources]
prelude = ["prelude.md"]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.site.title, "Coursebook");
        assert_eq!(config.sources.prelude, vec!["prelude.md"]);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[headers]\ntitle_level = 2\nsection_level = 2\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<WikiConfig, _> = toml::from_str("[links]\nfreshnes_days = 3\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(WikiConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_relative_base_url() {
        let mut config = WikiConfig::default();
        config.base_url = "images/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_freshness() {
        let mut config = WikiConfig::default();
        config.links.freshness_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_suffix() {
        let mut config = WikiConfig::default();
        config.sources.suffix = "md".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_extension_rewrite() {
        let mut config = WikiConfig::default();
        config
            .assets
            .extension_rewrites
            .insert("eps".into(), ".png".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("extension_rewrites"));
    }

    // =========================================================================
    // Worker count tests
    // =========================================================================

    #[test]
    fn effective_workers_auto_leaves_one_core() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = effective_workers(&ProcessingConfig::default());
        assert_eq!(workers, cores.saturating_sub(1).max(1));
    }

    #[test]
    fn effective_workers_never_zero() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_workers(&config), 1);
    }

    #[test]
    fn effective_workers_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_workers(&config), 1);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: WikiConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = WikiConfig::default();
        assert_eq!(config.base_url, defaults.base_url);
        assert_eq!(config.headers.section_level, defaults.headers.section_level);
        assert_eq!(config.links.retries, defaults.links.retries);
        assert_eq!(
            config.assets.extension_rewrites,
            defaults.assets.extension_rewrites
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[site]",
            "[headers]",
            "[links]",
            "[assets]",
            "[sources]",
            "[processing]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }
}
