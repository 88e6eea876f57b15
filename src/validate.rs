//! Validation pass.
//!
//! Walks one chapter's structural events in order, harvesting its
//! [`DocumentRecord`] and checking every embedded asset:
//!
//! | Event | Effect |
//! |-------|--------|
//! | `Header` at `title_level` | first one sets the title, later ones become subsections |
//! | `Header` at `section_level` | appended to subsections |
//! | other `Header` | ignored |
//! | `Image` | alt text required; relative targets must exist on disk |
//! | `Link` | `#fragment` skipped; otherwise must be absolute http(s) and resolve |
//! | `Math` | ignored |
//! | `Metadata` | non-empty bibliography recorded |
//!
//! The first violation aborts the document and no record is produced.
//!
//! Link verification consults the [`LinkCache`] first and only probes URLs
//! whose last verification is outside the freshness window. Successful
//! probes refresh the cache; failures never touch it.

use crate::cache::{LinkCache, LinkStats};
use crate::config::WikiConfig;
use crate::naming::AnchorSet;
use crate::probe::{LinkProbe, ProbeOutcome};
use crate::transform::{is_relative_url, rewrite_extension};
use crate::types::{DocumentRecord, StructuralEvent, Violation};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Settings the validation pass needs from config.
#[derive(Debug, Clone)]
pub struct ValidationSettings {
    pub title_level: u8,
    pub section_level: u8,
    pub untitled: String,
    pub extension_rewrites: BTreeMap<String, String>,
    /// When set, relative image targets must exist under `source_root`.
    pub require_local: bool,
    pub source_root: PathBuf,
}

impl ValidationSettings {
    pub fn from_config(config: &WikiConfig, source_root: &Path) -> Self {
        Self {
            title_level: config.headers.title_level,
            section_level: config.headers.section_level,
            untitled: config.headers.untitled.clone(),
            extension_rewrites: config.assets.extension_rewrites.clone(),
            require_local: config.assets.require_local,
            source_root: source_root.to_path_buf(),
        }
    }
}

/// Reject images whose alt text is missing or the generic word "image".
pub fn require_alt_text(document: &str, url: &str, description: &str) -> Result<(), Violation> {
    let description = description.trim();
    if description.is_empty() || description.eq_ignore_ascii_case("image") {
        return Err(Violation::Accessibility {
            document: document.to_string(),
            url: url.to_string(),
        });
    }
    Ok(())
}

/// Per-document validation state.
pub struct Validator<'s> {
    settings: &'s ValidationSettings,
    source_id: String,
    title: Option<String>,
    subsections: Vec<String>,
    subsection_anchors: Vec<String>,
    anchors: AnchorSet,
    bibliography_ref: Option<String>,
    links: LinkStats,
}

impl<'s> Validator<'s> {
    pub fn new(source_id: &str, settings: &'s ValidationSettings) -> Self {
        Self {
            settings,
            source_id: source_id.to_string(),
            title: None,
            subsections: Vec::new(),
            subsection_anchors: Vec::new(),
            anchors: AnchorSet::new(),
            bibliography_ref: None,
            links: LinkStats::default(),
        }
    }

    pub fn observe(
        &mut self,
        event: &StructuralEvent,
        cache: &mut LinkCache,
        probe: &dyn LinkProbe,
    ) -> Result<(), Violation> {
        match event {
            StructuralEvent::Header { level, text } => self.header(*level, text),
            StructuralEvent::Image { url, description } => {
                require_alt_text(&self.source_id, url, description)?;
                self.check_local_asset(url)
            }
            StructuralEvent::Link { url, .. } => self.check_link(url, cache, probe),
            StructuralEvent::Math { .. } => Ok(()),
            StructuralEvent::Metadata { bibliography } => {
                let bibliography = bibliography.trim();
                self.bibliography_ref = (!bibliography.is_empty()).then(|| bibliography.to_string());
                Ok(())
            }
        }
    }

    /// Finalize the record. A chapter without a title heading gets the
    /// configured placeholder.
    pub fn finish(self) -> (DocumentRecord, LinkStats) {
        let record = DocumentRecord {
            source_id: self.source_id,
            title: self
                .title
                .unwrap_or_else(|| self.settings.untitled.clone()),
            subsections: self.subsections,
            subsection_anchors: self.subsection_anchors,
            bibliography_ref: self.bibliography_ref,
        };
        (record, self.links)
    }

    /// Every heading claims an anchor, recorded or not, so numbering of
    /// repeats matches the rendered page.
    fn header(&mut self, level: u8, text: &str) -> Result<(), Violation> {
        let s = self.settings;
        let anchor = self.anchors.assign(text);
        let is_section = if level == s.title_level {
            self.title.is_some()
        } else {
            level == s.section_level
        };
        if is_section {
            self.subsections.push(text.to_string());
            self.subsection_anchors.push(anchor);
        } else if level == s.title_level {
            self.title = Some(text.to_string());
        }
        Ok(())
    }

    fn check_local_asset(&self, url: &str) -> Result<(), Violation> {
        if !self.settings.require_local || !is_relative_url(url) {
            return Ok(());
        }
        let rewritten = rewrite_extension(url, &self.settings.extension_rewrites);
        let path_part = rewritten
            .split(['?', '#'])
            .next()
            .unwrap_or(&rewritten)
            .trim_start_matches("./");
        let expected = self.settings.source_root.join(path_part);
        if expected.is_file() {
            Ok(())
        } else {
            Err(Violation::MissingAsset {
                document: self.source_id.clone(),
                url: url.to_string(),
                expected: expected.display().to_string(),
            })
        }
    }

    fn check_link(
        &mut self,
        url: &str,
        cache: &mut LinkCache,
        probe: &dyn LinkProbe,
    ) -> Result<(), Violation> {
        if url.starts_with('#') {
            self.links.fragment();
            return Ok(());
        }
        let well_formed = Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !well_formed {
            return Err(Violation::MalformedLink {
                document: self.source_id.clone(),
                url: url.to_string(),
            });
        }
        if cache.is_fresh(url) {
            debug!(url, "link fresh in cache");
            self.links.fresh();
            return Ok(());
        }
        match probe.probe(url) {
            ProbeOutcome::Alive(status) => {
                debug!(url, status, "link verified");
                cache.mark_verified(url);
                self.links.verified();
                Ok(())
            }
            ProbeOutcome::Dead(reason) => Err(Violation::BrokenLink {
                document: self.source_id.clone(),
                url: url.to_string(),
                reason,
            }),
        }
    }
}

/// Run the validation pass over one document's events.
pub fn validate_document(
    source_id: &str,
    events: &[StructuralEvent],
    cache: &mut LinkCache,
    probe: &dyn LinkProbe,
    settings: &ValidationSettings,
) -> Result<(DocumentRecord, LinkStats), Violation> {
    let mut validator = Validator::new(source_id, settings);
    for event in events {
        validator.observe(event, cache, probe)?;
    }
    Ok(validator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::tests::MockProbe;
    use std::fs;
    use tempfile::TempDir;

    fn settings(root: &Path) -> ValidationSettings {
        ValidationSettings::from_config(&WikiConfig::default(), root)
    }

    fn header(level: u8, text: &str) -> StructuralEvent {
        StructuralEvent::Header {
            level,
            text: text.into(),
        }
    }

    fn image(url: &str, description: &str) -> StructuralEvent {
        StructuralEvent::Image {
            url: url.into(),
            description: description.into(),
        }
    }

    fn link(url: &str) -> StructuralEvent {
        StructuralEvent::Link {
            url: url.into(),
            title: "t".into(),
        }
    }

    fn run(events: &[StructuralEvent]) -> Result<DocumentRecord, Violation> {
        let tmp = TempDir::new().unwrap();
        let mut cache = LinkCache::empty();
        validate_document("intro", events, &mut cache, &MockProbe::new(), &settings(tmp.path()))
            .map(|(record, _)| record)
    }

    // =========================================================================
    // Headers
    // =========================================================================

    #[test]
    fn title_and_subsections_harvested_in_order() {
        let record = run(&[
            header(1, "Introduction"),
            header(2, "Hello"),
            header(3, "Deep"),
            header(2, "World"),
        ])
        .unwrap();
        assert_eq!(record.source_id, "intro");
        assert_eq!(record.title, "Introduction");
        assert_eq!(record.subsections, vec!["Hello", "World"]);
        assert_eq!(record.bibliography_ref, None);
    }

    #[test]
    fn missing_title_uses_placeholder() {
        let record = run(&[header(2, "Only a section")]).unwrap();
        assert_eq!(record.title, "[Untitled]");
        assert_eq!(record.subsections, vec!["Only a section"]);
    }

    #[test]
    fn second_title_heading_demoted_to_subsection() {
        let record = run(&[header(1, "First"), header(2, "A"), header(1, "Second")]).unwrap();
        assert_eq!(record.title, "First");
        assert_eq!(record.subsections, vec!["A", "Second"]);
    }

    #[test]
    fn custom_levels_ignore_headers_between_title_and_section() {
        let tmp = TempDir::new().unwrap();
        let mut s = settings(tmp.path());
        s.section_level = 3;
        let (record, _) = validate_document(
            "intro",
            &[header(1, "T"), header(2, "Skipped"), header(3, "Kept")],
            &mut LinkCache::empty(),
            &MockProbe::new(),
            &s,
        )
        .unwrap();
        assert_eq!(record.subsections, vec!["Kept"]);
    }

    #[test]
    fn repeated_sections_get_numbered_anchors() {
        let record = run(&[
            header(1, "Tools"),
            header(2, "Setup"),
            header(3, "Usage"),
            header(2, "Usage"),
            header(2, "Setup"),
        ])
        .unwrap();
        assert_eq!(record.subsections, vec!["Setup", "Usage", "Setup"]);
        assert_eq!(record.subsection_anchors, vec!["setup", "usage-1", "setup-1"]);
    }

    #[test]
    fn bibliography_recorded_when_non_empty() {
        let record = run(&[StructuralEvent::Metadata {
            bibliography: "refs.bib".into(),
        }])
        .unwrap();
        assert_eq!(record.bibliography_ref.as_deref(), Some("refs.bib"));

        let record = run(&[StructuralEvent::Metadata {
            bibliography: "  ".into(),
        }])
        .unwrap();
        assert_eq!(record.bibliography_ref, None);
    }

    // =========================================================================
    // Images
    // =========================================================================

    #[test]
    fn empty_alt_text_is_accessibility_violation() {
        let err = run(&[image("https://cdn.example/duck.png", "  ")]).unwrap_err();
        assert_eq!(
            err,
            Violation::Accessibility {
                document: "intro".into(),
                url: "https://cdn.example/duck.png".into()
            }
        );
    }

    #[test]
    fn generic_alt_text_rejected_case_insensitively() {
        assert!(run(&[image("https://cdn.example/a.png", "Image")]).is_err());
        assert!(run(&[image("https://cdn.example/a.png", "image")]).is_err());
        assert!(run(&[image("https://cdn.example/a.png", "An image of a duck")]).is_ok());
    }

    #[test]
    fn relative_image_must_exist_after_extension_rewrite() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img")).unwrap();
        fs::write(tmp.path().join("img/diagram.png"), b"png").unwrap();
        let s = settings(tmp.path());
        let mut cache = LinkCache::empty();
        let probe = MockProbe::new();

        assert!(
            validate_document(
                "intro",
                &[image("./img/diagram.eps", "Page table diagram")],
                &mut cache,
                &probe,
                &s
            )
            .is_ok()
        );

        let err = validate_document(
            "intro",
            &[image("img/missing.png", "Missing")],
            &mut cache,
            &probe,
            &s,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "missing-asset");
    }

    #[test]
    fn local_check_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut s = settings(tmp.path());
        s.require_local = false;
        assert!(
            validate_document(
                "intro",
                &[image("img/missing.png", "Missing")],
                &mut LinkCache::empty(),
                &MockProbe::new(),
                &s
            )
            .is_ok()
        );
    }

    // =========================================================================
    // Links
    // =========================================================================

    #[test]
    fn fragment_links_never_probed() {
        let tmp = TempDir::new().unwrap();
        let probe = MockProbe::new();
        let (_, stats) = validate_document(
            "intro",
            &[link("#section")],
            &mut LinkCache::empty(),
            &probe,
            &settings(tmp.path()),
        )
        .unwrap();
        assert!(probe.get_calls().is_empty());
        assert_eq!(stats.fragments, 1);
    }

    #[test]
    fn relative_and_non_http_links_are_malformed() {
        for url in ["other.md", "mailto:someone@example.com", "ftp://example.com/x"] {
            let err = run(&[link(url)]).unwrap_err();
            assert_eq!(err.kind(), "malformed-link", "{url}");
        }
    }

    #[test]
    fn verified_link_is_cached() {
        let tmp = TempDir::new().unwrap();
        let mut cache = LinkCache::empty();
        let probe = MockProbe::new();
        validate_document(
            "intro",
            &[link("https://example.com/")],
            &mut cache,
            &probe,
            &settings(tmp.path()),
        )
        .unwrap();
        assert_eq!(probe.get_calls(), vec!["https://example.com/"]);
        assert!(cache.is_fresh("https://example.com/"));
    }

    #[test]
    fn second_run_with_fresh_cache_performs_zero_probes() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path());
        let events = [link("https://a.example/"), link("https://b.example/x")];
        let mut cache = LinkCache::empty();

        let first = MockProbe::new();
        validate_document("intro", &events, &mut cache, &first, &s).unwrap();
        assert_eq!(first.get_calls().len(), 2);

        let second = MockProbe::new();
        let (_, stats) = validate_document("intro", &events, &mut cache, &second, &s).unwrap();
        assert!(second.get_calls().is_empty());
        assert_eq!(stats.fresh, 2);
    }

    #[test]
    fn dead_link_is_broken_and_not_cached() {
        let tmp = TempDir::new().unwrap();
        let mut cache = LinkCache::empty();
        let probe = MockProbe::with_dead(&["https://gone.example/"]);
        let err = validate_document(
            "intro",
            &[link("https://gone.example/")],
            &mut cache,
            &probe,
            &settings(tmp.path()),
        )
        .unwrap_err();
        assert!(matches!(err, Violation::BrokenLink { ref reason, .. } if reason == "HTTP 404"));
        assert!(cache.is_empty());
    }

    #[test]
    fn first_violation_stops_the_walk() {
        let tmp = TempDir::new().unwrap();
        let probe = MockProbe::new();
        let result = validate_document(
            "intro",
            &[image("https://cdn.example/a.png", ""), link("https://example.com/")],
            &mut LinkCache::empty(),
            &probe,
            &settings(tmp.path()),
        );
        assert!(result.is_err());
        assert!(probe.get_calls().is_empty());
    }
}
