//! Centralized naming rules for chapters, pages, and anchors.
//!
//! Every chapter is listed in the manifest by an identifier that may carry a
//! directory part (`chapters/intro-to-c`). From it we derive:
//!
//! - the **bare name**: last path component (`intro-to-c`)
//! - the **page name**: bare name title-cased the way wiki page names are
//!   (`Intro-To-C`), used for the output file and for links
//! - the **key**: normalized identifier used to match `--chapter` filters
//!   (`intro-to-c`; case, `_` and spaces folded)
//!
//! Subsection anchors follow the wiki convention: lowercase, spaces become
//! hyphens (`Virtual Memory` → `virtual-memory`). A repeated heading on the
//! same page gets a numeric suffix (`setup`, `setup-1`, `setup-2`).

use std::collections::HashSet;

/// Result of parsing a chapter identifier like `chapters/intro-to-c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterName {
    /// Last path component of the identifier.
    pub bare_name: String,
    /// Title-cased bare name, e.g. `Intro-To-C`.
    pub page_name: String,
    /// Normalized identifier for filter matching.
    pub key: String,
}

impl ChapterName {
    /// File name of the generated page for this chapter.
    pub fn page_file(&self) -> String {
        format!("{}.html", self.page_name)
    }
}

/// Parse a chapter identifier from the manifest.
///
/// - `"intro"` → bare_name="intro", page_name="Intro", key="intro"
/// - `"chapters/intro-to-c"` → bare_name="intro-to-c", page_name="Intro-To-C"
/// - `"Memory_Allocators"` → page_name="Memory_Allocators", key="memory-allocators"
pub fn parse_chapter_id(id: &str) -> ChapterName {
    let trimmed = id.trim().trim_end_matches('/');
    let bare = trimmed.rsplit('/').next().unwrap_or(trimmed);
    ChapterName {
        bare_name: bare.to_string(),
        page_name: title_case(bare),
        key: normalize_key(bare),
    }
}

/// Normalize a chapter identifier or filter for comparison.
///
/// Takes the last path component, lowercases it, and folds `_` and spaces
/// into `-`. Two identifiers match iff their keys are equal.
pub fn normalize_key(id: &str) -> String {
    let trimmed = id.trim().trim_end_matches('/');
    let bare = trimmed.rsplit('/').next().unwrap_or(trimmed);
    bare.chars()
        .map(|c| match c {
            '_' | ' ' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Capitalize the first letter of every alphabetic run, lowercase the rest.
///
/// `intro-to-c` → `Intro-To-C`, `ipc2go` → `Ipc2Go`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Anchor for a heading: lowercase, spaces replaced by hyphens.
pub fn anchor(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "-")
}

/// Hands out unique anchors for the headings of one page, in document order.
///
/// The chapter page and the validation pass both feed every heading through
/// one of these, so the ids on the page and the links on Home agree.
#[derive(Debug, Default)]
pub struct AnchorSet {
    used: HashSet<String>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, text: &str) -> String {
        let base = anchor(text);
        let mut candidate = base.clone();
        let mut n = 0;
        while !self.used.insert(candidate.clone()) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_identifier() {
        let n = parse_chapter_id("intro");
        assert_eq!(n.bare_name, "intro");
        assert_eq!(n.page_name, "Intro");
        assert_eq!(n.key, "intro");
        assert_eq!(n.page_file(), "Intro.html");
    }

    #[test]
    fn identifier_with_directory() {
        let n = parse_chapter_id("chapters/intro-to-c");
        assert_eq!(n.bare_name, "intro-to-c");
        assert_eq!(n.page_name, "Intro-To-C");
        assert_eq!(n.key, "intro-to-c");
    }

    #[test]
    fn underscores_fold_into_key() {
        let n = parse_chapter_id("Memory_Allocators");
        assert_eq!(n.page_name, "Memory_Allocators");
        assert_eq!(n.key, "memory-allocators");
    }

    #[test]
    fn title_case_restarts_after_digits() {
        assert_eq!(title_case("ipc2go"), "Ipc2Go");
        assert_eq!(title_case("SIGNALS"), "Signals");
    }

    #[test]
    fn normalize_key_is_case_insensitive() {
        assert_eq!(normalize_key("INTRO"), normalize_key("intro"));
        assert_eq!(normalize_key("book/Intro To C"), "intro-to-c");
    }

    #[test]
    fn anchor_lowercases_and_hyphenates() {
        assert_eq!(anchor("Virtual Memory"), "virtual-memory");
        assert_eq!(anchor("  Hello World "), "hello-world");
        assert_eq!(anchor("fork"), "fork");
    }

    #[test]
    fn repeated_headings_get_numbered_anchors() {
        let mut anchors = AnchorSet::new();
        assert_eq!(anchors.assign("Setup"), "setup");
        assert_eq!(anchors.assign("Usage"), "usage");
        assert_eq!(anchors.assign("Setup"), "setup-1");
        assert_eq!(anchors.assign("setup"), "setup-2");
    }

    #[test]
    fn numbered_anchor_skips_existing_literal() {
        let mut anchors = AnchorSet::new();
        assert_eq!(anchors.assign("Step 1"), "step-1");
        assert_eq!(anchors.assign("Step"), "step");
        assert_eq!(anchors.assign("Step"), "step-2");
    }
}
