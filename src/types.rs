//! Shared types used by both passes and the orchestrator.
//!
//! [`StructuralEvent`] is what a [`Converter`](crate::converter::Converter)
//! reports while walking a document; [`DocumentRecord`] is what the
//! validation pass harvests from those events and what the page renderer
//! consumes; [`Violation`] is the closed set of content defects that halt a
//! build.

use crate::naming;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A typed notification emitted while walking one document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralEvent {
    /// A heading. `text` is the plain-text rendering of its inline content.
    Header { level: u8, text: String },
    /// An image node. `description` is the plain-text rendering of its alt content.
    Image { url: String, description: String },
    /// A hyperlink. `title` is the plain-text rendering of the link's visible content.
    Link { url: String, title: String },
    /// Inline (`display == false`) or block math, raw TeX-ish source.
    Math { text: String, display: bool },
    /// Document-level metadata. An empty `bibliography` means "none".
    Metadata { bibliography: String },
}

/// Metadata harvested from one chapter.
///
/// `source_id` is the chapter identifier exactly as listed in the manifest;
/// it is the stable key used by the page renderer to find the chapter's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub subsections: Vec<String>,
    /// Page anchor of each subsection, parallel to `subsections`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsection_anchors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibliography_ref: Option<String>,
}

impl DocumentRecord {
    /// Subsections paired with their anchor on the chapter page. Records
    /// written without anchors fall back to the plain heading rule.
    pub fn sections(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.subsections.iter().enumerate().map(|(i, text)| {
            let anchor = self
                .subsection_anchors
                .get(i)
                .cloned()
                .unwrap_or_else(|| naming::anchor(text));
            (text.as_str(), anchor)
        })
    }
}

/// A build-halting defect in document content or corpus selection.
///
/// Every variant is fatal for the whole build; the first one encountered is
/// reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("{document}: image {url:?} has no usable alt text")]
    Accessibility { document: String, url: String },
    #[error("{document}: link {url:?} is neither a #fragment nor an absolute http(s) URL")]
    MalformedLink { document: String, url: String },
    #[error("{document}: link {url:?} is broken ({reason})")]
    BrokenLink {
        document: String,
        url: String,
        reason: String,
    },
    #[error("no chapter matches {0:?}")]
    ChapterNotFound(String),
    #[error("{document}: converter failed: {message}")]
    ExternalTool { document: String, message: String },
    #[error("{document}: image {url:?} not found at {expected}")]
    MissingAsset {
        document: String,
        url: String,
        expected: String,
    },
}

impl Violation {
    /// Short machine-friendly name of the violation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Violation::Accessibility { .. } => "accessibility",
            Violation::MalformedLink { .. } => "malformed-link",
            Violation::BrokenLink { .. } => "broken-link",
            Violation::ChapterNotFound(_) => "chapter-not-found",
            Violation::ExternalTool { .. } => "external-tool",
            Violation::MissingAsset { .. } => "missing-asset",
        }
    }
}
