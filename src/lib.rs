//! # chapterwiki
//!
//! Turns an ordered set of book chapters written in markdown into a
//! browsable wiki: one page per chapter, a home page listing every chapter
//! with its sections, and a sidebar. Along the way every image must carry
//! meaningful alt text and every external link must resolve.
//!
//! # Architecture: Two Passes per Chapter
//!
//! ```text
//! 1. Validation  source → events → DocumentRecord   (sequential, checks links + images)
//! 2. Transform   source → HTML page                  (parallel, rewrites images, math, links)
//! ```
//!
//! Both passes drive the same [`converter::Converter`]. The validation pass
//! only reads events; the transform pass installs a rewrite filter and
//! renders. Records from the validation pass accumulate in a metadata
//! sidecar in manifest order, and the home page is rendered from that list
//! once every chapter has made it through both passes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Orchestrator: `build`, `check`, `validate_one` |
//! | [`validate`] | Validation pass: title, sections, bibliography, alt text, link checks |
//! | [`transform`] | Transform pass: image URL rewriting, math rendering, link canonicalization |
//! | [`converter`] | `Converter` trait and the pulldown-cmark implementation |
//! | [`cache`] | Link freshness cache (URL → last verified instant) |
//! | [`probe`] | Network link checks over HTTP |
//! | [`metadata`] | Ordered `DocumentRecord` sidecar |
//! | [`manifest`] | Ordered chapter list and chapter selection |
//! | [`generate`] | Maud templates for chapter pages, Home and Sidebar |
//! | [`config`] | `wiki.toml` loading, validation, stock config |
//! | [`naming`] | Chapter identifier → page name, anchors |
//! | [`types`] | Structural events, records, violations |
//! | [`output`] | CLI output formatting |
//! | [`persist`] | Atomic whole-file writes |
//!
//! # Design Decisions
//!
//! ## Fail Fast
//!
//! A book with one inaccessible image or one dead link is not published.
//! The first [`types::Violation`] aborts the build, and Home is never
//! written for a corpus that did not fully validate.
//!
//! ## Links Are Checked Once a Month
//!
//! Verifying hundreds of links on every build is slow and rude to the hosts.
//! The [`cache`] remembers successful checks for 30 days; a second build
//! inside the window makes no network calls at all.

pub mod cache;
pub mod config;
pub mod converter;
pub mod generate;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod probe;
pub mod transform;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
