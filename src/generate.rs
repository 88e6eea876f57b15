//! HTML page generation.
//!
//! Renders the three kinds of output page from converted chapters and the
//! corpus metadata.
//!
//! ## Generated Pages
//!
//! - **Chapter pages** (`<PageName>.html`): table of contents followed by the
//!   transformed chapter body
//! - **Home page** (`Home.html`): optional intro, then every chapter in book
//!   order with its numbered subsections linking into the chapter page
//! - **Sidebar** (`_Sidebar.html`): a bare navigation fragment listing the
//!   chapters, for wiki hosts that splice it into every page
//!
//! ## Output Structure
//!
//! ```text
//! wiki/
//! ├── Home.html
//! ├── _Sidebar.html
//! ├── Intro.html
//! ├── Processes.html
//! └── Virtual-Memory.html
//! ```
//!
//! The stylesheet is embedded in each full page. Home and the sidebar are
//! rendered only from the complete, ordered corpus.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Chapter bodies and the home intro are already HTML and are spliced in with
//! `PreEscaped`; everything else is escaped by maud.

use crate::config::{HeadersConfig, SiteConfig};
use crate::converter::ConvertedDocument;
use crate::naming::{self, ChapterName};
use crate::persist::write_atomic;
use crate::types::DocumentRecord;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File name of the home page.
pub const HOME_FILE: &str = "Home.html";
/// File name of the sidebar fragment.
pub const SIDEBAR_FILE: &str = "_Sidebar.html";

const CSS: &str = r#"
:root { --text: #1f2328; --muted: #59636e; --rule: #d1d9e0; --accent: #0969da; }
body { max-width: 52rem; margin: 0 auto; padding: 1rem 1.5rem 4rem;
       font: 16px/1.6 system-ui, sans-serif; color: var(--text); }
a { color: var(--accent); text-decoration: none; }
a:hover { text-decoration: underline; }
.site-header { border-bottom: 1px solid var(--rule); padding-bottom: .5rem; margin-bottom: 1.5rem;
               color: var(--muted); }
nav.toc { border: 1px solid var(--rule); border-radius: 6px; padding: .5rem 1rem; margin-bottom: 2rem; }
nav.toc ul { margin: 0; padding-left: 1.2rem; }
.toc-level-3 { margin-left: 1rem; }
.toc-level-4, .toc-level-5, .toc-level-6 { margin-left: 2rem; }
img { max-width: 100%; }
pre { overflow-x: auto; background: #f6f8fa; padding: .75rem; border-radius: 6px; }
code.math, pre.math { font-family: "STIX Two Math", "Cambria Math", serif; }
ol.chapters > li { margin-bottom: .75rem; }
.pdf-link { font-size: .85em; color: var(--muted); }
"#;

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

fn site_header(site: &SiteConfig, current: Option<&str>) -> Markup {
    html! {
        header.site-header {
            nav.breadcrumb {
                a href=(HOME_FILE) { (site.title) }
                @if let Some(current) = current {
                    " › "
                    (current)
                }
            }
        }
    }
}

/// Table of contents from every heading below the title level.
fn render_toc(document: &ConvertedDocument, headers: &HeadersConfig) -> Markup {
    let entries: Vec<_> = document
        .headings
        .iter()
        .filter(|h| h.level > headers.title_level)
        .collect();
    html! {
        @if !entries.is_empty() {
            nav.toc {
                ul {
                    @for h in &entries {
                        li class={ "toc-level-" (h.level) } {
                            a href={ "#" (h.anchor) } { (h.text) }
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Renders one chapter page.
pub fn render_chapter_page(
    site: &SiteConfig,
    headers: &HeadersConfig,
    record: &DocumentRecord,
    document: &ConvertedDocument,
) -> Markup {
    let content = html! {
        (site_header(site, Some(&record.title)))
        main.chapter-page {
            (render_toc(document, headers))
            article.chapter {
                (PreEscaped(&document.body_html))
            }
        }
    };
    base_document(&format!("{} · {}", record.title, site.title), Some("chapter"), content)
}

/// Renders the home page: intro, then chapters in corpus order with their
/// subsections.
pub fn render_home(site: &SiteConfig, corpus: &[DocumentRecord]) -> Markup {
    let intro = (!site.intro.trim().is_empty()).then(|| {
        let mut intro_html = String::new();
        md_html::push_html(&mut intro_html, Parser::new(&site.intro));
        intro_html
    });

    let content = html! {
        (site_header(site, None))
        main.home-page {
            h1 { (site.title) }
            @if let Some(intro) = &intro {
                section.intro { (PreEscaped(intro)) }
            }
            ol.chapters {
                @for record in corpus {
                    @let name = naming::parse_chapter_id(&record.source_id);
                    li {
                        a href=(name.page_file()) { (record.title) }
                        @if let Some(pdf) = pdf_link(site, &name) {
                            " "
                            a.pdf-link href=(pdf) { "(PDF)" }
                        }
                        @if !record.subsections.is_empty() {
                            ol.subsections {
                                @for (section, anchor) in record.sections() {
                                    li {
                                        a href={ (name.page_file()) "#" (anchor) } {
                                            (section)
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    base_document(&site.title, Some("home"), content)
}

/// Renders the sidebar fragment: Home plus one link per chapter.
pub fn render_sidebar(corpus: &[DocumentRecord]) -> Markup {
    html! {
        nav.sidebar {
            ul {
                li { a href=(HOME_FILE) { "Home" } }
                @for record in corpus {
                    @let name = naming::parse_chapter_id(&record.source_id);
                    li { a href=(name.page_file()) { (record.title) } }
                }
            }
        }
    }
}

fn pdf_link(site: &SiteConfig, name: &ChapterName) -> Option<String> {
    site.pdf_base_url
        .as_deref()
        .map(|base| format!("{}/{}.pdf", base.trim_end_matches('/'), name.bare_name))
}

/// Write a rendered page to `dir/file`.
pub fn write_page(dir: &Path, file: &str, markup: Markup) -> Result<(), GenerateError> {
    write_atomic(&dir.join(file), markup.into_string().as_bytes())?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
