//! Document conversion: markdown source → structural events and HTML.
//!
//! A [`Converter`] does two things with a chapter source:
//!
//! - [`walk`](Converter::walk) reports every [`StructuralEvent`] the document
//!   contains, without producing output. The validation pass consumes this.
//! - [`convert`](Converter::convert) renders the document to HTML, offering
//!   every structural node to a [`NodeFilter`] first. The filter can keep the
//!   node or replace it with raw HTML. The transform pass is such a filter.
//!
//! [`MarkdownConverter`] drives `pulldown-cmark`. Headings, images and links
//! are buffered from their start tag to their end tag so the filter sees the
//! node's plain text (heading text, alt text, link title). Events for nested
//! nodes are reported when the inner node closes, so an image inside a link
//! is reported before the link.
//!
//! Heading ids always come from the heading text through
//! [`AnchorSet`], overriding any `{#id}` written in the source, so
//! the validation pass can predict every anchor on the page.
//!
//! Front matter is a TOML block fenced by `+++` lines at the top of the
//! document:
//!
//! ```text
//! +++
//! bibliography = "refs.bib"
//! +++
//! ```
//!
//! Malformed front matter is a converter failure ([`Violation::ExternalTool`]).

use crate::naming::AnchorSet;
use crate::types::{StructuralEvent, Violation};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html as md_html};
use serde::Deserialize;

/// What a [`NodeFilter`] wants done with a structural node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Render the node as the converter normally would.
    Keep,
    /// Replace the whole node with this raw HTML.
    Html(String),
    /// Keep the node's rendered content but replace its own tags with
    /// `open` and `close`. A link wrapping an image keeps the image.
    Wrap { open: String, close: String },
}

/// Per-node rewrite hook applied during [`Converter::convert`].
pub trait NodeFilter: Sync {
    fn rewrite(&self, event: &StructuralEvent) -> Result<Replacement, Violation>;
}

/// A heading found while converting, with the anchor assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub anchor: String,
}

/// Rendered chapter body plus its outline.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub headings: Vec<Heading>,
    pub body_html: String,
}

/// Markup parser/renderer used by both passes.
///
/// `document` is the chapter identifier, used only for error reporting.
pub trait Converter: Sync {
    fn walk(&self, document: &str, source: &str) -> Result<Vec<StructuralEvent>, Violation>;

    fn convert(
        &self,
        document: &str,
        source: &str,
        filter: &dyn NodeFilter,
    ) -> Result<ConvertedDocument, Violation>;
}

/// CommonMark converter with tables, footnotes, strikethrough, math and
/// `+++` front matter enabled.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownConverter {
    options: Options,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_MATH);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS);
        Self { options }
    }

    fn run<'a>(
        &self,
        document: &str,
        source: &'a str,
        hook: &mut dyn FnMut(&StructuralEvent) -> Result<Replacement, Violation>,
    ) -> Result<ConvertedDocument, Violation> {
        let mut state = Walk {
            document,
            stack: Vec::new(),
            out: Vec::new(),
            headings: Vec::new(),
            anchors: AnchorSet::new(),
        };

        for event in Parser::new_ext(source, self.options) {
            match event {
                Event::Start(ref tag) => {
                    let capture = match tag {
                        Tag::Heading { level, .. } => Some(Capture::Heading(*level as u8)),
                        Tag::Image { dest_url, .. } => Some(Capture::Image(dest_url.to_string())),
                        Tag::Link { dest_url, .. } => Some(Capture::Link(dest_url.to_string())),
                        Tag::MetadataBlock(_) => Some(Capture::FrontMatter),
                        _ => None,
                    };
                    match capture {
                        Some(capture) => state.stack.push(Frame {
                            capture,
                            events: vec![event],
                            text: String::new(),
                        }),
                        None => state.emit(event),
                    }
                }
                Event::End(
                    TagEnd::Heading(_) | TagEnd::Image | TagEnd::Link | TagEnd::MetadataBlock(_),
                ) => match state.stack.pop() {
                    Some(mut frame) => {
                        frame.events.push(event);
                        state.finish(frame, hook)?;
                    }
                    None => state.emit(event),
                },
                Event::InlineMath(ref text) | Event::DisplayMath(ref text) => {
                    let math = StructuralEvent::Math {
                        text: text.to_string(),
                        display: matches!(event, Event::DisplayMath(_)),
                    };
                    state.push_text(text);
                    match hook(&math)? {
                        Replacement::Keep => state.emit(event),
                        Replacement::Html(html) => state.emit(Event::InlineHtml(html.into())),
                        Replacement::Wrap { open, close } => {
                            state.emit(Event::InlineHtml(open.into()));
                            state.emit(event);
                            state.emit(Event::InlineHtml(close.into()));
                        }
                    }
                }
                Event::Text(ref text) | Event::Code(ref text) => {
                    state.push_text(text);
                    state.emit(event);
                }
                Event::SoftBreak | Event::HardBreak => {
                    state.push_text(" ");
                    state.emit(event);
                }
                other => state.emit(other),
            }
        }

        // Unbalanced input: flush whatever is still buffered untouched.
        while let Some(frame) = state.stack.pop() {
            state.out.extend(frame.events);
        }

        let mut body_html = String::new();
        md_html::push_html(&mut body_html, state.out.into_iter());
        Ok(ConvertedDocument {
            headings: state.headings,
            body_html,
        })
    }
}

impl Converter for MarkdownConverter {
    fn walk(&self, document: &str, source: &str) -> Result<Vec<StructuralEvent>, Violation> {
        let mut events = Vec::new();
        self.run(document, source, &mut |event: &StructuralEvent| {
            events.push(event.clone());
            Ok(Replacement::Keep)
        })?;
        Ok(events)
    }

    fn convert(
        &self,
        document: &str,
        source: &str,
        filter: &dyn NodeFilter,
    ) -> Result<ConvertedDocument, Violation> {
        self.run(document, source, &mut |event: &StructuralEvent| {
            filter.rewrite(event)
        })
    }
}

enum Capture {
    Heading(u8),
    Image(String),
    Link(String),
    FrontMatter,
}

struct Frame<'a> {
    capture: Capture,
    events: Vec<Event<'a>>,
    text: String,
}

struct Walk<'d, 'a> {
    document: &'d str,
    stack: Vec<Frame<'a>>,
    out: Vec<Event<'a>>,
    headings: Vec<Heading>,
    anchors: AnchorSet,
}

impl<'a> Walk<'_, 'a> {
    fn emit(&mut self, event: Event<'a>) {
        match self.stack.last_mut() {
            Some(frame) => frame.events.push(event),
            None => self.out.push(event),
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.text.push_str(text);
        }
    }

    fn emit_all(&mut self, events: Vec<Event<'a>>, text: &str) {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.text.push_str(text);
                parent.events.extend(events);
            }
            None => self.out.extend(events),
        }
    }

    fn finish(
        &mut self,
        frame: Frame<'a>,
        hook: &mut dyn FnMut(&StructuralEvent) -> Result<Replacement, Violation>,
    ) -> Result<(), Violation> {
        let Frame {
            capture,
            mut events,
            text,
        } = frame;
        let text = text.trim().to_string();

        match capture {
            Capture::FrontMatter => {
                let front: FrontMatter =
                    toml::from_str(&text).map_err(|e| Violation::ExternalTool {
                        document: self.document.to_string(),
                        message: format!("malformed front matter: {}", e.message()),
                    })?;
                hook(&StructuralEvent::Metadata {
                    bibliography: front.bibliography.trim().to_string(),
                })?;
            }
            Capture::Heading(level) => {
                let header = StructuralEvent::Header {
                    level,
                    text: text.clone(),
                };
                let replacement = hook(&header)?;
                let anchor = self.anchors.assign(&text);
                set_heading_id(&mut events, &anchor);
                self.headings.push(Heading {
                    level,
                    text: text.clone(),
                    anchor,
                });
                self.replace_or_keep(replacement, events, &text);
            }
            Capture::Image(url) => {
                let replacement = hook(&StructuralEvent::Image {
                    url,
                    description: text.clone(),
                })?;
                self.replace_or_keep(replacement, events, &text);
            }
            Capture::Link(url) => {
                let replacement = hook(&StructuralEvent::Link {
                    url,
                    title: text.clone(),
                })?;
                self.replace_or_keep(replacement, events, &text);
            }
        }
        Ok(())
    }

    fn replace_or_keep(&mut self, replacement: Replacement, events: Vec<Event<'a>>, text: &str) {
        match replacement {
            Replacement::Keep => self.emit_all(events, text),
            Replacement::Html(html) => self.emit_all(vec![Event::InlineHtml(html.into())], text),
            Replacement::Wrap { open, close } => {
                let inner = match events.len() {
                    0..=2 => Vec::new(),
                    n => events.into_iter().skip(1).take(n - 2).collect(),
                };
                let mut wrapped = Vec::with_capacity(inner.len() + 2);
                wrapped.push(Event::InlineHtml(open.into()));
                wrapped.extend(inner);
                wrapped.push(Event::InlineHtml(close.into()));
                self.emit_all(wrapped, text);
            }
        }
    }
}

/// Set the `id` of the heading start tag, replacing any explicit one.
fn set_heading_id(events: &mut [Event<'_>], anchor: &str) {
    if let Some(Event::Start(Tag::Heading { id, .. })) = events.first_mut() {
        *id = Some(CowStr::from(anchor.to_string()));
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    bibliography: String,
}
