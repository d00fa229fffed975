//! The markup event model.
//!
//! A template, a parsed document and a render result are all streams of
//! [`Event`] values. Events carry the source position they originated from,
//! which is used only for diagnostics.

use std::fmt;
use std::sync::Arc;

use crate::attrs::Attributes;
use crate::qname::QName;

/// A location in a source document: file name (if any), 1-based line and
/// column. Zero means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub source: Option<Arc<str>>,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(source: Option<Arc<str>>, line: u32, column: u32) -> Self {
        Position { source, line, column }
    }

    pub fn unknown() -> Self {
        Position::default()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self.source.as_deref().unwrap_or("<string>");
        write!(f, "{}:{}:{}", source, self.line, self.column)
    }
}

/// One occurrence in a markup stream.
///
/// The compiler-internal expression and subprogram kinds are deliberately
/// not part of this type; they live in the template crate's instruction
/// type, which keeps them unreachable to the serializers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A start tag with its attributes.
    Start {
        name: QName,
        attrs: Attributes,
        pos: Position,
    },
    /// An end tag.
    End { name: QName, pos: Position },
    /// Character data. `raw` text is already markup-safe and is passed
    /// through the serializers without escaping.
    Text {
        value: String,
        raw: bool,
        pos: Position,
    },
    /// The XML declaration.
    Prolog {
        version: String,
        encoding: Option<String>,
        standalone: Option<bool>,
        pos: Position,
    },
    /// A document type declaration.
    Doctype {
        name: String,
        pubid: Option<String>,
        sysid: Option<String>,
        pos: Position,
    },
    /// The start of a prefix/URI namespace binding. Emitted before the
    /// start tag that introduces the binding.
    StartNs {
        prefix: String,
        uri: String,
        pos: Position,
    },
    /// The end of a namespace binding. Emitted after the matching end tag.
    EndNs { prefix: String, pos: Position },
    /// A processing instruction.
    Pi {
        target: String,
        data: String,
        pos: Position,
    },
    /// A comment.
    Comment { text: String, pos: Position },
}

impl Event {
    pub fn text(value: impl Into<String>, pos: Position) -> Self {
        Event::Text {
            value: value.into(),
            raw: false,
            pos,
        }
    }

    pub fn raw_text(value: impl Into<String>, pos: Position) -> Self {
        Event::Text {
            value: value.into(),
            raw: true,
            pos,
        }
    }

    /// The source position the event was produced at.
    pub fn pos(&self) -> &Position {
        match self {
            Event::Start { pos, .. }
            | Event::End { pos, .. }
            | Event::Text { pos, .. }
            | Event::Prolog { pos, .. }
            | Event::Doctype { pos, .. }
            | Event::StartNs { pos, .. }
            | Event::EndNs { pos, .. }
            | Event::Pi { pos, .. }
            | Event::Comment { pos, .. } => pos,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Event::Start { .. })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Event::End { .. })
    }
}
