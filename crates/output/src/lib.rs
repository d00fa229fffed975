//! Serialization of markup event streams to XML, XHTML or HTML text.
//!
//! Serializers are streaming: they yield output text chunk by chunk as
//! events are pulled from the stream. The [`WhitespaceFilter`] usually
//! runs ahead of them to coalesce and tidy literal text.

mod doctype;
mod html;
mod ns;
mod pushback;
mod whitespace;
mod xml;

pub use doctype::DocType;
pub use html::HtmlSerializer;
pub use pushback::Pushback;
pub use whitespace::WhitespaceFilter;
pub use xml::{XhtmlSerializer, XmlSerializer};

/// Elements without content in HTML; they serialize without an end tag
/// (HTML) or as minimized empty tags (XHTML).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "frame", "hr", "img", "input", "isindex", "link",
    "meta", "param",
];

pub(crate) fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}
