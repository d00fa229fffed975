//! Turns XML or HTML source text into a lazy stream of markup events.
//!
//! Both parsers yield `Result<Event, ParseError>` one event at a time and
//! attach the source position to every event. The XML parser is strict and
//! namespace-aware; the HTML parser balances tags and knows about void
//! elements.

mod cursor;
pub mod entities;
pub mod error;
pub mod html;
pub mod xml;

pub use error::ParseError;
pub use html::HtmlParser;
pub use xml::XmlParser;
