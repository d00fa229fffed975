//! weft — a streaming XML/HTML templating engine.
//!
//! Templates are XML documents in which attributes and elements from the
//! directive namespace (`py:for`, `py:if`, `py:match`, …) together with
//! `${…}` interpolation drive a rewrite of the markup against per-render
//! context data. A template compiles once into an event program; each
//! render evaluates that program into a lazy stream of markup events that
//! one of the serializers turns into XML, XHTML or HTML text.
//!
//! ```
//! use weft::{Context, Template, Method};
//!
//! let template = Template::new(
//!     r#"<ul xmlns:py="http://markup.edgewall.org/">
//!   <li py:for="item in items">${item}</li>
//! </ul>"#,
//! ).unwrap();
//! let ctxt = Context::new();
//! ctxt.set("items", vec![1i64, 2, 3]);
//! let out = weft::render(template.generate(&ctxt), Method::Xml).unwrap();
//! assert_eq!(out, "<ul>\n  <li>1</li><li>2</li><li>3</li>\n</ul>");
//! ```

use itertools::process_results;
use thiserror::Error;

pub use weft_core::{escape, unescape, Attributes, Event, Namespace, Position, QName};
pub use weft_eval::{Context, EvaluationError, Expression, Object, Value};
pub use weft_input::{HtmlParser, ParseError, XmlParser};
pub use weft_output::{
    DocType, HtmlSerializer, WhitespaceFilter, XhtmlSerializer, XmlSerializer,
};
pub use weft_template::{
    Template, TemplateError, TemplateFilter, TemplateLoader, TemplateStream,
    TemplateSyntaxError, NAMESPACE, XINCLUDE_NAMESPACE,
};
pub use weft_xpath::{Path, PathSyntaxError};

/// Any error the engine can produce, from parsing source text to
/// rendering the final output.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Path(#[from] PathSyntaxError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// The output flavor of [`Stream::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Xml,
    Xhtml,
    Html,
}

/// A stream of markup events with the engine's convenience operations:
/// selecting with a path expression and rendering to text.
pub struct Stream {
    events: Box<dyn Iterator<Item = Result<Event, Error>>>,
}

impl Stream {
    /// Wraps an already materialized event sequence.
    pub fn from_events(events: Vec<Event>) -> Stream {
        Stream {
            events: Box::new(events.into_iter().map(Ok)),
        }
    }

    /// Wraps a fallible event iterator.
    pub fn from_iter<I, E>(events: I) -> Stream
    where
        I: IntoIterator<Item = Result<Event, E>>,
        I::IntoIter: 'static,
        E: Into<Error>,
    {
        Stream {
            events: Box::new(events.into_iter().map(|item| item.map_err(Into::into))),
        }
    }

    /// Returns a new stream containing the events matching the given path
    /// expression.
    pub fn select(self, path: &str) -> Result<Stream, Error> {
        let path = Path::new(path)?;
        let events = self.into_events()?;
        Ok(Stream::from_events(path.select(events).collect()))
    }

    /// Applies a filter function to the event stream.
    pub fn filter<F, J>(self, filter: F) -> Stream
    where
        F: FnOnce(Box<dyn Iterator<Item = Result<Event, Error>>>) -> J,
        J: Iterator<Item = Result<Event, Error>> + 'static,
    {
        Stream {
            events: Box::new(filter(self.events)),
        }
    }

    /// Drains the stream, stopping at the first error.
    pub fn into_events(self) -> Result<Vec<Event>, Error> {
        self.events.collect()
    }

    /// Renders the stream to text with the whitespace filter applied.
    pub fn render(self, method: Method) -> Result<String, Error> {
        self.render_with_doctype(method, None)
    }

    /// Like [`Stream::render`], prepending a DOCTYPE declaration.
    pub fn render_with_doctype(
        self,
        method: Method,
        doctype: Option<DocType>,
    ) -> Result<String, Error> {
        process_results(self.events, |events| {
            let events = WhitespaceFilter::new(events);
            match method {
                Method::Xml => match doctype {
                    Some(doctype) => XmlSerializer::with_doctype(doctype).to_string(events),
                    None => XmlSerializer::new().to_string(events),
                },
                Method::Xhtml => match doctype {
                    Some(doctype) => XhtmlSerializer::with_doctype(doctype).to_string(events),
                    None => XhtmlSerializer::new().to_string(events),
                },
                Method::Html => match doctype {
                    Some(doctype) => HtmlSerializer::with_doctype(doctype).to_string(events),
                    None => HtmlSerializer::new().to_string(events),
                },
            }
        })
    }

    /// Renders to UTF-8 encoded bytes.
    pub fn render_bytes(self, method: Method) -> Result<Vec<u8>, Error> {
        Ok(self.render(method)?.into_bytes())
    }
}

impl Iterator for Stream {
    type Item = Result<Event, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }
}

impl From<TemplateStream> for Stream {
    fn from(stream: TemplateStream) -> Stream {
        Stream::from_iter(stream)
    }
}

/// Parses XML source text into a [`Stream`].
pub fn xml(source: &str) -> Result<Stream, Error> {
    let events = XmlParser::new(source, None).into_events()?;
    Ok(Stream::from_events(events))
}

/// Parses HTML source text into a [`Stream`].
pub fn html(source: &str) -> Result<Stream, Error> {
    let events = HtmlParser::new(source, None).into_events()?;
    Ok(Stream::from_events(events))
}

/// Renders any fallible event stream to text; shorthand for going through
/// [`Stream`].
pub fn render<I, E>(stream: I, method: Method) -> Result<String, Error>
where
    I: IntoIterator<Item = Result<Event, E>>,
    I::IntoIter: 'static,
    E: Into<Error>,
{
    Stream::from_iter(stream).render(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_round_trip() {
        let out = xml("<root><item/></root>").unwrap().render(Method::Xml).unwrap();
        assert_eq!(out, "<root><item/></root>");
    }

    #[test]
    fn test_select_render() {
        let out = xml("<root><a>1</a><b>2</b></root>")
            .unwrap()
            .select("b")
            .unwrap()
            .render(Method::Xml)
            .unwrap();
        assert_eq!(out, "<b>2</b>");
    }

    #[test]
    fn test_render_bytes_is_utf8() {
        let out = xml("<p>\u{00e9}</p>").unwrap().render_bytes(Method::Xml).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<p>\u{00e9}</p>");
    }

    #[test]
    fn test_invalid_path_is_reported() {
        let stream = xml("<root/>").unwrap();
        assert!(matches!(stream.select("/abs"), Err(Error::Path(_))));
    }
}
