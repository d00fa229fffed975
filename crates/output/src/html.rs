//! The HTML serializer.

use weft_core::{escape, Event, XHTML_NAMESPACE};

use crate::doctype::{self, DocType};
use crate::is_void_element;
use crate::pushback::Pushback;

/// Attributes that serialize as a bare name when their value is truthy,
/// and disappear otherwise.
pub const BOOLEAN_ATTRS: &[&str] = &[
    "checked", "compact", "declare", "defer", "disabled", "ismap", "multiple", "nohref",
    "noresize", "noshade", "nowrap", "readonly", "selected",
];

/// Produces HTML text from an event stream.
///
/// Elements and attributes in a namespace other than the XHTML namespace
/// are suppressed, boolean attributes render name-only, and void elements
/// are written as open tags without an end tag.
#[derive(Debug, Clone, Default)]
pub struct HtmlSerializer {
    doctype: Option<DocType>,
}

impl HtmlSerializer {
    pub fn new() -> Self {
        HtmlSerializer::default()
    }

    pub fn with_doctype(doctype: DocType) -> Self {
        HtmlSerializer {
            doctype: Some(doctype),
        }
    }

    pub fn serialize<I>(&self, stream: I) -> HtmlText<I::IntoIter>
    where
        I: IntoIterator<Item = Event>,
    {
        HtmlText {
            stream: Pushback::new(stream.into_iter()),
            preamble: self.doctype.clone(),
            have_doctype: false,
        }
    }

    pub fn to_string<I>(&self, stream: I) -> String
    where
        I: IntoIterator<Item = Event>,
    {
        self.serialize(stream).collect()
    }
}

fn in_html(namespace: &Option<String>) -> bool {
    match namespace {
        None => true,
        Some(uri) => uri == XHTML_NAMESPACE,
    }
}

/// The streaming HTML serialization state.
pub struct HtmlText<I: Iterator<Item = Event>> {
    stream: Pushback<I>,
    preamble: Option<DocType>,
    have_doctype: bool,
}

impl<I: Iterator<Item = Event>> Iterator for HtmlText<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(doctype) = self.preamble.take() {
            self.have_doctype = true;
            return Some(doctype.chunk());
        }

        loop {
            match self.stream.next()? {
                Event::Doctype {
                    name,
                    pubid,
                    sysid,
                    ..
                } => {
                    if !self.have_doctype {
                        self.have_doctype = true;
                        return Some(doctype::render(
                            &name,
                            pubid.as_deref(),
                            sysid.as_deref(),
                        ));
                    }
                }

                Event::Start { name, attrs, .. } => {
                    if !in_html(&name.namespace) {
                        continue;
                    }
                    let mut tag = format!("<{}", name.localname);
                    for (attr, value) in attrs.iter() {
                        if !in_html(&attr.namespace) {
                            continue;
                        }
                        if BOOLEAN_ATTRS.contains(&attr.localname.as_str()) {
                            if !value.is_empty() {
                                tag.push_str(&format!(" {}", attr.localname));
                            }
                        } else {
                            tag.push_str(&format!(
                                " {}=\"{}\"",
                                attr.localname,
                                escape(value, true)
                            ));
                        }
                    }
                    tag.push('>');

                    if is_void_element(&name.localname) {
                        // swallow the implicit end event
                        match self.stream.next() {
                            Some(Event::End { .. }) => {}
                            Some(other) => self.stream.pushback(other),
                            None => {}
                        }
                    }
                    return Some(tag);
                }

                Event::End { name, .. } => {
                    if in_html(&name.namespace) {
                        return Some(format!("</{}>", name.localname));
                    }
                }

                Event::Text { value, raw, .. } => {
                    return Some(if raw { value } else { escape(&value, false) });
                }

                Event::Comment { text, .. } => return Some(format!("<!--{text}-->")),

                Event::Pi { target, data, .. } => {
                    return Some(if data.is_empty() {
                        format!("<?{target}?>")
                    } else {
                        format!("<?{target} {data}?>")
                    });
                }

                // namespace events and the XML prolog have no HTML form
                Event::StartNs { .. } | Event::EndNs { .. } | Event::Prolog { .. } => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_input::{HtmlParser, XmlParser};

    fn from_xml(source: &str) -> String {
        let events = XmlParser::new(source, None).into_events().unwrap();
        HtmlSerializer::new().to_string(events)
    }

    #[test]
    fn test_void_elements_have_no_end_tag() {
        assert_eq!(
            from_xml("<div><a href=\"foo\"/><br/><hr/></div>"),
            "<div><a href=\"foo\"></a><br><hr></div>"
        );
    }

    #[test]
    fn test_boolean_attributes() {
        assert_eq!(
            from_xml("<input checked=\"checked\" type=\"checkbox\"/>"),
            "<input checked type=\"checkbox\">"
        );
        assert_eq!(from_xml("<input checked=\"\"/>"), "<input>");
    }

    #[test]
    fn test_foreign_namespace_elements_are_suppressed() {
        let out = from_xml(
            "<div xmlns:x=\"http://example.org/\"><x:hide>inner</x:hide><p>kept</p></div>",
        );
        assert_eq!(out, "<div>inner<p>kept</p></div>");
    }

    #[test]
    fn test_xhtml_namespace_is_html() {
        let out = from_xml("<html xmlns=\"http://www.w3.org/1999/xhtml\"><body/></html>");
        assert_eq!(out, "<html><body></body></html>");
    }

    #[test]
    fn test_html_parser_round_trip() {
        let events = HtmlParser::new("<div><B>bold</B><br></div>", None)
            .into_events()
            .unwrap();
        assert_eq!(
            HtmlSerializer::new().to_string(events),
            "<div><b>bold</b><br></div>"
        );
    }
}
