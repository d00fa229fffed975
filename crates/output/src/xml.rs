//! The XML and XHTML serializers.

use weft_core::{escape, Event, QName, XHTML_NAMESPACE};

use crate::doctype::{self, DocType};
use crate::is_void_element;
use crate::ns::NamespaceMap;
use crate::pushback::Pushback;

/// Produces XML text from an event stream.
///
/// Empty elements collapse to `<a/>` via one event of look-ahead, and
/// `xmlns` declarations appear on the element that introduces the binding.
#[derive(Debug, Clone, Default)]
pub struct XmlSerializer {
    doctype: Option<DocType>,
}

impl XmlSerializer {
    pub fn new() -> Self {
        XmlSerializer::default()
    }

    /// A serializer that prepends the given DOCTYPE declaration.
    pub fn with_doctype(doctype: DocType) -> Self {
        XmlSerializer {
            doctype: Some(doctype),
        }
    }

    /// Serializes the stream incrementally, as an iterator of text chunks.
    pub fn serialize<I>(&self, stream: I) -> MarkupText<I::IntoIter>
    where
        I: IntoIterator<Item = Event>,
    {
        MarkupText::new(stream.into_iter(), self.doctype.clone(), Flavor::Xml)
    }

    /// Serializes the whole stream into a string.
    pub fn to_string<I>(&self, stream: I) -> String
    where
        I: IntoIterator<Item = Event>,
    {
        self.serialize(stream).collect()
    }
}

/// Produces XHTML text: XML rules plus HTML-flavored handling of void
/// elements (`<br />` collapses, `<div></div>` does not).
#[derive(Debug, Clone, Default)]
pub struct XhtmlSerializer {
    doctype: Option<DocType>,
}

impl XhtmlSerializer {
    pub fn new() -> Self {
        XhtmlSerializer::default()
    }

    pub fn with_doctype(doctype: DocType) -> Self {
        XhtmlSerializer {
            doctype: Some(doctype),
        }
    }

    pub fn serialize<I>(&self, stream: I) -> MarkupText<I::IntoIter>
    where
        I: IntoIterator<Item = Event>,
    {
        MarkupText::new(stream.into_iter(), self.doctype.clone(), Flavor::Xhtml)
    }

    pub fn to_string<I>(&self, stream: I) -> String
    where
        I: IntoIterator<Item = Event>,
    {
        self.serialize(stream).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Xml,
    Xhtml,
}

/// The streaming serialization state shared by the XML-ish serializers.
pub struct MarkupText<I: Iterator<Item = Event>> {
    stream: Pushback<I>,
    preamble: Option<DocType>,
    have_doctype: bool,
    ns: NamespaceMap,
    // xmlns declarations waiting for the next start tag
    pending_ns: Vec<(String, String)>,
    flavor: Flavor,
}

impl<I: Iterator<Item = Event>> MarkupText<I> {
    fn new(stream: I, doctype: Option<DocType>, flavor: Flavor) -> Self {
        MarkupText {
            stream: Pushback::new(stream),
            preamble: doctype,
            have_doctype: false,
            ns: NamespaceMap::new(),
            pending_ns: Vec::new(),
            flavor,
        }
    }

    /// Resolves the serialized form of a qualified name; an element in an
    /// unbound namespace gets an `xmlns` declaration of its own.
    fn qualify(&mut self, name: &QName, declare: bool) -> String {
        let Some(uri) = &name.namespace else {
            return name.localname.clone();
        };
        match self.ns.prefix_for(uri) {
            Some("") => name.localname.clone(),
            Some(prefix) => format!("{}:{}", prefix, name.localname),
            None => {
                if declare {
                    self.pending_ns.push(("xmlns".to_string(), uri.clone()));
                }
                name.localname.clone()
            }
        }
    }

    fn start_tag(&mut self, name: &QName, attrs: &weft_core::Attributes) -> String {
        let mut tag = String::from("<");
        tag.push_str(&self.qualify(name, true));
        for (attr, value) in attrs.iter() {
            let attr_name = self.qualify(attr, false);
            tag.push_str(&format!(" {}=\"{}\"", attr_name, escape(value, true)));
        }
        for (decl, uri) in self.pending_ns.drain(..) {
            tag.push_str(&format!(" {}=\"{}\"", decl, escape(&uri, true)));
        }
        tag
    }

    /// Whether a start tag may collapse with its immediately following end
    /// tag.
    fn collapses(&self, name: &QName) -> bool {
        match self.flavor {
            Flavor::Xml => true,
            Flavor::Xhtml => {
                is_void_element(&name.localname)
                    && name
                        .namespace
                        .as_deref()
                        .map_or(true, |uri| uri == XHTML_NAMESPACE)
            }
        }
    }
}

impl<I: Iterator<Item = Event>> Iterator for MarkupText<I> {
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

                Event::Prolog {
                    version, encoding, ..
                } => {
                    let mut decl = format!("<?xml version=\"{version}\"");
                    if let Some(encoding) = encoding {
                        decl.push_str(&format!(" encoding=\"{encoding}\""));
                    }
                    decl.push_str("?>\n");
                    return Some(decl);
                }

                Event::StartNs { prefix, uri, .. } => {
                    if self.ns.bind(&prefix, &uri) {
                        let decl = if prefix.is_empty() {
                            "xmlns".to_string()
                        } else {
                            format!("xmlns:{prefix}")
                        };
                        self.pending_ns.push((decl, uri));
                    }
                }

                Event::EndNs { prefix, .. } => self.ns.unbind(&prefix),

                Event::Start { name, attrs, .. } => {
                    let mut tag = self.start_tag(&name, &attrs);
                    let mut collapsed = false;
                    if self.collapses(&name) {
                        match self.stream.next() {
                            Some(Event::End { .. }) => {
                                tag.push_str(match self.flavor {
                                    Flavor::Xml => "/>",
                                    Flavor::Xhtml => " />",
                                });
                                collapsed = true;
                            }
                            Some(other) => self.stream.pushback(other),
                            None => {}
                        }
                    }
                    if !collapsed {
                        tag.push('>');
                    }
                    return Some(tag);
                }

                Event::End { name, .. } => {
                    let tagname = self.qualify(&name, false);
                    return Some(format!("</{tagname}>"));
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
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_input::XmlParser;

    fn roundtrip(source: &str) -> String {
        let events = XmlParser::new(source, None).into_events().unwrap();
        XmlSerializer::new().to_string(events)
    }

    #[test]
    fn test_empty_element_collapses() {
        assert_eq!(roundtrip("<root><elem></elem></root>"), "<root><elem/></root>");
        assert_eq!(roundtrip("<root/>"), "<root/>");
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(roundtrip("<p>1 &lt; 2 &amp; 3</p>"), "<p>1 &lt; 2 &amp; 3</p>");
    }

    #[test]
    fn test_attribute_quoting() {
        assert_eq!(
            roundtrip("<p title=\"say &#34;hi&#34;\"/>"),
            "<p title=\"say &#34;hi&#34;\"/>"
        );
    }

    #[test]
    fn test_namespace_declarations() {
        assert_eq!(
            roundtrip("<div xmlns:x=\"http://example.org/\"><x:b>a</x:b></div>"),
            "<div xmlns:x=\"http://example.org/\"><x:b>a</x:b></div>"
        );
        assert_eq!(
            roundtrip("<div xmlns=\"http://example.org/\"><b/></div>"),
            "<div xmlns=\"http://example.org/\"><b/></div>"
        );
    }

    #[test]
    fn test_doctype_emitted_once() {
        let events = XmlParser::new("<html/>", None).into_events().unwrap();
        let out = XmlSerializer::with_doctype(DocType::xhtml_strict()).to_string(events);
        assert_eq!(
            out,
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \
             \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n<html/>"
        );
    }

    #[test]
    fn test_comment_and_pi_pass_through() {
        assert_eq!(
            roundtrip("<root><!-- note --><?php echo ?></root>"),
            "<root><!-- note --><?php echo ?></root>"
        );
    }

    #[test]
    fn test_xhtml_collapses_only_void_elements() {
        let events = XmlParser::new("<div><br/><p></p></div>", None)
            .into_events()
            .unwrap();
        let out = XhtmlSerializer::new().to_string(events);
        assert_eq!(out, "<div><br /><p></p></div>");
    }
}
