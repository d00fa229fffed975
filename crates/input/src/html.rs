//! Tag-balancing HTML parsing with the same event interface as the XML
//! parser.

use std::collections::VecDeque;

use quick_xml::events::Event as RawEvent;
use quick_xml::Reader;

use weft_core::{Attributes, Event, Position, QName};

use crate::cursor::SourceCursor;
use crate::error::ParseError;

/// Elements that never have content; an end event is synthesized right
/// after their start event.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "frame", "hr", "img", "input", "isindex", "link",
    "meta", "param",
];

pub(crate) fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// A lenient HTML pull parser.
///
/// Tags are lower-cased, void elements are closed implicitly, misnested end
/// tags close the elements they skipped over, and any tags still open at the
/// end of input receive balancing end events. Entity references pass through
/// as pre-escaped text.
pub struct HtmlParser<'a> {
    reader: Reader<&'a [u8]>,
    source: &'a str,
    cursor: SourceCursor,
    queue: VecDeque<Event>,
    open: Vec<QName>,
    done: bool,
}

impl<'a> HtmlParser<'a> {
    pub fn new(source: &'a str, filename: Option<&str>) -> Self {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
        HtmlParser {
            reader,
            source,
            cursor: SourceCursor::new(filename),
            queue: VecDeque::new(),
            open: Vec::new(),
            done: false,
        }
    }

    /// Parses the whole document eagerly.
    pub fn into_events(self) -> Result<Vec<Event>, ParseError> {
        self.collect()
    }

    fn handle_start(
        &mut self,
        tag: &quick_xml::events::BytesStart<'_>,
        self_closing: bool,
        pos: Position,
    ) -> Result<(), ParseError> {
        let name = QName::new(String::from_utf8_lossy(tag.name().as_ref()).to_lowercase());
        let mut attrs = Attributes::new();
        for attr in tag.html_attributes() {
            let attr = attr.map_err(|e| ParseError::malformed(e.to_string(), pos.clone()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attrs.push(QName::new(key), value);
        }

        let void = is_void_element(&name.localname);
        self.queue.push_back(Event::Start {
            name: name.clone(),
            attrs,
            pos: pos.clone(),
        });
        if void || self_closing {
            self.queue.push_back(Event::End { name, pos });
        } else {
            self.open.push(name);
        }
        Ok(())
    }

    fn handle_end(&mut self, raw: &str, pos: Position) {
        let name = QName::new(raw.to_lowercase());
        if is_void_element(&name.localname) {
            return;
        }
        if !self.open.contains(&name) {
            // A stray end tag; there is nothing to balance against.
            return;
        }
        while let Some(open) = self.open.pop() {
            let matched = open == name;
            self.queue.push_back(Event::End {
                name: open,
                pos: pos.clone(),
            });
            if matched {
                break;
            }
        }
    }

    fn finish(&mut self, pos: Position) {
        if !self.open.is_empty() {
            log::debug!("balancing {} unclosed element(s) at end of input", self.open.len());
        }
        while let Some(open) = self.open.pop() {
            self.queue.push_back(Event::End {
                name: open,
                pos: pos.clone(),
            });
        }
    }
}

impl Iterator for HtmlParser<'_> {
    type Item = Result<Event, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }

            let offset = self.reader.buffer_position() as usize;
            let pos = self.position_at(offset);
            let outcome = match self.reader.read_event() {
                Ok(RawEvent::Eof) => {
                    self.done = true;
                    self.finish(pos);
                    continue;
                }
                Ok(RawEvent::Start(tag)) => self.handle_start(&tag, false, pos),
                Ok(RawEvent::Empty(tag)) => self.handle_start(&tag, true, pos),
                Ok(RawEvent::End(tag)) => {
                    let raw = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                    self.handle_end(&raw, pos);
                    Ok(())
                }
                Ok(RawEvent::Text(text)) => {
                    let value = match text.decode() {
                        Ok(value) => value.into_owned(),
                        Err(_) => String::from_utf8_lossy(&text).into_owned(),
                    };
                    self.queue.push_back(Event::text(value, pos));
                    Ok(())
                }
                Ok(RawEvent::CData(data)) => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    self.queue.push_back(Event::text(value, pos));
                    Ok(())
                }
                Ok(RawEvent::GeneralRef(reference)) => {
                    // Entity references are passed through pre-escaped, the
                    // way they were written.
                    match reference.decode() {
                        Ok(name) => {
                            self.queue
                                .push_back(Event::raw_text(format!("&{name};"), pos));
                            Ok(())
                        }
                        Err(e) => Err(ParseError::malformed(e.to_string(), pos)),
                    }
                }
                Ok(RawEvent::Comment(text)) => {
                    let value = String::from_utf8_lossy(&text).into_owned();
                    self.queue.push_back(Event::Comment { text: value, pos });
                    Ok(())
                }
                Ok(RawEvent::Decl(_)) => Ok(()),
                Ok(RawEvent::PI(pi)) => {
                    let target = String::from_utf8_lossy(pi.target()).into_owned();
                    let data = String::from_utf8_lossy(pi.content()).trim().to_string();
                    self.queue.push_back(Event::Pi { target, data, pos });
                    Ok(())
                }
                Ok(RawEvent::DocType(text)) => {
                    let value = String::from_utf8_lossy(&text).into_owned();
                    let (name, pubid, sysid) = super::xml::parse_doctype(value.trim());
                    self.queue.push_back(Event::Doctype {
                        name,
                        pubid,
                        sysid,
                        pos,
                    });
                    Ok(())
                }
                // Ill-formed markup is what this parser is for: balance
                // whatever is open and stop.
                Err(quick_xml::Error::IllFormed(_)) => {
                    self.done = true;
                    self.finish(pos);
                    continue;
                }
                Err(e) => Err(ParseError::malformed(e.to_string(), pos)),
            };

            if let Err(e) = outcome {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl HtmlParser<'_> {
    fn position_at(&mut self, offset: usize) -> Position {
        self.cursor.position_at(self.source, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(source: &str) -> Vec<Event> {
        HtmlParser::new(source, None).into_events().unwrap()
    }

    fn outline(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                Event::Start { name, .. } => format!("<{}>", name.localname),
                Event::End { name, .. } => format!("</{}>", name.localname),
                Event::Text { value, .. } => value.clone(),
                _ => String::from("?"),
            })
            .collect()
    }

    #[test]
    fn test_void_element_gets_implicit_end() {
        let evs = events("<div>a<br>b</div>");
        assert_eq!(
            outline(&evs),
            ["<div>", "a", "<br>", "</br>", "b", "</div>"]
        );
    }

    #[test]
    fn test_unclosed_tags_balanced_at_eof() {
        let evs = events("<div><p>text");
        assert_eq!(outline(&evs), ["<div>", "<p>", "text", "</p>", "</div>"]);
    }

    #[test]
    fn test_misnested_end_closes_intervening() {
        let evs = events("<div><b>x</div>");
        assert_eq!(outline(&evs), ["<div>", "<b>", "x", "</b>", "</div>"]);
    }

    #[test]
    fn test_names_are_lowercased() {
        let evs = events("<DIV CLASS='x'></DIV>");
        match &evs[0] {
            Event::Start { name, attrs, .. } => {
                assert_eq!(name.localname, "div");
                assert_eq!(attrs.get(&QName::new("class")), Some("x"));
            }
            other => panic!("expected start event, got {other:?}"),
        }
    }

    #[test]
    fn test_entity_reference_passes_through_raw() {
        let evs = events("<p>a&nbsp;b</p>");
        assert!(evs.iter().any(
            |e| matches!(e, Event::Text { value, raw, .. } if *raw && value == "&nbsp;")
        ));
    }
}
