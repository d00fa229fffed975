//! Strict, namespace-aware XML parsing on top of `quick-xml`.

use std::collections::{HashMap, VecDeque};

use quick_xml::events::Event as RawEvent;
use quick_xml::Reader;

use weft_core::{Attributes, Event, Position, QName};

use crate::cursor::SourceCursor;
use crate::entities;
use crate::error::ParseError;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A pull parser that turns XML source text into a stream of events.
///
/// Namespace declarations are consumed and turned into `StartNs`/`EndNs`
/// events surrounding the element that carries them; element and attribute
/// names are resolved to qualified names. Entity references that are not
/// XML builtins are looked up in the HTML entity table.
pub struct XmlParser<'a> {
    reader: Reader<&'a [u8]>,
    source: &'a str,
    cursor: SourceCursor,
    queue: VecDeque<Event>,
    // prefix -> stack of URIs, innermost last
    bindings: HashMap<String, Vec<String>>,
    // per open element: the prefixes it bound
    scopes: Vec<Vec<String>>,
    depth: usize,
    done: bool,
}

impl<'a> XmlParser<'a> {
    pub fn new(source: &'a str, filename: Option<&str>) -> Self {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        XmlParser {
            reader,
            source,
            cursor: SourceCursor::new(filename),
            queue: VecDeque::new(),
            bindings: HashMap::new(),
            scopes: Vec::new(),
            depth: 0,
            done: false,
        }
    }

    /// Parses the whole document eagerly.
    pub fn into_events(self) -> Result<Vec<Event>, ParseError> {
        self.collect()
    }

    fn position_at(&mut self, offset: usize) -> Position {
        self.cursor.position_at(self.source, offset)
    }

    fn resolve(&self, raw: &str, is_attribute: bool, pos: &Position) -> Result<QName, ParseError> {
        match raw.split_once(':') {
            Some(("xml", local)) => Ok(QName::qualified(XML_NAMESPACE, local)),
            Some((prefix, local)) => match self.bindings.get(prefix).and_then(|uris| uris.last()) {
                Some(uri) if !uri.is_empty() => Ok(QName::qualified(uri.clone(), local)),
                _ => Err(ParseError::UnboundPrefix {
                    prefix: prefix.to_string(),
                    pos: pos.clone(),
                }),
            },
            None => {
                // Unprefixed attributes never take the default namespace.
                if !is_attribute {
                    if let Some(uri) = self.bindings.get("").and_then(|uris| uris.last()) {
                        if !uri.is_empty() {
                            return Ok(QName::qualified(uri.clone(), raw));
                        }
                    }
                }
                Ok(QName::new(raw))
            }
        }
    }

    fn handle_start(
        &mut self,
        tag: &quick_xml::events::BytesStart<'_>,
        pos: Position,
    ) -> Result<(), ParseError> {
        let mut bound = Vec::new();
        let mut plain = Vec::new();

        for attr in tag.attributes() {
            let attr = attr.map_err(|e| ParseError::malformed(e.to_string(), pos.clone()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value_with(|name| entities::lookup(name))
                .map_err(|e| ParseError::malformed(e.to_string(), pos.clone()))?
                .into_owned();

            if key == "xmlns" {
                self.queue.push_back(Event::StartNs {
                    prefix: String::new(),
                    uri: value.clone(),
                    pos: pos.clone(),
                });
                self.bindings.entry(String::new()).or_default().push(value);
                bound.push(String::new());
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.queue.push_back(Event::StartNs {
                    prefix: prefix.to_string(),
                    uri: value.clone(),
                    pos: pos.clone(),
                });
                self.bindings
                    .entry(prefix.to_string())
                    .or_default()
                    .push(value);
                bound.push(prefix.to_string());
            } else {
                plain.push((key, value));
            }
        }

        let raw_name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let name = self.resolve(&raw_name, false, &pos)?;
        let mut attrs = Attributes::new();
        for (key, value) in plain {
            attrs.push(self.resolve(&key, true, &pos)?, value);
        }

        self.scopes.push(bound);
        self.depth += 1;
        self.queue.push_back(Event::Start { name, attrs, pos });
        Ok(())
    }

    fn handle_end(
        &mut self,
        tag: &quick_xml::events::BytesEnd<'_>,
        pos: Position,
    ) -> Result<(), ParseError> {
        let raw_name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let name = self.resolve(&raw_name, false, &pos)?;
        self.queue.push_back(Event::End {
            name,
            pos: pos.clone(),
        });
        self.depth = self.depth.saturating_sub(1);

        if let Some(bound) = self.scopes.pop() {
            for prefix in bound.into_iter().rev() {
                if let Some(uris) = self.bindings.get_mut(&prefix) {
                    uris.pop();
                }
                self.queue.push_back(Event::EndNs {
                    prefix,
                    pos: pos.clone(),
                });
            }
        }
        Ok(())
    }

    fn handle_text(&mut self, value: String, pos: Position) -> Result<(), ParseError> {
        if self.depth == 0 {
            if value.chars().all(char::is_whitespace) {
                return Ok(());
            }
            return Err(ParseError::TrailingContent { pos });
        }
        self.queue.push_back(Event::text(value, pos));
        Ok(())
    }

    fn handle_reference(
        &mut self,
        reference: &quick_xml::events::BytesRef<'_>,
        pos: Position,
    ) -> Result<(), ParseError> {
        if let Ok(Some(ch)) = reference.resolve_char_ref() {
            return self.handle_text(ch.to_string(), pos);
        }
        let name = reference
            .decode()
            .map_err(|e| ParseError::malformed(e.to_string(), pos.clone()))?
            .into_owned();
        let replacement = match name.as_str() {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "apos" => "'",
            other => entities::lookup(other)
                .ok_or(ParseError::UndefinedEntity { name: name.clone(), pos: pos.clone() })?,
        };
        self.handle_text(replacement.to_string(), pos)
    }

    fn handle_decl(
        &mut self,
        decl: &quick_xml::events::BytesDecl<'_>,
        pos: Position,
    ) -> Result<(), ParseError> {
        let version = decl
            .version()
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .unwrap_or_else(|_| "1.0".to_string());
        let encoding = decl
            .encoding()
            .and_then(|e| e.ok())
            .map(|e| String::from_utf8_lossy(&e).into_owned());
        let standalone = decl
            .standalone()
            .and_then(|s| s.ok())
            .map(|s| s.as_ref() == "yes".as_bytes());
        self.queue.push_back(Event::Prolog {
            version,
            encoding,
            standalone,
            pos,
        });
        Ok(())
    }

    fn handle_doctype(&mut self, text: &str, pos: Position) {
        let (name, pubid, sysid) = parse_doctype(text);
        self.queue.push_back(Event::Doctype {
            name,
            pubid,
            sysid,
            pos,
        });
    }
}

impl Iterator for XmlParser<'_> {
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
                    if self.depth > 0 {
                        return Some(Err(ParseError::malformed(
                            "unexpected end of document inside an element",
                            pos,
                        )));
                    }
                    return None;
                }
                Ok(RawEvent::Start(tag)) => self.handle_start(&tag, pos),
                Ok(RawEvent::Empty(tag)) => {
                    // expand_empty_elements is set, but be tolerant anyway
                    let end = tag.to_end().into_owned();
                    self.handle_start(&tag, pos.clone())
                        .and_then(|_| self.handle_end(&end, pos))
                }
                Ok(RawEvent::End(tag)) => self.handle_end(&tag, pos),
                Ok(RawEvent::Text(text)) => match text.decode() {
                    Ok(value) => self.handle_text(value.into_owned(), pos),
                    Err(e) => Err(ParseError::malformed(e.to_string(), pos)),
                },
                Ok(RawEvent::CData(data)) => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    self.handle_text(value, pos)
                }
                Ok(RawEvent::GeneralRef(reference)) => self.handle_reference(&reference, pos),
                Ok(RawEvent::Comment(text)) => {
                    let value = String::from_utf8_lossy(&text).into_owned();
                    self.queue.push_back(Event::Comment { text: value, pos });
                    Ok(())
                }
                Ok(RawEvent::Decl(decl)) => self.handle_decl(&decl, pos),
                Ok(RawEvent::PI(pi)) => {
                    let target = String::from_utf8_lossy(pi.target()).into_owned();
                    let data = String::from_utf8_lossy(pi.content()).trim().to_string();
                    self.queue.push_back(Event::Pi { target, data, pos });
                    Ok(())
                }
                Ok(RawEvent::DocType(text)) => {
                    let value = String::from_utf8_lossy(&text).into_owned();
                    self.handle_doctype(value.trim(), pos);
                    Ok(())
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

/// Splits a DOCTYPE declaration body into `(name, pubid, sysid)`.
pub(crate) fn parse_doctype(text: &str) -> (String, Option<String>, Option<String>) {
    let mut rest = text.trim();
    let name: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '[' && *c != '>')
        .collect();
    rest = rest[name.len()..].trim_start();

    let mut pubid = None;
    let mut sysid = None;
    if let Some(after) = rest.strip_prefix("PUBLIC") {
        let mut literals = quoted_literals(after);
        pubid = literals.next();
        sysid = literals.next();
    } else if let Some(after) = rest.strip_prefix("SYSTEM") {
        sysid = quoted_literals(after).next();
    }
    (name, pubid, sysid)
}

fn quoted_literals(text: &str) -> impl Iterator<Item = String> + '_ {
    let mut rest = text;
    std::iter::from_fn(move || {
        let start = rest.find(['"', '\''])?;
        let quote = rest.as_bytes()[start] as char;
        let tail = &rest[start + 1..];
        let end = tail.find(quote)?;
        let literal = tail[..end].to_string();
        rest = &tail[end + 1..];
        Some(literal)
    })
}
