//! Compiles the parsed event stream into a flat instruction list.
//!
//! Compilation consumes the directive namespace: namespace declarations
//! for it disappear, directive attributes are lifted off their elements,
//! directive elements select a directive by name, and every
//! directive-bearing element's event range collapses into a single `Sub`
//! instruction once its end tag is seen. Text and attribute values are
//! split into literal and expression parts along the way.

use std::collections::HashMap;
use std::sync::Arc;

use weft_core::{Event, Position, QName};
use weft_eval::Expression;
use weft_input::ParseError;

use crate::directives::Directive;
use crate::error::{TemplateError, TemplateSyntaxError};
use crate::instr::{Instr, Part, SubProgram};
use crate::NAMESPACE;

/// Compiles parser output into the instruction list of a template.
pub(crate) fn compile(
    events: impl Iterator<Item = Result<Event, ParseError>>,
) -> Result<Vec<Instr>, TemplateError> {
    let mut stream: Vec<Instr> = Vec::new();
    // directive-bearing open elements: (depth, name) -> lifted info
    let mut dirmap: HashMap<(usize, QName), (Vec<Directive>, usize, bool)> = HashMap::new();
    // prefixes currently bound to the directive namespace
    let mut ns_prefixes: HashMap<String, usize> = HashMap::new();
    let mut depth = 0usize;

    for event in events {
        match event? {
            Event::StartNs { prefix, uri, pos } => {
                if uri == NAMESPACE {
                    *ns_prefixes.entry(prefix).or_insert(0) += 1;
                } else {
                    stream.push(Instr::Emit(Event::StartNs { prefix, uri, pos }));
                }
            }

            Event::EndNs { prefix, pos } => match ns_prefixes.get_mut(&prefix) {
                Some(count) => {
                    *count -= 1;
                    if *count == 0 {
                        ns_prefixes.remove(&prefix);
                    }
                }
                None => stream.push(Instr::Emit(Event::EndNs { prefix, pos })),
            },

            Event::Start { name, attrs, pos } => {
                let mut directives: Vec<Directive> = Vec::new();
                let mut strip = false;

                if name.in_namespace(NAMESPACE) {
                    let argument = Directive::argument_attribute(&name.localname)
                        .and_then(|attr| attrs.get(&QName::new(attr)))
                        .unwrap_or("")
                        .to_string();
                    match Directive::from_attribute(&name.localname, &argument, &pos)? {
                        Some(directive) => directives.push(directive),
                        None => {
                            return Err(TemplateSyntaxError::bad_directive(&name, pos).into())
                        }
                    }
                    strip = true;
                }

                let mut plain_attrs: Vec<(QName, Vec<Part>)> = Vec::new();
                for (attr_name, value) in attrs {
                    if attr_name.in_namespace(NAMESPACE) {
                        match Directive::from_attribute(&attr_name.localname, &value, &pos)? {
                            Some(directive) => directives.push(directive),
                            None => {
                                return Err(
                                    TemplateSyntaxError::bad_directive(&attr_name, pos).into()
                                )
                            }
                        }
                    } else {
                        plain_attrs.push((attr_name, interpolate_attr(&value, &pos)?));
                    }
                }

                if !directives.is_empty() {
                    directives.sort_by_key(Directive::rank);
                    dirmap.insert((depth, name.clone()), (directives, stream.len(), strip));
                }

                stream.push(Instr::Start {
                    name,
                    attrs: plain_attrs,
                    pos,
                });
                depth += 1;
            }

            Event::End { name, pos } => {
                depth -= 1;
                stream.push(Instr::Emit(Event::End {
                    name: name.clone(),
                    pos: pos.clone(),
                }));

                // A directive-bearing element closes: collapse its event
                // range into a subprogram.
                if let Some((directives, start_offset, strip)) =
                    dirmap.remove(&(depth, name))
                {
                    let mut body: Vec<Instr> = stream.split_off(start_offset);
                    if strip {
                        body.remove(0);
                        body.pop();
                    }
                    stream.push(Instr::Sub(Arc::new(SubProgram {
                        directives,
                        body: Arc::new(body),
                        pos,
                    })));
                }
            }

            Event::Text { value, raw, pos } => {
                if raw {
                    stream.push(Instr::Emit(Event::raw_text(value, pos)));
                } else {
                    for part in interpolate(&value, &pos)? {
                        stream.push(match part {
                            Part::Text(text) => Instr::Emit(Event::text(text, pos.clone())),
                            Part::Expr(expr) => Instr::Expr(expr, pos.clone()),
                        });
                    }
                }
            }

            // Template comments start with '!' and are dropped.
            Event::Comment { text, .. } if text.starts_with('!') => {}

            other => stream.push(Instr::Emit(other)),
        }
    }

    Ok(stream)
}

/// Splits text into literal and `${…}`/`$name` expression parts. `$$`
/// yields a literal `$`.
pub(crate) fn interpolate(
    text: &str,
    pos: &Position,
) -> Result<Vec<Part>, TemplateSyntaxError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(offset) = rest.find('$') {
        literal.push_str(&rest[..offset]);
        rest = &rest[offset + 1..];

        match rest.chars().next() {
            Some('$') => {
                literal.push('$');
                rest = &rest[1..];
            }
            Some('{') => {
                let inner = &rest[1..];
                let end = matching_brace(inner).ok_or_else(|| {
                    TemplateSyntaxError::new(
                        format!("unterminated expression in \"{text}\""),
                        pos.clone(),
                    )
                })?;
                let source = &inner[..end];
                flush(&mut parts, &mut literal);
                parts.push(Part::Expr(Arc::new(compile_expr(source, pos)?)));
                rest = &inner[end + 1..];
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let end = name_path_end(rest);
                let source = &rest[..end];
                flush(&mut parts, &mut literal);
                parts.push(Part::Expr(Arc::new(compile_expr(source, pos)?)));
                rest = &rest[end..];
            }
            _ => literal.push('$'),
        }
    }
    literal.push_str(rest);
    flush(&mut parts, &mut literal);
    Ok(parts)
}

/// Like [`interpolate`], but an empty value still yields one empty literal
/// part so the attribute survives evaluation.
pub(crate) fn interpolate_attr(
    value: &str,
    pos: &Position,
) -> Result<Vec<Part>, TemplateSyntaxError> {
    let mut parts = interpolate(value, pos)?;
    if parts.is_empty() {
        parts.push(Part::Text(String::new()));
    }
    Ok(parts)
}

fn flush(parts: &mut Vec<Part>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(Part::Text(std::mem::take(literal)));
    }
}

fn compile_expr(source: &str, pos: &Position) -> Result<Expression, TemplateSyntaxError> {
    Expression::new(source, pos.clone())
        .map_err(|e| TemplateSyntaxError::from_expression(e, pos.clone()))
}

/// Finds the closing brace of a `${…}` expression, honoring nested braces
/// and string literals.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    for (idx, ch) in text.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// The extent of a `$name.path` short-form reference: an identifier
/// followed by dotted identifiers, never ending in a dot.
fn name_path_end(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut end = 0;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    loop {
        if end >= bytes.len() || bytes[end] != b'.' {
            break;
        }
        let mut next = end + 1;
        if next >= bytes.len() || !(bytes[next] as char).is_ascii_alphabetic() {
            break;
        }
        while next < bytes.len() && (bytes[next].is_ascii_alphanumeric() || bytes[next] == b'_')
        {
            next += 1;
        }
        end = next;
    }
    end
}
