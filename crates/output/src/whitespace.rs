//! The whitespace filter that runs ahead of serialization.

use weft_core::{escape, Event, Position};

/// Coalesces adjacent text events, trims trailing spaces before line
/// breaks and collapses runs of blank lines.
///
/// Coalesced text is emitted pre-escaped, so mixing raw and plain text
/// pieces is safe.
pub struct WhitespaceFilter<I> {
    stream: I,
    // text pieces waiting to be flushed: (content, already escaped?)
    textbuf: Vec<(String, bool)>,
    text_pos: Position,
    // the non-text event that interrupted the run
    held: Option<Event>,
    done: bool,
}

impl<I> WhitespaceFilter<I>
where
    I: Iterator<Item = Event>,
{
    pub fn new(stream: I) -> Self {
        WhitespaceFilter {
            stream,
            textbuf: Vec::new(),
            text_pos: Position::unknown(),
            held: None,
            done: false,
        }
    }

    fn flush(&mut self) -> Option<Event> {
        if self.textbuf.is_empty() {
            return None;
        }
        let mut combined = String::new();
        for (piece, raw) in self.textbuf.drain(..) {
            if raw {
                combined.push_str(&piece);
            } else {
                combined.push_str(&escape(&piece, false));
            }
        }
        Some(Event::raw_text(
            collapse(&combined),
            std::mem::take(&mut self.text_pos),
        ))
    }
}

impl<I> Iterator for WhitespaceFilter<I>
where
    I: Iterator<Item = Event>,
{
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if let Some(event) = self.held.take() {
            return Some(event);
        }
        loop {
            match self.stream.next() {
                Some(Event::Text { value, raw, pos }) => {
                    if self.textbuf.is_empty() {
                        self.text_pos = pos;
                    }
                    self.textbuf.push((value, raw));
                }
                Some(other) => match self.flush() {
                    Some(text) => {
                        self.held = Some(other);
                        return Some(text);
                    }
                    None => return Some(other),
                },
                None => {
                    if self.done {
                        return None;
                    }
                    self.done = true;
                    return self.flush();
                }
            }
        }
    }
}

/// Removes spaces and tabs that precede a newline and collapses two or
/// more consecutive newlines into one.
fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut spaces = String::new();
    let mut newlines = 0usize;
    for ch in text.chars() {
        match ch {
            ' ' | '\t' => spaces.push(ch),
            '\n' => {
                spaces.clear();
                newlines += 1;
            }
            _ => {
                if newlines > 0 {
                    out.push('\n');
                    newlines = 0;
                }
                out.push_str(&spaces);
                spaces.clear();
                out.push(ch);
            }
        }
    }
    if newlines > 0 {
        out.push('\n');
    }
    out.push_str(&spaces);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::QName;

    fn text_events(pieces: &[&str]) -> Vec<Event> {
        pieces
            .iter()
            .map(|piece| Event::text(*piece, Position::unknown()))
            .collect()
    }

    fn filtered(events: Vec<Event>) -> Vec<Event> {
        WhitespaceFilter::new(events.into_iter()).collect()
    }

    #[test]
    fn test_adjacent_text_is_coalesced() {
        let out = filtered(text_events(&["a", "b", "c"]));
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Event::Text { value, raw: true, .. } if value == "abc"));
    }

    #[test]
    fn test_trailing_space_before_newline_is_trimmed() {
        let out = filtered(text_events(&["a  \t\n", "b"]));
        assert!(matches!(&out[0], Event::Text { value, .. } if value == "a\nb"));
    }

    #[test]
    fn test_blank_lines_collapse() {
        let out = filtered(text_events(&["a\n\n\nb", "\n\nc"]));
        assert!(matches!(&out[0], Event::Text { value, .. } if value == "a\nb\nc"));
    }

    #[test]
    fn test_escaping_happens_in_filter() {
        let out = filtered(text_events(&["1 < 2"]));
        assert!(matches!(&out[0], Event::Text { value, raw: true, .. } if value == "1 &lt; 2"));
    }

    #[test]
    fn test_raw_pieces_stay_raw() {
        let events = vec![
            Event::raw_text("&nbsp;", Position::unknown()),
            Event::text("<", Position::unknown()),
        ];
        let out = filtered(events);
        assert!(matches!(&out[0], Event::Text { value, .. } if value == "&nbsp;&lt;"));
    }

    #[test]
    fn test_non_text_events_interleave() {
        let events = vec![
            Event::text("a ", Position::unknown()),
            Event::Start {
                name: QName::new("b"),
                attrs: Default::default(),
                pos: Position::unknown(),
            },
            Event::text("c", Position::unknown()),
            Event::End {
                name: QName::new("b"),
                pos: Position::unknown(),
            },
        ];
        let out = filtered(events);
        assert_eq!(out.len(), 4);
        assert!(matches!(&out[0], Event::Text { value, .. } if value == "a "));
        assert!(matches!(&out[1], Event::Start { .. }));
    }
}
