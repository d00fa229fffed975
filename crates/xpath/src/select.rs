//! Lazy selection of matching events from a stream.

use std::collections::VecDeque;

use weft_core::Event;

use crate::tester::{Hit, Tester};

/// An adapter that yields the events matched by a path: complete sub-trees
/// for element results, synthesized events for attribute/text results.
///
/// Matches are produced in document order. While a matched sub-tree is being
/// replayed the tester keeps being driven so its depth bookkeeping stays
/// consistent with the stream.
pub struct Select<I> {
    tester: Tester,
    stream: I,
    pending: VecDeque<Event>,
}

impl<I> Select<I>
where
    I: Iterator<Item = Event>,
{
    pub(crate) fn new(tester: Tester, stream: I) -> Self {
        Select {
            tester,
            stream,
            pending: VecDeque::new(),
        }
    }
}

impl<I> Iterator for Select<I>
where
    I: Iterator<Item = Event>,
{
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            let event = self.stream.next()?;
            match self.tester.test(&event) {
                Some(Hit::Subtree) => {
                    // Buffer the rest of the sub-tree so it is emitted intact.
                    let mut depth = 1usize;
                    while depth > 0 {
                        let Some(inner) = self.stream.next() else {
                            break;
                        };
                        if inner.is_start() {
                            depth += 1;
                        } else if inner.is_end() {
                            depth -= 1;
                        }
                        self.tester.test(&inner);
                        self.pending.push_back(inner);
                    }
                    return Some(event);
                }
                Some(Hit::Event(synthesized)) => return Some(synthesized),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Path;
    use weft_core::Event;
    use weft_input::XmlParser;

    fn select(path: &str, source: &str) -> Vec<String> {
        let events = XmlParser::new(source, None).into_events().unwrap();
        Path::new(path)
            .unwrap()
            .select(events)
            .map(|event| match event {
                Event::Start { name, attrs, .. } => {
                    let attrs: Vec<_> = attrs
                        .iter()
                        .map(|(k, v)| format!(" {}=\"{}\"", k.localname, v))
                        .collect();
                    format!("<{}{}>", name.localname, attrs.join(""))
                }
                Event::End { name, .. } => format!("</{}>", name.localname),
                Event::Text { value, .. } => value,
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_select_root_element() {
        assert_eq!(select("root", "<root/>"), ["<root>", "</root>"]);
        assert_eq!(select("//root", "<root/>"), ["<root>", "</root>"]);
        assert_eq!(select("*", "<root/>"), ["<root>", "</root>"]);
    }

    #[test]
    fn test_select_attribute_value() {
        assert!(select("@foo", "<root/>").is_empty());
        assert_eq!(select("@foo", "<root foo=\"bar\"/>"), ["bar"]);
    }

    #[test]
    fn test_select_children() {
        assert_eq!(
            select("root/*", "<root><foo/><bar/></root>"),
            ["<foo>", "</foo>", "<bar>", "</bar>"]
        );
        assert_eq!(
            select("root/bar", "<root><foo/><bar/></root>"),
            ["<bar>", "</bar>"]
        );
        assert!(select("root/baz", "<root><foo/><bar/></root>").is_empty());
    }

    #[test]
    fn test_select_text() {
        assert_eq!(
            select("item/text()", "<root><item>Foo</item></root>"),
            ["Foo"]
        );
        assert_eq!(
            select("item/text()", "<root><item>Foo</item><item>Bar</item></root>"),
            ["Foo", "Bar"]
        );
    }

    #[test]
    fn test_first_step_matches_at_depth() {
        assert_eq!(
            select("foo/bar", "<root><foo><bar/></foo></root>"),
            ["<bar>", "</bar>"]
        );
    }

    #[test]
    fn test_child_step_skips_deep_matches() {
        assert!(select("root/bar", "<root><foo><bar/></foo></root>").is_empty());
        assert_eq!(
            select(
                "root/bar",
                "<root><foo><bar id=\"1\"/></foo><bar id=\"2\"/></root>"
            ),
            ["<bar id=\"2\">", "</bar>"]
        );
    }

    #[test]
    fn test_descendants_in_document_order() {
        assert_eq!(
            select(
                "root//bar",
                "<root><foo><bar id=\"1\"/></foo><bar id=\"2\"/></root>"
            ),
            ["<bar id=\"1\">", "</bar>", "<bar id=\"2\">", "</bar>"]
        );
    }

    #[test]
    fn test_wildcard_then_child() {
        assert_eq!(
            select("root/*/bar", "<root><foo><bar/></foo></root>"),
            ["<bar>", "</bar>"]
        );
    }

    #[test]
    fn test_attribute_predicates() {
        let doc = "<root><item/><item important=\"very\"/></root>";
        assert_eq!(
            select("root/item[@important]", doc),
            ["<item important=\"very\">", "</item>"]
        );
        assert_eq!(
            select("root/item[@important='very']", doc),
            ["<item important=\"very\">", "</item>"]
        );

        let other = "<root><item/><item important=\"notso\"/></root>";
        assert!(select("root/item[@important='very']", other).is_empty());
        assert_eq!(
            select("root/item[@important!='very']", other),
            ["<item>", "</item>", "<item important=\"notso\">", "</item>"]
        );
    }

    #[test]
    fn test_select_whole_subtree() {
        assert_eq!(
            select("foo", "<root><foo><bar>baz</bar></foo></root>"),
            ["<foo>", "<bar>", "baz", "</bar>", "</foo>"]
        );
    }
}
