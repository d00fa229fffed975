//! The stateful per-event path tester.
//!
//! A tester is driven with every event of a stream, in order. It keeps a
//! stack of cursors into the step list: entering an element pushes the
//! cursor the sub-tree should continue from, leaving it pops back to the
//! cursor of the enclosing level. A failed non-closure step walks back to
//! the nearest `//` step so descendants can re-anchor there.

use std::sync::Arc;

use weft_core::{Event, QName};

use crate::ast::{NodeTest, PredExpr, PredValue, Step};

/// A positive test result.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    /// The complete sub-tree rooted at the current start event matches.
    Subtree,
    /// A synthesized event to emit in place (attribute values, text and
    /// similar non-element results).
    Event(Event),
}

/// The stateful predicate compiled from a [`crate::Path`].
#[derive(Debug, Clone)]
pub struct Tester {
    steps: Arc<Vec<Step>>,
    ignore_context: bool,
    // cursor per open nesting level; `None` marks a sub-tree that can no
    // longer match
    stack: Vec<Option<usize>>,
}

impl Tester {
    pub(crate) fn new(steps: Arc<Vec<Step>>, ignore_context: bool) -> Self {
        Tester {
            steps,
            ignore_context,
            stack: vec![Some(0)],
        }
    }

    fn is_closure(&self, idx: usize) -> bool {
        self.steps[idx].closure || (idx == 0 && self.ignore_context)
    }

    /// Feeds one event; returns a positive result only when the final step
    /// matched.
    pub fn test(&mut self, event: &Event) -> Option<Hit> {
        if event.is_end() {
            self.stack.pop();
            return None;
        }

        let cursor = *self.stack.last()?;

        if event.is_start() {
            let (hit, next) = match cursor {
                Some(c) => self.advance(c, event),
                None => (None, None),
            };
            self.stack.push(next);
            return hit;
        }

        // Text, comments and processing instructions do not nest; they can
        // only conclude the path or move the cursor along.
        let c = cursor?;
        let step = &self.steps[c];
        if let Some(hit) = step_hit(step, event) {
            if c + 1 == self.steps.len() {
                return Some(hit);
            }
            if let Some(frame) = self.stack.last_mut() {
                *frame = Some(c + 1);
            }
        }
        None
    }

    /// Decides the result for a start event at cursor `c`, and the cursor
    /// its sub-tree continues from.
    fn advance(&self, c: usize, event: &Event) -> (Option<Hit>, Option<usize>) {
        if let Some(hit) = step_hit(&self.steps[c], event) {
            if c + 1 == self.steps.len() {
                return (Some(hit), Some(c));
            }
            return (None, Some(c + 1));
        }

        if self.is_closure(c) {
            // A descendant step just keeps waiting at this depth.
            return (None, Some(c));
        }

        // Walk back to the nearest closure step and retest there.
        let mut idx = c;
        while idx > 0 {
            idx -= 1;
            if self.is_closure(idx) {
                if step_hit(&self.steps[idx], event).is_some() {
                    return (None, Some(idx + 1));
                }
                return (None, Some(idx));
            }
        }
        (None, None)
    }
}

/// Tests one step (node test plus predicates) against an event, yielding
/// what a final-step match would emit.
fn step_hit(step: &Step, event: &Event) -> Option<Hit> {
    let hit = node_test_hit(&step.test, event)?;
    if step.predicates.iter().all(|p| eval_pred(p, event)) {
        Some(hit)
    } else {
        None
    }
}

fn node_test_hit(test: &NodeTest, event: &Event) -> Option<Hit> {
    match (test, event) {
        (NodeTest::Element(name), Event::Start { name: qname, .. }) => {
            (qname.localname == *name).then_some(Hit::Subtree)
        }
        (NodeTest::AnyElement, Event::Start { .. }) => Some(Hit::Subtree),
        (NodeTest::Attribute(name), Event::Start { attrs, pos, .. }) => attrs
            .get(&QName::new(name.clone()))
            .map(|value| Hit::Event(Event::text(value, pos.clone()))),
        (NodeTest::AnyAttribute, Event::Start { attrs, pos, .. }) => {
            let text: String = attrs.iter().map(|(_, value)| value).collect();
            if text.is_empty() {
                None
            } else {
                Some(Hit::Event(Event::text(text, pos.clone())))
            }
        }
        (NodeTest::Text, Event::Text { .. }) => Some(Hit::Event(event.clone())),
        (NodeTest::Comment, Event::Comment { .. }) => Some(Hit::Event(event.clone())),
        (NodeTest::Pi(target), Event::Pi { target: actual, .. }) => match target {
            Some(wanted) if wanted != actual => None,
            _ => Some(Hit::Event(event.clone())),
        },
        (NodeTest::Node | NodeTest::CurrentNode, Event::Start { .. }) => Some(Hit::Subtree),
        (NodeTest::Node | NodeTest::CurrentNode, Event::Text { .. })
        | (NodeTest::Node | NodeTest::CurrentNode, Event::Comment { .. })
        | (NodeTest::Node | NodeTest::CurrentNode, Event::Pi { .. }) => {
            Some(Hit::Event(event.clone()))
        }
        _ => None,
    }
}

fn eval_pred(expr: &PredExpr, event: &Event) -> bool {
    match expr {
        PredExpr::Or(a, b) => eval_pred(a, event) || eval_pred(b, event),
        PredExpr::And(a, b) => eval_pred(a, event) && eval_pred(b, event),
        PredExpr::Not(inner) => !eval_pred(inner, event),
        PredExpr::Eq(a, b) => eval_value(a, event) == eval_value(b, event),
        PredExpr::Neq(a, b) => eval_value(a, event) != eval_value(b, event),
        PredExpr::Value(v) => eval_value(v, event).is_some(),
    }
}

fn eval_value(value: &PredValue, event: &Event) -> Option<String> {
    match value {
        PredValue::Literal(s) => Some(s.clone()),
        PredValue::Attribute(name) => match event {
            Event::Start { attrs, .. } => attrs.get(&QName::new(name.clone())).map(str::to_string),
            _ => None,
        },
        PredValue::Name => match event {
            Event::Start { name, .. } => Some(name.to_string()),
            _ => None,
        },
        PredValue::LocalName => match event {
            Event::Start { name, .. } => Some(name.localname.clone()),
            _ => None,
        },
        PredValue::NamespaceUri => match event {
            Event::Start { name, .. } => {
                Some(name.namespace.clone().unwrap_or_default())
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Path;
    use weft_core::{Attributes, Position};

    fn start(name: &str, attrs: &[(&str, &str)]) -> Event {
        Event::Start {
            name: QName::new(name),
            attrs: attrs
                .iter()
                .map(|(k, v)| (QName::new(*k), v.to_string()))
                .collect(),
            pos: Position::unknown(),
        }
    }

    fn end(name: &str) -> Event {
        Event::End {
            name: QName::new(name),
            pos: Position::unknown(),
        }
    }

    #[test]
    fn test_single_step_match() {
        let path = Path::new("elem").unwrap();
        let mut tester = path.test(true);
        assert_eq!(tester.test(&start("doc", &[])), None);
        assert_eq!(tester.test(&start("elem", &[])), Some(Hit::Subtree));
    }

    #[test]
    fn test_strict_context_does_not_descend() {
        let path = Path::new("elem").unwrap();
        let mut tester = path.test(false);
        assert_eq!(tester.test(&start("doc", &[])), None);
        // nested inside <doc>, so out of reach for a strict child step
        assert_eq!(tester.test(&start("elem", &[])), None);
        assert_eq!(tester.test(&end("elem")), None);
        assert_eq!(tester.test(&end("doc")), None);
        // a new top-level <elem> matches
        assert_eq!(tester.test(&start("elem", &[])), Some(Hit::Subtree));
    }

    #[test]
    fn test_child_step_requires_direct_parent() {
        let path = Path::new("root/item").unwrap();
        let mut tester = path.test(true);
        tester.test(&start("root", &[]));
        tester.test(&start("foo", &[]));
        // item below foo is not a direct child of root
        assert_eq!(tester.test(&start("item", &[])), None);
        tester.test(&end("item"));
        tester.test(&end("foo"));
        assert_eq!(tester.test(&start("item", &[])), Some(Hit::Subtree));
    }

    #[test]
    fn test_descendant_step_matches_at_any_depth() {
        let path = Path::new("root//item").unwrap();
        let mut tester = path.test(true);
        tester.test(&start("root", &[]));
        tester.test(&start("foo", &[]));
        assert_eq!(tester.test(&start("item", &[])), Some(Hit::Subtree));
    }

    #[test]
    fn test_attribute_result_is_synthesized_text() {
        let path = Path::new("@foo").unwrap();
        let mut tester = path.test(true);
        match tester.test(&start("root", &[("foo", "bar")])) {
            Some(Hit::Event(Event::Text { value, .. })) => assert_eq!(value, "bar"),
            other => panic!("expected synthesized text, got {other:?}"),
        }
    }

    #[test]
    fn test_attribute_predicate_inequality() {
        // an element without the attribute still satisfies `!=`
        let path = Path::new("item[@important!='very']").unwrap();
        let mut tester = path.test(true);
        assert_eq!(tester.test(&start("item", &[])), Some(Hit::Subtree));
        tester.test(&end("item"));
        assert_eq!(
            tester.test(&start("item", &[("important", "very")])),
            None
        );
    }

    #[test]
    fn test_predicate_functions() {
        let path = Path::new("*[local-name()='div']").unwrap();
        let mut tester = path.test(true);
        assert_eq!(tester.test(&start("span", &[])), None);
        tester.test(&end("span"));
        assert_eq!(tester.test(&start("div", &[])), Some(Hit::Subtree));
    }

    #[test]
    fn test_not_inverts() {
        let path = Path::new("item[not(@skip)]").unwrap();
        let mut tester = path.test(true);
        assert_eq!(tester.test(&start("item", &[("skip", "1")])), None);
        tester.test(&end("item"));
        assert_eq!(tester.test(&start("item", &[])), Some(Hit::Subtree));
    }

    #[test]
    fn test_text_node_result() {
        let path = Path::new("item/text()").unwrap();
        let mut tester = path.test(true);
        tester.test(&start("item", &[]));
        let text = Event::text("Foo", Position::unknown());
        assert_eq!(tester.test(&text), Some(Hit::Event(text.clone())));
    }
}
