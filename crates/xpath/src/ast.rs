//! The compiled form of a path expression.

use std::fmt;
use std::sync::Arc;

use crate::error::PathSyntaxError;
use crate::select::Select;
use crate::tester::Tester;

use weft_core::Event;

/// A compiled path expression.
///
/// Paths are immutable once compiled; testers created from the same path
/// share its step list.
#[derive(Debug, Clone)]
pub struct Path {
    source: String,
    steps: Arc<Vec<Step>>,
}

impl Path {
    /// Compiles a path expression.
    pub fn new(text: &str) -> Result<Path, PathSyntaxError> {
        let steps = crate::parser::parse(text)?;
        Ok(Path {
            source: text.to_string(),
            steps: Arc::new(steps),
        })
    }

    /// The expression the path was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn steps(&self) -> Arc<Vec<Step>> {
        Arc::clone(&self.steps)
    }

    /// Creates a stateful per-event tester.
    ///
    /// With `ignore_context` the first step may (re-)anchor at any depth
    /// instead of only matching direct children of the stream context; match
    /// templates and [`Path::select`] use that mode.
    pub fn test(&self, ignore_context: bool) -> Tester {
        Tester::new(self.steps(), ignore_context)
    }

    /// Returns a lazy adapter yielding the events matching this path:
    /// complete sub-trees for element tests, synthesized text events for
    /// attribute and text tests, in document order.
    pub fn select<I>(&self, stream: I) -> Select<I::IntoIter>
    where
        I: IntoIterator<Item = Event>,
    {
        Select::new(self.test(true), stream.into_iter())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One location step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Whether the step was introduced by `//` and may match at any depth.
    pub closure: bool,
    pub test: NodeTest,
    pub predicates: Vec<PredExpr>,
}

/// The node test of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// An element name test.
    Element(String),
    /// `*`
    AnyElement,
    /// `@name`
    Attribute(String),
    /// `@*`
    AnyAttribute,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()`, optionally with a target literal.
    Pi(Option<String>),
    /// `node()`
    Node,
    /// `.`
    CurrentNode,
}

/// A predicate expression inside `[ … ]`.
#[derive(Debug, Clone, PartialEq)]
pub enum PredExpr {
    Or(Box<PredExpr>, Box<PredExpr>),
    And(Box<PredExpr>, Box<PredExpr>),
    Not(Box<PredExpr>),
    Eq(PredValue, PredValue),
    Neq(PredValue, PredValue),
    /// A bare value tested for truth, e.g. `[@id]`.
    Value(PredValue),
}

/// An operand inside a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PredValue {
    /// `@name` — the attribute's value, absent when the attribute is.
    Attribute(String),
    /// A quoted string.
    Literal(String),
    /// `name()`
    Name,
    /// `local-name()`
    LocalName,
    /// `namespace-uri()`
    NamespaceUri,
}
