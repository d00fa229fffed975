//! The compiled form of a template.
//!
//! Compilation flattens the parsed document into a list of instructions.
//! Most are plain markup events; the two engine-internal kinds — inline
//! expressions and directive-guarded subprograms — exist only here, which
//! keeps them out of the serializer-facing [`Event`] type altogether. The
//! render pipeline consumes every `Expr` and `Sub` before events leave the
//! template crate.

use std::sync::Arc;

use weft_core::{Event, Position, QName};
use weft_eval::Expression;

use crate::directives::Directive;
use crate::error::TemplateError;

/// One piece of an interpolated text or attribute value.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    Expr(Arc<Expression>),
}

/// One compiled template instruction.
#[derive(Debug, Clone)]
pub enum Instr {
    /// A markup event emitted as-is.
    Emit(Event),
    /// A start tag whose attribute values may still contain expressions.
    Start {
        name: QName,
        attrs: Vec<(QName, Vec<Part>)>,
        pos: Position,
    },
    /// An inline expression whose value is substituted at render time.
    Expr(Arc<Expression>, Position),
    /// A nested event range guarded by a directive chain.
    Sub(Arc<SubProgram>),
}

/// The body of a `Sub` instruction: the directives to apply, in canonical
/// order, and the enclosed instruction range.
#[derive(Debug)]
pub struct SubProgram {
    pub directives: Vec<Directive>,
    pub body: Arc<Vec<Instr>>,
    pub pos: Position,
}

/// A lazy, fallible stream of instructions.
pub type InstrStream = Box<dyn Iterator<Item = Result<Instr, TemplateError>>>;

/// A lazy, fallible stream of markup events, as handed to serialization.
pub type EventStream = Box<dyn Iterator<Item = Result<Event, TemplateError>>>;

pub(crate) fn empty_stream() -> InstrStream {
    Box::new(std::iter::empty())
}

pub(crate) fn vec_stream(items: Vec<Instr>) -> InstrStream {
    Box::new(items.into_iter().map(Ok))
}

/// Streams a shared instruction body without cloning it up front; loop and
/// function bodies are replayed through this.
pub(crate) fn shared_stream(body: Arc<Vec<Instr>>) -> InstrStream {
    Box::new(SharedBody { body, idx: 0 })
}

struct SharedBody {
    body: Arc<Vec<Instr>>,
    idx: usize,
}

impl Iterator for SharedBody {
    type Item = Result<Instr, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        let instr = self.body.get(self.idx)?.clone();
        self.idx += 1;
        Some(Ok(instr))
    }
}
