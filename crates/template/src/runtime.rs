//! Render-time values the engine plants in the context: template functions,
//! stream slices, the `select` closure of match templates, and the
//! bookkeeping objects behind `_match_templates` and `_choose`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use weft_core::Event;
use weft_eval::context::Frame;
use weft_eval::{Context, EvaluationError, Object, Value};
use weft_xpath::{Path, Tester};

use crate::directives::{apply_directives, Directive};
use crate::error::TemplateError;
use crate::instr::{shared_stream, Instr, InstrStream};

/// The reserved context key holding the active match templates.
pub(crate) const MATCH_TEMPLATES_KEY: &str = "_match_templates";

/// The reserved context key holding the innermost choose state.
pub(crate) const CHOOSE_KEY: &str = "_choose";

// --- Scoped streams ---

/// A stream that pushes a context frame before its first event and pops it
/// when exhausted, so everything produced in between evaluates under the
/// frame's bindings.
pub(crate) struct ScopedStream {
    ctxt: Context,
    state: ScopeState,
}

enum ScopeState {
    Pending {
        frame: Frame,
        make: Box<dyn FnOnce(&Context) -> Result<InstrStream, TemplateError>>,
    },
    Running(InstrStream),
    Done,
}

impl ScopedStream {
    pub(crate) fn new(
        ctxt: Context,
        frame: Frame,
        make: impl FnOnce(&Context) -> Result<InstrStream, TemplateError> + 'static,
    ) -> Self {
        ScopedStream {
            ctxt,
            state: ScopeState::Pending {
                frame,
                make: Box::new(make),
            },
        }
    }
}

impl Iterator for ScopedStream {
    type Item = Result<Instr, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, ScopeState::Done) {
                ScopeState::Pending { frame, make } => {
                    self.ctxt.push(frame);
                    match make(&self.ctxt) {
                        Ok(stream) => self.state = ScopeState::Running(stream),
                        Err(e) => {
                            self.ctxt.pop();
                            return Some(Err(e));
                        }
                    }
                }
                ScopeState::Running(mut stream) => match stream.next() {
                    Some(item) => {
                        self.state = ScopeState::Running(stream);
                        return Some(item);
                    }
                    None => {
                        self.ctxt.pop();
                        return None;
                    }
                },
                ScopeState::Done => return None,
            }
        }
    }
}

// --- Stream values ---

/// An instruction stream wrapped as an expression value. Consumed exactly
/// once: the eval filter takes the stream out when it splices the value
/// into the output.
pub(crate) struct StreamValue {
    stream: RefCell<Option<InstrStream>>,
}

impl StreamValue {
    pub(crate) fn from_stream(stream: InstrStream) -> Self {
        StreamValue {
            stream: RefCell::new(Some(stream)),
        }
    }

    pub(crate) fn from_events(events: Vec<Event>) -> Self {
        let instrs: Vec<Instr> = events.into_iter().map(Instr::Emit).collect();
        StreamValue::from_stream(crate::instr::vec_stream(instrs))
    }

    /// Takes the stream out; a second take yields an empty stream.
    pub(crate) fn take(&self) -> InstrStream {
        self.stream
            .borrow_mut()
            .take()
            .unwrap_or_else(crate::instr::empty_stream)
    }
}

impl fmt::Debug for StreamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<stream>")
    }
}

impl Object for StreamValue {
    fn type_name(&self) -> &'static str {
        "stream"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- Template functions (py:def) ---

/// A named parameter of a template function, with an optional default.
#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub name: String,
    pub default: Option<Arc<weft_eval::Expression>>,
}

/// The callable bound into the context by a `def` directive. Calling it
/// binds the arguments in a fresh scope and expands the captured body.
#[derive(Debug)]
pub(crate) struct TemplateFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Arc<Vec<Instr>>,
    pub directives: Vec<Directive>,
}

impl Object for TemplateFunction {
    fn type_name(&self) -> &'static str {
        "template function"
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(
        &self,
        ctxt: &Context,
        args: Vec<Value>,
        mut kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvaluationError> {
        let mut args = args.into_iter();
        let mut frame = Frame::new();
        for param in &self.params {
            let value = if let Some(value) = args.next() {
                value
            } else if let Some(idx) = kwargs.iter().position(|(name, _)| name == &param.name) {
                kwargs.remove(idx).1
            } else if let Some(default) = &param.default {
                default.evaluate(ctxt, false)?
            } else {
                Value::None
            };
            frame.insert(param.name.clone(), value);
        }

        let body = Arc::clone(&self.body);
        let directives = self.directives.clone();
        let stream = ScopedStream::new(ctxt.clone(), frame, move |ctxt| {
            apply_directives(shared_stream(body), ctxt, &directives)
        });
        Ok(Value::object(StreamValue::from_stream(Box::new(stream))))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- Match templates ---

/// One registered match template.
pub(crate) struct MatchTemplate {
    pub tester: RefCell<Tester>,
    pub path: Path,
    pub body: Arc<Vec<Instr>>,
    pub directives: Vec<Directive>,
}

impl fmt::Debug for MatchTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<match \"{}\">", self.path)
    }
}

/// The shared, ordered list of match templates living under
/// `_match_templates`. The handle is cloneable; all clones observe
/// registrations made while rendering.
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchTemplateList {
    inner: Rc<RefCell<Vec<Rc<MatchTemplate>>>>,
}

impl MatchTemplateList {
    pub(crate) fn new() -> Self {
        MatchTemplateList::default()
    }

    pub(crate) fn push(&self, template: MatchTemplate) {
        self.inner.borrow_mut().push(Rc::new(template));
    }

    /// A snapshot of the current registration order.
    pub(crate) fn snapshot(&self) -> Vec<Rc<MatchTemplate>> {
        self.inner.borrow().clone()
    }
}

impl Object for MatchTemplateList {
    fn type_name(&self) -> &'static str {
        "match templates"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fetches the live match-template list from the context, installing an
/// empty one if the render has none yet.
pub(crate) fn match_templates(ctxt: &Context) -> MatchTemplateList {
    if let Some(value) = ctxt.get(MATCH_TEMPLATES_KEY) {
        if let Some(list) = value.downcast_ref::<MatchTemplateList>() {
            return list.clone();
        }
    }
    let list = MatchTemplateList::new();
    ctxt.set(MATCH_TEMPLATES_KEY, Value::object(list.clone()));
    list
}

// --- Choose state ---

/// The per-render state of a `choose` block, stored under `_choose`.
#[derive(Debug)]
pub(crate) struct ChooseState {
    /// The value `when` branches compare against; unset means the branches
    /// are tested for truth instead.
    pub value: Option<Value>,
    pub matched: Cell<bool>,
}

impl Object for ChooseState {
    fn type_name(&self) -> &'static str {
        "choose"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- The select() closure of match bodies ---

/// The `select` function bound inside a match template body: applies a path
/// to the buffered content of the matched sub-tree.
pub(crate) struct SelectFn {
    pub content: Rc<Vec<Event>>,
}

impl fmt::Debug for SelectFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<select>")
    }
}

impl Object for SelectFn {
    fn type_name(&self) -> &'static str {
        "select"
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(
        &self,
        _ctxt: &Context,
        args: Vec<Value>,
        _kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvaluationError> {
        let path = match args.first() {
            Some(Value::Str(path)) => path.clone(),
            _ => {
                return Err(EvaluationError::new(
                    "select() expects a path string argument",
                ))
            }
        };
        let path = Path::new(&path).map_err(|e| EvaluationError::new(e.to_string()))?;
        let events: Vec<Event> = path.select(self.content.iter().cloned()).collect();
        Ok(Value::object(StreamValue::from_events(events)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
