//! The three internal stream filters every render passes through, in
//! order: **eval** (expression substitution), **match** (match-template
//! application) and **flatten** (subprogram expansion).
//!
//! All three are pull-based: each `next()` produces at most one output
//! event's worth of work, so a consumer that stops pulling stops the whole
//! pipeline at an event boundary.

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use weft_core::{Attributes, Event, Position, QName};
use weft_eval::context::Frame;
use weft_eval::{Context, Value};

use crate::directives::apply_directives;
use crate::error::TemplateError;
use crate::instr::{
    shared_stream, vec_stream, EventStream, Instr, InstrStream, Part,
};
use crate::runtime::{match_templates, MatchTemplate, MatchTemplateList, SelectFn, StreamValue};

// --- Eval filter ---

/// Wraps a stream so that interpolated attributes are collapsed and inline
/// expressions are substituted.
pub(crate) fn eval_stream(stream: InstrStream, ctxt: &Context) -> InstrStream {
    Box::new(EvalFilter {
        stream,
        ctxt: ctxt.clone(),
        pending: VecDeque::new(),
        splice: None,
    })
}

struct EvalFilter {
    stream: InstrStream,
    ctxt: Context,
    // expression results waiting to be resolved (list items mostly)
    pending: VecDeque<(Value, Position)>,
    // a stream-valued expression result being spliced into the output
    splice: Option<InstrStream>,
}

impl Iterator for EvalFilter {
    type Item = Result<Instr, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(splice) = &mut self.splice {
                match splice.next() {
                    Some(item) => return Some(item),
                    None => self.splice = None,
                }
                continue;
            }

            if let Some((value, pos)) = self.pending.pop_front() {
                match self.resolve(value, pos) {
                    Some(item) => return Some(item),
                    None => continue,
                }
            }

            match self.stream.next()? {
                Err(e) => return Some(Err(e)),
                Ok(Instr::Start { name, attrs, pos }) => {
                    return Some(self.collapse_start(name, attrs, pos))
                }
                Ok(Instr::Expr(expr, pos)) => match expr.evaluate(&self.ctxt, false) {
                    Ok(value) => self.pending.push_back((value, pos)),
                    Err(e) => return Some(Err(e.into())),
                },
                Ok(other) => return Some(Ok(other)),
            }
        }
    }
}

impl EvalFilter {
    /// Turns one expression result into output: none is dropped, strings
    /// become text, streams are spliced back through eval and match, lists
    /// resolve item by item, everything else is stringified.
    fn resolve(&mut self, value: Value, pos: Position) -> Option<Result<Instr, TemplateError>> {
        match value {
            Value::None => None,
            Value::Str(s) => Some(Ok(Instr::Emit(Event::text(s, pos)))),
            Value::List(items) => {
                for item in items.into_iter().rev() {
                    self.pending.push_front((item, pos.clone()));
                }
                None
            }
            other => {
                if let Some(stream_value) = other.downcast_ref::<StreamValue>() {
                    let inner = stream_value.take();
                    let live = MatchList::Live(match_templates(&self.ctxt));
                    self.splice =
                        Some(match_stream(eval_stream(inner, &self.ctxt), &self.ctxt, live));
                    return None;
                }
                Some(Ok(Instr::Emit(Event::text(other.to_string(), pos))))
            }
        }
    }

    /// Evaluates the interpolated attribute values of a start tag. An
    /// attribute whose parts all evaluate to none is dropped.
    fn collapse_start(
        &self,
        name: QName,
        attrs: Vec<(QName, Vec<Part>)>,
        pos: Position,
    ) -> Result<Instr, TemplateError> {
        let mut out = Attributes::new();
        for (attr_name, parts) in attrs {
            let mut values: Vec<String> = Vec::new();
            for part in parts {
                match part {
                    Part::Text(s) => values.push(s),
                    Part::Expr(expr) => match expr.evaluate(&self.ctxt, false)? {
                        Value::None => {}
                        value => values.push(value.to_string()),
                    },
                }
            }
            if values.is_empty() {
                continue;
            }
            out.push(attr_name, values.concat());
        }
        Ok(Instr::Emit(Event::Start {
            name,
            attrs: out,
            pos,
        }))
    }
}

// --- Match filter ---

/// The set of match templates a match filter consults.
pub(crate) enum MatchList {
    /// The live registration list from the context; templates registered
    /// while rendering are picked up.
    Live(MatchTemplateList),
    /// A fixed snapshot, used when re-entering the filter for a match
    /// template's own output (with that template removed).
    Snapshot(Vec<Rc<MatchTemplate>>),
}

impl MatchList {
    fn current(&self) -> Vec<Rc<MatchTemplate>> {
        match self {
            MatchList::Live(list) => list.snapshot(),
            MatchList::Snapshot(templates) => templates.clone(),
        }
    }
}

/// Applies match templates to the start/end events of a stream.
pub(crate) fn match_stream(
    stream: InstrStream,
    ctxt: &Context,
    templates: MatchList,
) -> InstrStream {
    Box::new(MatchFilter {
        stream,
        ctxt: ctxt.clone(),
        templates,
        emitting: None,
    })
}

struct MatchFilter {
    stream: InstrStream,
    ctxt: Context,
    templates: MatchList,
    // the expansion of a matched template, with a context frame to pop
    // when it runs dry
    emitting: Option<InstrStream>,
}

impl Iterator for MatchFilter {
    type Item = Result<Instr, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = &mut self.emitting {
                match inner.next() {
                    Some(item) => return Some(item),
                    None => {
                        self.emitting = None;
                        self.ctxt.pop();
                    }
                }
                continue;
            }

            let instr = match self.stream.next()? {
                Err(e) => return Some(Err(e)),
                Ok(instr) => instr,
            };

            let event = match &instr {
                Instr::Emit(event) if event.is_start() || event.is_end() => event.clone(),
                _ => return Some(Ok(instr)),
            };

            // Offer the event to each template in registration order; the
            // first positive tester wins.
            let candidates = self.templates.current();
            let mut matched = None;
            for (idx, template) in candidates.iter().enumerate() {
                if template.tester.borrow_mut().test(&event).is_some() {
                    matched = Some(idx);
                    break;
                }
            }

            match matched {
                None => return Some(Ok(instr)),
                Some(idx) => {
                    if let Err(e) = self.begin_match(instr, &candidates, idx) {
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}

impl MatchFilter {
    /// Buffers the matched sub-tree, binds `select` over it and starts
    /// emitting the template body with this template excluded from
    /// further matching.
    fn begin_match(
        &mut self,
        first: Instr,
        candidates: &[Rc<MatchTemplate>],
        idx: usize,
    ) -> Result<(), TemplateError> {
        let template = &candidates[idx];

        let mut content = vec![first];
        let mut depth = 1usize;
        while depth > 0 {
            match self.stream.next() {
                None => break,
                Some(Err(e)) => return Err(e),
                Some(Ok(instr)) => {
                    if let Instr::Emit(event) = &instr {
                        if event.is_start() {
                            depth += 1;
                        } else if event.is_end() {
                            depth -= 1;
                        }
                        // keep the tester's depth bookkeeping in step
                        template.tester.borrow_mut().test(event);
                    }
                    content.push(instr);
                }
            }
        }

        // Expand nested subprograms before the buffer becomes selectable.
        let events: Vec<Event> =
            flatten_stream(vec_stream(content), &self.ctxt).collect::<Result<_, _>>()?;

        let mut frame = Frame::new();
        frame.insert(
            "select".to_string(),
            Value::object(SelectFn {
                content: Rc::new(events),
            }),
        );
        self.ctxt.push(frame);

        let body = match apply_directives(
            shared_stream(Arc::clone(&template.body)),
            &self.ctxt,
            &template.directives,
        ) {
            Ok(body) => body,
            Err(e) => {
                self.ctxt.pop();
                return Err(e);
            }
        };

        // The matched template must not re-apply to its own output; every
        // other template may.
        let remaining: Vec<Rc<MatchTemplate>> = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, template)| Rc::clone(template))
            .collect();
        self.emitting = Some(match_stream(
            eval_stream(body, &self.ctxt),
            &self.ctxt,
            MatchList::Snapshot(remaining),
        ));
        Ok(())
    }
}

// --- Flatten filter ---

/// Expands subprograms by applying their directive chain and re-running
/// eval, match and flatten over the result, yielding plain events.
pub(crate) fn flatten_stream(stream: InstrStream, ctxt: &Context) -> EventStream {
    Box::new(FlattenFilter {
        stream,
        ctxt: ctxt.clone(),
        nested: None,
    })
}

struct FlattenFilter {
    stream: InstrStream,
    ctxt: Context,
    nested: Option<EventStream>,
}

impl Iterator for FlattenFilter {
    type Item = Result<Event, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(nested) = &mut self.nested {
                match nested.next() {
                    Some(item) => return Some(item),
                    None => self.nested = None,
                }
                continue;
            }

            match self.stream.next()? {
                Err(e) => return Some(Err(e)),
                Ok(Instr::Emit(event)) => return Some(Ok(event)),
                Ok(Instr::Sub(sub)) => {
                    let applied = apply_directives(
                        shared_stream(Arc::clone(&sub.body)),
                        &self.ctxt,
                        &sub.directives,
                    );
                    match applied {
                        Ok(stream) => {
                            let live = MatchList::Live(match_templates(&self.ctxt));
                            self.nested = Some(flatten_stream(
                                match_stream(eval_stream(stream, &self.ctxt), &self.ctxt, live),
                                &self.ctxt,
                            ));
                        }
                        Err(e) => return Some(Err(attach_position(e, &sub.pos))),
                    }
                }
                Ok(Instr::Start { pos, .. }) | Ok(Instr::Expr(_, pos)) => {
                    // the eval filter runs ahead of flatten; hitting this
                    // means the pipeline was assembled wrong
                    return Some(Err(TemplateError::runtime(
                        "unevaluated template instruction in output stream",
                        pos,
                    )));
                }
            }
        }
    }
}

/// Fills in the subprogram position on errors that lack one of their own.
fn attach_position(error: TemplateError, pos: &Position) -> TemplateError {
    match error {
        TemplateError::Syntax(mut e) => {
            if e.pos == Position::unknown() {
                e.pos = pos.clone();
            }
            TemplateError::Syntax(e)
        }
        TemplateError::Runtime { msg, pos: err_pos } => {
            let pos = if err_pos == Position::unknown() {
                pos.clone()
            } else {
                err_pos
            };
            TemplateError::Runtime { msg, pos }
        }
        other => other,
    }
}
