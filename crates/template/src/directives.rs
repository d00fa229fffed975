//! The closed family of template directives.
//!
//! Every directive implements the same contract: it consumes the
//! instruction stream of its host element's body and produces a new
//! stream, composing with the directives that remain on the same host by
//! threading them through [`apply_directives`]. The canonical application
//! order (`def, match, for, if, when, otherwise, choose, replace, content,
//! attrs, strip`) is part of the engine's contract: it is what makes
//! `for` wrap `if`, and `strip` apply innermost.

use std::sync::Arc;

use weft_core::{Position, QName};
use weft_eval::context::Frame;
use weft_eval::{Context, Expression, Value};
use weft_xpath::Path;

use crate::error::{TemplateError, TemplateSyntaxError};
use crate::instr::{empty_stream, shared_stream, vec_stream, Instr, InstrStream, Part};
use crate::runtime::{
    match_templates, ChooseState, MatchTemplate, Param, ScopedStream, TemplateFunction,
    CHOOSE_KEY,
};

/// A directive attached to a template element.
#[derive(Debug, Clone)]
pub enum Directive {
    Def {
        name: String,
        params: Vec<Param>,
    },
    Match {
        path: Path,
    },
    For {
        targets: Vec<String>,
        expr: Arc<Expression>,
    },
    If {
        expr: Arc<Expression>,
    },
    When {
        expr: Arc<Expression>,
    },
    Otherwise {
        pos: Position,
    },
    Choose {
        expr: Option<Arc<Expression>>,
    },
    Replace {
        expr: Arc<Expression>,
    },
    Content {
        expr: Arc<Expression>,
    },
    Attrs {
        expr: Arc<Expression>,
    },
    Strip {
        expr: Option<Arc<Expression>>,
    },
}

/// The registered directive names, in canonical application order.
const CANONICAL_ORDER: &[&str] = &[
    "def",
    "match",
    "for",
    "if",
    "when",
    "otherwise",
    "choose",
    "replace",
    "content",
    "attrs",
    "strip",
];

impl Directive {
    /// Builds a directive from an attribute in the directive namespace.
    /// Returns `None` when the local name is not a registered directive.
    pub(crate) fn from_attribute(
        localname: &str,
        value: &str,
        pos: &Position,
    ) -> Result<Option<Directive>, TemplateSyntaxError> {
        let directive = match localname {
            "def" => {
                let (name, params) = parse_signature(value, pos)?;
                Directive::Def { name, params }
            }
            "match" => Directive::Match {
                path: Path::new(value)
                    .map_err(|e| TemplateSyntaxError::from_path(e, pos.clone()))?,
            },
            "for" => {
                let (targets, expr) = parse_for(value, pos)?;
                Directive::For { targets, expr }
            }
            "if" => Directive::If {
                expr: required_expr("if", value, pos)?,
            },
            "when" => Directive::When {
                expr: required_expr("when", value, pos)?,
            },
            "otherwise" => Directive::Otherwise { pos: pos.clone() },
            "choose" => Directive::Choose {
                expr: optional_expr(value, pos)?,
            },
            "replace" => Directive::Replace {
                expr: required_expr("replace", value, pos)?,
            },
            "content" => Directive::Content {
                expr: required_expr("content", value, pos)?,
            },
            "attrs" => Directive::Attrs {
                expr: required_expr("attrs", value, pos)?,
            },
            "strip" => Directive::Strip {
                expr: optional_expr(value, pos)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(directive))
    }

    /// The attribute a directive *element* takes its argument from.
    pub(crate) fn argument_attribute(localname: &str) -> Option<&'static str> {
        match localname {
            "def" => Some("function"),
            "match" => Some("path"),
            "for" => Some("each"),
            "if" | "when" | "choose" => Some("test"),
            "otherwise" => None,
            "replace" | "content" | "attrs" | "strip" => Some("value"),
            _ => None,
        }
    }

    /// Position in the canonical application order.
    pub(crate) fn rank(&self) -> usize {
        let name = match self {
            Directive::Def { .. } => "def",
            Directive::Match { .. } => "match",
            Directive::For { .. } => "for",
            Directive::If { .. } => "if",
            Directive::When { .. } => "when",
            Directive::Otherwise { .. } => "otherwise",
            Directive::Choose { .. } => "choose",
            Directive::Replace { .. } => "replace",
            Directive::Content { .. } => "content",
            Directive::Attrs { .. } => "attrs",
            Directive::Strip { .. } => "strip",
        };
        CANONICAL_ORDER
            .iter()
            .position(|candidate| *candidate == name)
            .unwrap_or(CANONICAL_ORDER.len())
    }

    /// Applies this directive, threading the remaining sibling directives
    /// through.
    pub(crate) fn apply(
        &self,
        stream: InstrStream,
        ctxt: &Context,
        rest: &[Directive],
    ) -> Result<InstrStream, TemplateError> {
        match self {
            Directive::Attrs { expr } => apply_attrs(expr, stream, ctxt, rest),
            Directive::Content { expr } => apply_content(expr, stream, ctxt, rest),
            Directive::Replace { expr } => apply_replace(expr, stream),
            Directive::Strip { expr } => apply_strip(expr.as_deref(), stream, ctxt, rest),
            Directive::If { expr } => apply_if(expr, stream, ctxt, rest),
            Directive::For { targets, expr } => apply_for(targets, expr, stream, ctxt, rest),
            Directive::Def { name, params } => apply_def(name, params, stream, ctxt, rest),
            Directive::Match { path } => apply_match(path, stream, ctxt, rest),
            Directive::Choose { expr } => apply_choose(expr.as_deref(), stream, ctxt, rest),
            Directive::When { expr } => apply_when(expr, stream, ctxt, rest),
            Directive::Otherwise { pos } => apply_otherwise(pos, stream, ctxt, rest),
        }
    }
}

/// Composes a directive chain around a stream: the first directive wraps
/// the application of the remainder.
pub(crate) fn apply_directives(
    stream: InstrStream,
    ctxt: &Context,
    directives: &[Directive],
) -> Result<InstrStream, TemplateError> {
    match directives.split_first() {
        Some((first, rest)) => first.apply(stream, ctxt, rest),
        None => Ok(stream),
    }
}

// --- Argument parsing ---

fn required_expr(
    name: &str,
    value: &str,
    pos: &Position,
) -> Result<Arc<Expression>, TemplateSyntaxError> {
    if value.trim().is_empty() {
        return Err(TemplateSyntaxError::new(
            format!("directive \"{name}\" is missing its expression"),
            pos.clone(),
        ));
    }
    Expression::new(value, pos.clone())
        .map(Arc::new)
        .map_err(|e| TemplateSyntaxError::from_expression(e, pos.clone()))
}

fn optional_expr(
    value: &str,
    pos: &Position,
) -> Result<Option<Arc<Expression>>, TemplateSyntaxError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    Expression::new(value, pos.clone())
        .map(|e| Some(Arc::new(e)))
        .map_err(|e| TemplateSyntaxError::from_expression(e, pos.clone()))
}

/// Parses `"target, … in iterable"` for the `for` directive.
fn parse_for(
    value: &str,
    pos: &Position,
) -> Result<(Vec<String>, Arc<Expression>), TemplateSyntaxError> {
    let Some((targets, iterable)) = value.split_once(" in ") else {
        return Err(TemplateSyntaxError::new(
            format!("invalid loop \"{value}\": expected \"<targets> in <iterable>\""),
            pos.clone(),
        ));
    };
    let targets: Vec<String> = targets
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if targets.is_empty() {
        return Err(TemplateSyntaxError::new(
            format!("invalid loop \"{value}\": no loop variables"),
            pos.clone(),
        ));
    }
    let expr = required_expr("for", iterable, pos)?;
    Ok((targets, expr))
}

/// Parses a `def` signature such as `echo(greeting, name='world')`.
fn parse_signature(
    value: &str,
    pos: &Position,
) -> Result<(String, Vec<Param>), TemplateSyntaxError> {
    use weft_eval::ast::Expr;

    let invalid = || {
        TemplateSyntaxError::new(
            format!("invalid function signature \"{value}\""),
            pos.clone(),
        )
    };
    let ast = weft_eval::parser::parse(value.trim())
        .map_err(|msg| TemplateSyntaxError::new(msg, pos.clone()))?;
    match ast {
        Expr::Name(name) => Ok((name, Vec::new())),
        Expr::Call { func, args, kwargs } => {
            let Expr::Name(name) = *func else {
                return Err(invalid());
            };
            let mut params = Vec::new();
            for arg in args {
                let Expr::Name(param) = arg else {
                    return Err(invalid());
                };
                params.push(Param {
                    name: param,
                    default: None,
                });
            }
            for (param, default) in kwargs {
                params.push(Param {
                    name: param,
                    default: Some(Arc::new(Expression::from_ast(
                        value,
                        default,
                        pos.clone(),
                    ))),
                });
            }
            Ok((name, params))
        }
        _ => Err(invalid()),
    }
}

// --- Applications ---

fn apply_attrs(
    expr: &Expression,
    mut stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    let first = match stream.next().transpose()? {
        Some(Instr::Start { name, mut attrs, pos }) => {
            let value = expr.evaluate(ctxt, false)?;
            if value.is_truthy() {
                for (key, item) in mapping_entries(value, expr.position())? {
                    let qname = QName::new(key);
                    if item.is_none() {
                        attrs.retain(|(name, _)| *name != qname);
                    } else {
                        let literal = vec![Part::Text(item.to_string().trim().to_string())];
                        match attrs.iter_mut().find(|(name, _)| *name == qname) {
                            Some(entry) => entry.1 = literal,
                            None => attrs.push((qname, literal)),
                        }
                    }
                }
            }
            Some(Instr::Start { name, attrs, pos })
        }
        other => other,
    };
    let stream: InstrStream = match first {
        Some(first) => Box::new(std::iter::once(Ok(first)).chain(stream)),
        None => empty_stream(),
    };
    apply_directives(stream, ctxt, rest)
}

fn mapping_entries(
    value: Value,
    pos: &Position,
) -> Result<Vec<(String, Value)>, TemplateError> {
    match value {
        Value::Map(map) => Ok(map.into_iter().collect()),
        Value::List(items) => {
            let mut entries = Vec::new();
            for item in items {
                match item {
                    Value::List(pair) if pair.len() == 2 => {
                        let mut pair = pair.into_iter();
                        let key = pair.next().unwrap_or_default().to_string();
                        let value = pair.next().unwrap_or_default();
                        entries.push((key, value));
                    }
                    other => {
                        return Err(TemplateError::runtime(
                            format!(
                                "attrs expression must yield name/value pairs, got {}",
                                other.type_name()
                            ),
                            pos.clone(),
                        ))
                    }
                }
            }
            Ok(entries)
        }
        other => Err(TemplateError::runtime(
            format!(
                "attrs expression must evaluate to a mapping, got {}",
                other.type_name()
            ),
            pos.clone(),
        )),
    }
}

fn apply_content(
    expr: &Expression,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    let body: Vec<Instr> = stream.collect::<Result<_, _>>()?;
    let mut out = Vec::new();
    let pos = body
        .first()
        .map(instr_position)
        .unwrap_or_else(|| expr.position().clone());
    if let Some(first @ Instr::Start { .. }) = body.first() {
        out.push(first.clone());
    }
    out.push(Instr::Expr(Arc::new(expr.clone()), pos));
    if body.len() > 1 {
        if let Some(last) = body.last() {
            out.push(last.clone());
        }
    }
    apply_directives(vec_stream(out), ctxt, rest)
}

fn apply_replace(
    expr: &Expression,
    mut stream: InstrStream,
) -> Result<InstrStream, TemplateError> {
    let pos = match stream.next().transpose()? {
        Some(instr) => instr_position(&instr),
        None => expr.position().clone(),
    };
    Ok(vec_stream(vec![Instr::Expr(Arc::new(expr.clone()), pos)]))
}

fn apply_strip(
    expr: Option<&Expression>,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    let strip = match expr {
        Some(expr) => expr.evaluate(ctxt, false)?.is_truthy(),
        None => true,
    };
    let stream = apply_directives(stream, ctxt, rest)?;
    if strip {
        Ok(Box::new(StripStream {
            inner: stream,
            primed: false,
            held: None,
        }))
    } else {
        Ok(stream)
    }
}

/// Drops the first and last event of a stream (the host element's tags).
struct StripStream {
    inner: InstrStream,
    primed: bool,
    held: Option<Instr>,
}

impl Iterator for StripStream {
    type Item = Result<Instr, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.primed {
            self.primed = true;
            match self.inner.next() {
                None => return None,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(_)) => {}
            }
            match self.inner.next() {
                None => return None,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(instr)) => self.held = Some(instr),
            }
        }
        match self.inner.next() {
            Some(Ok(instr)) => self.held.replace(instr).map(Ok),
            Some(Err(e)) => Some(Err(e)),
            None => None,
        }
    }
}

fn apply_if(
    expr: &Expression,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    if expr.evaluate(ctxt, false)?.is_truthy() {
        apply_directives(stream, ctxt, rest)
    } else {
        Ok(empty_stream())
    }
}

fn apply_for(
    targets: &[String],
    expr: &Expression,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    let items = iterate(expr.evaluate(ctxt, false)?, expr.position())?;
    let body: Vec<Instr> = stream.collect::<Result<_, _>>()?;
    Ok(Box::new(ForStream {
        ctxt: ctxt.clone(),
        targets: targets.to_vec(),
        pos: expr.position().clone(),
        items: items.into_iter(),
        body: Arc::new(body),
        rest: rest.to_vec(),
        current: None,
        failed: false,
    }))
}

/// Coerces a loop iterable into its items.
fn iterate(value: Value, pos: &Position) -> Result<Vec<Value>, TemplateError> {
    match value {
        Value::None => Ok(Vec::new()),
        Value::List(items) => Ok(items),
        Value::Map(map) => Ok(map.into_keys().map(Value::Str).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(TemplateError::runtime(
            format!("{} value is not iterable", other.type_name()),
            pos.clone(),
        )),
    }
}

struct ForStream {
    ctxt: Context,
    targets: Vec<String>,
    pos: Position,
    items: std::vec::IntoIter<Value>,
    body: Arc<Vec<Instr>>,
    rest: Vec<Directive>,
    current: Option<InstrStream>,
    failed: bool,
}

impl Iterator for ForStream {
    type Item = Result<Instr, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(stream) = &mut self.current {
                match stream.next() {
                    Some(item) => return Some(item),
                    None => {
                        self.current = None;
                        self.ctxt.pop();
                    }
                }
            }

            let item = self.items.next()?;
            let mut frame = Frame::new();
            if self.targets.len() == 1 {
                frame.insert(self.targets[0].clone(), item);
            } else {
                match item {
                    Value::List(parts) if parts.len() == self.targets.len() => {
                        for (target, part) in self.targets.iter().zip(parts) {
                            frame.insert(target.clone(), part);
                        }
                    }
                    other => {
                        self.failed = true;
                        return Some(Err(TemplateError::runtime(
                            format!(
                                "cannot unpack {} into {} loop variables",
                                other.type_name(),
                                self.targets.len()
                            ),
                            self.pos.clone(),
                        )));
                    }
                }
            }

            self.ctxt.push(frame);
            match apply_directives(shared_stream(Arc::clone(&self.body)), &self.ctxt, &self.rest)
            {
                Ok(stream) => self.current = Some(stream),
                Err(e) => {
                    self.ctxt.pop();
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn apply_def(
    name: &str,
    params: &[Param],
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    let body: Vec<Instr> = stream.collect::<Result<_, _>>()?;
    let function = TemplateFunction {
        name: name.to_string(),
        params: params.to_vec(),
        body: Arc::new(body),
        directives: rest.to_vec(),
    };
    ctxt.set(name.to_string(), Value::object(function));
    Ok(empty_stream())
}

fn apply_match(
    path: &Path,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    let body: Vec<Instr> = stream.collect::<Result<_, _>>()?;
    match_templates(ctxt).push(MatchTemplate {
        tester: std::cell::RefCell::new(path.test(true)),
        path: path.clone(),
        body: Arc::new(body),
        directives: rest.to_vec(),
    });
    Ok(empty_stream())
}

fn apply_choose(
    expr: Option<&Expression>,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    let value = match expr {
        Some(expr) => Some(expr.evaluate(ctxt, false)?),
        None => None,
    };
    let mut frame = Frame::new();
    frame.insert(
        CHOOSE_KEY.to_string(),
        Value::object(ChooseState {
            value,
            matched: std::cell::Cell::new(false),
        }),
    );
    let rest = rest.to_vec();
    Ok(Box::new(ScopedStream::new(
        ctxt.clone(),
        frame,
        move |ctxt| apply_directives(stream, ctxt, &rest),
    )))
}

/// Runs `body` with the innermost choose state, or fails when there is
/// none in scope.
fn with_choose<T>(
    ctxt: &Context,
    pos: &Position,
    name: &str,
    body: impl FnOnce(&ChooseState) -> Result<T, TemplateError>,
) -> Result<T, TemplateError> {
    let missing = || {
        TemplateError::runtime(
            format!("\"{name}\" directives can only be used inside a \"choose\" directive"),
            pos.clone(),
        )
    };
    let value = ctxt.get(CHOOSE_KEY).ok_or_else(missing)?;
    match value.downcast_ref::<ChooseState>() {
        Some(state) => body(state),
        None => Err(missing()),
    }
}

fn apply_when(
    expr: &Expression,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    with_choose(ctxt, expr.position(), "when", |state| {
        if state.matched.get() {
            return Ok(empty_stream());
        }
        let value = expr.evaluate(ctxt, false)?;
        let hit = match &state.value {
            Some(chosen) => value == *chosen,
            None => value.is_truthy(),
        };
        if hit {
            state.matched.set(true);
            apply_directives(stream, ctxt, rest)
        } else {
            Ok(empty_stream())
        }
    })
}

fn apply_otherwise(
    pos: &Position,
    stream: InstrStream,
    ctxt: &Context,
    rest: &[Directive],
) -> Result<InstrStream, TemplateError> {
    with_choose(ctxt, pos, "otherwise", |state| {
        if state.matched.get() {
            return Ok(empty_stream());
        }
        state.matched.set(true);
        apply_directives(stream, ctxt, rest)
    })
}

fn instr_position(instr: &Instr) -> Position {
    match instr {
        Instr::Emit(event) => event.pos().clone(),
        Instr::Start { pos, .. } => pos.clone(),
        Instr::Expr(_, pos) => pos.clone(),
        Instr::Sub(sub) => sub.pos.clone(),
    }
}
