use std::path::PathBuf;

use thiserror::Error;
use weft_core::{Position, QName};
use weft_eval::{EvaluationError, ExpressionSyntaxError};
use weft_input::ParseError;
use weft_xpath::PathSyntaxError;

/// Errors raised while parsing or rendering a template.
#[derive(Error, Debug, Clone)]
pub enum TemplateError {
    /// The template source is not well-formed markup.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A malformed expression, path or directive in the template.
    #[error(transparent)]
    Syntax(#[from] TemplateSyntaxError),

    /// An expression failed while rendering.
    #[error(transparent)]
    Eval(#[from] EvaluationError),

    /// A template file could not be located on the search path.
    #[error("template \"{name}\" not found (search path: {search_path:?})")]
    NotFound {
        name: String,
        search_path: Vec<PathBuf>,
    },

    /// A directive was used in a way that only shows up at render time.
    #[error("{msg} ({pos})")]
    Runtime { msg: String, pos: Position },
}

impl TemplateError {
    pub(crate) fn runtime(msg: impl Into<String>, pos: Position) -> Self {
        TemplateError::Runtime {
            msg: msg.into(),
            pos,
        }
    }

    /// Whether this error is an unknown-directive error.
    pub fn is_bad_directive(&self) -> bool {
        matches!(self, TemplateError::Syntax(e) if e.bad_directive)
    }
}

/// A syntax problem in a template, with the position it occurred at.
#[derive(Error, Debug, Clone)]
#[error("{msg} ({pos})")]
pub struct TemplateSyntaxError {
    pub msg: String,
    pub pos: Position,
    /// Set for attributes/elements in the directive namespace whose local
    /// name is not a registered directive.
    pub bad_directive: bool,
}

impl TemplateSyntaxError {
    pub fn new(msg: impl Into<String>, pos: Position) -> Self {
        TemplateSyntaxError {
            msg: msg.into(),
            pos,
            bad_directive: false,
        }
    }

    pub fn bad_directive(name: &QName, pos: Position) -> Self {
        TemplateSyntaxError {
            msg: format!("bad directive \"{}\"", name.localname),
            pos,
            bad_directive: true,
        }
    }

    pub(crate) fn from_expression(err: ExpressionSyntaxError, pos: Position) -> Self {
        TemplateSyntaxError::new(err.to_string(), pos)
    }

    pub(crate) fn from_path(err: PathSyntaxError, pos: Position) -> Self {
        TemplateSyntaxError::new(err.to_string(), pos)
    }
}
