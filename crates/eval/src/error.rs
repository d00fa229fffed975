use thiserror::Error;
use weft_core::Position;

/// A malformed expression, reported when the expression is compiled.
#[derive(Error, Debug, Clone)]
#[error("invalid expression \"{expr_source}\": {msg}")]
pub struct ExpressionSyntaxError {
    pub expr_source: String,
    pub msg: String,
}

/// A failure while evaluating a compiled expression, carrying the
/// originating expression source and position.
#[derive(Error, Debug, Clone)]
#[error("{msg} in expression \"{expr}\" ({pos})")]
pub struct EvaluationError {
    pub msg: String,
    pub expr: String,
    pub pos: Position,
}

impl EvaluationError {
    /// Creates an error without source context; the evaluator fills that in
    /// on the way out.
    pub fn new(msg: impl Into<String>) -> Self {
        EvaluationError {
            msg: msg.into(),
            expr: String::new(),
            pos: Position::unknown(),
        }
    }

    /// Attaches expression source and position unless already present.
    pub fn with_context(mut self, expr: &str, pos: &Position) -> Self {
        if self.expr.is_empty() {
            self.expr = expr.to_string();
        }
        if self.pos == Position::unknown() {
            self.pos = pos.clone();
        }
        self
    }
}
