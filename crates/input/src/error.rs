use thiserror::Error;
use weft_core::Position;

/// Errors raised while parsing markup source text.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("malformed markup: {msg} ({pos})")]
    Malformed { msg: String, pos: Position },

    #[error("undefined entity &{name}; ({pos})")]
    UndefinedEntity { name: String, pos: Position },

    #[error("unbound namespace prefix \"{prefix}\" ({pos})")]
    UnboundPrefix { prefix: String, pos: Position },

    #[error("content after document element ({pos})")]
    TrailingContent { pos: Position },
}

impl ParseError {
    pub fn malformed(msg: impl Into<String>, pos: Position) -> Self {
        ParseError::Malformed { msg: msg.into(), pos }
    }

    /// The position the error was detected at.
    pub fn pos(&self) -> &Position {
        match self {
            ParseError::Malformed { pos, .. }
            | ParseError::UndefinedEntity { pos, .. }
            | ParseError::UnboundPrefix { pos, .. }
            | ParseError::TrailingContent { pos } => pos,
        }
    }
}
