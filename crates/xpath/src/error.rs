use thiserror::Error;

/// Errors raised when compiling a path expression.
#[derive(Error, Debug, Clone)]
pub enum PathSyntaxError {
    #[error("absolute path \"{0}\" is not supported")]
    Absolute(String),

    #[error("axis syntax is not supported in \"{0}\"")]
    Axis(String),

    #[error("unsupported function \"{function}()\" in \"{path}\"")]
    Function { path: String, function: String },

    #[error("invalid path expression \"{path}\": unparsed input at \"{rest}\"")]
    Trailing { path: String, rest: String },

    #[error("invalid path expression \"{path}\": {msg}")]
    Syntax { path: String, msg: String },
}
