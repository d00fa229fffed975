//! A restricted XPath engine that queries live markup event streams.
//!
//! Unlike a conventional XPath implementation there is no document tree:
//! a compiled [`Path`] drives a stateful [`Tester`] one event at a time,
//! which makes it usable both for selecting from finished streams and for
//! matching inside a running template pipeline.

pub mod ast;
pub mod error;
pub mod parser;
pub mod select;
pub mod tester;

pub use ast::{NodeTest, Path, PredExpr, PredValue, Step};
pub use error::PathSyntaxError;
pub use select::Select;
pub use tester::{Hit, Tester};
