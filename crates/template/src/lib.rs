//! The templating engine proper: compiling XML templates into instruction
//! programs and rendering them through the eval/match/flatten pipeline.
//!
//! A template is an XML document in which attributes and elements from the
//! directive namespace, plus `${…}` interpolation in text and attribute
//! values, drive the transformation of markup against per-render context
//! data.

mod compiler;
mod directives;
pub mod error;
mod instr;
mod loader;
mod pipeline;
mod runtime;
mod template;

pub use error::{TemplateError, TemplateSyntaxError};
pub use instr::EventStream;
pub use loader::{IncludeFilter, TemplateLoader, XINCLUDE_NAMESPACE};
pub use template::{Template, TemplateFilter, TemplateStream};

/// The namespace URI of template directives. Any element or attribute in
/// this namespace must be a registered directive.
pub const NAMESPACE: &str = "http://markup.edgewall.org/";
