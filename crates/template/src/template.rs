//! The compiled template and its render entry point.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use weft_core::Event;
use weft_eval::Context;
use weft_input::XmlParser;

use crate::compiler;
use crate::error::TemplateError;
use crate::instr::{shared_stream, EventStream, Instr};
use crate::pipeline::{eval_stream, flatten_stream, match_stream, MatchList};
use crate::runtime::match_templates;

/// A filter applied to the rendered event stream after the internal
/// pipeline; the include filter is one of these.
pub trait TemplateFilter {
    fn apply(&self, stream: EventStream, ctxt: &Context) -> EventStream;
}

/// A compiled template.
///
/// Parsing and compilation happen once, in [`Template::new`]; the result
/// is immutable and can be rendered any number of times. Each render gets
/// its own [`Context`] and produces an independent event stream.
pub struct Template {
    filename: Option<String>,
    pub(crate) filepath: Option<PathBuf>,
    instrs: Arc<Vec<Instr>>,
    pub(crate) filters: Vec<Arc<dyn TemplateFilter>>,
}

impl Template {
    /// Parses and compiles a template from a string.
    pub fn new(source: &str) -> Result<Template, TemplateError> {
        Template::parse(source, None)
    }

    /// Like [`Template::new`], with a file name for diagnostics.
    pub fn with_filename(source: &str, filename: &str) -> Result<Template, TemplateError> {
        Template::parse(source, Some(filename))
    }

    fn parse(source: &str, filename: Option<&str>) -> Result<Template, TemplateError> {
        let parser = XmlParser::new(source, filename);
        let instrs = compiler::compile(parser)?;
        log::debug!(
            "compiled template {} ({} instructions)",
            filename.unwrap_or("<string>"),
            instrs.len()
        );
        Ok(Template {
            filename: filename.map(str::to_string),
            filepath: None,
            instrs: Arc::new(instrs),
            filters: Vec::new(),
        })
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Appends a filter to run over every generated stream.
    pub fn add_filter(&mut self, filter: Arc<dyn TemplateFilter>) {
        self.filters.push(filter);
    }

    /// Applies the template to the given context data, producing a lazy
    /// stream of markup events.
    pub fn generate(&self, ctxt: &Context) -> TemplateStream {
        // make sure this render has a match-template list
        let templates = match_templates(ctxt);

        let stream = eval_stream(shared_stream(Arc::clone(&self.instrs)), ctxt);
        let stream = match_stream(stream, ctxt, MatchList::Live(templates));
        let mut stream = flatten_stream(stream, ctxt);
        for filter in &self.filters {
            stream = filter.apply(stream, ctxt);
        }
        TemplateStream { inner: stream }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Template \"{}\">",
            self.filename.as_deref().unwrap_or("<string>")
        )
    }
}

/// The event stream produced by one render pass.
pub struct TemplateStream {
    inner: EventStream,
}

impl TemplateStream {
    /// Drains the stream into a vector, stopping at the first error.
    pub fn into_events(self) -> Result<Vec<Event>, TemplateError> {
        self.collect()
    }
}

impl Iterator for TemplateStream {
    type Item = Result<Event, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
