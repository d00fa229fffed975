//! Loading templates from a search path, with caching and XInclude
//! support.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::SystemTime;

use weft_core::{Event, Namespace};
use weft_eval::Context;

use crate::error::TemplateError;
use crate::instr::EventStream;
use crate::template::{Template, TemplateFilter};

/// The XInclude namespace recognized by the include filter.
pub const XINCLUDE_NAMESPACE: &str = "http://www.w3.org/2001/XInclude";

/// Loads templates from files on a search path.
///
/// Loaded templates are cached per normalized path; with `auto_reload`
/// the file modification time is checked on every hit and changed files
/// are re-parsed. Every loaded template gets an [`IncludeFilter`] so
/// `xi:include` elements pull other templates in at render time.
#[derive(Clone)]
pub struct TemplateLoader {
    inner: Rc<LoaderInner>,
}

struct LoaderInner {
    search_path: Vec<PathBuf>,
    auto_reload: bool,
    cache: RefCell<HashMap<PathBuf, CacheEntry>>,
}

struct CacheEntry {
    template: Rc<Template>,
    mtime: Option<SystemTime>,
}

impl TemplateLoader {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        TemplateLoader {
            inner: Rc::new(LoaderInner {
                search_path,
                auto_reload: false,
                cache: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// A loader that re-parses templates whose files changed on disk.
    pub fn with_auto_reload(search_path: Vec<PathBuf>) -> Self {
        TemplateLoader {
            inner: Rc::new(LoaderInner {
                search_path,
                auto_reload: true,
                cache: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.inner.search_path
    }

    /// Loads (or returns the cached) template with the given name.
    ///
    /// Relative names are looked up on the search path in order. With
    /// `relative_to`, the name is first resolved against the directory of
    /// the template it is referenced from.
    pub fn load(
        &self,
        filename: &str,
        relative_to: Option<&str>,
    ) -> Result<Rc<Template>, TemplateError> {
        let mut name = PathBuf::from(filename);
        if let Some(origin) = relative_to {
            if let Some(parent) = Path::new(origin).parent() {
                name = parent.join(filename);
            }
        }
        let name = normalize(&name);

        if let Some(entry) = self.inner.cache.borrow().get(&name) {
            if !self.inner.auto_reload || entry.mtime == current_mtime(entry.template.as_ref())
            {
                log::debug!("template cache hit for {}", name.display());
                return Ok(Rc::clone(&entry.template));
            }
        }

        // Absolute paths bypass the search path.
        let search_path: Vec<PathBuf> = if name.is_absolute() {
            vec![PathBuf::new()]
        } else {
            self.inner.search_path.clone()
        };

        for dir in &search_path {
            let filepath = dir.join(&name);
            let Ok(source) = fs::read_to_string(&filepath) else {
                continue;
            };
            log::debug!("loading template {}", filepath.display());
            let mut template =
                Template::with_filename(&source, &name.to_string_lossy())?;
            template.filepath = Some(filepath.clone());
            template.add_filter(Arc::new(IncludeFilter {
                loader: Rc::downgrade(&self.inner),
            }));
            let template = Rc::new(template);
            self.inner.cache.borrow_mut().insert(
                name.clone(),
                CacheEntry {
                    template: Rc::clone(&template),
                    mtime: mtime_of(&filepath),
                },
            );
            return Ok(template);
        }

        Err(TemplateError::NotFound {
            name: name.to_string_lossy().into_owned(),
            search_path: self.inner.search_path.clone(),
        })
    }
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn current_mtime(template: &Template) -> Option<SystemTime> {
    template.filepath.as_deref().and_then(mtime_of)
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Substitutes `xi:include` elements with the stream of the included
/// template, falling back to `xi:fallback` content when the include target
/// does not exist.
pub struct IncludeFilter {
    loader: Weak<LoaderInner>,
}

impl TemplateFilter for IncludeFilter {
    fn apply(&self, stream: EventStream, ctxt: &Context) -> EventStream {
        Box::new(IncludeStream {
            stream,
            ctxt: ctxt.clone(),
            loader: self.loader.clone(),
            namespace: Namespace::new(XINCLUDE_NAMESPACE),
            ns_prefixes: HashMap::new(),
            include_href: None,
            in_fallback: false,
            fallback: None,
            splice: None,
            failed: false,
        })
    }
}

struct IncludeStream {
    stream: EventStream,
    ctxt: Context,
    loader: Weak<LoaderInner>,
    namespace: Namespace,
    // prefixes currently bound to the XInclude namespace
    ns_prefixes: HashMap<String, usize>,
    include_href: Option<(Option<String>, weft_core::Position)>,
    in_fallback: bool,
    fallback: Option<Vec<Event>>,
    splice: Option<EventStream>,
    failed: bool,
}

impl IncludeStream {
    fn begin_include(&mut self) -> Result<(), TemplateError> {
        let Some((href, pos)) = self.include_href.take() else {
            return Ok(());
        };
        let fallback = self.fallback.take();
        let Some(href) = href else {
            return Err(TemplateError::runtime(
                "include is missing the required \"href\" attribute",
                pos,
            ));
        };

        let Some(inner) = self.loader.upgrade() else {
            return Err(TemplateError::runtime(
                "the template loader of this template is gone",
                pos,
            ));
        };
        let loader = TemplateLoader { inner };
        let relative_to = pos.source.as_deref().map(str::to_string);
        match loader.load(&href, relative_to.as_deref()) {
            Ok(template) => {
                self.splice = Some(Box::new(template.generate(&self.ctxt)));
                Ok(())
            }
            Err(TemplateError::NotFound { .. }) if fallback.is_some() => {
                let events = fallback.unwrap_or_default();
                self.splice = Some(Box::new(events.into_iter().map(Ok)));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Iterator for IncludeStream {
    type Item = Result<Event, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(splice) = &mut self.splice {
                match splice.next() {
                    Some(item) => return Some(item),
                    None => self.splice = None,
                }
                continue;
            }

            let event = match self.stream.next()? {
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                Ok(event) => event,
            };

            if self.in_fallback {
                match &event {
                    Event::End { name, .. }
                        if self.namespace.contains(name) && name.localname == "fallback" =>
                    {
                        self.in_fallback = false;
                    }
                    _ => {
                        if let Some(buffer) = &mut self.fallback {
                            buffer.push(event);
                        }
                    }
                }
                continue;
            }

            match &event {
                Event::Start { name, attrs, pos } if self.namespace.contains(name) => {
                    match name.localname.as_str() {
                        "include" => {
                            let href = attrs
                                .get(&weft_core::QName::new("href"))
                                .map(str::to_string);
                            self.include_href = Some((href, pos.clone()));
                        }
                        "fallback" => {
                            self.in_fallback = true;
                            self.fallback = Some(Vec::new());
                        }
                        _ => {}
                    }
                }
                Event::End { name, .. } if self.namespace.contains(name) => {
                    if name.localname == "include" {
                        if let Err(e) = self.begin_include() {
                            self.failed = true;
                            return Some(Err(e));
                        }
                    }
                }
                Event::StartNs { prefix, uri, .. } if uri == self.namespace.uri() => {
                    *self.ns_prefixes.entry(prefix.clone()).or_insert(0) += 1;
                }
                Event::EndNs { prefix, .. } if self.ns_prefixes.contains_key(prefix) => {
                    let prefix = prefix.clone();
                    if let Some(count) = self.ns_prefixes.get_mut(&prefix) {
                        *count -= 1;
                        if *count == 0 {
                            self.ns_prefixes.remove(&prefix);
                        }
                    }
                }
                _ => return Some(Ok(event)),
            }
        }
    }
}
