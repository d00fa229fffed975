//! Command-line front end: renders a template file against an optional
//! JSON context document.
//!
//! Usage: `weft TEMPLATE [CONTEXT.json] [--method xml|xhtml|html]`

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use weft::{Context, Method, Stream, TemplateLoader, Value};

fn main() -> ExitCode {
    env_logger::init();

    let mut template_file: Option<String> = None;
    let mut context_file: Option<String> = None;
    let mut method = Method::Xml;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--method" => {
                method = match args.next().as_deref() {
                    Some("xml") => Method::Xml,
                    Some("xhtml") => Method::Xhtml,
                    Some("html") => Method::Html,
                    other => {
                        eprintln!("unknown method {other:?}");
                        return ExitCode::FAILURE;
                    }
                };
            }
            "--help" | "-h" => {
                eprintln!("usage: weft TEMPLATE [CONTEXT.json] [--method xml|xhtml|html]");
                return ExitCode::SUCCESS;
            }
            _ if template_file.is_none() => template_file = Some(arg),
            _ if context_file.is_none() => context_file = Some(arg),
            other => {
                eprintln!("unexpected argument {other:?}");
                return ExitCode::FAILURE;
            }
        }
    }

    let Some(template_file) = template_file else {
        eprintln!("usage: weft TEMPLATE [CONTEXT.json] [--method xml|xhtml|html]");
        return ExitCode::FAILURE;
    };

    let path = PathBuf::from(&template_file);
    let search_path = vec![path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))];
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => {
            eprintln!("not a template file: {template_file}");
            return ExitCode::FAILURE;
        }
    };

    let ctxt = Context::new();
    if let Some(context_file) = context_file {
        let data = match fs::read_to_string(&context_file) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("cannot read {context_file}: {e}");
                return ExitCode::FAILURE;
            }
        };
        let json: serde_json::Value = match serde_json::from_str(&data) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("invalid JSON in {context_file}: {e}");
                return ExitCode::FAILURE;
            }
        };
        match Value::from(json) {
            Value::Map(map) => {
                for (key, value) in map {
                    ctxt.set(key, value);
                }
            }
            other => {
                ctxt.set("data", other);
            }
        }
    }

    let loader = TemplateLoader::new(search_path);
    let template = match loader.load(&name, None) {
        Ok(template) => template,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    log::debug!("rendering {name} with method {method:?}");
    match Stream::from(template.generate(&ctxt)).render(method) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
