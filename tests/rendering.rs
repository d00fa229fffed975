//! Integration coverage for the render methods, the loader and error
//! reporting.

use std::fs;
use std::path::PathBuf;

use weft::{Context, DocType, Error, Method, Stream, Template, TemplateError, TemplateLoader};

const NS: &str = "http://markup.edgewall.org/";

fn render(source: &str, ctxt: &Context, method: Method) -> String {
    let template = Template::new(source).unwrap();
    Stream::from(template.generate(ctxt)).render(method).unwrap()
}

#[test]
fn test_html_method_boolean_attributes() {
    let source = format!(
        "<form xmlns:py=\"{NS}\">\
         <input type=\"checkbox\" py:attrs=\"{{'checked': checked}}\"/></form>"
    );
    let ctxt = Context::new();
    ctxt.set("checked", true);
    assert_eq!(
        render(&source, &ctxt, Method::Html),
        "<form><input type=\"checkbox\" checked></form>"
    );

    let ctxt = Context::new();
    ctxt.set("checked", weft::Value::None);
    assert_eq!(
        render(&source, &ctxt, Method::Html),
        "<form><input type=\"checkbox\"></form>"
    );
}

#[test]
fn test_xhtml_method_void_elements() {
    let source = "<div><br/><p></p></div>";
    assert_eq!(
        render(source, &Context::new(), Method::Xhtml),
        "<div><br /><p></p></div>"
    );
}

#[test]
fn test_render_with_doctype() {
    let out = weft::xml("<html><body/></html>")
        .unwrap()
        .render_with_doctype(Method::Xhtml, Some(DocType::xhtml_strict()))
        .unwrap();
    assert!(out.starts_with("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\""));
    assert!(out.ends_with("<html><body></body></html>"));
}

#[test]
fn test_whitespace_filter_in_render() {
    let source = "<doc>\n\n\n<p>text   \n</p></doc>";
    assert_eq!(
        render(source, &Context::new(), Method::Xml),
        "<doc>\n<p>text\n</p></doc>"
    );
}

#[test]
fn test_namespaced_output() {
    let source = "<div xmlns:x=\"http://example.org/\"><x:widget id=\"w\"/></div>";
    assert_eq!(
        render(source, &Context::new(), Method::Xml),
        "<div xmlns:x=\"http://example.org/\"><x:widget id=\"w\"/></div>"
    );
}

#[test]
fn test_json_context_data() {
    let json: serde_json::Value =
        serde_json::from_str(r#"{"user": {"name": "Joe", "tags": ["a", "b"]}}"#).unwrap();
    let ctxt = Context::new();
    match weft::Value::from(json) {
        weft::Value::Map(map) => {
            for (key, value) in map {
                ctxt.set(key, value);
            }
        }
        _ => unreachable!(),
    }
    let source = format!(
        "<p xmlns:py=\"{NS}\">$user.name: <b py:for=\"tag in user.tags\">$tag</b></p>"
    );
    assert_eq!(
        render(&source, &ctxt, Method::Xml),
        "<p>Joe: <b>a</b><b>b</b></p>"
    );
}

#[test]
fn test_evaluation_error_carries_position() {
    let source = format!(
        "<doc xmlns:py=\"{NS}\">\n  <p>${{1 / 0}}</p>\n</doc>"
    );
    let template = Template::with_filename(&source, "page.html").unwrap();
    let result: Result<Vec<_>, _> = template.generate(&Context::new()).collect();
    match result {
        Err(TemplateError::Eval(e)) => {
            let message = e.to_string();
            assert!(message.contains("division by zero"), "{message}");
            assert!(message.contains("page.html:2"), "{message}");
        }
        other => panic!("expected an evaluation error, got {other:?}"),
    }
}

#[test]
fn test_missing_names_render_silently() {
    let source = format!(
        "<p xmlns:py=\"{NS}\" class=\"${{missing}}\">${{also_missing}}<i py:if=\"missing\">x</i></p>"
    );
    assert_eq!(render(&source, &Context::new(), Method::Xml), "<p/>");
}

#[test]
fn test_loader_include_render() {
    let dir = std::env::temp_dir().join(format!("weft-render-include-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("greeting.html"),
        format!("<p xmlns:py=\"{NS}\">Hello ${{name}}</p>"),
    )
    .unwrap();
    fs::write(
        dir.join("page.html"),
        "<html xmlns:xi=\"http://www.w3.org/2001/XInclude\">\
         <xi:include href=\"greeting.html\"/></html>",
    )
    .unwrap();

    let loader = TemplateLoader::new(vec![PathBuf::from(&dir)]);
    let template = loader.load("page.html", None).unwrap();
    let ctxt = Context::new();
    ctxt.set("name", "Joe");
    let out = Stream::from(template.generate(&ctxt))
        .render(Method::Xml)
        .unwrap();
    assert_eq!(out, "<html><p>Hello Joe</p></html>");
}

#[test]
fn test_parse_error_surfaces() {
    assert!(matches!(
        Template::new("<doc><b></doc></b>"),
        Err(TemplateError::Parse(_))
    ));
    assert!(matches!(weft::xml("<unclosed>"), Err(Error::Parse(_))));
}

#[test]
fn test_template_function_returning_stream_in_content() {
    // a def function used via py:content splices its event stream
    let source = format!(
        "<doc xmlns:py=\"{NS}\"><b py:def=\"chip(x)\">[${{x}}]</b>\
         <p py:content=\"chip('go')\">placeholder</p></doc>"
    );
    assert_eq!(
        render(&source, &Context::new(), Method::Xml),
        "<doc><p><b>[go]</b></p></doc>"
    );
}

#[test]
fn test_nested_loops_shadowing() {
    let source = format!(
        "<doc xmlns:py=\"{NS}\"><i py:for=\"item in outer\">\
         <b py:for=\"item in inner\">$item</b>$item</i></doc>"
    );
    let ctxt = Context::new();
    ctxt.set("outer", vec!["x"]);
    ctxt.set("inner", vec!["1", "2"]);
    assert_eq!(
        render(&source, &ctxt, Method::Xml),
        "<doc><i><b>1</b><b>2</b>x</i></doc>"
    );
}
