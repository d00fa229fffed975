//! End-to-end scenarios: template source in, rendered text out (XML
//! method, whitespace filter enabled).

use weft::{Context, Method, Path, Stream, Template};

const NS: &str = "http://markup.edgewall.org/";

fn render(source: &str, ctxt: &Context) -> String {
    let template = Template::new(source).unwrap();
    Stream::from(template.generate(ctxt))
        .render(Method::Xml)
        .unwrap()
}

#[test]
fn test_for_with_strip() {
    let source = format!(
        "<doc xmlns:py=\"{NS}\"> <div py:for=\"item in items\" py:strip=\"\">\
         <b>${{item}}</b></div> </doc>"
    );
    let ctxt = Context::new();
    ctxt.set("items", vec![1i64, 2]);
    assert_eq!(render(&source, &ctxt), "<doc> <b>1</b><b>2</b> </doc>");
}

#[test]
fn test_attrs_removal() {
    let source = format!(
        "<doc xmlns:py=\"{NS}\"><elem class=\"foo\" py:attrs=\"{{'class': None}}\"/></doc>"
    );
    assert_eq!(render(&source, &Context::new()), "<doc><elem/></doc>");
}

#[test]
fn test_choose_when_otherwise() {
    let source = format!(
        "<div xmlns:py=\"{NS}\" py:choose=\"\"><span py:when=\"False\">no</span>\
         <span py:otherwise=\"\">yes</span></div>"
    );
    assert_eq!(render(&source, &Context::new()), "<div><span>yes</span></div>");
}

#[test]
fn test_def_with_replace() {
    let source = format!(
        "<doc xmlns:py=\"{NS}\"><p py:def=\"echo(g,n='world')\">${{g}}, ${{n}}!</p>\
         <div py:replace=\"echo('hi')\"/></doc>"
    );
    assert_eq!(render(&source, &Context::new()), "<doc><p>hi, world!</p></doc>");
}

#[test]
fn test_match_recursion() {
    let source = format!(
        "<doc xmlns:py=\"{NS}\"><elem py:match=\"elem\" py:strip=\"\">\
         <div class=\"elem\">${{select('*/text()')}}</div></elem>\
         <elem>Hey Joe</elem></doc>"
    );
    assert_eq!(
        render(&source, &Context::new()),
        "<doc><div class=\"elem\">Hey Joe</div></doc>"
    );
}

#[test]
fn test_xpath_predicate_select() {
    let stream = weft::xml("<root><item/><item important='notso'/></root>").unwrap();
    let out = stream
        .select("root/item[@important!='very']")
        .unwrap()
        .render(Method::Xml)
        .unwrap();
    assert_eq!(out, "<item/><item important=\"notso\"/>");

    let stream = weft::xml("<root><item/><item important='very'/></root>").unwrap();
    let out = stream
        .select("root/item[@important='very']")
        .unwrap()
        .render(Method::Xml)
        .unwrap();
    assert_eq!(out, "<item important=\"very\"/>");
}

#[test]
fn test_interpolation_round_trip() {
    // a doubled dollar sign and a quoted one both come out as one '$'
    let source = "<p>$$ and ${'$'}</p>";
    assert_eq!(render(source, &Context::new()), "<p>$ and $</p>");
}

#[test]
fn test_path_select_api() {
    // Path can also be applied directly to a stream of events
    let events = weft::xml("<root><foo/><bar/></root>")
        .unwrap()
        .into_events()
        .unwrap();
    let path = Path::new("root/bar").unwrap();
    let selected: Vec<_> = path.select(events).collect();
    assert_eq!(selected.len(), 2);
}

#[test]
fn test_match_applies_to_other_templates_output() {
    // one match template's output remains subject to the other templates
    let source = format!(
        "<doc xmlns:py=\"{NS}\">\
         <foo py:match=\"foo\" py:strip=\"\"><bar>${{select('*/text()')}}</bar></foo>\
         <bar py:match=\"bar\" py:strip=\"\"><baz>${{select('*/text()')}}</baz></bar>\
         <foo>x</foo></doc>"
    );
    assert_eq!(render(&source, &Context::new()), "<doc><baz>x</baz></doc>");
}

#[test]
fn test_match_templates_apply_in_registration_order() {
    let source = format!(
        "<doc xmlns:py=\"{NS}\">\
         <elem py:match=\"elem\" py:strip=\"\"><first/></elem>\
         <elem py:match=\"elem\" py:strip=\"\"><second/></elem>\
         <elem/></doc>"
    );
    assert_eq!(render(&source, &Context::new()), "<doc><first/></doc>");
}

#[test]
fn test_rendering_terminates_with_recursive_looking_match() {
    // a match template producing the element kind it matches must not
    // recurse into its own output
    let source = format!(
        "<doc xmlns:py=\"{NS}\"><elem py:match=\"elem\">\
         <elem>wrapped</elem></elem><elem/></doc>"
    );
    assert_eq!(
        render(&source, &Context::new()),
        "<doc><elem><elem>wrapped</elem></elem></doc>"
    );
}
