//! A `nom`-based parser for the restricted path expression language.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use crate::ast::{NodeTest, PredExpr, PredValue, Step};
use crate::error::PathSyntaxError;

/// The functions a path expression may use; anything else is rejected at
/// compile time.
const SUPPORTED_FUNCTIONS: &[&str] = &[
    "text",
    "comment",
    "node",
    "processing-instruction",
    "name",
    "local-name",
    "namespace-uri",
    "not",
];

/// Compiles a path expression into its step list.
pub fn parse(text: &str) -> Result<Vec<Step>, PathSyntaxError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PathSyntaxError::Syntax {
            path: text.to_string(),
            msg: "empty path".to_string(),
        });
    }
    if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        return Err(PathSyntaxError::Absolute(text.to_string()));
    }
    if trimmed.contains("::") {
        return Err(PathSyntaxError::Axis(text.to_string()));
    }
    check_functions(text, trimmed)?;

    match path(trimmed) {
        Ok(("", steps)) => Ok(steps),
        Ok((rest, _)) => Err(PathSyntaxError::Trailing {
            path: text.to_string(),
            rest: rest.to_string(),
        }),
        Err(e) => Err(PathSyntaxError::Syntax {
            path: text.to_string(),
            msg: e.to_string(),
        }),
    }
}

/// Rejects calls to functions outside the supported set before the grammar
/// gets a chance to misparse them as name tests.
fn check_functions(original: &str, text: &str) -> Result<(), PathSyntaxError> {
    let bytes = text.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        let ch = bytes[idx] as char;
        if ch == '\'' || ch == '"' {
            // skip string literals
            let quote = ch;
            idx += 1;
            while idx < bytes.len() && bytes[idx] as char != quote {
                idx += 1;
            }
            idx += 1;
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            let start = idx;
            while idx < bytes.len() {
                let c = bytes[idx] as char;
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                    idx += 1;
                } else {
                    break;
                }
            }
            let ident = &text[start..idx];
            let mut rest = idx;
            while rest < bytes.len() && (bytes[rest] as char).is_whitespace() {
                rest += 1;
            }
            if rest < bytes.len()
                && bytes[rest] as char == '('
                && !SUPPORTED_FUNCTIONS.contains(&ident)
            {
                return Err(PathSyntaxError::Function {
                    path: original.to_string(),
                    function: ident.to_string(),
                });
            }
        } else {
            idx += 1;
        }
    }
    Ok(())
}

// --- Combinators & helpers ---

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))(input)
}

fn q_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(nc_name, opt(pair(char(':'), nc_name))))(input)
}

/// A name test stores only the local part; prefixes carry no meaning here
/// because paths have no prefix/URI mapping of their own.
fn local_part(name: &str) -> String {
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.to_string(),
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )(input)
}

fn empty_parens(input: &str) -> IResult<&str, ()> {
    map(pair(ws(char('(')), char(')')), |_| ())(input)
}

// --- Steps ---

fn path(input: &str) -> IResult<&str, Vec<Step>> {
    let (i, leading) = opt(tag("//"))(input)?;
    let (i, mut first) = step(i)?;
    first.closure = leading.is_some();
    let mut steps = vec![first];

    let (i, rest) = many0(pair(alt((tag("//"), tag("/"))), step))(i)?;
    for (sep, mut next) in rest {
        next.closure = sep == "//";
        steps.push(next);
    }
    Ok((i, steps))
}

fn step(input: &str) -> IResult<&str, Step> {
    let (i, test) = node_test(input)?;
    let (i, predicates) = many0(predicate)(i)?;
    Ok((
        i,
        Step {
            closure: false,
            test,
            predicates,
        },
    ))
}

fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        preceded(
            char('@'),
            alt((
                map(tag("*"), |_| NodeTest::AnyAttribute),
                map(q_name, |name| NodeTest::Attribute(local_part(name))),
            )),
        ),
        node_type_test,
        map(tag("*"), |_| NodeTest::AnyElement),
        map(char('.'), |_| NodeTest::CurrentNode),
        map(q_name, |name| NodeTest::Element(local_part(name))),
    ))(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(terminated(tag("text"), empty_parens), |_| NodeTest::Text),
        map(terminated(tag("comment"), empty_parens), |_| {
            NodeTest::Comment
        }),
        map(terminated(tag("node"), empty_parens), |_| NodeTest::Node),
        map(
            preceded(
                tag("processing-instruction"),
                delimited(ws(char('(')), opt(ws(string_literal)), char(')')),
            ),
            NodeTest::Pi,
        ),
    ))(input)
}

// --- Predicates ---

fn predicate(input: &str) -> IResult<&str, PredExpr> {
    delimited(ws(char('[')), or_expr, ws(char(']')))(input)
}

fn or_expr(input: &str) -> IResult<&str, PredExpr> {
    let (i, first) = and_expr(input)?;
    let (i, rest) = many0(preceded(ws(tag("or")), and_expr))(i)?;
    Ok((i, rest.into_iter().fold(first, |acc, expr| {
        PredExpr::Or(Box::new(acc), Box::new(expr))
    })))
}

fn and_expr(input: &str) -> IResult<&str, PredExpr> {
    let (i, first) = unary_expr(input)?;
    let (i, rest) = many0(preceded(ws(tag("and")), unary_expr))(i)?;
    Ok((i, rest.into_iter().fold(first, |acc, expr| {
        PredExpr::And(Box::new(acc), Box::new(expr))
    })))
}

fn unary_expr(input: &str) -> IResult<&str, PredExpr> {
    alt((not_expr, comparison))(input)
}

fn not_expr(input: &str) -> IResult<&str, PredExpr> {
    map(
        preceded(
            pair(tag("not"), ws(char('('))),
            terminated(or_expr, ws(char(')'))),
        ),
        |inner| PredExpr::Not(Box::new(inner)),
    )(input)
}

fn comparison(input: &str) -> IResult<&str, PredExpr> {
    let (i, left) = pred_value(input)?;
    let (i, op) = opt(pair(ws(alt((tag("!="), tag("=")))), pred_value))(i)?;
    Ok((
        i,
        match op {
            Some(("!=", right)) => PredExpr::Neq(left, right),
            Some((_, right)) => PredExpr::Eq(left, right),
            None => PredExpr::Value(left),
        },
    ))
}

fn pred_value(input: &str) -> IResult<&str, PredValue> {
    alt((
        map(preceded(char('@'), q_name), |name| {
            PredValue::Attribute(local_part(name))
        }),
        map(string_literal, PredValue::Literal),
        map(terminated(tag("local-name"), empty_parens), |_| {
            PredValue::LocalName
        }),
        map(terminated(tag("namespace-uri"), empty_parens), |_| {
            PredValue::NamespaceUri
        }),
        map(terminated(tag("name"), empty_parens), |_| PredValue::Name),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path() {
        let steps = parse("root/item").unwrap();
        assert_eq!(steps.len(), 2);
        assert!(!steps[0].closure);
        assert_eq!(steps[0].test, NodeTest::Element("root".into()));
        assert!(!steps[1].closure);
        assert_eq!(steps[1].test, NodeTest::Element("item".into()));
    }

    #[test]
    fn test_descendant_separator() {
        let steps = parse("root//bar").unwrap();
        assert!(steps[1].closure);
        let steps = parse("//bar").unwrap();
        assert!(steps[0].closure);
    }

    #[test]
    fn test_node_tests() {
        assert_eq!(parse("text()").unwrap()[0].test, NodeTest::Text);
        assert_eq!(parse("comment()").unwrap()[0].test, NodeTest::Comment);
        assert_eq!(parse("node()").unwrap()[0].test, NodeTest::Node);
        assert_eq!(parse(".").unwrap()[0].test, NodeTest::CurrentNode);
        assert_eq!(parse("*").unwrap()[0].test, NodeTest::AnyElement);
        assert_eq!(parse("@*").unwrap()[0].test, NodeTest::AnyAttribute);
        assert_eq!(
            parse("@important").unwrap()[0].test,
            NodeTest::Attribute("important".into())
        );
        assert_eq!(
            parse("processing-instruction('php')").unwrap()[0].test,
            NodeTest::Pi(Some("php".into()))
        );
    }

    #[test]
    fn test_predicates() {
        let steps = parse("item[@important='very']").unwrap();
        assert_eq!(
            steps[0].predicates,
            vec![PredExpr::Eq(
                PredValue::Attribute("important".into()),
                PredValue::Literal("very".into())
            )]
        );

        let steps = parse("item[@a and not(@b)]").unwrap();
        assert_eq!(
            steps[0].predicates,
            vec![PredExpr::And(
                Box::new(PredExpr::Value(PredValue::Attribute("a".into()))),
                Box::new(PredExpr::Not(Box::new(PredExpr::Value(
                    PredValue::Attribute("b".into())
                ))))
            )]
        );
    }

    #[test]
    fn test_function_predicates() {
        let steps = parse("*[local-name()='div' or name()='span']").unwrap();
        assert!(matches!(steps[0].predicates[0], PredExpr::Or(..)));
    }

    #[test]
    fn test_absolute_path_is_rejected() {
        assert!(matches!(parse("/foo"), Err(PathSyntaxError::Absolute(_))));
    }

    #[test]
    fn test_axis_syntax_is_rejected() {
        assert!(matches!(
            parse("child::foo"),
            Err(PathSyntaxError::Axis(_))
        ));
    }

    #[test]
    fn test_unsupported_function_is_rejected() {
        assert!(matches!(
            parse("item[position()=1]"),
            Err(PathSyntaxError::Function { function, .. }) if function == "position"
        ));
    }
}
