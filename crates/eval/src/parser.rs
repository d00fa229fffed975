//! A `nom`-based parser for the expression language.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, recognize},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

use crate::ast::{BinOp, Expr};

const KEYWORDS: &[&str] = &["None", "True", "False", "and", "or", "not", "in"];

/// Parses an expression source into its AST.
pub fn parse(source: &str) -> Result<Expr, String> {
    match terminated(expression, multispace0)(source) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(format!("unparsed input at \"{rest}\"")),
        Err(e) => Err(e.to_string()),
    }
}

// --- Combinators & helpers ---

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

/// Matches a keyword with a word boundary behind it.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| {
        let (i, matched) = tag(word)(input)?;
        match i.chars().next() {
            Some(c) if c.is_alphanumeric() || c == '_' => {
                Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)))
            }
            _ => Ok((i, matched)),
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn name(input: &str) -> IResult<&str, Expr> {
    let (i, ident) = identifier(input)?;
    if KEYWORDS.contains(&ident) {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Verify)));
    }
    Ok((i, Expr::Name(ident.to_string())))
}

/// Left-folds `sub (op sub)*` into nested binary nodes.
fn fold_binary(
    input: &str,
    sub: fn(&str) -> IResult<&str, Expr>,
    op: fn(&str) -> IResult<&str, BinOp>,
) -> IResult<&str, Expr> {
    let (i, first) = sub(input)?;
    let (i, rest) = many0(pair(ws(op), sub))(i)?;
    Ok((
        i,
        rest.into_iter().fold(first, |left, (op, right)| Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }),
    ))
}

// --- Expression parsers, in order of precedence ---

fn expression(input: &str) -> IResult<&str, Expr> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinOp> {
    map(keyword("or"), |_| BinOp::Or)(input)
}

fn and_op(input: &str) -> IResult<&str, BinOp> {
    map(keyword("and"), |_| BinOp::And)(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, and_expr, or_op)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, not_expr, and_op)
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(keyword("not")), not_expr), |inner| {
            Expr::Not(Box::new(inner))
        }),
        comparison,
    ))(input)
}

fn cmp_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        map(tag("=="), |_| BinOp::Eq),
        map(tag("!="), |_| BinOp::Ne),
        map(tag("<="), |_| BinOp::Le),
        map(tag(">="), |_| BinOp::Ge),
        map(tag("<"), |_| BinOp::Lt),
        map(tag(">"), |_| BinOp::Gt),
        map(keyword("in"), |_| BinOp::In),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (i, left) = additive(input)?;
    let (i, rest) = opt(pair(ws(cmp_op), additive))(i)?;
    Ok((
        i,
        match rest {
            Some((op, right)) => Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            None => left,
        },
    ))
}

fn additive_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        map(char('+'), |_| BinOp::Add),
        map(char('-'), |_| BinOp::Sub),
    ))(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        map(char('*'), |_| BinOp::Mul),
        map(char('/'), |_| BinOp::Div),
        map(char('%'), |_| BinOp::Mod),
    ))(input)
}

fn additive(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, multiplicative, additive_op)
}

fn multiplicative(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, unary, multiplicative_op)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |inner| {
            Expr::Neg(Box::new(inner))
        }),
        postfix,
    ))(input)
}

// --- Postfix: attribute access, item access, calls ---

fn postfix(input: &str) -> IResult<&str, Expr> {
    let (mut i, mut expr) = primary(input)?;
    loop {
        let attr: IResult<&str, &str> = preceded(ws(char('.')), identifier)(i);
        if let Ok((rest, name)) = attr {
            expr = Expr::Attr(Box::new(expr), name.to_string());
            i = rest;
            continue;
        }
        let item: IResult<&str, Expr> =
            delimited(ws(char('[')), expression, ws(char(']')))(i);
        if let Ok((rest, key)) = item {
            expr = Expr::Item(Box::new(expr), Box::new(key));
            i = rest;
            continue;
        }
        let call: IResult<&str, Vec<Arg>> = delimited(
            ws(char('(')),
            separated_list0(ws(char(',')), argument),
            ws(char(')')),
        )(i);
        if let Ok((rest, arguments)) = call {
            let mut args = Vec::new();
            let mut kwargs = Vec::new();
            for arg in arguments {
                match arg {
                    Arg::Positional(expr) => args.push(expr),
                    Arg::Keyword(name, expr) => kwargs.push((name, expr)),
                }
            }
            expr = Expr::Call {
                func: Box::new(expr),
                args,
                kwargs,
            };
            i = rest;
            continue;
        }
        break;
    }
    Ok((i, expr))
}

enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
}

fn argument(input: &str) -> IResult<&str, Arg> {
    alt((
        map(keyword_argument, |(name, value)| Arg::Keyword(name, value)),
        map(expression, Arg::Positional),
    ))(input)
}

fn keyword_argument(input: &str) -> IResult<&str, (String, Expr)> {
    let (i, name) = ws(identifier)(input)?;
    let (i, _) = char('=')(i)?;
    if i.starts_with('=') {
        // that was the first half of `==`
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Char)));
    }
    let (i, value) = expression(i)?;
    Ok((i, (name.to_string(), value)))
}

// --- Primary expressions ---

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        number,
        map(string_literal, Expr::Str),
        map(keyword("None"), |_| Expr::None),
        map(keyword("True"), |_| Expr::True),
        map(keyword("False"), |_| Expr::False),
        list_display,
        map_display,
        name,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))(input)
}

fn number(input: &str) -> IResult<&str, Expr> {
    let (i, int_part) = take_while1(|c: char| c.is_ascii_digit())(input)?;
    let (i, fraction) = opt(recognize(pair(
        char('.'),
        take_while1(|c: char| c.is_ascii_digit()),
    )))(i)?;
    let expr = match fraction {
        Some(fraction) => {
            let text = format!("{int_part}{fraction}");
            match text.parse::<f64>() {
                Ok(value) => Expr::Float(value),
                Err(_) => return Err(nom::Err::Error(Error::new(input, ErrorKind::Float))),
            }
        }
        None => match int_part.parse::<i64>() {
            Ok(value) => Expr::Int(value),
            // out of integer range, fall back to a float
            Err(_) => match int_part.parse::<f64>() {
                Ok(value) => Expr::Float(value),
                Err(_) => return Err(nom::Err::Error(Error::new(input, ErrorKind::Digit))),
            },
        },
    };
    Ok((i, expr))
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('\'' | '"'))) => c,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };
    let mut out = String::new();
    let mut escaped = false;
    for (idx, ch) in chars {
        if escaped {
            out.push(match ch {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((&input[idx + ch.len_utf8()..], out));
        } else {
            out.push(ch);
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

fn list_display(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), expression),
            ws(char(']')),
        ),
        Expr::List,
    )(input)
}

fn map_display(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            ws(char('{')),
            separated_list0(
                ws(char(',')),
                separated_pair(expression, ws(char(':')), expression),
            ),
            ws(char('}')),
        ),
        Expr::Map,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("42").unwrap(), Expr::Int(42));
        assert_eq!(parse("2.5").unwrap(), Expr::Float(2.5));
        assert_eq!(parse("'hi'").unwrap(), Expr::Str("hi".into()));
        assert_eq!(parse("\"hi\"").unwrap(), Expr::Str("hi".into()));
        assert_eq!(parse("None").unwrap(), Expr::None);
        assert_eq!(parse("True").unwrap(), Expr::True);
        assert_eq!(parse("False").unwrap(), Expr::False);
    }

    #[test]
    fn test_parse_string_escapes() {
        assert_eq!(parse(r"'a\'b'").unwrap(), Expr::Str("a'b".into()));
        assert_eq!(parse(r"'a\nb'").unwrap(), Expr::Str("a\nb".into()));
        assert_eq!(parse("'$'").unwrap(), Expr::Str("$".into()));
    }

    #[test]
    fn test_parse_name_and_access() {
        assert_eq!(parse("foo").unwrap(), Expr::Name("foo".into()));
        assert_eq!(
            parse("dict.some").unwrap(),
            Expr::Attr(Box::new(Expr::Name("dict".into())), "some".into())
        );
        assert_eq!(
            parse("items[0]").unwrap(),
            Expr::Item(
                Box::new(Expr::Name("items".into())),
                Box::new(Expr::Int(0))
            )
        );
    }

    #[test]
    fn test_parse_call_with_kwargs() {
        let expr = parse("echo('hi', name='you')").unwrap();
        match expr {
            Expr::Call { func, args, kwargs } => {
                assert_eq!(*func, Expr::Name("echo".into()));
                assert_eq!(args, vec![Expr::Str("hi".into())]);
                assert_eq!(kwargs, vec![("name".into(), Expr::Str("you".into()))]);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_kwarg_not_confused_with_equality() {
        let expr = parse("f(a == b)").unwrap();
        match expr {
            Expr::Call { args, kwargs, .. } => {
                assert_eq!(kwargs.len(), 0);
                assert!(matches!(args[0], Expr::BinOp { op: BinOp::Eq, .. }));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_operator_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::BinOp {
                op: BinOp::Add,
                left: Box::new(Expr::Int(1)),
                right: Box::new(Expr::BinOp {
                    op: BinOp::Mul,
                    left: Box::new(Expr::Int(2)),
                    right: Box::new(Expr::Int(3)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_boolean_operators() {
        let expr = parse("a == b or c and not d").unwrap();
        assert!(matches!(expr, Expr::BinOp { op: BinOp::Or, .. }));
    }

    #[test]
    fn test_parse_dict_literal() {
        assert_eq!(
            parse("{'class': None}").unwrap(),
            Expr::Map(vec![(Expr::Str("class".into()), Expr::None)])
        );
    }

    #[test]
    fn test_parse_list_literal() {
        assert_eq!(
            parse("[1, 2]").unwrap(),
            Expr::List(vec![Expr::Int(1), Expr::Int(2)])
        );
    }

    #[test]
    fn test_parse_unary_minus() {
        assert_eq!(parse("-5").unwrap(), Expr::Neg(Box::new(Expr::Int(5))));
    }

    #[test]
    fn test_trailing_garbage_is_an_error() {
        assert!(parse("foo ~").is_err());
        assert!(parse("").is_err());
    }
}
