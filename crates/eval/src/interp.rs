//! Compilation and evaluation of expressions.

use weft_core::Position;

use crate::ast::{BinOp, Expr};
use crate::builtins;
use crate::context::Context;
use crate::error::{EvaluationError, ExpressionSyntaxError};
use crate::parser;
use crate::value::Value;

/// A compiled expression.
///
/// Compilation happens once, when the template is parsed; evaluation happens
/// per render against a [`Context`].
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    pos: Position,
    ast: Expr,
}

impl Expression {
    /// Compiles an expression; `pos` is where it appeared in the template.
    pub fn new(source: &str, pos: Position) -> Result<Expression, ExpressionSyntaxError> {
        let ast = parser::parse(source).map_err(|msg| ExpressionSyntaxError {
            expr_source: source.to_string(),
            msg,
        })?;
        Ok(Expression {
            source: source.to_string(),
            pos,
            ast,
        })
    }

    /// Wraps an already-parsed AST fragment, e.g. a default value inside a
    /// function signature. `source` is only used for diagnostics.
    pub fn from_ast(source: impl Into<String>, ast: Expr, pos: Position) -> Expression {
        Expression {
            source: source.into(),
            pos,
            ast,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> &Position {
        &self.pos
    }

    /// Evaluates the expression.
    ///
    /// Free names consult the context frames and then the builtin table;
    /// anything missing yields [`Value::None`]. Unless `nocall` is set, a
    /// callable result is invoked with no arguments and its return value
    /// substituted.
    pub fn evaluate(&self, ctxt: &Context, nocall: bool) -> Result<Value, EvaluationError> {
        let value =
            eval(&self.ast, ctxt).map_err(|e| e.with_context(&self.source, &self.pos))?;
        if !nocall && value.is_callable() {
            return value
                .call(ctxt, Vec::new(), Vec::new())
                .map_err(|e| e.with_context(&self.source, &self.pos));
        }
        Ok(value)
    }
}

fn eval(expr: &Expr, ctxt: &Context) -> Result<Value, EvaluationError> {
    match expr {
        Expr::None => Ok(Value::None),
        Expr::True => Ok(Value::Bool(true)),
        Expr::False => Ok(Value::Bool(false)),
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(n) => Ok(Value::Float(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, ctxt))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Map(entries) => {
            let mut map = indexmap::IndexMap::new();
            for (key, value) in entries {
                let key = eval(key, ctxt)?.to_string();
                map.insert(key, eval(value, ctxt)?);
            }
            Ok(Value::Map(map))
        }
        Expr::Name(name) => Ok(ctxt
            .get(name)
            .or_else(|| builtins::lookup(name))
            .unwrap_or(Value::None)),
        Expr::Attr(obj, name) => Ok(eval(obj, ctxt)?.attr(name)),
        Expr::Item(obj, key) => {
            let obj = eval(obj, ctxt)?;
            let key = eval(key, ctxt)?;
            Ok(obj.item(&key))
        }
        Expr::Call { func, args, kwargs } => {
            let func = eval(func, ctxt)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, ctxt))
                .collect::<Result<Vec<_>, _>>()?;
            let kwargs = kwargs
                .iter()
                .map(|(name, value)| Ok((name.clone(), eval(value, ctxt)?)))
                .collect::<Result<Vec<_>, EvaluationError>>()?;
            func.call(ctxt, args, kwargs)
        }
        Expr::Neg(inner) => match eval(inner, ctxt)? {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(EvaluationError::new(format!(
                "bad operand type for unary -: {}",
                other.type_name()
            ))),
        },
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, ctxt)?.is_truthy())),
        Expr::BinOp { op, left, right } => eval_binop(*op, left, right, ctxt),
    }
}

fn eval_binop(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    ctxt: &Context,
) -> Result<Value, EvaluationError> {
    // `and`/`or` short-circuit and yield an operand, not a boolean
    if op == BinOp::And {
        let lhs = eval(left, ctxt)?;
        return if lhs.is_truthy() { eval(right, ctxt) } else { Ok(lhs) };
    }
    if op == BinOp::Or {
        let lhs = eval(left, ctxt)?;
        return if lhs.is_truthy() { Ok(lhs) } else { eval(right, ctxt) };
    }

    let lhs = eval(left, ctxt)?;
    let rhs = eval(right, ctxt)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinOp::Add => add(lhs, rhs),
        BinOp::Sub => arithmetic(op, lhs, rhs),
        BinOp::Mul => arithmetic(op, lhs, rhs),
        BinOp::Div => arithmetic(op, lhs, rhs),
        BinOp::Mod => arithmetic(op, lhs, rhs),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, lhs, rhs),
        BinOp::In => contains(lhs, rhs),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value, EvaluationError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (a, b) => match (numeric(&a), numeric(&b)) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(EvaluationError::new(format!(
                "unsupported operand types for +: {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

fn arithmetic(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvaluationError> {
    if let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) {
        match op {
            BinOp::Sub => return Ok(Value::Int(a - b)),
            BinOp::Mul => return Ok(Value::Int(a * b)),
            BinOp::Mod => {
                return if *b == 0 {
                    Err(EvaluationError::new("integer modulo by zero"))
                } else {
                    Ok(Value::Int(a.rem_euclid(*b)))
                };
            }
            _ => {}
        }
    }
    let (Some(a), Some(b)) = (numeric(&lhs), numeric(&rhs)) else {
        return Err(EvaluationError::new(format!(
            "unsupported operand types: {} and {}",
            lhs.type_name(),
            rhs.type_name()
        )));
    };
    match op {
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div => {
            if b == 0.0 {
                Err(EvaluationError::new("division by zero"))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        BinOp::Mod => {
            if b == 0.0 {
                Err(EvaluationError::new("modulo by zero"))
            } else {
                Ok(Value::Float(a.rem_euclid(b)))
            }
        }
        _ => unreachable!("not an arithmetic operator"),
    }
}

fn compare(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvaluationError> {
    let ordering = match (&lhs, &rhs) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (a, b) => match (numeric(a), numeric(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return Err(EvaluationError::new(format!(
            "cannot compare {} with {}",
            lhs.type_name(),
            rhs.type_name()
        )));
    };
    let result = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!("not a comparison operator"),
    };
    Ok(Value::Bool(result))
}

fn contains(needle: Value, haystack: Value) -> Result<Value, EvaluationError> {
    match (&needle, &haystack) {
        (Value::Str(needle), Value::Str(haystack)) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        (_, Value::List(items)) => Ok(Value::Bool(items.iter().any(|item| *item == needle))),
        (Value::Str(key), Value::Map(map)) => Ok(Value::Bool(map.contains_key(key))),
        _ => Err(EvaluationError::new(format!(
            "argument of type {} is not iterable",
            haystack.type_name()
        ))),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn expr(source: &str) -> Expression {
        Expression::new(source, Position::unknown()).unwrap()
    }

    fn data() -> Context {
        let ctxt = Context::new();
        ctxt.set("test", "Foo");
        ctxt.set("items", vec![1i64, 2, 3]);
        let mut dict = IndexMap::new();
        dict.insert("some".to_string(), Value::from("thing"));
        ctxt.set("dict", Value::Map(dict));
        ctxt
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(expr("test").evaluate(&data(), false).unwrap(), Value::from("Foo"));
    }

    #[test]
    fn test_missing_name_is_none() {
        assert_eq!(expr("missing").evaluate(&data(), false).unwrap(), Value::None);
    }

    #[test]
    fn test_item_access() {
        let ctxt = data();
        assert_eq!(expr("items[0]").evaluate(&ctxt, false).unwrap(), Value::Int(1));
        assert_eq!(expr("items[-1]").evaluate(&ctxt, false).unwrap(), Value::Int(3));
        assert_eq!(
            expr("dict[\"some\"]").evaluate(&ctxt, false).unwrap(),
            Value::from("thing")
        );
    }

    #[test]
    fn test_dot_and_bracket_are_uniform() {
        let ctxt = data();
        assert_eq!(
            expr("dict.some").evaluate(&ctxt, false).unwrap(),
            Value::from("thing")
        );
        assert_eq!(
            expr("dict.missing").evaluate(&ctxt, false).unwrap(),
            Value::None
        );
        assert_eq!(
            expr("dict['missing']").evaluate(&ctxt, false).unwrap(),
            Value::None
        );
    }

    #[test]
    fn test_builtin_function() {
        assert_eq!(
            expr("len(items)").evaluate(&data(), false).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let ctxt = Context::new();
        assert_eq!(expr("1 + 2 * 3").evaluate(&ctxt, false).unwrap(), Value::Int(7));
        assert_eq!(expr("7 % 3").evaluate(&ctxt, false).unwrap(), Value::Int(1));
        assert_eq!(expr("1 / 2").evaluate(&ctxt, false).unwrap(), Value::Float(0.5));
        assert!(expr("1 / 0").evaluate(&ctxt, false).is_err());
    }

    #[test]
    fn test_comparisons() {
        let ctxt = Context::new();
        assert_eq!(expr("0 == 1").evaluate(&ctxt, false).unwrap(), Value::Bool(false));
        assert_eq!(expr("1 == 1.0").evaluate(&ctxt, false).unwrap(), Value::Bool(true));
        assert_eq!(expr("'a' < 'b'").evaluate(&ctxt, false).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_boolean_operators_are_operand_valued() {
        let ctxt = data();
        assert_eq!(
            expr("missing or 'fallback'").evaluate(&ctxt, false).unwrap(),
            Value::from("fallback")
        );
        assert_eq!(
            expr("test and items").evaluate(&ctxt, false).unwrap(),
            Value::from(vec![1i64, 2, 3])
        );
        assert_eq!(
            expr("not missing").evaluate(&ctxt, false).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_membership() {
        let ctxt = data();
        assert_eq!(expr("2 in items").evaluate(&ctxt, false).unwrap(), Value::Bool(true));
        assert_eq!(
            expr("'oo' in test").evaluate(&ctxt, false).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_calling_none_fails_with_position() {
        let pos = Position::new(Some("page.html".into()), 3, 1);
        let expression = Expression::new("missing()", pos).unwrap();
        let err = expression.evaluate(&Context::new(), false).unwrap_err();
        assert!(err.to_string().contains("not callable"));
        assert!(err.to_string().contains("page.html:3"));
    }

    #[test]
    fn test_nocall_suppresses_invocation() {
        let ctxt = Context::new();
        ctxt.set("f", builtins::lookup("len").unwrap());
        let value = expr("f").evaluate(&ctxt, true).unwrap();
        assert!(value.is_callable());
    }

    #[test]
    fn test_forgiving_attr_on_scalar() {
        assert_eq!(expr("test.missing").evaluate(&data(), false).unwrap(), Value::None);
    }
}
