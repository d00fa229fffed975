//! The built-in function table consulted after context lookup fails.

use std::any::Any;

use crate::context::Context;
use crate::error::EvaluationError;
use crate::value::{Object, Value};

type BuiltinFn = fn(&[Value]) -> Result<Value, EvaluationError>;

static BUILTINS: &[(&str, BuiltinFn)] = &[
    ("abs", builtin_abs),
    ("bool", builtin_bool),
    ("float", builtin_float),
    ("int", builtin_int),
    ("len", builtin_len),
    ("max", builtin_max),
    ("min", builtin_min),
    ("str", builtin_str),
];

/// Resolves a free name to a builtin function value.
pub fn lookup(name: &str) -> Option<Value> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|&(name, func)| Value::object(Builtin { name, func }))
}

#[derive(Debug)]
struct Builtin {
    name: &'static str,
    func: BuiltinFn,
}

impl Object for Builtin {
    fn type_name(&self) -> &'static str {
        self.name
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(
        &self,
        _ctxt: &Context,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvaluationError> {
        if !kwargs.is_empty() {
            return Err(EvaluationError::new(format!(
                "{}() takes no keyword arguments",
                self.name
            )));
        }
        (self.func)(&args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn one_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, EvaluationError> {
    match args {
        [value] => Ok(value),
        _ => Err(EvaluationError::new(format!(
            "{name}() takes exactly one argument, got {}",
            args.len()
        ))),
    }
}

fn builtin_len(args: &[Value]) -> Result<Value, EvaluationError> {
    match one_arg("len", args)? {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(map) => Ok(Value::Int(map.len() as i64)),
        other => Err(EvaluationError::new(format!(
            "object of type {} has no length",
            other.type_name()
        ))),
    }
}

fn builtin_str(args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::Str(one_arg("str", args)?.to_string()))
}

fn builtin_int(args: &[Value]) -> Result<Value, EvaluationError> {
    match one_arg("int", args)? {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => Ok(Value::Int(*n as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            EvaluationError::new(format!("invalid literal for int(): \"{s}\""))
        }),
        other => Err(EvaluationError::new(format!(
            "cannot convert {} to int",
            other.type_name()
        ))),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value, EvaluationError> {
    match one_arg("float", args)? {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvaluationError::new(format!("invalid literal for float(): \"{s}\""))
        }),
        other => Err(EvaluationError::new(format!(
            "cannot convert {} to float",
            other.type_name()
        ))),
    }
}

fn builtin_bool(args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::Bool(one_arg("bool", args)?.is_truthy()))
}

fn builtin_abs(args: &[Value]) -> Result<Value, EvaluationError> {
    match one_arg("abs", args)? {
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(EvaluationError::new(format!(
            "bad operand type for abs(): {}",
            other.type_name()
        ))),
    }
}

fn extreme(name: &str, args: &[Value], take_right: fn(f64, f64) -> bool) -> Result<Value, EvaluationError> {
    let items: Vec<Value> = match args {
        [Value::List(items)] => items.clone(),
        [] => {
            return Err(EvaluationError::new(format!(
                "{name}() expects at least one argument"
            )))
        }
        other => other.to_vec(),
    };
    let mut best: Option<Value> = None;
    for item in items {
        let candidate = match &item {
            Value::Int(n) => *n as f64,
            Value::Float(n) => *n,
            other => {
                return Err(EvaluationError::new(format!(
                    "{name}() got a non-numeric argument of type {}",
                    other.type_name()
                )))
            }
        };
        let replace = match &best {
            Some(Value::Int(n)) => take_right(*n as f64, candidate),
            Some(Value::Float(n)) => take_right(*n, candidate),
            _ => true,
        };
        if replace {
            best = Some(item);
        }
    }
    best.ok_or_else(|| EvaluationError::new(format!("{name}() of an empty sequence")))
}

fn builtin_min(args: &[Value]) -> Result<Value, EvaluationError> {
    extreme("min", args, |best, candidate| candidate < best)
}

fn builtin_max(args: &[Value]) -> Result<Value, EvaluationError> {
    extreme("max", args, |best, candidate| candidate > best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, EvaluationError> {
        lookup(name).unwrap().call(&Context::new(), args, vec![])
    }

    #[test]
    fn test_len() {
        assert_eq!(call("len", vec![Value::from("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(
            call("len", vec![Value::from(vec![1i64, 2, 3])]).unwrap(),
            Value::Int(3)
        );
        assert!(call("len", vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", vec![Value::from(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call("float", vec![Value::Int(2)]).unwrap(), Value::Float(2.0));
        assert_eq!(call("str", vec![Value::Int(7)]).unwrap(), Value::from("7"));
        assert_eq!(call("bool", vec![Value::from("")]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(
            call("min", vec![Value::from(vec![3i64, 1, 2])]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            call("max", vec![Value::Int(3), Value::Float(4.5)]).unwrap(),
            Value::Float(4.5)
        );
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(lookup("eval").is_none());
    }
}
