use crate::{
    error::{runtime_error, Result},
    value::{Builtin, Value},
};
use log::trace;
use rand::Rng;
use std::{
    collections::HashMap,
    fs,
    io::{self, BufRead},
};

/// The native function table consulted after scope lookup fails.
///
/// Built once and never mutated afterwards; the interpreter owns it.
#[derive(Clone, Default)]
pub struct Builtins {
    table: HashMap<&'static str, Builtin>,
}

impl Builtins {
    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn standard() -> Self {
        let mut table = HashMap::new();

        macro_rules! define_builtin {
            ($name:literal, $func:expr) => {
                table.insert($name, Builtin::new($name, $func));
            };
        }

        // I/O: misuse and host failures are recoverable fails.
        define_builtin!("print", |args| {
            for arg in args {
                println!("{}", arg);
            }
            Ok(Value::Nil)
        });

        define_builtin!("readln", |args| {
            if !args.is_empty() {
                return Ok(arity_fail(args.len(), 0));
            }
            let mut line = String::new();
            if let Err(err) = io::stdin().lock().read_line(&mut line) {
                return Ok(Value::fail(format!("could not read line: {}", err)));
            }
            Ok(Value::String(line.trim().to_string()))
        });

        define_builtin!("read", |args| match args {
            [Value::String(path)] => {
                trace!("reading {}", path);
                Ok(fs::read_to_string(path)
                    .map(Value::String)
                    .unwrap_or_else(|err| Value::fail(format!("could not read file: {}", err))))
            }
            [other] => Ok(Value::fail(format!(
                "argument to `read` must be STRING, got {}",
                other.type_name()
            ))),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        define_builtin!("write", |args| match args {
            [Value::String(path), Value::String(content)] => {
                trace!("writing {} bytes to {}", content.len(), path);
                Ok(match fs::write(path, content) {
                    Ok(()) => Value::Boolean(true),
                    Err(err) => Value::fail(format!("could not write file: {}", err)),
                })
            }
            [Value::String(_), other] => Ok(Value::fail(format!(
                "second argument to `write` must be STRING, got {}",
                other.type_name()
            ))),
            [other, _] => Ok(Value::fail(format!(
                "first argument to `write` must be STRING, got {}",
                other.type_name()
            ))),
            _ => Ok(arity_fail(args.len(), 2)),
        });

        define_builtin!("lines", |args| match args {
            [Value::String(path)] => Ok(match fs::read_to_string(path) {
                Ok(text) => Value::list(
                    text.lines()
                        .map(|line| Value::String(line.to_string()))
                        .collect(),
                ),
                Err(err) => Value::fail(format!("could not open file: {}", err)),
            }),
            [other] => Ok(Value::fail(format!(
                "argument to `lines` must be STRING, got {}",
                other.type_name()
            ))),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        // Types: conversions report bad input as fails.
        define_builtin!("int", |args| match args {
            [Value::String(s)] => Ok(s
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::fail(format!("could not parse string to int: {}", s)))),
            [Value::Integer(n)] => Ok(Value::Integer(*n)),
            [Value::Boolean(b)] => Ok(Value::Integer(i64::from(*b))),
            [other] => Ok(Value::fail(format!(
                "argument to `int` not supported, got {}",
                other.type_name()
            ))),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        define_builtin!("float", |args| match args {
            [Value::String(s)] => Ok(s
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::fail(format!("could not parse string to float: {}", s)))),
            [Value::Integer(n)] => Ok(Value::Float(*n as f64)),
            [Value::Float(n)] => Ok(Value::Float(*n)),
            [other] => Ok(Value::fail(format!(
                "argument to `float` not supported, got {}",
                other.type_name()
            ))),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        define_builtin!("string", |args| match args {
            [value] => Ok(Value::String(value.to_string())),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        define_builtin!("bool", |args| match args {
            [Value::Boolean(b)] => Ok(Value::Boolean(*b)),
            [Value::String(s)] => Ok(match s.as_str() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => Value::fail(format!("could not parse string to bool: {}", s)),
            }),
            [Value::Integer(n)] => Ok(Value::Boolean(*n != 0)),
            [other] => Ok(Value::fail(format!(
                "argument to `bool` not supported, got {}",
                other.type_name()
            ))),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        define_builtin!("type", |args| match args {
            [value] => Ok(Value::String(value.type_name().to_string())),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        define_builtin!("is_fail", |args| match args {
            [value] => Ok(Value::Boolean(value.is_fail())),
            _ => Ok(arity_fail(args.len(), 1)),
        });

        // Lists: misuse is a runtime error.
        define_builtin!("len", |args| match args {
            [Value::String(s)] => Ok(Value::Integer(s.chars().count() as i64)),
            [Value::List(elements)] => Ok(Value::Integer(elements.len() as i64)),
            [other] => runtime_error(format!(
                "argument to `len` not supported, got {}",
                other.type_name()
            )),
            _ => arity_error(args.len(), 1),
        });

        define_builtin!("first", |args| {
            let elements = expect_list("first", args)?;
            Ok(elements.first().cloned().unwrap_or(Value::Nil))
        });

        define_builtin!("last", |args| {
            let elements = expect_list("last", args)?;
            Ok(elements.last().cloned().unwrap_or(Value::Nil))
        });

        define_builtin!("rest", |args| {
            let elements = expect_list("rest", args)?;
            if elements.is_empty() {
                return Ok(Value::Nil);
            }
            Ok(Value::list(elements[1..].to_vec()))
        });

        define_builtin!("push", |args| match args {
            [Value::List(elements), value] => {
                let mut pushed = Vec::with_capacity(elements.len() + 1);
                pushed.extend(elements.iter().cloned());
                pushed.push(value.clone());
                Ok(Value::list(pushed))
            }
            [other, _] => runtime_error(format!(
                "argument to `push` must be LIST, got {}",
                other.type_name()
            )),
            _ => arity_error(args.len(), 2),
        });

        // Strings
        define_builtin!("split", |args| {
            let [text, separator] = expect_strings::<2>("split", args)?;
            Ok(Value::list(
                text.split(separator)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        });

        define_builtin!("join", |args| match args {
            [Value::List(elements), Value::String(separator)] => {
                let mut parts = Vec::with_capacity(elements.len());
                for element in elements.iter() {
                    match element {
                        Value::String(s) => parts.push(s.as_str()),
                        other => {
                            return runtime_error(format!(
                                "all elements in list for `join` must be STRING, got {}",
                                other.type_name()
                            ))
                        }
                    }
                }
                Ok(Value::String(parts.join(separator)))
            }
            [Value::List(_), other] => runtime_error(format!(
                "second argument to `join` must be STRING, got {}",
                other.type_name()
            )),
            [other, _] => runtime_error(format!(
                "first argument to `join` must be LIST, got {}",
                other.type_name()
            )),
            _ => arity_error(args.len(), 2),
        });

        define_builtin!("trim", |args| {
            let [text] = expect_strings::<1>("trim", args)?;
            Ok(Value::String(text.trim().to_string()))
        });

        define_builtin!("upper", |args| {
            let [text] = expect_strings::<1>("upper", args)?;
            Ok(Value::String(text.to_uppercase()))
        });

        define_builtin!("lower", |args| {
            let [text] = expect_strings::<1>("lower", args)?;
            Ok(Value::String(text.to_lowercase()))
        });

        define_builtin!("replace", |args| {
            let [text, from, to] = expect_strings::<3>("replace", args)?;
            Ok(Value::String(text.replace(from, to)))
        });

        define_builtin!("contains", |args| {
            let [text, needle] = expect_strings::<2>("contains", args)?;
            Ok(Value::Boolean(text.contains(needle)))
        });

        // Math: numeric arguments are widened to floats.
        define_builtin!("abs", |args| unary_math("abs", args, f64::abs));
        define_builtin!("sqrt", |args| unary_math("sqrt", args, f64::sqrt));
        define_builtin!("sin", |args| unary_math("sin", args, f64::sin));
        define_builtin!("cos", |args| unary_math("cos", args, f64::cos));
        define_builtin!("tan", |args| unary_math("tan", args, f64::tan));

        define_builtin!("pow", |args| match args {
            [base, exponent] => {
                let Some(base) = as_float(base) else {
                    return runtime_error(format!(
                        "base for `pow` must be INTEGER or FLOAT, got {}",
                        base.type_name()
                    ));
                };
                let Some(exponent) = as_float(exponent) else {
                    return runtime_error(format!(
                        "exponent for `pow` must be INTEGER or FLOAT, got {}",
                        exponent.type_name()
                    ));
                };
                Ok(Value::Float(base.powf(exponent)))
            }
            _ => arity_error(args.len(), 2),
        });

        define_builtin!("random", |args| {
            if !args.is_empty() {
                return arity_error(args.len(), 0);
            }
            Ok(Value::Float(rand::thread_rng().gen::<f64>()))
        });

        Builtins { table }
    }
}

fn arity_message(got: usize, want: usize) -> String {
    format!("wrong number of arguments. got={}, want={}", got, want)
}

fn arity_fail(got: usize, want: usize) -> Value {
    Value::fail(arity_message(got, want))
}

fn arity_error<T>(got: usize, want: usize) -> Result<T> {
    runtime_error(arity_message(got, want))
}

fn expect_list<'a>(name: &str, args: &'a [Value]) -> Result<&'a [Value]> {
    match args {
        [Value::List(elements)] => Ok(elements.as_slice()),
        [other] => runtime_error(format!(
            "argument to `{}` must be LIST, got {}",
            name,
            other.type_name()
        )),
        _ => arity_error(args.len(), 1),
    }
}

const ORDINALS: [&str; 3] = ["first", "second", "third"];

/// Unpacks exactly `N` string arguments.
fn expect_strings<'a, const N: usize>(name: &str, args: &'a [Value]) -> Result<[&'a str; N]> {
    if args.len() != N {
        return arity_error(args.len(), N);
    }

    let mut strings = [""; N];
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Value::String(s) => strings[i] = s.as_str(),
            other if N == 1 => {
                return runtime_error(format!(
                    "argument to `{}` must be STRING, got {}",
                    name,
                    other.type_name()
                ))
            }
            other => {
                return runtime_error(format!(
                    "{} argument to `{}` must be STRING, got {}",
                    ORDINALS[i],
                    name,
                    other.type_name()
                ))
            }
        }
    }
    Ok(strings)
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}

fn unary_math(name: &str, args: &[Value], op: fn(f64) -> f64) -> Result<Value> {
    match args {
        [value] => match as_float(value) {
            Some(n) => Ok(Value::Float(op(n))),
            None => runtime_error(format!(
                "argument to `{}` must be INTEGER or FLOAT, got {}",
                name,
                value.type_name()
            )),
        },
        _ => arity_error(args.len(), 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        let builtins = Builtins::standard();
        let builtin = builtins
            .get(name)
            .unwrap_or_else(|| panic!("missing builtin {}", name));
        builtin.call(args)
    }

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn error_message(result: Result<Value>) -> String {
        match result {
            Err(Error::Runtime { message }) => message,
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_table_contents() {
        let builtins = Builtins::standard();
        for name in ["print", "len", "split", "int", "is_fail", "sqrt", "random"] {
            assert!(builtins.contains(name), "{}", name);
        }
        assert!(!builtins.contains("println"));
        assert!(Builtins::default().get("len").is_none());
    }

    #[test]
    fn test_int_conversion() -> Result<()> {
        assert_eq!(call("int", &[string("42")])?, Value::Integer(42));
        assert_eq!(call("int", &[string("-7")])?, Value::Integer(-7));
        assert_eq!(call("int", &[Value::Integer(5)])?, Value::Integer(5));
        assert_eq!(call("int", &[Value::Boolean(true)])?, Value::Integer(1));
        assert_eq!(
            call("int", &[string("abc")])?,
            Value::fail("could not parse string to int: abc")
        );
        assert_eq!(
            call("int", &[Value::Nil])?,
            Value::fail("argument to `int` not supported, got NIL")
        );
        assert_eq!(
            call("int", &[])?,
            Value::fail("wrong number of arguments. got=0, want=1")
        );
        Ok(())
    }

    #[test]
    fn test_other_conversions() -> Result<()> {
        assert_eq!(call("float", &[string("2.5")])?, Value::Float(2.5));
        assert_eq!(call("float", &[Value::Integer(2)])?, Value::Float(2.0));
        assert!(call("float", &[string("x")])?.is_fail());
        assert_eq!(call("string", &[Value::Float(1.5)])?, string("1.500000"));
        assert_eq!(call("bool", &[string("true")])?, Value::Boolean(true));
        assert_eq!(call("bool", &[Value::Integer(0)])?, Value::Boolean(false));
        assert!(call("bool", &[string("yes")])?.is_fail());
        assert_eq!(call("type", &[Value::list(Vec::new())])?, string("LIST"));
        assert_eq!(call("is_fail", &[Value::fail("x")])?, Value::Boolean(true));
        assert_eq!(call("is_fail", &[Value::Nil])?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn test_list_builtins() -> Result<()> {
        let list = Value::list(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(call("len", &[list.clone()])?, Value::Integer(3));
        assert_eq!(call("len", &[string("héllo")])?, Value::Integer(5));
        assert_eq!(call("first", &[list.clone()])?, Value::Integer(1));
        assert_eq!(call("last", &[list.clone()])?, Value::Integer(3));
        assert_eq!(
            call("rest", &[list.clone()])?,
            Value::list(vec![Value::Integer(2), Value::Integer(3)])
        );
        assert_eq!(call("rest", &[Value::list(Vec::new())])?, Value::Nil);
        assert_eq!(call("first", &[Value::list(Vec::new())])?, Value::Nil);
        assert_eq!(
            call("push", &[list.clone(), Value::Integer(4)])?.to_string(),
            "[1, 2, 3, 4]"
        );
        assert_eq!(list.to_string(), "[1, 2, 3]");
        Ok(())
    }

    #[test]
    fn test_list_misuse_is_an_error() {
        assert_eq!(
            error_message(call("len", &[Value::Integer(1)])),
            "argument to `len` not supported, got INTEGER"
        );
        assert_eq!(
            error_message(call("first", &[string("abc")])),
            "argument to `first` must be LIST, got STRING"
        );
        assert_eq!(
            error_message(call("push", &[Value::Nil])),
            "wrong number of arguments. got=1, want=2"
        );
    }

    #[test]
    fn test_string_builtins() -> Result<()> {
        assert_eq!(
            call("split", &[string("a,b,c"), string(",")])?.to_string(),
            "[a, b, c]"
        );
        assert_eq!(
            call(
                "join",
                &[Value::list(vec![string("a"), string("b")]), string("-")]
            )?,
            string("a-b")
        );
        assert_eq!(call("trim", &[string("  hi \n")])?, string("hi"));
        assert_eq!(call("upper", &[string("abc")])?, string("ABC"));
        assert_eq!(call("lower", &[string("ABC")])?, string("abc"));
        assert_eq!(
            call("replace", &[string("a-a"), string("-"), string("+")])?,
            string("a+a")
        );
        assert_eq!(
            call("contains", &[string("haystack"), string("st")])?,
            Value::Boolean(true)
        );
        Ok(())
    }

    #[test]
    fn test_string_misuse_is_an_error() {
        assert_eq!(
            error_message(call("upper", &[Value::Integer(1)])),
            "argument to `upper` must be STRING, got INTEGER"
        );
        assert_eq!(
            error_message(call("split", &[string("a"), Value::Nil])),
            "second argument to `split` must be STRING, got NIL"
        );
        assert_eq!(
            error_message(call("join", &[Value::list(vec![Value::Integer(1)]), string(",")])),
            "all elements in list for `join` must be STRING, got INTEGER"
        );
    }

    #[test]
    fn test_math_builtins() -> Result<()> {
        assert_eq!(call("abs", &[Value::Integer(-3)])?, Value::Float(3.0));
        assert_eq!(call("sqrt", &[Value::Float(16.0)])?, Value::Float(4.0));
        assert_eq!(
            call("pow", &[Value::Integer(2), Value::Integer(10)])?,
            Value::Float(1024.0)
        );
        assert_eq!(call("sin", &[Value::Integer(0)])?, Value::Float(0.0));
        assert_eq!(
            error_message(call("cos", &[string("x")])),
            "argument to `cos` must be INTEGER or FLOAT, got STRING"
        );
        assert_eq!(
            error_message(call("pow", &[Value::Integer(2), Value::Nil])),
            "exponent for `pow` must be INTEGER or FLOAT, got NIL"
        );

        match call("random", &[])? {
            Value::Float(n) => assert!((0.0..1.0).contains(&n)),
            other => panic!("expected float, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_file_builtins() -> Result<()> {
        let path = std::env::temp_dir().join(format!("duet-stdlib-{}.txt", std::process::id()));
        let path_value = string(&path.to_string_lossy());

        assert_eq!(
            call("write", &[path_value.clone(), string("one\ntwo\n")])?,
            Value::Boolean(true)
        );
        assert_eq!(call("read", &[path_value.clone()])?, string("one\ntwo\n"));
        assert_eq!(
            call("lines", &[path_value.clone()])?,
            Value::list(vec![string("one"), string("two")])
        );
        fs::remove_file(&path)?;

        assert!(call("read", &[path_value])?.is_fail());
        assert_eq!(
            call("write", &[Value::Integer(1), string("x")])?,
            Value::fail("first argument to `write` must be STRING, got INTEGER")
        );
        Ok(())
    }
}
