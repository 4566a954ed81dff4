use crate::{
    ast::FunctionStatement,
    environment::Scope,
    error::Result,
};
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

#[derive(Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Nil,
    Fail(String),
    Function(Rc<Closure>),
    List(Rc<Vec<Value>>),
    Map(Rc<IndexMap<HashKey, MapPair>>),
    Builtin(Builtin),
}

/// A user function together with the scope it was defined in.
pub struct Closure {
    pub definition: Rc<FunctionStatement>,
    pub scope: Scope,
}

impl Closure {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn arity(&self) -> usize {
        self.definition.parameters.len()
    }

    /// Zero-parameter supplier kinds are invoked on bare reference.
    pub fn is_forced_on_reference(&self) -> bool {
        self.definition.kind.is_supplier() && self.definition.parameters.is_empty()
    }
}

pub type NativeFunction = dyn Fn(&[Value]) -> Result<Value>;

#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    func: Rc<NativeFunction>,
}

impl Builtin {
    pub fn new(name: &'static str, func: impl Fn(&[Value]) -> Result<Value> + 'static) -> Self {
        Builtin {
            name,
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}

/// Canonical map key. The kind is part of the key, so `1` and `true` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    String(String),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapPair {
    pub key: Value,
    pub value: Value,
}

impl Value {
    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(Rc::new(elements))
    }

    pub fn map(pairs: IndexMap<HashKey, MapPair>) -> Value {
        Value::Map(Rc::new(pairs))
    }

    pub fn fail(message: impl Into<String>) -> Value {
        Value::Fail(message.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::Boolean(_) => "BOOLEAN",
            Value::Nil => "NIL",
            Value::Fail(_) => "FAIL",
            Value::Function(_) => "FUNCTION",
            Value::List(_) => "LIST",
            Value::Map(_) => "MAP",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    /// Everything except `nil` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Value::Fail(_))
    }

    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(n) => Some(HashKey::Integer(*n)),
            Value::String(s) => Some(HashKey::String(s.clone())),
            Value::Boolean(b) => Some(HashKey::Boolean(*b)),
            _ => None,
        }
    }

    /// Structural match of the value's kind against a declared type name
    /// (without its `?` suffix).
    pub fn matches_type(&self, type_name: &str) -> bool {
        matches!(
            (type_name, self),
            ("int", Value::Integer(_))
                | ("float", Value::Float(_))
                | ("str", Value::String(_))
                | ("bool", Value::Boolean(_))
                | ("list", Value::List(_))
                | ("map", Value::Map(_))
        )
    }

    /// Identity comparison used by `==` between kinds with no dedicated rule.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Fail(a), Value::Fail(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:.6}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Fail(message) => write!(f, "{}", message),
            Value::Function(closure) => write!(f, "{}", closure.definition),
            Value::List(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, pair) in pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::Builtin(_) => write!(f, "builtin function"),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Fail(message) => write!(f, "Fail({:?})", message),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Value::List(elements) => f.debug_list().entries(elements.iter()).finish(),
            _ => write!(f, "{}", self),
        }
    }
}

impl Debug for Closure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition)
    }
}

impl Debug for Builtin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin {}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(2.5).to_string(), "2.500000");
        assert_eq!(Value::String("hello".to_string()).to_string(), "hello");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::fail("boom").to_string(), "boom");
        assert_eq!(
            Value::list(vec![Value::Integer(1), Value::String("a".to_string())]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_map_display_keeps_insertion_order() {
        let mut pairs = IndexMap::new();
        for (key, value) in [("b", 2), ("a", 1)] {
            let key = Value::String(key.to_string());
            pairs.insert(
                key.hash_key().expect("strings are hashable"),
                MapPair {
                    key,
                    value: Value::Integer(value),
                },
            );
        }

        assert_eq!(Value::map(pairs).to_string(), "{b: 2, a: 1}");
    }

    #[test]
    fn test_value_debug() {
        let list = Value::list(vec![Value::Integer(42), Value::String("hello".to_string())]);

        assert_eq!(format!("{:?}", list), "[42, \"hello\"]");
        assert_eq!(format!("{:?}", Value::fail("no")), "Fail(\"no\")");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(Value::list(Vec::new()).is_truthy());
    }

    #[test]
    fn test_hash_keys_do_not_collide_across_kinds() {
        let one = Value::Integer(1).hash_key();
        let yes = Value::Boolean(true).hash_key();
        let text = Value::String("1".to_string()).hash_key();

        assert_ne!(one, yes);
        assert_ne!(one, text);
        assert_eq!(Value::Float(1.0).hash_key(), None);
        assert_eq!(Value::Nil.hash_key(), None);
    }

    #[test]
    fn test_matches_type() {
        assert!(Value::Integer(1).matches_type("int"));
        assert!(Value::Float(1.0).matches_type("float"));
        assert!(Value::String(String::new()).matches_type("str"));
        assert!(Value::Boolean(false).matches_type("bool"));
        assert!(Value::list(Vec::new()).matches_type("list"));
        assert!(Value::map(IndexMap::new()).matches_type("map"));
        assert!(!Value::Integer(1).matches_type("float"));
        assert!(!Value::fail("x").matches_type("str"));
        assert!(!Value::Nil.matches_type("nil"));
    }

    #[test]
    fn test_identity() {
        let list = Value::list(vec![Value::Integer(1)]);
        assert!(list.is_identical(&list.clone()));
        assert!(!list.is_identical(&Value::list(vec![Value::Integer(1)])));
        assert!(Value::Nil.is_identical(&Value::Nil));
        assert!(!Value::Integer(1).is_identical(&Value::Float(1.0)));
    }
}
