use crate::{
    ast::{
        base_type, is_fallible_type, Expression, InfixOp, MatchCase, PrefixOp, Program,
        Statement,
    },
    environment::Scope,
    error::{runtime_error, Result},
    parser::parse,
    stack::ensure_sufficient_stack,
    stdlib::Builtins,
    value::{Closure, MapPair, Value},
};
use indexmap::IndexMap;
use log::{debug, trace};
use std::rc::Rc;

/// Longest string `*` may build.
const MAX_REPEAT_BYTES: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Upper bound on nested user-function applications.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: 10_000,
        }
    }
}

/// Outcome of evaluating a call's argument list.
enum Arguments {
    Evaluated(Vec<Value>),
    /// A literal `fail` argument; the call yields it without applying the callee.
    Failed(Value),
}

pub struct Interpreter {
    builtins: Builtins,
    config: Config,
    depth: usize,
}

impl Interpreter {
    pub fn new(builtins: Builtins) -> Self {
        Interpreter::with_config(builtins, Config::default())
    }

    pub fn with_config(builtins: Builtins, config: Config) -> Self {
        Interpreter {
            builtins,
            config,
            depth: 0,
        }
    }

    /// Parses and runs `source` in `scope`.
    pub fn run_source(&mut self, source: &str, scope: &Scope) -> Result<Option<Value>> {
        let program = parse(source)?;
        self.run(&program, scope)
    }

    /// Runs every statement in order and yields the value of the last one;
    /// a function definition yields nothing.
    pub fn run(&mut self, program: &Program, scope: &Scope) -> Result<Option<Value>> {
        let mut result = None;
        for statement in &program.statements {
            result = self.execute(statement, scope)?;
        }
        Ok(result)
    }

    fn execute(&mut self, statement: &Statement, scope: &Scope) -> Result<Option<Value>> {
        match statement {
            Statement::Function(definition) => {
                debug!("defining {} {}", definition.kind.keyword(), definition.name);
                if scope.contains_local(&definition.name) {
                    debug!("{} replaces an earlier binding", definition.name);
                } else if self.builtins.contains(&definition.name) {
                    debug!("{} shadows a builtin", definition.name);
                }
                let closure = Closure {
                    definition: Rc::clone(definition),
                    scope: scope.clone(),
                };
                scope.set(definition.name.clone(), Value::Function(Rc::new(closure)));
                Ok(None)
            }
            Statement::Expression(expression) => self.evaluate(expression, scope).map(Some),
        }
    }

    pub fn evaluate(&mut self, expression: &Expression, scope: &Scope) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_expression(expression, scope))
    }

    fn evaluate_expression(&mut self, expression: &Expression, scope: &Scope) -> Result<Value> {
        match expression {
            Expression::Identifier(name) => self.evaluate_identifier(name, scope),
            Expression::Integer(n) => Ok(Value::Integer(*n)),
            Expression::Float(n) => Ok(Value::Float(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Boolean(b) => Ok(Value::Boolean(*b)),
            Expression::Nil => Ok(Value::Nil),
            Expression::Fail(message) => Ok(Value::Fail(message.clone())),
            Expression::Prefix { operator, right } => {
                let right = self.evaluate(right, scope)?;
                evaluate_prefix(*operator, right)
            }
            Expression::Infix {
                left,
                operator: InfixOp::Pipeline,
                right,
            } => self.evaluate_pipeline(left, right, scope),
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, scope)?;
                let right = self.evaluate(right, scope)?;
                evaluate_infix(*operator, &left, &right)
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                if self.evaluate(condition, scope)?.is_truthy() {
                    self.evaluate(consequence, scope)
                } else if let Some(alternative) = alternative {
                    self.evaluate(alternative, scope)
                } else {
                    Ok(Value::Nil)
                }
            }
            Expression::For {
                variable,
                collection,
                body,
            } => self.evaluate_for(variable, collection, body, scope),
            Expression::Match {
                subject,
                cases,
                default,
            } => self.evaluate_match(subject, cases, default.as_deref(), scope),
            Expression::Call {
                function,
                arguments,
            } => {
                let function = self.evaluate(function, scope)?;
                match self.evaluate_arguments(arguments, scope)? {
                    Arguments::Evaluated(arguments) => self.apply(&function, arguments),
                    Arguments::Failed(fail) => Ok(fail),
                }
            }
            Expression::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element, scope)?);
                }
                Ok(Value::list(values))
            }
            Expression::Map(pairs) => self.evaluate_map(pairs, scope),
            Expression::Index { left, index } => {
                let left = self.evaluate(left, scope)?;
                let index = self.evaluate(index, scope)?;
                evaluate_index(&left, &index)
            }
        }
    }

    fn evaluate_identifier(&mut self, name: &str, scope: &Scope) -> Result<Value> {
        if let Some(value) = scope.get(name) {
            return match &value {
                Value::Function(closure) if closure.is_forced_on_reference() => {
                    trace!("forcing supplier {}", name);
                    self.apply(&value, Vec::new())
                }
                _ => Ok(value),
            };
        }

        match self.builtins.get(name) {
            Some(builtin) => Ok(Value::Builtin(builtin.clone())),
            None => runtime_error(format!("identifier not found: {}", name)),
        }
    }

    fn evaluate_pipeline(
        &mut self,
        left: &Expression,
        right: &Expression,
        scope: &Scope,
    ) -> Result<Value> {
        let piped = match self.evaluate(left, scope)? {
            Value::Function(closure) if closure.arity() == 0 => {
                self.apply(&Value::Function(closure), Vec::new())?
            }
            Value::Builtin(builtin) => builtin.call(&[])?,
            value => value,
        };

        if let Expression::Call {
            function,
            arguments,
        } = right
        {
            let function = self.evaluate(function, scope)?;
            return match self.evaluate_arguments(arguments, scope)? {
                Arguments::Evaluated(arguments) => {
                    let mut all = Vec::with_capacity(arguments.len() + 1);
                    all.push(piped);
                    all.extend(arguments);
                    self.apply(&function, all)
                }
                Arguments::Failed(fail) => Ok(fail),
            };
        }

        let function = self.evaluate(right, scope)?;
        self.apply(&function, vec![piped])
    }

    fn evaluate_arguments(&mut self, arguments: &[Expression], scope: &Scope) -> Result<Arguments> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.evaluate(argument, scope)?;
            if let Expression::Fail(_) = argument {
                return Ok(Arguments::Failed(value));
            }
            values.push(value);
        }
        Ok(Arguments::Evaluated(values))
    }

    fn evaluate_for(
        &mut self,
        variable: &str,
        collection: &Expression,
        body: &Expression,
        scope: &Scope,
    ) -> Result<Value> {
        let elements = match self.evaluate(collection, scope)? {
            Value::List(elements) => elements,
            other => {
                return runtime_error(format!(
                    "for loop must iterate over a list, got {}",
                    other.type_name()
                ))
            }
        };

        let mut results = Vec::with_capacity(elements.len());
        for element in elements.iter() {
            let iteration = scope.enclosed();
            iteration.set(variable, element.clone());
            results.push(self.evaluate(body, &iteration)?);
        }
        Ok(Value::list(results))
    }

    fn evaluate_match(
        &mut self,
        subject: &Expression,
        cases: &[MatchCase],
        default: Option<&Expression>,
        scope: &Scope,
    ) -> Result<Value> {
        self.evaluate(subject, scope)?;

        for case in cases {
            if self.evaluate(&case.condition, scope)?.is_truthy() {
                return self.evaluate(&case.consequence, scope);
            }
        }

        match default {
            Some(default) => self.evaluate(default, scope),
            None => Ok(Value::Nil),
        }
    }

    fn evaluate_map(&mut self, pairs: &[(Expression, Expression)], scope: &Scope) -> Result<Value> {
        let mut map = IndexMap::with_capacity(pairs.len());
        for (key_expression, value_expression) in pairs {
            let key = self.evaluate(key_expression, scope)?;
            let Some(hash_key) = key.hash_key() else {
                return runtime_error(format!("unusable as hash key: {}", key.type_name()));
            };
            let value = self.evaluate(value_expression, scope)?;
            map.insert(hash_key, MapPair { key, value });
        }
        Ok(Value::map(map))
    }

    /// Applies a callable to already evaluated arguments.
    pub fn apply(&mut self, function: &Value, arguments: Vec<Value>) -> Result<Value> {
        match function {
            Value::Builtin(builtin) => {
                if let Some(fail) = arguments.iter().find(|argument| argument.is_fail()) {
                    return Ok(fail.clone());
                }
                trace!("calling builtin {}", builtin.name);
                builtin.call(&arguments)
            }
            Value::Function(closure) => {
                if self.depth >= self.config.max_call_depth {
                    return runtime_error(format!(
                        "maximum recursion depth exceeded (limit: {})",
                        self.config.max_call_depth
                    ));
                }

                self.depth += 1;
                let result = self.apply_closure(closure, arguments);
                self.depth -= 1;
                result
            }
            other => runtime_error(format!("not a function: {}", other.type_name())),
        }
    }

    fn apply_closure(&mut self, closure: &Closure, arguments: Vec<Value>) -> Result<Value> {
        let definition = &closure.definition;
        trace!("applying {} with {} arguments", closure.name(), arguments.len());

        if arguments.len() != definition.parameters.len() {
            return runtime_error(format!(
                "wrong number of arguments. got={}, want={}",
                arguments.len(),
                definition.parameters.len()
            ));
        }

        let call_scope = closure.scope.enclosed();
        for (parameter, argument) in definition.parameters.iter().zip(arguments) {
            let accepts_fail = is_fallible_type(&parameter.type_name) && argument.is_fail();
            let expected = base_type(&parameter.type_name);
            if !accepts_fail && !argument.matches_type(expected) {
                return runtime_error(format!(
                    "type error: wrong type for argument {}. got={}, want={}",
                    parameter.name,
                    argument.type_name(),
                    expected
                ));
            }
            call_scope.set(parameter.name.clone(), argument);
        }

        let result = self.evaluate(&definition.body, &call_scope)?;

        let Some(return_type) = &definition.return_type else {
            return Ok(result);
        };

        if result.is_fail() {
            if is_fallible_type(return_type) || definition.kind.is_fallible() {
                return Ok(result);
            }
            return runtime_error(format!(
                "type error: function {} returned FAIL, but return type '{}' is not marked as fallible (use '{}?')",
                closure.name(), return_type, return_type
            ));
        }

        if !result.matches_type(base_type(return_type)) {
            return runtime_error(format!(
                "type error: function {} returned {}, but expected {}",
                closure.name(),
                result.type_name(),
                return_type
            ));
        }

        Ok(result)
    }
}

fn evaluate_prefix(operator: PrefixOp, right: Value) -> Result<Value> {
    match operator {
        PrefixOp::Not => Ok(Value::Boolean(matches!(
            right,
            Value::Nil | Value::Boolean(false)
        ))),
        PrefixOp::Negate => match right {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => runtime_error(format!("unknown operator: -{}", other.type_name())),
        },
    }
}

fn evaluate_infix(operator: InfixOp, left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => evaluate_integer_infix(operator, *a, *b),
        (Value::Float(a), Value::Float(b)) => evaluate_float_infix(operator, *a, *b),
        (Value::String(a), Value::String(b)) => match operator {
            InfixOp::Add => Ok(Value::String(format!("{}{}", a, b))),
            InfixOp::Equal => Ok(Value::Boolean(a == b)),
            InfixOp::NotEqual => Ok(Value::Boolean(a != b)),
            _ => unknown_operator(operator, left, right),
        },
        (Value::String(a), Value::Integer(b)) => match operator {
            InfixOp::Add => Ok(Value::String(format!("{}{}", a, b))),
            InfixOp::Multiply => repeat_string(a, *b),
            InfixOp::Equal => Ok(Value::Boolean(false)),
            InfixOp::NotEqual => Ok(Value::Boolean(true)),
            _ => unknown_operator(operator, left, right),
        },
        _ => match operator {
            InfixOp::Equal => Ok(Value::Boolean(left.is_identical(right))),
            InfixOp::NotEqual => Ok(Value::Boolean(!left.is_identical(right))),
            _ if left.type_name() != right.type_name() => runtime_error(format!(
                "type mismatch: {} {} {}",
                left.type_name(),
                operator.symbol(),
                right.type_name()
            )),
            _ => unknown_operator(operator, left, right),
        },
    }
}

fn repeat_string(text: &str, count: i64) -> Result<Value> {
    let count = usize::try_from(count).unwrap_or(0);
    match text.len().checked_mul(count) {
        Some(bytes) if bytes <= MAX_REPEAT_BYTES => Ok(Value::String(text.repeat(count))),
        _ => runtime_error(format!(
            "string repetition too large: {} bytes * {}",
            text.len(),
            count
        )),
    }
}

fn unknown_operator(operator: InfixOp, left: &Value, right: &Value) -> Result<Value> {
    runtime_error(format!(
        "unknown operator: {} {} {}",
        left.type_name(),
        operator.symbol(),
        right.type_name()
    ))
}

fn evaluate_integer_infix(operator: InfixOp, a: i64, b: i64) -> Result<Value> {
    let value = match operator {
        InfixOp::Add => Value::Integer(a.wrapping_add(b)),
        InfixOp::Subtract => Value::Integer(a.wrapping_sub(b)),
        InfixOp::Multiply => Value::Integer(a.wrapping_mul(b)),
        InfixOp::Divide | InfixOp::Modulo if b == 0 => return runtime_error("division by zero"),
        InfixOp::Divide => Value::Integer(a.wrapping_div(b)),
        InfixOp::Modulo => Value::Integer(a.wrapping_rem(b)),
        InfixOp::Less => Value::Boolean(a < b),
        InfixOp::LessEqual => Value::Boolean(a <= b),
        InfixOp::Greater => Value::Boolean(a > b),
        InfixOp::GreaterEqual => Value::Boolean(a >= b),
        InfixOp::Equal => Value::Boolean(a == b),
        InfixOp::NotEqual => Value::Boolean(a != b),
        InfixOp::Pipeline => {
            return unknown_operator(operator, &Value::Integer(a), &Value::Integer(b))
        }
    };
    Ok(value)
}

fn evaluate_float_infix(operator: InfixOp, a: f64, b: f64) -> Result<Value> {
    let value = match operator {
        InfixOp::Add => Value::Float(a + b),
        InfixOp::Subtract => Value::Float(a - b),
        InfixOp::Multiply => Value::Float(a * b),
        InfixOp::Divide | InfixOp::Modulo if b == 0.0 => {
            return runtime_error("division by zero")
        }
        InfixOp::Divide => Value::Float(a / b),
        InfixOp::Less => Value::Boolean(a < b),
        InfixOp::LessEqual => Value::Boolean(a <= b),
        InfixOp::Greater => Value::Boolean(a > b),
        InfixOp::GreaterEqual => Value::Boolean(a >= b),
        InfixOp::Equal => Value::Boolean(a == b),
        InfixOp::NotEqual => Value::Boolean(a != b),
        InfixOp::Modulo | InfixOp::Pipeline => {
            return unknown_operator(operator, &Value::Float(a), &Value::Float(b))
        }
    };
    Ok(value)
}

fn evaluate_index(left: &Value, index: &Value) -> Result<Value> {
    match (left, index) {
        (Value::List(elements), Value::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Value::Nil)),
        (Value::Map(pairs), _) => match index.hash_key() {
            Some(key) => Ok(pairs
                .get(&key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Value::Nil)),
            None => runtime_error(format!("unusable as hash key: {}", index.type_name())),
        },
        _ => runtime_error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn eval(source: &str) -> Result<Option<Value>> {
        let mut interpreter = Interpreter::new(Builtins::standard());
        interpreter.run_source(source, &Scope::new())
    }

    fn eval_value(source: &str) -> Result<Value> {
        Ok(eval(source)?.expect("program should produce a value"))
    }

    fn eval_error(source: &str) -> String {
        match eval(source) {
            Err(Error::Runtime { message }) => message,
            other => panic!("expected runtime error for {:?}, got {:?}", source, other),
        }
    }

    #[test]
    fn test_integer_arithmetic() -> Result<()> {
        assert_eq!(eval_value("2 + 3 * 4")?, Value::Integer(14));
        assert_eq!(eval_value("(2 + 3) * 4")?, Value::Integer(20));
        assert_eq!(eval_value("7 / 2")?, Value::Integer(3));
        assert_eq!(eval_value("-7 / 2")?, Value::Integer(-3));
        assert_eq!(eval_value("-7 % 2")?, Value::Integer(-1));
        assert_eq!(eval_value("10 - 12")?, Value::Integer(-2));
        assert_eq!(eval_value("--5")?, Value::Integer(5));
        Ok(())
    }

    #[test]
    fn test_division_identity() -> Result<()> {
        for (a, b) in [(7, 2), (-7, 2), (7, -2), (-7, -2), (0, 5), (13, 13)] {
            let source = format!("({a} / {b}) * {b} + {a} % {b} == {a}");
            assert_eq!(eval_value(&source)?, Value::Boolean(true), "{}", source);
        }
        Ok(())
    }

    #[test]
    fn test_integer_overflow_wraps() -> Result<()> {
        assert_eq!(
            eval_value("9223372036854775807 + 1")?,
            Value::Integer(i64::MIN)
        );
        assert_eq!(
            eval_value("(-9223372036854775807 - 1) / -1")?,
            Value::Integer(i64::MIN)
        );
        Ok(())
    }

    #[test]
    fn test_float_arithmetic() -> Result<()> {
        assert_eq!(eval_value("1.5 + 2.25")?, Value::Float(3.75));
        assert_eq!(eval_value("-1.5")?, Value::Float(-1.5));
        assert_eq!(eval_value("1.5 < 2.5")?, Value::Boolean(true));
        assert_eq!(eval_value("2.0 >= 2.0")?, Value::Boolean(true));
        assert!(eval_error("1.5 % 2.0").starts_with("unknown operator"));
        Ok(())
    }

    #[test]
    fn test_division_by_zero() {
        for source in ["1 / 0", "1 % 0", "1.0 / 0.0", "1.0 % 0.0"] {
            assert!(
                eval_error(source).contains("division by zero"),
                "{}",
                source
            );
        }
    }

    #[test]
    fn test_mixed_numeric_kinds_mismatch() {
        assert_eq!(eval_error("1 + 1.0"), "type mismatch: INTEGER + FLOAT");
        assert_eq!(eval_error("true + true"), "unknown operator: BOOLEAN + BOOLEAN");
        assert_eq!(eval_error("-true"), "unknown operator: -BOOLEAN");
    }

    #[test]
    fn test_strings() -> Result<()> {
        assert_eq!(eval_value("\"ab\" + \"cd\"")?, Value::String("abcd".to_string()));
        assert_eq!(eval_value("\"ab\" * 3")?, Value::String("ababab".to_string()));
        assert_eq!(eval_value("\"ab\" * 0")?, Value::String(String::new()));
        assert_eq!(eval_value("\"ab\" * -2")?, Value::String(String::new()));
        assert_eq!(eval_value("\"n\" + 1")?, Value::String("n1".to_string()));
        assert_eq!(eval_value("\"a\" == \"a\"")?, Value::Boolean(true));
        assert_eq!(eval_value("\"a\" != \"b\"")?, Value::Boolean(true));
        assert!(eval_error("\"a\" - \"b\"").starts_with("unknown operator"));
        assert_eq!(eval_value("\"\" * 9223372036854775807")?, Value::String(String::new()));
        assert!(eval_error("\"ab\" * 9223372036854775807")
            .starts_with("string repetition too large"));
        assert!(eval_error("\"abc\" * 100000000").starts_with("string repetition too large"));
        Ok(())
    }

    #[test]
    fn test_cross_kind_equality_is_symmetric() -> Result<()> {
        for source in ["1 == \"1\"", "\"1\" == 1", "true == 1", "1 == true", "nil == 0"] {
            assert_eq!(eval_value(source)?, Value::Boolean(false), "{}", source);
        }
        for source in ["1 != \"1\"", "\"1\" != 1", "1.0 != 1"] {
            assert_eq!(eval_value(source)?, Value::Boolean(true), "{}", source);
        }
        Ok(())
    }

    #[test]
    fn test_deeply_nested_expressions() -> Result<()> {
        let source = format!("{}1", "-".repeat(5_000));
        assert_eq!(eval_value(&source)?, Value::Integer(1));

        let definition = format!("proc deep(): int -> {}7\ndeep", "!".repeat(5_000));
        let rendered = eval_value(&definition)?.to_string();
        assert!(rendered.starts_with("proc deep(): int -> (!(!"));
        assert!(rendered.ends_with(&")".repeat(5_000)));
        Ok(())
    }

    #[test]
    fn test_bang_and_equality() -> Result<()> {
        assert_eq!(eval_value("!true")?, Value::Boolean(false));
        assert_eq!(eval_value("!false")?, Value::Boolean(true));
        assert_eq!(eval_value("!nil")?, Value::Boolean(true));
        assert_eq!(eval_value("!5")?, Value::Boolean(false));
        assert_eq!(eval_value("!!\"\"")?, Value::Boolean(true));
        assert_eq!(eval_value("true == true")?, Value::Boolean(true));
        assert_eq!(eval_value("true != false")?, Value::Boolean(true));
        assert_eq!(eval_value("nil == nil")?, Value::Boolean(true));
        assert_eq!(eval_value("1 == true")?, Value::Boolean(false));
        assert_eq!(eval_value("1 == 1.0")?, Value::Boolean(false));
        assert_eq!(eval_value("[1] == [1]")?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn test_if_expressions() -> Result<()> {
        assert_eq!(eval_value("if true then 1 else 2")?, Value::Integer(1));
        assert_eq!(eval_value("if nil then 1 else 2")?, Value::Integer(2));
        assert_eq!(eval_value("if 0 then 1 else 2")?, Value::Integer(1));
        assert_eq!(eval_value("if false then 1")?, Value::Nil);
        Ok(())
    }

    #[test]
    fn test_for_expressions() -> Result<()> {
        assert_eq!(
            eval_value("for x in [1,2,3] then x * 2")?,
            Value::list(vec![Value::Integer(2), Value::Integer(4), Value::Integer(6)])
        );
        assert_eq!(eval_value("for x in [] then x")?, Value::list(Vec::new()));
        assert_eq!(
            eval_error("for x in 5 then x"),
            "for loop must iterate over a list, got INTEGER"
        );
        assert!(eval_error("for x in [1, 0] then 1 / x").contains("division by zero"));
        Ok(())
    }

    #[test]
    fn test_loop_variable_does_not_leak() {
        assert_eq!(eval_error("for x in [1] then x\nx"), "identifier not found: x");
    }

    #[test]
    fn test_match_expressions() -> Result<()> {
        let program = "proc sign(n: int): str -> match n is n < 0 then \"negative\" is n == 0 then \"zero\" default \"positive\"\n";
        assert_eq!(
            eval_value(&format!("{}sign(-4)", program))?,
            Value::String("negative".to_string())
        );
        assert_eq!(
            eval_value(&format!("{}sign(0)", program))?,
            Value::String("zero".to_string())
        );
        assert_eq!(
            eval_value(&format!("{}sign(9)", program))?,
            Value::String("positive".to_string())
        );
        assert_eq!(eval_value("match 1 is false then 2")?, Value::Nil);
        assert!(eval_error("match missing is true then 1").contains("identifier not found"));
        Ok(())
    }

    #[test]
    fn test_functions() -> Result<()> {
        assert_eq!(
            eval_value("proc add(a:int, b:int):int -> a + b\nadd(2,3)")?,
            Value::Integer(5)
        );
        assert_eq!(eval("proc add(a:int, b:int):int -> a + b")?, None);
        assert_eq!(
            eval_value("proc fact(n: int): int -> if n <= 1 then 1 else n * fact(n - 1)\nfact(10)")?,
            Value::Integer(3628800)
        );
        assert_eq!(
            eval_value("proc twice(x: int): int -> x * 2\nproc quad(x: int): int -> twice(twice(x))\nquad(3)")?,
            Value::Integer(12)
        );
        Ok(())
    }

    #[test]
    fn test_function_value_display() -> Result<()> {
        assert_eq!(
            eval_value("proc add(a:int, b:int):int -> a + b\nadd")?.to_string(),
            "proc add(a: int, b: int): int -> (a + b)"
        );
        Ok(())
    }

    #[test]
    fn test_arity_and_type_errors() {
        assert_eq!(
            eval_error("proc id(a: int): int -> a\nid(1, 2)"),
            "wrong number of arguments. got=2, want=1"
        );
        assert_eq!(
            eval_error("proc id(a: int): int -> a\nid(\"x\")"),
            "type error: wrong type for argument a. got=STRING, want=int"
        );
        assert_eq!(
            eval_error("proc bad(a: int): str -> a\nbad(1)"),
            "type error: function bad returned INTEGER, but expected str"
        );
        assert_eq!(eval_error("5(1)"), "not a function: INTEGER");
    }

    #[test]
    fn test_fail_return_requires_fallible_type() -> Result<()> {
        let message = eval_error("proc f(a:int):int -> fail \"no\"\nf(1)");
        assert!(message.contains("function f"), "{}", message);
        assert_eq!(
            eval_value("proc f(a:int):int? -> fail \"no\"\nf(1)")?,
            Value::fail("no")
        );
        assert_eq!(eval_value("proc f(a:int):int? -> a\nf(1)")?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_fallible_parameters() -> Result<()> {
        let program = "esupp broken: str -> fail \"bad input\"\n";
        assert_eq!(
            eval_value(&format!("{}proc echo(s: str?): str? -> s\necho(\"hi\")", program))?,
            Value::String("hi".to_string())
        );
        assert_eq!(
            eval_value(&format!("{}proc echo(s: str?): str? -> s\necho(broken)", program))?,
            Value::fail("bad input")
        );
        assert!(eval_error(&format!("{}proc strict(s: str): str -> s\nstrict(broken)", program))
            .starts_with("type error: wrong type for argument s"));
        Ok(())
    }

    #[test]
    fn test_suppliers_are_forced_on_reference() -> Result<()> {
        assert_eq!(eval_value("supp answer: int -> 42\nanswer")?, Value::Integer(42));
        assert_eq!(eval_value("supp answer: int -> 42\nanswer + 1")?, Value::Integer(43));
        assert!(eval_error("supp answer: int -> fail \"no\"\nanswer").contains("function answer"));
        assert_eq!(eval_value("esupp risky: int -> fail \"no\"\nrisky")?, Value::fail("no"));
        Ok(())
    }

    #[test]
    fn test_literal_fail_argument_short_circuits() -> Result<()> {
        let program = "proc add(a:int, b:int):int -> a + b\n";
        assert_eq!(
            eval_value(&format!("{}add(1, fail \"boom\")", program))?,
            Value::fail("boom")
        );
        assert_eq!(
            eval_value(&format!("{}add(fail \"boom\", 2)", program))?,
            Value::fail("boom")
        );
        assert_eq!(eval_value("len(fail \"boom\")")?, Value::fail("boom"));
        assert!(eval_error(&format!("{}add(1 / 0, fail \"boom\")", program))
            .contains("division by zero"));
        Ok(())
    }

    #[test]
    fn test_builtins_are_fail_transparent() -> Result<()> {
        assert_eq!(
            eval_value("esupp nope: str -> fail \"nope\"\nupper(nope)")?,
            Value::fail("nope")
        );
        assert_eq!(eval_value("fail \"x\" |> len")?, Value::fail("x"));
        Ok(())
    }

    #[test]
    fn test_pipelines() -> Result<()> {
        assert_eq!(eval_value("\"1\" |> int")?, Value::Integer(1));
        assert_eq!(eval_value("5 |> int")?, Value::Integer(5));
        assert_eq!(
            eval_value("proc inc(x:int):int -> x + 1\nproc dbl(x:int):int -> x * 2\n3 |> inc |> dbl")?,
            Value::Integer(8)
        );
        assert_eq!(
            eval_value("proc f(a:int, b:int, c:int):list -> [a, b, c]\n0 |> f(1, 2)")?,
            Value::list(vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(
            eval_value("supp seed: int -> 20\nproc inc(x:int):int -> x + 1\nseed |> inc")?,
            Value::Integer(21)
        );
        assert_eq!(
            eval_value("proc zero(): int -> 0\nproc inc(x:int):int -> x + 1\nzero |> inc")?,
            Value::Integer(1)
        );
        assert_eq!(eval_error("1 |> 2"), "not a function: INTEGER");
        Ok(())
    }

    #[test]
    fn test_fail_flows_through_pipelines() -> Result<()> {
        assert_eq!(
            eval_value("proc handle(s: str?): str -> if is_fail(s) then \"recovered\" else s\nfail \"x\" |> handle")?,
            Value::String("recovered".to_string())
        );
        assert_eq!(eval_value("\"abc\" |> int")?.type_name(), "FAIL");
        Ok(())
    }

    #[test]
    fn test_lists_and_indexing() -> Result<()> {
        assert_eq!(eval_value("[1, 2, 3][1]")?, Value::Integer(2));
        assert_eq!(eval_value("[1, 2, 3][3]")?, Value::Nil);
        assert_eq!(eval_value("[1, 2, 3][-1]")?, Value::Nil);
        assert_eq!(eval_value("[][0]")?, Value::Nil);
        assert!(eval_error("[1 / 0]").contains("division by zero"));
        assert_eq!(eval_error("5[0]"), "index operator not supported: INTEGER");
        assert_eq!(eval_error("[1][\"a\"]"), "index operator not supported: LIST");
        Ok(())
    }

    #[test]
    fn test_maps() -> Result<()> {
        assert_eq!(eval_value("{\"a\": 1, 2: \"two\", true: nil}[2]")?, Value::String("two".to_string()));
        assert_eq!(eval_value("{\"a\": 1}[\"b\"]")?, Value::Nil);
        assert_eq!(eval_value("{1: \"int\", true: \"bool\"}[true]")?, Value::String("bool".to_string()));
        assert_eq!(eval_value("{\"k\": 1, \"k\": 2}[\"k\"]")?, Value::Integer(2));
        assert_eq!(
            eval_value("{\"b\": 1, \"a\": 2, \"b\": 3}")?.to_string(),
            "{b: 3, a: 2}"
        );
        assert_eq!(eval_error("{[1]: 2}"), "unusable as hash key: LIST");
        assert_eq!(eval_error("{1: 2}[[1]]"), "unusable as hash key: LIST");
        Ok(())
    }

    #[test]
    fn test_unknown_identifier() {
        assert_eq!(eval_error("nonexistent"), "identifier not found: nonexistent");
    }

    #[test]
    fn test_error_stops_program() {
        assert!(eval_error("1 / 0\nmissing").contains("division by zero"));
    }

    #[test]
    fn test_closures_capture_defining_scope() -> Result<()> {
        let scope = Scope::new();
        let mut interpreter = Interpreter::new(Builtins::standard());
        interpreter.run_source("proc get(): int -> base", &scope)?;
        assert!(interpreter.run_source("get()", &scope).is_err());

        scope.set("base", Value::Integer(7));
        assert_eq!(interpreter.run_source("get()", &scope)?, Some(Value::Integer(7)));
        Ok(())
    }

    #[test]
    fn test_definitions_replace_and_shadow() -> Result<()> {
        assert_eq!(
            eval_value("proc f(): int -> 1\nproc f(): int -> 2\nf()")?,
            Value::Integer(2)
        );
        assert_eq!(
            eval_value("proc len(x: str): str -> \"mine\"\nlen(\"abc\")")?,
            Value::String("mine".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_call_scopes_are_isolated() {
        assert_eq!(
            eval_error("proc first(secret: int): int -> secret\nproc second(x: int): int -> secret\nfirst(1)\nsecond(2)"),
            "identifier not found: secret"
        );
    }

    #[test]
    fn test_recursion_limit() {
        let builtins = Builtins::standard();
        let mut interpreter = Interpreter::with_config(builtins, Config { max_call_depth: 50 });
        let result = interpreter.run_source(
            "proc down(n: int): int -> if n == 0 then 0 else down(n - 1)\ndown(100)",
            &Scope::new(),
        );
        match result {
            Err(Error::Runtime { message }) => {
                assert_eq!(message, "maximum recursion depth exceeded (limit: 50)")
            }
            other => panic!("expected recursion error, got {:?}", other),
        }

        let mut interpreter = Interpreter::with_config(Builtins::standard(), Config { max_call_depth: 50 });
        let scope = Scope::new();
        assert!(interpreter
            .run_source("proc down(n: int): int -> if n == 0 then 0 else down(n - 1)\ndown(100)", &scope)
            .is_err());
        assert_eq!(
            interpreter.run_source("down(10)", &scope).ok().flatten(),
            Some(Value::Integer(0))
        );
    }
}
