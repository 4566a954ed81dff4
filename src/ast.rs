use crate::stack::ensure_sufficient_stack;
use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Function(Rc<FunctionStatement>),
    Expression(Expression),
}

/// The four declaration forms. They differ in signature shape and in whether a
/// bare reference invokes the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `proc name(p: t, ...): r -> body`
    Proc,
    /// `cons name(p: t, ...) -> body`
    Cons,
    /// `supp name: r -> body`
    Supp,
    /// `esupp name: r -> body`, a supplier that may return a fail value.
    ESupp,
}

impl FunctionKind {
    pub fn keyword(self) -> &'static str {
        match self {
            FunctionKind::Proc => "proc",
            FunctionKind::Cons => "cons",
            FunctionKind::Supp => "supp",
            FunctionKind::ESupp => "esupp",
        }
    }

    pub fn takes_parameters(self) -> bool {
        matches!(self, FunctionKind::Proc | FunctionKind::Cons)
    }

    pub fn requires_return_type(self) -> bool {
        !matches!(self, FunctionKind::Cons)
    }

    pub fn is_supplier(self) -> bool {
        matches!(self, FunctionKind::Supp | FunctionKind::ESupp)
    }

    /// Whether a fail result passes the return check even when the declared
    /// return type carries no `?`.
    pub fn is_fallible(self) -> bool {
        matches!(self, FunctionKind::ESupp)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionStatement {
    pub kind: FunctionKind,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub body: Expression,
}

/// A type name written with a trailing `?` also admits fail values.
pub fn is_fallible_type(type_name: &str) -> bool {
    type_name.ends_with('?')
}

pub fn base_type(type_name: &str) -> &str {
    type_name.strip_suffix('?').unwrap_or(type_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Pipeline,
}

impl InfixOp {
    pub fn symbol(self) -> &'static str {
        match self {
            InfixOp::Add => "+",
            InfixOp::Subtract => "-",
            InfixOp::Multiply => "*",
            InfixOp::Divide => "/",
            InfixOp::Modulo => "%",
            InfixOp::Equal => "==",
            InfixOp::NotEqual => "!=",
            InfixOp::Less => "<",
            InfixOp::LessEqual => "<=",
            InfixOp::Greater => ">",
            InfixOp::GreaterEqual => ">=",
            InfixOp::Pipeline => "|>",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub condition: Expression,
    pub consequence: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Nil,
    Fail(String),
    Prefix {
        operator: PrefixOp,
        right: Box<Expression>,
    },
    Infix {
        left: Box<Expression>,
        operator: InfixOp,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        consequence: Box<Expression>,
        alternative: Option<Box<Expression>>,
    },
    For {
        variable: String,
        collection: Box<Expression>,
        body: Box<Expression>,
    },
    Match {
        subject: Box<Expression>,
        cases: Vec<MatchCase>,
        default: Option<Box<Expression>>,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    List(Vec<Expression>),
    Map(Vec<(Expression, Expression)>),
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

fn write_joined<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| self.write_source(f))
    }
}

impl Expression {
    fn write_source(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Integer(n) => write!(f, "{}", n),
            Expression::Float(n) => write!(f, "{:?}", n),
            Expression::String(s) => write!(f, "\"{}\"", s.escape_debug()),
            Expression::Boolean(b) => write!(f, "{}", b),
            Expression::Nil => write!(f, "nil"),
            Expression::Fail(message) => write!(f, "fail \"{}\"", message.escape_debug()),
            Expression::Prefix { operator, right } => match operator {
                PrefixOp::Not => write!(f, "(!{})", right),
                PrefixOp::Negate => write!(f, "(-{})", right),
            },
            Expression::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator.symbol(), right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} then {}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {}", alternative)?;
                }
                Ok(())
            }
            Expression::For {
                variable,
                collection,
                body,
            } => write!(f, "for {} in {} then {}", variable, collection, body),
            Expression::Match {
                subject,
                cases,
                default,
            } => {
                write!(f, "match {}", subject)?;
                for case in cases {
                    write!(f, " is {} then {}", case.condition, case.consequence)?;
                }
                if let Some(default) = default {
                    write!(f, " default {}", default)?;
                }
                Ok(())
            }
            Expression::Call {
                function,
                arguments,
            } => {
                write!(f, "{}(", function)?;
                write_joined(f, arguments)?;
                write!(f, ")")
            }
            Expression::List(elements) => {
                write!(f, "[")?;
                write_joined(f, elements)?;
                write!(f, "]")
            }
            Expression::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_name)
    }
}

impl Display for FunctionStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.keyword(), self.name)?;
        if self.kind.takes_parameters() {
            write!(f, "(")?;
            write_joined(f, &self.parameters)?;
            write!(f, ")")?;
        }
        if let Some(return_type) = &self.return_type {
            write!(f, ": {}", return_type)?;
        }
        write!(f, " -> {}", self.body)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Function(function) => write!(f, "{}", function),
            Statement::Expression(expression) => write!(f, "{}", expression),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}
