//! Predicate expressions and their translation to T-SQL.
//!
//! [`Expr`] is an open expression tree built with a fluent API:
//!
//! ```
//! use tablemap_query::predicate::{constant, field};
//!
//! let filter = field("Name").eq(constant("Bob")).and(field("Age").ne(constant(None::<i32>)));
//! ```
//!
//! The [`Translator`] accepts only a closed subset of that tree. Everything
//! outside it is rejected with an `UnsupportedExpressionError` before any SQL
//! is produced.

use crate::params::ParameterBuilder;
use std::marker::PhantomData;
use tablemap_core::{
    Entity, Error, Result, UnsupportedExpressionError, ValidationErrorKind, Value, quote_bracket,
    to_sql_literal,
};

/// A predicate expression over an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The entity row itself
    Parameter,

    /// Member access (`target.name`)
    Member { target: Box<Expr>, name: String },

    /// Literal value
    Constant(Value),

    /// Current server time
    Now,

    /// Unwrap-nullable / type conversion step
    Convert(Box<Expr>),

    /// Binary operation
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Logical negation
    Not(Box<Expr>),

    /// Method or function call
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Node name reported when the operator is not translatable.
    pub const fn node_kind(self) -> &'static str {
        match self {
            BinaryOp::Eq => "Equal",
            BinaryOp::Ne => "NotEqual",
            BinaryOp::Lt => "LessThan",
            BinaryOp::Le => "LessThanOrEqual",
            BinaryOp::Gt => "GreaterThan",
            BinaryOp::Ge => "GreaterThanOrEqual",
            BinaryOp::And => "AndAlso",
            BinaryOp::Or => "OrElse",
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Subtract",
            BinaryOp::Mul => "Multiply",
            BinaryOp::Div => "Divide",
        }
    }
}

/// Member access on the entity row: `field("Name")` is `row.Name`.
pub fn field(name: impl Into<String>) -> Expr {
    Expr::Member {
        target: Box::new(Expr::Parameter),
        name: name.into(),
    }
}

pub fn constant(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

pub fn now() -> Expr {
    Expr::Now
}

pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.into(),
        args,
    }
}

impl Expr {
    // ==================== Member Access ====================

    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    /// Date part of a datetime (`x.Date`).
    pub fn date(self) -> Self {
        self.member("Date")
    }

    /// Underlying value of a nullable (`x.Value`).
    pub fn value(self) -> Self {
        self.member("Value")
    }

    pub fn convert(self) -> Self {
        Expr::Convert(Box::new(self))
    }

    // ==================== Operators ====================

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    pub fn add(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Node name reported when this node is not translatable.
    pub fn node_kind(&self) -> &'static str {
        match self {
            Expr::Parameter => "Parameter",
            Expr::Member { .. } => "MemberAccess",
            Expr::Constant(_) => "Constant",
            Expr::Now => "Now",
            Expr::Convert(_) => "Convert",
            Expr::Binary { op, .. } => op.node_kind(),
            Expr::Not(_) => "Not",
            Expr::Call { .. } => "Call",
        }
    }

    fn is_null_constant(&self) -> bool {
        match self {
            Expr::Constant(v) => v.is_null(),
            Expr::Convert(inner) => inner.is_null_constant(),
            _ => false,
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Constant(value)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Constant(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Constant(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Constant(Value::Int(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Constant(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Constant(Value::Bool(b))
    }
}

/// Where constant values go during translation.
enum Literals<'a> {
    Inline,
    Bound(&'a mut ParameterBuilder),
}

/// Translates predicates over `E` into WHERE-clause bodies.
///
/// Supported: `=` / `!=` (with `IS NULL` / `IS NOT NULL` for null
/// constants), AND / OR, entity members, `.Date` on a member, `Now` and
/// constants. Member chains deeper than one level render as `[a.b]`.
pub struct Translator<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for Translator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Translator<E> {
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }

    /// Render with constants inlined via `to_sql_literal`.
    ///
    /// Text is inlined unescaped. Prefer [`Translator::translate_parameterized`].
    pub fn translate(&self, expr: &Expr) -> Result<String> {
        self.visit(expr, &mut Literals::Inline)
    }

    /// Render with every constant bound through `builder`.
    pub fn translate_parameterized(
        &self,
        expr: &Expr,
        builder: &mut ParameterBuilder,
    ) -> Result<String> {
        self.visit(expr, &mut Literals::Bound(builder))
    }

    fn visit(&self, expr: &Expr, literals: &mut Literals<'_>) -> Result<String> {
        match expr {
            Expr::Binary { left, op, right } => self.visit_binary(left, *op, right, literals),
            Expr::Member { target, name } => self.visit_member(target, name, literals),
            Expr::Constant(value) => Ok(match literals {
                Literals::Inline => to_sql_literal(value),
                Literals::Bound(builder) => builder.add_parameter(value.clone()),
            }),
            Expr::Now => Ok("GETDATE()".to_string()),
            Expr::Convert(inner) => self.visit(inner, literals),
            Expr::Parameter | Expr::Not(_) | Expr::Call { .. } => Err(unsupported(expr)),
        }
    }

    fn visit_binary(
        &self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        literals: &mut Literals<'_>,
    ) -> Result<String> {
        match op {
            BinaryOp::Eq | BinaryOp::Ne => {
                let null_test = if op == BinaryOp::Eq {
                    "IS NULL"
                } else {
                    "IS NOT NULL"
                };
                if right.is_null_constant() {
                    return Ok(format!("{} {}", self.visit(left, literals)?, null_test));
                }
                if left.is_null_constant() {
                    return Ok(format!("{} {}", self.visit(right, literals)?, null_test));
                }
                let symbol = if op == BinaryOp::Eq { "=" } else { "!=" };
                let l = self.visit(left, literals)?;
                let r = self.visit(right, literals)?;
                Ok(format!("{} {} {}", l, symbol, r))
            }
            BinaryOp::And | BinaryOp::Or => {
                let keyword = if op == BinaryOp::And { "AND" } else { "OR" };
                let l = self.visit(left, literals)?;
                let r = self.visit(right, literals)?;
                Ok(format!("({} {} {})", l, keyword, r))
            }
            _ => Err(UnsupportedExpressionError {
                node_kind: op.node_kind().to_string(),
            }
            .into()),
        }
    }

    fn resolve_field(&self, name: &str) -> Result<&'static str> {
        match E::schema().field(name) {
            Some(def) => Ok(def.name),
            None => Err(Error::validation(
                ValidationErrorKind::UnknownField,
                format!(
                    "'{}' is not a field of {}",
                    name,
                    std::any::type_name::<E>()
                ),
            )),
        }
    }

    fn visit_member(
        &self,
        target: &Expr,
        name: &str,
        literals: &mut Literals<'_>,
    ) -> Result<String> {
        match target {
            Expr::Parameter => Ok(quote_bracket(self.resolve_field(name)?)),
            _ if name == "Date" => Ok(format!(
                "CAST({} AS DATE)",
                self.visit(strip_unwrap(target), literals)?
            )),
            _ if name == "Value" => self.visit(target, literals),
            Expr::Member { .. } => match member_path(target) {
                Some(mut path) => {
                    path[0] = self.resolve_field(path[0])?;
                    path.push(name);
                    Ok(quote_bracket(&path.join(".")))
                }
                None => Err(unsupported(target)),
            },
            other => Err(unsupported(other)),
        }
    }
}

/// Peel `Convert` and `.Value` layers off a nullable member.
fn strip_unwrap(expr: &Expr) -> &Expr {
    match expr {
        Expr::Convert(inner) => strip_unwrap(inner),
        Expr::Member { target, name } if name == "Value" => strip_unwrap(target),
        other => other,
    }
}

/// Member names from the entity parameter down to `expr`.
fn member_path(expr: &Expr) -> Option<Vec<&str>> {
    match expr {
        Expr::Member { target, name } => match target.as_ref() {
            Expr::Parameter => Some(vec![name.as_str()]),
            inner => {
                let mut path = member_path(inner)?;
                path.push(name.as_str());
                Some(path)
            }
        },
        _ => None,
    }
}

fn unsupported(expr: &Expr) -> Error {
    UnsupportedExpressionError {
        node_kind: expr.node_kind().to_string(),
    }
    .into()
}
