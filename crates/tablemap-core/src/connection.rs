//! Execution collaborator traits.
//!
//! This module defines the only boundary the mapping engine talks to:
//!
//! - [`Connector`] - opens a fresh [`Connection`] per operation
//! - [`Connection`] - runs one [`Statement`] and returns rows or a row count
//! - [`BindTarget`] - anything bound parameters can be applied to
//!
//! Networking, pooling and the connection string belong to the driver
//! behind these traits. A connection is released when it is dropped, so it
//! is closed on every exit path of an operation.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use serde::Serialize;

/// Text longer than this is bound as `nvarchar(max)`.
pub const NVARCHAR_MAX_INLINE: usize = 4000;

/// Storage type inferred for a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamType {
    /// `nvarchar(n)`
    NVarChar(usize),
    /// `nvarchar(max)`
    NVarCharMax,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Bit,
    DateTime2,
    Decimal,
    Real,
    Float,
    UniqueIdentifier,
    /// `nchar(n)`
    NChar(usize),
    /// `sql_variant`, used for NULL
    Variant,
}

impl ParamType {
    /// Infer the storage type from a value's runtime variant.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => ParamType::Variant,
            Value::Bool(_) => ParamType::Bit,
            Value::Byte(_) => ParamType::TinyInt,
            Value::SmallInt(_) => ParamType::SmallInt,
            Value::Int(_) => ParamType::Int,
            Value::BigInt(_) => ParamType::BigInt,
            Value::Float(_) => ParamType::Real,
            Value::Double(_) => ParamType::Float,
            Value::Decimal(_) => ParamType::Decimal,
            Value::Text(s) if s.chars().count() > NVARCHAR_MAX_INLINE => ParamType::NVarCharMax,
            Value::Text(_) => ParamType::NVarChar(NVARCHAR_MAX_INLINE),
            Value::Char(_) => ParamType::NChar(1),
            Value::DateTime(_) => ParamType::DateTime2,
            Value::Guid(_) => ParamType::UniqueIdentifier,
        }
    }

    /// T-SQL type name.
    pub fn as_sql(&self) -> String {
        match self {
            ParamType::NVarChar(n) => format!("nvarchar({})", n),
            ParamType::NVarCharMax => "nvarchar(max)".to_string(),
            ParamType::TinyInt => "tinyint".to_string(),
            ParamType::SmallInt => "smallint".to_string(),
            ParamType::Int => "int".to_string(),
            ParamType::BigInt => "bigint".to_string(),
            ParamType::Bit => "bit".to_string(),
            ParamType::DateTime2 => "datetime2".to_string(),
            ParamType::Decimal => "decimal".to_string(),
            ParamType::Real => "real".to_string(),
            ParamType::Float => "float".to_string(),
            ParamType::UniqueIdentifier => "uniqueidentifier".to_string(),
            ParamType::NChar(n) => format!("nchar({})", n),
            ParamType::Variant => "sql_variant".to_string(),
        }
    }
}

/// One named value bound to a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParameter {
    /// Placeholder including the leading `@`
    pub name: String,
    pub value: Value,
    pub param_type: ParamType,
}

impl BoundParameter {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let param_type = ParamType::infer(&value);
        Self {
            name: name.into(),
            value,
            param_type,
        }
    }
}

/// Something parameters can be bound onto.
pub trait BindTarget {
    /// Drop every previously bound parameter.
    fn clear_parameters(&mut self);

    fn bind_parameter(&mut self, parameter: &BoundParameter);
}

/// SQL text plus its bound parameters, ready to hand to a [`Connection`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BoundParameter>,
}

impl Statement {
    /// A statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[BoundParameter] {
        &self.params
    }

    /// Value bound to `name` (with or without the leading `@`).
    pub fn param(&self, name: &str) -> Option<&Value> {
        let name = name.strip_prefix('@').unwrap_or(name);
        self.params
            .iter()
            .find(|p| p.name.strip_prefix('@').unwrap_or(&p.name).eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }
}

impl BindTarget for Statement {
    fn clear_parameters(&mut self) {
        self.params.clear();
    }

    fn bind_parameter(&mut self, parameter: &BoundParameter) {
        self.params.push(parameter.clone());
    }
}

/// An open connection to the database.
///
/// Both methods block until the driver has fully drained the result.
pub trait Connection {
    /// Run a statement that returns rows.
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> Result<u64>;
}

/// Opens connections. One connection is opened per collection operation.
pub trait Connector: Send + Sync {
    type Connection: Connection;

    fn connect(&self) -> Result<Self::Connection>;
}

impl<C: Connector> Connector for &C {
    type Connection = C::Connection;

    fn connect(&self) -> Result<Self::Connection> {
        (**self).connect()
    }
}

impl<C: Connector> Connector for std::sync::Arc<C> {
    type Connection = C::Connection;

    fn connect(&self) -> Result<Self::Connection> {
        (**self).connect()
    }
}
