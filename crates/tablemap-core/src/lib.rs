//! Core types and traits for tablemap.
//!
//! This crate provides the foundational abstractions for mapping typed
//! entities onto a single SQL table:
//!
//! - [`Entity`] trait and its static [`EntitySchema`] accessor table
//! - [`TableMetadata`] introspection, memoized per entity type
//! - [`Value`] and the literal / wire conversions in [`convert`]
//! - [`Connector`] / [`Connection`] execution collaborator traits
//! - the [`Error`] taxonomy and the optional [`SqlLogger`]

pub mod connection;
pub mod convert;
pub mod entity;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod logging;
pub mod metadata;
pub mod row;
pub mod value;

pub use connection::{BindTarget, BoundParameter, Connection, Connector, ParamType, Statement};
pub use convert::{from_sql_literal, from_wire_value, to_sql_literal};
pub use entity::{Entity, EntitySchema, FieldDef, map_row};
pub use error::{
    ConnectionError, ConnectionErrorKind, DuplicateParameterError, EngineError, Error,
    MappingError, QueryError, Result, SchemaError, SchemaErrorKind, UnsupportedExpressionError,
    ValidationError, ValidationErrorKind,
};
pub use field::{Decimal, FieldKind, FieldValue, ScalarKind, SqlEnum};
pub use identifiers::{quote_bracket, sanitize_identifier};
pub use logging::{LogConfig, LogLevel, LogRecord, LogSink, SqlLogger, StderrSink};
pub use metadata::{
    PrimaryKeyDescriptor, TableMetadata, get_fields, get_primary_keys, get_table_name,
};
pub use row::{ColumnInfo, Row};
pub use value::Value;

// Used by code generated from `#[derive(Entity)]`.
#[doc(hidden)]
pub use chrono;
#[doc(hidden)]
pub use uuid;
