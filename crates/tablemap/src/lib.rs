//! tablemap - typed entity mapping over a single SQL table.
//!
//! tablemap maps plain structs onto SQL Server style tables and generates
//! parameterized T-SQL for them:
//!
//! - Static, derive-generated schema descriptors instead of runtime reflection
//! - One parameterized path for every value by default
//! - A closed predicate translator for typed filters
//! - An advisory injection guard for the explicitly named `_raw` entry points
//!
//! # Quick Start
//!
//! ```ignore
//! use tablemap::prelude::*;
//!
//! #[derive(Entity, Debug, Default)]
//! #[tablemap(table = "People")]
//! struct Person {
//!     #[tablemap(primary_key, auto_increment)]
//!     id: i32,
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! fn example(connector: impl Connector) -> Result<()> {
//!     let people = EntityCollection::<Person, _>::new(connector);
//!
//!     // INSERT INTO People ([Name],[Age]) VALUES (@p1,@p2)
//!     let mut ann = Person { name: "Ann".into(), age: Some(31), ..Default::default() };
//!     people.add(&mut ann)?;
//!
//!     // SELECT TOP(1) * FROM People WHERE [Id] = @p1
//!     let found = people.find(5)?;
//!
//!     // SELECT * FROM People WHERE [Name] = @p1
//!     let named = people.where_predicate(&field("Name").eq(constant("Ann")))?;
//!     Ok(())
//! }
//! ```
//!
//! The connection itself is supplied by the caller through the
//! [`Connector`] / [`Connection`] traits.

pub use tablemap_core::{
    BindTarget, BoundParameter, ColumnInfo, Connection, ConnectionError, ConnectionErrorKind,
    Connector, Decimal, DuplicateParameterError, EngineError, Entity, EntitySchema, Error,
    FieldDef, FieldKind, FieldValue, LogConfig, LogLevel, LogRecord, LogSink, MappingError,
    ParamType, PrimaryKeyDescriptor, QueryError, Result, Row, ScalarKind, SchemaError,
    SchemaErrorKind, SqlEnum, SqlLogger, Statement, StderrSink, TableMetadata,
    UnsupportedExpressionError, ValidationError, ValidationErrorKind, Value, from_sql_literal,
    from_wire_value, get_fields, get_primary_keys, get_table_name, map_row, quote_bracket,
    sanitize_identifier, to_sql_literal,
};

pub use tablemap_macros::{Entity, SqlEnum};

pub use tablemap_query::predicate::{self, call, constant, field, now};
pub use tablemap_query::{
    BinaryOp, CollectionOptions, CollectionSettings, EntityCollection, Expr, LiteralMode,
    ParameterBuilder, RawSqlPolicy, RiskLevel, SqlValidation, Translator, sanitize_input,
    validate_sql,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tablemap::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CollectionOptions,
        // Execution seam
        Connection,
        Connector,
        // Entities
        Entity,
        EntityCollection,
        Error,
        // Predicates
        Expr,
        LiteralMode,
        RawSqlPolicy,
        Result,
        Row,
        SqlEnum,
        Statement,
        Value,
        constant,
        field,
        now,
    };
}
