//! The entity collection: CRUD over one table.
//!
//! An [`EntityCollection`] is bound to one entity type and one [`Connector`].
//! Metadata is loaded once when the collection is built; a faulty
//! declaration leaves the collection permanently broken and every operation
//! reports the same [`SchemaError`].
//!
//! Each operation opens a fresh connection, runs exactly one statement and
//! drops the connection before returning. All values travel as bound
//! parameters except on the `_raw` entry points, which are screened by the
//! injection guard according to the configured [`RawSqlPolicy`].

use crate::guard::{RiskLevel, validate_sql};
use crate::options::{CollectionOptions, LiteralMode, RawSqlPolicy};
use crate::params::ParameterBuilder;
use crate::predicate::{Expr, Translator};
use chrono::Local;
use std::marker::PhantomData;
use std::sync::Arc;
use tablemap_core::{
    Connection, Connector, Entity, Error, QueryError, Result, Row, SchemaError, SchemaErrorKind,
    Statement, TableMetadata, ValidationErrorKind, Value, map_row, quote_bracket,
};
use uuid::Uuid;

enum State {
    Ready(Arc<TableMetadata>),
    Broken(SchemaError),
}

/// Typed CRUD access to the table behind `E`.
pub struct EntityCollection<E, C> {
    connector: C,
    options: CollectionOptions,
    state: State,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, C: Connector> EntityCollection<E, C> {
    /// Build a collection with default options.
    ///
    /// Never fails: a schema problem is kept and reported by every operation.
    pub fn new(connector: C) -> Self {
        Self::with_options(connector, CollectionOptions::default())
    }

    pub fn with_options(connector: C, options: CollectionOptions) -> Self {
        let state = match TableMetadata::of::<E>() {
            Ok(metadata) => State::Ready(metadata),
            Err(Error::Schema(e)) => State::Broken(e),
            // Metadata loading only reports schema errors.
            Err(other) => State::Broken(SchemaError::new(
                std::any::type_name::<E>(),
                SchemaErrorKind::MissingTableName,
                other.to_string(),
            )),
        };
        if let State::Broken(e) = &state {
            tracing::warn!(entity = e.entity, error = %e, "Entity collection is unusable");
        }
        Self {
            connector,
            options,
            state,
            _entity: PhantomData,
        }
    }

    /// Build a collection, failing immediately on a schema problem.
    pub fn try_new(connector: C) -> Result<Self> {
        let collection = Self::new(connector);
        collection.metadata()?;
        Ok(collection)
    }

    /// Table metadata, or the schema error this collection was built with.
    pub fn metadata(&self) -> Result<Arc<TableMetadata>> {
        match &self.state {
            State::Ready(metadata) => Ok(Arc::clone(metadata)),
            State::Broken(e) => Err(Error::Schema(e.clone())),
        }
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    // ==================== Lookup by Key ====================

    /// Entity with the given single-column primary key.
    pub fn find(&self, key: impl Into<Value>) -> Result<Option<E>> {
        self.find_by_key(&[key.into()])
    }

    /// Entity with the given two-column primary key.
    pub fn find_composite(
        &self,
        first: impl Into<Value>,
        second: impl Into<Value>,
    ) -> Result<Option<E>> {
        self.find_by_key(&[first.into(), second.into()])
    }

    /// Entity matching `keys` in key declaration order.
    ///
    /// One or two key values are supported and their number must equal the
    /// declared key count.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn find_by_key(&self, keys: &[Value]) -> Result<Option<E>> {
        const OP: &str = "find";
        let metadata = self.metadata()?;
        if !metadata.has_primary_key() {
            return Err(Error::validation(
                ValidationErrorKind::MissingPrimaryKey,
                format!("{} declares no primary key", metadata.table_name),
            ));
        }
        let key_fields = metadata.key_fields();
        if !(1..=2).contains(&keys.len()) || keys.len() != key_fields.len() {
            return Err(Error::validation(
                ValidationErrorKind::KeyArity,
                format!(
                    "{} has {} primary key field(s) but {} value(s) were supplied",
                    metadata.table_name,
                    key_fields.len(),
                    keys.len()
                ),
            ));
        }

        let conditions: Vec<(&str, Value)> =
            key_fields.into_iter().zip(keys.iter().cloned()).collect();
        let mut builder = ParameterBuilder::new();
        let filter = builder.build_where_clause(&conditions);
        let sql = format!("SELECT TOP(1) * FROM {} {}", metadata.table_name, filter);
        self.query_first(OP, builder.into_statement(sql))
    }

    // ==================== Listing ====================

    /// First row of the table, if any.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn first_or_default(&self) -> Result<Option<E>> {
        let metadata = self.metadata()?;
        let sql = format!("SELECT TOP(1) * FROM {}", metadata.table_name);
        self.query_first("first_or_default", Statement::new(sql))
    }

    /// Every row of the table.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn to_list(&self) -> Result<Vec<E>> {
        let metadata = self.metadata()?;
        let sql = format!("SELECT * FROM {}", metadata.table_name);
        self.query_all("to_list", Statement::new(sql))
    }

    pub fn list(&self) -> Result<Vec<E>> {
        self.to_list()
    }

    /// Number of rows in the table.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn count(&self) -> Result<u64> {
        const OP: &str = "count";
        let metadata = self.metadata()?;
        let statement = Statement::new(format!("SELECT COUNT(*) FROM {}", metadata.table_name));
        let rows = self.run_query(OP, &statement)?;
        rows.first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| {
                Error::from(QueryError::new("COUNT(*) returned no usable value"))
                    .into_engine(OP, Some(statement.sql()))
            })
    }

    // ==================== Parameterized Filters ====================

    /// Rows where `field` equals `value`.
    pub fn where_eq(&self, field: &str, value: impl Into<Value>) -> Result<Vec<E>> {
        self.where_multiple(&[(field, value.into())])
    }

    /// Rows where `field` equals `value`.
    pub fn find_by_property(&self, field: &str, value: impl Into<Value>) -> Result<Vec<E>> {
        self.where_multiple(&[(field, value.into())])
    }

    /// Rows matching every `(field, value)` pair.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn where_multiple(&self, conditions: &[(&str, Value)]) -> Result<Vec<E>> {
        let metadata = self.metadata()?;
        let mut builder = ParameterBuilder::new();
        let filter = filter_clause(&metadata, conditions, &mut builder)?;
        let sql = format!("SELECT * FROM {} {}", metadata.table_name, filter);
        self.query_all("where_multiple", builder.into_statement(sql))
    }

    /// First row matching every `(field, value)` pair.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn first_or_default_multiple(&self, conditions: &[(&str, Value)]) -> Result<Option<E>> {
        let metadata = self.metadata()?;
        let mut builder = ParameterBuilder::new();
        let filter = filter_clause(&metadata, conditions, &mut builder)?;
        let sql = format!("SELECT TOP(1) * FROM {} {}", metadata.table_name, filter);
        self.query_first("first_or_default_multiple", builder.into_statement(sql))
    }

    /// Rows matching a translated predicate.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn where_predicate(&self, predicate: &Expr) -> Result<Vec<E>> {
        let metadata = self.metadata()?;
        let translator = Translator::<E>::new();
        let mut builder = ParameterBuilder::new();
        let body = match self.options.literal_mode {
            LiteralMode::Parameterized => {
                translator.translate_parameterized(predicate, &mut builder)?
            }
            LiteralMode::Inline => translator.translate(predicate)?,
        };
        let sql = format!("SELECT * FROM {} WHERE {}", metadata.table_name, body);
        self.query_all("where_predicate", builder.into_statement(sql))
    }

    // ==================== Raw SQL ====================

    /// First row matching a caller-written WHERE body. Values in `clause`
    /// are not bound.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn first_or_default_where_raw(&self, clause: &str) -> Result<Option<E>> {
        const OP: &str = "first_or_default_where_raw";
        let metadata = self.metadata()?;
        let sql = format!("SELECT TOP(1) * FROM {} WHERE {}", metadata.table_name, clause);
        self.screen_raw(OP, &sql)?;
        self.query_first(OP, Statement::new(sql))
    }

    /// Rows matching a caller-written WHERE body. Values in `clause` are not
    /// bound.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn list_where_raw(&self, clause: &str) -> Result<Vec<E>> {
        const OP: &str = "list_where_raw";
        let metadata = self.metadata()?;
        let sql = format!("SELECT * FROM {} WHERE {}", metadata.table_name, clause);
        self.screen_raw(OP, &sql)?;
        self.query_all(OP, Statement::new(sql))
    }

    /// Run caller-written SQL and map every returned row to `E`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn query_raw(&self, sql: &str) -> Result<Vec<E>> {
        const OP: &str = "query_raw";
        self.metadata()?;
        self.screen_raw(OP, sql)?;
        self.query_all(OP, Statement::new(sql))
    }

    fn screen_raw(&self, operation: &'static str, sql: &str) -> Result<()> {
        let logger = &self.options.logger;
        if self.options.raw_sql_policy == RawSqlPolicy::Disabled {
            logger.error(operation, Some(sql), "raw SQL is disabled");
            return Err(Error::validation(
                ValidationErrorKind::RawSqlDisabled,
                format!("{} is disabled by the raw SQL policy", operation),
            ));
        }

        tracing::warn!(
            operation,
            sql = %sql,
            "Raw SQL bypasses parameter binding; prefer the parameterized methods"
        );
        logger.warning(operation, Some(sql), "raw SQL bypasses parameter binding");

        let validation = validate_sql(sql);
        if validation.risk_level == RiskLevel::None {
            return Ok(());
        }
        let findings = validation.warnings.join("; ");
        tracing::warn!(
            operation,
            risk = %validation.risk_level,
            findings = %findings,
            "Injection guard findings"
        );
        if !validation.is_valid() && self.options.raw_sql_policy == RawSqlPolicy::Guarded {
            logger.error(operation, Some(sql), &format!("rejected: {}", findings));
            return Err(Error::validation(
                ValidationErrorKind::RawSqlRejected,
                format!("{} risk: {}", validation.risk_level, findings),
            ));
        }
        Ok(())
    }

    // ==================== Mutations ====================

    /// Insert `entity` and return the affected-row count.
    ///
    /// Timestamps are stamped and GUID keys generated into `entity` first.
    /// Database-assigned keys are left out of the column list.
    #[tracing::instrument(level = "debug", skip(self, entity))]
    pub fn add(&self, entity: &mut E) -> Result<u64> {
        const OP: &str = "add";
        let metadata = self.writable(OP)?;
        let statement = prepare_insert(&metadata, entity, false)?;
        self.run_execute(OP, &statement)
    }

    /// Insert `entity` and return the row the database stored, including
    /// server-assigned values.
    #[tracing::instrument(level = "debug", skip(self, entity))]
    pub fn add_return(&self, entity: &mut E) -> Result<E> {
        const OP: &str = "add_return";
        let metadata = self.writable(OP)?;
        let statement = prepare_insert(&metadata, entity, true)?;
        match self.query_first(OP, statement.clone())? {
            Some(inserted) => Ok(inserted),
            None => Err(Error::from(QueryError::new("INSERT ... OUTPUT returned no row"))
                .into_engine(OP, Some(statement.sql()))),
        }
    }

    /// Update every non-key field of `entity` matched by its primary key.
    ///
    /// Returns the affected-row count; zero means no row matched.
    #[tracing::instrument(level = "debug", skip(self, entity))]
    pub fn edit(&self, entity: &mut E) -> Result<u64> {
        const OP: &str = "edit";
        let metadata = self.writable(OP)?;
        let keys = require_keys(&metadata, OP)?;

        let now = Value::DateTime(Local::now().naive_local());
        if let Some(updated_at) = &metadata.updated_at {
            entity.set_field_value(updated_at, now)?;
        }

        let fields = metadata.update_fields();
        if fields.is_empty() {
            tracing::debug!(table = %metadata.table_name, "No updatable fields; skipping edit");
            return Ok(0);
        }
        let mut builder = ParameterBuilder::new();
        let set = builder.build_update_set_clause(&fields, &*entity);
        let filter = builder.build_primary_key_where_clause(&keys, &*entity)?;
        let sql = format!("UPDATE {} {} {}", metadata.table_name, set, filter);
        self.run_execute(OP, &builder.into_statement(sql))
    }

    /// Delete the row matched by `entity`'s primary key.
    #[tracing::instrument(level = "debug", skip(self, entity))]
    pub fn remove(&self, entity: &E) -> Result<u64> {
        const OP: &str = "remove";
        let metadata = self.writable(OP)?;
        let keys = require_keys(&metadata, OP)?;
        let mut builder = ParameterBuilder::new();
        let filter = builder.build_primary_key_where_clause(&keys, entity)?;
        let sql = format!("DELETE FROM {} {}", metadata.table_name, filter);
        self.run_execute(OP, &builder.into_statement(sql))
    }

    fn writable(&self, operation: &'static str) -> Result<Arc<TableMetadata>> {
        let metadata = self.metadata()?;
        if metadata.read_only {
            self.options
                .logger
                .warning(operation, None, "mutation rejected on read-only entity");
            return Err(Error::validation(
                ValidationErrorKind::ReadOnlyEntity,
                format!("{} is a view and cannot be modified", metadata.table_name),
            ));
        }
        Ok(metadata)
    }

    // ==================== Execution ====================

    fn query_first(&self, operation: &'static str, statement: Statement) -> Result<Option<E>> {
        let rows = self.run_query(operation, &statement)?;
        rows.first()
            .map(|row| map_row::<E>(row))
            .transpose()
            .map_err(|e| e.into_engine(operation, Some(statement.sql())))
    }

    fn query_all(&self, operation: &'static str, statement: Statement) -> Result<Vec<E>> {
        let rows = self.run_query(operation, &statement)?;
        rows.iter()
            .map(|row| map_row::<E>(row))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.into_engine(operation, Some(statement.sql())))
    }

    fn run_query(&self, operation: &'static str, statement: &Statement) -> Result<Vec<Row>> {
        self.trace(operation, statement);
        let result = self
            .connector
            .connect()
            .and_then(|mut conn| conn.query(statement));
        match result {
            Ok(rows) => {
                tracing::debug!(operation, rows = rows.len(), "Query returned");
                Ok(rows)
            }
            Err(e) => Err(self.fail(operation, statement, e)),
        }
    }

    fn run_execute(&self, operation: &'static str, statement: &Statement) -> Result<u64> {
        self.trace(operation, statement);
        let result = self
            .connector
            .connect()
            .and_then(|mut conn| conn.execute(statement));
        match result {
            Ok(affected) => {
                tracing::debug!(operation, affected, "Statement executed");
                Ok(affected)
            }
            Err(e) => Err(self.fail(operation, statement, e)),
        }
    }

    fn trace(&self, operation: &'static str, statement: &Statement) {
        tracing::debug!(
            operation,
            sql = %statement.sql(),
            params = statement.params().len(),
            "Executing SQL"
        );
        self.options
            .logger
            .debug(operation, Some(statement.sql()), "executing");
    }

    fn fail(&self, operation: &'static str, statement: &Statement, err: Error) -> Error {
        tracing::warn!(operation, sql = %statement.sql(), error = %err, "SQL operation failed");
        self.options
            .logger
            .error(operation, Some(statement.sql()), &err.to_string());
        err.into_engine(operation, Some(statement.sql()))
    }
}

impl<E, C> std::fmt::Debug for EntityCollection<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = match &self.state {
            State::Ready(metadata) => metadata.table_name.as_str(),
            State::Broken(_) => "<broken>",
        };
        f.debug_struct("EntityCollection")
            .field("entity", &std::any::type_name::<E>())
            .field("table", &table)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn filter_clause(
    metadata: &TableMetadata,
    conditions: &[(&str, Value)],
    builder: &mut ParameterBuilder,
) -> Result<String> {
    if conditions.is_empty() {
        return Err(Error::validation(
            ValidationErrorKind::EmptyConditions,
            "at least one condition is required",
        ));
    }
    let mut resolved = Vec::with_capacity(conditions.len());
    for (field, value) in conditions {
        let Some(column) = metadata.resolve_field(field) else {
            return Err(Error::validation(
                ValidationErrorKind::UnknownField,
                format!("'{}' is not a field of {}", field, metadata.table_name),
            ));
        };
        resolved.push((column, value.clone()));
    }
    Ok(builder.build_where_clause(&resolved))
}

fn require_keys<'a>(metadata: &'a TableMetadata, operation: &str) -> Result<Vec<&'a str>> {
    if metadata.has_primary_key() {
        Ok(metadata.key_fields())
    } else {
        Err(Error::validation(
            ValidationErrorKind::MissingPrimaryKey,
            format!(
                "{} requires a primary key but {} declares none",
                operation, metadata.table_name
            ),
        ))
    }
}

fn prepare_insert<E: Entity>(
    metadata: &TableMetadata,
    entity: &mut E,
    returning: bool,
) -> Result<Statement> {
    let now = Local::now().naive_local();
    for stamp in [&metadata.created_at, &metadata.updated_at].into_iter().flatten() {
        entity.set_field_value(stamp, Value::DateTime(now))?;
    }
    for key in metadata.primary_keys.iter().filter(|pk| pk.is_guid_generated) {
        entity.set_field_value(&key.field, Value::Guid(Uuid::new_v4()))?;
    }

    let fields = metadata.insert_fields();
    let output = if returning { " OUTPUT INSERTED.*" } else { "" };
    let mut builder = ParameterBuilder::new();
    // Every column is database-assigned.
    if fields.is_empty() {
        let sql = format!("INSERT INTO {}{} DEFAULT VALUES", metadata.table_name, output);
        return Ok(builder.into_statement(sql));
    }
    let columns: Vec<String> = fields.iter().map(|f| quote_bracket(f)).collect();
    let values = builder.build_insert_values_clause(&fields, &*entity);
    let sql = format!(
        "INSERT INTO {} ({}){} {}",
        metadata.table_name,
        columns.join(","),
        output,
        values
    );
    Ok(builder.into_statement(sql))
}
