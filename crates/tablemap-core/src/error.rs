//! Error types for tablemap operations.

use std::fmt;

/// The primary error type for all tablemap operations.
///
/// The specific kinds (`Schema`, `Validation`, `Connection`, `Mapping`,
/// `UnsupportedExpression`, `DuplicateParameter`) are propagated unchanged
/// by the entity collection so callers can match on them. Anything else that
/// surfaces while a statement is in flight is wrapped in [`Error::Engine`].
#[derive(Debug)]
pub enum Error {
    /// Entity type is missing or has invalid schema declarations
    Schema(SchemaError),
    /// Caller-side contract violation
    Validation(ValidationError),
    /// Failure to open or use a connection
    Connection(ConnectionError),
    /// A row value could not be coerced into its typed field
    Mapping(MappingError),
    /// Predicate translation hit a node outside the supported set
    UnsupportedExpression(UnsupportedExpressionError),
    /// A named parameter was registered twice
    DuplicateParameter(DuplicateParameterError),
    /// The driver rejected a statement
    Query(QueryError),
    /// Generic engine failure carrying the operation and attempted SQL
    Engine(EngineError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Entity type the declaration belongs to
    pub entity: &'static str,
    pub kind: SchemaErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// No table name declared
    MissingTableName,
    /// Two fields map to the same column
    DuplicateColumn,
    /// Primary key flags are inconsistent with the field kind
    InvalidPrimaryKey,
    /// Timestamp field is missing or not a datetime
    InvalidTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Key values supplied do not match the declared primary key count
    KeyArity,
    /// A filter was called with no conditions
    EmptyConditions,
    /// Mutation attempted on a read-only (view) entity
    ReadOnlyEntity,
    /// Operation needs a primary key and the entity declares none
    MissingPrimaryKey,
    /// Field name is not part of the entity schema
    UnknownField,
    /// Raw SQL was rejected by the injection guard
    RawSqlRejected,
    /// Raw SQL entry points are disabled by configuration
    RawSqlDisabled,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    /// SQL that was about to run, when known
    pub sql: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Authentication failed
    Authentication,
    /// Connection lost during operation
    Disconnected,
    /// Driver timed out waiting for the server
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingError {
    /// Field (column) being populated, empty until the row mapper attaches it
    pub field: String,
    /// String form of the offending value
    pub raw_value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedExpressionError {
    /// Name of the rejected node kind (e.g. `LessThan`, `Call`)
    pub node_kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateParameterError {
    pub name: String,
}

#[derive(Debug)]
pub struct QueryError {
    pub message: String,
    pub sql: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct EngineError {
    /// Collection operation that failed (e.g. `add`, `find`)
    pub operation: &'static str,
    pub sql: Option<String>,
    pub source: Box<Error>,
}

impl SchemaError {
    pub fn new(entity: &'static str, kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Self {
            entity,
            kind,
            message: message.into(),
        }
    }
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Attach the underlying driver error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl MappingError {
    pub fn new(expected: &'static str, raw_value: impl Into<String>) -> Self {
        Self {
            field: String::new(),
            raw_value: raw_value.into(),
            expected,
        }
    }

    /// Name the field this error belongs to.
    pub fn for_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql: None,
            source: None,
        }
    }
}

impl Error {
    /// Build a validation error.
    pub fn validation(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Error::Validation(ValidationError::new(kind, message))
    }

    /// Is this one of the specific taxonomy kinds that is never wrapped?
    pub fn is_taxonomy_kind(&self) -> bool {
        matches!(
            self,
            Error::Schema(_)
                | Error::Validation(_)
                | Error::Connection(_)
                | Error::Mapping(_)
                | Error::UnsupportedExpression(_)
                | Error::DuplicateParameter(_)
        )
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self, Error::Schema(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Validation kind, if this is a validation error.
    pub fn validation_kind(&self) -> Option<ValidationErrorKind> {
        match self {
            Error::Validation(v) => Some(v.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Connection(c) => c.sql.as_deref(),
            Error::Query(q) => q.sql.as_deref(),
            Error::Engine(e) => e.sql.as_deref().or_else(|| e.source.sql()),
            _ => None,
        }
    }

    /// Collection operation name, for engine-wrapped errors.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Error::Engine(e) => Some(e.operation),
            _ => None,
        }
    }

    /// Attach SQL text to errors that carry it and do not have it yet.
    pub fn with_sql(self, sql: &str) -> Self {
        match self {
            Error::Connection(mut c) => {
                c.sql.get_or_insert_with(|| sql.to_string());
                Error::Connection(c)
            }
            Error::Query(mut q) => {
                q.sql.get_or_insert_with(|| sql.to_string());
                Error::Query(q)
            }
            other => other,
        }
    }

    /// Wrap anything outside the taxonomy in an engine error.
    ///
    /// Taxonomy kinds come back unchanged (with SQL attached where the kind
    /// carries it).
    pub fn into_engine(self, operation: &'static str, sql: Option<&str>) -> Self {
        let err = match sql {
            Some(sql) => self.with_sql(sql),
            None => self,
        };
        if err.is_taxonomy_kind() || matches!(err, Error::Engine(_)) {
            return err;
        }
        Error::Engine(EngineError {
            operation,
            sql: sql.map(str::to_string),
            source: Box::new(err),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(e) => write!(f, "Schema error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Mapping(e) => write!(f, "Mapping error: {}", e),
            Error::UnsupportedExpression(e) => write!(f, "Unsupported expression: {}", e),
            Error::DuplicateParameter(e) => write!(f, "Duplicate parameter: {}", e),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Engine(e) => write!(f, "{}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Engine(e) => Some(e.source.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "expected {}, found '{}'", self.expected, self.raw_value)
        } else {
            write!(
                f,
                "expected {} for field '{}', found '{}'",
                self.expected, self.field, self.raw_value
            )
        }
    }
}

impl fmt::Display for UnsupportedExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node kind '{}' cannot be translated to SQL", self.node_kind)
    }
}

impl fmt::Display for DuplicateParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parameter '{}' is already defined", self.name)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "{} failed: {} (SQL: {})", self.operation, self.source, sql),
            None => write!(f, "{} failed: {}", self.operation, self.source),
        }
    }
}

impl std::error::Error for SchemaError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for MappingError {}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::Mapping(err)
    }
}

impl From<UnsupportedExpressionError> for Error {
    fn from(err: UnsupportedExpressionError) -> Self {
        Error::UnsupportedExpression(err)
    }
}

impl From<DuplicateParameterError> for Error {
    fn from(err: DuplicateParameterError) -> Self {
        Error::DuplicateParameter(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

/// Result type alias for tablemap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_kinds_pass_through_engine_wrapping() {
        let err = Error::validation(ValidationErrorKind::KeyArity, "expected 1 key, got 2");
        let wrapped = err.into_engine("find", Some("SELECT 1"));
        assert_eq!(wrapped.validation_kind(), Some(ValidationErrorKind::KeyArity));
        assert!(wrapped.operation().is_none());
    }

    #[test]
    fn test_query_errors_are_wrapped_with_operation_and_sql() {
        let err = Error::Query(QueryError::new("syntax error near 'FROM'"));
        let wrapped = err.into_engine("to_list", Some("SELECT * FROM People"));

        assert_eq!(wrapped.operation(), Some("to_list"));
        assert_eq!(wrapped.sql(), Some("SELECT * FROM People"));
        assert!(std::error::Error::source(&wrapped).is_some());
        assert!(wrapped.to_string().contains("to_list failed"));
    }

    #[test]
    fn test_connection_errors_get_sql_attached() {
        let err = Error::Connection(ConnectionError::new(
            ConnectionErrorKind::Disconnected,
            "server closed the connection",
        ));
        let err = err.into_engine("edit", Some("UPDATE People SET [Name] = @p1"));

        assert!(err.is_connection_error());
        assert_eq!(err.sql(), Some("UPDATE People SET [Name] = @p1"));
    }

    #[test]
    fn test_mapping_error_display_names_field() {
        let err = MappingError::new("i32", "abc").for_field("Age");
        assert_eq!(err.to_string(), "expected i32 for field 'Age', found 'abc'");
    }

    #[test]
    fn test_connection_error_source_is_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::Connection(
            ConnectionError::new(ConnectionErrorKind::Connect, "connect failed").with_source(io),
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("refused"));
    }
}
