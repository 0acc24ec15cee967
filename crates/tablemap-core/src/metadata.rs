//! Table metadata derived from an entity's schema descriptor.
//!
//! Metadata is computed once per entity type, checked for declaration
//! errors, and shared behind an `Arc` for the rest of the process.

use crate::Result;
use crate::entity::{Entity, EntitySchema};
use crate::error::{SchemaError, SchemaErrorKind};
use crate::field::ScalarKind;
use serde::Serialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Describes one primary-key field and how its value is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyDescriptor {
    pub field: String,
    pub is_auto_increment: bool,
    pub is_guid_generated: bool,
}

impl PrimaryKeyDescriptor {
    /// The caller never supplies this key's value.
    pub fn is_system_assigned(&self) -> bool {
        self.is_auto_increment || self.is_guid_generated
    }

    /// The database assigns the value, so the column is left out of INSERT.
    ///
    /// GUID keys are generated client-side and always inserted.
    pub fn is_database_assigned(&self) -> bool {
        self.is_auto_increment && !self.is_guid_generated
    }
}

/// Immutable description of the table an entity maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub table_name: String,
    /// Column names in declaration order
    pub fields: Vec<String>,
    pub primary_keys: Vec<PrimaryKeyDescriptor>,
    /// View entities reject inserts and updates
    pub read_only: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl TableMetadata {
    /// Metadata for `E`, validated and memoized per type.
    ///
    /// Only successful results are cached; a faulty declaration reports the
    /// same [`SchemaError`] on every call.
    pub fn of<E: Entity>() -> Result<Arc<TableMetadata>> {
        let key = TypeId::of::<E>();
        if let Some(found) = registry()
            .read()
            .ok()
            .and_then(|map| map.get(&key).cloned())
        {
            return Ok(found);
        }

        let metadata = Arc::new(Self::build::<E>()?);
        tracing::debug!(
            entity = std::any::type_name::<E>(),
            table = %metadata.table_name,
            fields = metadata.fields.len(),
            keys = metadata.primary_keys.len(),
            "Loaded table metadata"
        );

        match registry().write() {
            Ok(mut map) => Ok(Arc::clone(map.entry(key).or_insert(metadata))),
            // A poisoned registry only loses memoization.
            Err(_) => Ok(metadata),
        }
    }

    /// Build and validate metadata for `E` without touching the registry.
    pub fn build<E: Entity>() -> Result<TableMetadata> {
        let schema = E::schema();
        let entity = std::any::type_name::<E>();
        let table_name = get_table_name::<E>()?;
        validate_schema(entity, schema)?;

        Ok(TableMetadata {
            table_name,
            fields: get_fields::<E>(),
            primary_keys: get_primary_keys::<E>(),
            read_only: schema.view,
            created_at: schema.created_at.map(str::to_string),
            updated_at: schema.updated_at.map(str::to_string),
        })
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn is_primary_key(&self, field: &str) -> bool {
        self.primary_keys.iter().any(|pk| pk.field == field)
    }

    /// Columns written by INSERT: every field except database-assigned keys.
    pub fn insert_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| {
                !self
                    .primary_keys
                    .iter()
                    .any(|pk| &pk.field == *f && pk.is_database_assigned())
            })
            .map(String::as_str)
            .collect()
    }

    /// Columns written by UPDATE: every non-key field.
    pub fn update_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !self.is_primary_key(f))
            .map(String::as_str)
            .collect()
    }

    /// Key column names in declaration order.
    pub fn key_fields(&self) -> Vec<&str> {
        self.primary_keys.iter().map(|pk| pk.field.as_str()).collect()
    }

    /// Resolve a caller-supplied field name to its declared spelling.
    pub fn resolve_field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.as_str() == name)
            .or_else(|| self.fields.iter().find(|f| f.eq_ignore_ascii_case(name)))
            .map(String::as_str)
    }
}

fn registry() -> &'static RwLock<HashMap<TypeId, Arc<TableMetadata>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<TypeId, Arc<TableMetadata>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Declared table name of `E`.
pub fn get_table_name<E: Entity>() -> Result<String> {
    match E::schema().table_name.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(SchemaError::new(
            std::any::type_name::<E>(),
            SchemaErrorKind::MissingTableName,
            "entity does not declare a table name",
        )
        .into()),
    }
}

/// Primary-key descriptors of `E` in declaration order. May be empty.
pub fn get_primary_keys<E: Entity>() -> Vec<PrimaryKeyDescriptor> {
    E::schema()
        .key_fields()
        .map(|def| PrimaryKeyDescriptor {
            field: def.name.to_string(),
            is_auto_increment: def.auto_increment,
            is_guid_generated: def.guid,
        })
        .collect()
}

/// Mapped column names of `E` in declaration order.
pub fn get_fields<E: Entity>() -> Vec<String> {
    E::schema()
        .fields
        .iter()
        .map(|def| def.name.to_string())
        .collect()
}

fn validate_schema<E: 'static>(entity: &'static str, schema: &EntitySchema<E>) -> Result<()> {
    for (i, def) in schema.fields.iter().enumerate() {
        if schema.fields[..i]
            .iter()
            .any(|prev| prev.name.eq_ignore_ascii_case(def.name))
        {
            return Err(SchemaError::new(
                entity,
                SchemaErrorKind::DuplicateColumn,
                format!("column '{}' is mapped more than once", def.name),
            )
            .into());
        }
        if def.guid && def.kind.scalar() != ScalarKind::Guid {
            return Err(SchemaError::new(
                entity,
                SchemaErrorKind::InvalidPrimaryKey,
                format!(
                    "field '{}' is GUID-generated but has kind {}",
                    def.name,
                    def.kind.scalar().name()
                ),
            )
            .into());
        }
        if (def.guid || def.auto_increment) && !def.primary_key {
            return Err(SchemaError::new(
                entity,
                SchemaErrorKind::InvalidPrimaryKey,
                format!(
                    "field '{}' has key generation flags but is not a primary key",
                    def.name
                ),
            )
            .into());
        }
    }

    for stamp in [schema.created_at, schema.updated_at].into_iter().flatten() {
        match schema.field(stamp) {
            Some(def) if def.kind.scalar() == ScalarKind::DateTime => {}
            Some(def) => {
                return Err(SchemaError::new(
                    entity,
                    SchemaErrorKind::InvalidTimestamp,
                    format!(
                        "timestamp field '{}' has kind {}, expected datetime",
                        def.name,
                        def.kind.scalar().name()
                    ),
                )
                .into());
            }
            None => {
                return Err(SchemaError::new(
                    entity,
                    SchemaErrorKind::InvalidTimestamp,
                    format!("timestamp field '{}' is not a mapped field", stamp),
                )
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldDef;
    use crate::entity::tests::Person;
    use crate::error::Error;
    use crate::field::{FieldKind, FieldValue};
    use crate::value::Value;

    #[derive(Debug, Default)]
    struct Unnamed {
        id: i32,
    }

    fn get_unnamed_id(u: &Unnamed) -> Value {
        u.id.to_value()
    }
    fn set_unnamed_id(u: &mut Unnamed, v: Value) -> Result<()> {
        u.id = FieldValue::from_value(v)?;
        Ok(())
    }

    static UNNAMED_FIELDS: [FieldDef<Unnamed>; 1] = [FieldDef::new(
        "Id",
        FieldKind::Scalar(ScalarKind::Int),
        get_unnamed_id,
        set_unnamed_id,
    )
    .primary_key()];

    static UNNAMED_SCHEMA: EntitySchema<Unnamed> = EntitySchema {
        table_name: None,
        view: false,
        created_at: None,
        updated_at: None,
        fields: &UNNAMED_FIELDS,
    };

    impl Entity for Unnamed {
        fn schema() -> &'static EntitySchema<Self> {
            &UNNAMED_SCHEMA
        }
    }

    #[derive(Debug, Default)]
    struct BadStamp {
        id: i32,
    }

    fn get_bad_id(b: &BadStamp) -> Value {
        b.id.to_value()
    }
    fn set_bad_id(b: &mut BadStamp, v: Value) -> Result<()> {
        b.id = FieldValue::from_value(v)?;
        Ok(())
    }

    static BAD_STAMP_FIELDS: [FieldDef<BadStamp>; 1] = [FieldDef::new(
        "Id",
        FieldKind::Scalar(ScalarKind::Int),
        get_bad_id,
        set_bad_id,
    )];

    static BAD_STAMP_SCHEMA: EntitySchema<BadStamp> = EntitySchema {
        table_name: Some("Stamps"),
        view: false,
        created_at: Some("Id"),
        updated_at: None,
        fields: &BAD_STAMP_FIELDS,
    };

    impl Entity for BadStamp {
        fn schema() -> &'static EntitySchema<Self> {
            &BAD_STAMP_SCHEMA
        }
    }

    #[test]
    fn test_person_metadata() {
        let meta = TableMetadata::of::<Person>().unwrap();
        assert_eq!(meta.table_name, "People");
        assert_eq!(meta.fields, vec!["Id", "Name", "Age"]);
        assert_eq!(
            meta.primary_keys,
            vec![PrimaryKeyDescriptor {
                field: "Id".into(),
                is_auto_increment: true,
                is_guid_generated: false,
            }]
        );
        assert_eq!(meta.insert_fields(), vec!["Name", "Age"]);
        assert_eq!(meta.update_fields(), vec!["Name", "Age"]);
        assert_eq!(meta.resolve_field("name"), Some("Name"));
    }

    #[test]
    fn test_metadata_is_memoized_and_idempotent() {
        let first = TableMetadata::of::<Person>().unwrap();
        let second = TableMetadata::of::<Person>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert_eq!(get_table_name::<Person>().unwrap(), "People");
        assert_eq!(get_fields::<Person>(), get_fields::<Person>());
        assert_eq!(get_primary_keys::<Person>(), get_primary_keys::<Person>());
    }

    #[test]
    fn test_missing_table_name_is_schema_error() {
        let err = get_table_name::<Unnamed>().unwrap_err();
        assert!(err.is_schema_error());

        match TableMetadata::of::<Unnamed>().unwrap_err() {
            Error::Schema(e) => assert_eq!(e.kind, SchemaErrorKind::MissingTableName),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_timestamp_must_be_datetime() {
        match TableMetadata::of::<BadStamp>().unwrap_err() {
            Error::Schema(e) => assert_eq!(e.kind, SchemaErrorKind::InvalidTimestamp),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn schema_kind(schema: &EntitySchema<BadStamp>) -> SchemaErrorKind {
        match validate_schema("BadStamp", schema).unwrap_err() {
            Error::Schema(e) => e.kind,
            other => panic!("unexpected error: {other}"),
        }
    }

    const INT_ID: FieldDef<BadStamp> = FieldDef::new(
        "Id",
        FieldKind::Scalar(ScalarKind::Int),
        get_bad_id,
        set_bad_id,
    );

    #[test]
    fn test_duplicate_column_is_schema_error() {
        static FIELDS: [FieldDef<BadStamp>; 2] = [
            INT_ID.primary_key(),
            FieldDef::new(
                "ID",
                FieldKind::Scalar(ScalarKind::Int),
                get_bad_id,
                set_bad_id,
            ),
        ];
        static SCHEMA: EntitySchema<BadStamp> = EntitySchema {
            table_name: Some("Stamps"),
            view: false,
            created_at: None,
            updated_at: None,
            fields: &FIELDS,
        };
        assert_eq!(schema_kind(&SCHEMA), SchemaErrorKind::DuplicateColumn);
    }

    #[test]
    fn test_guid_flag_requires_guid_kind() {
        static FIELDS: [FieldDef<BadStamp>; 1] = [INT_ID.primary_key().guid()];
        static SCHEMA: EntitySchema<BadStamp> = EntitySchema {
            table_name: Some("Stamps"),
            view: false,
            created_at: None,
            updated_at: None,
            fields: &FIELDS,
        };
        assert_eq!(schema_kind(&SCHEMA), SchemaErrorKind::InvalidPrimaryKey);
    }

    #[test]
    fn test_auto_increment_requires_primary_key() {
        static FIELDS: [FieldDef<BadStamp>; 1] = [INT_ID.auto_increment()];
        static SCHEMA: EntitySchema<BadStamp> = EntitySchema {
            table_name: Some("Stamps"),
            view: false,
            created_at: None,
            updated_at: None,
            fields: &FIELDS,
        };
        assert_eq!(schema_kind(&SCHEMA), SchemaErrorKind::InvalidPrimaryKey);
    }

    #[test]
    fn test_guid_key_is_system_but_not_database_assigned() {
        let pk = PrimaryKeyDescriptor {
            field: "Id".into(),
            is_auto_increment: false,
            is_guid_generated: true,
        };
        assert!(pk.is_system_assigned());
        assert!(!pk.is_database_assigned());
    }
}
