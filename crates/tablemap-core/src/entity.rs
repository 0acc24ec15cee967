//! The `Entity` trait and the static schema descriptor it exposes.
//!
//! An entity is a plain struct mapped to one table (or view). Instead of
//! scanning attributes at runtime, every entity hands out a static
//! [`EntitySchema`]: the table declaration plus an ordered accessor table
//! with one getter/setter pair per mapped field. It is normally generated by
//! `#[derive(Entity)]`:
//!
//! ```ignore
//! #[derive(Entity, Default)]
//! #[tablemap(table = "People")]
//! struct Person {
//!     #[tablemap(primary_key, auto_increment)]
//!     id: i32,
//!     name: String,
//!     age: i32,
//! }
//! ```

use crate::Result;
use crate::convert::from_wire_value;
use crate::error::Error;
use crate::field::FieldKind;
use crate::row::Row;
use crate::value::Value;

/// One mapped field: column name, declared kind, key flags and accessors.
pub struct FieldDef<E> {
    /// Column name
    pub name: &'static str,
    pub kind: FieldKind,
    pub primary_key: bool,
    /// Key value is assigned by the database
    pub auto_increment: bool,
    /// Key value is a GUID generated client-side before insert
    pub guid: bool,
    pub get: fn(&E) -> Value,
    pub set: fn(&mut E, Value) -> Result<()>,
}

impl<E> FieldDef<E> {
    /// A plain, non-key field.
    pub const fn new(
        name: &'static str,
        kind: FieldKind,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<()>,
    ) -> Self {
        Self {
            name,
            kind,
            primary_key: false,
            auto_increment: false,
            guid: false,
            get,
            set,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub const fn guid(mut self) -> Self {
        self.guid = true;
        self
    }
}

impl<E> std::fmt::Debug for FieldDef<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("primary_key", &self.primary_key)
            .field("auto_increment", &self.auto_increment)
            .field("guid", &self.guid)
            .finish_non_exhaustive()
    }
}

/// Static schema declaration of an entity type.
pub struct EntitySchema<E: 'static> {
    /// Declared table (or view) name; `None` is reported as a schema error
    pub table_name: Option<&'static str>,
    /// Read-only projection: inserts and updates are rejected
    pub view: bool,
    /// Field stamped with the current time on insert
    pub created_at: Option<&'static str>,
    /// Field stamped with the current time on insert and update
    pub updated_at: Option<&'static str>,
    /// Mapped fields in declaration order
    pub fields: &'static [FieldDef<E>],
}

impl<E: 'static> EntitySchema<E> {
    /// Look up a field by column name (exact match first, then ASCII
    /// case-insensitive).
    pub fn field(&self, name: &str) -> Option<&FieldDef<E>> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Primary-key fields in declaration order.
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDef<E>> {
        self.fields.iter().filter(|f| f.primary_key)
    }
}

impl<E: 'static> std::fmt::Debug for EntitySchema<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySchema")
            .field("table_name", &self.table_name)
            .field("view", &self.view)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("fields", &self.fields)
            .finish()
    }
}

/// A struct mapped to a single table.
pub trait Entity: Default + Send + Sync + 'static {
    /// The static schema descriptor for this type.
    fn schema() -> &'static EntitySchema<Self>;

    /// Current value of a field by column name.
    fn field_value(&self, name: &str) -> Option<Value> {
        Self::schema().field(name).map(|def| (def.get)(self))
    }

    /// Overwrite a field by column name with an already-coerced value.
    fn set_field_value(&mut self, name: &str, value: Value) -> Result<bool> {
        match Self::schema().field(name) {
            Some(def) => {
                (def.set)(self, value).map_err(|e| attach_field(e, def.name))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Hydrate an entity from a result row.
///
/// Columns are matched to fields by name (exact, then case-insensitive).
/// Fields without a matching column keep their `Default` value. The first
/// value that cannot be coerced aborts the whole row with a
/// [`crate::error::MappingError`] naming the field.
pub fn map_row<E: Entity>(row: &Row) -> Result<E> {
    let mut entity = E::default();
    for def in E::schema().fields {
        let Some(raw) = row
            .get_by_name(def.name)
            .or_else(|| row.get_by_name_ignore_case(def.name))
        else {
            continue;
        };
        let value = from_wire_value(raw, def.kind, def.name)?;
        (def.set)(&mut entity, value).map_err(|e| attach_field(e, def.name))?;
    }
    Ok(entity)
}

fn attach_field(err: Error, field: &str) -> Error {
    match err {
        Error::Mapping(m) if m.field.is_empty() => Error::Mapping(m.for_field(field)),
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::field::{FieldValue, ScalarKind};

    #[derive(Debug, Default, Clone, PartialEq)]
    pub(crate) struct Person {
        pub id: i32,
        pub name: String,
        pub age: Option<i32>,
    }

    fn get_id(p: &Person) -> Value {
        p.id.to_value()
    }
    fn set_id(p: &mut Person, v: Value) -> Result<()> {
        p.id = FieldValue::from_value(v)?;
        Ok(())
    }
    fn get_name(p: &Person) -> Value {
        p.name.to_value()
    }
    fn set_name(p: &mut Person, v: Value) -> Result<()> {
        p.name = FieldValue::from_value(v)?;
        Ok(())
    }
    fn get_age(p: &Person) -> Value {
        p.age.to_value()
    }
    fn set_age(p: &mut Person, v: Value) -> Result<()> {
        p.age = FieldValue::from_value(v)?;
        Ok(())
    }

    static PERSON_FIELDS: [FieldDef<Person>; 3] = [
        FieldDef::new("Id", FieldKind::Scalar(ScalarKind::Int), get_id, set_id)
            .primary_key()
            .auto_increment(),
        FieldDef::new("Name", FieldKind::Scalar(ScalarKind::Text), get_name, set_name),
        FieldDef::new("Age", FieldKind::Nullable(ScalarKind::Int), get_age, set_age),
    ];

    static PERSON_SCHEMA: EntitySchema<Person> = EntitySchema {
        table_name: Some("People"),
        view: false,
        created_at: None,
        updated_at: None,
        fields: &PERSON_FIELDS,
    };

    impl Entity for Person {
        fn schema() -> &'static EntitySchema<Self> {
            &PERSON_SCHEMA
        }
    }

    fn row(values: Vec<(&str, Value)>) -> Row {
        let (names, values): (Vec<_>, Vec<_>) =
            values.into_iter().map(|(n, v)| (n.to_string(), v)).unzip();
        Row::new(names, values)
    }

    #[test]
    fn test_map_row_typed_values() {
        let p: Person = map_row(&row(vec![
            ("Id", Value::Int(5)),
            ("Name", Value::Text("Ann".into())),
            ("Age", Value::Int(41)),
        ]))
        .unwrap();
        assert_eq!(
            p,
            Person {
                id: 5,
                name: "Ann".into(),
                age: Some(41)
            }
        );
    }

    #[test]
    fn test_map_row_string_wire_values_and_case_insensitive_columns() {
        let p: Person = map_row(&row(vec![
            ("ID", Value::Text("7".into())),
            ("name", Value::Text("Bo".into())),
            ("AGE", Value::Text(String::new())),
        ]))
        .unwrap();
        assert_eq!(p.id, 7);
        assert_eq!(p.name, "Bo");
        assert_eq!(p.age, None);
    }

    #[test]
    fn test_map_row_missing_columns_keep_defaults() {
        let p: Person = map_row(&row(vec![("Name", Value::Text("Cy".into()))])).unwrap();
        assert_eq!(p.id, 0);
        assert_eq!(p.age, None);
    }

    #[test]
    fn test_map_row_aborts_on_bad_value() {
        let err = map_row::<Person>(&row(vec![
            ("Id", Value::Text("abc".into())),
            ("Name", Value::Text("Dee".into())),
        ]))
        .unwrap_err();
        match err {
            Error::Mapping(m) => {
                assert_eq!(m.field, "Id");
                assert_eq!(m.raw_value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_field_value_lookup() {
        let p = Person {
            id: 1,
            name: "Ed".into(),
            age: None,
        };
        assert_eq!(p.field_value("name"), Some(Value::Text("Ed".into())));
        assert_eq!(p.field_value("Age"), Some(Value::Null));
        assert_eq!(p.field_value("Missing"), None);
    }

    #[test]
    fn test_set_field_value() {
        let mut p = Person::default();
        assert!(p.set_field_value("Id", Value::Int(9)).unwrap());
        assert!(!p.set_field_value("Nope", Value::Int(9)).unwrap());
        assert_eq!(p.id, 9);

        let err = p.set_field_value("Id", Value::Text("x".into())).unwrap_err();
        assert!(matches!(err, Error::Mapping(ref m) if m.field == "Id"));
    }
}
