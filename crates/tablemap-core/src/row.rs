//! Database row representation.

use crate::Result;
use crate::convert::from_wire_value;
use crate::field::FieldValue;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// This struct is wrapped in `Arc` so all rows from the same query share
/// the same column information.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicate column names.
            name_to_index.entry(name.clone()).or_insert(i);
        }
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Index of a column by ASCII case-insensitive name.
    pub fn index_of_ignore_case(&self, name: &str) -> Option<usize> {
        self.index_of(name)
            .or_else(|| self.names.iter().position(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a query: column name to raw value.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self::new(names, values)
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by exact column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a value by column name, ignoring ASCII case.
    pub fn get_by_name_ignore_case(&self, name: &str) -> Option<&Value> {
        self.columns
            .index_of_ignore_case(name)
            .and_then(|i| self.values.get(i))
    }

    /// Read a column into a typed value, with the same coercion rules the
    /// row mapper applies.
    ///
    /// Returns `Ok(None)` when the column is absent.
    pub fn get_named<T: FieldValue>(&self, name: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_by_name_ignore_case(name) else {
            return Ok(None);
        };
        let value = from_wire_value(raw, T::KIND, name)?;
        T::from_value(value).map(Some)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names.iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_basic_access() {
        let row = Row::from_pairs([("Id", Value::Int(1)), ("Name", Value::Text("Ann".into()))]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert_eq!(row.get_by_name("Name"), Some(&Value::Text("Ann".into())));
        assert_eq!(row.get_by_name("name"), None);
        assert_eq!(
            row.get_by_name_ignore_case("name"),
            Some(&Value::Text("Ann".into()))
        );
    }

    #[test]
    fn test_row_shared_columns() {
        let columns = Arc::new(ColumnInfo::new(vec!["A".into()]));
        let r1 = Row::with_columns(Arc::clone(&columns), vec![Value::Int(1)]);
        let r2 = Row::with_columns(r1.column_info(), vec![Value::Int(2)]);
        assert!(Arc::ptr_eq(&r1.column_info(), &r2.column_info()));
    }

    #[test]
    fn test_row_duplicate_columns_first_wins() {
        let row = Row::new(
            vec!["Id".into(), "Id".into()],
            vec![Value::Int(1), Value::Int(2)],
        );
        assert_eq!(row.get_by_name("Id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_row_get_named_coerces() {
        let row = Row::from_pairs([("Total", Value::Text("12".into()))]);
        assert_eq!(row.get_named::<i64>("total").unwrap(), Some(12));
        assert_eq!(row.get_named::<i64>("missing").unwrap(), None);
        assert!(row.get_named::<bool>("Total").is_err());
    }

    #[test]
    fn test_row_iter() {
        let row = Row::from_pairs([("A", Value::Int(1)), ("B", Value::Null)]);
        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs, vec![("A", &Value::Int(1)), ("B", &Value::Null)]);
    }
}
