//! Result shapes: a named-column [`Table`] and plain [`Record`] rows

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::{Error, Result};
use crate::traits::FromValue;
use crate::value::Value;

/// How rows are shaped by `fetch_as_rows`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowMode {
    /// Each row is an ordered tuple of column values.
    #[default]
    Tuple,
    /// Each row maps column name to value.
    Mapping,
}

/// A fully materialized result set: ordered rows over named columns.
///
/// A query that completed with zero rows yields an empty table that still
/// carries its column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table. Every row must have one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(Error::Statement(format!(
                "row {} has {} values for {} columns",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Typed cell access by row index and column name.
    pub fn get<T: FromValue>(&self, row: usize, column: &str) -> Result<T> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))?;
        let cell = self
            .rows
            .get(row)
            .map(|r| r[idx].clone())
            .ok_or_else(|| Error::Statement(format!("row {} out of range", row)))?;
        T::from_value(cell).map_err(|e| with_column(e, column))
    }

    /// All values of one column, converted to `T`.
    pub fn column<T: FromValue>(&self, name: &str) -> Result<Vec<T>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        self.rows
            .iter()
            .map(|r| T::from_value(r[idx].clone()).map_err(|e| with_column(e, name)))
            .collect()
    }

    /// Split into rows shaped by `mode`.
    pub fn into_records(self, mode: RowMode) -> Vec<Record> {
        match mode {
            RowMode::Tuple => self.rows.into_iter().map(Record::Tuple).collect(),
            RowMode::Mapping => {
                let columns = self.columns;
                self.rows
                    .into_iter()
                    .map(|row| Record::Mapping(columns.iter().cloned().zip(row).collect()))
                    .collect()
            }
        }
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }
}

fn with_column(err: Error, column: &str) -> Error {
    match err {
        Error::UnexpectedNull(_) => Error::UnexpectedNull(column.to_string()),
        other => other,
    }
}

/// Serializes as a list of `{column: value}` objects, one per row.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct RowRef<'a>(&'a [String], &'a [Value]);

        impl Serialize for RowRef<'_> {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (column, value) in self.0.iter().zip(self.1) {
                    map.serialize_entry(column, value)?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRef(&self.columns, row))?;
        }
        seq.end()
    }
}

/// One result row, shaped per [`RowMode`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Record {
    Tuple(Vec<Value>),
    Mapping(HashMap<String, Value>),
}

impl Record {
    /// Value at a column position. Only tuple rows are positional.
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            Record::Tuple(values) => values.get(index),
            Record::Mapping(_) => None,
        }
    }

    /// Value by column name. Only mapping rows carry names.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        match self {
            Record::Tuple(_) => None,
            Record::Mapping(values) => values.get(name),
        }
    }

    pub fn try_get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self
            .get(index)
            .ok_or_else(|| Error::ColumnNotFound(format!("#{}", index)))?;
        T::from_value(value.clone())
    }

    pub fn try_get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get_named(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        T::from_value(value.clone()).map_err(|e| with_column(e, name))
    }

    pub fn len(&self) -> usize {
        match self {
            Record::Tuple(values) => values.len(),
            Record::Mapping(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Int(1), Value::Text("alice".into())],
                vec![Value::Int(2), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Table::new(vec!["a".into()], vec![vec![Value::Int(1), Value::Int(2)]]);
        assert!(err.is_err());
    }

    #[test]
    fn test_typed_access() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get::<i64>(0, "id").unwrap(), 1);
        assert_eq!(table.get::<Option<String>>(1, "name").unwrap(), None);
        assert!(matches!(
            table.get::<String>(1, "name"),
            Err(Error::UnexpectedNull(col)) if col == "name"
        ));
        assert!(matches!(
            table.get::<i64>(0, "missing"),
            Err(Error::ColumnNotFound(_))
        ));
        assert_eq!(table.column::<i64>("id").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_empty_table_keeps_columns() {
        let table = Table::new(vec!["n".into()], vec![]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), ["n".to_string()]);
    }

    #[test]
    fn test_records_by_mode() {
        let tuples = sample().into_records(RowMode::Tuple);
        assert_eq!(tuples[0].try_get::<i64>(0).unwrap(), 1);
        assert!(tuples[0].get_named("id").is_none());

        let maps = sample().into_records(RowMode::Mapping);
        assert_eq!(maps[1].try_get_named::<i64>("id").unwrap(), 2);
        assert_eq!(maps[0].try_get_named::<String>("name").unwrap(), "alice");
        assert!(maps[0].get(0).is_none());
    }

    #[test]
    fn test_serializes_rows_as_objects() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"id": 1, "name": "alice"},
                {"id": 2, "name": null}
            ])
        );
    }
}
