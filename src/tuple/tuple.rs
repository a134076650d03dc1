use std::sync::Arc;

use crate::common::{KilnError, Result};

use super::{Schema, Value};

/// A single row: a schema plus one value per column.
///
/// Serialized form is the column values in schema order, each encoded per
/// its data type. There is no per-row header; the schema drives decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Tuple {
    /// # Panics
    /// Panics if the number of values doesn't match the schema column count.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.column_count(),
            "value count must match schema column count"
        );
        Self { schema, values }
    }

    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        let mut values = Vec::with_capacity(schema.column_count());
        let mut offset = 0;
        for col in schema.columns() {
            let (value, consumed) = Value::deserialize(&data[offset..], col.data_type())?;
            offset += consumed;
            values.push(value);
        }
        Ok(Self { schema, values })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for (value, col) in self.values.iter().zip(self.schema.columns()) {
            bytes.extend(value.serialize(col.data_type())?);
        }
        Ok(bytes)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Projects the key columns out of this row, producing the tuple an
    /// index stores for it.
    pub fn key_from_tuple(&self, key_schema: &Arc<Schema>, key_attrs: &[usize]) -> Result<Tuple> {
        let values: Option<Vec<Value>> = key_attrs
            .iter()
            .map(|&i| self.values.get(i).cloned())
            .collect();
        let values = values.ok_or_else(|| {
            KilnError::TupleCorrupted(format!("key attrs {key_attrs:?} out of range"))
        })?;
        Ok(Tuple::new(key_schema.clone(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Column, DataType};

    fn schema() -> Arc<Schema> {
        Schema::new_arc(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar(64)),
            Column::new("score", DataType::BigInt),
        ])
    }

    #[test]
    fn test_roundtrip() {
        let schema = schema();
        let tuple = Tuple::new(
            schema.clone(),
            vec![
                Value::Integer(7),
                Value::Varchar("ada".into()),
                Value::BigInt(1234567890123),
            ],
        );
        let bytes = tuple.to_bytes().unwrap();
        let back = Tuple::from_bytes(schema, &bytes).unwrap();
        assert_eq!(tuple, back);
    }

    #[test]
    fn test_key_projection() {
        let schema = schema();
        let key_schema = Schema::new_arc(vec![Column::new("id", DataType::Integer)]);
        let tuple = Tuple::new(
            schema,
            vec![
                Value::Integer(7),
                Value::Varchar("ada".into()),
                Value::BigInt(1),
            ],
        );
        let key = tuple.key_from_tuple(&key_schema, &[0]).unwrap();
        assert_eq!(key.value(0), Some(&Value::Integer(7)));
        assert!(tuple.key_from_tuple(&key_schema, &[9]).is_err());
    }

    #[test]
    #[should_panic]
    fn test_arity_mismatch() {
        Tuple::new(schema(), vec![Value::Integer(1)]);
    }
}
