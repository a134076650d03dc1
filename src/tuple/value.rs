use std::cmp::Ordering;
use std::fmt;

use crate::common::{KilnError, Result};

use super::DataType;

/// A typed value stored in a tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Varchar(String),
}

impl Value {
    /// Returns the boolean payload, if this value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Serializes the value to bytes according to the given data type.
    pub fn serialize(&self, data_type: &DataType) -> Result<Vec<u8>> {
        match (self, data_type) {
            (Value::Boolean(b), DataType::Boolean) => Ok(vec![u8::from(*b)]),
            (Value::Integer(v), DataType::Integer) => Ok(v.to_le_bytes().to_vec()),
            (Value::BigInt(v), DataType::BigInt) => Ok(v.to_le_bytes().to_vec()),
            (Value::Integer(v), DataType::BigInt) => Ok((*v as i64).to_le_bytes().to_vec()),
            (Value::Varchar(s), DataType::Varchar(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len as usize {
                    return Err(KilnError::TupleCorrupted(format!(
                        "string of {} bytes exceeds VARCHAR({})",
                        bytes.len(),
                        max_len
                    )));
                }
                let mut out = (bytes.len() as u16).to_le_bytes().to_vec();
                out.extend_from_slice(bytes);
                Ok(out)
            }
            (value, data_type) => Err(KilnError::TupleCorrupted(format!(
                "value {value} is not a {data_type}"
            ))),
        }
    }

    /// Deserializes a value from bytes according to the given data type.
    /// Returns the value and the number of bytes consumed.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Result<(Self, usize)> {
        let short = || KilnError::TupleCorrupted(format!("truncated {data_type}"));
        match data_type {
            DataType::Boolean => {
                let byte = data.first().ok_or_else(short)?;
                Ok((Value::Boolean(*byte != 0), 1))
            }
            DataType::Integer => {
                let bytes: [u8; 4] = data.get(..4).ok_or_else(short)?.try_into().unwrap();
                Ok((Value::Integer(i32::from_le_bytes(bytes)), 4))
            }
            DataType::BigInt => {
                let bytes: [u8; 8] = data.get(..8).ok_or_else(short)?.try_into().unwrap();
                Ok((Value::BigInt(i64::from_le_bytes(bytes)), 8))
            }
            DataType::Varchar(_) => {
                let len_bytes: [u8; 2] = data.get(..2).ok_or_else(short)?.try_into().unwrap();
                let len = u16::from_le_bytes(len_bytes) as usize;
                let bytes = data.get(2..2 + len).ok_or_else(short)?;
                let s = String::from_utf8_lossy(bytes).to_string();
                Ok((Value::Varchar(s), 2 + len))
            }
        }
    }

    /// Compares two values for ordering. Returns None for incomparable
    /// types. Integer and BigInt compare against each other promoted.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::BigInt(b)) => Some((*a as i64).cmp(b)),
            (Value::BigInt(a), Value::Integer(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Varchar(a), Value::Varchar(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Varchar(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_roundtrip() {
        let val = Value::Integer(-42);
        let bytes = val.serialize(&DataType::Integer).unwrap();
        let (back, consumed) = Value::deserialize(&bytes, &DataType::Integer).unwrap();
        assert_eq!(back, val);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_varchar_roundtrip() {
        let val = Value::Varchar("hello".to_string());
        let bytes = val.serialize(&DataType::Varchar(100)).unwrap();
        assert_eq!(bytes, vec![5, 0, b'h', b'e', b'l', b'l', b'o']);
        let (back, consumed) = Value::deserialize(&bytes, &DataType::Varchar(100)).unwrap();
        assert_eq!(back, val);
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_varchar_too_long() {
        let val = Value::Varchar("toolong".to_string());
        assert!(val.serialize(&DataType::Varchar(3)).is_err());
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            Value::Integer(10).compare(&Value::Integer(20)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Integer(10).compare(&Value::BigInt(5)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Integer(1).compare(&Value::Varchar("1".into())), None);
    }
}
