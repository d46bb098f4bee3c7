use crate::error::{ConformanceError, Result};
use serde::{Deserialize, Serialize};

/// A value bound to a `?` placeholder of a prepared statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    String(String),
    Integer(i32),
    BigInt(i64),
    Decimal(String),
    Binary(Vec<u8>),
    Null,
}

impl ParamValue {
    /// Text form used when the driver binds every parameter as VARCHAR.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ParamValue::Null => None,
            ParamValue::String(s) => Some(s.clone()),
            ParamValue::Integer(n) => Some(n.to_string()),
            ParamValue::BigInt(n) => Some(n.to_string()),
            ParamValue::Decimal(s) => Some(s.clone()),
            ParamValue::Binary(b) => Some(b.iter().map(|x| format!("{:02x}", x)).collect()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::BigInt(n)
    }
}

pub fn param_values_to_strings(params: &[ParamValue]) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(params.len());
    for p in params {
        match p.to_text() {
            Some(s) => out.push(s),
            None => {
                return Err(ConformanceError::Validation(
                    "NULL parameters not supported yet".to_string(),
                ));
            }
        }
    }
    Ok(out)
}
