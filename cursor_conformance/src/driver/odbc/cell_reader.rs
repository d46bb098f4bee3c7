use crate::driver::{ColumnType, Value};
use crate::error::{ConformanceError, Result};
use odbc_api::CursorRow;

pub fn read_cell_value(
    row: &mut CursorRow<'_>,
    column_number: u16,
    column_type: ColumnType,
) -> Result<Value> {
    match column_type {
        ColumnType::Binary => read_binary(row, column_number),
        _ => Ok(match read_text(row, column_number)? {
            Some(text) => text_to_value(text, column_type),
            None => Value::Null,
        }),
    }
}

fn read_text(row: &mut CursorRow<'_>, column_number: u16) -> Result<Option<Vec<u8>>> {
    let mut buf: Vec<u8> = Vec::new();
    let has_value = row
        .get_text(column_number, &mut buf)
        .map_err(ConformanceError::from)?;

    if has_value {
        Ok(Some(buf))
    } else {
        Ok(None)
    }
}

fn read_binary(row: &mut CursorRow<'_>, column_number: u16) -> Result<Value> {
    let mut buf: Vec<u8> = Vec::new();
    let has_value = row
        .get_binary(column_number, &mut buf)
        .map_err(ConformanceError::from)?;

    if has_value {
        Ok(Value::Bytes(buf))
    } else {
        Ok(Value::Null)
    }
}

/// Converts the text representation of a cell. Numbers the driver renders
/// in an unexpected way stay text rather than failing the row.
pub(crate) fn text_to_value(bytes: Vec<u8>, column_type: ColumnType) -> Value {
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => return Value::Bytes(e.into_bytes()),
    };
    let trimmed = text.trim();

    match column_type {
        ColumnType::Integer | ColumnType::BigInt => match trimmed.parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(text),
        },
        ColumnType::Double => match trimmed.parse::<f64>() {
            Ok(d) => Value::Double(d),
            Err(_) => Value::Text(text),
        },
        ColumnType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "1" | "true" => Value::Boolean(true),
            "0" | "false" => Value::Boolean(false),
            _ => Value::Text(text),
        },
        ColumnType::Decimal => Value::Decimal(trimmed.to_string()),
        ColumnType::Date => Value::Date(trimmed.to_string()),
        ColumnType::Timestamp => Value::Timestamp(trimmed.to_string()),
        ColumnType::Varchar | ColumnType::Binary => Value::Text(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_to_value_integer() {
        assert_eq!(
            text_to_value(b"42".to_vec(), ColumnType::Integer),
            Value::Integer(42)
        );
        assert_eq!(
            text_to_value(b" 9223372036854775807 ".to_vec(), ColumnType::BigInt),
            Value::Integer(i64::MAX)
        );
    }

    #[test]
    fn test_text_to_value_unparsable_integer_stays_text() {
        assert_eq!(
            text_to_value(b"4x".to_vec(), ColumnType::Integer),
            Value::Text("4x".to_string())
        );
    }

    #[test]
    fn test_text_to_value_boolean_and_double() {
        assert_eq!(
            text_to_value(b"1".to_vec(), ColumnType::Boolean),
            Value::Boolean(true)
        );
        assert_eq!(
            text_to_value(b"FALSE".to_vec(), ColumnType::Boolean),
            Value::Boolean(false)
        );
        assert_eq!(
            text_to_value(b"2.5".to_vec(), ColumnType::Double),
            Value::Double(2.5)
        );
    }

    #[test]
    fn test_text_to_value_temporal_and_decimal() {
        assert_eq!(
            text_to_value(b"2024-01-31".to_vec(), ColumnType::Date),
            Value::Date("2024-01-31".to_string())
        );
        assert_eq!(
            text_to_value(b"12.50".to_vec(), ColumnType::Decimal),
            Value::Decimal("12.50".to_string())
        );
    }

    #[test]
    fn test_text_to_value_invalid_utf8_becomes_bytes() {
        assert_eq!(
            text_to_value(vec![0xff, 0xfe], ColumnType::Varchar),
            Value::Bytes(vec![0xff, 0xfe])
        );
    }
}
