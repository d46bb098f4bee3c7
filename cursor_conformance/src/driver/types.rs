use serde::{Deserialize, Serialize};

#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Varchar = 1,
    Integer = 2,
    BigInt = 3,
    Decimal = 4,
    Date = 5,
    Timestamp = 6,
    Binary = 7,
    Double = 8,
    Boolean = 9,
}

impl ColumnType {
    pub fn from_odbc_sql_type(sql_type: i16) -> Self {
        match sql_type {
            1 | 12 | -1 | -8 | -9 | -10 => Self::Varchar,
            4 | 5 | -6 => Self::Integer,
            -5 => Self::BigInt,
            2 | 3 => Self::Decimal,
            6 | 7 | 8 => Self::Double,
            -7 => Self::Boolean,
            9 | 91 => Self::Date,
            11 | 93 => Self::Timestamp,
            -2 | -3 | -4 => Self::Binary,
            _ => Self::Varchar,
        }
    }

    pub fn sql_type_code_from_data_type(data_type: &odbc_api::DataType) -> i16 {
        use odbc_api::DataType;

        match data_type {
            DataType::Integer | DataType::SmallInt | DataType::TinyInt => 4,
            DataType::Bit => -7,
            DataType::BigInt => -5,
            DataType::Numeric { .. } | DataType::Decimal { .. } => 3,
            DataType::Real | DataType::Float { .. } | DataType::Double => 8,
            DataType::Date => 9,
            DataType::Timestamp { .. } => 11,
            DataType::Binary { .. }
            | DataType::Varbinary { .. }
            | DataType::LongVarbinary { .. } => -2,
            _ => 1,
        }
    }
}

/// Name and coarse type of a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn varchar(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Varchar)
    }
}
