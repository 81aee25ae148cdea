use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic data type of a result column.
///
/// Serialized as a plain string. Names are matched case-insensitively and a
/// few common aliases are folded together; anything unrecognized is kept
/// verbatim in [`ColumnDataType::Other`] so new backend types never break
/// parsing.
///
/// # Example JSON
///
/// ```json
/// "bigint"
/// "VARCHAR"
/// "geometry"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnDataType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Bit,
    Char,
    Varchar,
    Text,
    Binary,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Json,
    Enum,
    Set,
    Geometry,
    Vector,
    /// A type name the engine does not know about.
    Other(String),
}

impl ColumnDataType {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &str {
        match self {
            ColumnDataType::Boolean => "boolean",
            ColumnDataType::TinyInt => "tinyint",
            ColumnDataType::SmallInt => "smallint",
            ColumnDataType::Int => "int",
            ColumnDataType::BigInt => "bigint",
            ColumnDataType::Decimal => "decimal",
            ColumnDataType::Float => "float",
            ColumnDataType::Double => "double",
            ColumnDataType::Bit => "bit",
            ColumnDataType::Char => "char",
            ColumnDataType::Varchar => "varchar",
            ColumnDataType::Text => "text",
            ColumnDataType::Binary => "binary",
            ColumnDataType::Blob => "blob",
            ColumnDataType::Date => "date",
            ColumnDataType::Time => "time",
            ColumnDataType::DateTime => "datetime",
            ColumnDataType::Timestamp => "timestamp",
            ColumnDataType::Year => "year",
            ColumnDataType::Json => "json",
            ColumnDataType::Enum => "enum",
            ColumnDataType::Set => "set",
            ColumnDataType::Geometry => "geometry",
            ColumnDataType::Vector => "vector",
            ColumnDataType::Other(name) => name.as_str(),
        }
    }

    /// Returns true for integer, fixed and floating point types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnDataType::TinyInt
                | ColumnDataType::SmallInt
                | ColumnDataType::Int
                | ColumnDataType::BigInt
                | ColumnDataType::Decimal
                | ColumnDataType::Float
                | ColumnDataType::Double
        )
    }
}

impl From<String> for ColumnDataType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ColumnDataType::Boolean,
            "tinyint" => ColumnDataType::TinyInt,
            "smallint" | "mediumint" => ColumnDataType::SmallInt,
            "int" | "integer" => ColumnDataType::Int,
            "bigint" => ColumnDataType::BigInt,
            "decimal" | "numeric" => ColumnDataType::Decimal,
            "float" => ColumnDataType::Float,
            "double" | "real" => ColumnDataType::Double,
            "bit" => ColumnDataType::Bit,
            "char" => ColumnDataType::Char,
            "varchar" | "string" => ColumnDataType::Varchar,
            "text" | "tinytext" | "mediumtext" | "longtext" => ColumnDataType::Text,
            "binary" | "varbinary" => ColumnDataType::Binary,
            "blob" | "tinyblob" | "mediumblob" | "longblob" => ColumnDataType::Blob,
            "date" => ColumnDataType::Date,
            "time" => ColumnDataType::Time,
            "datetime" => ColumnDataType::DateTime,
            "timestamp" => ColumnDataType::Timestamp,
            "year" => ColumnDataType::Year,
            "json" => ColumnDataType::Json,
            "enum" => ColumnDataType::Enum,
            "set" => ColumnDataType::Set,
            "geometry" | "point" | "linestring" | "polygon" => ColumnDataType::Geometry,
            "vector" => ColumnDataType::Vector,
            _ => ColumnDataType::Other(value),
        }
    }
}

impl From<ColumnDataType> for String {
    fn from(value: ColumnDataType) -> Self {
        match value {
            ColumnDataType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
