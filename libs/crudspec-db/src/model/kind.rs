//! Declared field types.
//!
//! Numeric kinds keep their exact width so a filter value can be bound as the
//! matching `sea_orm::Value` variant instead of a generic 64-bit number.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    String,
    Bool,
    Uuid,
    DateTime,
    Date,
    Time,
    Json,
    Bytes,
    #[default]
    Other,
}

/// Coarse type class driving the cast decision of the filter compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeClass {
    Numeric,
    String,
    Boolean,
    Temporal,
    Other,
}

impl FieldKind {
    #[must_use]
    pub fn class(self) -> TypeClass {
        match self {
            FieldKind::I8
            | FieldKind::I16
            | FieldKind::I32
            | FieldKind::I64
            | FieldKind::U8
            | FieldKind::U16
            | FieldKind::U32
            | FieldKind::U64
            | FieldKind::F32
            | FieldKind::F64
            | FieldKind::Decimal => TypeClass::Numeric,
            FieldKind::String => TypeClass::String,
            FieldKind::Bool => TypeClass::Boolean,
            FieldKind::DateTime | FieldKind::Date | FieldKind::Time => TypeClass::Temporal,
            FieldKind::Uuid | FieldKind::Json | FieldKind::Bytes | FieldKind::Other => {
                TypeClass::Other
            }
        }
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        self.class() == TypeClass::Numeric
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldKind::I8
                | FieldKind::I16
                | FieldKind::I32
                | FieldKind::I64
                | FieldKind::U8
                | FieldKind::U16
                | FieldKind::U32
                | FieldKind::U64
        )
    }

    /// Parse a type name as written in model descriptors. Accepts Rust
    /// primitive names and the common SQL spellings; unknown names are `Other`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "i8" | "tinyint" | "int8" => FieldKind::I8,
            "i16" | "smallint" | "int16" | "int2" => FieldKind::I16,
            "i32" | "int" | "integer" | "int32" | "int4" | "serial" => FieldKind::I32,
            "i64" | "bigint" | "int64" | "bigserial" => FieldKind::I64,
            "u8" | "uint8" => FieldKind::U8,
            "u16" | "uint16" => FieldKind::U16,
            "u32" | "uint32" | "uint" => FieldKind::U32,
            "u64" | "uint64" => FieldKind::U64,
            "f32" | "float" | "float32" | "real" | "float4" => FieldKind::F32,
            "f64" | "double" | "float64" | "float8" | "double precision" => FieldKind::F64,
            "decimal" | "numeric" | "money" => FieldKind::Decimal,
            "string" | "str" | "text" | "varchar" | "char" | "citext" => FieldKind::String,
            "bool" | "boolean" => FieldKind::Bool,
            "uuid" => FieldKind::Uuid,
            "datetime" | "timestamp" | "timestamptz" => FieldKind::DateTime,
            "date" => FieldKind::Date,
            "time" => FieldKind::Time,
            "json" | "jsonb" => FieldKind::Json,
            "bytes" | "bytea" | "blob" => FieldKind::Bytes,
            _ => FieldKind::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::I8 => "i8",
            FieldKind::I16 => "i16",
            FieldKind::I32 => "i32",
            FieldKind::I64 => "i64",
            FieldKind::U8 => "u8",
            FieldKind::U16 => "u16",
            FieldKind::U32 => "u32",
            FieldKind::U64 => "u64",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::Decimal => "decimal",
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Uuid => "uuid",
            FieldKind::DateTime => "datetime",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::Json => "json",
            FieldKind::Bytes => "bytes",
            FieldKind::Other => "other",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FieldKind::parse(&raw))
    }
}
