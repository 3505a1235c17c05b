//! Field descriptions derived from a table schema

use arrow::datatypes::{DataType, Schema};

use crate::ViewError;

/// Columns holding the deletion metadata of soft-deleted records
pub const DELETION_FIELDS: [&str; 2] = ["metaDeletedBy", "metaDeletionDate"];

/// Columns maintained by the store itself
pub const META_FIELDS: [&str; 6] = [
    "metaCreationDate",
    "metaCreatedBy",
    "metaModificationDate",
    "metaModifiedBy",
    "metaDeletionDate",
    "metaDeletedBy",
];

pub fn is_reserved_meta_name(name: &str) -> bool {
    META_FIELDS.contains(&name)
}

/// How a column is presented and grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Boolean,
    Integer,
    Float,
    Text,
    /// Timestamps and dates, read as milliseconds
    DateTime,
    Other,
}

impl FieldKind {
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean => FieldKind::Boolean,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => FieldKind::Integer,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => FieldKind::Float,
            DataType::Utf8 | DataType::LargeUtf8 => FieldKind::Text,
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => FieldKind::DateTime,
            _ => FieldKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub title: String,
    pub data_type: DataType,
    pub kind: FieldKind,
    pub editable: bool,
    pub required: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            title: title_from_camel_case(&name),
            kind: FieldKind::of(&data_type),
            editable: !is_reserved_meta_name(&name),
            required: false,
            data_type,
            name,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn is_date(&self) -> bool {
        self.kind == FieldKind::DateTime
    }
}

/// Ordered fields of one view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    /// Every column except the deletion metadata
    pub fn from_schema(schema: &Schema) -> Self {
        let fields = schema
            .fields()
            .iter()
            .filter(|f| !DELETION_FIELDS.contains(&f.name().as_str()))
            .map(|f| Field::new(f.name().clone(), f.data_type().clone()))
            .collect();
        Self { fields }
    }

    /// The named columns, in the given order
    pub fn from_names(schema: &Schema, names: &[&str]) -> Result<Self, ViewError> {
        let fields = names
            .iter()
            .map(|name| {
                schema
                    .field_with_name(name)
                    .map(|f| Field::new(*name, f.data_type().clone()))
                    .map_err(|_| ViewError::UnknownField(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fields })
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn date_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_date())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Title from a camelCase name; the first three characters are never split
pub fn title_from_camel_case(name: &str) -> String {
    let mut title = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i >= 3 && c.is_uppercase() {
            title.push(' ');
        }
        title.push(c);
    }

    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
