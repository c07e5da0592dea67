use crate::bits::BitBuffer;
use crate::error::FieldError;
use crate::field::{FieldId, Fields};
use std::fmt::{Debug, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(u32),
    Pad { value: u32, bits: usize },
    Str(String),
    Subfields(Vec<FieldValues>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldValue {
    id: FieldId,
    value: Value,
}

impl FieldValue {
    pub fn new(id: impl Into<FieldId>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    pub fn int(id: impl Into<FieldId>, value: u32) -> Self {
        Self::new(id, Value::Int(value))
    }

    pub fn string(id: impl Into<FieldId>, value: impl Into<String>) -> Self {
        Self::new(id, Value::Str(value.into()))
    }

    pub fn subfields(id: impl Into<FieldId>, values: Vec<FieldValues>) -> Self {
        Self::new(id, Value::Subfields(values))
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn as_int(&self) -> Result<u32, FieldError> {
        match self.value {
            Value::Int(v) | Value::Pad { value: v, .. } => Ok(v),
            _ => Err(self.wrong_type("int")),
        }
    }

    pub fn as_str(&self) -> Result<&str, FieldError> {
        match &self.value {
            Value::Str(s) => Ok(s),
            _ => Err(self.wrong_type("string")),
        }
    }

    pub fn as_subfields(&self) -> Result<&[FieldValues], FieldError> {
        match &self.value {
            Value::Subfields(items) => Ok(items),
            _ => Err(self.wrong_type("subfields")),
        }
    }

    fn wrong_type(&self, expected: &'static str) -> FieldError {
        FieldError::WrongType {
            field: self.id,
            expected,
        }
    }
}

/// A decoded record: one value per field of its schema, in schema order.
#[derive(Clone)]
pub struct FieldValues {
    fields: &'static Fields,
    values: Vec<FieldValue>,
}

impl FieldValues {
    pub(crate) fn empty(fields: &'static Fields) -> Self {
        Self {
            fields,
            values: Vec::with_capacity(fields.len()),
        }
    }

    pub(crate) fn push(&mut self, value: FieldValue) {
        self.values.push(value);
    }

    pub fn schema(&self) -> &'static Fields {
        self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldValue> {
        self.values.iter()
    }

    pub fn get(&self, id: impl Into<FieldId>) -> Option<&FieldValue> {
        let id = id.into();
        self.values.iter().find(|v| v.id == id)
    }

    pub fn require(&self, id: impl Into<FieldId>) -> Result<&FieldValue, FieldError> {
        let id = id.into();
        self.get(id).ok_or(FieldError::MissingValue(id))
    }

    pub fn int(&self, id: impl Into<FieldId>) -> Result<u32, FieldError> {
        self.require(id)?.as_int()
    }

    pub fn int_maybe(&self, id: impl Into<FieldId>) -> Option<u32> {
        self.get(id).and_then(|v| v.as_int().ok())
    }

    pub fn bool_value(&self, id: impl Into<FieldId>) -> Result<bool, FieldError> {
        Ok(self.int(id)? == 1)
    }

    pub fn string(&self, id: impl Into<FieldId>) -> Result<&str, FieldError> {
        self.require(id)?.as_str()
    }

    pub fn subfields(&self, id: impl Into<FieldId>) -> Result<&[FieldValues], FieldError> {
        self.require(id)?.as_subfields()
    }

    /// Replaces the value carrying the same field identity.
    pub fn update(&mut self, value: FieldValue) -> Result<(), FieldError> {
        match self.values.iter_mut().find(|v| v.id == value.id) {
            Some(existing) => {
                *existing = value;
                Ok(())
            }
            None => Err(FieldError::UnknownField {
                field: value.id,
                schema: self.fields.name(),
            }),
        }
    }

    pub fn write(&self, bb: &mut BitBuffer) -> Result<(), FieldError> {
        for value in &self.values {
            let field = self
                .fields
                .field(value.id)
                .ok_or(FieldError::UnknownField {
                    field: value.id,
                    schema: self.fields.name(),
                })?;
            field.write(bb, &value.value)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FieldError> {
        let mut bb = BitBuffer::new();
        self.write(&mut bb)?;
        Ok(bb.into_bytes())
    }
}

impl PartialEq for FieldValues {
    fn eq(&self, other: &Self) -> bool {
        self.fields.name() == other.fields.name() && self.values == other.values
    }
}

impl Eq for FieldValues {}

impl Debug for FieldValues {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for field in &self.values {
            let name = field.id.name();
            match &field.value {
                Value::Int(v) | Value::Pad { value: v, .. } => map.entry(&name, v),
                Value::Str(s) => map.entry(&name, s),
                Value::Subfields(items) => map.entry(&name, items),
            };
        }
        map.finish()
    }
}
