use crate::bits::BitBuffer;
use crate::dump::dump_hex;
use crate::error::FieldError;
use crate::values::{FieldValue, FieldValues, Value};
use log::{error, warn};
use std::fmt::{Display, Formatter};

/// Stable identity of a field: the schema it belongs to, and its name within that schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    schema: &'static str,
    name: &'static str,
}

impl FieldId {
    pub const fn new(schema: &'static str, name: &'static str) -> Self {
        Self { schema, name }
    }

    pub fn schema(&self) -> &'static str {
        self.schema
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StringMode {
    /// Characters up to a zero byte.
    Terminated,

    /// At most `len` characters. When `terminated` is false the field always occupies `len`
    /// byte slots, zero padded; otherwise a zero byte may end it early.
    Fixed { len: usize, terminated: bool },

    /// Everything up to the end of the enclosing buffer, never terminated.
    ToEnd,
}

pub type CountFn = fn(&DecodeContext) -> Result<usize, FieldError>;
pub type MoreFn = fn(&DecodeContext, &[FieldValues]) -> Result<bool, FieldError>;

pub enum SubfieldCount {
    Constant(usize),

    /// The integer value of an already decoded field, searched innermost record first.
    Field(FieldId),

    Computed(CountFn),

    /// Consulted before each element with everything decoded so far; decoding stops once it
    /// returns false.
    Incremental(MoreFn),
}

pub enum FieldKind {
    Int(usize),

    /// An opaque value of up to the given width, taking whatever is left of the buffer when
    /// fewer bits remain. The actual width is kept with the value.
    Pad(usize),

    Str(StringMode),
    Subfields(&'static Fields, SubfieldCount),
}

pub fn int(bits: usize) -> FieldKind {
    FieldKind::Int(bits)
}

pub fn pad(bits: usize) -> FieldKind {
    FieldKind::Pad(bits)
}

pub fn string(mode: StringMode) -> FieldKind {
    FieldKind::Str(mode)
}

pub fn subfields(schema: &'static Fields, count: SubfieldCount) -> FieldKind {
    FieldKind::Subfields(schema, count)
}

pub fn count_of(field: impl Into<FieldId>) -> SubfieldCount {
    SubfieldCount::Field(field.into())
}

pub struct Field {
    id: FieldId,
    kind: FieldKind,
}

impl Field {
    pub fn new(id: FieldId, kind: FieldKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    fn read(&self, bb: &mut BitBuffer, context: &DecodeContext) -> Result<Value, FieldError> {
        match &self.kind {
            FieldKind::Int(bits) => Ok(Value::Int(bb.get(*bits)?)),
            FieldKind::Pad(max) => {
                let bits = (*max).min(bb.bits_remaining());
                let value = if bits > 0 { bb.get(bits)? } else { 0 };
                Ok(Value::Pad { value, bits })
            }
            FieldKind::Str(mode) => Ok(Value::Str(read_string(bb, *mode)?)),
            FieldKind::Subfields(schema, count) => {
                let schema: &'static Fields = *schema;
                let mut items = Vec::new();
                match count {
                    SubfieldCount::Constant(n) => self.read_items(bb, context, schema, *n, &mut items)?,
                    SubfieldCount::Field(id) => {
                        let n = context.int(*id)? as usize;
                        self.read_items(bb, context, schema, n, &mut items)?
                    }
                    SubfieldCount::Computed(count) => {
                        let n = count(context)?;
                        self.read_items(bb, context, schema, n, &mut items)?
                    }
                    SubfieldCount::Incremental(more) => {
                        while more(context, &items)? {
                            items.push(schema.read_in(bb, Some(context))?);
                        }
                    }
                }
                Ok(Value::Subfields(items))
            }
        }
    }

    fn read_items(
        &self,
        bb: &mut BitBuffer,
        context: &DecodeContext,
        schema: &'static Fields,
        count: usize,
        items: &mut Vec<FieldValues>,
    ) -> Result<(), FieldError> {
        for i in 0..count {
            match schema.read_in(bb, Some(context)) {
                Ok(values) => items.push(values),
                Err(e) => {
                    error!(
                        "{}: subfield read failure at {} of {}, partial result: {:?}",
                        self.id, i, count, items
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn write(&self, bb: &mut BitBuffer, value: &Value) -> Result<(), FieldError> {
        match (&self.kind, value) {
            (FieldKind::Int(bits), Value::Int(v)) => bb.put(*bits, *v)?,
            (FieldKind::Pad(_), Value::Pad { value, bits }) => {
                if *bits > 0 {
                    bb.put(*bits, *value)?
                }
            }
            (FieldKind::Str(mode), Value::Str(s)) => write_string(bb, self.id, *mode, s)?,
            (FieldKind::Subfields(..), Value::Subfields(items)) => {
                for item in items {
                    item.write(bb)?;
                }
            }
            _ => {
                return Err(FieldError::WrongType {
                    field: self.id,
                    expected: self.kind.type_name(),
                })
            }
        }
        Ok(())
    }
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Int(_) => "int",
            FieldKind::Pad(_) => "pad",
            FieldKind::Str(_) => "string",
            FieldKind::Subfields(..) => "subfields",
        }
    }
}

fn read_string(bb: &mut BitBuffer, mode: StringMode) -> Result<String, FieldError> {
    let mut text = String::new();
    let mut slots = 0;
    let mut ended = false;

    while bb.bits_remaining() >= 8 {
        if let StringMode::Fixed { len, .. } = mode {
            if slots >= len {
                break;
            }
        }
        slots += 1;

        let c = bb.get(8)? as u8;
        match mode {
            StringMode::ToEnd => text.push(c as char),
            _ if c != 0 => {
                if !ended {
                    text.push(c as char);
                }
            }
            StringMode::Terminated | StringMode::Fixed { terminated: true, .. } => break,
            StringMode::Fixed { .. } => ended = true,
        }
    }
    Ok(text)
}

fn write_string(
    bb: &mut BitBuffer,
    id: FieldId,
    mode: StringMode,
    value: &str,
) -> Result<(), FieldError> {
    let limit = match mode {
        StringMode::Fixed { len, .. } => Some(len),
        _ => None,
    };

    let mut written = 0;
    for c in value.chars() {
        if let Some(len) = limit {
            if written >= len {
                warn!("{}: truncating string for length {}: {}", id, len, value);
                break;
            }
        }
        bb.put(8, c as u32 & 0xff)?;
        written += 1;
    }

    match mode {
        StringMode::Fixed {
            len,
            terminated: false,
        } => {
            while written < len {
                bb.put(8, 0)?;
                written += 1;
            }
        }
        StringMode::Fixed {
            len,
            terminated: true,
        } => {
            if written < len {
                bb.put(8, 0)?;
            }
        }
        StringMode::Terminated => bb.put(8, 0)?,
        StringMode::ToEnd => {}
    }
    Ok(())
}

/// An ordered, named record schema.
pub struct Fields {
    name: &'static str,
    fields: Vec<Field>,
}

impl Fields {
    pub fn new(name: &'static str, fields: Vec<Field>) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn read(&'static self, bb: &mut BitBuffer) -> Result<FieldValues, FieldError> {
        self.read_in(bb, None)
    }

    /// Decodes one record. `parent` is the chain of enclosing, partially decoded records that
    /// count lookups may consult.
    pub fn read_in(
        &'static self,
        bb: &mut BitBuffer,
        parent: Option<&DecodeContext>,
    ) -> Result<FieldValues, FieldError> {
        let start = bb.bit_index();
        let mut values = FieldValues::empty(self);

        for field in &self.fields {
            let field_start = bb.bit_index();
            let result = {
                let context = DecodeContext {
                    current: &values,
                    parent,
                };
                field.read(bb, &context)
            };

            match result {
                Ok(value) => values.push(FieldValue::new(field.id, value)),
                Err(e) => {
                    let pos = bb.bit_index();
                    error!(
                        "Field {} read failure at bit {} (byte {})\nRow context: {}\nField context: {}\nFields: {:?}",
                        field.id,
                        pos,
                        pos / 8,
                        dump_context(bb, start),
                        dump_context(bb, field_start),
                        values
                    );
                    return Err(FieldError::ReadFailed {
                        field: field.id,
                        bit_index: pos,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(values)
    }

    /// Pairs values positionally with this schema's fields.
    pub fn build(&'static self, values: Vec<Value>) -> Result<FieldValues, FieldError> {
        if values.len() != self.fields.len() {
            return Err(FieldError::ValueCount {
                schema: self.name,
                expected: self.fields.len(),
                found: values.len(),
            });
        }
        let mut result = FieldValues::empty(self);
        for (field, value) in self.fields.iter().zip(values) {
            result.push(FieldValue::new(field.id, value));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for Fields {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|field| (field.id.name, field.kind.type_name())))
            .finish()
    }
}

fn dump_context(bb: &BitBuffer, start: usize) -> String {
    if start >= bb.bit_len() {
        return String::from("EOF");
    }
    let data = bb.shifted_slice_from(start);
    format!(
        "BitBuffer length: {} ({} bytes)\n{}",
        bb.bit_len() - start,
        data.len(),
        dump_hex(&data)
    )
}

/// The chain of records currently being decoded, innermost first.
#[derive(Copy, Clone)]
pub struct DecodeContext<'a> {
    current: &'a FieldValues,
    parent: Option<&'a DecodeContext<'a>>,
}

impl<'a> DecodeContext<'a> {
    pub fn current(&self) -> &'a FieldValues {
        self.current
    }

    pub fn find(&self, id: FieldId) -> Option<&'a FieldValue> {
        let mut frame = Some(self);
        while let Some(context) = frame {
            if let Some(value) = context.current.get(id) {
                return Some(value);
            }
            frame = context.parent;
        }
        None
    }

    pub fn int(&self, id: impl Into<FieldId>) -> Result<u32, FieldError> {
        let id = id.into();
        match self.find(id) {
            Some(value) => value.as_int(),
            None => Err(FieldError::MissingCount(id)),
        }
    }
}
