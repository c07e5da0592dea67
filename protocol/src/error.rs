use crate::field::FieldId;
use g2_types::{AreaId, Slot};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BitError {
    #[error("Needed {wanted} bits, only {remaining} remaining")]
    UnexpectedEnd { wanted: usize, remaining: usize },

    #[error("Value {value:#x} does not fit in {bits} bits")]
    Overflow { bits: usize, value: u32 },

    #[error("Invalid bit width: {0}")]
    InvalidWidth(usize),

    #[error("Bit index {index} is beyond buffer length {len}")]
    OutOfRange { index: usize, len: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum FieldError {
    #[error("Bit buffer error: {0}")]
    Bits(#[from] BitError),

    #[error("No value for {0} in the decode context")]
    MissingCount(FieldId),

    #[error("No value for {0}")]
    MissingValue(FieldId),

    #[error("{field} is not a {expected} value")]
    WrongType {
        field: FieldId,
        expected: &'static str,
    },

    #[error("{field} is not part of schema {schema}")]
    UnknownField { field: FieldId, schema: &'static str },

    #[error("Schema {schema} expects {expected} values, got {found}")]
    ValueCount {
        schema: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid value {value} for {field}")]
    InvalidValue { field: FieldId, value: u32 },

    #[error("Read of {field} failed at bit {bit_index}: {source}")]
    ReadFailed {
        field: FieldId,
        bit_index: usize,
        source: Box<FieldError>,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum SectionError {
    #[error("Expected section {name} ({expected:#04x}), found type {found:#04x}")]
    UnexpectedType {
        name: &'static str,
        expected: u8,
        found: u8,
    },

    #[error("Bad location {found} for section {name}, expected {expected}")]
    BadLocation {
        name: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("Section {0} is not present")]
    Missing(&'static str),

    #[error("Section {name} holds {expected} records, not {found}")]
    WrongSchema {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Section {name} content is too long: {len} bytes")]
    TooLong { name: &'static str, len: usize },

    #[error("Error reading section {name}, {len} content bytes: {source}")]
    ReadFailed {
        name: &'static str,
        len: usize,
        #[source]
        source: FieldError,
    },

    #[error("Invalid field data: {0}")]
    Field(#[from] FieldError),

    #[error("Bit buffer error: {0}")]
    Bits(#[from] BitError),

    #[error("Truncated section data: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum EntryError {
    #[error("Unknown entry type {0}")]
    UnknownType(u32),

    #[error("Entry data found before any bank marker")]
    NoBank,

    #[error("Entry list ended without a terminator")]
    Unterminated,

    #[error("Invalid entry data: {0}")]
    Field(#[from] FieldError),

    #[error("Bit buffer error: {0}")]
    Bits(#[from] BitError),
}

#[derive(thiserror::Error, Debug)]
pub enum PatchError {
    #[error("Unexpected file header")]
    BadHeader,

    #[error("CRC mismatch: computed {computed:#06x}, found {found:#06x}")]
    CrcMismatch { computed: u16, found: u16 },

    #[error("{0} unexpected bytes after the CRC")]
    TrailingBytes(usize),

    #[error("Slot mismatch: expected {expected}, message addressed {found}")]
    SlotMismatch { expected: Slot, found: u8 },

    #[error("Version mismatch for {slot}: expected {expected}, found {found}")]
    VersionMismatch { slot: Slot, expected: u8, found: u8 },

    #[error("Invalid area location {0}")]
    InvalidArea(u32),

    #[error("No parameter {param} for module {module} variation {variation} in {area}")]
    UnknownParam {
        area: AreaId,
        module: u32,
        variation: u32,
        param: u32,
    },

    #[error("Invalid section: {0}")]
    Section(#[from] SectionError),

    #[error("Invalid field data: {0}")]
    Field(#[from] FieldError),

    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}
