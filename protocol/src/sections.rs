use crate::bits::BitBuffer;
use crate::bytes::{read_short, slice_ahead};
use crate::error::SectionError;
use crate::field::Fields;
use crate::schema;
use crate::values::FieldValues;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use enum_map::Enum;
use g2_types::AreaId;
use log::error;
use std::fmt::{Display, Formatter};
use std::io::Cursor;
use strum::EnumIter;

/// Every framed record the synth exchanges: a type byte, a schema, and for area specific
/// records the 2 bit location that prefixes the content.
#[derive(Copy, Clone, Debug, EnumIter, Enum, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    // Performance
    PerformanceName,
    PerformanceSettings,
    GlobalKnobAssignments,

    // Patch
    PatchDescription,
    ModuleList1,
    ModuleList0,
    CurrentNote,
    CableList1,
    CableList0,
    PatchParams,
    ModuleParams1,
    ModuleParams0,
    MorphParameters,
    KnobAssignments,
    ControlAssignments,
    MorphLabels,
    ModuleLabels1,
    ModuleLabels0,
    ModuleNames1,
    ModuleNames0,
    TextPad,
    PatchName,
    PatchLoadData,
}

/// Patch sections in the order a synth sends them in a patch dump.
pub const MSG_SECTIONS: [Section; 16] = [
    Section::PatchDescription,
    Section::ModuleList1,
    Section::ModuleList0,
    Section::CableList1,
    Section::CableList0,
    Section::PatchParams,
    Section::ModuleParams1,
    Section::ModuleParams0,
    Section::MorphParameters,
    Section::KnobAssignments,
    Section::ControlAssignments,
    Section::ModuleNames1,
    Section::ModuleNames0,
    Section::MorphLabels,
    Section::ModuleLabels1,
    Section::ModuleLabels0,
];

/// Patch sections in `.pch2` file order.
pub const FILE_SECTIONS: [Section; 18] = [
    Section::PatchDescription,
    Section::ModuleList1,
    Section::ModuleList0,
    Section::CurrentNote,
    Section::CableList1,
    Section::CableList0,
    Section::PatchParams,
    Section::ModuleParams1,
    Section::ModuleParams0,
    Section::MorphParameters,
    Section::KnobAssignments,
    Section::ControlAssignments,
    Section::MorphLabels,
    Section::ModuleLabels1,
    Section::ModuleLabels0,
    Section::ModuleNames1,
    Section::ModuleNames0,
    Section::TextPad,
];

impl Section {
    pub fn type_code(&self) -> u8 {
        match self {
            Section::PerformanceName => 0x29,
            Section::PerformanceSettings => 0x11,
            Section::GlobalKnobAssignments => 0x5f,
            Section::PatchDescription => 0x21,
            Section::ModuleList1 | Section::ModuleList0 => 0x4a,
            Section::CurrentNote => 0x69,
            Section::CableList1 | Section::CableList0 => 0x52,
            Section::PatchParams | Section::ModuleParams1 | Section::ModuleParams0 => 0x4d,
            Section::MorphParameters => 0x65,
            Section::KnobAssignments => 0x62,
            Section::ControlAssignments => 0x60,
            Section::MorphLabels | Section::ModuleLabels1 | Section::ModuleLabels0 => 0x5b,
            Section::ModuleNames1 | Section::ModuleNames0 => 0x5a,
            Section::TextPad => 0x6f,
            Section::PatchName => 0x27,
            Section::PatchLoadData => 0x72,
        }
    }

    pub fn location(&self) -> Option<u32> {
        match self {
            Section::ModuleList0
            | Section::CableList0
            | Section::ModuleParams0
            | Section::ModuleLabels0
            | Section::ModuleNames0 => Some(0),
            Section::ModuleList1
            | Section::CableList1
            | Section::ModuleParams1
            | Section::ModuleLabels1
            | Section::ModuleNames1 => Some(1),
            Section::PatchParams | Section::MorphLabels => Some(2),
            _ => None,
        }
    }

    pub fn area(&self) -> Option<AreaId> {
        self.location().and_then(AreaId::from_index)
    }

    pub fn fields(&self) -> &'static Fields {
        match self {
            Section::PerformanceName | Section::PatchName => schema::EntryName::fields(),
            Section::PerformanceSettings => schema::PerformanceSettings::fields(),
            Section::GlobalKnobAssignments => schema::GlobalKnobAssignments::fields(),
            Section::PatchDescription => schema::PatchDescription::fields(),
            Section::ModuleList1 | Section::ModuleList0 => schema::ModuleList::fields(),
            Section::CurrentNote => schema::CurrentNote::fields(),
            Section::CableList1 | Section::CableList0 => schema::CableList::fields(),
            Section::PatchParams | Section::ModuleParams1 | Section::ModuleParams0 => {
                schema::ModuleParams::fields()
            }
            Section::MorphParameters => schema::MorphParameters::fields(),
            Section::KnobAssignments => schema::KnobAssignments::fields(),
            Section::ControlAssignments => schema::ControlAssignments::fields(),
            Section::MorphLabels => schema::MorphLabels::fields(),
            Section::ModuleLabels1 | Section::ModuleLabels0 => schema::ModuleLabels::fields(),
            Section::ModuleNames1 | Section::ModuleNames0 => schema::ModuleNames::fields(),
            Section::TextPad => schema::TextPad::fields(),
            Section::PatchLoadData => schema::PatchLoadData::fields(),
        }
    }

    /// Name, patch name and load data records follow their type byte directly, with no length.
    pub fn is_framed(&self) -> bool {
        !matches!(
            self,
            Section::PerformanceName | Section::PatchName | Section::PatchLoadData
        )
    }

    pub fn module_list(area: AreaId) -> Option<Section> {
        match area {
            AreaId::Fx => Some(Section::ModuleList0),
            AreaId::Voice => Some(Section::ModuleList1),
            AreaId::Settings => None,
        }
    }

    pub fn cable_list(area: AreaId) -> Option<Section> {
        match area {
            AreaId::Fx => Some(Section::CableList0),
            AreaId::Voice => Some(Section::CableList1),
            AreaId::Settings => None,
        }
    }

    pub fn module_params(area: AreaId) -> Section {
        match area {
            AreaId::Fx => Section::ModuleParams0,
            AreaId::Voice => Section::ModuleParams1,
            AreaId::Settings => Section::PatchParams,
        }
    }

    pub fn module_names(area: AreaId) -> Option<Section> {
        match area {
            AreaId::Fx => Some(Section::ModuleNames0),
            AreaId::Voice => Some(Section::ModuleNames1),
            AreaId::Settings => None,
        }
    }

    pub fn module_labels(area: AreaId) -> Option<Section> {
        match area {
            AreaId::Fx => Some(Section::ModuleLabels0),
            AreaId::Voice => Some(Section::ModuleLabels1),
            AreaId::Settings => None,
        }
    }

    /// Consumes the type byte and length, returning the content as its own bit buffer.
    pub fn slice(&self, cursor: &mut Cursor<&[u8]>) -> Result<BitBuffer, SectionError> {
        self.check_type(cursor.read_u8()?)?;
        let len = read_short(cursor)? as usize;
        Ok(BitBuffer::from(slice_ahead(cursor, len)?))
    }

    pub fn check_type(&self, found: u8) -> Result<(), SectionError> {
        if found != self.type_code() {
            return Err(SectionError::UnexpectedType {
                name: self.name(),
                expected: self.type_code(),
                found,
            });
        }
        Ok(())
    }

    /// Decodes section content, verifying the location prefix where there is one.
    pub fn read_slice(&self, bb: &mut BitBuffer) -> Result<FieldValues, SectionError> {
        let start = bb.bit_index();
        if let Some(expected) = self.location() {
            let found = bb.get(2)?;
            if found != expected {
                return Err(SectionError::BadLocation {
                    name: self.name(),
                    expected,
                    found,
                });
            }
        }

        match self.fields().read(bb) {
            Ok(values) => Ok(values),
            Err(source) => {
                bb.set_bit_index(start)?;
                let len = bb.shifted_slice().len();
                error!("Error reading section {}, {} content bytes", self, len);
                Err(SectionError::ReadFailed {
                    name: self.name(),
                    len,
                    source,
                })
            }
        }
    }

    pub fn read(&self, cursor: &mut Cursor<&[u8]>) -> Result<FieldValues, SectionError> {
        let mut bb = self.slice(cursor)?;
        self.read_slice(&mut bb)
    }

    pub fn encode_content(&self, values: &FieldValues) -> Result<Vec<u8>, SectionError> {
        let mut bb = BitBuffer::new();
        if let Some(location) = self.location() {
            bb.put(2, location)?;
        }
        values.write(&mut bb)?;
        Ok(bb.into_bytes())
    }

    /// Appends the type byte, length and content.
    pub fn write(&self, values: &FieldValues, out: &mut Vec<u8>) -> Result<(), SectionError> {
        let content = self.encode_content(values)?;
        if content.len() > u16::MAX as usize {
            return Err(SectionError::TooLong {
                name: self.name(),
                len: content.len(),
            });
        }

        out.push(self.type_code());
        out.write_u16::<BigEndian>(content.len() as u16)?;
        out.extend_from_slice(&content);
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Section::PerformanceName => "PerformanceName",
            Section::PerformanceSettings => "PerformanceSettings",
            Section::GlobalKnobAssignments => "GlobalKnobAssignments",
            Section::PatchDescription => "PatchDescription",
            Section::ModuleList1 => "ModuleList1",
            Section::ModuleList0 => "ModuleList0",
            Section::CurrentNote => "CurrentNote",
            Section::CableList1 => "CableList1",
            Section::CableList0 => "CableList0",
            Section::PatchParams => "PatchParams",
            Section::ModuleParams1 => "ModuleParams1",
            Section::ModuleParams0 => "ModuleParams0",
            Section::MorphParameters => "MorphParameters",
            Section::KnobAssignments => "KnobAssignments",
            Section::ControlAssignments => "ControlAssignments",
            Section::MorphLabels => "MorphLabels",
            Section::ModuleLabels1 => "ModuleLabels1",
            Section::ModuleLabels0 => "ModuleLabels0",
            Section::ModuleNames1 => "ModuleNames1",
            Section::ModuleNames0 => "ModuleNames0",
            Section::TextPad => "TextPad",
            Section::PatchName => "PatchName",
            Section::PatchLoadData => "PatchLoadData",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.location() {
            Some(location) => write!(f, "{}[{:x}:{}]", self.name(), self.type_code(), location),
            None => write!(f, "{}[{:x}]", self.name(), self.type_code()),
        }
    }
}
