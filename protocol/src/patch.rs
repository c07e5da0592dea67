use crate::bits::BitBuffer;
use crate::bytes::{expect_warn, read_short, remaining};
use crate::components::{
    Cable, ControlAssignment, CurrentNote, Knob, ModuleLabels, ModuleName, ModuleParams,
    MorphLabel, ParamChange, PatchLoad, PatchSettings, SelectedParam, UserModule,
    VariationMorphs,
};
use crate::crc::crc16;
use crate::error::{FieldError, PatchError, SectionError};
use crate::schema::{
    self, Data7, EntryName, KnobAssignment, ModuleParamSet, PatchLoadData, VarParams,
};
use crate::sections::{Section, FILE_SECTIONS, MSG_SECTIONS};
use crate::values::{FieldValue, FieldValues, Value};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use enum_map::EnumMap;
use g2_types::{AreaId, Slot};
use log::{debug, info};
use std::io::Cursor;
use std::path::Path;

pub const FILE_FORMAT: &str = "Version=Nord Modular G2 File Format 1";
pub const FILE_VERSION: &str = "Version=23";
pub const FILE_BUILD: &str = "Info=BUILD 320";

const FILE_BODY_START: u8 = 0x17;
const MESSAGE_COMMAND: u8 = 0x01;
const MESSAGE_SLOT_OFFSET: u8 = 0x08;
const DESCRIPTION_TRAILER: [u8; 2] = [0x2d, 0x00];

/// Builds a file header: each line terminated by CR LF, then a single NUL.
pub fn file_header(file_type: &str) -> Vec<u8> {
    let mut header = Vec::new();
    for line in [FILE_FORMAT, file_type, FILE_VERSION, FILE_BUILD] {
        header.extend_from_slice(line.as_bytes());
        header.extend_from_slice(b"\r\n");
    }
    header.push(0);
    header
}

pub fn patch_header() -> Vec<u8> {
    file_header("Type=Patch")
}

/// Checks the expected header and returns everything after it.
pub(crate) fn strip_header<'a>(data: &'a [u8], header: &[u8]) -> Result<&'a [u8], PatchError> {
    match data.strip_prefix(header) {
        Some(body) => Ok(body),
        None => Err(PatchError::BadHeader),
    }
}

/// Verifies the CRC that closes a file body, returning the body without it.
pub(crate) fn check_body_crc(body: &[u8]) -> Result<&[u8], PatchError> {
    if body.len() < 2 {
        return Err(PatchError::IOError(std::io::ErrorKind::UnexpectedEof.into()));
    }
    let (content, crc) = body.split_at(body.len() - 2);
    let computed = crc16(content);
    let found = u16::from_be_bytes([crc[0], crc[1]]);
    if computed != found {
        return Err(PatchError::CrcMismatch { computed, found });
    }
    Ok(content)
}

pub(crate) fn append_crc(data: &mut Vec<u8>, start: usize) -> Result<(), PatchError> {
    let crc = crc16(&data[start..]);
    data.write_u16::<BigEndian>(crc)?;
    Ok(())
}

/// The state of one slot: decoded sections plus the values the synth reports alongside them.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    slot: Slot,
    version: u8,
    sections: EnumMap<Section, Option<FieldValues>>,
    load_data: EnumMap<AreaId, Option<FieldValues>>,
    selected_param: Option<FieldValues>,
    assigned_voices: u8,
    volume_data: Option<Vec<u8>>,
    led_data: Option<Vec<u8>>,
}

impl Patch {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            version: 0,
            sections: EnumMap::default(),
            load_data: EnumMap::default(),
            selected_param: None,
            assigned_voices: 0,
            volume_data: None,
            led_data: None,
        }
    }

    /// An empty patch, as a synth holds after initialising a slot.
    pub fn init(slot: Slot) -> Result<Self, PatchError> {
        let mut patch = Patch::new(slot);
        for (section, values) in init::sections()? {
            patch.update_section(section, values)?;
        }
        Ok(patch)
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) {
        info!("{}: patch version {}", self.slot, version);
        self.version = version;
    }

    pub fn section(&self, section: Section) -> Option<&FieldValues> {
        self.sections[section].as_ref()
    }

    pub fn require(&self, section: Section) -> Result<&FieldValues, SectionError> {
        self.section(section)
            .ok_or(SectionError::Missing(section.name()))
    }

    /// Replaces a whole section. Values must be records of the section's schema.
    pub fn update_section(
        &mut self,
        section: Section,
        values: FieldValues,
    ) -> Result<(), SectionError> {
        if values.schema().name() != section.fields().name() {
            return Err(SectionError::WrongSchema {
                name: section.name(),
                expected: section.fields().name(),
                found: values.schema().name(),
            });
        }
        debug!("{}: updated section {}", self.slot, section);
        self.sections[section] = Some(values);
        Ok(())
    }

    /// Decodes a framed section from the cursor into this patch.
    pub fn read_section(
        &mut self,
        section: Section,
        cursor: &mut Cursor<&[u8]>,
    ) -> Result<(), SectionError> {
        let values = section.read(cursor)?;
        self.update_section(section, values)
    }

    /// Decodes section content that has already been sliced out of its frame.
    pub fn read_section_slice(
        &mut self,
        section: Section,
        bb: &mut BitBuffer,
    ) -> Result<(), SectionError> {
        let values = section.read_slice(bb)?;
        self.update_section(section, values)
    }

    pub fn write_section(&self, section: Section, out: &mut Vec<u8>) -> Result<(), SectionError> {
        section.write(self.require(section)?, out)
    }

    pub fn read_message_header(&self, cursor: &mut Cursor<&[u8]>) -> Result<(), PatchError> {
        expect_warn(cursor, MESSAGE_COMMAND, "Message", "Cmd")?;
        let slot = cursor.read_u8()?;
        if !self.slot.matches_id(slot) {
            return Err(PatchError::SlotMismatch {
                expected: self.slot,
                found: slot,
            });
        }
        let version = cursor.read_u8()?;
        if version != self.version {
            return Err(PatchError::VersionMismatch {
                slot: self.slot,
                expected: self.version,
                found: version,
            });
        }
        Ok(())
    }

    pub fn write_message_header(&self, out: &mut Vec<u8>) {
        out.extend([
            MESSAGE_COMMAND,
            self.slot.index() + MESSAGE_SLOT_OFFSET,
            self.version,
        ]);
    }

    /// Reads a patch dump body, starting at the description type byte.
    pub fn read_message_sections(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<(), PatchError> {
        for section in MSG_SECTIONS {
            self.read_section(section, cursor)?;
            if section == Section::PatchDescription {
                expect_warn(cursor, DESCRIPTION_TRAILER[0], "Message", "USB extra 1")?;
                expect_warn(cursor, DESCRIPTION_TRAILER[1], "Message", "USB extra 2")?;
            }
        }
        info!("{}: read patch description", self.slot);
        Ok(())
    }

    /// Decodes a full patch dump message. The trailing CRC must be present and match.
    pub fn read_from_message(slot: Slot, version: u8, data: &[u8]) -> Result<Patch, PatchError> {
        let mut patch = Patch::new(slot);
        patch.version = version;

        let mut cursor = Cursor::new(data);
        patch.read_message_header(&mut cursor)?;
        patch.read_message_sections(&mut cursor)?;

        let end = cursor.position() as usize;
        let computed = crc16(&data[..end]);
        let found = read_short(&mut cursor)?;
        if computed != found {
            return Err(PatchError::CrcMismatch { computed, found });
        }
        let extra = remaining(&cursor).len();
        if extra > 0 {
            return Err(PatchError::TrailingBytes(extra));
        }
        Ok(patch)
    }

    pub fn write_message(&self) -> Result<Vec<u8>, PatchError> {
        let mut out = Vec::new();
        self.write_message_header(&mut out);
        for section in MSG_SECTIONS {
            self.write_section(section, &mut out)?;
            if section == Section::PatchDescription {
                out.extend(DESCRIPTION_TRAILER);
            }
        }
        append_crc(&mut out, 0)?;
        Ok(out)
    }

    pub fn read_file_sections(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<(), PatchError> {
        for section in FILE_SECTIONS {
            self.read_section(section, cursor)?;
        }
        Ok(())
    }

    pub fn write_file_sections(&self, out: &mut Vec<u8>) -> Result<(), PatchError> {
        for section in FILE_SECTIONS {
            self.write_section(section, out)?;
        }
        Ok(())
    }

    /// Decodes the contents of a `.pch2` file.
    pub fn read_from_bytes(slot: Slot, data: &[u8]) -> Result<Patch, PatchError> {
        let body = strip_header(data, &patch_header())?;
        let content = check_body_crc(body)?;

        let mut cursor = Cursor::new(content);
        expect_warn(&mut cursor, FILE_BODY_START, "Patch file", "header terminator")?;
        let mut patch = Patch::new(slot);
        patch.set_version(cursor.read_u8()?);
        patch.read_file_sections(&mut cursor)?;
        Ok(patch)
    }

    pub fn read_from_file(slot: Slot, path: &Path) -> Result<Patch, PatchError> {
        let data = std::fs::read(path)?;
        Self::read_from_bytes(slot, &data)
    }

    pub fn to_file_bytes(&self) -> Result<Vec<u8>, PatchError> {
        let mut out = patch_header();
        let start = out.len();
        out.extend([FILE_BODY_START, self.version]);
        self.write_file_sections(&mut out)?;
        append_crc(&mut out, start)?;
        Ok(out)
    }

    pub fn write_file(&self, path: &Path) -> Result<(), PatchError> {
        std::fs::write(path, self.to_file_bytes()?)?;
        Ok(())
    }

    /// Decodes the patch name message content, which has no length prefix.
    pub fn read_name(&mut self, content: &[u8]) -> Result<(), PatchError> {
        let mut bb = BitBuffer::from(content);
        self.read_section_slice(Section::PatchName, &mut bb)?;
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.section(Section::PatchName)?
            .string(EntryName::Name)
            .ok()
    }

    /// Stores resource usage for the area named in the record.
    pub fn read_load_data(&mut self, content: &[u8]) -> Result<AreaId, PatchError> {
        let values = PatchLoadData::fields().read(&mut BitBuffer::from(content))?;
        let location = values.int(PatchLoadData::Location)?;
        let area = AreaId::from_index(location).ok_or(PatchError::InvalidArea(location))?;
        debug!("{}: load data for {}", self.slot, area);
        self.load_data[area] = Some(values);
        Ok(area)
    }

    pub fn load_data(&self, area: AreaId) -> Option<&FieldValues> {
        self.load_data[area].as_ref()
    }

    pub fn load(&self, area: AreaId) -> Result<Option<PatchLoad>, FieldError> {
        self.load_data(area).map(PatchLoad::try_from).transpose()
    }

    pub fn read_selected_param(&mut self, content: &[u8]) -> Result<(), PatchError> {
        let values = schema::SelectedParam::fields().read(&mut BitBuffer::from(content))?;
        self.selected_param = Some(values);
        Ok(())
    }

    pub fn selected_param(&self) -> Result<Option<SelectedParam>, FieldError> {
        self.selected_param
            .as_ref()
            .map(SelectedParam::try_from)
            .transpose()
    }

    pub fn assigned_voices(&self) -> u8 {
        self.assigned_voices
    }

    pub fn set_assigned_voices(&mut self, voices: u8) {
        info!("{}: assigned voices {}", self.slot, voices);
        self.assigned_voices = voices;
    }

    pub fn set_volume_data(&mut self, data: &[u8]) {
        self.volume_data = Some(data.to_vec());
    }

    pub fn volume_data(&self) -> Option<&[u8]> {
        self.volume_data.as_deref()
    }

    pub fn set_led_data(&mut self, data: &[u8]) {
        self.led_data = Some(data.to_vec());
    }

    pub fn led_data(&self) -> Option<&[u8]> {
        self.led_data.as_deref()
    }

    /// Changes one stored parameter value. The section is only replaced once every level of the
    /// tree has been rebuilt, so a failed lookup leaves the patch untouched.
    pub fn set_param(
        &mut self,
        area: AreaId,
        module: u32,
        variation: u32,
        param: u32,
        value: u32,
    ) -> Result<(), PatchError> {
        if value > 0x7f {
            return Err(FieldError::InvalidValue {
                field: Data7::Datum.into(),
                value,
            }
            .into());
        }
        let unknown = PatchError::UnknownParam {
            area,
            module,
            variation,
            param,
        };

        let section = Section::module_params(area);
        let mut values = self.require(section)?.clone();

        let mut sets = values.subfields(schema::ModuleParams::ParamSet)?.to_vec();
        let Some(set) = sets
            .iter_mut()
            .find(|s| s.int_maybe(ModuleParamSet::ModIndex) == Some(module))
        else {
            return Err(unknown);
        };

        let mut variations = set.subfields(ModuleParamSet::ModParams)?.to_vec();
        let Some(var) = variations
            .iter_mut()
            .find(|v| v.int_maybe(VarParams::Variation) == Some(variation))
        else {
            return Err(unknown);
        };

        let mut params = var.subfields(VarParams::Params)?.to_vec();
        let Some(entry) = params.get_mut(param as usize) else {
            return Err(unknown);
        };

        entry.update(FieldValue::int(Data7::Datum, value))?;
        var.update(FieldValue::subfields(VarParams::Params, params))?;
        set.update(FieldValue::subfields(ModuleParamSet::ModParams, variations))?;
        values.update(FieldValue::subfields(schema::ModuleParams::ParamSet, sets))?;
        self.update_section(section, values)?;
        Ok(())
    }

    pub fn apply_param_change(&mut self, change: &ParamChange) -> Result<(), PatchError> {
        self.set_param(
            change.area,
            change.module,
            change.variation,
            change.param,
            change.value,
        )
    }

    pub fn settings(&self) -> Result<Option<PatchSettings>, FieldError> {
        self.section(Section::PatchDescription)
            .map(PatchSettings::try_from)
            .transpose()
    }

    pub fn modules(&self, area: AreaId) -> Result<Vec<UserModule>, FieldError> {
        match Section::module_list(area).and_then(|s| self.section(s)) {
            Some(values) => UserModule::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn module_names(&self, area: AreaId) -> Result<Vec<ModuleName>, FieldError> {
        match Section::module_names(area).and_then(|s| self.section(s)) {
            Some(values) => ModuleName::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn module_labels(&self, area: AreaId) -> Result<Vec<ModuleLabels>, FieldError> {
        match Section::module_labels(area).and_then(|s| self.section(s)) {
            Some(values) => ModuleLabels::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn cables(&self, area: AreaId) -> Result<Vec<Cable>, FieldError> {
        match Section::cable_list(area).and_then(|s| self.section(s)) {
            Some(values) => Cable::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn params(&self, area: AreaId) -> Result<Option<ModuleParams>, FieldError> {
        self.section(Section::module_params(area))
            .map(ModuleParams::try_from)
            .transpose()
    }

    pub fn knobs(&self) -> Result<Vec<Knob>, FieldError> {
        match self.section(Section::KnobAssignments) {
            Some(values) => Knob::list(values),
            None => Ok(vec![]),
        }
    }

    /// The knob records that point at a parameter.
    pub fn active_knobs(&self) -> Result<Vec<&FieldValues>, FieldError> {
        let mut active = Vec::new();
        if let Some(values) = self.section(Section::KnobAssignments) {
            for knob in values.subfields(schema::KnobAssignments::Knobs)? {
                active.extend(knob.subfields(KnobAssignment::Params)?.first());
            }
        }
        Ok(active)
    }

    pub fn controls(&self) -> Result<Vec<ControlAssignment>, FieldError> {
        match self.section(Section::ControlAssignments) {
            Some(values) => ControlAssignment::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn morphs(&self) -> Result<Vec<VariationMorphs>, FieldError> {
        match self.section(Section::MorphParameters) {
            Some(values) => VariationMorphs::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn morph_labels(&self) -> Result<Vec<MorphLabel>, FieldError> {
        match self.section(Section::MorphLabels) {
            Some(values) => MorphLabel::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn current_note(&self) -> Result<Option<CurrentNote>, FieldError> {
        self.section(Section::CurrentNote)
            .map(CurrentNote::try_from)
            .transpose()
    }

    pub fn text(&self) -> Option<&str> {
        self.section(Section::TextPad)?
            .string(schema::TextPad::Text)
            .ok()
    }

    pub fn set_text(&mut self, text: &str) -> Result<(), PatchError> {
        let values = schema::TextPad::fields().build(vec![Value::Str(text.to_string())])?;
        self.update_section(Section::TextPad, values)?;
        Ok(())
    }
}

/// Section contents of an empty patch.
mod init {
    use super::*;
    use crate::field::Fields;

    const MORPH_NAMES: [&str; 8] = [
        "Wheel", "Vel", "Keyb", "Aft.Tch", "Sust.Pd", "Ctrl.Pd", "P.Stick", "G.Wh 2",
    ];
    const KNOB_COUNT: u32 = 120;
    const VARIATION_COUNT: u32 = 10;

    fn ints(fields: &'static Fields, values: &[u32]) -> Result<FieldValues, FieldError> {
        fields.build(values.iter().map(|v| Value::Int(*v)).collect())
    }

    fn list(
        fields: &'static Fields,
        head: &[u32],
        items: Vec<FieldValues>,
    ) -> Result<FieldValues, FieldError> {
        let mut values: Vec<Value> = head.iter().map(|v| Value::Int(*v)).collect();
        values.push(Value::Subfields(items));
        fields.build(values)
    }

    pub(super) fn sections() -> Result<Vec<(Section, FieldValues)>, FieldError> {
        let description = {
            let reserved = (0..7)
                .map(|_| ints(schema::Data8::fields(), &[0]))
                .collect::<Result<Vec<_>, _>>()?;
            let mut values = vec![Value::Subfields(reserved)];
            // Reserved2, Voices, Height, Unk2, seven cable colours, MonoPoly, Variation,
            // Category, Reserved3.
            let rest = [0, 1, 0, 0, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0];
            values.extend(rest.iter().map(|v| Value::Int(*v)));
            schema::PatchDescription::fields().build(values)?
        };

        let note = list(
            schema::CurrentNote::fields(),
            &[64, 0, 0, 0],
            vec![ints(schema::NoteData::fields(), &[64, 0, 0])?],
        )?;

        let morph_labels = {
            let labels = MORPH_NAMES
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    schema::MorphLabel::fields().build(vec![
                        Value::Int(i as u32 + 1),
                        Value::Int(8),
                        Value::Int(i as u32 + 8),
                        Value::Str(name.to_string()),
                    ])
                })
                .collect::<Result<Vec<_>, _>>()?;
            list(schema::MorphLabels::fields(), &[1, 1, 0x50], labels)?
        };

        let knobs = (0..KNOB_COUNT)
            .map(|_| list(schema::KnobAssignment::fields(), &[0], vec![]))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sections = vec![
            (Section::PatchDescription, description),
            (Section::CurrentNote, note),
            (Section::PatchParams, list(schema::ModuleParams::fields(), &[0, VARIATION_COUNT], vec![])?),
            (
                Section::MorphParameters,
                list(schema::MorphParameters::fields(), &[0, 8, 0], vec![])?,
            ),
            (
                Section::KnobAssignments,
                list(schema::KnobAssignments::fields(), &[KNOB_COUNT], knobs)?,
            ),
            (
                Section::ControlAssignments,
                list(schema::ControlAssignments::fields(), &[0], vec![])?,
            ),
            (Section::MorphLabels, morph_labels),
            (
                Section::TextPad,
                schema::TextPad::fields().build(vec![Value::Str(String::new())])?,
            ),
            (
                Section::PatchName,
                schema::EntryName::fields().build(vec![Value::Str(String::from("No name"))])?,
            ),
        ];

        for area in [AreaId::Voice, AreaId::Fx] {
            let modules = list(schema::ModuleList::fields(), &[0], vec![])?;
            let cables = list(schema::CableList::fields(), &[0, 0], vec![])?;
            let params = list(schema::ModuleParams::fields(), &[0, VARIATION_COUNT], vec![])?;
            let labels = list(schema::ModuleLabels::fields(), &[0], vec![])?;
            let names = list(schema::ModuleNames::fields(), &[0, 0], vec![])?;

            sections.extend(Section::module_list(area).map(|s| (s, modules)));
            sections.extend(Section::cable_list(area).map(|s| (s, cables)));
            sections.push((Section::module_params(area), params));
            sections.extend(Section::module_labels(area).map(|s| (s, labels)));
            sections.extend(Section::module_names(area).map(|s| (s, names)));
        }
        Ok(sections)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::{ModuleLabel, ParamLabels};

    fn ints(fields: &'static crate::field::Fields, values: &[u32]) -> FieldValues {
        fields
            .build(values.iter().map(|v| Value::Int(*v)).collect())
            .unwrap()
    }

    fn with_list(fields: &'static crate::field::Fields, head: &[u32], items: Vec<FieldValues>) -> FieldValues {
        let mut values: Vec<Value> = head.iter().map(|v| Value::Int(*v)).collect();
        values.push(Value::Subfields(items));
        fields.build(values).unwrap()
    }

    /// An init patch with an oscillator wired to an output in the voice area.
    pub(crate) fn sample_patch(slot: Slot) -> Patch {
        let mut patch = Patch::init(slot).unwrap();
        patch.set_version(3);

        let modes = vec![ints(schema::ModuleModes::fields(), &[2])];
        let osc = with_list(schema::UserModule::fields(), &[97, 1, 0, 2, 0, 0, 1, 0, 1], modes);
        let out = with_list(schema::UserModule::fields(), &[4, 2, 1, 4, 3, 0, 0, 0, 0], vec![]);
        patch
            .update_section(
                Section::ModuleList1,
                with_list(schema::ModuleList::fields(), &[2], vec![osc, out]),
            )
            .unwrap();

        let cable = ints(schema::Cable::fields(), &[0, 1, 0, 1, 2, 0]);
        patch
            .update_section(
                Section::CableList1,
                with_list(schema::CableList::fields(), &[0, 1], vec![cable]),
            )
            .unwrap();

        let variations = (0..2)
            .map(|v| {
                let params = (0..3)
                    .map(|p| ints(schema::Data7::fields(), &[v * 10 + p]))
                    .collect();
                with_list(schema::VarParams::fields(), &[v], params)
            })
            .collect();
        let set = with_list(schema::ModuleParamSet::fields(), &[1, 3], variations);
        patch
            .update_section(
                Section::ModuleParams1,
                with_list(schema::ModuleParams::fields(), &[1, 2], vec![set]),
            )
            .unwrap();

        let names = schema::ModuleNames::fields()
            .build(vec![
                Value::Int(0),
                Value::Int(1),
                Value::Subfields(vec![schema::ModuleName::fields()
                    .build(vec![Value::Int(1), Value::Str("Osc1".into())])
                    .unwrap()]),
            ])
            .unwrap();
        patch.update_section(Section::ModuleNames1, names).unwrap();

        let label = schema::ParamLabel::fields()
            .build(vec![Value::Str("Pitch".into())])
            .unwrap();
        let param_labels = with_list(ParamLabels::fields(), &[1, 8, 0], vec![label]);
        let module_label = with_list(ModuleLabel::fields(), &[1, 10], vec![param_labels]);
        patch
            .update_section(
                Section::ModuleLabels1,
                with_list(schema::ModuleLabels::fields(), &[1], vec![module_label]),
            )
            .unwrap();

        patch.set_text("Saw lead\r\nwith vibrato").unwrap();
        patch
    }

    #[test]
    fn header_lengths() {
        assert_eq!(patch_header().len(), 80);
        assert_eq!(file_header("Type=Performance").len(), 86);
        assert!(patch_header().ends_with(b"BUILD 320\r\n\0"));
    }

    #[test]
    fn file_round_trip() {
        let patch = sample_patch(Slot::B);
        let bytes = patch.to_file_bytes().unwrap();

        let read = Patch::read_from_bytes(Slot::B, &bytes).unwrap();
        assert_eq!(read.version(), 3);
        assert_eq!(read.to_file_bytes().unwrap(), bytes);

        for section in FILE_SECTIONS {
            assert_eq!(read.section(section), patch.section(section), "{}", section);
        }
        assert_eq!(read.name(), None);
        assert_eq!(read.text(), Some("Saw lead\r\nwith vibrato"));
    }

    #[test]
    fn file_crc_is_checked() {
        let mut bytes = sample_patch(Slot::A).to_file_bytes().unwrap();
        let at = bytes.len() - 5;
        bytes[at] ^= 0x01;
        assert!(matches!(
            Patch::read_from_bytes(Slot::A, &bytes),
            Err(PatchError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn file_header_is_checked() {
        let mut bytes = sample_patch(Slot::A).to_file_bytes().unwrap();
        bytes[5] = b'x';
        assert!(matches!(
            Patch::read_from_bytes(Slot::A, &bytes),
            Err(PatchError::BadHeader)
        ));
    }

    #[test]
    fn message_round_trip() {
        let patch = sample_patch(Slot::C);
        let message = patch.write_message().unwrap();
        assert_eq!(&message[..4], &[0x01, 0x0a, 0x03, 0x21]);

        let read = Patch::read_from_message(Slot::C, 3, &message).unwrap();
        assert_eq!(read.write_message().unwrap(), message);
        for section in MSG_SECTIONS {
            assert_eq!(read.section(section), patch.section(section), "{}", section);
        }
        assert!(read.section(Section::TextPad).is_none());
    }

    #[test]
    fn message_addressing() {
        let message = sample_patch(Slot::C).write_message().unwrap();
        assert!(matches!(
            Patch::read_from_message(Slot::D, 3, &message),
            Err(PatchError::SlotMismatch { found: 0x0a, .. })
        ));
        assert!(matches!(
            Patch::read_from_message(Slot::C, 4, &message),
            Err(PatchError::VersionMismatch {
                expected: 4,
                found: 3,
                ..
            })
        ));

        let mut corrupt = message.clone();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xff;
        assert!(matches!(
            Patch::read_from_message(Slot::C, 3, &corrupt),
            Err(PatchError::CrcMismatch { .. })
        ));

        // A corrupted CRC cut to one byte must not be taken as unchecked.
        let mut truncated = message.clone();
        let high = truncated.len() - 2;
        truncated[high] ^= 0xff;
        truncated.pop();
        assert!(matches!(
            Patch::read_from_message(Slot::C, 3, &truncated),
            Err(PatchError::IOError(_))
        ));

        let stripped = &message[..message.len() - 2];
        assert!(matches!(
            Patch::read_from_message(Slot::C, 3, stripped),
            Err(PatchError::IOError(_))
        ));

        let mut padded = message.clone();
        padded.push(0x55);
        assert!(matches!(
            Patch::read_from_message(Slot::C, 3, &padded),
            Err(PatchError::TrailingBytes(1))
        ));
    }

    #[test]
    fn typed_views() {
        let patch = sample_patch(Slot::A);

        let modules = patch.modules(AreaId::Voice).unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].type_id, 97);
        assert_eq!(modules[0].modes, vec![2]);
        assert!(patch.modules(AreaId::Fx).unwrap().is_empty());

        let cables = patch.cables(AreaId::Voice).unwrap();
        assert!(cables[0].from_output);
        assert_eq!(cables[0].dest_module, 2);

        let params = patch.params(AreaId::Voice).unwrap().unwrap();
        assert_eq!(params.value(1, 1, 2), Some(12));

        assert_eq!(patch.module_names(AreaId::Voice).unwrap()[0].name, "Osc1");
        assert_eq!(
            patch.module_labels(AreaId::Voice).unwrap()[0].params[&0],
            vec![String::from("Pitch")]
        );
        assert_eq!(patch.morph_labels().unwrap()[1].label, "Vel");
        assert_eq!(patch.knobs().unwrap().len(), 120);
        assert!(patch.active_knobs().unwrap().is_empty());

        let settings = patch.settings().unwrap().unwrap();
        assert_eq!(settings.voices, 1);
        assert_eq!(settings.visible_cables.len(), 7);

        let note = patch.current_note().unwrap().unwrap();
        assert_eq!(note.notes.len(), 1);
        assert_eq!(patch.name(), Some("No name"));
    }

    #[test]
    fn param_updates() {
        let mut patch = sample_patch(Slot::A);
        patch.set_param(AreaId::Voice, 1, 1, 2, 99).unwrap();
        let params = patch.params(AreaId::Voice).unwrap().unwrap();
        assert_eq!(params.value(1, 1, 2), Some(99));
        assert_eq!(params.value(1, 0, 2), Some(2));

        let before = patch.clone();
        assert!(matches!(
            patch.set_param(AreaId::Voice, 7, 0, 0, 1),
            Err(PatchError::UnknownParam { module: 7, .. })
        ));
        assert!(matches!(
            patch.set_param(AreaId::Voice, 1, 0, 3, 1),
            Err(PatchError::UnknownParam { param: 3, .. })
        ));
        assert!(matches!(
            patch.set_param(AreaId::Voice, 1, 0, 0, 200),
            Err(PatchError::Field(FieldError::InvalidValue { value: 200, .. }))
        ));
        assert_eq!(patch, before);
    }

    #[test]
    fn load_data_by_area() {
        let mut patch = Patch::new(Slot::A);
        let mut content = vec![0x01, 0x00, 0x0a, 0x00, 0x00, 0x40];
        content.resize(28, 0);

        assert_eq!(patch.read_load_data(&content).unwrap(), AreaId::Voice);
        let load = patch.load(AreaId::Voice).unwrap().unwrap();
        assert_eq!(load.memory, 50.0);
        assert!(load.cycles > 0.0);
        assert!(patch.load_data(AreaId::Fx).is_none());

        content[0] = 5;
        assert!(matches!(
            patch.read_load_data(&content),
            Err(PatchError::InvalidArea(5))
        ));
    }

    #[test]
    fn wrong_schema_is_rejected() {
        let mut patch = Patch::new(Slot::A);
        let text = schema::TextPad::fields()
            .build(vec![Value::Str(String::new())])
            .unwrap();
        assert!(matches!(
            patch.update_section(Section::PatchName, text),
            Err(SectionError::WrongSchema { .. })
        ));
        assert!(matches!(
            patch.write_message(),
            Err(PatchError::Section(SectionError::Missing("PatchDescription")))
        ));
    }

    #[test]
    fn name_without_length() {
        let mut patch = Patch::new(Slot::D);
        patch.read_name(b"Bells\0").unwrap();
        assert_eq!(patch.name(), Some("Bells"));
    }
}
