use crate::bits::BitBuffer;
use crate::bytes::expect_warn;
use crate::components::{GlobalKnob, PerformanceSettings};
use crate::error::{FieldError, PatchError, SectionError};
use crate::patch::{append_crc, check_body_crc, file_header, strip_header, Patch};
use crate::schema::{self, EntryName};
use crate::sections::Section;
use crate::values::{FieldValues, Value};
use byteorder::ReadBytesExt;
use enum_map::EnumMap;
use g2_types::Slot;
use log::info;
use std::io::Cursor;
use std::path::Path;
use strum::IntoEnumIterator;

const FILE_BODY_START: u8 = 0x17;
const DEFAULT_NAME: &str = "No name";

pub fn performance_header() -> Vec<u8> {
    file_header("Type=Performance")
}

/// Four slots of patches plus the settings and knobs that span them.
#[derive(Clone, Debug, PartialEq)]
pub struct Performance {
    version: u8,
    name: String,
    settings: Option<FieldValues>,
    global_knobs: Option<FieldValues>,
    patches: EnumMap<Slot, Patch>,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            version: 0,
            name: String::from(DEFAULT_NAME),
            settings: None,
            global_knobs: None,
            patches: EnumMap::from_fn(Patch::new),
        }
    }
}

impl Performance {
    /// An empty performance with an init patch in every slot.
    pub fn init() -> Result<Self, PatchError> {
        let mut perf = Performance::default();
        for slot in Slot::iter() {
            perf.patches[slot] = Patch::init(slot)?;
        }
        perf.settings = Some(init_settings()?);
        perf.global_knobs = Some(init_global_knobs()?);
        Ok(perf)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) {
        info!("Performance version {}", version);
        self.version = version;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn patch(&self, slot: Slot) -> &Patch {
        &self.patches[slot]
    }

    pub fn patch_mut(&mut self, slot: Slot) -> &mut Patch {
        &mut self.patches[slot]
    }

    pub fn set_patch(&mut self, slot: Slot, patch: Patch) {
        self.patches[slot] = patch;
    }

    pub fn patches(&self) -> impl Iterator<Item = (Slot, &Patch)> {
        self.patches.iter()
    }

    pub fn settings_values(&self) -> Option<&FieldValues> {
        self.settings.as_ref()
    }

    pub fn settings(&self) -> Result<Option<PerformanceSettings>, FieldError> {
        self.settings
            .as_ref()
            .map(PerformanceSettings::try_from)
            .transpose()
    }

    pub fn set_settings(&mut self, values: FieldValues) -> Result<(), SectionError> {
        check_schema(Section::PerformanceSettings, &values)?;
        self.settings = Some(values);
        Ok(())
    }

    pub fn global_knobs_values(&self) -> Option<&FieldValues> {
        self.global_knobs.as_ref()
    }

    pub fn global_knobs(&self) -> Result<Vec<GlobalKnob>, FieldError> {
        match &self.global_knobs {
            Some(values) => GlobalKnob::list(values),
            None => Ok(vec![]),
        }
    }

    pub fn set_global_knobs(&mut self, values: FieldValues) -> Result<(), SectionError> {
        check_schema(Section::GlobalKnobAssignments, &values)?;
        self.global_knobs = Some(values);
        Ok(())
    }

    pub fn selected_slot(&self) -> Result<Option<Slot>, FieldError> {
        Ok(self.settings()?.map(|s| s.selected_slot))
    }

    /// One byte per slot, in slot order.
    pub fn read_assigned_voices(&mut self, content: &[u8]) -> Result<(), PatchError> {
        let mut cursor = Cursor::new(content);
        for slot in Slot::iter() {
            let voices = cursor.read_u8()?;
            self.patches[slot].set_assigned_voices(voices);
        }
        Ok(())
    }

    /// Decodes the name and settings message content: the unframed name record, then the
    /// framed settings section on the next byte boundary.
    pub fn read_name_and_settings(&mut self, content: &[u8]) -> Result<(), PatchError> {
        let mut bb = BitBuffer::from(content);
        let name = EntryName::fields().read(&mut bb)?;
        let offset = bb.bit_index().div_ceil(8);

        let mut cursor = Cursor::new(content.get(offset..).unwrap_or_default());
        let settings = Section::PerformanceSettings.read(&mut cursor)?;

        self.name = name.string(EntryName::Name)?.to_string();
        self.settings = Some(settings);
        info!("Performance name and settings: {}", self.name);
        Ok(())
    }

    /// Decodes the contents of a `.prf2` file. Patches in a performance file carry no version
    /// of their own and start at version 0.
    pub fn read_from_bytes(data: &[u8]) -> Result<Performance, PatchError> {
        let body = strip_header(data, &performance_header())?;
        let content = check_body_crc(body)?;

        let mut cursor = Cursor::new(content);
        expect_warn(&mut cursor, FILE_BODY_START, "Performance file", "header terminator")?;

        let mut perf = Performance::default();
        perf.set_version(cursor.read_u8()?);
        perf.settings = Some(Section::PerformanceSettings.read(&mut cursor)?);
        for slot in Slot::iter() {
            let mut patch = Patch::new(slot);
            patch.read_file_sections(&mut cursor)?;
            perf.patches[slot] = patch;
        }
        perf.global_knobs = Some(Section::GlobalKnobAssignments.read(&mut cursor)?);
        Ok(perf)
    }

    /// Reads a performance file, naming the performance after the file.
    pub fn read_from_file(path: &Path) -> Result<Performance, PatchError> {
        let data = std::fs::read(path)?;
        let mut perf = Self::read_from_bytes(&data)?;
        if let Some(stem) = path.file_stem() {
            perf.set_name(&stem.to_string_lossy());
        }
        Ok(perf)
    }

    pub fn to_file_bytes(&self) -> Result<Vec<u8>, PatchError> {
        let settings = self
            .settings
            .as_ref()
            .ok_or(SectionError::Missing(Section::PerformanceSettings.name()))?;
        let knobs = self
            .global_knobs
            .as_ref()
            .ok_or(SectionError::Missing(Section::GlobalKnobAssignments.name()))?;

        let mut out = performance_header();
        let start = out.len();
        out.extend([FILE_BODY_START, self.version]);
        Section::PerformanceSettings.write(settings, &mut out)?;
        for (_, patch) in self.patches.iter() {
            patch.write_file_sections(&mut out)?;
        }
        Section::GlobalKnobAssignments.write(knobs, &mut out)?;
        append_crc(&mut out, start)?;
        Ok(out)
    }

    pub fn write_file(&self, path: &Path) -> Result<(), PatchError> {
        std::fs::write(path, self.to_file_bytes()?)?;
        Ok(())
    }
}

fn check_schema(section: Section, values: &FieldValues) -> Result<(), SectionError> {
    if values.schema().name() != section.fields().name() {
        return Err(SectionError::WrongSchema {
            name: section.name(),
            expected: section.fields().name(),
            found: values.schema().name(),
        });
    }
    Ok(())
}

fn init_settings() -> Result<FieldValues, FieldError> {
    let slots = Slot::iter()
        .map(|slot| {
            let keyboard = (slot == Slot::A) as u32;
            schema::PerfSlot::fields().build(vec![
                Value::Str(String::from(DEFAULT_NAME)),
                Value::Int(1),
                Value::Int(keyboard),
                Value::Int(0),
                Value::Int(0),
                Value::Int(0),
                Value::Int(0),
                Value::Int(127),
                Value::Int(0),
            ])
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Unknown1, SelectedSlot, Unknown2, KeyboardRangeEnabled, MasterClock, Unknown3,
    // MasterClockRun, Unknown4.
    let mut values: Vec<Value> = [0, 0, 0, 0, 120, 0, 0, 0]
        .iter()
        .map(|v| Value::Int(*v))
        .collect();
    values.push(Value::Subfields(slots));
    schema::PerformanceSettings::fields().build(values)
}

fn init_global_knobs() -> Result<FieldValues, FieldError> {
    let knobs = (0..120)
        .map(|_| {
            schema::GlobalKnobAssignment::fields()
                .build(vec![Value::Int(0), Value::Subfields(vec![])])
        })
        .collect::<Result<Vec<_>, _>>()?;
    schema::GlobalKnobAssignments::fields().build(vec![Value::Int(120), Value::Subfields(knobs)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::tests::sample_patch;
    use crate::sections::FILE_SECTIONS;
    use g2_types::AreaId;

    fn sample_performance() -> Performance {
        let mut perf = Performance::init().unwrap();
        perf.set_version(7);
        let mut patch = sample_patch(Slot::C);
        patch.set_version(0);
        perf.set_patch(Slot::C, patch);
        perf
    }

    #[test]
    fn header_length() {
        assert_eq!(performance_header().len(), 86);
    }

    #[test]
    fn file_round_trip() {
        let perf = sample_performance();
        let bytes = perf.to_file_bytes().unwrap();

        let read = Performance::read_from_bytes(&bytes).unwrap();
        assert_eq!(read.version(), 7);
        assert_eq!(read.to_file_bytes().unwrap(), bytes);
        assert_eq!(read.settings_values(), perf.settings_values());
        assert_eq!(read.global_knobs_values(), perf.global_knobs_values());

        for slot in Slot::iter() {
            assert_eq!(read.patch(slot).version(), 0);
            for section in FILE_SECTIONS {
                assert_eq!(
                    read.patch(slot).section(section),
                    perf.patch(slot).section(section)
                );
            }
        }
        assert_eq!(read.patch(Slot::C).modules(AreaId::Voice).unwrap().len(), 2);
    }

    #[test]
    fn file_crc_is_checked() {
        let mut bytes = sample_performance().to_file_bytes().unwrap();
        let at = bytes.len() - 10;
        bytes[at] = bytes[at].wrapping_add(1);
        assert!(matches!(
            Performance::read_from_bytes(&bytes),
            Err(PatchError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn patch_file_is_not_a_performance() {
        let bytes = sample_patch(Slot::A).to_file_bytes().unwrap();
        assert!(matches!(
            Performance::read_from_bytes(&bytes),
            Err(PatchError::BadHeader)
        ));
    }

    #[test]
    fn name_and_settings_message() {
        let perf = Performance::init().unwrap();
        let mut content = b"Live set\0".to_vec();
        Section::PerformanceSettings
            .write(perf.settings_values().unwrap(), &mut content)
            .unwrap();

        let mut read = Performance::default();
        read.read_name_and_settings(&content).unwrap();
        assert_eq!(read.name(), "Live set");

        let settings = read.settings().unwrap().unwrap();
        assert_eq!(settings.selected_slot, Slot::A);
        assert_eq!(settings.master_clock, 120);
        assert_eq!(settings.slots.len(), 4);
        assert!(settings.slot(Slot::A).unwrap().keyboard);
        assert!(!settings.slot(Slot::B).unwrap().keyboard);
        assert_eq!(settings.slot(Slot::D).unwrap().keyboard_range, (0, 127));
    }

    #[test]
    fn assigned_voices() {
        let mut perf = Performance::default();
        perf.read_assigned_voices(&[4, 0, 1, 2]).unwrap();
        assert_eq!(perf.patch(Slot::A).assigned_voices(), 4);
        assert_eq!(perf.patch(Slot::D).assigned_voices(), 2);
        assert!(perf.read_assigned_voices(&[1, 2]).is_err());
    }

    #[test]
    fn global_knobs() {
        let perf = Performance::init().unwrap();
        let knobs = perf.global_knobs().unwrap();
        assert_eq!(knobs.len(), 120);
        assert!(knobs.iter().all(|k| k.target.is_none()));
        assert_eq!(perf.selected_slot().unwrap(), Some(Slot::A));
    }
}
