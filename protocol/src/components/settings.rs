use crate::error::FieldError;
use crate::field::Fields;
use crate::schema::{self, PerfSlot};
use crate::values::{FieldValues, Value};
use g2_types::Slot;

/// Global synth configuration, as reported by the synth settings request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthSettings {
    pub device_name: String,
    pub perf_mode: bool,
    pub perf_bank: u32,
    pub perf_location: u32,
    pub memory_protect: bool,
    pub midi_channels: [u32; 4],
    pub global_channel: u32,
    pub sysex_id: u32,
    pub local_on: bool,
    pub send_clock: bool,
    pub ignore_external_clock: bool,
    pub tune_cent: u32,
    pub tune_semi: u32,
}

impl SynthSettings {
    /// Settings used while no synth is connected.
    pub fn offline_defaults() -> Result<FieldValues, FieldError> {
        let fields: &'static Fields = schema::SynthSettings::fields();
        let mut values = vec![Value::Str(String::from("[offline]"))];

        // Everything after the name is an integer, in field order.
        let ints = [
            1, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 0, 16, 1, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 64, 0,
        ];
        values.extend(ints.iter().map(|v| Value::Int(*v)));
        fields.build(values)
    }
}

impl TryFrom<&FieldValues> for SynthSettings {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        use schema::SynthSettings as F;

        Ok(Self {
            device_name: values.string(F::DeviceName)?.to_string(),
            perf_mode: values.bool_value(F::PerfMode)?,
            perf_bank: values.int(F::PerfBank)?,
            perf_location: values.int(F::PerfLocation)?,
            memory_protect: values.bool_value(F::MemoryProtect)?,
            midi_channels: [
                values.int(F::MidiChannelA)?,
                values.int(F::MidiChannelB)?,
                values.int(F::MidiChannelC)?,
                values.int(F::MidiChannelD)?,
            ],
            global_channel: values.int(F::MidiChannelGlobal)?,
            sysex_id: values.int(F::SysExId)?,
            local_on: values.bool_value(F::LocalOn)?,
            send_clock: values.bool_value(F::SendClock)?,
            ignore_external_clock: values.bool_value(F::IgnoreExternalClock)?,
            tune_cent: values.int(F::TuneCent)?,
            tune_semi: values.int(F::TuneSemi)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSettings {
    pub patch_name: String,
    pub enabled: bool,
    pub keyboard: bool,
    pub hold: bool,
    pub bank_index: u32,
    pub patch_index: u32,
    pub keyboard_range: (u32, u32),
}

impl TryFrom<&FieldValues> for SlotSettings {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        Ok(Self {
            patch_name: values.string(PerfSlot::PatchName)?.to_string(),
            enabled: values.bool_value(PerfSlot::Enabled)?,
            keyboard: values.bool_value(PerfSlot::Keyboard)?,
            hold: values.bool_value(PerfSlot::Hold)?,
            bank_index: values.int(PerfSlot::BankIndex)?,
            patch_index: values.int(PerfSlot::PatchIndex)?,
            keyboard_range: (
                values.int(PerfSlot::KeyboardRangeFrom)?,
                values.int(PerfSlot::KeyboardRangeTo)?,
            ),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerformanceSettings {
    pub selected_slot: Slot,
    pub keyboard_range_enabled: bool,
    pub master_clock: u32,
    pub master_clock_run: bool,
    pub slots: Vec<SlotSettings>,
}

impl PerformanceSettings {
    pub fn slot(&self, slot: Slot) -> Option<&SlotSettings> {
        self.slots.get(slot.index() as usize)
    }
}

impl TryFrom<&FieldValues> for PerformanceSettings {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        use schema::PerformanceSettings as F;

        let selected = values.int(F::SelectedSlot)?;
        let selected_slot = Slot::from_index(selected as u8).ok_or(FieldError::InvalidValue {
            field: F::SelectedSlot.into(),
            value: selected,
        })?;
        let slots = values
            .subfields(F::Slots)?
            .iter()
            .map(SlotSettings::try_from)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            selected_slot,
            keyboard_range_enabled: values.bool_value(F::KeyboardRangeEnabled)?,
            master_clock: values.int(F::MasterClock)?,
            master_clock_run: values.bool_value(F::MasterClockRun)?,
            slots,
        })
    }
}
