//! Record layouts used by G2 patch, performance and device messages.
//!
//! Each `schema!` block declares an enum naming the fields of one record, in wire order, along
//! with the shared [`Fields`] descriptor used to decode and encode it.

use crate::error::FieldError;
use crate::field::{
    count_of, int, pad, string, subfields, DecodeContext, Field, FieldId, Fields, StringMode,
    SubfieldCount,
};
use crate::values::FieldValues;
use lazy_static::lazy_static;

macro_rules! schema {
    ($(#[$meta:meta])* $name:ident { $($field:ident: $kind:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($field),+
        }

        impl $name {
            pub fn fields() -> &'static Fields {
                lazy_static! {
                    static ref FIELDS: Fields = Fields::new(
                        stringify!($name),
                        vec![$(Field::new(FieldId::new(stringify!($name), stringify!($field)), $kind)),+],
                    );
                }
                &FIELDS
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$field => stringify!($field)),+
                }
            }
        }

        impl From<$name> for FieldId {
            fn from(field: $name) -> Self {
                FieldId::new(stringify!($name), field.name())
            }
        }
    };
}

const NAME_16: StringMode = StringMode::Fixed {
    len: 16,
    terminated: true,
};

const LABEL_7: StringMode = StringMode::Fixed {
    len: 7,
    terminated: false,
};

schema! {
    CableList {
        Reserved: int(12),
        CableCount: int(10),
        Cables: subfields(Cable::fields(), count_of(CableList::CableCount)),
    }
}

schema! {
    Cable {
        Color: int(3),
        SrcModule: int(8),
        SrcConn: int(6),
        Direction: int(1),
        DestModule: int(8),
        DestConn: int(6),
    }
}

schema! {
    ModuleModes {
        Data: int(6),
    }
}

schema! {
    ModuleList {
        ModuleCount: int(8),
        Modules: subfields(UserModule::fields(), count_of(ModuleList::ModuleCount)),
    }
}

schema! {
    UserModule {
        Id: int(8),
        Index: int(8),
        Column: int(7),
        Row: int(7),
        Color: int(8),
        Uprate: int(1),
        Leds: int(1),
        Reserved: int(6),
        ModeCount: int(4),
        Modes: subfields(ModuleModes::fields(), count_of(UserModule::ModeCount)),
    }
}

schema! {
    PatchDescription {
        Reserved: subfields(Data8::fields(), SubfieldCount::Constant(7)),
        Reserved2: int(5),
        Voices: int(5),
        Height: int(14),
        Unk2: int(3),
        Red: int(1),
        Blue: int(1),
        Yellow: int(1),
        Orange: int(1),
        Green: int(1),
        Purple: int(1),
        White: int(1),
        MonoPoly: int(2),
        Variation: int(8),
        Category: int(8),
        Reserved3: int(8),
    }
}

schema! {
    Data7 {
        Datum: int(7),
    }
}

schema! {
    Data8 {
        Datum: int(8),
    }
}

schema! {
    ModuleParams {
        SetCount: int(8),
        VariationCount: int(8),
        ParamSet: subfields(ModuleParamSet::fields(), count_of(ModuleParams::SetCount)),
    }
}

schema! {
    ModuleParamSet {
        ModIndex: int(8),
        ParamCount: int(7),
        ModParams: subfields(VarParams::fields(), count_of(ModuleParams::VariationCount)),
    }
}

schema! {
    VarParams {
        Variation: int(8),
        Params: subfields(Data7::fields(), count_of(ModuleParamSet::ParamCount)),
    }
}

schema! {
    /// A single parameter change pushed by, or sent to, the synth.
    ParamUpdate {
        Location: int(8),
        Module: int(8),
        Param: int(8),
        Value: int(8),
        Variation: int(8),
    }
}

schema! {
    MorphParameters {
        VariationCount: int(8),
        MorphCount: int(4),
        Reserved: int(20),
        VarMorphs: subfields(VarMorph::fields(), count_of(MorphParameters::VariationCount)),
    }
}

schema! {
    VarMorph {
        Variation: int(4),
        Reserved0: int(24),
        Reserved1: int(24),
        Reserved2: int(8),
        MorphCount: int(8),
        VarMorphParams: subfields(VarMorphParam::fields(), count_of(VarMorph::MorphCount)),
        // Only as many bits as are left before the section ends, up to 4.
        Reserved3: pad(4),
    }
}

schema! {
    VarMorphParam {
        Location: int(2),
        ModuleIndex: int(8),
        ParamIndex: int(7),
        Morph: int(4),
        Range: int(8),
    }
}

schema! {
    KnobAssignments {
        KnobCount: int(16),
        Knobs: subfields(KnobAssignment::fields(), count_of(KnobAssignments::KnobCount)),
    }
}

schema! {
    KnobAssignment {
        Assigned: int(1),
        Params: subfields(KnobParams::fields(), count_of(KnobAssignment::Assigned)),
    }
}

schema! {
    KnobParams {
        Location: int(2),
        Index: int(8),
        IsLed: int(2),
        Param: int(7),
    }
}

schema! {
    GlobalKnobAssignments {
        KnobCount: int(16),
        Knobs: subfields(GlobalKnobAssignment::fields(), count_of(GlobalKnobAssignments::KnobCount)),
    }
}

schema! {
    GlobalKnobAssignment {
        Assigned: int(1),
        Params: subfields(GlobalKnobParams::fields(), count_of(GlobalKnobAssignment::Assigned)),
    }
}

schema! {
    GlobalKnobParams {
        Location: int(2),
        Index: int(8),
        IsLed: int(2),
        Param: int(7),
        Slot: int(2),
    }
}

schema! {
    ControlAssignments {
        NumControls: int(7),
        Assignments: subfields(ControlAssignment::fields(), count_of(ControlAssignments::NumControls)),
    }
}

schema! {
    ControlAssignment {
        MidiCC: int(7),
        Location: int(2),
        Index: int(8),
        Param: int(7),
    }
}

schema! {
    ModuleNames {
        Reserved: int(6),
        NameCount: int(8),
        Names: subfields(ModuleName::fields(), count_of(ModuleNames::NameCount)),
    }
}

schema! {
    ModuleName {
        ModuleIndex: int(8),
        Name: string(NAME_16),
    }
}

schema! {
    MorphLabels {
        LabelCount: int(8),
        Entry: int(8),
        Length: int(8),
        Labels: subfields(MorphLabel::fields(), SubfieldCount::Constant(8)),
    }
}

schema! {
    MorphLabel {
        Index: int(8),
        Length: int(8),
        Entry: int(8),
        Label: string(LABEL_7),
    }
}

schema! {
    CurrentNote {
        Note: int(7),
        Attack: int(7),
        Release: int(7),
        NoteCount: int(5),
        Notes: subfields(NoteData::fields(), SubfieldCount::Computed(note_count)),
    }
}

// The note count field holds one less than the number of notes that follow.
fn note_count(context: &DecodeContext) -> Result<usize, FieldError> {
    Ok(context.int(CurrentNote::NoteCount)? as usize + 1)
}

schema! {
    NoteData {
        Note: int(7),
        Attack: int(7),
        Release: int(7),
    }
}

schema! {
    ModuleLabels {
        ModuleCount: int(8),
        ModLabels: subfields(ModuleLabel::fields(), count_of(ModuleLabels::ModuleCount)),
    }
}

schema! {
    ModuleLabel {
        ModuleIndex: int(8),
        ModLabelLen: int(8),
        Labels: subfields(ParamLabels::fields(), SubfieldCount::Incremental(more_param_labels)),
    }
}

/// `ModLabelLen` is a byte count. Each parameter entry takes a 3 byte header plus 7 bytes per
/// label, so keep reading entries until the bytes consumed reach that length.
fn more_param_labels(context: &DecodeContext, read: &[FieldValues]) -> Result<bool, FieldError> {
    let bytes = context.int(ModuleLabel::ModLabelLen)? as usize;
    let mut labels = 0;
    for entry in read {
        labels += entry.subfields(ParamLabels::Labels)?.len();
    }
    Ok(read.len() * 3 + labels * 7 < bytes)
}

schema! {
    ParamLabels {
        IsString: int(8),
        ParamLen: int(8),
        ParamIndex: int(8),
        Labels: subfields(ParamLabel::fields(), SubfieldCount::Computed(param_label_count)),
    }
}

fn param_label_count(context: &DecodeContext) -> Result<usize, FieldError> {
    let len = context.int(ParamLabels::ParamLen)? as usize;
    Ok(len.saturating_sub(1) / 7)
}

schema! {
    ParamLabel {
        Label: string(LABEL_7),
    }
}

schema! {
    TextPad {
        Text: string(StringMode::ToEnd),
    }
}

schema! {
    SynthSettings {
        DeviceName: string(StringMode::Terminated),
        PerfMode: int(1),
        Reserved0: int(7),
        Reserved1: int(8),
        PerfBank: int(8),
        PerfLocation: int(8),
        MemoryProtect: int(1),
        Reserved2: int(7),
        MidiChannelA: int(8),
        MidiChannelB: int(8),
        MidiChannelC: int(8),
        MidiChannelD: int(8),
        MidiChannelGlobal: int(8),
        SysExId: int(8),
        LocalOn: int(1),
        Reserved3: int(7),
        Reserved4: int(6),
        ProgramChangeReceive: int(1),
        ProgramChangeSend: int(1),
        Reserved5: int(6),
        ControllersReceive: int(1),
        ControllersSend: int(1),
        Reserved6: int(1),
        SendClock: int(1),
        IgnoreExternalClock: int(1),
        Reserved7: int(5),
        TuneCent: int(8),
        GlobalOctaveShiftActive: int(1),
        Reserved8: int(7),
        GlobalOctaveShift: int(8),
        TuneSemi: int(8),
        Reserved9: int(8),
        PedalPolarity: int(1),
        ReservedA: int(7),
        ControlPedalGain: int(8),
    }
}

schema! {
    /// One entry of a bank listing.
    EntryData {
        Name: string(NAME_16),
        Category: int(8),
    }
}

schema! {
    EntryName {
        Name: string(NAME_16),
    }
}

schema! {
    PerformanceSettings {
        Unknown1: int(12),
        SelectedSlot: int(2),
        Unknown2: int(2),
        KeyboardRangeEnabled: int(8),
        MasterClock: int(8),
        Unknown3: int(8),
        MasterClockRun: int(8),
        Unknown4: int(16),
        Slots: subfields(PerfSlot::fields(), SubfieldCount::Constant(4)),
    }
}

schema! {
    PerfSlot {
        PatchName: string(NAME_16),
        Enabled: int(8),
        Keyboard: int(8),
        Hold: int(8),
        BankIndex: int(8),
        PatchIndex: int(8),
        KeyboardRangeFrom: int(8),
        KeyboardRangeTo: int(8),
        Unknown: int(24),
    }
}

schema! {
    /// DSP resource usage for one area of a patch.
    PatchLoadData {
        Location: int(8),
        CyclesRed1Msb: int(8),
        CyclesRed1Lsb: int(8),
        CyclesBlue1Msb: int(8),
        CyclesBlue1Lsb: int(8),
        InternalMem: int(8),
        Unknown1: int(16),
        Resource4Msb: int(8),
        Resource4Lsb: int(8),
        Resource5: int(16),
        CyclesRed2: int(16),
        Unknown3: int(16),
        Resource8: int(16),
        CyclesBlue2: int(16),
        Unknown4: int(16),
        Ram: int(32),
        Unknown5: int(16),
    }
}

schema! {
    SelectedParam {
        Unknown: int(8),
        Location: int(8),
        Module: int(8),
        Param: int(8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitBuffer;
    use crate::error::FieldError;
    use crate::values::{FieldValue, Value};

    fn int_values(schema: &'static Fields, values: &[u32]) -> FieldValues {
        schema
            .build(values.iter().map(|v| Value::Int(*v)).collect())
            .unwrap()
    }

    fn round_trip(schema: &'static Fields, bytes: &[u8]) -> FieldValues {
        let mut bb = BitBuffer::from(bytes);
        let values = schema.read(&mut bb).unwrap();
        assert_eq!(values.to_bytes().unwrap(), bytes);
        values
    }

    #[test]
    fn field_ids_are_stable() {
        let id: FieldId = Cable::SrcConn.into();
        assert_eq!(id.schema(), "Cable");
        assert_eq!(id.name(), "SrcConn");
        assert_eq!(id.to_string(), "Cable.SrcConn");
        assert_ne!(FieldId::from(Data7::Datum), FieldId::from(Data8::Datum));
        assert_eq!(Cable::fields().len(), 6);
    }

    #[test]
    fn cable_list() {
        let cables = vec![
            int_values(Cable::fields(), &[1, 2, 0, 1, 3, 1]),
            int_values(Cable::fields(), &[4, 3, 2, 0, 2, 0]),
        ];
        let list = CableList::fields()
            .build(vec![
                Value::Int(0),
                Value::Int(2),
                Value::Subfields(cables.clone()),
            ])
            .unwrap();

        let bytes = list.to_bytes().unwrap();
        let decoded = round_trip(CableList::fields(), &bytes);
        assert_eq!(decoded, list);
        assert_eq!(decoded.int(CableList::CableCount).unwrap(), 2);
        assert_eq!(decoded.subfields(CableList::Cables).unwrap(), &cables[..]);
    }

    #[test]
    fn outer_counts_are_found() {
        let mut bb = BitBuffer::new();
        bb.put(8, 1).unwrap(); // SetCount
        bb.put(8, 2).unwrap(); // VariationCount
        bb.put(8, 5).unwrap(); // ModIndex
        bb.put(7, 3).unwrap(); // ParamCount
        for variation in 0..2 {
            bb.put(8, variation).unwrap();
            for param in 0..3 {
                bb.put(7, variation * 10 + param).unwrap();
            }
        }
        let bytes = bb.into_bytes();

        let params = round_trip(ModuleParams::fields(), &bytes);
        let sets = params.subfields(ModuleParams::ParamSet).unwrap();
        assert_eq!(sets.len(), 1);

        let variations = sets[0].subfields(ModuleParamSet::ModParams).unwrap();
        assert_eq!(variations.len(), 2);
        let second: Vec<u32> = variations[1]
            .subfields(VarParams::Params)
            .unwrap()
            .iter()
            .map(|p| p.int(Data7::Datum).unwrap())
            .collect();
        assert_eq!(second, vec![10, 11, 12]);
    }

    #[test]
    fn missing_count_is_an_error() {
        let mut bb = BitBuffer::from(vec![0x05, 0x80, 0x00, 0x00]);
        let err = VarParams::fields().read(&mut bb).unwrap_err();
        match err {
            FieldError::ReadFailed { field, source, .. } => {
                assert_eq!(field, FieldId::from(VarParams::Params));
                let missing = FieldId::from(ModuleParamSet::ParamCount);
                assert!(matches!(*source, FieldError::MissingCount(id) if id == missing));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn terminated_string() {
        let bytes = [0x03, b'O', b's', b'c', 0x00];
        let names = round_trip(ModuleName::fields(), &bytes);
        assert_eq!(names.string(ModuleName::Name).unwrap(), "Osc");
    }

    #[test]
    fn full_length_name_has_no_terminator() {
        let mut bytes = b"ABCDEFGHIJKLMNOP".to_vec();
        bytes.push(0x2a);

        let mut bb = BitBuffer::from(bytes.clone());
        let entry = EntryData::fields().read(&mut bb).unwrap();
        assert_eq!(entry.string(EntryData::Name).unwrap(), "ABCDEFGHIJKLMNOP");
        assert_eq!(entry.int(EntryData::Category).unwrap(), 0x2a);
        assert_eq!(entry.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn padded_string_consumes_all_slots() {
        let bytes = [b'V', b'e', b'l', 0x00, 0x00, 0x00, 0x00, 0x11];
        let mut bb = BitBuffer::from(&bytes[..]);

        let label = ParamLabel::fields().read(&mut bb).unwrap();
        assert_eq!(label.string(ParamLabel::Label).unwrap(), "Vel");
        assert_eq!(bb.bit_index(), 56);
        assert_eq!(bb.get(8).unwrap(), 0x11);
        assert_eq!(label.to_bytes().unwrap(), &bytes[..7]);
    }

    #[test]
    fn long_strings_are_truncated() {
        let mut label = ParamLabel::fields()
            .build(vec![Value::Str("Keyboard".into())])
            .unwrap();
        assert_eq!(label.to_bytes().unwrap(), b"Keyboar");

        label
            .update(FieldValue::string(ParamLabel::Label, "Hi"))
            .unwrap();
        assert_eq!(label.to_bytes().unwrap(), b"Hi\0\0\0\0\0");
    }

    #[test]
    fn text_to_end() {
        let bytes = b"line one\r\nline two";
        let pad = round_trip(TextPad::fields(), bytes);
        assert_eq!(pad.string(TextPad::Text).unwrap(), "line one\r\nline two");

        let empty = round_trip(TextPad::fields(), &[]);
        assert_eq!(empty.string(TextPad::Text).unwrap(), "");
    }

    #[test]
    fn current_note_count_is_offset() {
        let mut bb = BitBuffer::new();
        for v in [64, 0, 0] {
            bb.put(7, v).unwrap();
        }
        bb.put(5, 1).unwrap();
        for v in [60, 10, 20, 67, 30, 40] {
            bb.put(7, v).unwrap();
        }
        let bytes = bb.into_bytes();

        let note = round_trip(CurrentNote::fields(), &bytes);
        assert_eq!(note.subfields(CurrentNote::Notes).unwrap().len(), 2);
    }

    fn param_labels(index: u32, labels: &[&str]) -> FieldValues {
        let labels = labels
            .iter()
            .map(|l| {
                ParamLabel::fields()
                    .build(vec![Value::Str(l.to_string())])
                    .unwrap()
            })
            .collect::<Vec<_>>();
        ParamLabels::fields()
            .build(vec![
                Value::Int(1),
                Value::Int(labels.len() as u32 * 7 + 1),
                Value::Int(index),
                Value::Subfields(labels),
            ])
            .unwrap()
    }

    #[test]
    fn module_labels_stop_at_byte_length() {
        // One single-label entry and one three-label entry: 3 + 7 + 3 + 21 bytes.
        let entries = vec![
            param_labels(0, &["Cutoff"]),
            param_labels(4, &["Sine", "Tri", "Saw"]),
        ];
        let label = ModuleLabel::fields()
            .build(vec![
                Value::Int(2),
                Value::Int(34),
                Value::Subfields(entries.clone()),
            ])
            .unwrap();
        let other = ModuleLabel::fields()
            .build(vec![
                Value::Int(3),
                Value::Int(10),
                Value::Subfields(vec![param_labels(1, &["Amount"])]),
            ])
            .unwrap();
        let labels = ModuleLabels::fields()
            .build(vec![
                Value::Int(2),
                Value::Subfields(vec![label.clone(), other.clone()]),
            ])
            .unwrap();

        let bytes = labels.to_bytes().unwrap();
        assert_eq!(bytes.len(), 1 + (2 + 34) + (2 + 10));

        let decoded = round_trip(ModuleLabels::fields(), &bytes);
        let modules = decoded.subfields(ModuleLabels::ModLabels).unwrap();
        assert_eq!(modules, &[label, other]);

        let first = modules[0].subfields(ModuleLabel::Labels).unwrap();
        assert_eq!(first.len(), 2);
        let names: Vec<&str> = first[1]
            .subfields(ParamLabels::Labels)
            .unwrap()
            .iter()
            .map(|l| l.string(ParamLabel::Label).unwrap())
            .collect();
        assert_eq!(names, vec!["Sine", "Tri", "Saw"]);
    }

    #[test]
    fn morph_padding_keeps_width() {
        let param = int_values(VarMorphParam::fields(), &[1, 2, 3, 4, 5]);
        let morph = |variation: u32, params: Vec<FieldValues>, pad_bits: usize| {
            VarMorph::fields()
                .build(vec![
                    Value::Int(variation),
                    Value::Int(0),
                    Value::Int(0),
                    Value::Int(0),
                    Value::Int(params.len() as u32),
                    Value::Subfields(params),
                    Value::Pad {
                        value: 0,
                        bits: pad_bits,
                    },
                ])
                .unwrap()
        };

        // Header is 32 bits, each variation 68 bits plus 29 per param plus padding. The last
        // variation only has room for two padding bits before the byte boundary.
        let morphs = MorphParameters::fields()
            .build(vec![
                Value::Int(2),
                Value::Int(8),
                Value::Int(0),
                Value::Subfields(vec![
                    morph(0, vec![param.clone()], 4),
                    morph(1, vec![param.clone()], 2),
                ]),
            ])
            .unwrap();

        let bytes = morphs.to_bytes().unwrap();
        assert_eq!(bytes.len() * 8, 32 + 68 + 29 + 4 + 68 + 29 + 2);

        let decoded = round_trip(MorphParameters::fields(), &bytes);
        assert_eq!(decoded, morphs);
    }

    #[test]
    fn knob_assignments_use_flag_as_count() {
        let knob = |assigned: bool| {
            let params = match assigned {
                true => vec![int_values(KnobParams::fields(), &[1, 1, 0, 0])],
                false => vec![],
            };
            KnobAssignment::fields()
                .build(vec![Value::Int(assigned as u32), Value::Subfields(params)])
                .unwrap()
        };
        let knobs = KnobAssignments::fields()
            .build(vec![
                Value::Int(3),
                Value::Subfields(vec![knob(true), knob(false), knob(false)]),
            ])
            .unwrap();

        let bytes = knobs.to_bytes().unwrap();
        let decoded = round_trip(KnobAssignments::fields(), &bytes);
        let entries = decoded.subfields(KnobAssignments::Knobs).unwrap();
        assert!(entries[0].bool_value(KnobAssignment::Assigned).unwrap());
        assert_eq!(entries[0].subfields(KnobAssignment::Params).unwrap().len(), 1);
        assert!(entries[1].subfields(KnobAssignment::Params).unwrap().is_empty());
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let cable = Cable::fields()
            .build(vec![
                Value::Str("nope".into()),
                Value::Int(0),
                Value::Int(0),
                Value::Int(0),
                Value::Int(0),
                Value::Int(0),
            ])
            .unwrap();
        assert!(matches!(
            cable.to_bytes(),
            Err(FieldError::WrongType { expected: "int", .. })
        ));
        assert!(matches!(
            Cable::fields().build(vec![]),
            Err(FieldError::ValueCount { expected: 6, .. })
        ));
    }
}
