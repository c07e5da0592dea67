use crate::error::FieldError;
use crate::field::FieldId;
use crate::schema::{
    self, ControlAssignments, GlobalKnobAssignment, GlobalKnobAssignments, GlobalKnobParams,
    KnobAssignment, KnobAssignments, KnobParams,
};
use crate::values::FieldValues;
use g2_types::{AreaId, Slot};

/// What a knob or controller is bound to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KnobTarget {
    pub area: AreaId,
    pub module: u32,
    pub param: u32,
    pub led: bool,
}

fn area_of(field: impl Into<FieldId>, location: u32) -> Result<AreaId, FieldError> {
    AreaId::from_index(location).ok_or(FieldError::InvalidValue {
        field: field.into(),
        value: location,
    })
}

/// One of the patch knobs. Unassigned knobs carry no target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Knob {
    pub target: Option<KnobTarget>,
}

impl Knob {
    pub fn list(values: &FieldValues) -> Result<Vec<Knob>, FieldError> {
        let mut knobs = Vec::new();
        for knob in values.subfields(KnobAssignments::Knobs)? {
            let target = match knob.subfields(KnobAssignment::Params)?.first() {
                Some(params) => Some(KnobTarget {
                    area: area_of(KnobParams::Location, params.int(KnobParams::Location)?)?,
                    module: params.int(KnobParams::Index)?,
                    param: params.int(KnobParams::Param)?,
                    led: params.int(KnobParams::IsLed)? == 1,
                }),
                None => None,
            };
            knobs.push(Knob { target });
        }
        Ok(knobs)
    }
}

/// A performance knob, which may point into any slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlobalKnob {
    pub target: Option<(Slot, KnobTarget)>,
}

impl GlobalKnob {
    pub fn list(values: &FieldValues) -> Result<Vec<GlobalKnob>, FieldError> {
        let mut knobs = Vec::new();
        for knob in values.subfields(GlobalKnobAssignments::Knobs)? {
            let target = match knob.subfields(GlobalKnobAssignment::Params)?.first() {
                Some(params) => {
                    let slot_index = params.int(GlobalKnobParams::Slot)?;
                    let slot = Slot::from_index(slot_index as u8).ok_or(
                        FieldError::InvalidValue {
                            field: GlobalKnobParams::Slot.into(),
                            value: slot_index,
                        },
                    )?;
                    let location = params.int(GlobalKnobParams::Location)?;
                    Some((
                        slot,
                        KnobTarget {
                            area: area_of(GlobalKnobParams::Location, location)?,
                            module: params.int(GlobalKnobParams::Index)?,
                            param: params.int(GlobalKnobParams::Param)?,
                            led: params.int(GlobalKnobParams::IsLed)? == 1,
                        },
                    ))
                }
                None => None,
            };
            knobs.push(GlobalKnob { target });
        }
        Ok(knobs)
    }
}

/// A MIDI controller bound to a parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlAssignment {
    pub midi_cc: u32,
    pub area: AreaId,
    pub module: u32,
    pub param: u32,
}

impl ControlAssignment {
    pub fn list(values: &FieldValues) -> Result<Vec<ControlAssignment>, FieldError> {
        values
            .subfields(ControlAssignments::Assignments)?
            .iter()
            .map(|c| {
                let location = c.int(schema::ControlAssignment::Location)?;
                Ok(ControlAssignment {
                    midi_cc: c.int(schema::ControlAssignment::MidiCC)?,
                    area: area_of(schema::ControlAssignment::Location, location)?,
                    module: c.int(schema::ControlAssignment::Index)?,
                    param: c.int(schema::ControlAssignment::Param)?,
                })
            })
            .collect()
    }
}
