use crate::error::FieldError;
use crate::schema::{MorphParameters, VarMorph, VarMorphParam};
use crate::values::FieldValues;
use g2_types::AreaId;

/// A parameter driven by one of the eight morph groups.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MorphAssignment {
    pub area: Option<AreaId>,
    pub module: u32,
    pub param: u32,
    pub morph: u32,
    pub range: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariationMorphs {
    pub variation: u32,
    pub assignments: Vec<MorphAssignment>,
}

impl VariationMorphs {
    pub fn list(values: &FieldValues) -> Result<Vec<VariationMorphs>, FieldError> {
        let mut variations = Vec::new();
        for var in values.subfields(MorphParameters::VarMorphs)? {
            let mut assignments = Vec::new();
            for param in var.subfields(VarMorph::VarMorphParams)? {
                assignments.push(MorphAssignment {
                    area: AreaId::from_index(param.int(VarMorphParam::Location)?),
                    module: param.int(VarMorphParam::ModuleIndex)?,
                    param: param.int(VarMorphParam::ParamIndex)?,
                    morph: param.int(VarMorphParam::Morph)?,
                    range: param.int(VarMorphParam::Range)?,
                });
            }
            variations.push(VariationMorphs {
                variation: var.int(VarMorph::Variation)?,
                assignments,
            });
        }
        Ok(variations)
    }
}
