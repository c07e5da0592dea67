use crate::error::FieldError;
use crate::schema::{self, Data7, ModuleParamSet, VarParams};
use crate::values::FieldValues;
use g2_types::AreaId;
use std::collections::BTreeMap;

/// Parameter values of every module in one area, per variation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleParams {
    pub variation_count: u32,

    /// Module index to `values[variation][param]`.
    pub modules: BTreeMap<u32, Vec<Vec<u32>>>,
}

impl ModuleParams {
    pub fn value(&self, module: u32, variation: usize, param: usize) -> Option<u32> {
        self.modules.get(&module)?.get(variation)?.get(param).copied()
    }
}

impl TryFrom<&FieldValues> for ModuleParams {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        let mut modules = BTreeMap::new();
        for set in values.subfields(schema::ModuleParams::ParamSet)? {
            let mut variations = Vec::new();
            for variation in set.subfields(ModuleParamSet::ModParams)? {
                let params = variation
                    .subfields(VarParams::Params)?
                    .iter()
                    .map(|p| p.int(Data7::Datum))
                    .collect::<Result<Vec<_>, _>>()?;
                variations.push(params);
            }
            modules.insert(set.int(ModuleParamSet::ModIndex)?, variations);
        }

        Ok(Self {
            variation_count: values.int(schema::ModuleParams::VariationCount)?,
            modules,
        })
    }
}

/// A single parameter change, as pushed by the synth when a knob moves.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParamChange {
    pub area: AreaId,
    pub module: u32,
    pub param: u32,
    pub value: u32,
    pub variation: u32,
}

impl TryFrom<&FieldValues> for ParamChange {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        let location = values.int(schema::ParamUpdate::Location)?;
        let area = AreaId::from_index(location).ok_or(FieldError::InvalidValue {
            field: schema::ParamUpdate::Location.into(),
            value: location,
        })?;

        Ok(Self {
            area,
            module: values.int(schema::ParamUpdate::Module)?,
            param: values.int(schema::ParamUpdate::Param)?,
            value: values.int(schema::ParamUpdate::Value)?,
            variation: values.int(schema::ParamUpdate::Variation)?,
        })
    }
}
