use crate::error::FieldError;
use crate::schema::{self, MorphLabels, ParamLabel, ParamLabels};
use crate::values::FieldValues;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MorphLabel {
    pub index: u32,
    pub label: String,
}

impl MorphLabel {
    pub fn list(values: &FieldValues) -> Result<Vec<MorphLabel>, FieldError> {
        values
            .subfields(MorphLabels::Labels)?
            .iter()
            .map(|l| {
                Ok(MorphLabel {
                    index: l.int(schema::MorphLabel::Index)?,
                    label: l.string(schema::MorphLabel::Label)?.to_string(),
                })
            })
            .collect()
    }
}

/// Custom parameter labels for one module, keyed by parameter index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleLabels {
    pub module: u32,
    pub params: BTreeMap<u32, Vec<String>>,
}

impl ModuleLabels {
    pub fn list(values: &FieldValues) -> Result<Vec<ModuleLabels>, FieldError> {
        let mut modules = Vec::new();
        for module in values.subfields(schema::ModuleLabels::ModLabels)? {
            let mut params = BTreeMap::new();
            for entry in module.subfields(schema::ModuleLabel::Labels)? {
                let labels = entry
                    .subfields(ParamLabels::Labels)?
                    .iter()
                    .map(|l| l.string(ParamLabel::Label).map(str::to_string))
                    .collect::<Result<_, _>>()?;
                params.insert(entry.int(ParamLabels::ParamIndex)?, labels);
            }
            modules.push(ModuleLabels {
                module: module.int(schema::ModuleLabel::ModuleIndex)?,
                params,
            });
        }
        Ok(modules)
    }
}
