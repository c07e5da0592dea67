use crate::error::FieldError;
use crate::schema::{self, ModuleList, ModuleModes, ModuleNames};
use crate::values::FieldValues;

/// A module placed in one area of a patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserModule {
    pub type_id: u32,
    pub index: u32,
    pub column: u32,
    pub row: u32,
    pub colour: u32,
    pub uprate: bool,
    pub leds: bool,
    pub modes: Vec<u32>,
}

impl TryFrom<&FieldValues> for UserModule {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        let modes = values
            .subfields(schema::UserModule::Modes)?
            .iter()
            .map(|m| m.int(ModuleModes::Data))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            type_id: values.int(schema::UserModule::Id)?,
            index: values.int(schema::UserModule::Index)?,
            column: values.int(schema::UserModule::Column)?,
            row: values.int(schema::UserModule::Row)?,
            colour: values.int(schema::UserModule::Color)?,
            uprate: values.bool_value(schema::UserModule::Uprate)?,
            leds: values.bool_value(schema::UserModule::Leds)?,
            modes,
        })
    }
}

impl UserModule {
    pub fn list(values: &FieldValues) -> Result<Vec<UserModule>, FieldError> {
        values
            .subfields(ModuleList::Modules)?
            .iter()
            .map(UserModule::try_from)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleName {
    pub module: u32,
    pub name: String,
}

impl ModuleName {
    pub fn list(values: &FieldValues) -> Result<Vec<ModuleName>, FieldError> {
        values
            .subfields(ModuleNames::Names)?
            .iter()
            .map(|n| {
                Ok(ModuleName {
                    module: n.int(schema::ModuleName::ModuleIndex)?,
                    name: n.string(schema::ModuleName::Name)?.to_string(),
                })
            })
            .collect()
    }
}
