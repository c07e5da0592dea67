use crate::error::FieldError;
use crate::schema::{self, CableList};
use crate::values::FieldValues;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cable {
    pub colour: u32,
    pub source_module: u32,
    pub source_connector: u32,
    /// Output to input when set, otherwise input to input.
    pub from_output: bool,
    pub dest_module: u32,
    pub dest_connector: u32,
}

impl TryFrom<&FieldValues> for Cable {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        Ok(Self {
            colour: values.int(schema::Cable::Color)?,
            source_module: values.int(schema::Cable::SrcModule)?,
            source_connector: values.int(schema::Cable::SrcConn)?,
            from_output: values.bool_value(schema::Cable::Direction)?,
            dest_module: values.int(schema::Cable::DestModule)?,
            dest_connector: values.int(schema::Cable::DestConn)?,
        })
    }
}

impl Cable {
    pub fn list(values: &FieldValues) -> Result<Vec<Cable>, FieldError> {
        values
            .subfields(CableList::Cables)?
            .iter()
            .map(Cable::try_from)
            .collect()
    }
}
