use crate::error::FieldError;
use crate::schema::{self, NoteData};
use crate::values::FieldValues;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub note: u32,
    pub attack: u32,
    pub release: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentNote {
    pub last: Note,
    pub notes: Vec<Note>,
}

impl TryFrom<&FieldValues> for CurrentNote {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        let notes = values
            .subfields(schema::CurrentNote::Notes)?
            .iter()
            .map(|n| {
                Ok(Note {
                    note: n.int(NoteData::Note)?,
                    attack: n.int(NoteData::Attack)?,
                    release: n.int(NoteData::Release)?,
                })
            })
            .collect::<Result<_, FieldError>>()?;

        Ok(Self {
            last: Note {
                note: values.int(schema::CurrentNote::Note)?,
                attack: values.int(schema::CurrentNote::Attack)?,
                release: values.int(schema::CurrentNote::Release)?,
            },
            notes,
        })
    }
}
