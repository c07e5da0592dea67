use crate::error::FieldError;
use crate::schema::PatchDescription;
use crate::values::FieldValues;
use enumset::{EnumSet, EnumSetType};
use strum::{EnumIter, IntoEnumIterator};

/// Cable colours that can be shown or hidden in a patch.
#[derive(Debug, EnumSetType, EnumIter)]
pub enum CableColour {
    Red,
    Blue,
    Yellow,
    Orange,
    Green,
    Purple,
    White,
}

impl CableColour {
    fn field(&self) -> PatchDescription {
        match self {
            CableColour::Red => PatchDescription::Red,
            CableColour::Blue => PatchDescription::Blue,
            CableColour::Yellow => PatchDescription::Yellow,
            CableColour::Orange => PatchDescription::Orange,
            CableColour::Green => PatchDescription::Green,
            CableColour::Purple => PatchDescription::Purple,
            CableColour::White => PatchDescription::White,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VoiceMode {
    Poly(u32),
    Mono,
    Legato,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchSettings {
    pub voices: u32,
    pub height: u32,
    pub visible_cables: EnumSet<CableColour>,
    pub mono_poly: u32,
    pub variation: u32,
    pub category: u32,
}

impl PatchSettings {
    pub fn voice_mode(&self) -> VoiceMode {
        match self.mono_poly {
            1 => VoiceMode::Mono,
            2 => VoiceMode::Legato,
            _ => VoiceMode::Poly(self.voices),
        }
    }
}

impl TryFrom<&FieldValues> for PatchSettings {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        let mut visible_cables = EnumSet::empty();
        for colour in CableColour::iter() {
            if values.bool_value(colour.field())? {
                visible_cables.insert(colour);
            }
        }

        Ok(Self {
            voices: values.int(PatchDescription::Voices)?,
            height: values.int(PatchDescription::Height)?,
            visible_cables,
            mono_poly: values.int(PatchDescription::MonoPoly)?,
            variation: values.int(PatchDescription::Variation)?,
            category: values.int(PatchDescription::Category)?,
        })
    }
}
