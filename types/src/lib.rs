#[cfg(feature = "clap")]
use clap::ValueEnum;
use enum_map::Enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString};

/// One of the four performance slots on the synth.
#[derive(
    Copy, Clone, Debug, Display, EnumIter, EnumCount, EnumString, Enum, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Slot {
    A,
    B,
    C,
    D,
}

impl Slot {
    pub fn index(&self) -> u8 {
        match self {
            Slot::A => 0,
            Slot::B => 1,
            Slot::C => 2,
            Slot::D => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Slot> {
        match index {
            0 => Some(Slot::A),
            1 => Some(Slot::B),
            2 => Some(Slot::C),
            3 => Some(Slot::D),
            _ => None,
        }
    }

    /// Messages address a slot either by its raw index or offset by 8.
    pub fn matches_id(&self, id: u8) -> bool {
        id == self.index() || id == self.index() + 8
    }
}

/// A patch is split into the voice area, the fx area, and the patch settings pseudo-area.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, Enum, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AreaId {
    Fx = 0,
    Voice = 1,
    Settings = 2,
}

impl AreaId {
    pub fn from_index(index: u32) -> Option<AreaId> {
        match index {
            0 => Some(AreaId::Fx),
            1 => Some(AreaId::Voice),
            2 => Some(AreaId::Settings),
            _ => None,
        }
    }
}

/// Kind of entry stored in the synth's memory banks.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumString, Enum, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(ascii_case_insensitive)]
pub enum EntryType {
    Patch = 0,
    Perf = 1,
}

impl EntryType {
    pub fn from_index(index: u32) -> Option<EntryType> {
        match index {
            0 => Some(EntryType::Patch),
            1 => Some(EntryType::Perf),
            _ => None,
        }
    }
}
