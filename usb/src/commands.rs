use g2_types::{AreaId, EntryType, Slot};

pub const CMD_REQUEST: u8 = 0x01;
pub const CMD_INIT: u8 = 0x80;

const CMD_REQ: u8 = 0x20;
const CMD_NO_RESP: u8 = 0x30;
const CMD_SLOT: u8 = 0x08;
const CMD_SYS: u8 = 0x0c;

/// Version byte used for system requests that do not address a performance.
pub const SYSTEM_VERSION: u8 = 0x41;

/// Who a request is addressed to, which decides the second and third header bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    System,
    Performance { version: u8 },
    Slot { slot: Slot, version: u8 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Init,
    VersionQuery(VersionId),
    StartStopCommunication { start: bool },
    SynthSettings,
    UnknownOne,
    PerformanceSettings,
    UnknownTwo,
    MasterClock,
    GlobalKnobs,
    AssignedVoices,
    ListEntries { entry_type: EntryType, bank: u8, entry: u8 },
    /// Loads a stored entry into a slot, or the whole performance for slot code 4.
    RetrieveEntry { slot_code: u8, bank: u8, entry: u8 },
    Patch,
    PatchName,
    CurrentNote,
    PatchText,
    ResourcesUsed(AreaId),
    UnknownSix,
    SelectedParam,
    SetParam(ParamSet),
    SelectParam { area: AreaId, module: u8, param: u8 },
}

/// The version counter being asked for: the performance, or one of the slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VersionId {
    Performance,
    Slot(Slot),
}

impl VersionId {
    pub fn id(&self) -> u8 {
        match self {
            VersionId::Performance => 4,
            VersionId::Slot(slot) => slot.index(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParamSet {
    pub area: AreaId,
    pub module: u8,
    pub param: u8,
    pub value: u8,
    pub variation: u8,
}

impl Command {
    /// The operation code and its arguments, without the header.
    pub fn body(&self) -> Vec<u8> {
        match self {
            Command::Init => vec![],
            Command::VersionQuery(id) => vec![0x35, id.id()],
            Command::StartStopCommunication { start } => vec![0x7d, u8::from(!start)],
            Command::SynthSettings => vec![0x02],
            Command::UnknownOne => vec![0x81],
            Command::PerformanceSettings => vec![0x10],
            Command::UnknownTwo => vec![0x59],
            Command::MasterClock => vec![0x3b],
            Command::GlobalKnobs => vec![0x5e],
            Command::AssignedVoices => vec![0x04],
            Command::ListEntries {
                entry_type,
                bank,
                entry,
            } => vec![0x14, *entry_type as u8, *bank, *entry],
            Command::RetrieveEntry {
                slot_code,
                bank,
                entry,
            } => vec![0x0a, *slot_code, *bank, *entry],
            Command::Patch => vec![0x3c],
            Command::PatchName => vec![0x28],
            Command::CurrentNote => vec![0x68],
            Command::PatchText => vec![0x6e],
            Command::ResourcesUsed(area) => vec![0x71, *area as u8],
            Command::UnknownSix => vec![0x70],
            Command::SelectedParam => vec![0x2e],
            Command::SetParam(set) => vec![
                0x40,
                set.area as u8,
                set.module,
                set.param,
                set.value,
                set.variation,
            ],
            Command::SelectParam {
                area,
                module,
                param,
            } => vec![0x2f, 0x00, *area as u8, *module, *param],
        }
    }

    /// Whether the G2 answers this command.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Command::SetParam(_) | Command::SelectParam { .. })
    }

    /// The full request payload for `target`, ready for bulk framing.
    pub fn payload(&self, target: Target) -> Vec<u8> {
        if *self == Command::Init {
            return vec![CMD_INIT];
        }

        let kind = if self.expects_response() {
            CMD_REQ
        } else {
            CMD_NO_RESP
        };
        let mut out = match target {
            Target::System => vec![CMD_REQUEST, kind | CMD_SYS, SYSTEM_VERSION],
            Target::Performance { version } => vec![CMD_REQUEST, kind | CMD_SYS, version],
            Target::Slot { slot, version } => {
                vec![CMD_REQUEST, kind | CMD_SLOT | slot.index(), version]
            }
        };
        out.extend(self.body());
        out
    }
}
