//! Folds messages from the G2 into the device state. Answers to bring-up requests and messages
//! the synth sends on its own both come through here.

use crate::device::DeviceState;
use byteorder::ReadBytesExt;
use g2_protocol::bits::BitBuffer;
use g2_protocol::bytes::{expect_warn, read_short, remaining};
use g2_protocol::components::ParamChange;
use g2_protocol::dump::dump_hex;
use g2_protocol::entries::EntryList;
use g2_protocol::{schema, EntryError, FieldError, PatchError, Section, SectionError};
use g2_types::Slot;
use g2_usb::commands::{CMD_INIT, CMD_REQUEST};
use g2_usb::UsbMessage;
use log::{debug, info, warn};
use std::io::Cursor;
use thiserror::Error;

/// Second byte of a performance or system message.
pub const HEADER_SYSTEM: u8 = 0x0c;

/// Second byte of a performance message the synth sends after a change on its panel.
pub const HEADER_PERFORMANCE: u8 = 0x04;

/// Offset added to a slot index in the second byte of a slot message.
pub const HEADER_SLOT: u8 = 0x08;

/// Version byte marking a version announcement.
pub const VERSION_MESSAGE: u8 = 0x40;

pub const VERSION_SINGLE: u8 = 0x36;
pub const VERSION_LIST: u8 = 0x1f;

pub const PERFORMANCE_VERSION_ID: u8 = 4;

// Performance message types
pub const T_OK: u8 = 0x7f;
pub const T_SYNTH_SETTINGS: u8 = 0x03;
pub const T_PERFORMANCE_INIT: u8 = 0x80;
pub const T_PERFORMANCE_NAME: u8 = 0x29;
pub const T_RESERVED_1E: u8 = 0x1e;
pub const T_MASTER_CLOCK: u8 = 0x5d;
pub const T_GLOBAL_KNOBS: u8 = 0x5f;
pub const T_ASSIGNED_VOICES: u8 = 0x05;
pub const T_ENTRY_LIST: u8 = 0x13;

// Slot message types
pub const T_PATCH_DESCRIPTION: u8 = 0x21;
pub const T_PATCH_NAME: u8 = 0x27;
pub const T_CURRENT_NOTE: u8 = 0x69;
pub const T_TEXT_PAD: u8 = 0x6f;
pub const T_PATCH_LOAD_DATA: u8 = 0x72;
pub const T_SELECTED_PARAM: u8 = 0x2f;
pub const T_VOLUME_DATA: u8 = 0x3a;
pub const T_LED_DATA: u8 = 0x39;
pub const T_PARAM_UPDATE: u8 = 0x40;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Truncated message: {0}")]
    Truncated(#[from] std::io::Error),

    #[error("Invalid patch data: {0}")]
    Patch(#[from] PatchError),

    #[error("Invalid section: {0}")]
    Section(#[from] SectionError),

    #[error("Invalid field data: {0}")]
    Field(#[from] FieldError),

    #[error("Invalid entry list: {0}")]
    Entries(#[from] EntryError),
}

/// Decodes `message` into `state`. Returns false for a message that was understood to be
/// something this does not handle, and an error for one that could not be decoded.
pub fn dispatch(state: &mut DeviceState, message: &UsbMessage) -> Result<bool, DispatchError> {
    let mut cursor = Cursor::new(message.body());
    let result = match cursor.read_u8()? {
        CMD_REQUEST => dispatch_cmd(state, &mut cursor),
        CMD_INIT => success("System Init"),
        code => failure(format!("unrecognized response code: {code:02x}")),
    };

    if !matches!(result, Ok(true)) {
        debug!("Failed to dispatch:\n{}", dump_hex(message.body()));
    }
    result
}

fn success(message: &str) -> Result<bool, DispatchError> {
    info!("{}", message);
    Ok(true)
}

fn failure(message: String) -> Result<bool, DispatchError> {
    warn!("dispatch: {}", message);
    Ok(false)
}

fn dispatch_cmd(state: &mut DeviceState, cursor: &mut Cursor<&[u8]>) -> Result<bool, DispatchError> {
    let header = cursor.read_u8()?;
    match header {
        HEADER_SYSTEM => {
            let version = cursor.read_u8()?;
            if version == VERSION_MESSAGE {
                dispatch_version(state, cursor)
            } else if version == state.performance.version() {
                dispatch_performance(state, cursor)
            } else {
                failure(format!("unrecognized perf or sys version: {version}"))
            }
        }
        HEADER_PERFORMANCE => {
            let version = cursor.read_u8()?;
            if version == VERSION_MESSAGE {
                // Sent when a performance is loaded from the panel.
                dispatch_version(state, cursor)
            } else {
                if version != state.performance.version() {
                    warn!("Received different perf version, updating: {}", version);
                    state.performance.set_version(version);
                }
                dispatch_performance(state, cursor)
            }
        }
        0x00..=0x03 | 0x08..=0x0b => match Slot::from_index(header & 0x03) {
            Some(slot) => dispatch_slot(state, slot, cursor),
            None => failure(format!("unrecognized header: {header:02x}")),
        },
        _ => failure(format!("unrecognized header: {header:02x}")),
    }
}

fn dispatch_performance(
    state: &mut DeviceState,
    cursor: &mut Cursor<&[u8]>,
) -> Result<bool, DispatchError> {
    match cursor.read_u8()? {
        T_OK => success("OK"),
        T_SYNTH_SETTINGS => {
            let mut bb = BitBuffer::from(remaining(cursor));
            state.synth_settings = Some(schema::SynthSettings::fields().read(&mut bb)?);
            success("Synth settings")
        }
        T_PERFORMANCE_INIT => success("Perf Init"),
        T_PERFORMANCE_NAME => {
            state
                .performance
                .read_name_and_settings(remaining(cursor))?;
            Ok(true)
        }
        T_RESERVED_1E => success("reserved 1e"),
        T_MASTER_CLOCK => {
            cursor.read_u8()?;
            let clock = read_short(cursor)?;
            state.master_clock = Some(clock);
            success(&format!("Master clock: {clock}"))
        }
        T_GLOBAL_KNOBS => {
            back_up(cursor);
            let values = Section::GlobalKnobAssignments.read(cursor)?;
            state.performance.set_global_knobs(values)?;
            success("Global knob assignments")
        }
        T_ASSIGNED_VOICES => {
            state.performance.read_assigned_voices(remaining(cursor))?;
            Ok(true)
        }
        T_ENTRY_LIST => {
            let list = EntryList::parse(remaining(cursor))?;
            state.entries[list.entry_type].merge(&list);
            let done = list.done;
            state.entry_list = Some(list);
            success(&format!("Entry list, done: {done}"))
        }
        kind => failure(format!("unrecognized perf type: {kind:02x}")),
    }
}

fn dispatch_slot(
    state: &mut DeviceState,
    slot: Slot,
    cursor: &mut Cursor<&[u8]>,
) -> Result<bool, DispatchError> {
    let patch = state.performance.patch_mut(slot);
    let version = expect_warn(
        cursor,
        patch.version(),
        "usb",
        &format!("patch version for slot {slot}"),
    )?;
    if version != patch.version() {
        patch.set_version(version);
    }

    match cursor.read_u8()? {
        T_PATCH_DESCRIPTION => {
            back_up(cursor);
            patch.read_message_sections(cursor)?;
            Ok(true)
        }
        T_PATCH_NAME => {
            patch.read_name(remaining(cursor))?;
            success(&format!("{slot}: patch name"))
        }
        T_CURRENT_NOTE => {
            back_up(cursor);
            patch.read_section(Section::CurrentNote, cursor)?;
            success(&format!("{slot}: current note"))
        }
        T_TEXT_PAD => {
            back_up(cursor);
            patch.read_section(Section::TextPad, cursor)?;
            success(&format!("{slot}: text pad"))
        }
        T_PATCH_LOAD_DATA => {
            patch.read_load_data(remaining(cursor))?;
            Ok(true)
        }
        T_OK => success("OK"),
        T_SELECTED_PARAM => {
            patch.read_selected_param(remaining(cursor))?;
            success(&format!("{slot}: selected param"))
        }
        T_VOLUME_DATA => {
            patch.set_volume_data(remaining(cursor));
            debug!("{}: volume data", slot);
            Ok(true)
        }
        T_LED_DATA => {
            patch.set_led_data(remaining(cursor));
            debug!("{}: led data", slot);
            Ok(true)
        }
        T_PARAM_UPDATE => {
            let mut bb = BitBuffer::from(remaining(cursor));
            let values = schema::ParamUpdate::fields().read(&mut bb)?;
            let change = ParamChange::try_from(&values)?;
            patch.apply_param_change(&change)?;
            debug!("{}: param update {:?}", slot, change);
            Ok(true)
        }
        kind => failure(format!("unrecognized slot type: {kind:02x}")),
    }
}

fn dispatch_version(
    state: &mut DeviceState,
    cursor: &mut Cursor<&[u8]>,
) -> Result<bool, DispatchError> {
    match cursor.read_u8()? {
        VERSION_SINGLE => {
            let id = cursor.read_u8()?;
            let version = cursor.read_u8()?;
            if id == PERFORMANCE_VERSION_ID {
                state.performance.set_version(version);
                Ok(true)
            } else if let Some(slot) = Slot::from_index(id) {
                state.performance.patch_mut(slot).set_version(version);
                Ok(true)
            } else {
                failure(format!("unrecognized version id {id}"))
            }
        }
        VERSION_LIST => {
            let version = cursor.read_u8()?;
            state.performance.set_version(version);
            while remaining(cursor).len() > 2 && cursor.read_u8()? == VERSION_SINGLE {
                let id = cursor.read_u8()?;
                let version = cursor.read_u8()?;
                match Slot::from_index(id) {
                    Some(slot) => state.performance.patch_mut(slot).set_version(version),
                    None => warn!("Version list names unknown slot {}", id),
                }
            }
            Ok(true)
        }
        kind => failure(format!("unrecognized version subcommand: {kind:02x}")),
    }
}

/// Steps back onto the type byte, for sections that are read with their frame.
fn back_up(cursor: &mut Cursor<&[u8]>) {
    cursor.set_position(cursor.position().saturating_sub(1));
}
