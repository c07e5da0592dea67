//! The handshake that reads a G2's state after it connects. Each step registers for the answer
//! it expects, sends its request, then folds the answer into the state.

use crate::device::DeviceState;
use crate::dispatch::{
    dispatch, DispatchError, HEADER_SLOT, HEADER_SYSTEM, PERFORMANCE_VERSION_ID, T_ASSIGNED_VOICES,
    T_CURRENT_NOTE, T_ENTRY_LIST, T_GLOBAL_KNOBS, T_MASTER_CLOCK, T_OK, T_PATCH_DESCRIPTION,
    T_PATCH_LOAD_DATA, T_PATCH_NAME, T_PERFORMANCE_INIT, T_PERFORMANCE_NAME, T_RESERVED_1E,
    T_SELECTED_PARAM, T_SYNTH_SETTINGS, T_TEXT_PAD, VERSION_MESSAGE, VERSION_SINGLE,
};
use g2_protocol::Performance;
use g2_types::{AreaId, EntryType, Slot};
use g2_usb::broker::header;
use g2_usb::commands::{Command, Target, VersionId, CMD_INIT, CMD_REQUEST};
use g2_usb::error::CommandError;
use g2_usb::{G2Connection, Matcher, UsbMessage};
use log::{debug, info};
use std::time::Duration;
use strum::{Display, IntoEnumIterator};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum Step {
    Init,
    PerformanceVersion,
    StopCommunication,
    SynthSettings,
    UnknownOne,
    PerformanceSettings,
    UnknownTwo,
    MasterClock,
    GlobalKnobs,
    SlotVersion,
    Patch,
    PatchName,
    CurrentNote,
    PatchText,
    ResourcesVoice,
    ResourcesFx,
    UnknownSix,
    SelectedParam,
    AssignedVoices,
    ListEntries,
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error("The G2 is not connected")]
    Offline,

    #[error("{0}")]
    Command(#[from] CommandError),

    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    #[error("Response was not understood")]
    NotUnderstood,

    #[error("Version mismatch, expected {expected} but the G2 answered with {found}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("Listing continues past bank {bank} entry {entry}")]
    OutOfRange { bank: u32, entry: u32 },
}

#[derive(Error, Debug)]
#[error("{step}{} failed: {source}", for_slot(.slot))]
pub struct BringUpError {
    pub step: Step,
    pub slot: Option<Slot>,
    #[source]
    pub source: StepError,
}

impl BringUpError {
    pub fn offline() -> Self {
        Self {
            step: Step::Init,
            slot: None,
            source: StepError::Offline,
        }
    }
}

fn for_slot(slot: &Option<Slot>) -> String {
    slot.map(|slot| format!(" for slot {slot}"))
        .unwrap_or_default()
}

#[derive(Copy, Clone)]
enum Addressed {
    System,
    Performance,
}

/// Requests made before the slots are read, with the type of the answer each expects.
const PERFORMANCE_STEPS: [(Step, Command, Addressed, u8); 7] = [
    (
        Step::StopCommunication,
        Command::StartStopCommunication { start: false },
        Addressed::System,
        T_OK,
    ),
    (Step::SynthSettings, Command::SynthSettings, Addressed::System, T_SYNTH_SETTINGS),
    (Step::UnknownOne, Command::UnknownOne, Addressed::System, T_PERFORMANCE_INIT),
    (
        Step::PerformanceSettings,
        Command::PerformanceSettings,
        Addressed::Performance,
        T_PERFORMANCE_NAME,
    ),
    (Step::UnknownTwo, Command::UnknownTwo, Addressed::Performance, T_RESERVED_1E),
    (Step::MasterClock, Command::MasterClock, Addressed::System, T_MASTER_CLOCK),
    (Step::GlobalKnobs, Command::GlobalKnobs, Addressed::Performance, T_GLOBAL_KNOBS),
];

/// Requests made for each slot once its version is known.
const SLOT_STEPS: [(Step, Command, u8); 8] = [
    (Step::Patch, Command::Patch, T_PATCH_DESCRIPTION),
    (Step::PatchName, Command::PatchName, T_PATCH_NAME),
    (Step::CurrentNote, Command::CurrentNote, T_CURRENT_NOTE),
    (Step::PatchText, Command::PatchText, T_TEXT_PAD),
    (
        Step::ResourcesVoice,
        Command::ResourcesUsed(AreaId::Voice),
        T_PATCH_LOAD_DATA,
    ),
    (Step::ResourcesFx, Command::ResourcesUsed(AreaId::Fx), T_PATCH_LOAD_DATA),
    (Step::UnknownSix, Command::UnknownSix, T_OK),
    (Step::SelectedParam, Command::SelectedParam, T_SELECTED_PARAM),
];

struct BringUp<'a> {
    connection: &'a G2Connection,
    state: &'a mut DeviceState,
    timeout: Duration,
}

impl BringUp<'_> {
    /// Sends one request, then folds its answer into the state.
    async fn exchange(
        &mut self,
        step: Step,
        slot: Option<Slot>,
        command: Command,
        target: Target,
        matcher: Matcher,
    ) -> Result<UsbMessage, BringUpError> {
        let fail = |source: StepError| BringUpError { step, slot, source };
        let name = match slot {
            Some(slot) => format!("{step} {slot}"),
            None => step.to_string(),
        };

        let message = self
            .connection
            .request(&name, command, target, matcher, self.timeout)
            .await
            .map_err(|e| fail(e.into()))?;

        // The version a slot answers with must be the one it was asked with.
        if let (Some(_), Target::Slot { version, .. }) = (slot, target) {
            let found = message.body().get(2).copied().unwrap_or_default();
            if found != version {
                return Err(fail(StepError::VersionMismatch {
                    expected: version,
                    found,
                }));
            }
        }

        match dispatch(self.state, &message) {
            Ok(true) => Ok(message),
            Ok(false) => Err(fail(StepError::NotUnderstood)),
            Err(e) => Err(fail(e.into())),
        }
    }

    fn performance_version(&self) -> u8 {
        self.state.performance.version()
    }

    async fn performance_steps(&mut self) -> Result<(), BringUpError> {
        for (step, command, addressed, kind) in PERFORMANCE_STEPS {
            let version = self.performance_version();
            let target = match addressed {
                Addressed::System => Target::System,
                Addressed::Performance => Target::Performance { version },
            };
            let matcher = header(&[CMD_REQUEST, HEADER_SYSTEM, version, kind]);
            self.exchange(step, None, command, target, matcher).await?;
        }
        Ok(())
    }

    async fn read_slot(&mut self, slot: Slot) -> Result<(), BringUpError> {
        self.exchange(
            Step::SlotVersion,
            Some(slot),
            Command::VersionQuery(VersionId::Slot(slot)),
            Target::System,
            header(&[
                CMD_REQUEST,
                HEADER_SYSTEM,
                VERSION_MESSAGE,
                VERSION_SINGLE,
                slot.index(),
            ]),
        )
        .await?;

        let version = self.state.performance.patch(slot).version();
        debug!("Reading slot {} at version {}", slot, version);
        for (step, command, kind) in SLOT_STEPS {
            self.exchange(
                step,
                Some(slot),
                command,
                Target::Slot { slot, version },
                slot_answer(slot, kind),
            )
            .await?;
        }
        Ok(())
    }
}

/// Matches a slot message by its slot and type, leaving the version to be checked after.
fn slot_answer(slot: Slot, kind: u8) -> Matcher {
    let id = slot.index() + HEADER_SLOT;
    Box::new(move |message: &UsbMessage| {
        let body = message.body();
        body.len() > 3 && body[0] == CMD_REQUEST && body[1] == id && body[3] == kind
    })
}

/// Runs the whole handshake against a freshly connected G2. Stops at the first step that
/// fails, keeping what was read up to that point.
pub async fn run(
    connection: &G2Connection,
    state: &mut DeviceState,
    timeout: Duration,
) -> Result<(), BringUpError> {
    state.performance = Performance::default();
    let mut bring_up = BringUp {
        connection,
        state,
        timeout,
    };

    info!("Initializing G2");
    bring_up
        .exchange(Step::Init, None, Command::Init, Target::System, header(&[CMD_INIT]))
        .await?;

    bring_up
        .exchange(
            Step::PerformanceVersion,
            None,
            Command::VersionQuery(VersionId::Performance),
            Target::System,
            header(&[
                CMD_REQUEST,
                HEADER_SYSTEM,
                VERSION_MESSAGE,
                VERSION_SINGLE,
                PERFORMANCE_VERSION_ID,
            ]),
        )
        .await?;

    bring_up.performance_steps().await?;
    for slot in Slot::iter() {
        bring_up.read_slot(slot).await?;
    }

    let version = bring_up.performance_version();
    bring_up
        .exchange(
            Step::AssignedVoices,
            None,
            Command::AssignedVoices,
            Target::System,
            header(&[CMD_REQUEST, HEADER_SYSTEM, version, T_ASSIGNED_VOICES]),
        )
        .await?;
    Ok(())
}

/// Reads the bank listing for `entry_type`, one request per page, replacing what was held.
pub async fn read_entries(
    connection: &G2Connection,
    state: &mut DeviceState,
    entry_type: EntryType,
    timeout: Duration,
) -> Result<(), BringUpError> {
    state.entries[entry_type] = Default::default();
    let mut bring_up = BringUp {
        connection,
        state,
        timeout,
    };

    let fail = |source: StepError| BringUpError {
        step: Step::ListEntries,
        slot: None,
        source,
    };

    let (mut bank, mut entry) = (0_u32, 0_u32);
    loop {
        let (Ok(bank_byte), Ok(entry_byte)) = (u8::try_from(bank), u8::try_from(entry)) else {
            return Err(fail(StepError::OutOfRange { bank, entry }));
        };
        debug!("Requesting {} entries from bank {} entry {}", entry_type, bank, entry);

        let matcher: Matcher = Box::new(|message: &UsbMessage| {
            let body = message.body();
            body.len() > 3
                && body[0] == CMD_REQUEST
                && body[1] == HEADER_SYSTEM
                && body[3] == T_ENTRY_LIST
        });
        bring_up
            .exchange(
                Step::ListEntries,
                None,
                Command::ListEntries {
                    entry_type,
                    bank: bank_byte,
                    entry: entry_byte,
                },
                Target::System,
                matcher,
            )
            .await?;

        let next = bring_up
            .state
            .entry_list
            .as_ref()
            .and_then(|list| list.next_position());
        match next {
            Some(position) if position != (bank, entry) => (bank, entry) = position,
            Some(position) => {
                return Err(fail(StepError::OutOfRange {
                    bank: position.0,
                    entry: position.1,
                }))
            }
            None => break,
        }
    }

    info!(
        "Read {} {} entries",
        bring_up.state.entries[entry_type].len(),
        entry_type
    );
    Ok(())
}

/// Asks the G2 to stop sending unsolicited messages, as done before disconnecting.
pub async fn stop_communication(
    connection: &G2Connection,
    timeout: Duration,
) -> Result<UsbMessage, CommandError> {
    connection
        .request(
            "stop communication",
            Command::StartStopCommunication { start: false },
            Target::System,
            Box::new(|message: &UsbMessage| {
                let body = message.body();
                body.len() > 3
                    && body[0] == CMD_REQUEST
                    && body[1] == HEADER_SYSTEM
                    && body[3] == T_OK
            }),
            timeout,
        )
        .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use g2_protocol::{Patch, Section};
    use g2_usb::device::scripted::ScriptedTransport;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);
    const PERF_VERSION: u8 = 2;

    fn slot_version(slot: Slot) -> u8 {
        slot.index() + 5
    }

    fn system(body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x01, 0x2c, 0x41];
        out.extend(body);
        out
    }

    fn perf(body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x01, 0x2c, PERF_VERSION];
        out.extend(body);
        out
    }

    fn perf_answer(body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x01, 0x0c, PERF_VERSION];
        out.extend(body);
        out
    }

    fn slot_request(slot: Slot, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x01, 0x28 | slot.index(), slot_version(slot)];
        out.extend(body);
        out
    }

    fn slot_answer(slot: Slot, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x01, 0x08 + slot.index(), slot_version(slot)];
        out.extend(body);
        out
    }

    /// Scripts a bring-up up to the assigned voices request, reading only `slots`.
    pub(crate) fn script_bring_up(transport: &ScriptedTransport, slots: &[Slot]) {
        let source = Performance::init().unwrap();

        transport.on_request(&[0x80], vec![vec![0x80]]);
        transport.on_request(
            &system(&[0x35, 0x04]),
            vec![vec![0x01, 0x0c, 0x40, 0x36, 0x04, PERF_VERSION]],
        );
        transport.on_request(&system(&[0x7d, 0x01]), vec![perf_answer(&[0x7f])]);

        let synth = g2_protocol::components::SynthSettings::offline_defaults()
            .unwrap()
            .to_bytes()
            .unwrap();
        let mut answer = perf_answer(&[0x03]);
        answer.extend(synth);
        transport.on_request(&system(&[0x02]), vec![answer]);

        transport.on_request(&system(&[0x81]), vec![perf_answer(&[0x80])]);

        let mut answer = perf_answer(&[0x29]);
        answer.extend(b"Live Set\0");
        Section::PerformanceSettings
            .write(source.settings_values().unwrap(), &mut answer)
            .unwrap();
        transport.on_request(&perf(&[0x10]), vec![answer]);

        transport.on_request(&perf(&[0x59]), vec![perf_answer(&[0x1e])]);
        transport.on_request(
            &system(&[0x3b]),
            vec![perf_answer(&[0x5d, 0x00, 0x00, 0x78])],
        );

        let mut answer = perf_answer(&[]);
        Section::GlobalKnobAssignments
            .write(source.global_knobs_values().unwrap(), &mut answer)
            .unwrap();
        transport.on_request(&perf(&[0x5e]), vec![answer]);

        for slot in slots.iter().copied() {
            script_slot(transport, slot);
        }
    }

    fn script_slot(transport: &ScriptedTransport, slot: Slot) {
        let mut source = Patch::init(slot).unwrap();
        source.set_version(slot_version(slot));
        source.set_text(&format!("Slot {slot}")).unwrap();

        transport.on_request(
            &system(&[0x35, slot.index()]),
            vec![vec![0x01, 0x0c, 0x40, 0x36, slot.index(), slot_version(slot)]],
        );

        let mut description = source.write_message().unwrap();
        description.truncate(description.len() - 2);
        transport.on_request(&slot_request(slot, &[0x3c]), vec![description]);

        let mut name = vec![0x27];
        name.extend(format!("Patch {slot}").bytes());
        name.push(0x00);
        transport.on_request(&slot_request(slot, &[0x28]), vec![slot_answer(slot, &name)]);

        for (request, section) in [(0x68, Section::CurrentNote), (0x6e, Section::TextPad)] {
            let mut answer = slot_answer(slot, &[]);
            source.write_section(section, &mut answer).unwrap();
            transport.on_request(&slot_request(slot, &[request]), vec![answer]);
        }

        for area in [AreaId::Voice, AreaId::Fx] {
            let mut load = vec![0x72, area as u8];
            load.extend([0; 27]);
            transport.on_request(
                &slot_request(slot, &[0x71, area as u8]),
                vec![slot_answer(slot, &load)],
            );
        }

        transport.on_request(&slot_request(slot, &[0x70]), vec![slot_answer(slot, &[0x7f, 0x00])]);
        transport.on_request(
            &slot_request(slot, &[0x2e]),
            vec![slot_answer(slot, &[0x2f, 0x00, 0x01, 0x02, 0x00])],
        );
    }

    pub(crate) fn script_assigned_voices(transport: &ScriptedTransport) {
        transport.on_request(&system(&[0x04]), vec![perf_answer(&[0x05, 1, 2, 3, 4])]);
    }

    fn connect(transport: &Arc<ScriptedTransport>) -> G2Connection {
        let (sender, _) = mpsc::unbounded_channel();
        let mut connection = G2Connection::new(transport.clone());
        connection.start(sender).unwrap();
        connection
    }

    #[tokio::test]
    async fn full_bring_up() {
        let transport = Arc::new(ScriptedTransport::new());
        script_bring_up(&transport, &[Slot::A, Slot::B, Slot::C, Slot::D]);
        script_assigned_voices(&transport);
        let connection = connect(&transport);

        let mut state = DeviceState::new(Performance::default());
        run(&connection, &mut state, WAIT).await.unwrap();

        assert_eq!(transport.remaining_exchanges(), 0);
        assert!(transport.unexpected().is_empty());

        let performance = &state.performance;
        assert_eq!(performance.version(), PERF_VERSION);
        assert_eq!(performance.name(), "Live Set");
        assert!(performance.settings().unwrap().is_some());
        assert!(performance.global_knobs_values().is_some());
        assert_eq!(state.master_clock, Some(120));
        assert_eq!(
            state.synth_settings().unwrap().unwrap().device_name,
            "[offline]"
        );

        for slot in Slot::iter() {
            let patch = performance.patch(slot);
            assert_eq!(patch.version(), slot_version(slot));
            assert_eq!(patch.name(), Some(format!("Patch {slot}").as_str()));
            assert_eq!(patch.text(), Some(format!("Slot {slot}").as_str()));
            assert!(patch.section(Section::ModuleList1).is_some());
            assert!(patch.load_data(AreaId::Voice).is_some());
            assert!(patch.load_data(AreaId::Fx).is_some());
            assert_eq!(patch.selected_param().unwrap().unwrap().module, 2);
            assert_eq!(patch.assigned_voices(), slot.index() + 1);
        }
    }

    #[tokio::test]
    async fn missing_answer_names_the_step() {
        let transport = Arc::new(ScriptedTransport::new());
        script_bring_up(&transport, &[Slot::A]);
        let connection = connect(&transport);

        let mut state = DeviceState::new(Performance::default());
        let error = run(&connection, &mut state, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert_eq!(error.step, Step::SlotVersion);
        assert_eq!(error.slot, Some(Slot::B));
        assert!(matches!(error.source, StepError::Command(CommandError::Timeout(_))));

        // What was read before the failure is kept.
        assert_eq!(state.performance.name(), "Live Set");
        assert_eq!(state.performance.patch(Slot::A).name(), Some("Patch A"));
    }

    #[tokio::test]
    async fn slot_version_mismatch_is_fatal() {
        let transport = Arc::new(ScriptedTransport::new());
        script_bring_up(&transport, &[]);

        transport.on_request(
            &system(&[0x35, 0x00]),
            vec![vec![0x01, 0x0c, 0x40, 0x36, 0x00, slot_version(Slot::A)]],
        );
        let mut description = Patch::init(Slot::A).unwrap().write_message().unwrap();
        description.truncate(description.len() - 2);
        description[2] = slot_version(Slot::A) + 1;
        transport.on_request(&slot_request(Slot::A, &[0x3c]), vec![description]);
        let connection = connect(&transport);

        let mut state = DeviceState::new(Performance::default());
        let error = run(&connection, &mut state, WAIT).await.unwrap_err();
        assert_eq!(error.step, Step::Patch);
        assert!(matches!(
            error.source,
            StepError::VersionMismatch { expected: 5, found: 6 }
        ));
        assert_eq!(
            error.to_string(),
            "Patch for slot A failed: Version mismatch, expected 5 but the G2 answered with 6"
        );
    }

    #[tokio::test]
    async fn entries_are_read_page_by_page() {
        let transport = Arc::new(ScriptedTransport::new());

        let mut first = vec![0x01, 0x0c, 0x00, 0x13, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00];
        for name in ["Bass", "Lead"] {
            first.extend(name.bytes());
            first.extend([0x00, 0x02]);
        }
        first.push(0x05);
        transport.on_request(&system(&[0x14, 0x00, 0x00, 0x00]), vec![first]);

        let mut second = vec![0x01, 0x0c, 0x00, 0x13, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x02];
        second.extend(b"Pad\0");
        second.extend([0x03, 0x03, 0x01, 0x00]);
        second.extend(b"Keys\0");
        second.extend([0x01, 0x04]);
        transport.on_request(&system(&[0x14, 0x00, 0x00, 0x02]), vec![second]);

        let connection = connect(&transport);
        let mut state = DeviceState::new(Performance::default());
        read_entries(&connection, &mut state, EntryType::Patch, WAIT)
            .await
            .unwrap();

        let entries = &state.entries[EntryType::Patch];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.bank(0).unwrap().len(), 3);
        assert_eq!(entries.bank(0).unwrap()[&2].name, "Pad");
        assert_eq!(entries.bank(1).unwrap()[&0].name, "Keys");
        assert_eq!(transport.remaining_exchanges(), 0);
    }
}
