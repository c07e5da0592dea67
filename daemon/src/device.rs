use crate::bringup::{self, BringUpError};
use crate::dispatch::dispatch;
use anyhow::{anyhow, bail, Context, Result};
use enum_map::EnumMap;
use g2_protocol::components::SynthSettings;
use g2_protocol::entries::{Entries, EntryList};
use g2_protocol::{FieldError, FieldValues, Patch, Performance};
use g2_types::{EntryType, Slot};
use g2_usb::commands::{Command, ParamSet, Target};
use g2_usb::device::base::Transport;
use g2_usb::{G2Connection, UsbMessage};
use log::{debug, error, info, warn};
use std::mem;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub const PATCH_EXTENSION: &str = "pch2";
pub const PERFORMANCE_EXTENSION: &str = "prf2";

/// Everything known about the synth: its performance and patches, global settings, and the
/// bank listings read from it.
#[derive(Clone, Debug)]
pub struct DeviceState {
    pub performance: Performance,
    pub synth_settings: Option<FieldValues>,
    pub master_clock: Option<u16>,
    pub entries: EnumMap<EntryType, Entries>,
    pub entry_list: Option<EntryList>,
}

impl DeviceState {
    pub fn new(performance: Performance) -> Self {
        Self {
            performance,
            synth_settings: None,
            master_clock: None,
            entries: EnumMap::default(),
            entry_list: None,
        }
    }

    /// The state used when there is no synth to ask.
    pub fn offline() -> Result<Self> {
        let mut state = Self::new(Performance::init()?);
        state.synth_settings = Some(SynthSettings::offline_defaults()?);
        Ok(state)
    }

    pub fn synth_settings(&self) -> Result<Option<SynthSettings>, FieldError> {
        self.synth_settings
            .as_ref()
            .map(SynthSettings::try_from)
            .transpose()
    }
}

/// Told about a device becoming usable, and about it going away.
pub trait DeviceListener: Send {
    fn on_device_initialized(&mut self, _device: &Device) {}
    fn on_device_disposal(&mut self, _device: &Device) {}
}

pub struct Device {
    connection: Option<G2Connection>,
    state: DeviceState,
    initialized: bool,
    timeout: Duration,
    listeners: Vec<Box<dyn DeviceListener>>,
}

impl Device {
    /// A device with no synth behind it, holding an init performance.
    pub fn offline() -> Result<Self> {
        Ok(Self {
            connection: None,
            state: DeviceState::offline()?,
            initialized: false,
            timeout: Duration::ZERO,
            listeners: vec![],
        })
    }

    /// Opens a connection over `transport`. Messages the G2 sends on its own are passed to
    /// `unsolicited`, and should be handed back through [`Device::dispatch`].
    pub fn connect(
        transport: Arc<dyn Transport>,
        unsolicited: UnboundedSender<UsbMessage>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut connection = G2Connection::new(transport);
        connection
            .start(unsolicited)
            .context("Unable to start the USB reader")?;

        Ok(Self {
            connection: Some(connection),
            state: DeviceState::new(Performance::default()),
            initialized: false,
            timeout,
            listeners: vec![],
        })
    }

    /// Whether this device was connected to a synth, even one that has since gone away.
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub fn online(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.alive())
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn performance(&self) -> &Performance {
        &self.state.performance
    }

    pub fn patch(&self, slot: Slot) -> &Patch {
        self.state.performance.patch(slot)
    }

    /// Registers a listener. One added after initialization is told straight away.
    pub fn add_listener(&mut self, mut listener: Box<dyn DeviceListener>) {
        if self.initialized {
            listener.on_device_initialized(self);
        }
        self.listeners.push(listener);
    }

    fn notify(&mut self, notify: impl Fn(&mut Box<dyn DeviceListener>, &Device)) {
        let mut listeners = mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            notify(listener, &*self);
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }

    /// Reads the synth's whole state. On failure whatever was read is kept, and the device
    /// stays uninitialized.
    pub async fn initialize(&mut self) -> Result<(), BringUpError> {
        let Some(connection) = self.connection.as_ref() else {
            return Err(BringUpError::offline());
        };

        self.initialized = false;
        bringup::run(connection, &mut self.state, self.timeout).await?;
        self.initialized = true;

        info!(
            "G2 initialized, performance '{}' version {}",
            self.state.performance.name(),
            self.state.performance.version()
        );
        self.notify(|listener, device| listener.on_device_initialized(device));
        Ok(())
    }

    /// Reads the bank listing for `entry_type` from the synth.
    pub async fn read_entries(&mut self, entry_type: EntryType) -> Result<&Entries, BringUpError> {
        let Some(connection) = self.connection.as_ref() else {
            return Err(BringUpError::offline());
        };
        bringup::read_entries(connection, &mut self.state, entry_type, self.timeout).await?;
        Ok(&self.state.entries[entry_type])
    }

    /// Folds a message the G2 sent on its own into the state.
    pub fn dispatch(&mut self, message: &UsbMessage) -> bool {
        match dispatch(&mut self.state, message) {
            Ok(handled) => handled,
            Err(e) => {
                error!("Error dispatching {}: {}", message, e);
                false
            }
        }
    }

    /// Loads a `.prf2` over the performance, or a `.pch2` into `slot`.
    pub fn load_file(&mut self, path: &Path, slot: Slot) -> Result<()> {
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase());

        match extension.as_deref() {
            Some(PERFORMANCE_EXTENSION) => {
                let performance = Performance::read_from_file(path)
                    .with_context(|| format!("Unable to read performance {}", path.display()))?;
                info!("Loaded performance '{}'", performance.name());
                self.state.performance = performance;
            }
            Some(PATCH_EXTENSION) => {
                let patch = Patch::read_from_file(slot, path)
                    .with_context(|| format!("Unable to read patch {}", path.display()))?;
                info!("Loaded {} into slot {}", path.display(), slot);
                self.state.performance.set_patch(slot, patch);
            }
            _ => bail!("Unknown file type: {}", path.display()),
        }

        if self.online() {
            warn!("Loaded file is only held locally, the G2 is unchanged");
        }
        Ok(())
    }

    /// Changes a parameter in the model, then on the synth when one is connected.
    pub fn set_param(&mut self, slot: Slot, set: ParamSet) -> Result<()> {
        let patch = self.state.performance.patch_mut(slot);
        patch.set_param(
            set.area,
            u32::from(set.module),
            u32::from(set.variation),
            u32::from(set.param),
            u32::from(set.value),
        )?;
        let version = patch.version();

        if let Some(connection) = self.connection.as_ref().filter(|c| c.alive()) {
            connection.send(
                "set param",
                Command::SetParam(set),
                Target::Slot { slot, version },
            )?;
        }
        Ok(())
    }

    /// Asks the synth to load a stored entry. The changes it makes are announced as unsolicited
    /// messages.
    pub fn retrieve_entry(&self, slot_code: u8, bank: u8, entry: u8) -> Result<()> {
        let connection = self
            .connection
            .as_ref()
            .filter(|c| c.alive())
            .ok_or_else(|| anyhow!("The G2 is not connected"))?;

        info!("Retrieving bank {} entry {} into {}", bank, entry, slot_code);
        connection.send(
            "retrieve entry",
            Command::RetrieveEntry {
                slot_code,
                bank,
                entry,
            },
            Target::System,
        )?;
        Ok(())
    }

    /// Tells the synth to stop talking to us, then closes the connection.
    pub async fn shutdown(&mut self) {
        self.notify(|listener, device| listener.on_device_disposal(device));
        self.initialized = false;

        let Some(mut connection) = self.connection.take() else {
            return;
        };
        if connection.alive() {
            if let Err(e) = bringup::stop_communication(&connection, self.timeout).await {
                warn!("Could not send stop message: {}", e);
            }
        }

        debug!("Closing G2 connection");
        connection.shutdown();
    }
}
