use crate::device::Device;
use crate::{SettingsHandle, Shutdown};
use anyhow::{anyhow, Result};
use g2_protocol::components::SynthSettings;
use g2_protocol::entries::Entries;
use g2_protocol::Performance;
use g2_types::{EntryType, Slot};
use g2_usb::commands::ParamSet;
use g2_usb::device::base::G2Device;
use g2_usb::device::{find_devices, from_device};
use g2_usb::UsbMessage;
use log::{error, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

/// Work run against the device from inside the worker.
pub type DeviceTask = Box<dyn FnOnce(&mut Device) + Send>;

pub enum DeviceCommand {
    GetStatus(oneshot::Sender<DeviceStatus>),
    GetPerformance(oneshot::Sender<Option<Performance>>),
    GetSynthSettings(oneshot::Sender<Result<Option<SynthSettings>>>),
    GetEntries(EntryType, oneshot::Sender<Result<Entries>>),
    Initialize(oneshot::Sender<Result<()>>),
    LoadFile(PathBuf, Slot, oneshot::Sender<Result<()>>),
    SetParam(Slot, ParamSet, oneshot::Sender<Result<()>>),
    RetrieveEntry {
        slot_code: u8,
        bank: u8,
        entry: u8,
        sender: oneshot::Sender<Result<()>>,
    },
    Execute(DeviceTask),
}

pub type DeviceSender = mpsc::Sender<DeviceCommand>;
pub type DeviceReceiver = mpsc::Receiver<DeviceCommand>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    pub present: bool,
    pub online: bool,
    pub initialized: bool,
    pub performance_name: Option<String>,
    pub performance_version: Option<u8>,
}

pub async fn spawn_usb_handler(
    mut command_rx: DeviceReceiver,
    mut shutdown: Shutdown,
    settings: SettingsHandle,
    offline: bool,
) {
    let (unsolicited_tx, mut unsolicited_rx) = mpsc::unbounded_channel();

    // Create the device detection Sleep Timer..
    let detection_duration = Duration::from_millis(1000);
    let detection_sleep = sleep(Duration::from_millis(0));
    tokio::pin!(detection_sleep);

    let mut device: Option<Device> = None;
    let mut ignore_list = HashMap::new();

    if offline {
        info!("Running offline, not looking for a G2");
    }

    loop {
        tokio::select! {
            () = &mut detection_sleep, if !offline => {
                if let Some(mut lost) = device.take_if(|device| device.has_connection() && !device.online()) {
                    warn!("G2 Disconnected");
                    lost.shutdown().await;
                }

                if !device.as_ref().is_some_and(Device::online) {
                    if let Some(found) = find_new_device(&ignore_list) {
                        let bus_number = found.bus_number();
                        let address = found.address();
                        let identifier = found.identifier().clone();

                        match load_device(found, unsolicited_tx.clone(), &settings).await {
                            Ok(loaded) => {
                                if let Some(mut replaced) = device.replace(loaded) {
                                    replaced.shutdown().await;
                                }
                            }
                            Err(e) => {
                                error!(
                                    "Couldn't load potential G2 on bus {} address {}: {}",
                                    bus_number, address, e
                                );
                                ignore_list.insert(
                                    (bus_number, address, identifier),
                                    Instant::now() + Duration::from_secs(10),
                                );
                            }
                        }
                    }
                }
                detection_sleep.as_mut().reset(tokio::time::Instant::now() + detection_duration);
            },
            Some(message) = unsolicited_rx.recv() => {
                match device.as_mut() {
                    Some(device) => {
                        device.dispatch(&message);
                    }
                    None => warn!("Dropping message with no device: {}", message),
                }
            },
            () = shutdown.recv() => {
                info!("Shutting down device worker");
                if let Some(mut device) = device.take() {
                    device.shutdown().await;
                }
                return;
            },
            Some(command) = command_rx.recv() => {
                handle_command(&mut device, command, &settings).await;
            },
        };
    }
}

async fn handle_command(
    device: &mut Option<Device>,
    command: DeviceCommand,
    settings: &SettingsHandle,
) {
    match command {
        DeviceCommand::GetStatus(sender) => {
            let _ = sender.send(get_status(device.as_ref()));
        }
        DeviceCommand::GetPerformance(sender) => {
            let _ = sender.send(device.as_ref().map(|device| device.performance().clone()));
        }
        DeviceCommand::GetSynthSettings(sender) => {
            let result = match device.as_ref() {
                Some(device) => device.state().synth_settings().map_err(anyhow::Error::from),
                None => Ok(None),
            };
            let _ = sender.send(result);
        }
        DeviceCommand::GetEntries(entry_type, sender) => {
            let _ = sender.send(get_entries(device.as_mut(), entry_type).await);
        }
        DeviceCommand::Initialize(sender) => {
            let result = match device.as_mut() {
                Some(device) => initialize(device).await,
                None => Err(anyhow!("No G2 is connected")),
            };
            let _ = sender.send(result);
        }
        DeviceCommand::LoadFile(path, slot, sender) => {
            let result = match offline_if_missing(device) {
                Ok(device) => device.load_file(&path, slot),
                Err(e) => Err(e),
            };
            if result.is_ok() {
                settings.set_last_loaded_file(&path).await;
                settings.save().await;
            }
            let _ = sender.send(result);
        }
        DeviceCommand::SetParam(slot, set, sender) => {
            let result = match offline_if_missing(device) {
                Ok(device) => device.set_param(slot, set),
                Err(e) => Err(e),
            };
            let _ = sender.send(result);
        }
        DeviceCommand::RetrieveEntry {
            slot_code,
            bank,
            entry,
            sender,
        } => {
            let result = match device.as_ref() {
                Some(device) => device.retrieve_entry(slot_code, bank, entry),
                None => Err(anyhow!("No G2 is connected")),
            };
            let _ = sender.send(result);
        }
        DeviceCommand::Execute(task) => match offline_if_missing(device) {
            Ok(device) => task(device),
            Err(e) => error!("Unable to run device task: {}", e),
        },
    }
}

/// The current device, or a new offline one when none is connected.
fn offline_if_missing(device: &mut Option<Device>) -> Result<&mut Device> {
    if device.is_none() {
        info!("No G2 connected, creating an offline device");
        *device = Some(Device::offline()?);
    }
    device.as_mut().ok_or_else(|| anyhow!("No device available"))
}

fn get_status(device: Option<&Device>) -> DeviceStatus {
    match device {
        Some(device) => DeviceStatus {
            present: true,
            online: device.online(),
            initialized: device.initialized(),
            performance_name: Some(device.performance().name().to_string()),
            performance_version: Some(device.performance().version()),
        },
        None => DeviceStatus::default(),
    }
}

async fn get_entries(device: Option<&mut Device>, entry_type: EntryType) -> Result<Entries> {
    let device = device.ok_or_else(|| anyhow!("No G2 is connected"))?;
    if device.online() {
        Ok(device.read_entries(entry_type).await?.clone())
    } else {
        Ok(device.state().entries[entry_type].clone())
    }
}

/// Runs the bring-up, then reads both bank listings. A listing that can't be read leaves the
/// device initialized.
async fn initialize(device: &mut Device) -> Result<()> {
    if let Err(e) = device.initialize().await {
        error!("G2 initialization failed: {}", e);
        return Err(e.into());
    }

    for entry_type in [EntryType::Patch, EntryType::Perf] {
        if let Err(e) = device.read_entries(entry_type).await {
            warn!("Unable to read {} entries: {}", entry_type, e);
        }
    }
    Ok(())
}

fn find_new_device(
    devices_to_ignore: &HashMap<(u8, u8, Option<String>), Instant>,
) -> Option<G2Device> {
    let now = Instant::now();

    find_devices().into_iter().find(|device| {
        !devices_to_ignore
            .iter()
            .any(|((bus_number, address, identifier), expires)| {
                if let Some(identifier) = identifier {
                    if let Some(device_identifier) = device.identifier() {
                        return identifier == device_identifier && expires > &now;
                    }
                }
                *bus_number == device.bus_number() && *address == device.address() && expires > &now
            })
    })
}

async fn load_device(
    found: G2Device,
    unsolicited: UnboundedSender<UsbMessage>,
    settings: &SettingsHandle,
) -> Result<Device> {
    info!(
        "Found G2 on bus {} address {}",
        found.bus_number(),
        found.address()
    );
    let transport = from_device(found)?;
    let mut device = Device::connect(transport, unsolicited, settings.get_request_timeout().await)?;

    // A failed bring-up keeps the device, offline, for file work.
    if settings.get_initialise_on_connect().await {
        let _ = initialize(&mut device).await;
    }
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use g2_types::AreaId;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use tokio::task::JoinHandle;

    struct Worker {
        sender: DeviceSender,
        shutdown: Shutdown,
        handle: JoinHandle<()>,
        settings: SettingsHandle,
        dir: TempDir,
    }

    async fn start() -> Worker {
        let dir = tempdir().unwrap();
        let settings = SettingsHandle::load(dir.path().join("settings.json"))
            .await
            .unwrap();
        let shutdown = Shutdown::new();
        let (sender, receiver) = mpsc::channel(8);
        let handle = tokio::spawn(spawn_usb_handler(
            receiver,
            shutdown.clone(),
            settings.clone(),
            true,
        ));

        Worker {
            sender,
            shutdown,
            handle,
            settings,
            dir,
        }
    }

    async fn status(worker: &Worker) -> DeviceStatus {
        let (tx, rx) = oneshot::channel();
        worker.sender.send(DeviceCommand::GetStatus(tx)).await.unwrap();
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn loading_a_file_creates_an_offline_device() {
        let worker = start().await;
        assert_eq!(status(&worker).await, DeviceStatus::default());

        let path = worker.dir.path().join("Evening.prf2");
        Performance::init().unwrap().write_file(&path).unwrap();

        let (tx, rx) = oneshot::channel();
        worker
            .sender
            .send(DeviceCommand::LoadFile(path.clone(), Slot::A, tx))
            .await
            .unwrap();
        rx.await.unwrap().unwrap();

        let status = status(&worker).await;
        assert!(status.present);
        assert!(!status.online);
        assert!(!status.initialized);
        assert_eq!(status.performance_name.as_deref(), Some("Evening"));
        assert_eq!(worker.settings.get_last_loaded_file().await, Some(path));

        let (tx, rx) = oneshot::channel();
        worker.sender.send(DeviceCommand::GetPerformance(tx)).await.unwrap();
        assert_eq!(rx.await.unwrap().unwrap().name(), "Evening");

        worker.shutdown.trigger();
        worker.handle.await.unwrap();
    }

    #[tokio::test]
    async fn offline_commands() {
        let worker = start().await;

        let (tx, rx) = oneshot::channel();
        worker
            .sender
            .send(DeviceCommand::RetrieveEntry {
                slot_code: 0,
                bank: 0,
                entry: 0,
                sender: tx,
            })
            .await
            .unwrap();
        assert!(rx.await.unwrap().is_err());

        let (tx, rx) = oneshot::channel();
        worker
            .sender
            .send(DeviceCommand::Initialize(tx))
            .await
            .unwrap();
        assert!(rx.await.unwrap().is_err());

        let ran = Arc::new(AtomicBool::new(false));
        let seen = ran.clone();
        worker
            .sender
            .send(DeviceCommand::Execute(Box::new(move |device| {
                assert!(!device.online());
                seen.store(true, Ordering::Relaxed);
            })))
            .await
            .unwrap();

        let (tx, rx) = oneshot::channel();
        worker
            .sender
            .send(DeviceCommand::GetSynthSettings(tx))
            .await
            .unwrap();
        let settings = rx.await.unwrap().unwrap().unwrap();
        assert_eq!(settings.device_name, "[offline]");
        assert!(ran.load(Ordering::Relaxed));

        let (tx, rx) = oneshot::channel();
        worker
            .sender
            .send(DeviceCommand::GetEntries(EntryType::Perf, tx))
            .await
            .unwrap();
        assert!(rx.await.unwrap().unwrap().is_empty());

        let (tx, rx) = oneshot::channel();
        let set = ParamSet {
            area: AreaId::Fx,
            module: 1,
            param: 0,
            value: 0,
            variation: 0,
        };
        worker
            .sender
            .send(DeviceCommand::SetParam(Slot::B, set, tx))
            .await
            .unwrap();
        assert!(rx.await.unwrap().is_err());

        worker.shutdown.trigger();
        worker.handle.await.unwrap();
    }
}
