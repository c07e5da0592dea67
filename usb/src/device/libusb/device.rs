use crate::device::base::{G2Device, Transport, UsbData};
use crate::error::{ConnectError, UsbErrorKind};
use crate::{PID_G2, VID_CLAVIA};
use log::{debug, info, warn};
use rusb::{Device, DeviceDescriptor, DeviceHandle, GlobalContext};
use std::sync::{RwLock, RwLockReadGuard};
use std::time::Duration;

const INTERFACE: u8 = 0;

const ENDPOINT_BULK_OUT: u8 = 0x03;
const ENDPOINT_INTERRUPT_IN: u8 = 0x81;
const ENDPOINT_BULK_IN: u8 = 0x82;

pub struct G2USB {
    // Reads and writes share the handle, release takes it.
    handle: RwLock<Option<DeviceHandle<GlobalContext>>>,
    device: Device<GlobalContext>,
    descriptor: DeviceDescriptor,

    write_timeout: Duration,
    interrupt_timeout: Duration,
    bulk_timeout: Duration,
}

impl G2USB {
    fn find_device(
        device: &G2Device,
    ) -> Result<(Device<GlobalContext>, DeviceDescriptor), ConnectError> {
        let devices = rusb::devices()?;
        for usb_device in devices.iter() {
            if usb_device.bus_number() == device.bus_number
                && usb_device.address() == device.address
            {
                if let Ok(descriptor) = usb_device.device_descriptor() {
                    return Ok((usb_device, descriptor));
                }
            }
        }
        Err(ConnectError::DeviceNotFound)
    }

    pub fn from_device(device: G2Device) -> Result<Self, ConnectError> {
        let (device, descriptor) = G2USB::find_device(&device)?;
        if descriptor.vendor_id() != VID_CLAVIA || descriptor.product_id() != PID_G2 {
            return Err(ConnectError::DeviceNotG2);
        }

        let mut handle = device.open()?;
        info!("Connected to possible G2 device at {:?}", device);

        // Not every platform supports detaching, the claim below is what matters.
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Unable to enable kernel driver detach: {}", e);
        }
        if handle.claim_interface(INTERFACE).is_err() {
            return Err(ConnectError::DeviceNotClaimed);
        }

        Ok(Self {
            device: handle.device(),
            handle: RwLock::new(Some(handle)),
            descriptor,
            write_timeout: Duration::from_secs(10),
            interrupt_timeout: Duration::from_millis(500),
            bulk_timeout: Duration::from_secs(5),
        })
    }

    pub fn get_descriptor(&self) -> UsbData {
        let version = self.descriptor.device_version();
        UsbData {
            vendor_id: self.descriptor.vendor_id(),
            product_id: self.descriptor.product_id(),
            device_version: (version.0, version.1, version.2),
        }
    }

    fn handle(&self) -> RwLockReadGuard<'_, Option<DeviceHandle<GlobalContext>>> {
        self.handle.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for G2USB {
    fn write_bulk(&self, data: &[u8]) -> Result<usize, UsbErrorKind> {
        let handle = self.handle();
        let handle = handle.as_ref().ok_or(UsbErrorKind::NoDevice)?;
        Ok(handle.write_bulk(ENDPOINT_BULK_OUT, data, self.write_timeout)?)
    }

    fn read_interrupt(&self, buffer: &mut [u8]) -> Result<usize, UsbErrorKind> {
        let handle = self.handle();
        let handle = handle.as_ref().ok_or(UsbErrorKind::NoDevice)?;
        Ok(handle.read_interrupt(ENDPOINT_INTERRUPT_IN, buffer, self.interrupt_timeout)?)
    }

    fn read_bulk(&self, buffer: &mut [u8]) -> Result<usize, UsbErrorKind> {
        let handle = self.handle();
        let handle = handle.as_ref().ok_or(UsbErrorKind::NoDevice)?;
        Ok(handle.read_bulk(ENDPOINT_BULK_IN, buffer, self.bulk_timeout)?)
    }

    fn release(&self) -> Result<(), UsbErrorKind> {
        let taken = self
            .handle
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut handle) = taken else {
            return Ok(());
        };

        info!("Releasing interface on {:?}", self.device);
        match handle.release_interface(INTERFACE) {
            // Nothing left to release if the G2 was unplugged.
            Err(rusb::Error::NoDevice) => {
                warn!("Device {:?} already gone", self.device);
                Ok(())
            }
            result => Ok(result?),
        }
    }
}

pub fn find_devices() -> Vec<G2Device> {
    let mut found_devices: Vec<G2Device> = Vec::new();

    if let Ok(devices) = rusb::devices() {
        for device in devices.iter() {
            if let Ok(descriptor) = device.device_descriptor() {
                let bus_number = device.bus_number();
                let address = device.address();

                if descriptor.vendor_id() == VID_CLAVIA && descriptor.product_id() == PID_G2 {
                    found_devices.push(G2Device {
                        bus_number,
                        address,
                        identifier: None,
                    });
                }
            }
        }
    }

    found_devices
}
