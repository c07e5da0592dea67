use crate::device::base::{G2Device, Transport};
use crate::device::libusb::device;
use crate::error::ConnectError;
use log::debug;
use std::sync::Arc;

pub mod base;
mod libusb;

#[cfg(any(test, feature = "scripted"))]
pub mod scripted;

pub fn find_devices() -> Vec<G2Device> {
    device::find_devices()
}

pub fn from_device(device: G2Device) -> Result<Arc<dyn Transport>, ConnectError> {
    let usb = device::G2USB::from_device(device)?;
    let descriptor = usb.get_descriptor();
    debug!(
        "Opened {:04x}:{:04x} version {:?}",
        descriptor.vendor_id(),
        descriptor.product_id(),
        descriptor.device_version()
    );
    Ok(Arc::new(usb))
}
