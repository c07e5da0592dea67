use crate::error::UsbErrorKind;

/// Raw endpoint access to a G2. The connection owns one of these and shares it with its
/// receive thread, so reads and writes must be callable from different threads at once.
pub trait Transport: Send + Sync {
    /// Writes a framed request to the bulk out endpoint, returning the bytes sent.
    fn write_bulk(&self, data: &[u8]) -> Result<usize, UsbErrorKind>;

    /// Reads one packet from the interrupt endpoint. A timeout is reported as
    /// [`UsbErrorKind::Timeout`] and is expected while the G2 is idle.
    fn read_interrupt(&self, buffer: &mut [u8]) -> Result<usize, UsbErrorKind>;

    /// Reads an announced extended message from the bulk in endpoint.
    fn read_bulk(&self, buffer: &mut [u8]) -> Result<usize, UsbErrorKind>;

    /// Releases the interface and closes the handle. Called after the receive thread has
    /// stopped, and a no-op when already released.
    fn release(&self) -> Result<(), UsbErrorKind>;
}

// We primarily need the bus number, and address for comparison..
#[derive(Debug, Clone)]
pub struct G2Device {
    pub(crate) bus_number: u8,
    pub(crate) address: u8,
    pub(crate) identifier: Option<String>,
}

impl G2Device {
    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn identifier(&self) -> &Option<String> {
        &self.identifier
    }

    pub fn set_identifier(&mut self, identifier: String) {
        self.identifier = Some(identifier);
    }
}

pub struct UsbData {
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) device_version: (u8, u8, u8),
}

impl UsbData {
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }
    pub fn product_id(&self) -> u16 {
        self.product_id
    }
    pub fn device_version(&self) -> (u8, u8, u8) {
        self.device_version
    }
}
