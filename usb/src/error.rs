use strum::Display;

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("No G2 device was found")]
    DeviceNotFound,

    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Device is not a G2")]
    DeviceNotG2,

    #[error("Unable to Claim Interface")]
    DeviceNotClaimed,
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("USB error: {0}")]
    UsbError(UsbErrorKind),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Connection closed while waiting for {0}")]
    Closed(String),

    #[error("Short write, sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error("Request too large: {0} bytes")]
    TooLarge(usize),

    #[error("Malformed response from G2")]
    MalformedResponse(#[from] std::io::Error),
}

impl From<UsbErrorKind> for CommandError {
    fn from(kind: UsbErrorKind) -> Self {
        CommandError::UsbError(kind)
    }
}

impl From<rusb::Error> for CommandError {
    fn from(error: rusb::Error) -> Self {
        CommandError::UsbError(error.into())
    }
}

/// libusb status codes, by the names libusb gives them.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum UsbErrorKind {
    #[strum(to_string = "ERROR_IO")]
    Io,
    #[strum(to_string = "ERROR_INVALID_PARAM")]
    InvalidParam,
    #[strum(to_string = "ERROR_ACCESS")]
    Access,
    #[strum(to_string = "ERROR_NO_DEVICE")]
    NoDevice,
    #[strum(to_string = "ERROR_NOT_FOUND")]
    NotFound,
    #[strum(to_string = "ERROR_BUSY")]
    Busy,
    #[strum(to_string = "ERROR_TIMEOUT")]
    Timeout,
    #[strum(to_string = "ERROR_OVERFLOW")]
    Overflow,
    #[strum(to_string = "ERROR_PIPE")]
    Pipe,
    #[strum(to_string = "ERROR_INTERRUPTED")]
    Interrupted,
    #[strum(to_string = "ERROR_NO_MEM")]
    NoMem,
    #[strum(to_string = "ERROR_NOT_SUPPORTED")]
    NotSupported,
    #[strum(to_string = "ERROR_OTHER")]
    Other,
}

impl UsbErrorKind {
    pub fn code(&self) -> i32 {
        match self {
            UsbErrorKind::Io => -1,
            UsbErrorKind::InvalidParam => -2,
            UsbErrorKind::Access => -3,
            UsbErrorKind::NoDevice => -4,
            UsbErrorKind::NotFound => -5,
            UsbErrorKind::Busy => -6,
            UsbErrorKind::Timeout => -7,
            UsbErrorKind::Overflow => -8,
            UsbErrorKind::Pipe => -9,
            UsbErrorKind::Interrupted => -10,
            UsbErrorKind::NoMem => -11,
            UsbErrorKind::NotSupported => -12,
            UsbErrorKind::Other => -99,
        }
    }

    pub fn from_code(code: i32) -> UsbErrorKind {
        match code {
            -1 => UsbErrorKind::Io,
            -2 => UsbErrorKind::InvalidParam,
            -3 => UsbErrorKind::Access,
            -4 => UsbErrorKind::NoDevice,
            -5 => UsbErrorKind::NotFound,
            -6 => UsbErrorKind::Busy,
            -7 => UsbErrorKind::Timeout,
            -8 => UsbErrorKind::Overflow,
            -9 => UsbErrorKind::Pipe,
            -10 => UsbErrorKind::Interrupted,
            -11 => UsbErrorKind::NoMem,
            -12 => UsbErrorKind::NotSupported,
            _ => UsbErrorKind::Other,
        }
    }
}

impl From<rusb::Error> for UsbErrorKind {
    fn from(error: rusb::Error) -> Self {
        match error {
            rusb::Error::Io => UsbErrorKind::Io,
            rusb::Error::InvalidParam => UsbErrorKind::InvalidParam,
            rusb::Error::Access => UsbErrorKind::Access,
            rusb::Error::NoDevice => UsbErrorKind::NoDevice,
            rusb::Error::NotFound => UsbErrorKind::NotFound,
            rusb::Error::Busy => UsbErrorKind::Busy,
            rusb::Error::Timeout => UsbErrorKind::Timeout,
            rusb::Error::Overflow => UsbErrorKind::Overflow,
            rusb::Error::Pipe => UsbErrorKind::Pipe,
            rusb::Error::Interrupted => UsbErrorKind::Interrupted,
            rusb::Error::NoMem => UsbErrorKind::NoMem,
            rusb::Error::NotSupported => UsbErrorKind::NotSupported,
            rusb::Error::BadDescriptor | rusb::Error::Other => UsbErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_names() {
        assert_eq!(UsbErrorKind::from_code(-7), UsbErrorKind::Timeout);
        assert_eq!(UsbErrorKind::Timeout.to_string(), "ERROR_TIMEOUT");
        assert_eq!(UsbErrorKind::from_code(-42), UsbErrorKind::Other);
        assert_eq!(UsbErrorKind::Other.code(), -99);
        assert_eq!(UsbErrorKind::from(rusb::Error::Pipe).code(), -9);
    }
}
