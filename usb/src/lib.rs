pub use rusb;
pub mod broker;
pub mod commands;
pub mod connection;
pub mod device;
pub mod error;
pub mod message;

pub const VID_CLAVIA: u16 = 0x0ffc;
pub const PID_G2: u16 = 0x0002;

pub use broker::{Expectation, Matcher, MessageBroker};
pub use connection::{ConnectionState, G2Connection};
pub use message::UsbMessage;
