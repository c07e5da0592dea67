use crate::broker::{Expectation, Matcher, MessageBroker};
use crate::commands::{Command, Target};
use crate::device::base::Transport;
use crate::error::{CommandError, UsbErrorKind};
use crate::message::{frame_bulk, InterruptFrame, UsbMessage, INTERRUPT_SIZE};
use g2_protocol::dump::dump_hex;
use log::{debug, error, info, log_enabled, trace, warn, Level};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use strum::Display;
use tokio::sync::mpsc::UnboundedSender;

const BULK_RETRIES: usize = 5;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Reading,
    ShuttingDown,
    Closed,
}

/// An open connection to a G2: the transport, the thread reading from it, and the broker
/// pairing what it reads with the requests waiting on it.
pub struct G2Connection {
    transport: Arc<dyn Transport>,
    broker: Arc<MessageBroker>,
    stopping: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    state: ConnectionState,
}

impl G2Connection {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            broker: MessageBroker::new(),
            stopping: Arc::new(AtomicBool::new(false)),
            reader: None,
            state: ConnectionState::Idle,
        }
    }

    /// Starts the receive thread. Messages no request is waiting for go to `unsolicited`.
    pub fn start(&mut self, unsolicited: UnboundedSender<UsbMessage>) -> std::io::Result<()> {
        if self.state != ConnectionState::Idle {
            warn!("Connection already started ({})", self.state);
            return Ok(());
        }

        let transport = self.transport.clone();
        let broker = self.broker.clone();
        let stopping = self.stopping.clone();
        let reader = std::thread::Builder::new()
            .name(String::from("g2-usb-reader"))
            .spawn(move || read_loop(transport, broker, unsolicited, stopping))?;

        self.reader = Some(reader);
        self.state = ConnectionState::Reading;
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the receive thread is still running. It stops by itself when the G2 goes away.
    pub fn alive(&self) -> bool {
        self.state == ConnectionState::Reading
            && self.reader.as_ref().is_some_and(|reader| !reader.is_finished())
    }

    pub fn broker(&self) -> &Arc<MessageBroker> {
        &self.broker
    }

    pub fn expect(&self, name: &str, matcher: Matcher) -> Expectation {
        self.broker.expect(name, matcher)
    }

    /// Frames `data` and writes it to the G2.
    pub fn send_bulk(&self, name: &str, data: &[u8]) -> Result<usize, CommandError> {
        if matches!(
            self.state,
            ConnectionState::ShuttingDown | ConnectionState::Closed
        ) {
            return Err(CommandError::Closed(name.to_string()));
        }

        let frame = frame_bulk(data).ok_or(CommandError::TooLarge(data.len()))?;
        info!("Send Bulk: {}", name);
        if log_enabled!(Level::Trace) {
            trace!("\n{}", dump_hex(&frame));
        }

        let sent = self.transport.write_bulk(&frame)?;
        if sent != frame.len() {
            return Err(CommandError::ShortWrite {
                sent,
                expected: frame.len(),
            });
        }
        Ok(sent)
    }

    /// Sends a command the G2 does not answer.
    pub fn send(&self, name: &str, command: Command, target: Target) -> Result<(), CommandError> {
        self.send_bulk(name, &command.payload(target))?;
        Ok(())
    }

    /// Sends a command and waits for the first message `matcher` accepts. The wait is
    /// registered before sending so a quick answer cannot be missed.
    pub async fn request(
        &self,
        name: &str,
        command: Command,
        target: Target,
        matcher: Matcher,
        timeout: Duration,
    ) -> Result<UsbMessage, CommandError> {
        let expectation = self.broker.expect(name, matcher);
        self.send_bulk(name, &command.payload(target))?;
        expectation.wait(timeout).await
    }

    /// Stops and joins the receive thread, then releases the device. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::ShuttingDown;

        debug!("Shutdown");
        self.stopping.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            debug!("Joining read thread");
            if reader.join().is_err() {
                error!("Read thread panicked");
            }
        }
        self.broker.clear();

        if let Err(e) = self.transport.release() {
            warn!("Unable to release device: {}", e);
        }
        self.state = ConnectionState::Closed;
    }
}

impl Drop for G2Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_loop(
    transport: Arc<dyn Transport>,
    broker: Arc<MessageBroker>,
    unsolicited: UnboundedSender<UsbMessage>,
    stopping: Arc<AtomicBool>,
) {
    let mut packet = [0; INTERRUPT_SIZE];
    let mut received = 0_u64;

    while !stopping.load(Ordering::Relaxed) {
        let message = match read_message(transport.as_ref(), &mut packet) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(UsbErrorKind::NoDevice) => {
                error!("G2 has gone away, stopping reader");
                break;
            }
            Err(e) => {
                info!("Read Interrupt failure: {}", e);
                continue;
            }
        };

        received += 1;
        if !message.crc_valid() {
            warn!(
                "CRC mismatch on {}, received {:04x}",
                message,
                message.received_crc()
            );
        }
        if log_enabled!(Level::Trace) {
            trace!("Received {}", message.dump());
        }

        if let Some(message) = broker.deliver(message) {
            if unsolicited.send(message).is_err() {
                debug!("Unsolicited receiver closed, dropping message");
            }
        }
    }

    debug!("Read thread exiting after {} messages", received);
}

/// Reads one interrupt packet and, for an extended announcement, the bulk transfer behind it.
pub(crate) fn read_message(
    transport: &dyn Transport,
    packet: &mut [u8],
) -> Result<Option<UsbMessage>, UsbErrorKind> {
    let read = match transport.read_interrupt(packet) {
        Ok(read) => read,
        Err(UsbErrorKind::Timeout) => return Ok(None),
        Err(e) => return Err(e),
    };
    let packet = &packet[..read];

    match InterruptFrame::classify(packet) {
        InterruptFrame::Embedded => {
            let message = UsbMessage::from_embedded(packet);
            if message.is_none() {
                warn!("Malformed embedded packet:\n{}", dump_hex(packet));
            }
            Ok(message)
        }
        InterruptFrame::Extended { size } => read_bulk_retries(transport, size, BULK_RETRIES),
        InterruptFrame::Unknown(kind) => {
            warn!("Unknown interrupt packet type {}:\n{}", kind, dump_hex(packet));
            Ok(None)
        }
    }
}

fn read_bulk_retries(
    transport: &dyn Transport,
    size: usize,
    retries: usize,
) -> Result<Option<UsbMessage>, UsbErrorKind> {
    let mut buffer = vec![0; size];
    for attempt in 1..=retries {
        match transport.read_bulk(&mut buffer) {
            Ok(0) => debug!("Empty bulk read (attempt {} of {})", attempt, retries),
            Ok(read) => return Ok(UsbMessage::from_extended(&buffer[..read])),
            Err(UsbErrorKind::NoDevice) => return Err(UsbErrorKind::NoDevice),
            Err(e) => info!(
                "Read Bulk failure: {} (attempt {} of {})",
                e, attempt, retries
            ),
        }
    }
    warn!("Bulk read retries exhausted for {} byte message", size);
    Ok(None)
}
