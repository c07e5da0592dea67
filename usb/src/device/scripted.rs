//! A transport that plays the G2's side of a conversation from a script, for exercising the
//! connection and everything above it without hardware.

use crate::device::base::Transport;
use crate::error::UsbErrorKind;
use crate::message::{device_frames, unframe_bulk};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::Duration;

const IDLE_WAIT: Duration = Duration::from_millis(2);

struct Exchange {
    request: Vec<u8>,
    responses: Vec<Vec<u8>>,
}

#[derive(Default)]
struct Script {
    exchanges: VecDeque<Exchange>,
    interrupts: VecDeque<Vec<u8>>,
    bulk: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    unexpected: Vec<Vec<u8>>,
    released: usize,
}

/// Answers each request with the response bodies scripted for it, in order. Requests that do
/// not match the next scripted exchange get no answer.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// When `request` (an unframed payload) is written, the G2 answers with each body in
    /// `responses`.
    pub fn on_request(&self, request: &[u8], responses: Vec<Vec<u8>>) -> &Self {
        self.lock().exchanges.push_back(Exchange {
            request: request.to_vec(),
            responses,
        });
        self
    }

    /// Queues a message the G2 sends without being asked.
    pub fn push_unsolicited(&self, body: &[u8]) {
        let mut script = self.lock();
        queue_frames(&mut script, body);
    }

    /// Queues an interrupt packet, and the bulk transfer behind it, exactly as given.
    pub fn push_frames(&self, packet: Vec<u8>, bulk: Option<Vec<u8>>) {
        let mut script = self.lock();
        script.interrupts.push_back(packet);
        if let Some(bulk) = bulk {
            script.bulk.push_back(bulk);
        }
    }

    /// Every payload written so far, unframed.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Payloads that did not match the next scripted exchange.
    pub fn unexpected(&self) -> Vec<Vec<u8>> {
        self.lock().unexpected.clone()
    }

    pub fn remaining_exchanges(&self) -> usize {
        self.lock().exchanges.len()
    }

    pub fn release_count(&self) -> usize {
        self.lock().released
    }
}

fn queue_frames(script: &mut Script, body: &[u8]) {
    let (packet, bulk) = device_frames(body);
    script.interrupts.push_back(packet);
    script.bulk.extend(bulk);
}

impl Transport for ScriptedTransport {
    fn write_bulk(&self, data: &[u8]) -> Result<usize, UsbErrorKind> {
        let payload = unframe_bulk(data).ok_or(UsbErrorKind::InvalidParam)?.to_vec();
        let mut script = self.lock();
        script.written.push(payload.clone());

        let matches = script
            .exchanges
            .front()
            .is_some_and(|exchange| exchange.request == payload);
        if !matches {
            debug!("No scripted answer for {:02x?}", payload);
            script.unexpected.push(payload);
            return Ok(data.len());
        }

        if let Some(exchange) = script.exchanges.pop_front() {
            for body in &exchange.responses {
                queue_frames(&mut script, body);
            }
        }
        Ok(data.len())
    }

    fn read_interrupt(&self, buffer: &mut [u8]) -> Result<usize, UsbErrorKind> {
        let packet = self.lock().interrupts.pop_front();
        match packet {
            Some(packet) => {
                let length = packet.len().min(buffer.len());
                buffer[..length].copy_from_slice(&packet[..length]);
                Ok(length)
            }
            None => {
                sleep(IDLE_WAIT);
                Err(UsbErrorKind::Timeout)
            }
        }
    }

    fn read_bulk(&self, buffer: &mut [u8]) -> Result<usize, UsbErrorKind> {
        let data = self.lock().bulk.pop_front().ok_or(UsbErrorKind::Timeout)?;
        let length = data.len().min(buffer.len());
        buffer[..length].copy_from_slice(&data[..length]);
        Ok(length)
    }

    fn release(&self) -> Result<(), UsbErrorKind> {
        self.lock().released += 1;
        Ok(())
    }
}
