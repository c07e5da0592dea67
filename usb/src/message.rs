use byteorder::{BigEndian, ByteOrder};
use g2_protocol::crc::crc16;
use g2_protocol::dump::dump_hex;
use std::fmt::{Display, Formatter};

/// Size of a packet on the interrupt endpoint.
pub const INTERRUPT_SIZE: usize = 16;

const TYPE_EXTENDED: u8 = 1;
const TYPE_EMBEDDED: u8 = 2;

/// What the first byte of an interrupt packet announces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterruptFrame {
    /// The whole message is inside the interrupt packet.
    Embedded,

    /// The message is `size` bytes long and waiting on the bulk endpoint.
    Extended { size: usize },

    Unknown(u8),
}

impl InterruptFrame {
    pub fn classify(packet: &[u8]) -> InterruptFrame {
        let Some(first) = packet.first() else {
            return InterruptFrame::Unknown(0);
        };
        match first & 0x0f {
            TYPE_EMBEDDED => InterruptFrame::Embedded,
            TYPE_EXTENDED if packet.len() >= 3 => InterruptFrame::Extended {
                size: BigEndian::read_u16(&packet[1..3]) as usize,
            },
            other => InterruptFrame::Unknown(other),
        }
    }
}

/// A message received from the G2, with its transport framing removed.
///
/// The body starts at the command byte (`0x01` or `0x80`) and stops before the CRC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsbMessage {
    size: usize,
    extended: bool,
    crc: u16,
    received_crc: u16,
    body: Vec<u8>,
}

impl UsbMessage {
    /// Builds a message from an embedded interrupt packet. The upper nibble of the first byte
    /// is the length of the framed data, which ends with the CRC.
    pub fn from_embedded(packet: &[u8]) -> Option<UsbMessage> {
        let length = (*packet.first()? >> 4) as usize;
        if length < 3 || length + 1 > packet.len() {
            return None;
        }

        let body = packet[1..length - 1].to_vec();
        Some(UsbMessage {
            size: length,
            extended: false,
            crc: crc16(&body),
            received_crc: BigEndian::read_u16(&packet[length - 1..length + 1]),
            body,
        })
    }

    /// Builds a message from a bulk transfer, which carries its CRC in the last two bytes.
    pub fn from_extended(data: &[u8]) -> Option<UsbMessage> {
        if data.len() < 3 {
            return None;
        }
        let end = data.len() - 2;
        let body = data[..end].to_vec();
        Some(UsbMessage {
            size: data.len(),
            extended: true,
            crc: crc16(&body),
            received_crc: BigEndian::read_u16(&data[end..]),
            body,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    pub fn received_crc(&self) -> u16 {
        self.received_crc
    }

    pub fn crc_valid(&self) -> bool {
        self.crc == self.received_crc
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body with its CRC reattached, as a message writer produces it.
    pub fn framed_body(&self) -> Vec<u8> {
        let mut out = self.body.clone();
        out.extend(self.received_crc.to_be_bytes());
        out
    }

    pub fn starts_with(&self, header: &[u8]) -> bool {
        self.body.starts_with(header)
    }

    /// Everything after the first `skip` bytes.
    pub fn after(&self, skip: usize) -> &[u8] {
        self.body.get(skip..).unwrap_or_default()
    }

    pub fn dump(&self) -> String {
        format!("{}\n{}", self, dump_hex(&self.body))
    }
}

impl Display for UsbMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UsbMessage[{} size={:#x} crc={:04x}]",
            if self.extended { "extended" } else { "embedded" },
            self.size,
            self.crc
        )
    }
}

/// Frames an outgoing request as `[len_hi, len_lo, data.., crc_hi, crc_lo]`, where the length
/// counts the whole frame and the CRC covers `data` only.
pub fn frame_bulk(data: &[u8]) -> Option<Vec<u8>> {
    let size = u16::try_from(data.len() + 4).ok()?;
    let mut out = Vec::with_capacity(size as usize);
    out.extend(size.to_be_bytes());
    out.extend_from_slice(data);
    out.extend(crc16(data).to_be_bytes());
    Some(out)
}

/// Removes the framing [`frame_bulk`] adds, returning `None` if the length or CRC disagree.
pub fn unframe_bulk(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 4 || BigEndian::read_u16(&frame[..2]) as usize != frame.len() {
        return None;
    }
    let data = &frame[2..frame.len() - 2];
    let crc = BigEndian::read_u16(&frame[frame.len() - 2..]);
    (crc16(data) == crc).then_some(data)
}

/// The interrupt packet the G2 sends for `body`, and the bulk transfer that follows it when
/// the body is too long to embed.
pub fn device_frames(body: &[u8]) -> (Vec<u8>, Option<Vec<u8>>) {
    let crc = crc16(body).to_be_bytes();
    let length = body.len() + 2;
    if length <= 0x0f {
        let mut packet = vec![((length as u8) << 4) | TYPE_EMBEDDED];
        packet.extend_from_slice(body);
        packet.extend(crc);
        packet.resize(INTERRUPT_SIZE, 0);
        (packet, None)
    } else {
        let mut packet = vec![TYPE_EXTENDED];
        packet.extend((length as u16).to_be_bytes());
        packet.resize(INTERRUPT_SIZE, 0);

        let mut bulk = body.to_vec();
        bulk.extend(crc);
        (packet, Some(bulk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_perf_version() {
        // 82 01 0c 40 36 04 ver crc..
        let body = [0x01, 0x0c, 0x40, 0x36, 0x04, 0x00];
        let (packet, bulk) = device_frames(&body);
        assert!(bulk.is_none());
        assert_eq!(packet[0], 0x82);
        assert_eq!(InterruptFrame::classify(&packet), InterruptFrame::Embedded);

        let message = UsbMessage::from_embedded(&packet).unwrap();
        assert!(!message.is_extended());
        assert!(message.crc_valid());
        assert_eq!(message.body(), &body);
        assert!(message.starts_with(&[0x01, 0x0c, 0x40, 0x36]));
        assert_eq!(message.after(5), &[0x00]);
    }

    #[test]
    fn extended_announcement() {
        let body = vec![0x01, 0x0c, 0x00, 0x03, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x11, 0x22,
            0x33, 0x44];
        let (packet, bulk) = device_frames(&body);
        let bulk = bulk.unwrap();
        assert_eq!(
            InterruptFrame::classify(&packet),
            InterruptFrame::Extended { size: bulk.len() }
        );

        let message = UsbMessage::from_extended(&bulk).unwrap();
        assert!(message.is_extended());
        assert!(message.crc_valid());
        assert_eq!(message.body(), &body[..]);
        assert_eq!(message.framed_body(), bulk);
    }

    #[test]
    fn bad_crc_is_reported() {
        let mut bulk = vec![0x01, 0x09, 0x00, 0x27, 0x41, 0x00, 0x00, 0x00];
        let crc = crc16(&bulk).wrapping_add(1);
        bulk.extend(crc.to_be_bytes());
        let message = UsbMessage::from_extended(&bulk).unwrap();
        assert!(!message.crc_valid());
    }

    #[test]
    fn bulk_framing() {
        let frame = frame_bulk(&[0x80]).unwrap();
        assert_eq!(frame, vec![0x00, 0x05, 0x80, 0x91, 0x88]);
        assert_eq!(unframe_bulk(&frame), Some(&[0x80][..]));

        let mut broken = frame.clone();
        broken[2] = 0x81;
        assert_eq!(unframe_bulk(&broken), None);
    }

    #[test]
    fn short_packets() {
        assert_eq!(UsbMessage::from_embedded(&[0xf2, 0x01]), None);
        assert_eq!(UsbMessage::from_extended(&[0x01, 0x02]), None);
        assert_eq!(InterruptFrame::classify(&[]), InterruptFrame::Unknown(0));
        assert_eq!(InterruptFrame::classify(&[0x03]), InterruptFrame::Unknown(3));
    }
}
