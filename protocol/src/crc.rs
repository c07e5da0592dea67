use crc::Crc;

/// The G2 uses CRC16/XMODEM (poly 0x1021, init 0) for both files and USB frames.
pub const G2_CRC16: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_XMODEM);

pub fn crc16(data: &[u8]) -> u16 {
    G2_CRC16.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(crc16(&[0x80]), 0x9188);

        let mut message = vec![
            0x80, 0x0a, 0x03, 0x00, 0x00, 0x1a, 0x00, 0x8c, 0x00, 0x12, 0x4d, 0x6f, 0x64, 0x75,
            0x6c, 0x61, 0x72, 0x47, 0x32, 0x00, 0x30, 0x03, 0x4c, 0x52, 0x00, 0x00, 0x01, 0x96,
            0x28, 0x61, 0x00, 0x05, 0x01, 0x0a, 0x01,
        ];
        message.resize(64, 0);
        assert_eq!(crc16(&message), 0x3e24);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(crc16(&[]), 0);
    }
}
