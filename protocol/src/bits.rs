use crate::error::BitError;

/// A byte buffer with an independent bit cursor.
///
/// Values are packed most-significant-bit first and may straddle byte boundaries. Reads are
/// bounded by the number of bits written (or supplied), writes grow the buffer as needed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitBuffer {
    data: Vec<u8>,
    bit_index: usize,
    bit_len: usize,
}

impl BitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            bit_index: 0,
            bit_len: 0,
        }
    }

    pub fn bit_index(&self) -> usize {
        self.bit_index
    }

    pub fn set_bit_index(&mut self, index: usize) -> Result<(), BitError> {
        if index > self.bit_len {
            return Err(BitError::OutOfRange {
                index,
                len: self.bit_len,
            });
        }
        self.bit_index = index;
        Ok(())
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn bits_remaining(&self) -> usize {
        self.bit_len.saturating_sub(self.bit_index)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.bit_len.div_ceil(8)]
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.bit_len.div_ceil(8));
        self.data
    }

    /// Reads the next `bits` bits as an unsigned value and advances the cursor.
    pub fn get(&mut self, bits: usize) -> Result<u32, BitError> {
        check_width(bits)?;
        if self.bits_remaining() < bits {
            return Err(BitError::UnexpectedEnd {
                wanted: bits,
                remaining: self.bits_remaining(),
            });
        }

        let mut value: u64 = 0;
        let mut remaining = bits;
        while remaining > 0 {
            let available = 8 - self.bit_index % 8;
            let take = available.min(remaining);
            let byte = self.data[self.bit_index / 8] as u64;
            let chunk = (byte >> (available - take)) & ((1 << take) - 1);

            value = (value << take) | chunk;
            self.bit_index += take;
            remaining -= take;
        }
        Ok(value as u32)
    }

    pub fn peek(&mut self, bits: usize) -> Result<u32, BitError> {
        let index = self.bit_index;
        let value = self.get(bits);
        self.bit_index = index;
        value
    }

    /// Writes `value` into the next `bits` bits, growing the buffer if needed.
    pub fn put(&mut self, bits: usize, value: u32) -> Result<(), BitError> {
        check_width(bits)?;
        if (value as u64) >> bits != 0 {
            return Err(BitError::Overflow { bits, value });
        }

        let needed = (self.bit_index + bits).div_ceil(8);
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }

        let value = value as u64;
        let mut remaining = bits;
        while remaining > 0 {
            let available = 8 - self.bit_index % 8;
            let take = available.min(remaining);
            let shift = available - take;
            let chunk = ((value >> (remaining - take)) & ((1 << take) - 1)) as u8;
            let mask = (((1u16 << take) - 1) as u8) << shift;

            let byte = &mut self.data[self.bit_index / 8];
            *byte = (*byte & !mask) | (chunk << shift);

            self.bit_index += take;
            remaining -= take;
        }
        self.bit_len = self.bit_len.max(self.bit_index);
        Ok(())
    }

    /// Returns an independent buffer over the next `bytes` bytes, starting from the cursor
    /// rounded up to a byte boundary. The cursor moves past the slice.
    pub fn slice_ahead(&mut self, bytes: usize) -> Result<BitBuffer, BitError> {
        let start = self.bit_index.div_ceil(8);
        let end = start
            .checked_add(bytes)
            .filter(|end| end.checked_mul(8).is_some_and(|bits| bits <= self.bit_len));
        let Some(end) = end else {
            return Err(BitError::UnexpectedEnd {
                wanted: bytes.saturating_mul(8),
                remaining: self.bit_len.saturating_sub(start * 8),
            });
        };
        self.bit_index = end * 8;
        Ok(BitBuffer::from(&self.data[start..end]))
    }

    /// Copies the bits from the cursor onwards, realigned to start at bit 0. Any trailing
    /// partial byte is padded with zeros.
    pub fn shifted_slice(&self) -> Vec<u8> {
        let offset = self.bit_index % 8;
        let first = self.bit_index / 8;
        let remaining = self.bits_remaining();
        let len = remaining.div_ceil(8);

        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let high = self.data[first + i] << offset;
            let low = match offset {
                0 => 0,
                _ => self
                    .data
                    .get(first + i + 1)
                    .map(|byte| byte >> (8 - offset))
                    .unwrap_or(0),
            };
            out.push(high | low);
        }

        let tail = remaining % 8;
        if tail != 0 {
            if let Some(last) = out.last_mut() {
                *last &= 0xffu8 << (8 - tail);
            }
        }
        out
    }

    /// Like [`shifted_slice`](Self::shifted_slice), but starting from an arbitrary bit.
    pub fn shifted_slice_from(&self, start: usize) -> Vec<u8> {
        let mut view = self.clone();
        view.bit_index = start.min(self.bit_len);
        view.shifted_slice()
    }
}

impl From<Vec<u8>> for BitBuffer {
    fn from(data: Vec<u8>) -> Self {
        let bit_len = data.len() * 8;
        Self {
            data,
            bit_index: 0,
            bit_len,
        }
    }
}

impl From<&[u8]> for BitBuffer {
    fn from(data: &[u8]) -> Self {
        BitBuffer::from(data.to_vec())
    }
}

fn check_width(bits: usize) -> Result<(), BitError> {
    if bits == 0 || bits > 32 {
        return Err(BitError::InvalidWidth(bits));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(text: &str) -> Vec<u8> {
        let mut bits: String = text.chars().filter(|c| *c == '0' || *c == '1').collect();
        while bits.len() % 8 != 0 {
            bits.push('0');
        }
        (0..bits.len() / 8)
            .map(|i| u8::from_str_radix(&bits[i * 8..i * 8 + 8], 2).unwrap())
            .collect()
    }

    #[test]
    fn read_across_bytes() {
        let mut buffer = BitBuffer::from(vec![0x45, 0xf2]);
        assert_eq!(buffer.get(6).unwrap(), 17);
        assert_eq!(buffer.get(5).unwrap(), 15);
        assert_eq!(buffer.get(1).unwrap(), 1);
        assert_eq!(buffer.get(4).unwrap(), 2);
        assert_eq!(buffer.bits_remaining(), 0);
    }

    #[test]
    fn write_across_bytes() {
        let mut buffer = BitBuffer::with_capacity(4);
        buffer.put(6, 17).unwrap();
        buffer.put(5, 15).unwrap();
        buffer.put(1, 1).unwrap();
        buffer.put(4, 2).unwrap();
        assert_eq!(buffer.into_bytes(), vec![0x45, 0xf2]);
    }

    #[test]
    fn wide_values() {
        let mut buffer = BitBuffer::from(vec![0x45, 0xf2, 0xe7]);
        assert_eq!(buffer.get(6).unwrap(), 17);
        assert_eq!(buffer.get(13).unwrap(), 3991);
        assert_eq!(buffer.get(5).unwrap(), 7);

        let mut written = BitBuffer::new();
        written.put(6, 17).unwrap();
        written.put(13, 3991).unwrap();
        written.put(5, 7).unwrap();
        assert_eq!(written.as_bytes(), &[0x45, 0xf2, 0xe7]);
    }

    #[test]
    fn full_width() {
        let mut buffer = BitBuffer::new();
        buffer.put(4, 0xa).unwrap();
        buffer.put(32, 0xdead_beef).unwrap();
        buffer.put(4, 0x5).unwrap();

        let mut reader = BitBuffer::from(buffer.into_bytes());
        assert_eq!(reader.get(4).unwrap(), 0xa);
        assert_eq!(reader.get(32).unwrap(), 0xdead_beef);
        assert_eq!(reader.get(4).unwrap(), 0x5);
    }

    #[test]
    fn overflow_is_rejected() {
        let mut buffer = BitBuffer::new();
        assert_eq!(
            buffer.put(3, 8),
            Err(BitError::Overflow { bits: 3, value: 8 })
        );
        assert_eq!(buffer.put(0, 0), Err(BitError::InvalidWidth(0)));
    }

    #[test]
    fn read_past_end() {
        let mut buffer = BitBuffer::from(vec![0xff]);
        buffer.get(5).unwrap();
        assert_eq!(
            buffer.get(4),
            Err(BitError::UnexpectedEnd {
                wanted: 4,
                remaining: 3
            })
        );
        assert_eq!(buffer.peek(3).unwrap(), 7);
        assert_eq!(buffer.bit_index(), 5);
    }

    #[test]
    fn shifted() {
        let text = "10110111 01111011 11101111 11011111";
        let mut buffer = BitBuffer::from(binary(text));
        assert_eq!(buffer.shifted_slice(), binary(text));

        assert_eq!(buffer.get(1).unwrap(), 1);
        assert_eq!(buffer.shifted_slice(), binary(&text[1..]));
        assert_eq!(buffer.shifted_slice_from(0), binary(text));
    }

    #[test]
    fn slice_ahead_aligns() {
        let mut buffer = BitBuffer::from(vec![0x80, 0x01, 0x02, 0x03]);
        assert_eq!(buffer.get(1).unwrap(), 1);

        let mut slice = buffer.slice_ahead(2).unwrap();
        assert_eq!(slice.get(8).unwrap(), 0x01);
        assert_eq!(slice.get(8).unwrap(), 0x02);
        assert_eq!(buffer.get(8).unwrap(), 0x03);
        assert!(buffer.slice_ahead(1).is_err());
    }

    #[test]
    fn slice_ahead_rejects_huge_lengths() {
        let mut buffer = BitBuffer::from(vec![0x80, 0x01]);
        assert_eq!(buffer.get(3).unwrap(), 4);
        assert_eq!(
            buffer.slice_ahead(usize::MAX),
            Err(BitError::UnexpectedEnd {
                wanted: usize::MAX,
                remaining: 8,
            })
        );
        assert_eq!(
            buffer.slice_ahead(usize::MAX / 8 + 1),
            Err(BitError::UnexpectedEnd {
                wanted: usize::MAX,
                remaining: 8,
            })
        );
        assert_eq!(buffer.bit_index(), 3);
    }
}
