use byteorder::{BigEndian, ReadBytesExt};
use log::warn;
use std::io::{Cursor, Error, ErrorKind};

/// Reads a byte whose meaning is known but unverified, warning instead of failing if it
/// differs from `expected`.
pub fn expect_warn(
    cursor: &mut Cursor<&[u8]>,
    expected: u8,
    context: &str,
    what: &str,
) -> std::io::Result<u8> {
    let found = cursor.read_u8()?;
    if found != expected {
        warn!(
            "{}: expected {:#04x} for {}, found {:#04x} at offset {}",
            context,
            expected,
            what,
            found,
            cursor.position() - 1
        );
    }
    Ok(found)
}

pub fn read_short(cursor: &mut Cursor<&[u8]>) -> std::io::Result<u16> {
    cursor.read_u16::<BigEndian>()
}

/// Returns the next `len` bytes and moves the cursor past them.
pub fn slice_ahead<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> std::io::Result<&'a [u8]> {
    let data: &'a [u8] = *cursor.get_ref();
    let start = cursor.position() as usize;
    let end = start + len;
    if end > data.len() {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            format!(
                "wanted {} bytes at offset {}, only {} available",
                len,
                start,
                data.len().saturating_sub(start)
            ),
        ));
    }
    cursor.set_position(end as u64);
    Ok(&data[start..end])
}

/// Everything from the cursor to the end of the underlying data.
pub fn remaining<'a>(cursor: &Cursor<&'a [u8]>) -> &'a [u8] {
    let data: &'a [u8] = *cursor.get_ref();
    let start = (cursor.position() as usize).min(data.len());
    &data[start..]
}
