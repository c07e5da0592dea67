use std::fmt::Write;

const ROW: usize = 16;

/// Renders bytes as rows of 16 hex values followed by a printable-ASCII gutter.
pub fn dump_hex(data: &[u8]) -> String {
    let mut out = String::new();
    for row in data.chunks(ROW) {
        let mut hex = String::with_capacity(ROW * 3);
        let mut text = String::with_capacity(ROW * 2);
        for byte in row {
            let _ = write!(hex, "{byte:02x} ");
            let c = *byte as char;
            text.push(if c.is_ascii_graphic() { c } else { '.' });
            text.push(' ');
        }
        let _ = writeln!(out, "{:<width$}  {}", hex, text.trim_end(), width = ROW * 3);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_and_gutter() {
        let mut data = vec![0xa2, 0x01, 0x04, 0x42, 0x46];
        data.resize(17, 0);
        let dump = dump_hex(&data);
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a2 01 04 42 46 00"));
        assert!(lines[0].ends_with(". . . B F . . . . . . . . . . ."));
        assert!(lines[1].starts_with("00 "));
    }
}
