use std::cmp;
use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Renders a canonical hex display (`hexdump -C` style) of the bytes surrounding `offset`.
///
/// `context` bytes are shown on each side of the offset, aligned to whole lines. The line
/// containing `offset` is marked with `>` so a failing read is easy to spot in debug logs.
pub fn hexdump_around(data: &[u8], offset: usize, context: usize) -> String {
    let mut out = String::new();
    if data.is_empty() {
        return out;
    }

    let offset = cmp::min(offset, data.len().saturating_sub(1));
    let start = offset.saturating_sub(context) / BYTES_PER_LINE * BYTES_PER_LINE;
    let end = cmp::min(offset.saturating_add(context).saturating_add(1), data.len());

    let mut address = start;
    while address < end {
        let line_end = cmp::min(address + BYTES_PER_LINE, data.len());
        let marker = if (address..line_end).contains(&offset) {
            '>'
        } else {
            ' '
        };
        write_line(&mut out, &data[address..line_end], address, marker);
        address += BYTES_PER_LINE;
    }

    out
}

fn write_line(out: &mut String, line: &[u8], address: usize, marker: char) {
    // Writing to a `String` cannot fail.
    let _ = write!(out, "{marker}{address:08x}:");

    for b in line {
        let _ = write!(out, " {b:02x}");
    }

    // align
    for _ in line.len()..BYTES_PER_LINE {
        out.push_str("   ");
    }

    out.push_str("  |");
    for &c in line {
        // replace all control and non-ascii chars with dots
        if c.is_ascii_graphic() || c == b' ' {
            out.push(c as char);
        } else {
            out.push('.');
        }
    }
    out.push_str("|\n");
}
