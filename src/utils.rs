/*!
Small formatting helpers for log output.
*/

/// Formats a byte count for log lines, e.g. `512 B` or `10.00 KB`.
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if size < 1024 {
        return format!("{} B", size);
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Length of the padded standard base64 encoding of `len` input bytes.
pub fn encoded_len(len: u64) -> u64 {
    len.div_ceil(3) * 4
}
