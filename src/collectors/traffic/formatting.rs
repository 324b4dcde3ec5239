//! Formatting utilities for traffic data
//!
//! Human-scaled units with binary (1024) steps. Speeds stop at MB/s because a
//! phone link never needs more.

/// Formats a rate in bytes per second
///
/// Below 1024 B/s whole bytes are shown, below 1 MiB/s kilobytes with one
/// decimal, and megabytes with two decimals above that.
///
/// # Examples
///
/// ```
/// use droid_netwatch::collectors::traffic::formatting::format_speed;
///
/// assert_eq!(format_speed(500.0), "500 B/s");
/// assert_eq!(format_speed(2048.0), "2.0 KB/s");
/// assert_eq!(format_speed(5.0 * 1024.0 * 1024.0), "5.00 MB/s");
/// ```
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec < 1024.0 {
        format!("{:.0} B/s", bytes_per_sec)
    } else if bytes_per_sec < 1024.0 * 1024.0 {
        format!("{:.1} KB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{:.2} MB/s", bytes_per_sec / (1024.0 * 1024.0))
    }
}

/// Formats a byte count with appropriate units (B, KB, MB, GB, TB)
///
/// # Examples
///
/// ```
/// use droid_netwatch::collectors::traffic::formatting::format_bytes;
///
/// assert_eq!(format_bytes(512.0), "512 B");
/// assert_eq!(format_bytes(1048576.0), "1.00 MB");
/// ```
pub fn format_bytes(bytes: f64) -> String {
    if bytes < 1024.0 {
        format!("{:.0} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else if bytes < 1024.0 * 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    } else {
        format!("{:.2} TB", bytes / (1024.0 * 1024.0 * 1024.0 * 1024.0))
    }
}

/// Renders a second count as `HH:MM:SS`
pub fn format_countdown(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
