//! QR code rendering for the startup banner.
//!
//! Phones join by scanning the server URL straight off the host's terminal,
//! so the code is drawn with Unicode half-block characters, two QR module
//! rows per terminal row.

use qrcode::{Color, QrCode};

/// Quiet zone (border) size in modules.
const QUIET_ZONE: usize = 4;

/// Render `text` as a terminal QR code.
pub fn terminal_qr(text: &str) -> anyhow::Result<String> {
    let code = QrCode::new(text.as_bytes())?;
    let modules = code.to_colors();
    let width = code.width();

    let mut output = String::new();

    // Top quiet zone
    let full_width = width + QUIET_ZONE * 2;
    for _ in 0..QUIET_ZONE / 2 {
        output.push_str(&" ".repeat(full_width));
        output.push('\n');
    }

    // Two module rows per terminal row, drawn with half blocks
    let height = modules.len() / width;
    let mut row = 0;
    while row < height {
        output.push_str(&" ".repeat(QUIET_ZONE));

        for col in 0..width {
            let top_dark = modules[row * width + col] == Color::Dark;
            let bottom_dark = if row + 1 < height {
                modules[(row + 1) * width + col] == Color::Dark
            } else {
                false
            };

            let ch = match (top_dark, bottom_dark) {
                (true, true) => '\u{2588}',  // Full block
                (true, false) => '\u{2580}', // Upper half block
                (false, true) => '\u{2584}', // Lower half block
                (false, false) => ' ',
            };
            output.push(ch);
        }

        output.push_str(&" ".repeat(QUIET_ZONE));
        output.push('\n');
        row += 2;
    }

    // Bottom quiet zone
    for _ in 0..QUIET_ZONE / 2 {
        output.push_str(&" ".repeat(full_width));
        output.push('\n');
    }

    Ok(output)
}
