//! Terminal output for the operator.

use link_core::connection::Presenter;

use std::io::{Write, stdout};

use log::{info, warn};
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;

const QR_HEADER: &str = "Scan this QR code from the linked-devices screen of your phone:";

/// Renders QR payloads as half-block terminal art and prints pairing codes
/// and status lines to stdout.
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    pub fn new() -> Self {
        Self
    }
}

/// Render `payload` as a QR code made of Unicode half blocks.
///
/// Returns `None` if the payload does not fit in a QR code.
pub fn render_qr(payload: &str) -> Option<String> {
    match QrCode::new(payload.as_bytes()) {
        Ok(code) => Some(
            code.render::<Dense1x2>()
                .dark_color(Dense1x2::Light)
                .light_color(Dense1x2::Dark)
                .quiet_zone(true)
                .build(),
        ),
        Err(e) => {
            warn!("Cannot render QR payload: {e}");
            None
        }
    }
}

/// Group an eight-character pairing code as `ABCD-EFGH`.
pub fn format_pairing_code(code: &str) -> String {
    let clean: String = code.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if clean.len() != 8 {
        return code.to_string();
    }
    format!("{}-{}", &clean[..4], &clean[4..])
}

fn print_block(block: &str) {
    let mut out = stdout().lock();
    let _ = writeln!(out, "{block}");
    let _ = out.flush();
}

impl Presenter for ConsolePresenter {
    fn show_qr(&self, payload: &str, refresh_index: u32) {
        info!("QR code #{refresh_index} ready");
        let rendered = render_qr(payload).unwrap_or_else(|| payload.to_string());
        print_block(&format!("\n{QR_HEADER} (#{refresh_index})\n{rendered}"));
    }

    fn show_pairing_code(&self, code: &str) {
        info!("Pairing code ready");
        print_block(&format!(
            "\nEnter this code on your phone under Linked devices > Link with phone number:\n\n    {}\n",
            format_pairing_code(code)
        ));
    }

    fn status(&self, line: &str) {
        print_block(&format!("> {line}"));
    }
}
