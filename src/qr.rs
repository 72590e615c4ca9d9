//! Terminal QR codes for pairing URLs.
//!
//! Two QR rows are packed into one terminal row with Unicode half-block
//! characters, which keeps modules roughly square in a terminal font.

use qrcodegen::{QrCode, QrCodeEcc};

/// Quiet zone around the code, in modules.
const QUIET_ZONE: i32 = 2;

/// Render `data` as terminal lines.
///
/// Data too long for any QR code yields a short explanation instead.
pub fn render_lines(data: &str) -> Vec<String> {
    // Medium first, low if the URL does not fit
    let code = [QrCodeEcc::Medium, QrCodeEcc::Low]
        .into_iter()
        .find_map(|ecc| QrCode::encode_text(data, ecc).ok());

    let Some(code) = code else {
        log::warn!("URL too long for QR code ({} chars)", data.len());
        return vec![
            "URL too long for QR code".to_string(),
            format!("URL is {} chars", data.len()),
        ];
    };

    let total = code.size() + QUIET_ZONE * 2;
    // Out-of-range coordinates read as light, which draws the quiet zone
    let dark = |x: i32, y: i32| code.get_module(x - QUIET_ZONE, y - QUIET_ZONE);

    (0..total)
        .step_by(2)
        .map(|upper| {
            (0..total)
                .map(|x| match (dark(x, upper), dark(x, upper + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect()
        })
        .collect()
}
