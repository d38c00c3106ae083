//! AOKE (Ergomate) BLE protocol: UUIDs, move frames and height telemetry.

use uuid::Uuid;

// Service advertised by the desk controller
pub const CONTROL_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb);

// Characteristic notifying the current height as 4 ASCII digits (mm)
pub const HEIGHT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);

// Characteristic accepting move commands (write with response)
pub const CONTROL_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);

/// Lowest height the desk accepts, in millimeters (65.0 cm)
pub const MIN_HEIGHT_MM: u16 = 650;

/// Highest height the desk accepts, in millimeters (130.0 cm)
pub const MAX_HEIGHT_MM: u16 = 1300;

pub const FRAME_LEN: usize = 9;

const FRAME_HEADER: [u8; 3] = [0xA6, 0xA8, 0x01];
const FRAME_TRAILER: u8 = 0xFF;

/// A single move-to-height command, ready to be written to the control
/// characteristic.
pub type CommandFrame = [u8; FRAME_LEN];

/// Clamp an arbitrary requested height into the range the desk accepts.
pub fn clamp_height(target_mm: i64) -> u16 {
    // The clamp bounds fit in u16, so the cast cannot truncate.
    target_mm.clamp(i64::from(MIN_HEIGHT_MM), i64::from(MAX_HEIGHT_MM)) as u16
}

/// Build the move command for `target_mm`.
///
/// Format: `[0xA6, 0xA8, 0x01, hi, lo, 0x00, 0x00, checksum, 0xFF]`, height
/// big-endian, checksum the XOR of bytes 2..=6.
pub fn encode_move(target_mm: i64) -> CommandFrame {
    let [hi, lo] = clamp_height(target_mm).to_be_bytes();

    let mut frame = [0u8; FRAME_LEN];
    frame[..3].copy_from_slice(&FRAME_HEADER);
    frame[3] = hi;
    frame[4] = lo;
    frame[7] = checksum(&frame[2..7]);
    frame[8] = FRAME_TRAILER;
    frame
}

fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Parse a height notification.
///
/// Valid payloads are exactly four ASCII decimal digits, e.g. `b"0950"` for
/// 95.0 cm. Anything else is radio noise and yields `None`. Readings outside
/// the command range are passed through untouched.
pub fn decode_height(payload: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(payload).ok()?;
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Convert centimeters to millimeters, truncating toward zero
pub fn cm_to_mm(cm: f32) -> i64 {
    (cm * 10.0).trunc() as i64
}

/// Convert millimeters to centimeters for display
pub fn mm_to_cm(mm: u16) -> f32 {
    f32::from(mm) / 10.0
}
