//! Extension controller decoding
//!
//! Pure decoders for the extension bytes relayed in reports 0x32 and 0x35.
//! The decode strategy is picked by the `ExtensionKind` cached in
//! `DeviceState` when the extension was identified.

use crate::wiimote::types::{
    AccelCalibration, ClassicControllerState, ExtensionKind, NunchukState, Stick,
};

/// Decoded extension payload, one variant per supported extension
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtensionData {
    Nunchuk(NunchukState),
    Classic(ClassicControllerState),
}

/// Decode an extension payload for a known extension kind.
///
/// Guitar, MotionPlus and unrecognised extensions are identified but not
/// decoded, so they yield `None` like a short payload does.
pub fn decode(kind: ExtensionKind, payload: &[u8]) -> Option<ExtensionData> {
    match kind {
        ExtensionKind::Nunchuk => decode_nunchuk(payload).map(ExtensionData::Nunchuk),
        ExtensionKind::ClassicController => decode_classic(payload).map(ExtensionData::Classic),
        _ => None,
    }
}

/// Nunchuk layout:
/// - bytes 0-1: stick X/Y, centre 128
/// - bytes 2-4: accelerometer X/Y/Z bits 9:2
/// - byte 5: bits 7:6 Z, 5:4 Y, 3:2 X accelerometer LSBs; bit1 C, bit0 Z (0 = pressed)
pub fn decode_nunchuk(payload: &[u8]) -> Option<NunchukState> {
    if payload.len() < 6 {
        return None;
    }

    let stick = Stick {
        x: (payload[0] as f32 - 128.0) / 128.0,
        y: (payload[1] as f32 - 128.0) / 128.0,
    };

    let lsb = payload[5];
    let raw = [
        ((payload[2] as u16) << 2) | ((lsb >> 2) & 0x03) as u16,
        ((payload[3] as u16) << 2) | ((lsb >> 4) & 0x03) as u16,
        ((payload[4] as u16) << 2) | ((lsb >> 6) & 0x03) as u16,
    ];

    Some(NunchukState {
        stick,
        accelerometer: AccelCalibration::default().normalize(raw),
        buttons: !lsb & (NunchukState::BUTTON_C | NunchukState::BUTTON_Z),
    })
}

/// Classic Controller layout:
/// - LX = b0[5:0], LY = b1[5:0]
/// - RX = b0[7:6] b1[7:6] b2[7], RY = b2[4:0]
/// - LT = b2[6:5] b3[7:5], RT = b3[4:0]
/// - buttons = b4 << 8 | b5, active-low
pub fn decode_classic(payload: &[u8]) -> Option<ClassicControllerState> {
    if payload.len() < 6 {
        return None;
    }

    let (b0, b1, b2, b3) = (payload[0], payload[1], payload[2], payload[3]);

    let lx = b0 & 0x3F;
    let ly = b1 & 0x3F;
    let rx = ((b0 >> 6) << 3) | ((b1 >> 6) << 1) | (b2 >> 7);
    let ry = b2 & 0x1F;
    let lt = (((b2 >> 5) & 0x03) << 3) | (b3 >> 5);
    let rt = b3 & 0x1F;

    let six_bit = |v: u8| (v as f32 - 32.0) / 32.0;
    let five_bit = |v: u8| (v as f32 - 16.0) / 16.0;

    Some(ClassicControllerState {
        left_stick: Stick { x: six_bit(lx), y: six_bit(ly) },
        right_stick: Stick { x: five_bit(rx), y: five_bit(ry) },
        left_trigger: lt as f32 / 31.0,
        right_trigger: rt as f32 / 31.0,
        buttons: !(((payload[4] as u16) << 8) | payload[5] as u16),
    })
}
