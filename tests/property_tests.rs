//! Property-based tests for report decoding, button merging and axis shaping.

use proptest::prelude::*;
use wiimote_pad::mapping::engine::{shape_axis, to_stick};
use wiimote_pad::mapping::profile::{AccelTarget, AccelerometerMapping};
use wiimote_pad::wiimote::report::{self, InputReport};
use wiimote_pad::wiimote::types::{AccelCalibration, Buttons, DeviceButton, DeviceState};

fn arb_report() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..=32)
}

fn arb_mapping() -> impl Strategy<Value = AccelerometerMapping> {
    (0.1f32..5.0, 0.0f32..=1.0, any::<bool>(), 0.2f32..4.0).prop_map(
        |(sensitivity, dead_zone, invert, curve_exponent)| AccelerometerMapping {
            enabled: true,
            target: AccelTarget::LeftStick,
            sensitivity,
            dead_zone,
            invert,
            curve_exponent,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary bytes never panic the decoder or the merge.
    #[test]
    fn prop_decode_is_total(data in arb_report()) {
        let mut state = DeviceState::new("prop");
        if let Some(decoded) = report::decode(&data) {
            decoded.apply(&mut state, &AccelCalibration::default());
        }
    }

    /// Accelerometer-bearing reports never leak the LSB bits into buttons.
    #[test]
    fn prop_core_accel_masks_button_bytes(b1 in any::<u8>(), b2 in any::<u8>(), accel in any::<[u8; 3]>()) {
        let buf = [0x31, b1, b2, accel[0], accel[1], accel[2]];
        let decoded = report::decode(&buf).unwrap();
        prop_assert_eq!(decoded.buttons().bits() & 0xE0E0, 0);
    }

    /// Full-word core reports never change the Home bit.
    #[test]
    fn prop_core_reports_preserve_home(home in any::<bool>(), words in proptest::collection::vec(any::<u16>(), 1..20)) {
        let mut state = DeviceState::new("prop");
        state.merge_home(home);

        for word in words {
            let [hi, lo] = word.to_be_bytes();
            let decoded = report::decode(&[0x30, hi, lo]).unwrap();
            decoded.apply(&mut state, &AccelCalibration::default());
            prop_assert_eq!(state.buttons.is_pressed(DeviceButton::Home), home);
        }
    }

    /// Status reports make Home follow the reported bit.
    #[test]
    fn prop_status_owns_home(b1 in any::<u8>(), b2 in any::<u8>()) {
        let mut state = DeviceState::new("prop");
        let decoded = report::decode(&[0x20, b1, b2, 0x00, 0x00, 0x00, 0x64]).unwrap();
        prop_assert!(matches!(decoded, InputReport::Status(_)));
        decoded.apply(&mut state, &AccelCalibration::default());
        prop_assert_eq!(state.buttons.is_pressed(DeviceButton::Home), b1 & 0x80 != 0);
    }

    /// `pressed` lists exactly the named buttons whose bit is set.
    #[test]
    fn prop_pressed_matches_bits(bits in any::<u16>()) {
        let buttons = Buttons(bits);
        let listed: Vec<DeviceButton> = buttons.pressed().collect();
        for button in DeviceButton::ALL {
            prop_assert_eq!(listed.contains(&button), bits & button.mask() != 0);
        }
    }

    /// Shaped values stay in range and the stick conversion follows.
    #[test]
    fn prop_shape_axis_in_range(raw in -4.0f32..4.0, mapping in arb_mapping()) {
        let shaped = shape_axis(raw, &mapping);
        prop_assert!((-1.0..=1.0).contains(&shaped), "shaped={shaped}");
        prop_assert!(to_stick(shaped) >= -i16::MAX);
    }

    /// Tilting the other way mirrors the output.
    #[test]
    fn prop_shape_axis_is_odd(raw in 0.0f32..2.0, mapping in arb_mapping()) {
        let positive = shape_axis(raw, &mapping);
        let negative = shape_axis(-raw, &mapping);
        prop_assert!((positive + negative).abs() < 1e-6, "{positive} vs {negative}");
    }

    /// Nothing at or inside the dead zone moves the stick.
    #[test]
    fn prop_dead_zone_silences_small_tilt(fraction in 0.0f32..=1.0, mapping in arb_mapping()) {
        let threshold = mapping.dead_zone / mapping.sensitivity * 0.5;
        prop_assert_eq!(shape_axis(threshold * fraction * 0.999, &mapping), 0.0);
    }
}
