//! End-to-end mapping tests: raw report -> device state -> gamepad frame

use wiimote_pad::backend::MockGamepadSink;
use wiimote_pad::mapping::engine::{FixedLayoutId, MappingEngine, MappingStrategy};
use wiimote_pad::mapping::frame::GamepadButton;
use wiimote_pad::mapping::profile::{
    AccelTarget, GamepadTarget, MappingProfile, ProfileTemplate, TargetOutput,
};
use wiimote_pad::wiimote::report;
use wiimote_pad::wiimote::types::{AccelCalibration, Accelerometer, Buttons, DeviceButton, DeviceState};

fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Every device button on a gamepad button of its own
fn identity_profile() -> MappingProfile {
    let mut profile = MappingProfile::new("Identity");
    for (target, button) in [
        (GamepadTarget::A, DeviceButton::A),
        (GamepadTarget::B, DeviceButton::B),
        (GamepadTarget::X, DeviceButton::One),
        (GamepadTarget::Y, DeviceButton::Two),
        (GamepadTarget::Start, DeviceButton::Plus),
        (GamepadTarget::Back, DeviceButton::Minus),
        (GamepadTarget::Guide, DeviceButton::Home),
        (GamepadTarget::DPadUp, DeviceButton::DPadUp),
        (GamepadTarget::DPadDown, DeviceButton::DPadDown),
        (GamepadTarget::DPadLeft, DeviceButton::DPadLeft),
        (GamepadTarget::DPadRight, DeviceButton::DPadRight),
    ] {
        profile.bind(target, Some(button));
    }
    profile
}

fn decoded_state(buf: &[u8]) -> DeviceState {
    let mut state = DeviceState::new("wm-1");
    report::decode(buf)
        .expect("valid report")
        .apply(&mut state, &AccelCalibration::default());
    state
}

#[test]
fn test_identity_profile_covers_every_button_word() {
    let profile = identity_profile();
    let engine = MappingEngine::new(profile.clone());
    let mut state = DeviceState::new("wm-1");

    for word in 0..=u16::MAX {
        state.buttons = Buttons(word);
        let frame = engine.map(&state);

        for (target, button) in &profile.buttons {
            let TargetOutput::Button(pad) = target.output() else {
                unreachable!("identity profile only binds buttons");
            };
            assert_eq!(
                frame.is_pressed(pad),
                word & button.mask() != 0,
                "word {:04X}, {:?}",
                word,
                button
            );
        }
    }
}

#[test]
fn test_resting_report_through_default_profile() {
    init_logger();
    let state = decoded_state(&[0x31, 0x00, 0x08, 0x80, 0x80, 0xB3]);
    assert!(state.buttons.is_pressed(DeviceButton::A));

    // Default profile: X <- A
    let frame = MappingEngine::new(MappingProfile::default_profile()).map(&state);
    assert_eq!(frame.buttons, GamepadButton::X.mask());
    assert_eq!((frame.left_x, frame.left_y), (0, 0));
}

#[test]
fn test_one_and_two_to_a_and_b() {
    let mut profile = MappingProfile::new("1A 2B");
    profile.bind(GamepadTarget::A, Some(DeviceButton::One));
    profile.bind(GamepadTarget::B, Some(DeviceButton::Two));

    let state = decoded_state(&[0x30, 0x00, 0x02]);
    let frame = MappingEngine::new(profile).map(&state);

    assert!(frame.is_pressed(GamepadButton::A));
    assert!(!frame.is_pressed(GamepadButton::B));
    assert_eq!((frame.left_x, frame.left_y, frame.right_x, frame.right_y), (0, 0, 0, 0));
    assert_eq!((frame.left_trigger, frame.right_trigger), (0, 0));
}

#[test]
fn test_racing_tilt_steers_left_stick() {
    let engine = MappingEngine::new(ProfileTemplate::Racing.create());
    assert_eq!(engine.profile().accelerometer.target, AccelTarget::LeftStick);

    let mut state = DeviceState::new("wm-1");
    state.accelerometer = Accelerometer { x: 0.0, y: 0.3, z: 0.0 };
    let right = engine.map(&state);
    state.accelerometer = Accelerometer { x: 0.0, y: -0.3, z: 0.0 };
    let left = engine.map(&state);

    assert!(right.left_x > 0);
    assert_eq!(left.left_x, -right.left_x);
    assert_eq!(right.left_y, 0);
}

#[test]
fn test_rocket_league_uses_fixed_layout() {
    let engine = MappingEngine::new(ProfileTemplate::RocketLeague.create());
    assert_eq!(
        engine.strategy(),
        MappingStrategy::FixedLayout(FixedLayoutId::RocketLeague)
    );

    let mut state = DeviceState::new("wm-1");
    state.accelerometer = Accelerometer { x: 0.0, y: 0.0, z: 0.0 };
    for button in [DeviceButton::Two, DeviceButton::B, DeviceButton::DPadUp] {
        state.buttons.set(button, true);
    }

    let frame = engine.map(&state);
    assert_eq!(frame.right_trigger, 255);
    assert_eq!(frame.left_trigger, 0);
    assert!(frame.is_pressed(GamepadButton::B));
    assert!(frame.is_pressed(GamepadButton::DPadUp));
    assert!(!frame.is_pressed(GamepadButton::A));
}

#[test]
fn test_renamed_rocket_league_copy_uses_table() {
    let copy = ProfileTemplate::RocketLeague.create().clone_as("My RL");
    assert_eq!(MappingEngine::new(copy).strategy(), MappingStrategy::GenericTable);
}

#[test]
fn test_each_state_change_submits_one_frame() {
    let engine = MappingEngine::new(MappingProfile::default_profile());
    let mut sink = MockGamepadSink::new("p1");

    for buf in [[0x30, 0x00, 0x01], [0x30, 0x00, 0x00], [0x30, 0x10, 0x00]] {
        let state = decoded_state(&buf);
        engine.submit(&state, &mut sink).unwrap();
    }

    let frames = sink.submitted();
    assert_eq!(frames.len(), 3);
    assert!(frames[0].is_pressed(GamepadButton::A));
    assert!(frames[1].is_neutral());
    assert!(frames[2].is_pressed(GamepadButton::Start));
}
