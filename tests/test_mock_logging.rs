//! Test to verify mock backends log output correctly

use std::time::Duration;
use wiimote_pad::backend::{GamepadSink, MockGamepadSink, MockTransport, Transport};
use wiimote_pad::mapping::frame::{GamepadAxis, GamepadButton};

#[test]
fn test_mock_sink_logs() {
    // Initialize a simple logger for testing
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();

    let mut sink = MockGamepadSink::new("logged");

    // Button presses log at debug, submits at info
    sink.reset_frame();
    sink.set_button(GamepadButton::A, true);
    sink.set_axis(GamepadAxis::LeftX, 32767);
    assert!(sink.submit().is_ok());
}

#[test]
fn test_mock_transport_logs() {
    // Initialize a simple logger for testing
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();

    let transport = MockTransport::new();

    // Queued reports, writes and close are all logged
    transport.push_report(&[0x30, 0x00, 0x00]);
    let mut buf = [0u8; 22];
    assert!(transport.read(&mut buf, Duration::from_millis(5)).is_ok());
    assert!(transport.write(&[0x11; 22]).is_ok());
    transport.close();
    assert!(transport.is_closed());
}
