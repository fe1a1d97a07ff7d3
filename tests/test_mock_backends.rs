//! Integration tests for mock backends

use std::sync::Arc;
use std::time::Duration;
use wiimote_pad::backend::{
    GamepadSink, MockGamepadSink, MockTransport, MockTransportOpener, ReadOutcome, Transport,
    TransportError, TransportOpener,
};
use wiimote_pad::mapping::frame::{GamepadAxis, GamepadButton, GamepadSlider};

#[test]
fn test_mock_sink_backend() {
    let mut sink = MockGamepadSink::new("p1");

    sink.reset_frame();
    sink.set_button(GamepadButton::Start, true);
    sink.set_axis(GamepadAxis::RightY, -1200);
    sink.set_slider(GamepadSlider::LeftTrigger, 77);
    assert!(sink.submit().is_ok());

    let frame = sink.last_submitted().unwrap();
    assert!(frame.is_pressed(GamepadButton::Start));
    assert_eq!(frame.right_y, -1200);
    assert_eq!(frame.left_trigger, 77);
}

#[test]
fn test_mock_transport_backend() {
    let transport = MockTransport::new();
    assert_eq!(transport.max_input_report_len(), 22);
    assert_eq!(transport.max_output_report_len(), 22);

    transport.push_report(&[0x20, 0x00, 0x00, 0x10, 0x00, 0x00, 0xC8]);
    let mut buf = [0u8; 22];
    assert_eq!(
        transport.read(&mut buf, Duration::from_millis(10)),
        Ok(ReadOutcome::Data(7))
    );

    let mut frame = vec![0u8; 22];
    frame[0] = 0x15;
    assert!(transport.write(&frame).is_ok());
    assert_eq!(transport.written_report_ids(), vec![0x15]);
}

#[test]
fn test_mock_sinks_share_record_when_cloned() {
    let sink1 = MockGamepadSink::new("shared");
    let mut sink2 = sink1.clone();

    sink2.reset_frame();
    assert!(sink2.submit().is_ok());
    assert!(sink2.submit().is_ok());

    assert_eq!(sink1.submit_count(), 2);
}

#[test]
fn test_boxed_sink_forwards() {
    let observer = MockGamepadSink::new("boxed");
    let mut boxed: Box<dyn GamepadSink> = Box::new(observer.clone());

    boxed.reset_frame();
    boxed.set_button(GamepadButton::Guide, true);
    assert!(boxed.submit().is_ok());

    assert!(observer.last_submitted().unwrap().is_pressed(GamepadButton::Guide));
}

#[test]
fn test_opener_hands_out_shared_transport() {
    let opener = MockTransportOpener::new();
    let handle: Arc<MockTransport> = opener.add_device("wiimote-1");

    let opened = opener.open("wiimote-1").unwrap();
    handle.disconnect();

    let mut buf = [0u8; 22];
    assert_eq!(
        opened.read(&mut buf, Duration::from_millis(5)),
        Err(TransportError::Closed)
    );
}
