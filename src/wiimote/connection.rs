//! Wiimote session management
//!
//! A `DeviceSession` drives one opened device through
//! `Disconnected -> Handshaking -> Streaming -> Disconnected`. It owns the
//! blocking read loop and the periodic status timer, merges every decoded
//! report into the shared `DeviceState`, and publishes each change on an
//! event channel.

use crate::backend::{ReadOutcome, Transport, TransportError};
use crate::mapping::config::Settings;
use crate::wiimote::constants::*;
use crate::wiimote::output::{led_for_index, EncodeError, OutputEncoder, ReportingMode};
use crate::wiimote::report::{self, InputReport, ReadDataReport, StatusReport};
use crate::wiimote::types::{AccelCalibration, DeviceState, ExtensionKind};
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use log::{debug, error, info, trace, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// How long a lifecycle event may wait for room on a full channel
const LIFECYCLE_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Status periods to wait for an extension identifier reply before asking again
const IDENTIFY_RETRY_PERIODS: u32 = 3;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Streaming,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    ReadFailed(TransportError),
    WriteFailed(TransportError),
    /// A command could not be framed for this transport
    EncodeFailed(EncodeError),
    /// `close` was called or the session was dropped
    Closed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ReadFailed(e) => write!(f, "read failed: {}", e),
            DisconnectReason::WriteFailed(e) => write!(f, "write failed: {}", e),
            DisconnectReason::EncodeFailed(e) => write!(f, "encode failed: {}", e),
            DisconnectReason::Closed => write!(f, "closed"),
        }
    }
}

/// Notifications published by a session
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Connected { device_id: String },
    StateChanged(Box<DeviceState>),
    Disconnected { device_id: String, reason: DisconnectReason },
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),
}

/// Per-session tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Output frame length used when the transport does not report one
    pub frame_len: usize,
    pub status_interval: Duration,
    pub read_timeout: Duration,
    pub read_calibration: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_len: DEFAULT_FRAME_LEN,
            status_interval: Duration::from_millis(STATUS_INTERVAL_MS),
            read_timeout: Duration::from_millis(READ_TIMEOUT_MS),
            read_calibration: true,
        }
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            frame_len: settings.frame_len,
            status_interval: settings.status_interval(),
            read_timeout: settings.read_timeout(),
            read_calibration: settings.read_calibration,
        }
    }
}

/// State shared between the session handle, the read loop and the status timer
struct SessionShared {
    device_id: String,
    transport: Arc<dyn Transport>,
    encoder: OutputEncoder,
    state: RwLock<DeviceState>,
    calibration: RwLock<AccelCalibration>,
    connection: Mutex<ConnectionState>,
    /// When the pending extension identifier read was sent
    identify_requested: Mutex<Option<Instant>>,
    /// How long an identifier read may go unanswered
    identify_timeout: Duration,
    disconnected: AtomicBool,
    cancel: CancellationToken,
    events: Sender<DeviceEvent>,
}

/// One connected Wiimote
pub struct DeviceSession {
    shared: Arc<SessionShared>,
}

impl DeviceSession {
    /// Run the handshake on an opened transport and start streaming.
    ///
    /// The read loop runs on the runtime's blocking pool and the status
    /// timer as an async task. A failed handshake closes the transport and
    /// publishes nothing.
    pub fn start(
        device_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
        led_index: usize,
        events: Sender<DeviceEvent>,
        runtime: &Handle,
    ) -> Result<Self, ConnectionError> {
        let device_id = device_id.into();
        let shared = Arc::new(SessionShared::new(device_id.clone(), transport, &config, events));

        info!("Handshaking with {} (slot {})", device_id, led_index);
        if let Err(e) = shared.handshake(led_index, config.read_calibration) {
            error!("Handshake with {} failed: {}", device_id, e);
            shared.disconnected.store(true, Ordering::SeqCst);
            shared.set_connection(ConnectionState::Disconnected);
            shared.transport.close();
            return Err(e);
        }

        shared.emit_lifecycle(DeviceEvent::Connected {
            device_id: device_id.clone(),
        });

        let reader = Arc::clone(&shared);
        let read_timeout = config.read_timeout;
        runtime.spawn_blocking(move || reader.read_loop(read_timeout));

        let poller = Arc::clone(&shared);
        let interval = config.status_interval;
        runtime.spawn(async move { poller.status_loop(interval).await });

        info!("✓ Session for {} started", device_id);
        Ok(Self { shared })
    }

    pub fn device_id(&self) -> &str {
        &self.shared.device_id
    }

    /// Snapshot of the merged device state
    pub fn state(&self) -> DeviceState {
        self.shared.read_state().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self
            .shared
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        !self.shared.disconnected.load(Ordering::SeqCst)
    }

    /// Calibration currently used to normalise accelerometer samples
    pub fn calibration(&self) -> AccelCalibration {
        *self
            .shared
            .calibration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the rumble motor; the LED state is resent unchanged
    pub fn set_rumble(&self, on: bool) -> Result<(), ConnectionError> {
        let leds = self.shared.read_state().leds;
        let frame = self.shared.encoder.led_rumble(leds, on)?;
        self.shared.write_or_disconnect(&frame)?;

        let snapshot = self.shared.update_state(|state| state.rumble = on);
        self.shared.publish(snapshot);
        Ok(())
    }

    /// Set the four player LEDs (bits 0x10..0x80)
    pub fn set_leds(&self, leds: u8) -> Result<(), ConnectionError> {
        let leds = leds & LED_MASK;
        let rumble = self.shared.read_state().rumble;
        let frame = self.shared.encoder.led_rumble(leds, rumble)?;
        self.shared.write_or_disconnect(&frame)?;

        let snapshot = self.shared.update_state(|state| state.leds = leds);
        self.shared.publish(snapshot);
        Ok(())
    }

    /// Stop the read loop and status timer; fires the disconnect event once
    pub fn close(&self) {
        self.shared.disconnect(DisconnectReason::Closed);
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device_id", &self.shared.device_id)
            .field("connection", &self.connection_state())
            .finish()
    }
}

impl SessionShared {
    fn new(
        device_id: String,
        transport: Arc<dyn Transport>,
        config: &SessionConfig,
        events: Sender<DeviceEvent>,
    ) -> Self {
        // Frames are padded to whatever the transport takes
        let frame_len = match transport.max_output_report_len() {
            0 => config.frame_len,
            len => {
                if len != config.frame_len {
                    debug!(
                        "{}: transport frames are {} bytes (configured {})",
                        device_id, len, config.frame_len
                    );
                }
                len
            }
        };

        let mut initial = DeviceState::new(device_id.clone());
        initial.connected = true;

        Self {
            device_id,
            transport,
            encoder: OutputEncoder::new(frame_len),
            state: RwLock::new(initial),
            calibration: RwLock::new(AccelCalibration::default()),
            connection: Mutex::new(ConnectionState::Handshaking),
            identify_requested: Mutex::new(None),
            identify_timeout: config.status_interval * IDENTIFY_RETRY_PERIODS,
            disconnected: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            events,
        }
    }

    fn handshake(&self, led_index: usize, read_calibration: bool) -> Result<(), ConnectionError> {
        self.write(&self.encoder.set_reporting_mode(ReportingMode::CoreAccel, true, false)?)?;

        let leds = led_for_index(led_index);
        self.write(&self.encoder.led_rumble(leds, false)?)?;
        self.update_state(|state| state.leds = leds);

        self.write(&self.encoder.status_request(false)?)?;

        if read_calibration {
            debug!("{}: requesting accelerometer calibration", self.device_id);
            self.write(&self.encoder.read_memory(
                MEMORY_SPACE_EEPROM,
                ACCEL_CALIBRATION_ADDR,
                ACCEL_CALIBRATION_LEN,
                false,
            )?)?;
        }

        Ok(())
    }

    fn read_loop(self: Arc<Self>, timeout: Duration) {
        debug!("Read loop for {} started", self.device_id);
        let len = self.transport.max_input_report_len().max(DEFAULT_FRAME_LEN);
        let mut buf = vec![0u8; len];

        while !self.cancel.is_cancelled() {
            match self.transport.read(&mut buf, timeout) {
                Ok(ReadOutcome::Data(n)) => self.handle_report(&buf[..n]),
                Ok(ReadOutcome::Timeout) => continue,
                Err(e) => {
                    if !self.cancel.is_cancelled() {
                        self.disconnect(DisconnectReason::ReadFailed(e));
                    }
                    break;
                }
            }
        }

        debug!("Read loop for {} exited", self.device_id);
    }

    async fn status_loop(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        // The handshake already asked for one
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Transport writes block
                    let shared = Arc::clone(&self);
                    let keep_polling = tokio::task::spawn_blocking(move || shared.poll_status())
                        .await
                        .unwrap_or_else(|e| {
                            error!("Status task for {} failed: {}", self.device_id, e);
                            false
                        });
                    if !keep_polling {
                        break;
                    }
                }
            }
        }

        debug!("Status timer for {} stopped", self.device_id);
    }

    /// Send one status request; returns false once the session is over
    fn poll_status(&self) -> bool {
        if self.disconnected.load(Ordering::SeqCst) {
            return false;
        }
        match self.send_status_request() {
            Ok(()) => true,
            Err(ConnectionError::Transport(e)) => {
                warn!("Status request to {} failed: {}", self.device_id, e);
                self.disconnect(DisconnectReason::WriteFailed(e));
                false
            }
            Err(ConnectionError::Encode(e)) => {
                error!("Cannot encode status request for {}: {}", self.device_id, e);
                self.disconnect(DisconnectReason::EncodeFailed(e));
                false
            }
        }
    }

    fn send_status_request(&self) -> Result<(), ConnectionError> {
        let rumble = self.read_state().rumble;
        self.write(&self.encoder.status_request(rumble)?)?;
        Ok(())
    }

    /// Decode, merge, run protocol follow-ups, then publish
    fn handle_report(&self, buf: &[u8]) {
        let Some(report) = report::decode(buf) else {
            trace!("{}: dropped report {:02X?}", self.device_id, &buf[..buf.len().min(4)]);
            return;
        };
        trace!("{}: {:?}", self.device_id, report);

        let calibration = *self.calibration.read().unwrap_or_else(PoisonError::into_inner);
        let mut previous_extension = ExtensionKind::None;
        let mut applied = false;
        self.update_state(|state| {
            // A disconnect resets the state under this lock
            if self.disconnected.load(Ordering::SeqCst) {
                return;
            }
            previous_extension = state.extension;
            report.apply(state, &calibration);
            applied = true;
        });

        if !applied {
            return;
        }
        self.mark_streaming();

        let follow_up = match &report {
            InputReport::Status(status) => self.on_status(status, previous_extension),
            InputReport::ReadData(read) => self.on_read_data(read),
            InputReport::Ack(ack) => {
                if ack.error != 0 {
                    warn!(
                        "{}: report 0x{:02X} rejected with error {}",
                        self.device_id, ack.report_id, ack.error
                    );
                }
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(e) = follow_up {
            warn!("{}: follow-up failed: {}", self.device_id, e);
            if let ConnectionError::Transport(e) = e {
                self.disconnect(DisconnectReason::WriteFailed(e));
                return;
            }
        }

        let snapshot = self.read_state().clone();
        self.publish(snapshot);
    }

    fn on_status(
        &self,
        status: &StatusReport,
        previous_extension: ExtensionKind,
    ) -> Result<(), ConnectionError> {
        if status.extension_connected() {
            let unknown = self.read_state().extension == ExtensionKind::None;
            if unknown && self.begin_identify() {
                info!("{}: extension plugged in, identifying", self.device_id);
                if let Err(e) = self.identify_extension() {
                    self.end_identify();
                    return Err(e);
                }
            }
        } else {
            self.end_identify();
            if previous_extension.is_attached() {
                info!("{}: {:?} removed", self.device_id, previous_extension);
                self.set_mode(ReportingMode::CoreAccel)?;
            }
        }
        Ok(())
    }

    /// Claim the identifier read; an unanswered one is reissued after the timeout
    fn begin_identify(&self) -> bool {
        let mut requested = self
            .identify_requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *requested {
            Some(at) if at.elapsed() < self.identify_timeout => false,
            Some(_) => {
                warn!("{}: no reply to extension identifier read, retrying", self.device_id);
                *requested = Some(Instant::now());
                true
            }
            None => {
                *requested = Some(Instant::now());
                true
            }
        }
    }

    fn end_identify(&self) {
        *self
            .identify_requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Disable encryption, then ask for the 6-byte identifier
    fn identify_extension(&self) -> Result<(), ConnectionError> {
        let rumble = self.read_state().rumble;
        let e = &self.encoder;
        self.write(&e.write_memory(
            MEMORY_SPACE_REGISTER,
            EXTENSION_INIT_ADDR_1,
            &[EXTENSION_INIT_VALUE_1],
            rumble,
        )?)?;
        self.write(&e.write_memory(
            MEMORY_SPACE_REGISTER,
            EXTENSION_INIT_ADDR_2,
            &[EXTENSION_INIT_VALUE_2],
            rumble,
        )?)?;
        self.write(&e.read_memory(
            MEMORY_SPACE_REGISTER,
            EXTENSION_ID_ADDR,
            EXTENSION_ID_LEN,
            rumble,
        )?)?;
        Ok(())
    }

    fn on_read_data(&self, read: &ReadDataReport) -> Result<(), ConnectionError> {
        // Replies only carry the low 16 address bits
        const EXTENSION_ID_ADDR_LO: u16 = (EXTENSION_ID_ADDR & 0xFFFF) as u16;
        const CALIBRATION_ADDR_LO: u16 = (ACCEL_CALIBRATION_ADDR & 0xFFFF) as u16;

        match read.address {
            EXTENSION_ID_ADDR_LO => {
                self.end_identify();
                if read.error != 0 {
                    warn!("{}: extension identifier read failed ({})", self.device_id, read.error);
                    return Ok(());
                }

                let kind = ExtensionKind::from_identifier(read.bytes());
                info!("{}: extension identified as {:?}", self.device_id, kind);
                self.update_state(|state| state.set_extension(kind));

                if kind.is_attached() {
                    self.set_mode(ReportingMode::CoreAccelExt)?;
                }
            }
            CALIBRATION_ADDR_LO => {
                if read.error != 0 {
                    warn!("{}: calibration read failed ({})", self.device_id, read.error);
                    return Ok(());
                }
                match AccelCalibration::from_eeprom(read.bytes()) {
                    Some(calibration) => {
                        info!("{}: using factory calibration {:?}", self.device_id, calibration);
                        *self.calibration.write().unwrap_or_else(PoisonError::into_inner) =
                            calibration;
                    }
                    None => warn!("{}: ignoring implausible calibration", self.device_id),
                }
            }
            other => debug!("{}: unsolicited read reply at 0x{:04X}", self.device_id, other),
        }
        Ok(())
    }

    fn set_mode(&self, mode: ReportingMode) -> Result<(), ConnectionError> {
        debug!("{}: reporting mode 0x{:02X}", self.device_id, mode.report_id());
        let rumble = self.read_state().rumble;
        self.write(&self.encoder.set_reporting_mode(mode, true, rumble)?)?;
        Ok(())
    }

    fn mark_streaming(&self) {
        let mut connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        if *connection == ConnectionState::Handshaking {
            *connection = ConnectionState::Streaming;
            info!("✓ {} streaming", self.device_id);
        }
    }

    fn set_connection(&self, next: ConnectionState) {
        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        trace!("{}: write {:02X?}", self.device_id, &frame[..frame.len().min(7)]);
        self.transport.write(frame)
    }

    /// A failed write ends the session
    fn write_or_disconnect(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.write(frame).map_err(|e| {
            self.disconnect(DisconnectReason::WriteFailed(e.clone()));
            e
        })
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, DeviceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate under the write lock and return the resulting snapshot
    fn update_state(&self, f: impl FnOnce(&mut DeviceState)) -> DeviceState {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
        state.clone()
    }

    /// State updates are dropped when the channel is full; the next one supersedes them
    fn publish(&self, snapshot: DeviceState) {
        match self.events.try_send(DeviceEvent::StateChanged(Box::new(snapshot))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("{}: event channel full", self.device_id),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn emit_lifecycle(&self, event: DeviceEvent) {
        match self.events.send_timeout(event, LIFECYCLE_SEND_TIMEOUT) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(event)) => {
                warn!("{}: dropped {:?}, nobody is listening", self.device_id, event)
            }
            Err(SendTimeoutError::Disconnected(_)) => {}
        }
    }

    fn disconnect(&self, reason: DisconnectReason) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        self.transport.close();
        self.set_connection(ConnectionState::Disconnected);
        self.update_state(|state| {
            state.connected = false;
            state.reset_sensor_data();
        });

        match &reason {
            DisconnectReason::Closed => info!("{} disconnected", self.device_id),
            other => warn!("{} disconnected: {}", self.device_id, other),
        }

        self.emit_lifecycle(DeviceEvent::Disconnected {
            device_id: self.device_id.clone(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockTransport;
    use crossbeam_channel::{bounded, Receiver};

    fn shared_with(transport: &Arc<MockTransport>) -> (SessionShared, Receiver<DeviceEvent>) {
        let (tx, rx) = bounded(10);
        let shared = SessionShared::new(
            "wm-test".to_string(),
            transport.clone(),
            &SessionConfig::default(),
            tx,
        );
        (shared, rx)
    }

    #[test]
    fn test_reports_after_disconnect_are_not_applied() {
        let transport = Arc::new(MockTransport::new());
        let (shared, rx) = shared_with(&transport);
        shared.disconnect(DisconnectReason::Closed);

        // Core buttons with A held
        shared.handle_report(&[0x30, 0x00, 0x08]);

        let state = shared.read_state().clone();
        assert!(!state.connected);
        assert_eq!(state.buttons.pressed().count(), 0);
        assert!(matches!(rx.try_recv(), Ok(DeviceEvent::Disconnected { .. })));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            *shared.connection.lock().unwrap(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_status_poll_writes_request() {
        let transport = Arc::new(MockTransport::new());
        let (shared, _rx) = shared_with(&transport);

        assert!(shared.poll_status());
        assert_eq!(transport.written_report_ids(), vec![0x15]);

        shared.disconnect(DisconnectReason::Closed);
        assert!(!shared.poll_status());
        assert_eq!(transport.written_report_ids(), vec![0x15]);
    }

    #[test]
    fn test_unencodable_status_request_disconnects() {
        let transport = Arc::new(MockTransport::with_frame_len(1));
        let (shared, rx) = shared_with(&transport);

        assert!(!shared.poll_status());
        assert!(transport.written().is_empty());
        assert!(transport.is_closed());
        match rx.try_recv() {
            Ok(DeviceEvent::Disconnected { reason, .. }) => assert_eq!(
                reason,
                DisconnectReason::EncodeFailed(EncodeError::FrameTooShort {
                    needed: 2,
                    frame_len: 1
                })
            ),
            other => panic!("expected disconnect, got {:?}", other),
        }
    }

    #[test]
    fn test_identifier_read_reissued_after_timeout() {
        let transport = Arc::new(MockTransport::new());
        let (tx, _rx) = bounded(10);
        let config = SessionConfig {
            status_interval: Duration::from_millis(5),
            ..SessionConfig::default()
        };
        let shared = SessionShared::new("wm-test".to_string(), transport.clone(), &config, tx);

        assert!(shared.begin_identify());
        assert!(!shared.begin_identify());
        std::thread::sleep(Duration::from_millis(30));
        assert!(shared.begin_identify());

        shared.end_identify();
        assert!(shared.begin_identify());
    }

    #[test]
    fn test_session_config_from_settings() {
        let mut settings = Settings::default();
        settings.read_timeout_ms = 50;
        settings.read_calibration = false;

        let config = SessionConfig::from(&settings);
        assert_eq!(config.frame_len, 22);
        assert_eq!(config.status_interval, Duration::from_millis(200));
        assert_eq!(config.read_timeout, Duration::from_millis(50));
        assert!(!config.read_calibration);
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::Closed.to_string(), "closed");
        assert_eq!(
            DisconnectReason::ReadFailed(TransportError::Closed).to_string(),
            "read failed: Transport closed"
        );
    }
}
