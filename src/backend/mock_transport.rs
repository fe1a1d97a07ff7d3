//! Mock transport for testing.
//!
//! Reports queued with `push_report` are handed to `read` in order; every
//! written frame is recorded and logged instead of reaching a device.

use crate::backend::{ReadOutcome, Transport, TransportError, TransportOpener};
use crate::wiimote::constants::DEFAULT_FRAME_LEN;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Scripted in-memory transport
#[derive(Debug)]
pub struct MockTransport {
    frame_len: usize,
    inbound_tx: Sender<Vec<u8>>,
    inbound_rx: Receiver<Vec<u8>>,
    written: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_frame_len(DEFAULT_FRAME_LEN)
    }

    pub fn with_frame_len(frame_len: usize) -> Self {
        let (inbound_tx, inbound_rx) = unbounded();
        Self {
            frame_len,
            inbound_tx,
            inbound_rx,
            written: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Queue an input report; it is delivered unpadded, like a truncated frame
    pub fn push_report(&self, report: &[u8]) {
        debug!("[MOCK TRANSPORT] Queued report {:02X?}", report);
        let _ = self.inbound_tx.send(report.to_vec());
    }

    /// Every frame written so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Report IDs of every frame written so far
    pub fn written_report_ids(&self) -> Vec<u8> {
        self.written().iter().filter_map(|frame| frame.first().copied()).collect()
    }

    pub fn clear_written(&self) {
        self.written.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Make every later write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate the device going away: reads fail from now on
    pub fn disconnect(&self) {
        info!("[MOCK TRANSPORT] Device unplugged");
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<ReadOutcome, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        match self.inbound_rx.recv_timeout(timeout) {
            Ok(report) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(ReadOutcome::Data(len))
            }
            Err(RecvTimeoutError::Timeout) => {
                if self.is_closed() {
                    Err(TransportError::Closed)
                } else {
                    Ok(ReadOutcome::Timeout)
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Write("injected failure".to_string()));
        }
        if frame.len() < self.frame_len {
            return Err(TransportError::ShortFrame {
                len: frame.len(),
                frame_len: self.frame_len,
            });
        }

        info!("[MOCK TRANSPORT] Write {:02X?}", &frame[..frame.len().min(7)]);
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.to_vec());
        Ok(())
    }

    fn max_input_report_len(&self) -> usize {
        self.frame_len
    }

    fn max_output_report_len(&self) -> usize {
        self.frame_len
    }

    fn close(&self) {
        info!("[MOCK TRANSPORT] Closed");
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Opener over a fixed set of mock devices
#[derive(Debug, Default)]
pub struct MockTransportOpener {
    devices: Mutex<HashMap<String, Arc<MockTransport>>>,
}

impl MockTransportOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device reference; returns the transport so tests can drive it
    pub fn add_device(&self, device_ref: &str) -> Arc<MockTransport> {
        let transport = Arc::new(MockTransport::new());
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device_ref.to_string(), Arc::clone(&transport));
        transport
    }
}

impl TransportOpener for MockTransportOpener {
    fn open(&self, device_ref: &str) -> Result<Arc<dyn Transport>, TransportError> {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        match devices.get(device_ref) {
            Some(transport) => {
                info!("[MOCK TRANSPORT] Opened {}", device_ref);
                Ok(Arc::clone(transport) as Arc<dyn Transport>)
            }
            None => Err(TransportError::Open {
                device: device_ref.to_string(),
                reason: "no such device".to_string(),
            }),
        }
    }
}
