//! High-level Wiimote Manager
//!
//! This module ties sessions, the mapping engine and the virtual gamepad
//! sinks together. Every connected device gets a `DeviceSession` on the
//! manager's tokio runtime and a mapper thread that turns its state changes
//! into frames for that device's own sink.

use crate::backend::{GamepadSink, Transport, TransportError, TransportOpener};
use crate::mapping::config::Config;
use crate::mapping::engine::MappingEngine;
use crate::mapping::frame::VirtualControllerFrame;
use crate::mapping::profile::MappingProfile;
use crate::mapping::store::{ProfileStore, StoreError};
use crate::wiimote::connection::{ConnectionError, DeviceEvent, DeviceSession, SessionConfig};
use crate::wiimote::types::DeviceState;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

/// Capacity of the per-device and outward event channels
const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Failed to start worker: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Device '{0}' is already connected")]
    AlreadyConnected(String),

    #[error("Device '{0}' is not connected")]
    UnknownDevice(String),

    #[error("Manager is stopped")]
    Stopped,
}

/// A connected device and its mapper thread
struct DeviceEntry {
    session: DeviceSession,
    slot: usize,
    mapper: Option<JoinHandle<()>>,
}

type DeviceMap = Arc<Mutex<HashMap<String, DeviceEntry>>>;

/// Manager for connected Wiimotes
pub struct DeviceManager {
    config: Config,
    runtime: Option<Runtime>,
    engine: Arc<RwLock<MappingEngine>>,
    event_sender: Sender<DeviceEvent>,
    event_receiver: Receiver<DeviceEvent>,
    /// Running flag
    running: Arc<AtomicBool>,
    devices: DeviceMap,
}

impl DeviceManager {
    /// Create a manager using the built-in default profile
    pub fn new(config: Config) -> Result<Self, ManagerError> {
        Self::with_profile(config, MappingProfile::default_profile())
    }

    pub fn with_profile(config: Config, profile: MappingProfile) -> Result<Self, ManagerError> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("wiimote-io")
            .build()?;
        let (event_sender, event_receiver) = bounded(EVENT_CHANNEL_CAPACITY);

        info!("✓ Wiimote Manager ready (profile '{}')", profile.name);

        Ok(Self {
            config,
            runtime: Some(runtime),
            engine: Arc::new(RwLock::new(MappingEngine::new(profile))),
            event_sender,
            event_receiver,
            running: Arc::new(AtomicBool::new(true)),
            devices: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Lifecycle and state events of every device, after mapping
    pub fn events(&self) -> Receiver<DeviceEvent> {
        self.event_receiver.clone()
    }

    /// Open `device_ref` through `opener` and connect it
    pub fn connect_with<S>(
        &self,
        opener: &dyn TransportOpener,
        device_ref: &str,
        sink: S,
    ) -> Result<(), ManagerError>
    where
        S: GamepadSink + 'static,
    {
        let transport = opener.open(device_ref)?;
        self.connect(device_ref, transport, sink)
    }

    /// Start a session on an opened transport; frames go to `sink`
    pub fn connect<S>(
        &self,
        device_id: &str,
        transport: Arc<dyn Transport>,
        sink: S,
    ) -> Result<(), ManagerError>
    where
        S: GamepadSink + 'static,
    {
        let runtime = match (&self.runtime, self.is_running()) {
            (Some(runtime), true) => runtime,
            _ => return Err(ManagerError::Stopped),
        };

        let mut devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        if devices.contains_key(device_id) {
            return Err(ManagerError::AlreadyConnected(device_id.to_string()));
        }

        let slot = free_slot(&devices);
        let (device_tx, device_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let session = DeviceSession::start(
            device_id,
            transport,
            SessionConfig::from(&self.config.settings),
            slot,
            device_tx,
            runtime.handle(),
        )?;

        let mapper = Mapper {
            device_id: device_id.to_string(),
            events: device_rx,
            engine: Arc::clone(&self.engine),
            sink,
            forward: self.event_sender.clone(),
            running: Arc::clone(&self.running),
            devices: Arc::clone(&self.devices),
        };
        let handle = thread::Builder::new()
            .name(format!("mapper-{}", device_id))
            .spawn(move || mapper.run())?;

        info!("✓ {} connected in slot {}", device_id, slot + 1);
        devices.insert(
            device_id.to_string(),
            DeviceEntry {
                session,
                slot,
                mapper: Some(handle),
            },
        );
        Ok(())
    }

    /// Close one device and wait for its mapper to finish
    pub fn disconnect(&self, device_id: &str) -> Result<(), ManagerError> {
        let entry = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device_id)
            .ok_or_else(|| ManagerError::UnknownDevice(device_id.to_string()))?;

        shutdown_entry(device_id, entry);
        Ok(())
    }

    /// Snapshot of a connected device's merged state
    pub fn device_state(&self, device_id: &str) -> Option<DeviceState> {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        devices.get(device_id).map(|entry| entry.session.state())
    }

    /// Ids of live devices, in slot order
    pub fn connected_devices(&self) -> Vec<String> {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        let mut live: Vec<(usize, String)> = devices
            .iter()
            .filter(|(_, entry)| entry.session.is_connected())
            .map(|(id, entry)| (entry.slot, id.clone()))
            .collect();
        live.sort();
        live.into_iter().map(|(_, id)| id).collect()
    }

    pub fn set_rumble(&self, device_id: &str, on: bool) -> Result<(), ManagerError> {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = devices
            .get(device_id)
            .ok_or_else(|| ManagerError::UnknownDevice(device_id.to_string()))?;
        entry.session.set_rumble(on)?;
        Ok(())
    }

    /// The profile every device is currently mapped through
    pub fn active_profile(&self) -> MappingProfile {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .profile()
            .clone()
    }

    /// Swap the mapping engine; takes effect on the next state change
    pub fn set_profile(&self, profile: MappingProfile) {
        let engine = MappingEngine::new(profile);
        *self.engine.write().unwrap_or_else(PoisonError::into_inner) = engine;
    }

    /// Load `name`, count the activation, persist it and switch to it
    pub fn activate_profile(
        &self,
        store: &dyn ProfileStore,
        name: &str,
    ) -> Result<MappingProfile, ManagerError> {
        let mut profile = store.load(name)?;
        profile.record_usage();
        let stored = store.save(&profile)?;

        info!("Activating profile '{}'", stored.name);
        self.set_profile(stored.clone());
        Ok(stored)
    }

    /// Close every device, join the mappers and shut the runtime down
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping Wiimote Manager...");

        let entries: Vec<(String, DeviceEntry)> = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (device_id, entry) in entries {
            shutdown_entry(&device_id, entry);
        }

        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_millis(500));
        }
        info!("✓ Wiimote Manager stopped");
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Lowest LED slot not used by a connected device
fn free_slot(devices: &HashMap<String, DeviceEntry>) -> usize {
    (0..)
        .find(|slot| devices.values().all(|entry| entry.slot != *slot))
        .unwrap_or(0)
}

fn shutdown_entry(device_id: &str, mut entry: DeviceEntry) {
    entry.session.close();
    if let Some(handle) = entry.mapper.take() {
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("Mapper thread for {} panicked", device_id);
        }
    }
}

/// Per-device loop: state change in, frame out
struct Mapper<S: GamepadSink> {
    device_id: String,
    events: Receiver<DeviceEvent>,
    engine: Arc<RwLock<MappingEngine>>,
    sink: S,
    forward: Sender<DeviceEvent>,
    running: Arc<AtomicBool>,
    devices: DeviceMap,
}

impl<S: GamepadSink> Mapper<S> {
    fn run(mut self) {
        info!("Mapper for {} started", self.device_id);

        loop {
            match self.events.recv_timeout(Duration::from_millis(100)) {
                Ok(DeviceEvent::StateChanged(state)) => {
                    let result = {
                        let engine = self.engine.read().unwrap_or_else(PoisonError::into_inner);
                        engine.submit(&state, &mut self.sink)
                    };
                    if let Err(e) = result {
                        warn!("{}: frame not submitted: {}", self.device_id, e);
                    }
                    self.forward(DeviceEvent::StateChanged(state));
                }
                Ok(event @ DeviceEvent::Connected { .. }) => self.forward(event),
                Ok(event @ DeviceEvent::Disconnected { .. }) => {
                    // Release everything the game might still see as held
                    if let Err(e) = VirtualControllerFrame::default().submit_to(&mut self.sink) {
                        warn!("{}: neutral frame not submitted: {}", self.device_id, e);
                    }
                    self.forward(event);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.running.load(Ordering::SeqCst) && self.events.is_empty() {
                        debug!("{}: manager stopped", self.device_id);
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Sessions that ended on their own are forgotten here
        let finished = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.device_id);
        if let Some(entry) = finished {
            shutdown_entry(&self.device_id, entry);
        }

        info!("Mapper for {} stopped", self.device_id);
    }

    fn forward(&self, event: DeviceEvent) {
        if self.forward.try_send(event).is_err() {
            debug!("{}: no room for observer event", self.device_id);
        }
    }
}
