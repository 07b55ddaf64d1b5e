//! In-memory session directory
//!
//! Backs the test suite: volumes are recorded instead of applied, and
//! handles can be marked stale to exercise the dispatcher's failure path.

use super::{
    LiveSession, ProcessId, SessionDirectory, SessionError, SessionSnapshot, VolumeControl,
    VolumeSetError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A recorded volume slot.
#[derive(Default)]
struct Slot {
    volume: Mutex<Option<f32>>,
    stale: AtomicBool,
}

/// Recording volume handle.
pub struct MemoryHandle {
    label: String,
    slot: Arc<Slot>,
}

impl VolumeControl for MemoryHandle {
    fn set_volume(&self, level: f32) -> Result<(), VolumeSetError> {
        if self.slot.stale.load(Ordering::SeqCst) {
            return Err(VolumeSetError {
                target: self.label.clone(),
            });
        }
        *self.slot.volume.lock().unwrap() = Some(level);
        Ok(())
    }
}

/// Directory over a fixed set of named sessions, plus master and system.
pub struct MemoryDirectory {
    master: Arc<Slot>,
    system_name: String,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl MemoryDirectory {
    /// Directory with the given application sessions and a system session
    /// named "system".
    pub fn new(names: &[&str]) -> Self {
        let dir = Self {
            master: Arc::new(Slot::default()),
            system_name: "system".to_string(),
            slots: Mutex::new(HashMap::new()),
        };
        // The system channel exists even when nothing plays through it.
        dir.add_session("system");
        for name in names {
            dir.add_session(name);
        }
        dir
    }

    /// Add a running application session.
    pub fn add_session(&self, name: &str) {
        let id = ProcessId::new(name);
        self.slots
            .lock()
            .unwrap()
            .entry(id.as_str().to_string())
            .or_insert_with(|| Arc::new(Slot::default()));
    }

    /// Remove a session, as if the process exited before the next snapshot.
    pub fn remove_session(&self, name: &str) {
        let id = ProcessId::new(name);
        self.slots.lock().unwrap().remove(id.as_str());
    }

    /// Invalidate a session's handle without removing it from the snapshot,
    /// as if the process exited after enumeration.
    pub fn mark_stale(&self, name: &str) {
        let id = ProcessId::new(name);
        if let Some(slot) = self.slots.lock().unwrap().get(id.as_str()) {
            slot.stale.store(true, Ordering::SeqCst);
        }
    }

    /// Last volume applied to a session, if any.
    pub fn volume(&self, name: &str) -> Option<f32> {
        let id = ProcessId::new(name);
        let slots = self.slots.lock().unwrap();
        let slot = slots.get(id.as_str())?;
        let vol = *slot.volume.lock().unwrap();
        vol
    }

    /// Last volume applied to the master output, if any.
    pub fn master_volume(&self) -> Option<f32> {
        *self.master.volume.lock().unwrap()
    }

    fn handle(&self, label: &str, slot: &Arc<Slot>) -> Arc<dyn VolumeControl> {
        Arc::new(MemoryHandle {
            label: label.to_string(),
            slot: Arc::clone(slot),
        })
    }
}

impl SessionDirectory for MemoryDirectory {
    fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let slots = self.slots.lock().unwrap();

        let system_id = ProcessId::new(&self.system_name);
        let system_slot = slots
            .get(system_id.as_str())
            .ok_or(SessionError::SystemSessionMissing)?;
        let system = LiveSession::new(
            system_id.clone(),
            self.handle(system_id.as_str(), system_slot),
        );

        let sessions: Vec<LiveSession> = slots
            .iter()
            .filter(|(name, _)| **name != self.system_name)
            .map(|(name, slot)| LiveSession::new(ProcessId::new(name), self.handle(name, slot)))
            .collect();

        Ok(SessionSnapshot::new(
            self.handle("master", &self.master),
            system,
            sessions,
        ))
    }
}
