//! Session directory interface
//!
//! A session directory is the platform's view of who is playing audio: the
//! master output, the system-sounds channel, and one session per running
//! application. The resolver only ever works from a [`SessionSnapshot`], so
//! platform backends stay behind this seam.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Case-insensitive process identity: a lowercase-normalized executable name.
///
/// Backends decide how names are discovered; everything else compares ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(String);

impl ProcessId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A volume handle became unusable, typically because the process exited
/// after the snapshot was taken.
#[derive(Debug, Clone, Error)]
#[error("session '{target}' no longer accepts volume changes")]
pub struct VolumeSetError {
    /// Display name of the target that failed.
    pub target: String,
}

/// Errors from a session directory backend.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("system sounds session not found")]
    SystemSessionMissing,

    #[error("session backend failed: {0}")]
    Backend(String),
}

/// Sets the volume of one underlying OS resource.
pub trait VolumeControl: Send + Sync {
    /// Apply a volume level in `[0, 1]`.
    fn set_volume(&self, level: f32) -> Result<(), VolumeSetError>;
}

/// A live audio session: a process identity plus its volume handle.
#[derive(Clone)]
pub struct LiveSession {
    pub id: ProcessId,
    pub handle: Arc<dyn VolumeControl>,
}

impl LiveSession {
    pub fn new(id: ProcessId, handle: Arc<dyn VolumeControl>) -> Self {
        Self { id, handle }
    }

    pub fn set_volume(&self, level: f32) -> Result<(), VolumeSetError> {
        self.handle.set_volume(level)
    }
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession").field("id", &self.id).finish()
    }
}

/// One consistent view of the audio state, taken per resolution pass.
///
/// The session table includes the system session under its own id, so the
/// unmapped group can pick it up when it is not claimed elsewhere. Sessions
/// sharing an executable name collapse to one entry; the last handle the
/// backend reported wins.
pub struct SessionSnapshot {
    master: Arc<dyn VolumeControl>,
    system: LiveSession,
    sessions: BTreeMap<ProcessId, LiveSession>,
}

impl SessionSnapshot {
    pub fn new(
        master: Arc<dyn VolumeControl>,
        system: LiveSession,
        sessions: impl IntoIterator<Item = LiveSession>,
    ) -> Self {
        let mut table: BTreeMap<ProcessId, LiveSession> = sessions
            .into_iter()
            .map(|session| (session.id.clone(), session))
            .collect();
        table.insert(system.id.clone(), system.clone());

        Self {
            master,
            system,
            sessions: table,
        }
    }

    /// Handle for the master output. Always controllable.
    pub fn master(&self) -> Arc<dyn VolumeControl> {
        Arc::clone(&self.master)
    }

    /// The distinguished system-sounds session.
    pub fn system(&self) -> &LiveSession {
        &self.system
    }

    /// Case-insensitive lookup by executable name.
    pub fn get(&self, id: &ProcessId) -> Option<&LiveSession> {
        self.sessions.get(id)
    }

    /// All live sessions in deterministic id order, system included.
    pub fn sessions(&self) -> impl Iterator<Item = &LiveSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// The platform capability the mapping engine consumes.
pub trait SessionDirectory: Send + Sync {
    /// Enumerate the current audio state.
    ///
    /// Fails when the backend is unreachable or the system-sounds session
    /// cannot be found — the engine treats that as fatal at startup and as a
    /// reported, recoverable condition during refresh.
    fn snapshot(&self) -> Result<SessionSnapshot, SessionError>;
}

impl<D: SessionDirectory + ?Sized> SessionDirectory for Arc<D> {
    fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        (**self).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullControl;

    impl VolumeControl for NullControl {
        fn set_volume(&self, _level: f32) -> Result<(), VolumeSetError> {
            Ok(())
        }
    }

    fn session(name: &str) -> LiveSession {
        LiveSession::new(ProcessId::new(name), Arc::new(NullControl))
    }

    #[test]
    fn test_process_id_normalizes() {
        assert_eq!(ProcessId::new("Chrome.EXE"), ProcessId::new("chrome.exe"));
        assert_eq!(ProcessId::new("  spotify.exe "), ProcessId::new("spotify.exe"));
        assert_eq!(ProcessId::new("firefox").as_str(), "firefox");
    }

    #[test]
    fn test_snapshot_includes_system_session() {
        let snapshot = SessionSnapshot::new(
            Arc::new(NullControl),
            session("system"),
            vec![session("chrome.exe")],
        );

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get(&ProcessId::new("system")).is_some());
        assert!(snapshot.get(&ProcessId::new("chrome.exe")).is_some());
    }

    #[test]
    fn test_snapshot_deduplicates_by_id() {
        let snapshot = SessionSnapshot::new(
            Arc::new(NullControl),
            session("system"),
            vec![session("chrome.exe"), session("Chrome.exe")],
        );

        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_snapshot_session_order_is_deterministic() {
        let snapshot = SessionSnapshot::new(
            Arc::new(NullControl),
            session("system"),
            vec![session("spotify.exe"), session("chrome.exe")],
        );

        let ids: Vec<&str> = snapshot.sessions().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["chrome.exe", "spotify.exe", "system"]);
    }
}
