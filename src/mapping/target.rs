//! Controllable targets
//!
//! A resolved slider points at one of these. Each variant fans a volume
//! level out to its underlying OS handles.

use crate::sessions::{LiveSession, ProcessId, VolumeControl, VolumeSetError};
use std::fmt;
use std::sync::Arc;

/// A volume sink a slider can drive.
#[derive(Clone)]
pub enum ControllableTarget {
    /// The master output.
    Master(Arc<dyn VolumeControl>),
    /// The system-sounds session.
    System(LiveSession),
    /// A single application session.
    Process(LiveSession),
    /// Several sessions moved together. May be empty, in which case setting
    /// the volume is a no-op.
    Group(Vec<LiveSession>),
}

impl ControllableTarget {
    /// Apply `level` to every underlying handle.
    ///
    /// Failures are collected rather than short-circuited, so one stale
    /// group member cannot block the rest.
    pub fn set_volume(&self, level: f32) -> Vec<VolumeSetError> {
        match self {
            ControllableTarget::Master(handle) => {
                handle.set_volume(level).err().into_iter().collect()
            }
            ControllableTarget::System(session) | ControllableTarget::Process(session) => {
                session.set_volume(level).err().into_iter().collect()
            }
            ControllableTarget::Group(members) => members
                .iter()
                .filter_map(|session| session.set_volume(level).err())
                .collect(),
        }
    }

    /// Ids of the sessions behind this target, in order. Master has none.
    pub fn member_ids(&self) -> Vec<ProcessId> {
        match self {
            ControllableTarget::Master(_) => Vec::new(),
            ControllableTarget::System(session) | ControllableTarget::Process(session) => {
                vec![session.id.clone()]
            }
            ControllableTarget::Group(members) => {
                members.iter().map(|session| session.id.clone()).collect()
            }
        }
    }
}

impl fmt::Debug for ControllableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllableTarget::Master(_) => write!(f, "Master"),
            ControllableTarget::System(session) => write!(f, "System({})", session.id),
            ControllableTarget::Process(session) => write!(f, "Process({})", session.id),
            ControllableTarget::Group(members) => {
                let ids: Vec<&str> = members.iter().map(|s| s.id.as_str()).collect();
                write!(f, "Group({})", ids.join(", "))
            }
        }
    }
}
