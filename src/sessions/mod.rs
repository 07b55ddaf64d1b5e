//! Audio session directories
//!
//! A [`SessionDirectory`] is the seam between the mapping engine and the
//! platform's audio stack: it enumerates who is playing audio and hands out
//! volume handles. The engine never talks to the OS directly.

mod directory;
mod memory;
mod pulse;

pub use directory::{
    LiveSession, ProcessId, SessionDirectory, SessionError, SessionSnapshot, VolumeControl,
    VolumeSetError,
};
pub use memory::MemoryDirectory;
pub use pulse::PulseDirectory;

use anyhow::{bail, Result};

/// Pick a session backend for this machine.
pub fn default_backend() -> Result<Box<dyn SessionDirectory>> {
    if PulseDirectory::detect() {
        return Ok(Box::new(PulseDirectory::new()));
    }
    bail!(
        "no supported audio session backend found (pactl is not reachable); \
         implement SessionDirectory for this platform"
    )
}
