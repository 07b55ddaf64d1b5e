//! Faderlink - physical sliders for desktop volumes
//!
//! Reads slider positions from a microcontroller over a serial link and maps
//! them onto the volumes of running applications, the system-sounds channel,
//! named application groups, and the master output.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod mapping;
pub mod sessions;
pub mod transport;

pub use config::Config;
pub use engine::Engine;
