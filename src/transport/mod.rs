//! Slider transport
//!
//! The microcontroller side of the link: port discovery and the frame
//! reader. The wire format is a newline-terminated `|`-separated batch of
//! raw readings.

mod serial;

pub use serial::{find_port, SerialTransport, SliderFrame, TransportError};
