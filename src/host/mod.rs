//! Host devices receive duty values and produce physical output.

use std::io;

use tracing::info;

use crate::config;

pub mod memory;
pub mod serial;
pub use self::memory::{FrameLog, MemoryHost};
pub use self::serial::SerialPwm;

/// Output hosts buffer per-channel duty values and push them to a PWM device.
pub trait OutputHost: Send {
    /// Accept a single channel's duty value.
    fn take_duty(&mut self, channel: usize, duty: u16);
    /// Write the current buffer to the device.
    fn flush(&mut self) -> io::Result<()>;
}

/// Set up the host device described by the output configuration.
pub fn from_config(output: &config::Output) -> io::Result<Box<dyn OutputHost>> {
    let host: Box<dyn OutputHost> = match &output.host {
        config::Host::Serial { path, baud_rate } => {
            Box::new(SerialPwm::new(path.as_deref(), *baud_rate, output)?)
        }
        config::Host::Memory => {
            info!(channels = output.channels.len(), "keeping duty frames in memory");
            Box::new(MemoryHost::new(output.channels.len()))
        }
    };
    Ok(host)
}
