//! Maps channel intensities onto PWM duty values.

use std::io;

use tracing::debug;

use crate::host::OutputHost;

/// One physical drive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputChannel {
    pub index: usize,
    pub duty: u16,
}

/// Owns the output channels and the host they are written through.
pub struct OutputDriver {
    host: Box<dyn OutputHost>,
    channels: Vec<OutputChannel>,
    max_duty: u16,
}

impl OutputDriver {
    /// `count` channels, all at zero duty, scaled onto `0..=max_duty`.
    pub fn new(host: Box<dyn OutputHost>, count: usize, max_duty: u16) -> OutputDriver {
        OutputDriver {
            host,
            channels: (0..count).map(|index| OutputChannel { index, duty: 0 }).collect(),
            max_duty,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Linear map of `0..=100` percent onto `0..=max_duty`, truncating.
    pub fn scale(&self, intensity_percent: u8) -> u16 {
        let percent = u32::from(intensity_percent.min(100));
        (percent * u32::from(self.max_duty) / 100) as u16
    }

    /// Set one channel's duty and leave the others alone.
    pub fn drive(&mut self, channel: usize, intensity_percent: u8) -> io::Result<()> {
        let duty = self.scale(intensity_percent);
        let slot = self.channels.get_mut(channel).ok_or_else(|| no_such_channel(channel))?;
        slot.duty = duty;
        self.host.take_duty(channel, duty);
        debug!(channel, duty, "drive");
        self.host.flush()
    }

    /// Drive `selected` and switch every other channel off in one flush.
    pub fn drive_exclusive(&mut self, selected: usize, intensity_percent: u8) -> io::Result<()> {
        if selected >= self.channels.len() {
            return Err(no_such_channel(selected));
        }
        let duty = self.scale(intensity_percent);
        for slot in &mut self.channels {
            slot.duty = if slot.index == selected { duty } else { 0 };
            self.host.take_duty(slot.index, slot.duty);
        }
        debug!(selected, duty, "drive exclusive");
        self.host.flush()
    }

    /// Current duty of every channel, by index.
    pub fn duties(&self) -> Vec<u16> {
        self.channels.iter().map(|slot| slot.duty).collect()
    }
}

fn no_such_channel(channel: usize) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("no output channel {}", channel))
}
