//! PWM bridge on a serial port.
//!
//! Packets are framed like a DMX USB widget message:
//!
//! ```text
//! 0x7E | label | length (u16 LE) | payload | 0xE7
//! ```
//!
//! The setup packet carries the PWM frequency, resolution and pin map. Duty
//! packets carry one little-endian `u16` per channel.

use std::io::{self, Write};
use std::time::Duration;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, info};

use super::OutputHost;
use crate::config;

const START: u8 = 0x7e;
const END: u8 = 0xe7;
const LABEL_SETUP: u8 = 1;
const LABEL_DUTY: u8 = 6;

/// The serial host passes duty values to a PWM controller connected through
/// a USB serial port.
pub struct SerialPwm {
    /// Output port. Without one, packets are only logged.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// Duty values for every channel.
    payload: Vec<u16>,
}

impl SerialPwm {
    /// Open the port and configure the bridge's PWM channels.
    pub fn new(path: Option<&str>, baud_rate: u32, output: &config::Output) -> io::Result<SerialPwm> {
        info!(?path, baud_rate, "serial PWM bridge");
        let mut port = match path {
            Some(path) => Some(
                serialport::new(path, baud_rate)
                    .timeout(Duration::from_millis(100))
                    .open()?,
            ),
            None => None,
        };

        let setup = setup_packet(output)?;
        if let Some(port) = port.as_mut() {
            port.write_all(&setup)?;
            port.flush()?;
        }

        Ok(SerialPwm {
            port,
            payload: vec![0; output.channels.len()],
        })
    }
}

impl OutputHost for SerialPwm {
    fn take_duty(&mut self, channel: usize, duty: u16) {
        if let Some(slot) = self.payload.get_mut(channel) {
            *slot = duty;
        }
    }

    /// Flush current buffer into the bridge.
    fn flush(&mut self) -> io::Result<()> {
        let packet = duty_packet(&self.payload)?;
        match self.port.as_mut() {
            Some(port) => {
                port.write_all(&packet)?;
                port.flush()?;
                debug!(duties = ?self.payload, "wrote PWM duty packet");
            }
            None => debug!(duties = ?self.payload, "no serial port, dropping duty packet"),
        }
        Ok(())
    }
}

fn write_packet<W: Write>(writer: &mut W, label: u8, payload: &[u8]) -> io::Result<()> {
    let length = u16::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "packet payload too long"))?;
    writer.write_u8(START)?;
    writer.write_u8(label)?;
    writer.write_u16::<LittleEndian>(length)?;
    writer.write_all(payload)?;
    writer.write_u8(END)?;
    Ok(())
}

fn setup_packet(output: &config::Output) -> io::Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(6 + output.channels.len());
    payload.write_u32::<LittleEndian>(output.frequency)?;
    payload.write_u8(output.resolution_bits)?;
    let count = u8::try_from(output.channels.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many channels for the bridge"))?;
    payload.write_u8(count)?;
    for channel in &output.channels {
        payload.write_u8(channel.pin)?;
    }

    let mut packet = Vec::with_capacity(payload.len() + 5);
    write_packet(&mut packet, LABEL_SETUP, &payload)?;
    Ok(packet)
}

fn duty_packet(duties: &[u16]) -> io::Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(duties.len() * 2);
    for duty in duties {
        payload.write_u16::<LittleEndian>(*duty)?;
    }

    let mut packet = Vec::with_capacity(payload.len() + 5);
    write_packet(&mut packet, LABEL_DUTY, &payload)?;
    Ok(packet)
}
