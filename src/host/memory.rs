//! In-memory host for dry runs.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use super::OutputHost;

/// Every duty frame a `MemoryHost` has flushed, shareable with observers.
#[derive(Clone, Default, Debug)]
pub struct FrameLog(Arc<Mutex<Vec<Vec<u16>>>>);

impl FrameLog {
    pub fn frames(&self) -> Vec<Vec<u16>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<Vec<u16>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    fn push(&self, frame: Vec<u16>) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(frame);
    }
}

/// Keeps flushed frames instead of writing them anywhere.
pub struct MemoryHost {
    payload: Vec<u16>,
    log: FrameLog,
}

impl MemoryHost {
    pub fn new(channels: usize) -> MemoryHost {
        MemoryHost {
            payload: vec![0; channels],
            log: FrameLog::default(),
        }
    }

    /// Handle to the frames flushed so far.
    pub fn log(&self) -> FrameLog {
        self.log.clone()
    }
}

impl OutputHost for MemoryHost {
    fn take_duty(&mut self, channel: usize, duty: u16) {
        if let Some(slot) = self.payload.get_mut(channel) {
            *slot = duty;
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.push(self.payload.clone());
        Ok(())
    }
}
