//! The Controller applies commands to the channel state and the outputs.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::info;

use crate::config::Root;
use crate::driver::OutputDriver;
use crate::host::{self, OutputHost};
use crate::protocol::{Command, CommandKind, Confirmation};
use crate::state::{ChannelState, Snapshot, StateError};

/// Channel state and output driver behind one lock, shared by every session.
pub struct Controller {
    inner: Mutex<Inner>,
}

struct Inner {
    state: ChannelState,
    driver: OutputDriver,
}

/// Result type for applying commands.
pub type ApplyResult<T> = Result<T, ApplyError>;

#[derive(Debug, Error)]
pub enum ApplyError {
    /// The command was rejected; nothing changed.
    #[error(transparent)]
    State(#[from] StateError),
    /// The state changed but the outputs could not be written.
    #[error("output write failed: {0}")]
    Output(#[from] io::Error),
}

impl Controller {
    pub fn new(state: ChannelState, driver: OutputDriver) -> Controller {
        Controller {
            inner: Mutex::new(Inner { state, driver }),
        }
    }

    /// Build a controller and its host device from a configuration.
    pub fn from_config(config: &Root) -> io::Result<Controller> {
        let host = host::from_config(&config.output)?;
        Ok(Self::with_host(config, host))
    }

    /// Build a controller around an already constructed host.
    pub fn with_host(config: &Root, host: Box<dyn OutputHost>) -> Controller {
        let count = config.output.channels.len();
        for (index, channel) in config.output.channels.iter().enumerate() {
            info!(index, pin = channel.pin, name = ?channel.name, "output channel");
        }
        let state = ChannelState::new(count, config.defaults.channel, config.defaults.intensity);
        let driver = OutputDriver::new(host, count, config.output.max_duty());
        Controller::new(state, driver)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain values, a panic mid-command cannot corrupt it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update the state and drive the outputs for one command.
    ///
    /// The lock is held across both steps so commands from different
    /// sessions never interleave.
    pub fn apply(&self, cmd: Command) -> ApplyResult<Confirmation> {
        let mut inner = self.lock();
        let Inner { state, driver } = &mut *inner;

        match cmd {
            Command::SelectChannel(index) => {
                state.select(index)?;
                let snapshot = state.snapshot();
                driver.drive_exclusive(snapshot.selected, snapshot.intensity)?;
                Ok(Confirmation {
                    kind: CommandKind::SelectChannel,
                    value: snapshot.selected as i64,
                })
            }
            Command::SetIntensity(level) => {
                let applied = state.set_intensity(level);
                driver.drive(state.snapshot().selected, applied)?;
                Ok(Confirmation {
                    kind: CommandKind::SetIntensity,
                    value: i64::from(applied),
                })
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().state.snapshot()
    }

    /// Current duty of every output channel.
    pub fn duties(&self) -> Vec<u16> {
        self.lock().driver.duties()
    }

    pub fn channel_count(&self) -> usize {
        self.lock().state.channel_count()
    }
}
