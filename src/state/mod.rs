//! Which channel is selected and how hard it is driven.

use thiserror::Error;

/// Highest accepted intensity, in percent.
pub const MAX_INTENSITY: u8 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("channel {index} is out of range, {count} channels available")]
    OutOfRange { index: i64, count: usize },
}

/// Consistent copy of the channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub selected: usize,
    pub intensity: u8,
}

/// Selected channel and intensity.
///
/// Not synchronized on its own; the controller keeps it behind the same lock
/// as the output driver.
#[derive(Debug)]
pub struct ChannelState {
    selected: usize,
    intensity: u8,
    count: usize,
}

impl ChannelState {
    /// Start on `selected` at `intensity` with `count` channels available.
    ///
    /// Out-of-range starting values are pulled into range.
    pub fn new(count: usize, selected: usize, intensity: u8) -> ChannelState {
        ChannelState {
            selected: selected.min(count.saturating_sub(1)),
            intensity: intensity.min(MAX_INTENSITY),
            count,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.count
    }

    pub fn select(&mut self, index: i64) -> Result<(), StateError> {
        match usize::try_from(index) {
            Ok(selected) if selected < self.count => {
                self.selected = selected;
                Ok(())
            }
            _ => Err(StateError::OutOfRange {
                index,
                count: self.count,
            }),
        }
    }

    /// Store `level` clamped into `0..=100` and return what was stored.
    pub fn set_intensity(&mut self, level: i64) -> u8 {
        self.intensity = level.clamp(0, MAX_INTENSITY as i64) as u8;
        self.intensity
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            selected: self.selected,
            intensity: self.intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_accepts_valid_indices() {
        let mut state = ChannelState::new(3, 0, 50);
        state.select(2).expect("in range");
        assert_eq!(state.snapshot(), Snapshot { selected: 2, intensity: 50 });
    }

    #[test]
    fn select_rejects_out_of_range() {
        let mut state = ChannelState::new(3, 1, 50);
        assert_eq!(state.select(3), Err(StateError::OutOfRange { index: 3, count: 3 }));
        assert_eq!(state.select(-1), Err(StateError::OutOfRange { index: -1, count: 3 }));
        assert_eq!(state.snapshot().selected, 1);
    }

    #[test]
    fn intensity_is_clamped() {
        let mut state = ChannelState::new(3, 0, 50);
        assert_eq!(state.set_intensity(70), 70);
        assert_eq!(state.set_intensity(250), 100);
        assert_eq!(state.snapshot().intensity, 100);
        assert_eq!(state.set_intensity(-4), 0);
        assert_eq!(state.set_intensity(i64::MAX), 100);
    }

    #[test]
    fn starting_values_are_pulled_into_range() {
        let state = ChannelState::new(2, 5, 180);
        assert_eq!(state.snapshot(), Snapshot { selected: 1, intensity: 100 });
        assert_eq!(state.channel_count(), 2);
    }
}
