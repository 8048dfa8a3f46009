//! Per-channel slave configuration.

use crate::channel::Direction;
use crate::constants::MAX_IRQ_PARAM;
use crate::error::{Result, XdmaError};

/// Operating parameters pushed to a channel before transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Channel direction
    pub direction: Direction,
    /// Interrupt coalescing threshold (completions per interrupt)
    pub coalesce: u32,
    /// Interrupt delay counter
    pub delay: u32,
    /// Reset the channel when applying
    pub reset: bool,
}

impl ChannelConfig {
    /// One interrupt per completion, no delay, no reset.
    pub const fn new(direction: Direction) -> Self {
        Self {
            direction,
            coalesce: 1,
            delay: 0,
            reset: false,
        }
    }

    pub fn coalesce(mut self, n: u32) -> Self {
        self.coalesce = n;
        self
    }

    pub fn delay(mut self, n: u32) -> Self {
        self.delay = n;
        self
    }

    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Check register ranges and normalize a zero threshold to one.
    pub fn normalized(self) -> Result<Self> {
        if self.coalesce > MAX_IRQ_PARAM {
            return Err(XdmaError::InvalidConfig("coalesce threshold exceeds 255"));
        }
        if self.delay > MAX_IRQ_PARAM {
            return Err(XdmaError::InvalidConfig("delay count exceeds 255"));
        }
        Ok(Self {
            coalesce: self.coalesce.max(1),
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ChannelConfig::new(Direction::DevToMem);
        assert_eq!(c.coalesce, 1);
        assert_eq!(c.delay, 0);
        assert!(!c.reset);
    }

    #[test]
    fn test_normalized() {
        let c = ChannelConfig::new(Direction::MemToDev).coalesce(0).normalized().unwrap();
        assert_eq!(c.coalesce, 1);

        let c = ChannelConfig::new(Direction::MemToDev).coalesce(255).delay(255);
        assert!(c.normalized().is_ok());

        let bad = ChannelConfig::new(Direction::MemToDev).coalesce(256);
        assert!(matches!(bad.normalized(), Err(XdmaError::InvalidConfig(_))));

        let bad = ChannelConfig::new(Direction::MemToDev).delay(1000);
        assert!(matches!(bad.normalized(), Err(XdmaError::InvalidConfig(_))));
    }
}
