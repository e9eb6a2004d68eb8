use std::collections::VecDeque;

use super::CanInterface;
use crate::error::{Result, UdsError};
use crate::types::{CanId, Frame};

/// Mock bus for testing.
///
/// Frames queued with [`MockCan::inject`] are handed out one per
/// [`CanInterface::poll_frame`] call; transmitted frames are recorded.
#[derive(Default)]
pub struct MockCan {
    rx_queue: VecDeque<Frame>,
    tx_log: Vec<Frame>,
    fail_rx: bool,
}

impl MockCan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame as if it had arrived on the bus.
    pub fn inject(&mut self, id: CanId, data: &[u8]) {
        self.rx_queue.push_back(Frame {
            id,
            data: data.to_vec(),
            ..Frame::default()
        });
    }

    /// Makes the next `poll_frame` calls report a bus error.
    pub fn set_fail_rx(&mut self, fail: bool) {
        self.fail_rx = fail;
    }

    pub fn transmitted(&self) -> &[Frame] {
        &self.tx_log
    }
}

impl CanInterface for MockCan {
    fn transmit(&mut self, frame: &Frame) -> Result<()> {
        self.tx_log.push(frame.clone());
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_rx {
            return Err(UdsError::Bus("simulated rx fault".into()));
        }
        Ok(self.rx_queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_through_the_mock() {
        let mut bus = MockCan::new();
        bus.inject(0x7E0, &[0x3E, 0x00]);

        let frame = bus.poll_frame().unwrap().unwrap();
        assert_eq!(frame.id, 0x7E0);
        assert_eq!(frame.data, vec![0x3E, 0x00]);
        assert!(bus.poll_frame().unwrap().is_none());

        bus.transmit(&frame).unwrap();
        assert_eq!(bus.transmitted().len(), 1);
    }
}
