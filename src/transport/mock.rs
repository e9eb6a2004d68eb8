use std::collections::VecDeque;

use super::{SendStatus, TransportLink};
use crate::error::{Result, UdsError};

/// Mock transport link for testing.
///
/// No segmentation is performed: every injected bus frame is surfaced as a
/// complete message, so tests drive the server either frame-by-frame through
/// the bus pump (requests up to one frame long) or by injecting whole
/// messages directly with [`MockLink::inject_message`].
pub struct MockLink {
    rx_queue: VecDeque<Vec<u8>>,
    tx_log: Vec<Vec<u8>>,
    send_status: SendStatus,
    fail_send: bool,
}

impl Default for MockLink {
    fn default() -> Self {
        Self {
            rx_queue: VecDeque::new(),
            tx_log: Vec::new(),
            send_status: SendStatus::Idle,
            fail_send: false,
        }
    }
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a whole message as if the transport had reassembled it.
    pub fn inject_message(&mut self, data: &[u8]) {
        self.rx_queue.push_back(data.to_vec());
    }

    /// Messages the server has sent on this link, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.tx_log
    }

    pub fn last_sent(&self) -> Option<&[u8]> {
        self.tx_log.last().map(Vec::as_slice)
    }

    pub fn clear_sent(&mut self) {
        self.tx_log.clear();
    }

    /// Overrides the reported send status, e.g. to hold a pending-response
    /// retry back while a long response is "still transmitting".
    pub fn set_send_status(&mut self, status: SendStatus) {
        self.send_status = status;
    }

    pub fn set_fail_send(&mut self, fail: bool) {
        self.fail_send = fail;
    }
}

impl TransportLink for MockLink {
    fn on_frame(&mut self, data: &[u8]) {
        // single-frame transport: one frame is one message
        self.rx_queue.push_back(data.to_vec());
    }

    fn poll(&mut self) {}

    fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_send {
            return Err(UdsError::Transport("simulated send fault".into()));
        }
        self.tx_log.push(data.to_vec());
        self.send_status = SendStatus::Idle;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.rx_queue.pop_front() {
            Some(msg) => {
                if msg.len() > buf.len() {
                    return Err(UdsError::BufferOverflow);
                }
                buf[..msg.len()].copy_from_slice(&msg);
                Ok(Some(msg.len()))
            }
            None => Ok(None),
        }
    }

    fn send_status(&self) -> SendStatus {
        self.send_status
    }
}
