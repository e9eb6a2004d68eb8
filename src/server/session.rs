//! Protocol status shared with user callbacks, and the state of an
//! in-progress download.

use super::services::{TransferHandler, SESSION_DEFAULT};

/// Current protocol status, readable by every user callback.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// Active diagnostic session type (see the `SESSION_*` constants; other
    /// values are possible because the session sub-function is masked with
    /// 0x4F, and it is the session-control callback's job to refuse ones it
    /// does not know).
    pub session_type: u8,
    /// Unlocked security level; 0 means locked.
    pub security_level: u8,
    /// True while a "response pending" (NRC 0x78) answer is outstanding for
    /// the request currently being processed.
    pub response_pending: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            session_type: SESSION_DEFAULT,
            security_level: 0,
            response_pending: false,
        }
    }
}

/// State of the one in-progress 0x34→0x36→0x37 download.
///
/// Exists from a successful RequestDownload until TransferExit or a fatal
/// TransferData error; a second RequestDownload while one exists is
/// rejected. The block sequence counter starts at 1 and wraps as an
/// unsigned byte after every accepted block.
pub struct TransferSession {
    handler: Box<dyn TransferHandler>,
    requested_transfer_size: usize,
    num_bytes_transferred: usize,
    block_sequence_counter: u8,
}

impl TransferSession {
    pub(crate) fn new(handler: Box<dyn TransferHandler>, requested_transfer_size: usize) -> Self {
        Self {
            handler,
            requested_transfer_size,
            num_bytes_transferred: 0,
            block_sequence_counter: 1,
        }
    }

    pub fn requested_transfer_size(&self) -> usize {
        self.requested_transfer_size
    }

    pub fn num_bytes_transferred(&self) -> usize {
        self.num_bytes_transferred
    }

    pub fn block_sequence_counter(&self) -> u8 {
        self.block_sequence_counter
    }

    pub(crate) fn handler_mut(&mut self) -> &mut dyn TransferHandler {
        self.handler.as_mut()
    }

    pub(crate) fn advance_block_counter(&mut self) {
        self.block_sequence_counter = self.block_sequence_counter.wrapping_add(1);
    }

    pub(crate) fn record_transferred(&mut self, n: usize) {
        self.num_bytes_transferred += n;
    }

    /// Would transferring `n` more bytes exceed what RequestDownload asked
    /// for?
    pub(crate) fn would_overrun(&self, n: usize) -> bool {
        self.num_bytes_transferred + n > self.requested_transfer_size
    }
}
