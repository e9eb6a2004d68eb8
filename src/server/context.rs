//! Per-dispatch views over the request and response buffers.

use super::services::{DiagnosticServices, Nrc, ServiceResult, NEGATIVE_RESPONSE_SID};
use super::session::{SessionStatus, TransferSession};
use crate::types::Timestamp;

/// How the request reached this ECU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Addressed to this ECU alone; a response is expected.
    Physical,
    /// Broadcast; "not applicable" outcomes stay silent.
    Functional,
}

/// Read-only view of one incoming request message.
pub struct RequestContext<'a> {
    data: &'a [u8],
    pub addressing: Addressing,
}

impl<'a> RequestContext<'a> {
    pub fn new(data: &'a [u8], addressing: Addressing) -> Self {
        Self { data, addressing }
    }

    /// Whole message, service identifier included.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn sid(&self) -> u8 {
        self.data[0]
    }
}

/// Bounded output buffer for one response message.
///
/// Writers can never move `len` past the buffer's capacity; an attempted
/// overflow surfaces as [`Nrc::GeneralProgrammingFailure`]. A suppressed
/// response is simply a cleared buffer.
pub struct ResponseContext<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> ResponseContext<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn write(&mut self, bytes: &[u8]) -> ServiceResult {
        if bytes.len() > self.remaining() {
            return Err(Nrc::GeneralProgrammingFailure);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    pub fn push(&mut self, byte: u8) -> ServiceResult {
        self.write(&[byte])
    }

    /// The not-yet-written tail of the buffer, for callbacks that fill in a
    /// record directly; commit what they wrote with [`advance`](Self::advance).
    pub fn tail_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.len += n;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Replaces whatever was written so far with the three-byte negative
    /// response `7F <sid> <code>`.
    pub(crate) fn set_negative(&mut self, sid: u8, nrc: Nrc) {
        self.len = 0;
        self.buf[0] = NEGATIVE_RESPONSE_SID;
        self.buf[1] = sid;
        self.buf[2] = nrc.code();
        self.len = 3;
    }
}

/// Everything a service handler may touch, split out of the server so the
/// request and response views can borrow its buffers at the same time.
pub(crate) struct ServiceContext<'a, S: DiagnosticServices> {
    pub status: &'a mut SessionStatus,
    pub services: &'a mut S,
    pub transfer: &'a mut Option<TransferSession>,
    pub now: Timestamp,
    pub p2_ms: u32,
    pub p2_star_ms: u32,
    pub s3_ms: u32,
    pub transfer_mtu: u16,
    pub s3_deadline: &'a mut Timestamp,
    pub not_ready_to_receive: &'a mut bool,
    pub ecu_reset_scheduled: &'a mut bool,
}
