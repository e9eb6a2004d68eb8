//! Transport layer interface consumed by the diagnostic server.
//!
//! UDS sits on a segmentation transport (in practice ISO-TP, ISO 15765-2)
//! that turns CAN frames into variable-length messages. The server treats
//! that transport as a reliable datagram channel: whole request messages
//! come out of [`TransportLink::receive`], whole response messages go into
//! [`TransportLink::send`], and segmentation bookkeeping stays behind the
//! trait.
//!
//! The server owns two links, one per addressing scheme:
//! - the *physical* link carries requests addressed to this ECU alone and
//!   all outgoing responses for them,
//! - the *functional* link carries broadcast requests.
//!
//! [`TransportLink::send_status`] matters for one protocol corner: after a
//! "response pending" (NRC 0x78) negative response, the server waits for the
//! physical link's send side to drain before re-running the long service.

pub mod mock;

use crate::error::Result;

/// State of a link's send side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Nothing queued; the last message has been fully handed to the bus.
    Idle,
    /// A message is still being segmented onto the bus.
    InProgress,
}

/// One segmentation link (e.g. an ISO-TP channel bound to a CAN ID pair).
pub trait TransportLink {
    /// Feeds one received bus frame into the link's reassembly state.
    fn on_frame(&mut self, data: &[u8]);

    /// Periodic bookkeeping: flow-control timers, continued transmission.
    fn poll(&mut self);

    /// Queues one whole message for transmission.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Drains one whole received message into `buf`, returning its length,
    /// or `Ok(None)` when no complete message is pending.
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    fn send_status(&self) -> SendStatus;
}
