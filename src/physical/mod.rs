//! Physical layer interface consumed by the diagnostic server.
//!
//! The server does not drive a CAN controller itself; the host supplies an
//! implementation of [`CanInterface`] and the server limits itself to
//! polling for received frames and routing them to the transport links by
//! arbitration ID. Transmission is the transport links' business; they hold
//! their own handle on the bus.
//!
//! A frame-level error reported by the bus aborts at most one exchange; it
//! never touches diagnostic session state.

pub mod mock;

use crate::error::Result;
use crate::types::Frame;

/// Bus interface that must be implemented by platform-specific code.
pub trait CanInterface {
    /// Transmit one frame.
    fn transmit(&mut self, frame: &Frame) -> Result<()>;

    /// Non-blocking receive of one frame. `Ok(None)` means the bus had
    /// nothing pending.
    fn poll_frame(&mut self) -> Result<Option<Frame>>;
}
