//! Server side of UDS (ISO 14229-1): the request/response engine of an ECU.
//!
//! A diagnostic tester sends service requests: change session, reset, read
//! and write data, run routines, download firmware. This engine
//! dispatches each one to the deployment's [`DiagnosticServices`]
//! implementation, enforces the standard's response rules, and drives the
//! protocol timers:
//!
//! - **p2**: minimum spacing before the next request is picked up.
//! - **p2\***: the extended window advertised to the client after a
//!   "response pending" answer.
//! - **S3**: session liveness; expiry in a non-default session invokes the
//!   deployment's timeout callback.
//!
//! The engine is single-threaded and cooperative: the host calls
//! [`Server::poll`] from one context at its own cadence, and everything
//! (bus pumping, timers, dispatch, user callbacks) runs inside that call.
//! At most one request is dispatched and at most one response produced per
//! poll.
//!
//! Requests arrive on two transport links: the *physical* link (addressed
//! to this ECU) and the *functional* link (broadcast). The physical link
//! wins when both have a message pending.

mod context;
mod dispatch;
mod handlers;
pub mod services;
pub mod session;


use log::{trace, warn};

use crate::error::{Result, UdsError};
use crate::physical::CanInterface;
use crate::transport::{SendStatus, TransportLink};
use crate::types::{time_after, CanId, Clock, Config, Timestamp};
use context::{Addressing, RequestContext, ResponseContext, ServiceContext};
use services::{DiagnosticServices, Nrc, SESSION_DEFAULT};
use session::{SessionStatus, TransferSession};

pub use services::{DownloadRequest, RoutineControlArgs, ServiceResult, TransferHandler};

/// Server timing, addressing and buffer parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Arbitration ID of physically addressed requests.
    pub phys_recv_id: CanId,
    /// Arbitration ID of functionally addressed (broadcast) requests.
    pub func_recv_id: CanId,
    /// Minimum spacing between handled requests, milliseconds.
    pub p2_ms: u32,
    /// Extended response window advertised in the 0x10 response (10 ms
    /// resolution on the wire).
    pub p2_star_ms: u32,
    /// Session timeout, milliseconds.
    pub s3_ms: u32,
    /// Capacity of the request scratch buffer.
    pub recv_buf_size: usize,
    /// Capacity of the response scratch buffer.
    pub send_buf_size: usize,
    /// Upper bound for the advertised maxNumberOfBlockLength; the classical
    /// ISO-TP message limit by default.
    pub transfer_mtu: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            phys_recv_id: 0x7E0,
            func_recv_id: 0x7DF,
            p2_ms: 50,
            p2_star_ms: 5000,
            s3_ms: 5000,
            recv_buf_size: 4095,
            send_buf_size: 4095,
            transfer_mtu: 4095,
        }
    }
}

impl Config for ServerConfig {
    fn validate(&self) -> Result<()> {
        if self.p2_ms == 0 || self.p2_star_ms == 0 || self.s3_ms == 0 {
            return Err(UdsError::InvalidParameter);
        }
        // room for at least a negative response
        if self.recv_buf_size <= 2 || self.send_buf_size <= 2 {
            return Err(UdsError::InvalidParameter);
        }
        if self.transfer_mtu < 3 {
            return Err(UdsError::InvalidParameter);
        }
        if self.phys_recv_id == self.func_recv_id {
            return Err(UdsError::InvalidParameter);
        }
        Ok(())
    }
}

/// The UDS server. Owns both transport links, the bus receive side, the
/// clock, the deployment's services, and all protocol state.
///
/// Initialized once, polled repeatedly.
pub struct Server<L, B, C, S>
where
    L: TransportLink,
    B: CanInterface,
    C: Clock,
    S: DiagnosticServices,
{
    config: ServerConfig,
    phys_link: L,
    func_link: L,
    can: B,
    clock: C,
    services: S,

    status: SessionStatus,
    transfer: Option<TransferSession>,

    /// Earliest instant the next request may be handled.
    p2_timer: Timestamp,
    /// S3 deadline; meaningful only outside the default session.
    s3_deadline: Timestamp,
    /// No new requests while a deferred response is outstanding or a reset
    /// has been committed.
    not_ready_to_receive: bool,
    ecu_reset_scheduled: bool,

    /// Last received request, kept for the deferred re-dispatch after a
    /// "response pending" answer.
    req_buf: Vec<u8>,
    req_len: usize,
    resp_buf: Vec<u8>,
}

impl<L, B, C, S> Server<L, B, C, S>
where
    L: TransportLink,
    B: CanInterface,
    C: Clock,
    S: DiagnosticServices,
{
    pub fn new(
        config: ServerConfig,
        phys_link: L,
        func_link: L,
        can: B,
        clock: C,
        services: S,
    ) -> Result<Self> {
        config.validate()?;
        let now = clock.now_ms();
        Ok(Self {
            // already elapsed, so the first request is handled immediately
            p2_timer: now.wrapping_sub(config.p2_ms),
            s3_deadline: now.wrapping_add(config.s3_ms),
            req_buf: vec![0; config.recv_buf_size],
            req_len: 0,
            resp_buf: vec![0; config.send_buf_size],
            status: SessionStatus::default(),
            transfer: None,
            not_ready_to_receive: false,
            ecu_reset_scheduled: false,
            config,
            phys_link,
            func_link,
            can,
            clock,
            services,
        })
    }

    /// Current protocol status.
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// The in-progress download, if any.
    pub fn transfer_session(&self) -> Option<&TransferSession> {
        self.transfer.as_ref()
    }

    /// True once a positive ECUReset response was produced; the server
    /// accepts no further requests and the host is expected to reset.
    pub fn ecu_reset_scheduled(&self) -> bool {
        self.ecu_reset_scheduled
    }

    pub fn services(&self) -> &S {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut S {
        &mut self.services
    }

    pub fn phys_link_mut(&mut self) -> &mut L {
        &mut self.phys_link
    }

    pub fn func_link_mut(&mut self) -> &mut L {
        &mut self.func_link
    }

    pub fn can_mut(&mut self) -> &mut B {
        &mut self.can
    }

    /// One cooperative step: pump the bus into the links, run the timers,
    /// and handle at most one request.
    pub fn poll(&mut self) {
        match self.can.poll_frame() {
            Ok(Some(frame)) => {
                if frame.id == self.config.phys_recv_id {
                    self.phys_link.on_frame(&frame.data);
                } else if frame.id == self.config.func_recv_id {
                    self.func_link.on_frame(&frame.data);
                } else {
                    trace!("dropping frame with arbitration id {:#x}", frame.id);
                }
            }
            Ok(None) => {}
            Err(err) => warn!("bus receive error: {err}"),
        }
        self.phys_link.poll();
        self.func_link.poll();

        let now = self.clock.now_ms();

        // ISO 14229-1:2013 Figure 38: session timeout (S3)
        if self.status.session_type != SESSION_DEFAULT && time_after(now, self.s3_deadline) {
            self.services.session_timeout();
        }

        self.process_links(now);
    }

    fn process_links(&mut self, now: Timestamp) {
        // A deferred response is outstanding and the 7F..78 answer has left
        // the send buffer: run the buffered request again so the service can
        // produce its final response.
        if self.status.response_pending && self.phys_link.send_status() == SendStatus::Idle {
            self.dispatch(Addressing::Physical, now);
            self.not_ready_to_receive = self.status.response_pending || self.ecu_reset_scheduled;
            return;
        }

        if self.not_ready_to_receive {
            return;
        }

        // new requests only after p2 has elapsed
        if !time_after(now, self.p2_timer) {
            return;
        }

        // the physical link always wins over the functional one
        match self.phys_link.receive(&mut self.req_buf) {
            Ok(Some(len)) if len > 0 => {
                self.req_len = len;
                self.dispatch(Addressing::Physical, now);
                self.p2_timer = now.wrapping_add(self.config.p2_ms);
                return;
            }
            Ok(_) => {}
            Err(err) => warn!("physical link receive error: {err}"),
        }

        match self.func_link.receive(&mut self.req_buf) {
            Ok(Some(len)) if len > 0 => {
                self.req_len = len;
                self.dispatch(Addressing::Functional, now);
                self.p2_timer = now.wrapping_add(self.config.p2_ms);
            }
            Ok(_) => {}
            Err(err) => warn!("functional link receive error: {err}"),
        }
    }

    fn dispatch(&mut self, addressing: Addressing, now: Timestamp) {
        if self.req_len == 0 {
            return;
        }

        let req = RequestContext::new(&self.req_buf[..self.req_len], addressing);
        let mut resp = ResponseContext::new(&mut self.resp_buf);
        let mut ctx = ServiceContext {
            status: &mut self.status,
            services: &mut self.services,
            transfer: &mut self.transfer,
            now,
            p2_ms: self.config.p2_ms,
            p2_star_ms: self.config.p2_star_ms,
            s3_ms: self.config.s3_ms,
            transfer_mtu: self.config.transfer_mtu,
            s3_deadline: &mut self.s3_deadline,
            not_ready_to_receive: &mut self.not_ready_to_receive,
            ecu_reset_scheduled: &mut self.ecu_reset_scheduled,
        };

        let result = dispatch::evaluate_service_response(&mut ctx, &req, &mut resp);

        let pending = matches!(result, Err(Nrc::RequestCorrectlyReceivedResponsePending));
        self.status.response_pending = pending;
        if pending {
            self.not_ready_to_receive = true;
        }

        if resp.len() > 0 {
            let link = match addressing {
                Addressing::Physical => &mut self.phys_link,
                Addressing::Functional => &mut self.func_link,
            };
            if let Err(err) = link.send(resp.as_bytes()) {
                warn!("response send failed: {err}");
            }
        }
    }
}
