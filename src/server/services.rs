//! User-facing service vocabulary and the capability trait a deployment
//! implements to back the diagnostic services.

use bitflags::bitflags;

use super::session::SessionStatus;

// UDS Service IDs handled by the server
pub const SID_DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
pub const SID_ECU_RESET: u8 = 0x11;
pub const SID_READ_DATA_BY_IDENTIFIER: u8 = 0x22;
pub const SID_SECURITY_ACCESS: u8 = 0x27;
pub const SID_COMMUNICATION_CONTROL: u8 = 0x28;
pub const SID_WRITE_DATA_BY_IDENTIFIER: u8 = 0x2E;
pub const SID_ROUTINE_CONTROL: u8 = 0x31;
pub const SID_REQUEST_DOWNLOAD: u8 = 0x34;
pub const SID_TRANSFER_DATA: u8 = 0x36;
pub const SID_REQUEST_TRANSFER_EXIT: u8 = 0x37;
pub const SID_TESTER_PRESENT: u8 = 0x3E;
pub const SID_CONTROL_DTC_SETTING: u8 = 0x85;

/// Positive responses answer with the request SID plus this offset.
pub const RESPONSE_SID_OFFSET: u8 = 0x40;

/// First byte of every negative response.
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;

// Diagnostic session types (0x10 sub-function values)
pub const SESSION_DEFAULT: u8 = 0x01;
pub const SESSION_PROGRAMMING: u8 = 0x02;
pub const SESSION_EXTENDED: u8 = 0x03;
pub const SESSION_SAFETY_SYSTEM: u8 = 0x04;

// ECU reset types (0x11 sub-function values)
pub const RESET_HARD: u8 = 0x01;
pub const RESET_KEY_OFF_ON: u8 = 0x02;
pub const RESET_SOFT: u8 = 0x03;
pub const RESET_ENABLE_RAPID_POWER_SHUTDOWN: u8 = 0x04;
pub const RESET_DISABLE_RAPID_POWER_SHUTDOWN: u8 = 0x05;

// Routine control types (0x31 sub-function values)
pub const ROUTINE_START: u8 = 0x01;
pub const ROUTINE_STOP: u8 = 0x02;
pub const ROUTINE_REQUEST_RESULTS: u8 = 0x03;

/// Negative response codes (ISO 14229-1 Annex A).
///
/// `RequestCorrectlyReceivedResponsePending` is a sentinel, not a terminal
/// outcome: a service returns it to signal that its real answer will take
/// longer than p2, and the server re-invokes it on a later poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Nrc {
    GeneralReject = 0x10,
    ServiceNotSupported = 0x11,
    SubFunctionNotSupported = 0x12,
    IncorrectMessageLengthOrInvalidFormat = 0x13,
    ResponseTooLong = 0x14,
    ConditionsNotCorrect = 0x22,
    RequestSequenceError = 0x24,
    RequestOutOfRange = 0x31,
    SecurityAccessDenied = 0x33,
    InvalidKey = 0x35,
    ExceededNumberOfAttempts = 0x36,
    RequiredTimeDelayNotExpired = 0x37,
    UploadDownloadNotAccepted = 0x70,
    TransferDataSuspended = 0x71,
    GeneralProgrammingFailure = 0x72,
    WrongBlockSequenceCounter = 0x73,
    RequestCorrectlyReceivedResponsePending = 0x78,
    SubFunctionNotSupportedInActiveSession = 0x7E,
    ServiceNotSupportedInActiveSession = 0x7F,
}

impl Nrc {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Outcome of a service or user callback: `Ok` yields a positive response,
/// `Err` the corresponding negative response code.
pub type ServiceResult<T = ()> = std::result::Result<T, Nrc>;

bitflags! {
    /// The 0x28 CommunicationControl `communicationType` byte: which message
    /// kinds the control applies to, plus a subnet number in the high nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommunicationType: u8 {
        const NORMAL_COMMUNICATION = 0x01;
        const NETWORK_MANAGEMENT = 0x02;
    }
}

impl CommunicationType {
    /// Subnet number the control is addressed to (0 = all subnets the node
    /// is connected to, 0xF = the receiving subnet only).
    pub fn subnet(self) -> u8 {
        (self.bits() >> 4) & 0x0F
    }
}

/// Sink for the data phase of a 0x34→0x36→0x37 download, installed by
/// [`DiagnosticServices::request_download`] and dropped when the transfer
/// session ends.
pub trait TransferHandler {
    /// One 0x36 TransferData block. Returning
    /// [`Nrc::RequestCorrectlyReceivedResponsePending`] defers the answer;
    /// the server re-delivers the same block once the pending response has
    /// drained. Any other error tears the session down.
    fn on_transfer(&mut self, status: &SessionStatus, data: &[u8]) -> ServiceResult;

    /// 0x37 RequestTransferExit. May write a transfer response parameter
    /// record into `record`, returning the number of bytes written.
    fn on_exit(&mut self, status: &SessionStatus, record: &mut [u8]) -> ServiceResult<usize>;
}

/// A granted 0x34 RequestDownload.
pub struct DownloadRequest {
    /// Receives the transferred data.
    pub handler: Box<dyn TransferHandler>,
    /// Proposed maxNumberOfBlockLength: how many bytes the client may put in
    /// each TransferData request, service identifier included. Must be at
    /// least 3; the server clamps it to the transport MTU.
    pub max_block_len: u16,
}

/// Arguments to a 0x31 RoutineControl callback.
pub struct RoutineControlArgs<'req, 'resp> {
    /// Routine-specific bytes that followed the routine identifier.
    pub option_record: &'req [u8],
    /// Output buffer for the routine status record.
    pub status_record: &'resp mut [u8],
    /// Number of status-record bytes the routine wrote.
    pub status_record_len: usize,
}

impl RoutineControlArgs<'_, '_> {
    /// Copies `data` into the status record, failing with
    /// [`Nrc::GeneralProgrammingFailure`] if it does not fit.
    pub fn write_status_record(&mut self, data: &[u8]) -> ServiceResult {
        if data.len() > self.status_record.len() {
            return Err(Nrc::GeneralProgrammingFailure);
        }
        self.status_record[..data.len()].copy_from_slice(data);
        self.status_record_len = data.len();
        Ok(())
    }
}

/// The diagnostic capabilities of one deployment.
///
/// Every method except [`session_timeout`](Self::session_timeout) has a
/// default body returning [`Nrc::ServiceNotSupported`], so an ECU implements
/// exactly the services it offers and the rest answer 7F xx 11 on their own.
///
/// All methods run inside [`Server::poll`](crate::server::Server::poll) on
/// the host's thread and must return promptly; long-running work signals
/// [`Nrc::RequestCorrectlyReceivedResponsePending`] and finishes on a later
/// poll.
#[allow(unused_variables)]
pub trait DiagnosticServices {
    /// The S3 session timer expired while a non-default session was active.
    /// Side effects only: typically schedules a fallback to the default
    /// session or a reset.
    fn session_timeout(&mut self);

    /// 0x10 DiagnosticSessionControl: accept or refuse `session_type`.
    fn session_control(&mut self, status: &SessionStatus, session_type: u8) -> ServiceResult {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x11 ECUReset: arrange for the reset and return the powerDownTime
    /// byte (only encoded for [`RESET_ENABLE_RAPID_POWER_SHUTDOWN`]).
    /// The server stops accepting requests once this succeeds.
    fn ecu_reset(&mut self, status: &SessionStatus, reset_type: u8) -> ServiceResult<u8> {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x22 ReadDataByIdentifier: return the data record for `did`. The
    /// returned slice is copied into the response before the next callback.
    fn read_data_by_identifier(
        &mut self,
        status: &SessionStatus,
        did: u16,
    ) -> ServiceResult<&[u8]> {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x2E WriteDataByIdentifier.
    fn write_data_by_identifier(
        &mut self,
        status: &SessionStatus,
        did: u16,
        data: &[u8],
    ) -> ServiceResult {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x28 CommunicationControl.
    fn communication_control(
        &mut self,
        status: &SessionStatus,
        control_type: u8,
        communication_type: CommunicationType,
    ) -> ServiceResult {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x27 SecurityAccess, odd sub-function: write a seed for `level` into
    /// `seed` and return its length.
    ///
    /// When `level` is already unlocked the seed must be all zeroes; for a
    /// locked level it must be non-zero. Clients rely on this to probe the
    /// lock state.
    fn security_access_generate_seed(
        &mut self,
        status: &SessionStatus,
        level: u8,
        request: &[u8],
        seed: &mut [u8],
    ) -> ServiceResult<usize> {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x27 SecurityAccess, even sub-function: validate the client's key for
    /// `level`. On success the server records `level - 1` as the unlocked
    /// security level.
    fn security_access_validate_key(
        &mut self,
        status: &SessionStatus,
        level: u8,
        key: &[u8],
    ) -> ServiceResult {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x31 RoutineControl with `control_type` one of [`ROUTINE_START`],
    /// [`ROUTINE_STOP`], [`ROUTINE_REQUEST_RESULTS`].
    fn routine_control(
        &mut self,
        status: &SessionStatus,
        control_type: u8,
        routine_id: u16,
        args: &mut RoutineControlArgs<'_, '_>,
    ) -> ServiceResult {
        Err(Nrc::ServiceNotSupported)
    }

    /// 0x34 RequestDownload for `size` bytes at `address` (an opaque token
    /// taken from the request, not a host pointer). On success the returned
    /// handler receives the data phase.
    fn request_download(
        &mut self,
        status: &SessionStatus,
        address: usize,
        size: usize,
        data_format: u8,
    ) -> ServiceResult<DownloadRequest> {
        Err(Nrc::ServiceNotSupported)
    }
}
