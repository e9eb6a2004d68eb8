//! Service registry and the response-behavior rules of ISO 14229-1 §7.5.5.

use log::debug;

use super::context::{Addressing, RequestContext, ResponseContext, ServiceContext};
use super::handlers;
use super::services::{
    DiagnosticServices, Nrc, ServiceResult, SID_COMMUNICATION_CONTROL, SID_CONTROL_DTC_SETTING,
    SID_DIAGNOSTIC_SESSION_CONTROL, SID_ECU_RESET, SID_READ_DATA_BY_IDENTIFIER,
    SID_REQUEST_DOWNLOAD, SID_REQUEST_TRANSFER_EXIT, SID_ROUTINE_CONTROL, SID_SECURITY_ACCESS,
    SID_TESTER_PRESENT, SID_TRANSFER_DATA, SID_WRITE_DATA_BY_IDENTIFIER,
};

/// High bit of the sub-function byte: suppress the positive response.
pub(crate) const SUPPRESS_POS_RSP_BIT: u8 = 0x80;

/// Services this engine implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServiceId {
    DiagnosticSessionControl,
    EcuReset,
    ReadDataByIdentifier,
    SecurityAccess,
    CommunicationControl,
    WriteDataByIdentifier,
    RoutineControl,
    RequestDownload,
    TransferData,
    RequestTransferExit,
    TesterPresent,
    ControlDtcSetting,
}

/// The SID→service table. SIDs not listed here take the explicit
/// "service not supported" branch in [`evaluate_service_response`].
pub(crate) fn registered_service(sid: u8) -> Option<ServiceId> {
    match sid {
        SID_DIAGNOSTIC_SESSION_CONTROL => Some(ServiceId::DiagnosticSessionControl),
        SID_ECU_RESET => Some(ServiceId::EcuReset),
        SID_READ_DATA_BY_IDENTIFIER => Some(ServiceId::ReadDataByIdentifier),
        SID_SECURITY_ACCESS => Some(ServiceId::SecurityAccess),
        SID_COMMUNICATION_CONTROL => Some(ServiceId::CommunicationControl),
        SID_WRITE_DATA_BY_IDENTIFIER => Some(ServiceId::WriteDataByIdentifier),
        SID_ROUTINE_CONTROL => Some(ServiceId::RoutineControl),
        SID_REQUEST_DOWNLOAD => Some(ServiceId::RequestDownload),
        SID_TRANSFER_DATA => Some(ServiceId::TransferData),
        SID_REQUEST_TRANSFER_EXIT => Some(ServiceId::RequestTransferExit),
        SID_TESTER_PRESENT => Some(ServiceId::TesterPresent),
        SID_CONTROL_DTC_SETTING => Some(ServiceId::ControlDtcSetting),
        _ => None,
    }
}

/// Whether the byte after the SID is a sub-function, its high bit then being
/// the suppress-positive-response flag. Covers the full standard service
/// range, not just the services implemented here.
pub(crate) fn has_sub_function(sid: u8) -> bool {
    matches!(
        sid,
        0x10 | 0x11 | 0x19 | 0x27 | 0x28 | 0x31 | 0x3E | 0x83 | 0x84 | 0x85 | 0x86
    )
}

/// Negative outcomes a functionally-addressed request must not answer:
/// the request was broadcast, and an ECU it does not apply to stays silent.
fn suppressed_under_functional_addressing(nrc: Nrc) -> bool {
    matches!(
        nrc,
        Nrc::ServiceNotSupported
            | Nrc::SubFunctionNotSupported
            | Nrc::ServiceNotSupportedInActiveSession
            | Nrc::SubFunctionNotSupportedInActiveSession
            | Nrc::RequestOutOfRange
    )
}

fn invoke<S: DiagnosticServices>(
    service: ServiceId,
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    match service {
        ServiceId::DiagnosticSessionControl => handlers::diagnostic_session_control(ctx, req, resp),
        ServiceId::EcuReset => handlers::ecu_reset(ctx, req, resp),
        ServiceId::ReadDataByIdentifier => handlers::read_data_by_identifier(ctx, req, resp),
        ServiceId::SecurityAccess => handlers::security_access(ctx, req, resp),
        ServiceId::CommunicationControl => handlers::communication_control(ctx, req, resp),
        ServiceId::WriteDataByIdentifier => handlers::write_data_by_identifier(ctx, req, resp),
        ServiceId::RoutineControl => handlers::routine_control(ctx, req, resp),
        ServiceId::RequestDownload => handlers::request_download(ctx, req, resp),
        ServiceId::TransferData => handlers::transfer_data(ctx, req, resp),
        ServiceId::RequestTransferExit => handlers::request_transfer_exit(ctx, req, resp),
        ServiceId::TesterPresent => handlers::tester_present(ctx, req, resp),
        ServiceId::ControlDtcSetting => handlers::control_dtc_setting(ctx, req, resp),
    }
}

/// Runs the service for one request and applies the standard's response
/// rules (ISO 14229-1:2013 §7.5.5): sub-function minimum length, the
/// suppress-positive-response bit, and silence for broadcast requests that
/// do not apply to this ECU.
pub(crate) fn evaluate_service_response<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    let sid = req.sid();
    let mut suppress_positive = false;

    let result = match registered_service(sid) {
        None => {
            debug!("no handler for request SID {sid:#04x}");
            Err(Nrc::ServiceNotSupported)
        }
        Some(service) => {
            if has_sub_function(sid) {
                if req.len() < 2 {
                    Err(Nrc::IncorrectMessageLengthOrInvalidFormat)
                } else {
                    // handlers interpret the sub-function without this bit
                    suppress_positive = req.data()[1] & SUPPRESS_POS_RSP_BIT != 0;
                    invoke(service, ctx, req, resp)
                }
            } else {
                invoke(service, ctx, req, resp)
            }
        }
    };

    if let Err(nrc) = result {
        resp.set_negative(sid, nrc);
    }

    // Neither suppression applies once a 0x78 "response pending" has gone
    // out for this request: the client is owed a final answer.
    let pending_answered = ctx.status.response_pending;
    match result {
        Err(nrc)
            if req.addressing == Addressing::Functional
                && suppressed_under_functional_addressing(nrc)
                && !pending_answered =>
        {
            resp.clear();
        }
        Ok(()) if suppress_positive && !pending_answered => resp.clear(),
        _ => {}
    }

    result
}
