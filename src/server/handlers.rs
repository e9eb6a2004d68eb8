//! One handler per supported service identifier.
//!
//! Shared shape, in order: minimum-length check, input parsing, user
//! callback, positive response encoding. Handlers only encode positive
//! payloads; the dispatcher turns a returned error code into the negative
//! response, so a handler that bails halfway through encoding leaves no
//! partial bytes on the wire.

use log::debug;

use super::context::{RequestContext, ResponseContext, ServiceContext};
use super::services::{
    CommunicationType, DiagnosticServices, Nrc, RoutineControlArgs, ServiceResult,
    RESET_ENABLE_RAPID_POWER_SHUTDOWN, RESPONSE_SID_OFFSET, ROUTINE_REQUEST_RESULTS,
    ROUTINE_START, ROUTINE_STOP, SESSION_DEFAULT, SID_COMMUNICATION_CONTROL,
    SID_CONTROL_DTC_SETTING, SID_DIAGNOSTIC_SESSION_CONTROL, SID_ECU_RESET,
    SID_READ_DATA_BY_IDENTIFIER, SID_REQUEST_DOWNLOAD, SID_REQUEST_TRANSFER_EXIT,
    SID_ROUTINE_CONTROL, SID_SECURITY_ACCESS, SID_TESTER_PRESENT, SID_TRANSFER_DATA,
    SID_WRITE_DATA_BY_IDENTIFIER,
};
use super::session::TransferSession;

/// Sub-function value without the suppress-positive-response bit.
const SUB_FUNCTION_MASK: u8 = 0x7F;

/// 0x10 DiagnosticSessionControl
pub(crate) fn diagnostic_session_control<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 2 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }

    // 0x4F keeps bit 6: session types above 0x40 stay distinguishable
    let session_type = req.data()[1] & 0x4F;

    ctx.services.session_control(ctx.status, session_type)?;

    if session_type != SESSION_DEFAULT {
        *ctx.s3_deadline = ctx.now.wrapping_add(ctx.s3_ms);
    }
    ctx.status.session_type = session_type;

    resp.write(&[
        SID_DIAGNOSTIC_SESSION_CONTROL | RESPONSE_SID_OFFSET,
        session_type,
    ])?;
    // ISO 14229-1:2013 Table 29: p2 in 1 ms resolution, p2* in 10 ms
    resp.write(&(ctx.p2_ms as u16).to_be_bytes())?;
    resp.write(&((ctx.p2_star_ms / 10) as u16).to_be_bytes())?;
    Ok(())
}

/// 0x11 ECUReset
pub(crate) fn ecu_reset<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 2 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let reset_type = req.data()[1] & 0x3F;

    let power_down_time = ctx.services.ecu_reset(ctx.status, reset_type)?;

    // the reset is committed; stop taking requests
    *ctx.not_ready_to_receive = true;
    *ctx.ecu_reset_scheduled = true;

    resp.write(&[SID_ECU_RESET | RESPONSE_SID_OFFSET, reset_type])?;
    if reset_type == RESET_ENABLE_RAPID_POWER_SHUTDOWN {
        resp.push(power_down_time)?;
    }
    Ok(())
}

/// 0x22 ReadDataByIdentifier
pub(crate) fn read_data_by_identifier<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    let body = &req.data()[1..];
    if body.is_empty() || body.len() % 2 != 0 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }

    resp.push(SID_READ_DATA_BY_IDENTIFIER | RESPONSE_SID_OFFSET)?;
    for chunk in body.chunks_exact(2) {
        let did = u16::from_be_bytes([chunk[0], chunk[1]]);
        let record = ctx.services.read_data_by_identifier(ctx.status, did)?;
        if 2 + record.len() > resp.remaining() {
            return Err(Nrc::ResponseTooLong);
        }
        resp.write(&did.to_be_bytes())?;
        resp.write(record)?;
    }
    Ok(())
}

/// Security levels with no assigned meaning in the sub-function range.
fn security_level_is_reserved(sub_fn: u8) -> bool {
    matches!(sub_fn, 0x00 | 0x43..=0x5E | 0x7F)
}

/// 0x27 SecurityAccess
pub(crate) fn security_access<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 2 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let sub_fn = req.data()[1] & SUB_FUNCTION_MASK;
    if security_level_is_reserved(sub_fn) {
        return Err(Nrc::SubFunctionNotSupported);
    }
    let record = &req.data()[2..];

    resp.write(&[SID_SECURITY_ACCESS | RESPONSE_SID_OFFSET, sub_fn])?;

    if sub_fn % 2 == 0 {
        // even: sendKey
        ctx.services
            .security_access_validate_key(ctx.status, sub_fn, record)?;
        ctx.status.security_level = sub_fn - 1;
        Ok(())
    } else {
        // odd: requestSeed. An already-unlocked level answers with an
        // all-zero seed; producing it is the callback's contract.
        let seed_len =
            ctx.services
                .security_access_generate_seed(ctx.status, sub_fn, record, resp.tail_mut())?;
        if seed_len == 0 || seed_len > resp.remaining() {
            return Err(Nrc::GeneralProgrammingFailure);
        }
        resp.advance(seed_len);
        Ok(())
    }
}

/// 0x28 CommunicationControl
pub(crate) fn communication_control<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 3 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let control_type = req.data()[1] & SUB_FUNCTION_MASK;
    let communication_type = CommunicationType::from_bits_retain(req.data()[2]);

    ctx.services
        .communication_control(ctx.status, control_type, communication_type)?;

    resp.write(&[SID_COMMUNICATION_CONTROL | RESPONSE_SID_OFFSET, control_type])?;
    Ok(())
}

/// 0x2E WriteDataByIdentifier
pub(crate) fn write_data_by_identifier<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    // ISO 14229-1:2013 Figure 21: identifier plus at least one data byte
    if req.len() < 4 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let did = u16::from_be_bytes([req.data()[1], req.data()[2]]);

    ctx.services
        .write_data_by_identifier(ctx.status, did, &req.data()[3..])?;

    resp.push(SID_WRITE_DATA_BY_IDENTIFIER | RESPONSE_SID_OFFSET)?;
    resp.write(&did.to_be_bytes())?;
    Ok(())
}

/// 0x31 RoutineControl
pub(crate) fn routine_control<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 4 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let control_type = req.data()[1] & SUB_FUNCTION_MASK;
    if !matches!(
        control_type,
        ROUTINE_START | ROUTINE_STOP | ROUTINE_REQUEST_RESULTS
    ) {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let routine_id = u16::from_be_bytes([req.data()[2], req.data()[3]]);

    resp.write(&[SID_ROUTINE_CONTROL | RESPONSE_SID_OFFSET, control_type])?;
    resp.write(&routine_id.to_be_bytes())?;

    let mut args = RoutineControlArgs {
        option_record: &req.data()[4..],
        status_record: resp.tail_mut(),
        status_record_len: 0,
    };
    ctx.services
        .routine_control(ctx.status, control_type, routine_id, &mut args)?;

    let written = args.status_record_len;
    if written > args.status_record.len() {
        return Err(Nrc::GeneralProgrammingFailure);
    }
    resp.advance(written);
    Ok(())
}

/// lengthFormatIdentifier for a two-byte maxNumberOfBlockLength.
const BLOCK_LENGTH_FORMAT: u8 = (std::mem::size_of::<u16>() as u8) << 4;

/// 0x34 RequestDownload
pub(crate) fn request_download<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if ctx.transfer.is_some() {
        return Err(Nrc::ConditionsNotCorrect);
    }
    if req.len() < 3 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let data = req.data();
    let data_format = data[1];
    let size_len = (data[2] >> 4) as usize;
    let addr_len = (data[2] & 0x0F) as usize;

    let width = std::mem::size_of::<usize>();
    if size_len == 0 || size_len > width || addr_len == 0 || addr_len > width {
        return Err(Nrc::RequestOutOfRange);
    }
    if req.len() < 3 + addr_len + size_len {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }

    let mut address = 0usize;
    for &byte in &data[3..3 + addr_len] {
        address = (address << 8) | byte as usize;
    }
    let mut size = 0usize;
    for &byte in &data[3 + addr_len..3 + addr_len + size_len] {
        size = (size << 8) | byte as usize;
    }

    let download = ctx
        .services
        .request_download(ctx.status, address, size, data_format)?;

    if download.max_block_len < 3 {
        debug!(
            "request download rejected: maxNumberOfBlockLength {} too short",
            download.max_block_len
        );
        return Err(Nrc::GeneralProgrammingFailure);
    }
    let max_block_len = download.max_block_len.min(ctx.transfer_mtu);

    *ctx.transfer = Some(TransferSession::new(download.handler, size));

    resp.write(&[
        SID_REQUEST_DOWNLOAD | RESPONSE_SID_OFFSET,
        BLOCK_LENGTH_FORMAT,
    ])?;
    resp.write(&max_block_len.to_be_bytes())?;
    Ok(())
}

/// 0x36 TransferData
pub(crate) fn transfer_data<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 2 {
        *ctx.transfer = None;
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }

    // taken out of the server: only the surviving paths put it back
    let mut session = ctx.transfer.take().ok_or(Nrc::UploadDownloadNotAccepted)?;

    let block_sequence_counter = req.data()[1];
    let data = &req.data()[2..];

    // While a pending response is outstanding the client retransmits the
    // same block; the counter was already advanced on the first delivery.
    if !ctx.status.response_pending {
        if block_sequence_counter != session.block_sequence_counter() {
            return Err(Nrc::RequestSequenceError);
        }
        session.advance_block_counter();
    }

    if session.would_overrun(data.len()) {
        return Err(Nrc::TransferDataSuspended);
    }

    match session.handler_mut().on_transfer(ctx.status, data) {
        Ok(()) => {
            session.record_transferred(data.len());
            *ctx.transfer = Some(session);
            resp.write(&[
                SID_TRANSFER_DATA | RESPONSE_SID_OFFSET,
                block_sequence_counter,
            ])?;
            Ok(())
        }
        Err(Nrc::RequestCorrectlyReceivedResponsePending) => {
            *ctx.transfer = Some(session);
            Err(Nrc::RequestCorrectlyReceivedResponsePending)
        }
        Err(nrc) => Err(nrc),
    }
}

/// 0x37 RequestTransferExit
pub(crate) fn request_transfer_exit<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    _req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    // the session ends here whatever the callback answers
    let mut session = ctx.transfer.take().ok_or(Nrc::UploadDownloadNotAccepted)?;

    resp.push(SID_REQUEST_TRANSFER_EXIT | RESPONSE_SID_OFFSET)?;
    let written = session.handler_mut().on_exit(ctx.status, resp.tail_mut())?;
    if written > resp.remaining() {
        return Err(Nrc::GeneralProgrammingFailure);
    }
    resp.advance(written);
    Ok(())
}

/// 0x3E TesterPresent
pub(crate) fn tester_present<S: DiagnosticServices>(
    ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 2 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    *ctx.s3_deadline = ctx.now.wrapping_add(ctx.s3_ms);

    resp.write(&[
        SID_TESTER_PRESENT | RESPONSE_SID_OFFSET,
        req.data()[1] & 0x3F,
    ])?;
    Ok(())
}

/// 0x85 ControlDTCSetting
pub(crate) fn control_dtc_setting<S: DiagnosticServices>(
    _ctx: &mut ServiceContext<'_, S>,
    req: &RequestContext<'_>,
    resp: &mut ResponseContext<'_>,
) -> ServiceResult {
    if req.len() < 2 {
        return Err(Nrc::IncorrectMessageLengthOrInvalidFormat);
    }
    let dtc_setting_type = req.data()[1] & 0x3F;

    resp.write(&[
        SID_CONTROL_DTC_SETTING | RESPONSE_SID_OFFSET,
        dtc_setting_type,
    ])?;
    Ok(())
}
