use std::cell::RefCell;
use std::rc::Rc;

use libuds::physical::mock::MockCan;
use libuds::server::services::{
    DiagnosticServices, DownloadRequest, Nrc, ServiceResult, TransferHandler,
};
use libuds::server::session::SessionStatus;
use libuds::transport::mock::MockLink;
use libuds::types::ManualClock;
use libuds::{Server, ServerConfig};

const PHYS_RECV_ID: u32 = 0x7E0;
const FUNC_RECV_ID: u32 = 0x7DF;

struct FlashSink {
    image: Rc<RefCell<Vec<u8>>>,
}

impl TransferHandler for FlashSink {
    fn on_transfer(&mut self, _status: &SessionStatus, data: &[u8]) -> ServiceResult {
        self.image.borrow_mut().extend_from_slice(data);
        Ok(())
    }

    fn on_exit(&mut self, _status: &SessionStatus, _record: &mut [u8]) -> ServiceResult<usize> {
        Ok(0)
    }
}

/// A small but complete ECU: one readable identifier and a flashable area.
struct DemoEcu {
    vin: Vec<u8>,
    image: Rc<RefCell<Vec<u8>>>,
}

impl DemoEcu {
    fn new() -> Self {
        Self {
            vin: b"1HGBH41JXMN109186".to_vec(),
            image: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl DiagnosticServices for DemoEcu {
    fn session_timeout(&mut self) {}

    fn session_control(&mut self, _status: &SessionStatus, _session_type: u8) -> ServiceResult {
        Ok(())
    }

    fn read_data_by_identifier(
        &mut self,
        _status: &SessionStatus,
        did: u16,
    ) -> ServiceResult<&[u8]> {
        match did {
            0xF190 => Ok(&self.vin),
            _ => Err(Nrc::RequestOutOfRange),
        }
    }

    fn request_download(
        &mut self,
        _status: &SessionStatus,
        _address: usize,
        _size: usize,
        _data_format: u8,
    ) -> ServiceResult<DownloadRequest> {
        Ok(DownloadRequest {
            handler: Box::new(FlashSink {
                image: Rc::clone(&self.image),
            }),
            max_block_len: 128,
        })
    }
}

type DemoServer = Server<MockLink, MockCan, ManualClock, DemoEcu>;

fn make_server() -> (DemoServer, ManualClock) {
    let clock = ManualClock::new(0);
    let server = Server::new(
        ServerConfig {
            phys_recv_id: PHYS_RECV_ID,
            func_recv_id: FUNC_RECV_ID,
            ..ServerConfig::default()
        },
        MockLink::new(),
        MockLink::new(),
        MockCan::new(),
        clock.clone(),
        DemoEcu::new(),
    )
    .unwrap();
    (server, clock)
}

/// Puts one request frame on the bus and runs a poll for it.
fn exchange(server: &mut DemoServer, clock: &ManualClock, id: u32, request: &[u8]) {
    clock.advance(51);
    server.can_mut().inject(id, request);
    server.phys_link_mut().clear_sent();
    server.func_link_mut().clear_sent();
    server.poll();
}

#[test]
fn full_stack_session_and_read() {
    let (mut server, clock) = make_server();

    exchange(&mut server, &clock, PHYS_RECV_ID, &[0x10, 0x03]);
    assert_eq!(
        server.phys_link_mut().last_sent(),
        Some(&[0x50, 0x03, 0x00, 0x32, 0x01, 0xF4][..])
    );
    assert_eq!(server.status().session_type, 0x03);

    exchange(&mut server, &clock, PHYS_RECV_ID, &[0x22, 0xF1, 0x90]);
    let mut expected = vec![0x62, 0xF1, 0x90];
    expected.extend_from_slice(b"1HGBH41JXMN109186");
    assert_eq!(server.phys_link_mut().last_sent(), Some(&expected[..]));
}

#[test]
fn full_stack_firmware_download() {
    let (mut server, clock) = make_server();
    let image = Rc::clone(&server.services().image);

    // 8 bytes at 0x1000, two-byte address and size fields
    exchange(
        &mut server,
        &clock,
        PHYS_RECV_ID,
        &[0x34, 0x00, 0x22, 0x10, 0x00, 0x00, 0x08],
    );
    assert_eq!(
        server.phys_link_mut().last_sent(),
        Some(&[0x74, 0x20, 0x00, 0x80][..])
    );

    exchange(
        &mut server,
        &clock,
        PHYS_RECV_ID,
        &[0x36, 0x01, 0xDE, 0xAD, 0xBE, 0xEF],
    );
    assert_eq!(server.phys_link_mut().last_sent(), Some(&[0x76, 0x01][..]));

    exchange(
        &mut server,
        &clock,
        PHYS_RECV_ID,
        &[0x36, 0x02, 0xCA, 0xFE, 0xF0, 0x0D],
    );
    assert_eq!(server.phys_link_mut().last_sent(), Some(&[0x76, 0x02][..]));

    exchange(&mut server, &clock, PHYS_RECV_ID, &[0x37]);
    assert_eq!(server.phys_link_mut().last_sent(), Some(&[0x77][..]));

    assert_eq!(
        *image.borrow(),
        vec![0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xF0, 0x0D]
    );
    assert!(server.transfer_session().is_none());
}

#[test]
fn functional_requests_answer_on_the_functional_link() {
    let (mut server, clock) = make_server();

    exchange(&mut server, &clock, FUNC_RECV_ID, &[0x3E, 0x00]);
    assert_eq!(server.func_link_mut().last_sent(), Some(&[0x7E, 0x00][..]));
    assert!(server.phys_link_mut().sent().is_empty());
}

#[test]
fn functional_not_applicable_requests_stay_silent() {
    let (mut server, clock) = make_server();

    // unsupported service, broadcast: silence is the correct reply
    exchange(&mut server, &clock, FUNC_RECV_ID, &[0xA5]);
    assert!(server.func_link_mut().sent().is_empty());
    assert!(server.phys_link_mut().sent().is_empty());
}

#[test]
fn frames_for_other_ecus_are_dropped() {
    let (mut server, clock) = make_server();

    exchange(&mut server, &clock, 0x600, &[0x3E, 0x00]);
    assert!(server.phys_link_mut().sent().is_empty());
    assert!(server.func_link_mut().sent().is_empty());
}

#[test]
fn bus_errors_do_not_disturb_protocol_state() {
    let (mut server, clock) = make_server();

    exchange(
        &mut server,
        &clock,
        PHYS_RECV_ID,
        &[0x34, 0x00, 0x22, 0x10, 0x00, 0x00, 0x08],
    );
    assert!(server.transfer_session().is_some());

    server.can_mut().set_fail_rx(true);
    clock.advance(51);
    server.poll();
    server.can_mut().set_fail_rx(false);

    // the transfer session survived the fault
    exchange(
        &mut server,
        &clock,
        PHYS_RECV_ID,
        &[0x36, 0x01, 0x01, 0x02, 0x03, 0x04],
    );
    assert_eq!(server.phys_link_mut().last_sent(), Some(&[0x76, 0x01][..]));
}
