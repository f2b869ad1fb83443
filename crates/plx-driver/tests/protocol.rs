//! Integration tests for the register protocol and status report
//!
//! Everything runs against the scripted mock transport except the tests
//! marked `#[ignore]`, which need a switch on `/dev/i2c-0`.

use plx_chip::regs::{
    LINK_STATUS, LINK_WIDTH_SPEED_HIGH, LINK_WIDTH_SPEED_LOW, PORTS_ENABLED, PORT_CONFIG, VC0_RESOURCE_STATUS,
};
use plx_driver::backends::{MockTransport, Transaction};
use plx_driver::{I2cFlags, PlxError, ReadReply, RetryPolicy, Session, SessionConfig};
use std::time::Duration;

fn session(t: MockTransport) -> Session<MockTransport> {
    Session::start(t, SessionConfig::default()).expect("mock session")
}

/// Test the exact bus traffic of one register read
#[test]
fn test_read_wire_format() {
    let mut t = MockTransport::new();
    t.set_register(0x0A, 0x240, 0xDEAD_BEEF);
    let mut s = session(t);

    assert_eq!(s.read_qword(0x0A, 0x240).unwrap(), 0xDEAD_BEEF);
    assert_eq!(
        s.transport().transactions(),
        &[
            Transaction::Write {
                device: 0x3C,
                flags: I2cFlags::NO_STOP,
                bytes: vec![0x04, 0x05, 0x00, 0x90],
            },
            Transaction::Read {
                device: 0x3C,
                flags: I2cFlags::NONE,
                count: 4,
            },
        ]
    );
}

/// Test that a range read walks registers four bytes at a time
#[test]
fn test_range_dump() {
    let mut t = MockTransport::new();
    for i in 0..4u32 {
        t.set_register(0x0A, 0x240 + 4 * i, i);
    }
    let mut s = session(t);

    let offsets: Vec<u32> = s
        .read_range(0x0A, 0x240, 16)
        .map(|(off, r)| {
            assert_eq!(r.unwrap(), (off - 0x240) / 4);
            off
        })
        .collect();
    assert_eq!(offsets, vec![0x240, 0x244, 0x248, 0x24C]);
}

/// Test that failures surface as typed errors and are not retried by default
#[test]
fn test_read_failures() {
    let mut t = MockTransport::new();
    t.queue_reply(ReadReply::status(0))
        .queue_reply(ReadReply::status(-4))
        .queue_reply(ReadReply::bytes([1, 2, 3]));
    let mut s = session(t);

    assert!(matches!(s.read_qword(0, 0x78), Err(PlxError::ShortRead { count: 0 })));
    assert!(matches!(s.read_qword(0, 0x78), Err(PlxError::ShortRead { count: -4 })));
    assert!(matches!(
        s.read_qword(0, 0x78),
        Err(PlxError::UnexpectedLength { count: 3, expected: 4 })
    ));
    assert_eq!(s.transport().written().len(), 3);
}

/// Test an opt-in retry policy
#[test]
fn test_retry_is_opt_in() {
    let mut t = MockTransport::new();
    t.queue_reply(ReadReply::status(0)).set_register(0, 0x78, 7);
    let config = SessionConfig {
        retry: RetryPolicy::new(1, Duration::ZERO),
        ..SessionConfig::default()
    };
    let mut s = Session::start(t, config).unwrap();

    assert_eq!(s.read_qword(0, 0x78).unwrap(), 7);
}

/// Test the full status report on a scripted x8/x4 board
#[test]
fn test_status_report() {
    let mut t = MockTransport::new();
    t.set_register(0, PORT_CONFIG, 6)
        .set_register(0, PORTS_ENABLED, 0b11)
        .set_register(0, LINK_WIDTH_SPEED_LOW, 0b00_1011 | (0b00_1010 << 6))
        .set_register(0, LINK_WIDTH_SPEED_HIGH, 0)
        .set_register(0, LINK_STATUS, (1 << 29) | (8 << 20) | (2 << 16))
        .set_register(1, LINK_STATUS, (1 << 29) | (4 << 20) | (2 << 16))
        .set_register(0, VC0_RESOURCE_STATUS, 0)
        .set_register(1, VC0_RESOURCE_STATUS, 1 << 17);
    let mut s = session(t);
    let mut sw = s.switch();

    let (code, map) = sw.port_map().unwrap();
    assert_eq!(code, 6);
    assert_eq!(map[..2], [8, 4]);

    let enabled = sw.ports_enabled().unwrap();
    let links = sw.link_widths_and_speeds().unwrap();
    assert_eq!((links[0].lanes, links[1].lanes), (8, 4));

    let statuses = sw.for_enabled_ports(&enabled, |s, port| s.link_status(port));
    assert_eq!(statuses.len(), 2);
    for (port, status) in statuses {
        let status = status.unwrap();
        assert_eq!(status.negotiated_link_width, links[usize::from(port)].lanes);
        assert_eq!(status.current_link_speed, links[usize::from(port)].speed);
    }

    let pending = sw.for_enabled_ports(&enabled, |s, port| s.vc0_negotiation_pending(port));
    assert_eq!(pending[0].1.as_ref().ok(), Some(&false));
    assert_eq!(pending[1].1.as_ref().ok(), Some(&true));
}

/// Test that a bad speed code is a typed decode error, not a panic
#[test]
fn test_link_status_bad_speed() {
    let mut t = MockTransport::new();
    t.set_register(2, LINK_STATUS, 7 << 16);
    let mut s = session(t);

    assert!(matches!(
        s.switch().link_status(2),
        Err(PlxError::SchemaRange {
            field: "Current Link Speed",
            code: 7,
            ..
        })
    ));
}

/// Test reading Debug Control from a real switch
#[test]
#[ignore] // Requires an I2C adapter at /dev/i2c-0 with a switch at 0x3c
#[cfg(target_os = "linux")]
fn test_hardware_debug_control() {
    use plx_driver::backends::I2cDevTransport;

    let mut s = Session::<I2cDevTransport>::open(SessionConfig::default()).expect("open /dev/i2c-0");
    let dc = s.switch().debug_control().expect("read Debug Control");
    println!("{dc:#?}");
    s.close().expect("close");
}
