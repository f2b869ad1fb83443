//! Integration tests for EEPROM image generation and page programming

use plx_chip::address::stream_port;
use plx_chip::eeprom::{image_len, ENTRY_LEN, HEADER_LEN};
use plx_driver::backends::MockTransport;
use plx_driver::{
    EepromPageWriter, EepromStreamBuilder, Fill, PageWriterConfig, PortConfigPreset, Session, SessionConfig,
    StreamConfig, UpstreamRole,
};
use std::time::Duration;

/// Parse an image back into (address, value) pairs
fn entries(image: &[u8]) -> Vec<(u16, u32)> {
    let count = usize::from(u16::from_le_bytes([image[2], image[3]])) / ENTRY_LEN;
    image[HEADER_LEN..HEADER_LEN + count * ENTRY_LEN]
        .chunks_exact(ENTRY_LEN)
        .map(|e| {
            (
                u16::from_le_bytes([e[0], e[1]]),
                u32::from_le_bytes([e[2], e[3], e[4], e[5]]),
            )
        })
        .collect()
}

/// Test the byte layout for a hand-built stream
#[test]
fn test_two_entry_image_bytes() {
    let mut b = EepromStreamBuilder::new();
    b.append(1, 0x7C, 0x0123_4567).unwrap();
    b.append(4, 0x220, 0x4000_7100).unwrap();

    let image = b.serialize().unwrap();
    assert_eq!(
        image.as_ref(),
        [
            0x5a, 0x00, 0x0c, 0x00, 0x1f, 0x04, 0x67, 0x45, 0x23, 0x01, 0x88, 0x10, 0x00, 0x71, 0x00, 0x40,
            0x00, 0x00, 0x00, 0x00
        ]
    );
}

/// Test that playback order is append order
#[test]
fn test_entry_order_preserved() {
    let mut b = EepromStreamBuilder::new();
    for i in 0..32u32 {
        b.append(stream_port::PORT0, 0x300 + 4 * i, i).unwrap();
    }
    let image = b.serialize().unwrap();
    assert_eq!(image.len(), image_len(32));

    let parsed = entries(&image);
    for (i, (addr, value)) in parsed.into_iter().enumerate() {
        assert_eq!(value as usize, i);
        assert_eq!(usize::from(addr), 0xC0 + i);
    }
}

/// Test every board option combination for layout invariants
#[test]
fn test_config_matrix() {
    let roles = [
        None,
        Some(UpstreamRole::UpstreamPort1),
        Some(UpstreamRole::NtPort1),
        Some(UpstreamRole::NtPort4),
    ];
    let presets = [None, Some(PortConfigPreset::X8x8), Some(PortConfigPreset::X4x4x4x4)];

    for bits in 0..16u8 {
        for upstream in roles {
            for port_config in presets {
                let cfg = StreamConfig {
                    station2_lane_reversal: bits & 1 != 0,
                    disable_port1: bits & 2 != 0,
                    disable_port4: bits & 4 != 0,
                    nt_interfaces: bits & 8 != 0,
                    upstream,
                    port_config,
                };
                let b = EepromStreamBuilder::from_config(&cfg);
                let image = b.serialize().unwrap();

                assert_eq!(image[0], 0x5A);
                assert_eq!(image[1], 0x00);
                assert_eq!(image.len(), image_len(b.len()));
                assert_eq!(&image[image.len() - 4..], [0, 0, 0, 0]);
                assert_eq!(entries(&image).len(), b.len());
                assert!(cfg.image_name().starts_with("plx8732"));
                assert!(cfg.image_name().ends_with(".bin"));
            }
        }
    }
}

/// Test an NT board image end to end
#[test]
fn test_nt_port1_image() {
    let cfg = StreamConfig {
        upstream: Some(UpstreamRole::NtPort1),
        nt_interfaces: true,
        ..StreamConfig::default()
    };
    let image = EepromStreamBuilder::from_config(&cfg).serialize().unwrap();
    assert_eq!(
        entries(&image),
        vec![
            (0x2088, 0x4000_7100),
            (0x00D8, 0x001A_2100),
            (0xE001, 0x0000_0402),
            (0xE401, 0x0000_0402),
            (0x00C0, 0x0000_001A),
        ]
    );
    assert_eq!(cfg.image_name(), "plx8732_stn2rev_x8x8_port1NT.bin");
}

/// Test filling a whole AT24C02 through a session
#[test]
fn test_fill_whole_eeprom() {
    let mut s = Session::start(MockTransport::new(), SessionConfig::default()).unwrap();
    let writer = EepromPageWriter::new(PageWriterConfig {
        write_delay: Duration::ZERO,
        ..PageWriterConfig::default()
    });

    let report = s.write_eeprom(&writer, 0x50, 0, 256, Fill::Incrementing).unwrap();
    assert_eq!(report.pages_written, 32);

    let written = s.transport_mut().written().into_iter().map(<[u8]>::to_vec).collect::<Vec<_>>();
    for (page, w) in written.iter().enumerate() {
        assert_eq!(usize::from(w[0]), page * 8);
        assert_eq!(w.len(), 9);
        assert!(w[1..].iter().enumerate().all(|(i, &b)| usize::from(b) == page * 8 + i));
    }
}
