#![allow(dead_code)]
//! Capture building helpers for tests
//!
//! These functions assemble raw link/IP/UDP frames carrying AODV and OLSR
//! control messages, and write them to classic pcap files.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::DataLink;

pub const AODV_PORT: u16 = 654;
pub const OLSR_PORT: u16 = 698;

/// AODV message type codes
pub const AODV_RREQ: u8 = 1;
pub const AODV_RREP: u8 = 2;
pub const AODV_RERR: u8 = 3;
pub const AODV_RREP_ACK: u8 = 4;

/// OLSR message type codes
pub const OLSR_HELLO: u8 = 1;
pub const OLSR_TC: u8 = 2;
pub const OLSR_MID: u8 = 3;
pub const OLSR_HNA: u8 = 4;

/// Build an IPv4 + UDP datagram from 10.0.0.`src` to 10.0.0.255
pub fn udp_ipv4(src: u8, src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let total_len = 20 + udp_len;
    let mut ip = Vec::with_capacity(total_len);
    ip.extend_from_slice(&[0x45, 0x00]);
    ip.extend_from_slice(&(total_len as u16).to_be_bytes());
    ip.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);
    // TTL 1, UDP
    ip.extend_from_slice(&[0x01, 17, 0x00, 0x00]);
    ip.extend_from_slice(&[10, 0, 0, src]);
    ip.extend_from_slice(&[10, 0, 0, 255]);
    ip.extend_from_slice(&src_port.to_be_bytes());
    ip.extend_from_slice(&dst_port.to_be_bytes());
    ip.extend_from_slice(&(udp_len as u16).to_be_bytes());
    ip.extend_from_slice(&[0x00, 0x00]);
    ip.extend_from_slice(payload);
    ip
}

/// Wrap an IPv4 datagram in an Ethernet II broadcast frame
pub fn ethernet(ip: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(ip);
    frame
}

/// Wrap an IPv4 datagram in radiotap + 802.11 data + LLC/SNAP, with a trailing FCS
pub fn radiotap_wlan(ip: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
    frame.extend_from_slice(&[0x08, 0x00, 0x00, 0x00]);
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x08, 0x00]);
    frame.extend_from_slice(ip);
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    frame
}

/// Minimal AODV message of the given type, padded to a full RREQ length
pub fn aodv_message(message_type: u8) -> Vec<u8> {
    let mut msg = vec![message_type, 0x00, 0x00, 0x01];
    msg.resize(24, 0);
    msg
}

/// OLSR packet carrying one empty-bodied message per entry of `message_types`
pub fn olsr_packet(message_types: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (seq, message_type) in message_types.iter().enumerate() {
        body.extend_from_slice(&[*message_type, 0x86]);
        body.extend_from_slice(&16u16.to_be_bytes());
        body.extend_from_slice(&[10, 0, 0, 1]);
        body.extend_from_slice(&[255, 0]);
        body.extend_from_slice(&(seq as u16).to_be_bytes());
        body.extend_from_slice(&[0, 0, 0, 0]);
    }
    let mut packet = ((4 + body.len()) as u16).to_be_bytes().to_vec();
    packet.extend_from_slice(&1u16.to_be_bytes());
    packet.extend_from_slice(&body);
    packet
}

/// Write frames to a pcap file, one second apart
pub fn write_pcap(path: &Path, datalink: DataLink, frames: &[Vec<u8>]) {
    let file = File::create(path).unwrap();
    let header = PcapHeader {
        datalink,
        ..Default::default()
    };
    let mut writer = PcapWriter::with_header(file, header).unwrap();
    for (i, frame) in frames.iter().enumerate() {
        let packet = PcapPacket::new(Duration::from_secs(1_700_000_000 + i as u64), frame.len() as u32, frame);
        writer.write_packet(&packet).unwrap();
    }
}

/// Total bytes of a frame list, as the aggregator counts them
pub fn frame_bytes(frames: &[Vec<u8>]) -> u64 {
    frames.iter().map(|f| f.len() as u64).sum()
}
