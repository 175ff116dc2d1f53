// manet-pcap-stats/src/dissector.rs
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, SourceError};
use crate::message::Protocol;
use crate::record::PacketRecord;
use crate::source::PacketSource;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_VLAN: u16 = 0x8100;
const IP_PROTO_UDP: u8 = 17;
const LLC_SNAP: [u8; 6] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00];

/// Which records a [`PcapDissector`] hands on, applied before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayFilter {
    Aodv,
    Olsr,
    #[default]
    All,
}

impl DisplayFilter {
    pub fn accepts(&self, record: &PacketRecord) -> bool {
        match self {
            DisplayFilter::Aodv => record.has_layer(Protocol::Aodv.name()),
            DisplayFilter::Olsr => record.has_layer(Protocol::Olsr.name()),
            DisplayFilter::All => true,
        }
    }
}

impl From<Protocol> for DisplayFilter {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Aodv => DisplayFilter::Aodv,
            Protocol::Olsr => DisplayFilter::Olsr,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PcapDissectionResult {
    pub file_info: FileInfo,
    pub packets: Vec<PacketRecord>,
    pub summary: DissectionSummary,
}

impl PcapDissectionResult {
    /// Keep only the first `limit` records. File info and summary still
    /// describe the whole capture.
    pub fn truncate(&mut self, limit: usize) {
        self.packets.truncate(limit);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub datalink: String,
    pub total_packets: u32,
    pub file_size: u64,
    pub capture_start_time: Option<DateTime<Utc>>,
    pub capture_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DissectionSummary {
    pub protocol_distribution: HashMap<String, u32>,
    pub total_bytes: u64,
    pub decode_errors: u32,
    pub duration_seconds: f64,
    pub packets_per_second: f64,
}

/// Decodes classic pcap captures into [`PacketRecord`]s.
///
/// Link layers: Ethernet, Linux cooked, raw IP, 802.11 and radiotap + 802.11.
/// UDP traffic on the AODV and OLSR ports gets its routing header dissected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcapDissector {
    filter: DisplayFilter,
}

impl PcapDissector {
    pub fn new(filter: DisplayFilter) -> Self {
        PcapDissector { filter }
    }

    /// Lazily decode the packets of one capture.
    pub fn packets<P: AsRef<Path>>(&self, pcap_path: P) -> Result<PcapPackets, SourceError> {
        let path = pcap_path.as_ref();
        let file = File::open(path)?;
        let reader = PcapReader::new(BufReader::new(file))?;
        let datalink = reader.header().datalink;
        debug!("Opened {} ({:?})", path.display(), datalink);

        Ok(PcapPackets {
            reader,
            datalink,
            dissector: *self,
            index: 0,
            done: false,
        })
    }

    /// Dissect a whole capture and return its records as pretty JSON.
    pub fn dissect_pcap_to_json<P: AsRef<Path>>(&self, pcap_path: P) -> Result<String, Box<dyn std::error::Error>> {
        let result = self.dissect_pcap_file(pcap_path)?;
        Ok(serde_json::to_string_pretty(&result)?)
    }

    /// Dissect a whole capture into memory, with per-file summary statistics.
    pub fn dissect_pcap_file<P: AsRef<Path>>(&self, pcap_path: P) -> Result<PcapDissectionResult, SourceError> {
        let path = pcap_path.as_ref();
        let file_size = std::fs::metadata(path)?.len();
        let packets_iter = self.packets(path)?;
        let datalink = format!("{:?}", packets_iter.datalink());

        let mut packets = Vec::new();
        let mut protocol_counts = HashMap::new();
        let mut total_bytes = 0u64;
        let mut decode_errors = 0u32;
        let mut start_time: Option<DateTime<Utc>> = None;
        let mut end_time: Option<DateTime<Utc>> = None;

        for item in packets_iter {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    debug!("{}: {}", path.display(), e);
                    decode_errors += 1;
                    continue;
                }
            };

            if let Some(ts) = record.timestamp {
                start_time = Some(start_time.map_or(ts, |s| s.min(ts)));
                end_time = Some(end_time.map_or(ts, |e| e.max(ts)));
            }

            total_bytes += u64::from(record.length);
            if let Some(ref protocol) = record.protocol {
                *protocol_counts.entry(protocol.clone()).or_insert(0) += 1;
            }
            packets.push(record);
        }

        let duration = match (start_time, end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };
        let packets_per_second = if duration > 0.0 {
            packets.len() as f64 / duration
        } else {
            0.0
        };

        Ok(PcapDissectionResult {
            file_info: FileInfo {
                filename: path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
                datalink,
                total_packets: packets.len() as u32,
                file_size,
                capture_start_time: start_time,
                capture_end_time: end_time,
            },
            packets,
            summary: DissectionSummary {
                protocol_distribution: protocol_counts,
                total_bytes,
                decode_errors,
                duration_seconds: duration,
                packets_per_second,
            },
        })
    }

    /// Decode one captured frame. Never fails: whatever cannot be parsed is
    /// simply absent from the record.
    pub fn dissect_frame(
        &self,
        datalink: DataLink,
        data: &[u8],
        orig_len: u32,
        timestamp: Option<DateTime<Utc>>,
        packet_number: u32,
    ) -> PacketRecord {
        let mut record = PacketRecord {
            packet_number,
            timestamp,
            length: orig_len,
            captured_length: data.len() as u32,
            ..Default::default()
        };

        match datalink {
            DataLink::ETHERNET => self.parse_ethernet(&mut record, data),
            DataLink::LINUX_SLL => self.parse_linux_sll(&mut record, data),
            DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => self.parse_ip(&mut record, data),
            DataLink::IEEE802_11 => self.parse_wlan(&mut record, data),
            DataLink::IEEE802_11_RADIOTAP => self.parse_radiotap(&mut record, data),
            other => {
                trace!("packet {}: unsupported link type {:?}", packet_number, other);
            }
        }

        if record.protocol.is_none() {
            record.protocol = record.protocols.last().map(|p| p.to_uppercase());
        }
        self.generate_info_string(&mut record);
        record
    }

    fn parse_ethernet(&self, record: &mut PacketRecord, data: &[u8]) {
        if data.len() < 14 {
            return;
        }
        record.protocols.push("eth".to_string());
        insert(record, "eth.dst", format_mac(&data[0..6]));
        insert(record, "eth.src", format_mac(&data[6..12]));

        let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
        let mut offset = 14;
        if ethertype == ETHERTYPE_VLAN && data.len() >= 18 {
            record.protocols.push("vlan".to_string());
            insert(record, "vlan.id", u16::from_be_bytes([data[14], data[15]]) & 0x0FFF);
            ethertype = u16::from_be_bytes([data[16], data[17]]);
            offset = 18;
        }
        insert(record, "eth.type", format!("0x{:04x}", ethertype));
        self.parse_ethertype(record, ethertype, &data[offset..]);
    }

    fn parse_linux_sll(&self, record: &mut PacketRecord, data: &[u8]) {
        if data.len() < 16 {
            return;
        }
        record.protocols.push("sll".to_string());
        let ethertype = u16::from_be_bytes([data[14], data[15]]);
        insert(record, "sll.etype", format!("0x{:04x}", ethertype));
        self.parse_ethertype(record, ethertype, &data[16..]);
    }

    fn parse_ethertype(&self, record: &mut PacketRecord, ethertype: u16, payload: &[u8]) {
        match ethertype {
            ETHERTYPE_IPV4 => self.parse_ipv4(record, payload),
            ETHERTYPE_IPV6 => self.parse_ipv6(record, payload),
            ETHERTYPE_ARP => record.protocols.push("arp".to_string()),
            _ => {}
        }
    }

    fn parse_radiotap(&self, record: &mut PacketRecord, data: &[u8]) {
        if data.len() < 4 {
            return;
        }
        // Radiotap lengths are little-endian.
        let header_len = u16::from_le_bytes([data[2], data[3]]) as usize;
        record.protocols.push("radiotap".to_string());
        insert(record, "radiotap.length", header_len);
        if header_len < 4 || header_len > data.len() {
            return;
        }
        self.parse_wlan(record, &data[header_len..]);
    }

    fn parse_wlan(&self, record: &mut PacketRecord, data: &[u8]) {
        if data.len() < 24 {
            return;
        }
        record.protocols.push("wlan".to_string());

        let frame_control = data[0];
        let flags = data[1];
        let frame_type = (frame_control >> 2) & 0x03;
        let subtype = (frame_control >> 4) & 0x0F;
        insert(record, "wlan.fc.type", frame_type);
        insert(record, "wlan.fc.subtype", subtype);
        insert(record, "wlan.ra", format_mac(&data[4..10]));
        insert(record, "wlan.ta", format_mac(&data[10..16]));

        // Only unprotected data frames that carry a body.
        if frame_type != 2 || subtype & 0x04 != 0 || flags & 0x40 != 0 {
            return;
        }

        let mut header_len = 24;
        if flags & 0x03 == 0x03 {
            header_len += 6;
        }
        if subtype & 0x08 != 0 {
            header_len += 2;
            // +HTC: the Order bit on a QoS frame adds the HT Control field.
            if flags & 0x80 != 0 {
                header_len += 4;
            }
        }
        if data.len() < header_len + 8 || data[header_len..header_len + 6] != LLC_SNAP {
            return;
        }

        record.protocols.push("llc".to_string());
        let ethertype = u16::from_be_bytes([data[header_len + 6], data[header_len + 7]]);
        insert(record, "llc.type", format!("0x{:04x}", ethertype));
        self.parse_ethertype(record, ethertype, &data[header_len + 8..]);
    }

    fn parse_ip(&self, record: &mut PacketRecord, data: &[u8]) {
        match data.first().map(|b| b >> 4) {
            Some(4) => self.parse_ipv4(record, data),
            Some(6) => self.parse_ipv6(record, data),
            _ => {}
        }
    }

    fn parse_ipv4(&self, record: &mut PacketRecord, ip_data: &[u8]) {
        if ip_data.len() < 20 {
            return;
        }
        let header_len = ((ip_data[0] & 0x0F) as usize) * 4;
        if header_len < 20 || header_len > ip_data.len() {
            return;
        }
        record.protocols.push("ip".to_string());

        let total_length = u16::from_be_bytes([ip_data[2], ip_data[3]]) as usize;
        let identification = u16::from_be_bytes([ip_data[4], ip_data[5]]);
        let fragment_offset = u16::from_be_bytes([ip_data[6], ip_data[7]]) & 0x1FFF;
        let more_fragments = ip_data[6] & 0x20 != 0;
        let ttl = ip_data[8];
        let protocol = ip_data[9];
        let checksum = u16::from_be_bytes([ip_data[10], ip_data[11]]);
        let src = Ipv4Addr::new(ip_data[12], ip_data[13], ip_data[14], ip_data[15]);
        let dst = Ipv4Addr::new(ip_data[16], ip_data[17], ip_data[18], ip_data[19]);

        record.src_ip = Some(src.to_string());
        record.dst_ip = Some(dst.to_string());
        insert(record, "ip.version", 4u8);
        insert(record, "ip.hdr_len", header_len);
        insert(record, "ip.len", total_length);
        insert(record, "ip.id", format!("0x{:04x}", identification));
        insert(record, "ip.frag_offset", fragment_offset);
        insert(record, "ip.ttl", ttl);
        insert(record, "ip.proto", protocol);
        insert(record, "ip.checksum", format!("0x{:04x}", checksum));
        insert(record, "ip.src", src.to_string());
        insert(record, "ip.dst", dst.to_string());

        // Ethernet padding and 802.11 FCS trail the datagram.
        let end = if total_length >= header_len && total_length <= ip_data.len() {
            total_length
        } else {
            ip_data.len()
        };
        if protocol == IP_PROTO_UDP && fragment_offset == 0 && !more_fragments {
            self.parse_udp(record, &ip_data[header_len..end]);
        }
    }

    fn parse_ipv6(&self, record: &mut PacketRecord, ipv6_data: &[u8]) {
        if ipv6_data.len() < 40 {
            return;
        }
        record.protocols.push("ipv6".to_string());

        let payload_length = u16::from_be_bytes([ipv6_data[4], ipv6_data[5]]) as usize;
        let next_header = ipv6_data[6];
        let hop_limit = ipv6_data[7];
        let src = ipv6_addr(&ipv6_data[8..24]);
        let dst = ipv6_addr(&ipv6_data[24..40]);

        record.src_ip = Some(src.to_string());
        record.dst_ip = Some(dst.to_string());
        insert(record, "ipv6.plen", payload_length);
        insert(record, "ipv6.nxt", next_header);
        insert(record, "ipv6.hlim", hop_limit);
        insert(record, "ipv6.src", src.to_string());
        insert(record, "ipv6.dst", dst.to_string());

        let end = (40 + payload_length).min(ipv6_data.len());
        if next_header == IP_PROTO_UDP {
            self.parse_udp(record, &ipv6_data[40..end]);
        }
    }

    fn parse_udp(&self, record: &mut PacketRecord, udp_data: &[u8]) {
        if udp_data.len() < 8 {
            return;
        }
        record.protocols.push("udp".to_string());

        let src_port = u16::from_be_bytes([udp_data[0], udp_data[1]]);
        let dst_port = u16::from_be_bytes([udp_data[2], udp_data[3]]);
        let length = u16::from_be_bytes([udp_data[4], udp_data[5]]) as usize;
        let checksum = u16::from_be_bytes([udp_data[6], udp_data[7]]);

        record.src_port = Some(src_port);
        record.dst_port = Some(dst_port);
        insert(record, "udp.srcport", src_port);
        insert(record, "udp.dstport", dst_port);
        insert(record, "udp.length", length);
        insert(record, "udp.checksum", format!("0x{:04x}", checksum));

        let end = if length >= 8 && length <= udp_data.len() {
            length
        } else {
            udp_data.len()
        };
        let payload = &udp_data[8..end];

        match (src_port, dst_port) {
            (Protocol::AODV_PORT, _) | (_, Protocol::AODV_PORT) => self.parse_aodv(record, payload),
            (Protocol::OLSR_PORT, _) | (_, Protocol::OLSR_PORT) => {
                let address_len = if record.has_layer("ipv6") { 16 } else { 4 };
                self.parse_olsr(record, payload, address_len)
            }
            _ => record.protocol = Some("UDP".to_string()),
        }
    }

    // AODV control messages (RFC 3561 section 5).
    fn parse_aodv(&self, record: &mut PacketRecord, data: &[u8]) {
        record.protocols.push("aodv".to_string());
        record.protocol = Some("AODV".to_string());

        let Some(&message_type) = data.first() else {
            return;
        };
        insert(record, "aodv.type", message_type);
        insert(record, "aodv.type_name", aodv_type_name(message_type));

        match message_type {
            1 if data.len() >= 24 => {
                insert(record, "aodv.flags", format!("0x{:02x}", data[1]));
                insert(record, "aodv.hopcount", data[3]);
                insert(record, "aodv.rreq_id", be_u32(&data[4..8]));
                insert(record, "aodv.dest_ip", ipv4(&data[8..12]));
                insert(record, "aodv.dest_seqno", be_u32(&data[12..16]));
                insert(record, "aodv.orig_ip", ipv4(&data[16..20]));
                insert(record, "aodv.orig_seqno", be_u32(&data[20..24]));
            }
            2 if data.len() >= 20 => {
                insert(record, "aodv.flags", format!("0x{:02x}", data[1]));
                insert(record, "aodv.prefix_sz", data[2] & 0x1F);
                insert(record, "aodv.hopcount", data[3]);
                insert(record, "aodv.dest_ip", ipv4(&data[4..8]));
                insert(record, "aodv.dest_seqno", be_u32(&data[8..12]));
                insert(record, "aodv.orig_ip", ipv4(&data[12..16]));
                insert(record, "aodv.lifetime", be_u32(&data[16..20]));
            }
            3 if data.len() >= 4 => {
                let dest_count = data[3] as usize;
                insert(record, "aodv.flags", format!("0x{:02x}", data[1]));
                insert(record, "aodv.destcount", dest_count);

                let unreachable: Vec<Value> = data[4..]
                    .chunks_exact(8)
                    .take(dest_count)
                    .map(|entry| Value::String(ipv4(&entry[0..4])))
                    .collect();
                if !unreachable.is_empty() {
                    insert(record, "aodv.unreachable_dest_ip", unreachable);
                }
            }
            _ => {}
        }
    }

    // OLSR packet and message headers (RFC 3626 section 3.3).
    fn parse_olsr(&self, record: &mut PacketRecord, data: &[u8], address_len: usize) {
        record.protocols.push("olsr".to_string());
        record.protocol = Some("OLSR".to_string());
        if data.len() < 4 {
            return;
        }
        insert(record, "olsr.packet_len", u16::from_be_bytes([data[0], data[1]]));
        insert(record, "olsr.packet_seq_num", u16::from_be_bytes([data[2], data[3]]));

        let header_len = 8 + address_len;
        let mut types = Vec::new();
        let mut names = Vec::new();
        let mut vtimes = Vec::new();
        let mut sizes = Vec::new();
        let mut origins = Vec::new();
        let mut ttls = Vec::new();
        let mut hops = Vec::new();
        let mut seqs = Vec::new();

        let mut offset = 4;
        while offset + header_len <= data.len() {
            let message = &data[offset..];
            let message_type = message[0];
            let size = u16::from_be_bytes([message[2], message[3]]) as usize;
            let origin = &message[4..4 + address_len];
            let tail = &message[4 + address_len..header_len];

            types.push(Value::from(message_type));
            names.push(Value::from(olsr_message_name(message_type)));
            vtimes.push(Value::from(message[1]));
            sizes.push(Value::from(size));
            origins.push(Value::from(if address_len == 16 {
                ipv6_addr(origin).to_string()
            } else {
                ipv4(origin)
            }));
            ttls.push(Value::from(tail[0]));
            hops.push(Value::from(tail[1]));
            seqs.push(Value::from(u16::from_be_bytes([tail[2], tail[3]])));

            if size < header_len {
                break;
            }
            offset += size;
        }

        if !types.is_empty() {
            insert(record, "olsr.message_type", types);
            insert(record, "olsr.message", names);
            insert(record, "olsr.vtime", vtimes);
            insert(record, "olsr.message_size", sizes);
            insert(record, "olsr.origin_addr", origins);
            insert(record, "olsr.ttl", ttls);
            insert(record, "olsr.hop_count", hops);
            insert(record, "olsr.message_seq_num", seqs);
        }
    }

    fn generate_info_string(&self, record: &mut PacketRecord) {
        if let (Some(ref src_ip), Some(ref dst_ip)) = (&record.src_ip, &record.dst_ip) {
            let protocol = record.protocol.as_deref().unwrap_or("Unknown");

            if let (Some(src_port), Some(dst_port)) = (record.src_port, record.dst_port) {
                record.info = Some(format!("{} {}:{} → {}:{}", protocol, src_ip, src_port, dst_ip, dst_port));
            } else {
                record.info = Some(format!("{} {} → {}", protocol, src_ip, dst_ip));
            }
        }
    }
}

impl PacketSource for PcapDissector {
    type Packets = PcapPackets;

    fn open(&self, path: &Path) -> Result<Self::Packets, SourceError> {
        self.packets(path)
    }
}

/// One-pass iterator over the records of an open capture.
///
/// A framing error yields a single `Err` and ends the iteration, since the
/// stream cannot be resynchronized past a corrupt record header.
pub struct PcapPackets {
    reader: PcapReader<BufReader<File>>,
    datalink: DataLink,
    dissector: PcapDissector,
    index: u32,
    done: bool,
}

impl PcapPackets {
    pub fn datalink(&self) -> DataLink {
        self.datalink
    }
}

impl Iterator for PcapPackets {
    type Item = Result<PacketRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let packet = match self.reader.next_packet()? {
                Ok(packet) => packet,
                Err(e) => {
                    self.done = true;
                    return Some(Err(DecodeError {
                        index: self.index + 1,
                        message: e.to_string(),
                    }));
                }
            };
            self.index += 1;

            let timestamp = DateTime::from_timestamp(
                packet.timestamp.as_secs() as i64,
                packet.timestamp.subsec_nanos(),
            );
            let record = self.dissector.dissect_frame(
                self.datalink,
                &packet.data,
                packet.orig_len,
                timestamp,
                self.index,
            );

            if self.dissector.filter.accepts(&record) {
                return Some(Ok(record));
            }
        }
        None
    }
}

fn insert(record: &mut PacketRecord, name: &str, value: impl Into<Value>) {
    record.fields.insert(name.to_string(), value.into());
}

fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn ipv4(bytes: &[u8]) -> String {
    Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]).to_string()
}

fn ipv6_addr(bytes: &[u8]) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&bytes[..16]);
    Ipv6Addr::from(octets)
}

fn aodv_type_name(message_type: u8) -> &'static str {
    match message_type {
        1 => "Route Request",
        2 => "Route Reply",
        3 => "Route Error",
        4 => "Route Reply Acknowledgment",
        _ => "Unknown",
    }
}

// Names are lowercase so the rendered text stays stable under case folding.
fn olsr_message_name(message_type: u8) -> String {
    match message_type {
        1 => "hello".to_string(),
        2 => "tc (topology control)".to_string(),
        3 => "mid (multiple interface declaration)".to_string(),
        4 => "hna (host and network association)".to_string(),
        201 => "lq hello".to_string(),
        202 => "lq tc (topology control)".to_string(),
        other => format!("unknown ({})", other),
    }
}
