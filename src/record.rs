// manet-pcap-stats/src/record.rs
use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded packet, as handed from a packet source to the classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacketRecord {
    pub packet_number: u32,
    pub timestamp: Option<DateTime<Utc>>,
    /// Original frame length on the wire, in bytes.
    pub length: u32,
    pub captured_length: u32,
    /// Layer names from outermost to innermost, e.g. `["eth", "ip", "udp", "aodv"]`.
    pub protocols: Vec<String>,
    pub src_ip: Option<String>,
    pub dst_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub protocol: Option<String>,
    pub info: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

impl PacketRecord {
    pub fn new(packet_number: u32, length: u32) -> Self {
        PacketRecord {
            packet_number,
            length,
            captured_length: length,
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_protocols(mut self, protocols: &[&str]) -> Self {
        self.protocols = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Integer value of a scalar field. Absent, negative or non-integer fields give `None`.
    pub fn field_u64(&self, name: &str) -> Option<u64> {
        self.field(name).and_then(Value::as_u64)
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.protocols.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    /// Plain-text rendering of the record: a frame line, the layer stack,
    /// then one `name: value` line per field (array fields expand to one
    /// line per element), then the info string.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "frame {}: {} bytes", self.packet_number, self.length);
        if !self.protocols.is_empty() {
            let _ = writeln!(text, "frame.protocols: {}", self.protocols.join(":"));
        }
        for (name, value) in &self.fields {
            match value {
                Value::Array(items) => {
                    for item in items {
                        let _ = writeln!(text, "{}: {}", name, render_value(item));
                    }
                }
                other => {
                    let _ = writeln!(text, "{}: {}", name, render_value(other));
                }
            }
        }
        if let Some(info) = &self.info {
            let _ = writeln!(text, "{}", info);
        }
        text
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
