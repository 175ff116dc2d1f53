// manet-pcap-stats/src/message.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Routing protocols whose control traffic can be tallied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Aodv,
    Olsr,
}

impl Protocol {
    pub const AODV_PORT: u16 = 654;
    pub const OLSR_PORT: u16 = 698;

    /// Well-known UDP port the protocol's control messages use.
    pub fn udp_port(self) -> u16 {
        match self {
            Protocol::Aodv => Self::AODV_PORT,
            Protocol::Olsr => Self::OLSR_PORT,
        }
    }

    /// Lowercase name, as used in layer lists, field prefixes and file names.
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Aodv => "aodv",
            Protocol::Olsr => "olsr",
        }
    }

    /// The closed set of message types this protocol classifies into,
    /// in display order. `Other` is always last.
    pub fn message_types(self) -> &'static [MessageType] {
        match self {
            Protocol::Aodv => &[
                MessageType::Rreq,
                MessageType::Rrep,
                MessageType::Rerr,
                MessageType::Other,
            ],
            Protocol::Olsr => &[
                MessageType::Hello,
                MessageType::Tc,
                MessageType::Mid,
                MessageType::Other,
            ],
        }
    }

    /// Named control types only (no `Other`), as charted in reports.
    pub fn control_types(self) -> &'static [MessageType] {
        let types = self.message_types();
        &types[..types.len() - 1]
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_uppercase())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aodv" => Ok(Protocol::Aodv),
            "olsr" => Ok(Protocol::Olsr),
            other => Err(format!("unknown protocol '{}', expected aodv or olsr", other)),
        }
    }
}

/// Control-message type of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Rreq,
    Rrep,
    Rerr,
    Hello,
    Tc,
    Mid,
    Other,
}

impl MessageType {
    pub fn label(self) -> &'static str {
        match self {
            MessageType::Rreq => "RREQ",
            MessageType::Rrep => "RREP",
            MessageType::Rerr => "RERR",
            MessageType::Hello => "HELLO",
            MessageType::Tc => "TC",
            MessageType::Mid => "MID",
            MessageType::Other => "OTHER",
        }
    }

    /// Column name used in tabular output, e.g. `rreq_packets`.
    pub fn column(self) -> String {
        format!("{}_packets", self.label().to_lowercase())
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_protocol_ends_with_other() {
        for protocol in [Protocol::Aodv, Protocol::Olsr] {
            assert_eq!(protocol.message_types().last(), Some(&MessageType::Other));
            assert!(!protocol.control_types().contains(&MessageType::Other));
            assert_eq!(protocol.control_types().len(), 3);
        }
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("AODV".parse::<Protocol>().unwrap(), Protocol::Aodv);
        assert_eq!("olsr".parse::<Protocol>().unwrap(), Protocol::Olsr);
        assert!("dsr".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_columns() {
        assert_eq!(MessageType::Rreq.column(), "rreq_packets");
        assert_eq!(MessageType::Other.column(), "other_packets");
    }
}
