// manet-pcap-stats/src/aggregator.rs
use std::collections::BTreeMap;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::error::DecodeError;
use crate::message::{MessageType, Protocol};
use crate::record::PacketRecord;

/// Counters for one capture file.
///
/// `total_packets` always equals the sum of `counts`. Records the source
/// could not decode are counted as `Other` and additionally in
/// `unreadable_packets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTally {
    pub protocol: Protocol,
    pub total_packets: u64,
    pub total_bytes: u64,
    pub counts: BTreeMap<MessageType, u64>,
    pub unreadable_packets: u64,
}

impl CaptureTally {
    /// Zeroed tally holding exactly the protocol's message types.
    pub fn new(protocol: Protocol) -> Self {
        CaptureTally {
            protocol,
            total_packets: 0,
            total_bytes: 0,
            counts: protocol.message_types().iter().map(|t| (*t, 0)).collect(),
            unreadable_packets: 0,
        }
    }

    pub fn count(&self, message_type: MessageType) -> u64 {
        self.counts.get(&message_type).copied().unwrap_or(0)
    }

    fn record(&mut self, message_type: MessageType, bytes: u64) {
        self.total_packets += 1;
        self.total_bytes += bytes;
        // A classifier outside the protocol's set lands in Other.
        let key = if self.counts.contains_key(&message_type) {
            message_type
        } else {
            MessageType::Other
        };
        *self.counts.entry(key).or_insert(0) += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.counts.values().sum::<u64>() == self.total_packets
    }
}

/// Folds one capture's packet sequence into a [`CaptureTally`].
///
/// The sequence is consumed once, front to back. The tally is only
/// returned after it is exhausted.
pub fn aggregate<C, I>(file_id: &str, classifier: &C, packets: I) -> CaptureTally
where
    C: Classifier + ?Sized,
    I: IntoIterator<Item = Result<PacketRecord, DecodeError>>,
{
    let mut tally = CaptureTally::new(classifier.protocol());

    for packet in packets {
        match packet {
            Ok(record) => {
                let message_type = classifier.classify(&record);
                trace!("{}: packet {} -> {}", file_id, record.packet_number, message_type);
                tally.record(message_type, u64::from(record.length));
            }
            Err(e) => {
                warn!("{}: unreadable packet counted as {}: {}", file_id, MessageType::Other, e);
                tally.record(MessageType::Other, 0);
                tally.unreadable_packets += 1;
            }
        }
    }

    debug!(
        "{}: {} packets, {} bytes",
        file_id, tally.total_packets, tally.total_bytes
    );
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{AodvClassifier, OlsrClassifier};

    fn aodv(number: u32, length: u32, code: Option<u64>) -> Result<PacketRecord, DecodeError> {
        let record = PacketRecord::new(number, length);
        Ok(match code {
            Some(code) => record.with_field("aodv.type", code),
            None => record,
        })
    }

    #[test]
    fn test_empty_sequence_is_zeroed() {
        let tally = aggregate("empty.pcap", &AodvClassifier, Vec::<Result<PacketRecord, DecodeError>>::new());

        assert_eq!(tally, CaptureTally::new(Protocol::Aodv));
        assert_eq!(tally.total_packets, 0);
        assert_eq!(tally.total_bytes, 0);
        assert!(tally.counts.values().all(|c| *c == 0));
        assert_eq!(tally.counts.len(), 4);
    }

    #[test]
    fn test_mixed_aodv_sequence() {
        let packets = vec![
            aodv(1, 90, Some(1)),
            aodv(2, 90, Some(1)),
            aodv(3, 86, Some(2)),
            aodv(4, 78, Some(3)),
            aodv(5, 60, None),
        ];
        let tally = aggregate("aodv-control-node1.pcap", &AodvClassifier, packets);

        assert_eq!(tally.total_packets, 5);
        assert_eq!(tally.count(MessageType::Rreq), 2);
        assert_eq!(tally.count(MessageType::Rrep), 1);
        assert_eq!(tally.count(MessageType::Rerr), 1);
        assert_eq!(tally.count(MessageType::Other), 1);
        assert_eq!(tally.total_bytes, 90 + 90 + 86 + 78 + 60);
        assert!(tally.is_consistent());
    }

    #[test]
    fn test_unreadable_record_counts_as_other_and_scan_continues() {
        let packets = vec![
            aodv(1, 90, Some(1)),
            Err(DecodeError {
                index: 2,
                message: "truncated record".to_string(),
            }),
            aodv(3, 86, Some(2)),
        ];
        let tally = aggregate("node.pcap", &AodvClassifier, packets);

        assert_eq!(tally.total_packets, 3);
        assert_eq!(tally.count(MessageType::Other), 1);
        assert_eq!(tally.unreadable_packets, 1);
        assert_eq!(tally.count(MessageType::Rrep), 1);
        assert_eq!(tally.total_bytes, 176);
        assert!(tally.is_consistent());
    }

    #[test]
    fn test_counts_always_sum_to_total() {
        for n in 0..50u32 {
            let packets = (0..n).map(|i| aodv(i + 1, 64, Some(u64::from(i % 6))));
            let tally = aggregate("sweep.pcap", &AodvClassifier, packets);
            assert_eq!(tally.total_packets, u64::from(n));
            assert!(tally.is_consistent());
        }
    }

    #[test]
    fn test_olsr_tally_uses_olsr_types() {
        let packets: Vec<Result<PacketRecord, DecodeError>> = vec![
            Ok(PacketRecord::new(1, 80).with_field("olsr.message", "hello")),
            Ok(PacketRecord::new(2, 120).with_field("olsr.message", "tc (topology control)")),
        ];
        let tally = aggregate("olsr-control-0-1.pcap", &OlsrClassifier::default(), packets);

        assert_eq!(tally.protocol, Protocol::Olsr);
        assert_eq!(tally.count(MessageType::Hello), 1);
        assert_eq!(tally.count(MessageType::Tc), 1);
        assert_eq!(tally.count(MessageType::Mid), 0);
        assert!(!tally.counts.contains_key(&MessageType::Rreq));
    }
}
