// manet-pcap-stats/src/lib.rs
//! Classify and tally MANET routing-control traffic (AODV, OLSR) from pcap
//! captures, one row per capture file.
//!
//! ```no_run
//! use manet_pcap_stats::{collect_captures, Protocol};
//!
//! let dataset = collect_captures(Protocol::Aodv, &["aodv-control-node1.pcap"])?;
//! println!("{} packets", dataset.totals().total_packets);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::path::Path;

mod aggregator;
mod classifier;
mod collector;
mod dissector;
mod error;
mod message;
mod record;
mod report;
mod source;

pub use aggregator::*;
pub use classifier::*;
pub use collector::*;
pub use dissector::*;
pub use error::*;
pub use message::*;
pub use record::*;
pub use report::*;
pub use source::*;

/// Pcap collector for `protocol`: display filter and classifier both set from it.
pub fn pcap_collector(protocol: Protocol) -> Collector<PcapDissector, ProtocolClassifier> {
    Collector::new(
        PcapDissector::new(DisplayFilter::from(protocol)),
        ProtocolClassifier::from(protocol),
    )
}

/// Tally every capture in `files`, continuing past unreadable ones.
pub fn collect_captures<P: AsRef<Path>>(protocol: Protocol, files: &[P]) -> Result<Dataset, CollectError> {
    pcap_collector(protocol).collect(files)
}

/// Dissect a pcap file and return every record as JSON.
pub fn dissect_pcap_to_json<P: AsRef<Path>>(pcap_path: P) -> Result<String, Box<dyn std::error::Error>> {
    PcapDissector::default().dissect_pcap_to_json(pcap_path)
}

/// Dissect a pcap file and return structured data.
pub fn dissect_pcap<P: AsRef<Path>>(pcap_path: P) -> Result<PcapDissectionResult, SourceError> {
    PcapDissector::default().dissect_pcap_file(pcap_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_pcap_dissection_api() {
        let result = dissect_pcap_to_json("nonexistent.pcap");
        assert!(result.is_err());
    }

    #[test]
    fn test_garbage_file_is_unreadable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"this is not a capture file").unwrap();

        let err = pcap_collector(Protocol::Olsr)
            .collect_file(file.path())
            .unwrap_err();
        assert!(matches!(err, CaptureError::FileUnreadable { reason: SourceError::Pcap(_), .. }));
    }

    #[test]
    fn test_collect_captures_continues_past_missing_files() {
        let dataset = collect_captures(Protocol::Aodv, &["missing-a.pcap", "missing-b.pcap"]).unwrap();

        assert!(dataset.rows.is_empty());
        assert_eq!(dataset.failures.len(), 2);
        assert_eq!(dataset.failures[1].filename, "missing-b.pcap");
    }
}
