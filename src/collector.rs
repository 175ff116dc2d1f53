// manet-pcap-stats/src/collector.rs
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregator::{aggregate, CaptureTally};
use crate::classifier::Classifier;
use crate::error::{CaptureError, CollectError};
use crate::message::{MessageType, Protocol};
use crate::source::PacketSource;

/// What the collector does when a capture file cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure in [`Dataset::failures`] and go on with the next file.
    #[default]
    Continue,
    /// Stop at the first unreadable file and return [`CollectError::Halted`]
    /// carrying every row computed so far.
    Halt,
}

#[derive(Debug, Clone, Default)]
pub struct CollectorOptions {
    pub failure_policy: FailurePolicy,
}

/// One processed capture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRow {
    pub filename: String,
    pub node_id: String,
    #[serde(flatten)]
    pub tally: CaptureTally,
}

/// A file that could not be read, kept alongside the rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub filename: String,
    pub path: PathBuf,
    pub reason: String,
}

impl From<&CaptureError> for FileFailure {
    fn from(error: &CaptureError) -> Self {
        let path = error.path().clone();
        FileFailure {
            filename: display_name(&path),
            path,
            reason: error.to_string(),
        }
    }
}

/// Sums across every row of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub unreadable_packets: u64,
    pub counts: BTreeMap<MessageType, u64>,
}

impl Totals {
    pub fn count(&self, message_type: MessageType) -> u64 {
        self.counts.get(&message_type).copied().unwrap_or(0)
    }

    /// Share of `message_type` among the protocol's named control types, in percent.
    pub fn control_share(&self, protocol: Protocol, message_type: MessageType) -> f64 {
        let control: u64 = protocol.control_types().iter().map(|t| self.count(*t)).sum();
        if control == 0 {
            0.0
        } else {
            self.count(message_type) as f64 / control as f64 * 100.0
        }
    }
}

/// Ordered rows, one per successfully processed file, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub protocol: Protocol,
    pub rows: Vec<CaptureRow>,
    pub failures: Vec<FileFailure>,
}

impl Dataset {
    pub fn new(protocol: Protocol) -> Self {
        Dataset {
            protocol,
            rows: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals {
            total_packets: 0,
            total_bytes: 0,
            unreadable_packets: 0,
            counts: self.protocol.message_types().iter().map(|t| (*t, 0)).collect(),
        };
        for row in &self.rows {
            totals.total_packets += row.tally.total_packets;
            totals.total_bytes += row.tally.total_bytes;
            totals.unreadable_packets += row.tally.unreadable_packets;
            for (message_type, count) in &row.tally.counts {
                *totals.counts.entry(*message_type).or_insert(0) += count;
            }
        }
        totals
    }
}

/// Node identifier encoded in a capture file name: the last dash-separated
/// segment of the base name, cut at its first dot.
///
/// `aodv-control-node3.pcap` gives `node3`; ns-3's `olsr-control-4-1.pcap`
/// (node 4, device 1) gives `1`.
pub fn node_id_from_filename(path: &Path) -> String {
    let name = display_name(path);
    let segment = name.rsplit('-').next().unwrap_or(&name);
    segment.split('.').next().unwrap_or(segment).to_string()
}

/// Capture files named `<protocol>-control-*.pcap` directly inside `dir`,
/// sorted by name. Symlinks to regular files are followed.
pub fn discover_captures(dir: &Path, protocol: Protocol) -> io::Result<Vec<PathBuf>> {
    let prefix = format!("{}-control-", protocol.name());
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".pcap") && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Runs the aggregator over a list of capture files.
pub struct Collector<S, C> {
    source: S,
    classifier: C,
    options: CollectorOptions,
}

impl<S, C> Collector<S, C>
where
    S: PacketSource,
    C: Classifier,
{
    pub fn new(source: S, classifier: C) -> Self {
        Collector {
            source,
            classifier,
            options: CollectorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CollectorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.classifier.protocol()
    }

    /// Process one file to completion.
    pub fn collect_file(&self, path: &Path) -> Result<CaptureRow, CaptureError> {
        let filename = display_name(path);
        let packets = self
            .source
            .open(path)
            .map_err(|reason| CaptureError::FileUnreadable {
                path: path.to_path_buf(),
                reason,
            })?;

        let tally = aggregate(&filename, &self.classifier, packets);

        Ok(CaptureRow {
            node_id: node_id_from_filename(path),
            filename,
            tally,
        })
    }

    /// Process every file in the order given.
    ///
    /// An empty list gives an empty dataset. Unreadable files follow the
    /// configured [`FailurePolicy`].
    pub fn collect<P: AsRef<Path>>(&self, files: &[P]) -> Result<Dataset, CollectError> {
        let mut dataset = Dataset::new(self.protocol());

        for file in files {
            let path = file.as_ref();
            info!("Processing {}...", display_name(path));

            match self.collect_file(path) {
                Ok(row) => dataset.rows.push(row),
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::Continue => {
                        warn!("Skipping {}", e);
                        dataset.failures.push(FileFailure::from(&e));
                    }
                    FailurePolicy::Halt => {
                        return Err(CollectError::Halted {
                            completed: dataset,
                            source: e,
                        });
                    }
                },
            }
        }

        Ok(dataset)
    }
}
