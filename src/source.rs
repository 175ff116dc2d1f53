// manet-pcap-stats/src/source.rs
use std::path::Path;

use crate::error::{DecodeError, SourceError};
use crate::record::PacketRecord;

/// Supplies decoded packet records for one capture file.
///
/// Protocol pre-filtering happens here, not in the classifier. The returned
/// iterator owns whatever the capture holds open; dropping it releases the
/// file.
pub trait PacketSource {
    type Packets: Iterator<Item = Result<PacketRecord, DecodeError>>;

    fn open(&self, path: &Path) -> Result<Self::Packets, SourceError>;
}
