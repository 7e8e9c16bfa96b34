//! Upload acknowledge status shared between the driver and a polling consumer.

use crate::types::UploadAck;
use log::trace;
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle to the most recent upload acknowledge.
///
/// The driver writes it when an upload completes; a shell timer reads it to refresh its status
/// line. Clones share the same cell.
#[derive(Debug, Clone, Default)]
pub struct UploadStatus {
    last: Arc<RwLock<Option<UploadAck>>>,
}

impl UploadStatus {
    pub fn new() -> UploadStatus {
        UploadStatus::default()
    }

    pub(crate) fn record(&self, ack: UploadAck) {
        trace!("Upload status -> slot {}", ack.slot);
        *self.last.write() = Some(ack);
    }

    pub fn clear(&self) {
        *self.last.write() = None;
    }

    /// The most recent acknowledge, if any upload completed.
    pub fn last(&self) -> Option<UploadAck> {
        *self.last.read()
    }

    /// Status line for the shell, empty when nothing has been acknowledged.
    pub fn text(&self) -> String {
        self.last().map(|ack| ack.to_string()).unwrap_or_default()
    }
}
