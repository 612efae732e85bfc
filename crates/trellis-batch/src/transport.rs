//! A `UiTransport` that encodes batches onto an outbox.

use crate::error::{DecodeError, EncodeError};
use crate::linear::{self, LinearBatchReader};
use crate::shared::{SharedMemoryBatch, SharedMemoryWriter};
use crate::snapshot::BatchSnapshot;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;
use trellis_core::{BatchId, DisplayUpdate, RenderBatch, UiTransport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Linear,
    SharedMemory,
}

/// Whether the UI confirms batches on its own schedule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    /// Every batch counts as applied once encoded
    #[default]
    Immediate,
    /// The host acknowledges each batch through the renderer
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedPayload {
    Linear(Bytes),
    SharedMemory(SharedMemoryBatch),
}

impl EncodedPayload {
    pub fn encode(encoding: Encoding, batch: &RenderBatch<'_>) -> Result<Self, EncodeError> {
        Ok(match encoding {
            Encoding::Linear => EncodedPayload::Linear(linear::encode(batch)?),
            Encoding::SharedMemory => {
                EncodedPayload::SharedMemory(SharedMemoryWriter::new().encode(batch)?)
            }
        })
    }

    pub fn len(&self) -> usize {
        match self {
            EncodedPayload::Linear(bytes) => bytes.len(),
            EncodedPayload::SharedMemory(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode through the matching reader
    pub fn snapshot(&self) -> Result<BatchSnapshot, DecodeError> {
        match self {
            EncodedPayload::Linear(bytes) => BatchSnapshot::read(&LinearBatchReader::new(bytes)?),
            EncodedPayload::SharedMemory(batch) => BatchSnapshot::read(&batch.reader()?),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub batch_id: BatchId,
    pub payload: EncodedPayload,
}

#[derive(Debug, Default)]
pub struct EncodingTransport {
    encoding: Encoding,
    ack_mode: AckMode,
    outbox: VecDeque<EncodedBatch>,
    bytes_sent: usize,
}

impl EncodingTransport {
    pub fn new(encoding: Encoding, ack_mode: AckMode) -> Self {
        Self {
            encoding,
            ack_mode,
            ..Self::default()
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Total payload bytes produced so far
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    pub fn pop(&mut self) -> Option<EncodedBatch> {
        self.outbox.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = EncodedBatch> + '_ {
        self.outbox.drain(..)
    }
}

impl UiTransport for EncodingTransport {
    fn update_display(
        &mut self,
        batch_id: BatchId,
        batch: &RenderBatch<'_>,
    ) -> anyhow::Result<DisplayUpdate> {
        let payload = EncodedPayload::encode(self.encoding, batch)?;
        debug!(
            batch_id = %batch_id,
            encoding = ?self.encoding,
            bytes = payload.len(),
            "encoded batch"
        );
        self.bytes_sent += payload.len();
        self.outbox.push_back(EncodedBatch { batch_id, payload });
        Ok(match self.ack_mode {
            AckMode::Immediate => DisplayUpdate::Applied,
            AckMode::Deferred => DisplayUpdate::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_names() {
        let encoding: Encoding = serde_json::from_str("\"shared-memory\"").unwrap();
        assert_eq!(encoding, Encoding::SharedMemory);
        let ack: AckMode = serde_json::from_str("\"deferred\"").unwrap();
        assert_eq!(ack, AckMode::Deferred);
        assert_eq!(Encoding::default(), Encoding::Linear);
    }

    #[test]
    fn test_new_transport_is_empty() {
        let mut transport = EncodingTransport::new(Encoding::SharedMemory, AckMode::Deferred);
        assert_eq!(transport.pending(), 0);
        assert!(transport.pop().is_none());
        assert_eq!(transport.ack_mode(), AckMode::Deferred);
    }
}
