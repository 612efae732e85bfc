//! Wire encodings for render batches.
//!
//! Two backends share one logical format and one reader trait:
//! [`linear`] packs a batch into a single buffer with a string table, and
//! [`shared`] lays it out as structs in a 32-bit address space.

pub mod dom;
pub mod error;
pub mod leb128;
pub mod linear;
pub mod reader;
pub mod shared;
pub mod snapshot;
pub mod transport;

pub use dom::{UiElement, UiNode, UiTree};
pub use error::{ApplyError, DecodeError, EncodeError};
pub use linear::LinearBatchReader;
pub use reader::{ArrayRange, BatchReader, DiffEntry, EditEntry, FrameEntry};
pub use shared::{SharedMemoryBatch, SharedMemoryBatchReader, SharedMemoryWriter};
pub use snapshot::{BatchSnapshot, DiffSnapshot, FrameSnapshot};
pub use transport::{AckMode, EncodedBatch, EncodedPayload, Encoding, EncodingTransport};
