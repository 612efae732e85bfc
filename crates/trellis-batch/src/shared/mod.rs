//! Batch laid out as structs in a 32-bit address space, the way a UI
//! sharing the renderer's memory would read it. Address 0 is null.
//!
//! ```text
//! batch   ArrayRange x 4: updated components, reference frames,
//!         disposed component ids, disposed handler ids
//! range   values: u32 pointer, count: i32
//! diff    componentId, edits segment { values, offset, count }
//! edit    type, siblingIndex, newTreeIndex | moveToSiblingIndex, removedAttributeName*
//! frame   sequence, type: i16, union { subtreeLength, componentId | handlerId: u64 },
//!         name|text|markup|referenceId*, attributeValue*
//! string  byteLength: u32, UTF-8
//! ```

mod reader;
mod writer;

pub use reader::SharedMemoryBatchReader;
pub use writer::{SharedMemoryBatch, SharedMemoryWriter};

pub const NULL: u32 = 0;

pub const BATCH_LEN: usize = 32;
pub const BATCH_UPDATED_COMPONENTS: usize = 0;
pub const BATCH_REFERENCE_FRAMES: usize = 8;
pub const BATCH_DISPOSED_COMPONENT_IDS: usize = 16;
pub const BATCH_DISPOSED_EVENT_HANDLER_IDS: usize = 24;

pub const RANGE_VALUES: usize = 0;
pub const RANGE_COUNT: usize = 4;

pub const DIFF_LEN: usize = 16;
pub const DIFF_COMPONENT_ID: usize = 0;
pub const DIFF_EDITS_VALUES: usize = 4;
pub const DIFF_EDITS_OFFSET: usize = 8;
pub const DIFF_EDITS_COUNT: usize = 12;

pub const EDIT_LEN: usize = 16;
pub const EDIT_TYPE: usize = 0;
pub const EDIT_SIBLING_INDEX: usize = 4;
pub const EDIT_NEW_TREE_INDEX: usize = 8;
pub const EDIT_REMOVED_ATTRIBUTE_NAME: usize = 12;

pub const FRAME_LEN: usize = 36;
pub const FRAME_SEQUENCE: usize = 0;
pub const FRAME_TYPE: usize = 4;
pub const FRAME_SUBTREE_LENGTH: usize = 8;
pub const FRAME_COMPONENT_ID: usize = 12;
pub const FRAME_ATTRIBUTE_EVENT_HANDLER_ID: usize = 8;
pub const FRAME_STRING: usize = 16;
pub const FRAME_ATTRIBUTE_VALUE: usize = 24;

pub const STRING_LEN: usize = 0;
pub const STRING_BYTES: usize = 4;
