//! Single contiguous little-endian buffer.
//!
//! ```text
//! diff records        componentId, editCount, editCount x 16-byte edits
//! updated components  count, count x i32 offset of a diff record
//! reference frames    count, count x 20-byte frames
//! disposed components count, count x i32
//! disposed handlers   count, count x u64
//! string blobs        LEB128 byte length, UTF-8
//! string table        i32 offset of each blob
//! trailer             five i32 offsets, in the order above
//! ```
//!
//! String fields hold an index into the string table, -1 for none.

mod reader;
mod writer;

pub use reader::LinearBatchReader;
pub use writer::encode;

pub const TRAILER_LEN: usize = 20;
pub const TRAILER_UPDATED_COMPONENTS: usize = 20;
pub const TRAILER_REFERENCE_FRAMES: usize = 16;
pub const TRAILER_DISPOSED_COMPONENT_IDS: usize = 12;
pub const TRAILER_DISPOSED_EVENT_HANDLER_IDS: usize = 8;
pub const TRAILER_STRING_TABLE: usize = 4;

pub const DIFF_COMPONENT_ID: usize = 0;
pub const DIFF_EDIT_COUNT: usize = 4;
pub const DIFF_EDITS: usize = 8;

pub const EDIT_LEN: usize = 16;
pub const EDIT_TYPE: usize = 0;
pub const EDIT_SIBLING_INDEX: usize = 4;
pub const EDIT_NEW_TREE_INDEX: usize = 8;
pub const EDIT_REMOVED_ATTRIBUTE_NAME: usize = 12;

pub const FRAME_LEN: usize = 20;
pub const FRAME_TYPE: usize = 0;
pub const FRAME_SUBTREE_LENGTH: usize = 4;
pub const FRAME_COMPONENT_ID: usize = 8;
pub const FRAME_ELEMENT_NAME: usize = 8;
pub const FRAME_TEXT_CONTENT: usize = 4;
pub const FRAME_ATTRIBUTE_NAME: usize = 4;
pub const FRAME_ATTRIBUTE_VALUE: usize = 8;
pub const FRAME_ATTRIBUTE_EVENT_HANDLER_ID: usize = 12;
pub const FRAME_ELEMENT_REFERENCE_CAPTURE_ID: usize = 4;

pub const NO_STRING: i32 = -1;
