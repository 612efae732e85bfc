//! Backend-neutral view over an encoded batch.

use crate::error::{DecodeError, Result};
use trellis_core::{ComponentId, EditType, EventHandlerId, FrameType};

/// Location and length of one array inside an encoded batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRange {
    /// Byte offset (linear) or address (shared memory) of the first entry
    pub values: usize,
    pub count: usize,
}

impl ArrayRange {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub(crate) fn check(&self, what: &'static str, index: usize) -> Result<()> {
        if index < self.count {
            Ok(())
        } else {
            Err(DecodeError::IndexOutOfRange {
                what,
                index: index as i64,
                count: self.count,
            })
        }
    }
}

/// Opaque handle to a diff entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffEntry(pub usize);

/// Opaque handle to an edit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditEntry(pub usize);

/// Opaque handle to a frame entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEntry(pub usize);

/// Random access into an encoded batch. Strings borrow from the buffer.
///
/// Field accessors are only meaningful for the entry kinds that carry the
/// field; asking a text frame for its subtree length returns whatever bytes
/// sit in that slot.
pub trait BatchReader<'a> {
    fn updated_components(&self) -> Result<ArrayRange>;
    fn reference_frames(&self) -> Result<ArrayRange>;
    fn disposed_component_ids(&self) -> Result<ArrayRange>;
    fn disposed_event_handler_ids(&self) -> Result<ArrayRange>;

    fn diff_at(&self, updated_components: ArrayRange, index: usize) -> Result<DiffEntry>;
    fn diff_component_id(&self, diff: DiffEntry) -> Result<ComponentId>;
    fn diff_edits(&self, diff: DiffEntry) -> Result<ArrayRange>;

    fn edit_at(&self, edits: ArrayRange, index: usize) -> Result<EditEntry>;
    fn edit_type(&self, edit: EditEntry) -> Result<EditType>;
    fn edit_sibling_index(&self, edit: EditEntry) -> Result<i32>;
    /// Reference frame index, or the destination of a permutation entry
    fn edit_new_tree_index(&self, edit: EditEntry) -> Result<i32>;
    fn edit_removed_attribute_name(&self, edit: EditEntry) -> Result<Option<&'a str>>;

    fn frame_at(&self, reference_frames: ArrayRange, index: usize) -> Result<FrameEntry>;
    fn frame_type(&self, frame: FrameEntry) -> Result<FrameType>;
    fn frame_subtree_length(&self, frame: FrameEntry) -> Result<usize>;
    fn frame_component_id(&self, frame: FrameEntry) -> Result<ComponentId>;
    fn frame_element_name(&self, frame: FrameEntry) -> Result<Option<&'a str>>;
    /// Content of a text or markup frame
    fn frame_text_content(&self, frame: FrameEntry) -> Result<Option<&'a str>>;
    fn frame_attribute_name(&self, frame: FrameEntry) -> Result<Option<&'a str>>;
    fn frame_attribute_value(&self, frame: FrameEntry) -> Result<Option<&'a str>>;
    /// `None` when the attribute carries no handler
    fn frame_attribute_event_handler_id(&self, frame: FrameEntry)
    -> Result<Option<EventHandlerId>>;
    fn frame_element_reference_capture_id(&self, frame: FrameEntry) -> Result<Option<&'a str>>;

    fn disposed_component_id_at(&self, range: ArrayRange, index: usize) -> Result<ComponentId>;
    fn disposed_event_handler_id_at(
        &self,
        range: ArrayRange,
        index: usize,
    ) -> Result<EventHandlerId>;
}

#[inline]
fn slice_at(buf: &[u8], offset: usize, needed: usize) -> Result<&[u8]> {
    offset
        .checked_add(needed)
        .and_then(|end| buf.get(offset..end))
        .ok_or(DecodeError::Truncated {
            offset,
            needed,
            len: buf.len(),
        })
}

#[inline]
pub(crate) fn read_i32(buf: &[u8], offset: usize) -> Result<i32> {
    let bytes = slice_at(buf, offset, 4)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = slice_at(buf, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub(crate) fn read_i16(buf: &[u8], offset: usize) -> Result<i16> {
    let bytes = slice_at(buf, offset, 2)?;
    Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub(crate) fn read_u64(buf: &[u8], offset: usize) -> Result<u64> {
    let bytes = slice_at(buf, offset, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

pub(crate) fn read_utf8(buf: &[u8], offset: usize, len: usize) -> Result<&str> {
    let bytes = slice_at(buf, offset, len)?;
    std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })
}

/// A count or length field, which must not be negative
#[inline]
pub(crate) fn read_count(buf: &[u8], offset: usize, what: &'static str) -> Result<usize> {
    let value = read_i32(buf, offset)?;
    usize::try_from(value).map_err(|_| DecodeError::Negative {
        what,
        value: value.into(),
    })
}

pub(crate) fn edit_type_from(raw: i32) -> Result<EditType> {
    EditType::from_i32(raw).ok_or(DecodeError::InvalidEditType(raw))
}

pub(crate) fn frame_type_from(raw: i32) -> Result<FrameType> {
    FrameType::from_i32(raw).ok_or(DecodeError::InvalidFrameType(raw))
}

pub(crate) fn handler_id_from(raw: u64) -> Option<EventHandlerId> {
    (raw != 0).then_some(EventHandlerId(raw))
}
