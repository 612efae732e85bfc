use super::*;
use crate::error::{EncodeError, Result as DecodeResult, wire_i32, wire_u32};
use crate::snapshot::attribute_value_text;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use tracing::trace;
use trellis_core::{FrameKind, RenderBatch, RenderTreeEdit, RenderTreeFrame};

const ALIGN: usize = 8;

/// A finished shared-memory batch: the whole address space and where the
/// batch struct lives in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMemoryBatch {
    memory: Bytes,
    batch_address: u32,
}

impl SharedMemoryBatch {
    pub fn memory(&self) -> &Bytes {
        &self.memory
    }

    pub fn batch_address(&self) -> u32 {
        self.batch_address
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn reader(&self) -> DecodeResult<SharedMemoryBatchReader<'_>> {
        SharedMemoryBatchReader::new(&self.memory, self.batch_address)
    }
}

/// Bump allocator over a byte region. Allocations are zeroed and 8-byte aligned.
pub struct SharedMemoryWriter {
    memory: BytesMut,
    interned: HashMap<String, u32>,
}

impl Default for SharedMemoryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryWriter {
    pub fn new() -> Self {
        let mut memory = BytesMut::with_capacity(512);
        // keep address 0 unused so it can mean null
        memory.resize(ALIGN, 0);
        Self {
            memory,
            interned: HashMap::new(),
        }
    }

    pub fn alloc(&mut self, size: usize) -> Result<u32, EncodeError> {
        let start = self.memory.len().next_multiple_of(ALIGN);
        let end = start + size;
        wire_u32(end)?;
        self.memory.resize(end, 0);
        wire_u32(start)
    }

    fn alloc_array(&mut self, count: usize, entry_len: usize) -> Result<u32, EncodeError> {
        if count == 0 {
            return Ok(NULL);
        }
        self.alloc(count * entry_len)
    }

    #[inline]
    fn put(&mut self, address: usize, bytes: &[u8]) {
        self.memory[address..address + bytes.len()].copy_from_slice(bytes);
    }

    pub fn put_i32(&mut self, address: usize, value: i32) {
        self.put(address, &value.to_le_bytes());
    }

    pub fn put_u32(&mut self, address: usize, value: u32) {
        self.put(address, &value.to_le_bytes());
    }

    pub fn put_u64(&mut self, address: usize, value: u64) {
        self.put(address, &value.to_le_bytes());
    }

    fn put_i16(&mut self, address: usize, value: i16) {
        self.put(address, &value.to_le_bytes());
    }

    /// Allocate a string object and return its address
    pub fn string(&mut self, value: &str) -> Result<u32, EncodeError> {
        let address = self.alloc(STRING_BYTES + value.len())?;
        let at = address as usize;
        self.put_u32(at + STRING_LEN, wire_u32(value.len())?);
        self.put(at + STRING_BYTES, value.as_bytes());
        Ok(address)
    }

    /// Same as `string`, but identical values share one object
    pub fn interned_string(&mut self, value: &str) -> Result<u32, EncodeError> {
        if let Some(&address) = self.interned.get(value) {
            return Ok(address);
        }
        let address = self.string(value)?;
        self.interned.insert(value.to_string(), address);
        Ok(address)
    }

    fn attribute_value(&mut self, value: Option<&str>) -> Result<u32, EncodeError> {
        match value {
            None => Ok(NULL),
            Some("") => self.interned_string(""),
            Some(s) => self.string(s),
        }
    }

    fn put_range(&mut self, address: usize, values: u32, count: usize) -> Result<(), EncodeError> {
        self.put_u32(address + RANGE_VALUES, values);
        self.put_i32(address + RANGE_COUNT, wire_i32(count)?);
        Ok(())
    }

    /// Lay out a whole batch and hand back the finished region
    pub fn encode(mut self, batch: &RenderBatch<'_>) -> Result<SharedMemoryBatch, EncodeError> {
        let batch_address = self.alloc(BATCH_LEN)?;
        let at = batch_address as usize;

        let edit_total: usize = batch.updated_components().map(|d| d.edits.len()).sum();
        let edits = self.alloc_array(edit_total, EDIT_LEN)?;
        let diff_count = batch.updated_component_count();
        let diffs = self.alloc_array(diff_count, DIFF_LEN)?;
        let mut edit_offset = 0usize;
        for (i, diff) in batch.updated_components().enumerate() {
            let entry = diffs as usize + DIFF_LEN * i;
            self.put_i32(entry + DIFF_COMPONENT_ID, diff.component_id.0);
            self.put_u32(entry + DIFF_EDITS_VALUES, edits);
            self.put_i32(entry + DIFF_EDITS_OFFSET, wire_i32(edit_offset)?);
            self.put_i32(entry + DIFF_EDITS_COUNT, wire_i32(diff.edits.len())?);
            for edit in diff.edits {
                self.write_edit(edits as usize + EDIT_LEN * edit_offset, edit)?;
                edit_offset += 1;
            }
        }
        self.put_range(at + BATCH_UPDATED_COMPONENTS, diffs, diff_count)?;

        let frames = batch.reference_frames();
        let frames_address = self.alloc_array(frames.len(), FRAME_LEN)?;
        for (i, frame) in frames.iter().enumerate() {
            self.write_frame(frames_address as usize + FRAME_LEN * i, frame)?;
        }
        self.put_range(at + BATCH_REFERENCE_FRAMES, frames_address, frames.len())?;

        let disposed = batch.disposed_component_ids();
        let disposed_address = self.alloc_array(disposed.len(), 4)?;
        for (i, id) in disposed.iter().enumerate() {
            self.put_i32(disposed_address as usize + 4 * i, id.0);
        }
        self.put_range(
            at + BATCH_DISPOSED_COMPONENT_IDS,
            disposed_address,
            disposed.len(),
        )?;

        let handlers = batch.disposed_event_handler_ids();
        let handlers_address = self.alloc_array(handlers.len(), 8)?;
        for (i, id) in handlers.iter().enumerate() {
            self.put_u64(handlers_address as usize + 8 * i, id.0);
        }
        self.put_range(
            at + BATCH_DISPOSED_EVENT_HANDLER_IDS,
            handlers_address,
            handlers.len(),
        )?;

        trace!(
            bytes = self.memory.len(),
            batch_address,
            "encoded shared-memory batch"
        );
        Ok(SharedMemoryBatch {
            memory: self.memory.freeze(),
            batch_address,
        })
    }

    fn write_edit(&mut self, at: usize, edit: &RenderTreeEdit) -> Result<(), EncodeError> {
        self.put_i32(at + EDIT_TYPE, edit.edit_type() as i32);
        self.put_i32(at + EDIT_SIBLING_INDEX, edit.sibling_index());
        self.put_i32(at + EDIT_NEW_TREE_INDEX, edit.reference_frame_index());
        let name = match edit.removed_attribute_name() {
            Some(name) => self.interned_string(name)?,
            None => NULL,
        };
        self.put_u32(at + EDIT_REMOVED_ATTRIBUTE_NAME, name);
        Ok(())
    }

    fn write_frame(&mut self, at: usize, frame: &RenderTreeFrame) -> Result<(), EncodeError> {
        self.put_i32(at + FRAME_SEQUENCE, frame.sequence);
        self.put_i16(at + FRAME_TYPE, frame.frame_type() as i16);
        match &frame.kind {
            FrameKind::Element {
                name,
                subtree_length,
                ..
            } => {
                self.put_i32(at + FRAME_SUBTREE_LENGTH, wire_i32(*subtree_length)?);
                let name = self.interned_string(name)?;
                self.put_u32(at + FRAME_STRING, name);
            }
            FrameKind::Text { content } | FrameKind::Markup { content } => {
                let content = self.string(content)?;
                self.put_u32(at + FRAME_STRING, content);
            }
            FrameKind::Attribute {
                name,
                value,
                event_handler_id,
                ..
            } => {
                self.put_u64(
                    at + FRAME_ATTRIBUTE_EVENT_HANDLER_ID,
                    event_handler_id.map_or(0, |id| id.0),
                );
                let name = self.interned_string(name)?;
                self.put_u32(at + FRAME_STRING, name);
                let value = self.attribute_value(attribute_value_text(value))?;
                self.put_u32(at + FRAME_ATTRIBUTE_VALUE, value);
            }
            FrameKind::Component {
                subtree_length,
                component_id,
                ..
            } => {
                self.put_i32(at + FRAME_SUBTREE_LENGTH, wire_i32(*subtree_length)?);
                self.put_i32(at + FRAME_COMPONENT_ID, component_id.map_or(-1, |id| id.0));
            }
            FrameKind::Region { subtree_length } => {
                self.put_i32(at + FRAME_SUBTREE_LENGTH, wire_i32(*subtree_length)?);
            }
            FrameKind::ElementReferenceCapture { reference_id, .. } => {
                let id = match reference_id {
                    Some(id) => self.string(id)?,
                    None => NULL,
                };
                self.put_u32(at + FRAME_STRING, id);
            }
            FrameKind::ComponentReferenceCapture { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_are_aligned_and_never_null() {
        let mut writer = SharedMemoryWriter::new();
        let a = writer.alloc(3).unwrap();
        let b = writer.alloc(4).unwrap();
        assert_ne!(a, NULL);
        assert_eq!(a % 8, 0);
        assert_eq!(b % 8, 0);
        assert!(b >= a + 3);
    }

    #[test]
    fn test_alloc_past_the_address_space_is_rejected() {
        let mut writer = SharedMemoryWriter::new();
        let size = u32::MAX as usize;
        assert_eq!(
            writer.alloc(size),
            Err(EncodeError::TooLarge(ALIGN + size))
        );
        assert_eq!(writer.memory.len(), ALIGN);
    }

    #[test]
    fn test_interned_strings_share_an_address() {
        let mut writer = SharedMemoryWriter::new();
        let div = writer.interned_string("div").unwrap();
        assert_eq!(writer.interned_string("div").unwrap(), div);
        assert_ne!(writer.string("div").unwrap(), div);

        let at = div as usize;
        assert_eq!(&writer.memory[at..at + 4], &3u32.to_le_bytes());
        assert_eq!(&writer.memory[at + 4..at + 7], b"div");
    }
}
