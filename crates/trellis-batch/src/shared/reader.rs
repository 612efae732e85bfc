use super::*;
use crate::error::{DecodeError, Result};
use crate::reader::{
    ArrayRange, BatchReader, DiffEntry, EditEntry, FrameEntry, edit_type_from, frame_type_from,
    handler_id_from, read_count, read_i16, read_i32, read_u32, read_u64, read_utf8,
};
use trellis_core::{ComponentId, EditType, EventHandlerId, FrameType};

/// Reads a shared-memory batch in place
#[derive(Debug, Clone, Copy)]
pub struct SharedMemoryBatchReader<'a> {
    memory: &'a [u8],
    batch: usize,
}

impl<'a> SharedMemoryBatchReader<'a> {
    pub fn new(memory: &'a [u8], batch_address: u32) -> Result<Self> {
        if batch_address == NULL {
            return Err(DecodeError::NullPointer("batch"));
        }
        let batch = batch_address as usize;
        read_i32(memory, batch + BATCH_LEN - 4)?;
        Ok(Self { memory, batch })
    }

    /// Read a batch living in memory this process does not own.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` bytes for all of `'a`, and
    /// nothing may write to that memory while the reader or any string it
    /// returned is alive.
    pub unsafe fn from_raw_parts(ptr: *const u8, len: usize, batch_address: u32) -> Result<Self> {
        // SAFETY: upheld by the caller
        let memory = unsafe { std::slice::from_raw_parts(ptr, len) };
        Self::new(memory, batch_address)
    }

    /// Sequence number of a frame. Only this backend carries it.
    pub fn frame_sequence(&self, frame: FrameEntry) -> Result<i32> {
        read_i32(self.memory, frame.0 + FRAME_SEQUENCE)
    }

    pub fn string(&self, address: u32) -> Result<Option<&'a str>> {
        if address == NULL {
            return Ok(None);
        }
        let at = address as usize;
        let len = read_u32(self.memory, at + STRING_LEN)? as usize;
        read_utf8(self.memory, at + STRING_BYTES, len).map(Some)
    }

    fn string_at(&self, address: usize) -> Result<Option<&'a str>> {
        self.string(read_u32(self.memory, address)?)
    }

    fn range(&self, at: usize, what: &'static str) -> Result<ArrayRange> {
        let values = read_u32(self.memory, at + RANGE_VALUES)?;
        let count = read_count(self.memory, at + RANGE_COUNT, what)?;
        if values == NULL && count > 0 {
            return Err(DecodeError::NullPointer(what));
        }
        Ok(ArrayRange {
            values: values as usize,
            count,
        })
    }
}

impl<'a> BatchReader<'a> for SharedMemoryBatchReader<'a> {
    fn updated_components(&self) -> Result<ArrayRange> {
        self.range(self.batch + BATCH_UPDATED_COMPONENTS, "updated components")
    }

    fn reference_frames(&self) -> Result<ArrayRange> {
        self.range(self.batch + BATCH_REFERENCE_FRAMES, "reference frames")
    }

    fn disposed_component_ids(&self) -> Result<ArrayRange> {
        self.range(self.batch + BATCH_DISPOSED_COMPONENT_IDS, "disposed components")
    }

    fn disposed_event_handler_ids(&self) -> Result<ArrayRange> {
        self.range(
            self.batch + BATCH_DISPOSED_EVENT_HANDLER_IDS,
            "disposed handlers",
        )
    }

    fn diff_at(&self, updated_components: ArrayRange, index: usize) -> Result<DiffEntry> {
        updated_components.check("diff", index)?;
        Ok(DiffEntry(updated_components.values + DIFF_LEN * index))
    }

    fn diff_component_id(&self, diff: DiffEntry) -> Result<ComponentId> {
        read_i32(self.memory, diff.0 + DIFF_COMPONENT_ID).map(ComponentId)
    }

    fn diff_edits(&self, diff: DiffEntry) -> Result<ArrayRange> {
        let values = read_u32(self.memory, diff.0 + DIFF_EDITS_VALUES)?;
        let offset = read_count(self.memory, diff.0 + DIFF_EDITS_OFFSET, "edit offset")?;
        let count = read_count(self.memory, diff.0 + DIFF_EDITS_COUNT, "edit count")?;
        if count == 0 {
            return Ok(ArrayRange { values: 0, count });
        }
        if values == NULL {
            return Err(DecodeError::NullPointer("edits"));
        }
        Ok(ArrayRange {
            values: values as usize + EDIT_LEN * offset,
            count,
        })
    }

    fn edit_at(&self, edits: ArrayRange, index: usize) -> Result<EditEntry> {
        edits.check("edit", index)?;
        Ok(EditEntry(edits.values + EDIT_LEN * index))
    }

    fn edit_type(&self, edit: EditEntry) -> Result<EditType> {
        edit_type_from(read_i32(self.memory, edit.0 + EDIT_TYPE)?)
    }

    fn edit_sibling_index(&self, edit: EditEntry) -> Result<i32> {
        read_i32(self.memory, edit.0 + EDIT_SIBLING_INDEX)
    }

    fn edit_new_tree_index(&self, edit: EditEntry) -> Result<i32> {
        read_i32(self.memory, edit.0 + EDIT_NEW_TREE_INDEX)
    }

    fn edit_removed_attribute_name(&self, edit: EditEntry) -> Result<Option<&'a str>> {
        self.string_at(edit.0 + EDIT_REMOVED_ATTRIBUTE_NAME)
    }

    fn frame_at(&self, reference_frames: ArrayRange, index: usize) -> Result<FrameEntry> {
        reference_frames.check("reference frame", index)?;
        Ok(FrameEntry(reference_frames.values + FRAME_LEN * index))
    }

    fn frame_type(&self, frame: FrameEntry) -> Result<FrameType> {
        frame_type_from(read_i16(self.memory, frame.0 + FRAME_TYPE)?.into())
    }

    fn frame_subtree_length(&self, frame: FrameEntry) -> Result<usize> {
        read_count(self.memory, frame.0 + FRAME_SUBTREE_LENGTH, "subtree length")
    }

    fn frame_component_id(&self, frame: FrameEntry) -> Result<ComponentId> {
        read_i32(self.memory, frame.0 + FRAME_COMPONENT_ID).map(ComponentId)
    }

    fn frame_element_name(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_STRING)
    }

    fn frame_text_content(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_STRING)
    }

    fn frame_attribute_name(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_STRING)
    }

    fn frame_attribute_value(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_ATTRIBUTE_VALUE)
    }

    fn frame_attribute_event_handler_id(
        &self,
        frame: FrameEntry,
    ) -> Result<Option<EventHandlerId>> {
        read_u64(self.memory, frame.0 + FRAME_ATTRIBUTE_EVENT_HANDLER_ID).map(handler_id_from)
    }

    fn frame_element_reference_capture_id(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_STRING)
    }

    fn disposed_component_id_at(&self, range: ArrayRange, index: usize) -> Result<ComponentId> {
        range.check("disposed component", index)?;
        read_i32(self.memory, range.values + 4 * index).map(ComponentId)
    }

    fn disposed_event_handler_id_at(
        &self,
        range: ArrayRange,
        index: usize,
    ) -> Result<EventHandlerId> {
        range.check("disposed handler", index)?;
        read_u64(self.memory, range.values + 8 * index).map(EventHandlerId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_batch_address_rejected() {
        let memory = [0u8; 64];
        assert_eq!(
            SharedMemoryBatchReader::new(&memory, NULL).err(),
            Some(DecodeError::NullPointer("batch"))
        );
    }

    #[test]
    fn test_null_values_with_nonzero_count_rejected() {
        let mut memory = vec![0u8; 40];
        // reference frames range at batch 8: values 0, count 2
        memory[8 + BATCH_REFERENCE_FRAMES + RANGE_COUNT] = 2;
        let reader = SharedMemoryBatchReader::new(&memory, 8).unwrap();
        assert!(reader.updated_components().unwrap().is_empty());
        assert_eq!(
            reader.reference_frames(),
            Err(DecodeError::NullPointer("reference frames"))
        );
    }

    #[test]
    fn test_reads_through_raw_parts() {
        let mut memory = vec![0u8; 48];
        memory[40..44].copy_from_slice(&2u32.to_le_bytes());
        memory[44..46].copy_from_slice(b"ok");
        let reader =
            unsafe { SharedMemoryBatchReader::from_raw_parts(memory.as_ptr(), memory.len(), 8) }
                .unwrap();
        assert_eq!(reader.string(40).unwrap(), Some("ok"));
        assert_eq!(reader.string(NULL).unwrap(), None);
    }
}
