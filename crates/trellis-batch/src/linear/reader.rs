use super::*;
use crate::error::{DecodeError, Result};
use crate::leb128;
use crate::reader::{
    ArrayRange, BatchReader, DiffEntry, EditEntry, FrameEntry, edit_type_from, frame_type_from,
    handler_id_from, read_count, read_i32, read_u64, read_utf8,
};
use trellis_core::{ComponentId, EditType, EventHandlerId, FrameType};

/// Reads a linear batch in place
#[derive(Debug, Clone, Copy)]
pub struct LinearBatchReader<'a> {
    buf: &'a [u8],
    updated_components: usize,
    reference_frames: usize,
    disposed_component_ids: usize,
    disposed_event_handler_ids: usize,
    string_table: usize,
    string_count: usize,
}

impl<'a> LinearBatchReader<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let len = buf.len();
        if len < TRAILER_LEN {
            return Err(DecodeError::Truncated {
                offset: 0,
                needed: TRAILER_LEN,
                len,
            });
        }
        let trailer = |from_end: usize, what| read_count(buf, len - from_end, what);
        let string_table = trailer(TRAILER_STRING_TABLE, "string table offset")?;
        let strings_end = len - TRAILER_LEN;
        if string_table > strings_end {
            return Err(DecodeError::Truncated {
                offset: string_table,
                needed: 0,
                len: strings_end,
            });
        }
        Ok(Self {
            buf,
            updated_components: trailer(TRAILER_UPDATED_COMPONENTS, "updated components offset")?,
            reference_frames: trailer(TRAILER_REFERENCE_FRAMES, "reference frames offset")?,
            disposed_component_ids: trailer(
                TRAILER_DISPOSED_COMPONENT_IDS,
                "disposed components offset",
            )?,
            disposed_event_handler_ids: trailer(
                TRAILER_DISPOSED_EVENT_HANDLER_IDS,
                "disposed handlers offset",
            )?,
            string_table,
            string_count: (strings_end - string_table) / 4,
        })
    }

    pub fn string_count(&self) -> usize {
        self.string_count
    }

    /// Resolve a string table index; -1 is no string
    pub fn string(&self, index: i32) -> Result<Option<&'a str>> {
        if index == NO_STRING {
            return Ok(None);
        }
        let position = usize::try_from(index)
            .ok()
            .filter(|&i| i < self.string_count)
            .ok_or(DecodeError::IndexOutOfRange {
                what: "string",
                index: index.into(),
                count: self.string_count,
            })?;
        let location = read_count(self.buf, self.string_table + 4 * position, "string offset")?;
        let (len, prefix) = leb128::read_u32(self.buf, location)?;
        read_utf8(self.buf, location + prefix, len as usize).map(Some)
    }

    fn table(&self, offset: usize, what: &'static str) -> Result<ArrayRange> {
        Ok(ArrayRange {
            values: offset + 4,
            count: read_count(self.buf, offset, what)?,
        })
    }

    fn string_at(&self, offset: usize) -> Result<Option<&'a str>> {
        self.string(read_i32(self.buf, offset)?)
    }
}

impl<'a> BatchReader<'a> for LinearBatchReader<'a> {
    fn updated_components(&self) -> Result<ArrayRange> {
        self.table(self.updated_components, "updated component count")
    }

    fn reference_frames(&self) -> Result<ArrayRange> {
        self.table(self.reference_frames, "reference frame count")
    }

    fn disposed_component_ids(&self) -> Result<ArrayRange> {
        self.table(self.disposed_component_ids, "disposed component count")
    }

    fn disposed_event_handler_ids(&self) -> Result<ArrayRange> {
        self.table(self.disposed_event_handler_ids, "disposed handler count")
    }

    fn diff_at(&self, updated_components: ArrayRange, index: usize) -> Result<DiffEntry> {
        updated_components.check("diff", index)?;
        let offset = read_count(self.buf, updated_components.values + 4 * index, "diff offset")?;
        Ok(DiffEntry(offset))
    }

    fn diff_component_id(&self, diff: DiffEntry) -> Result<ComponentId> {
        read_i32(self.buf, diff.0 + DIFF_COMPONENT_ID).map(ComponentId)
    }

    fn diff_edits(&self, diff: DiffEntry) -> Result<ArrayRange> {
        Ok(ArrayRange {
            values: diff.0 + DIFF_EDITS,
            count: read_count(self.buf, diff.0 + DIFF_EDIT_COUNT, "edit count")?,
        })
    }

    fn edit_at(&self, edits: ArrayRange, index: usize) -> Result<EditEntry> {
        edits.check("edit", index)?;
        Ok(EditEntry(edits.values + EDIT_LEN * index))
    }

    fn edit_type(&self, edit: EditEntry) -> Result<EditType> {
        edit_type_from(read_i32(self.buf, edit.0 + EDIT_TYPE)?)
    }

    fn edit_sibling_index(&self, edit: EditEntry) -> Result<i32> {
        read_i32(self.buf, edit.0 + EDIT_SIBLING_INDEX)
    }

    fn edit_new_tree_index(&self, edit: EditEntry) -> Result<i32> {
        read_i32(self.buf, edit.0 + EDIT_NEW_TREE_INDEX)
    }

    fn edit_removed_attribute_name(&self, edit: EditEntry) -> Result<Option<&'a str>> {
        self.string_at(edit.0 + EDIT_REMOVED_ATTRIBUTE_NAME)
    }

    fn frame_at(&self, reference_frames: ArrayRange, index: usize) -> Result<FrameEntry> {
        reference_frames.check("reference frame", index)?;
        Ok(FrameEntry(reference_frames.values + FRAME_LEN * index))
    }

    fn frame_type(&self, frame: FrameEntry) -> Result<FrameType> {
        frame_type_from(read_i32(self.buf, frame.0 + FRAME_TYPE)?)
    }

    fn frame_subtree_length(&self, frame: FrameEntry) -> Result<usize> {
        read_count(self.buf, frame.0 + FRAME_SUBTREE_LENGTH, "subtree length")
    }

    fn frame_component_id(&self, frame: FrameEntry) -> Result<ComponentId> {
        read_i32(self.buf, frame.0 + FRAME_COMPONENT_ID).map(ComponentId)
    }

    fn frame_element_name(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_ELEMENT_NAME)
    }

    fn frame_text_content(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_TEXT_CONTENT)
    }

    fn frame_attribute_name(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_ATTRIBUTE_NAME)
    }

    fn frame_attribute_value(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_ATTRIBUTE_VALUE)
    }

    fn frame_attribute_event_handler_id(
        &self,
        frame: FrameEntry,
    ) -> Result<Option<EventHandlerId>> {
        read_u64(self.buf, frame.0 + FRAME_ATTRIBUTE_EVENT_HANDLER_ID).map(handler_id_from)
    }

    fn frame_element_reference_capture_id(&self, frame: FrameEntry) -> Result<Option<&'a str>> {
        self.string_at(frame.0 + FRAME_ELEMENT_REFERENCE_CAPTURE_ID)
    }

    fn disposed_component_id_at(&self, range: ArrayRange, index: usize) -> Result<ComponentId> {
        range.check("disposed component", index)?;
        read_i32(self.buf, range.values + 4 * index).map(ComponentId)
    }

    fn disposed_event_handler_id_at(
        &self,
        range: ArrayRange,
        index: usize,
    ) -> Result<EventHandlerId> {
        range.check("disposed handler", index)?;
        read_u64(self.buf, range.values + 8 * index).map(EventHandlerId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Empty batch written by hand: four zero counts, no strings, trailer
    fn empty_batch() -> Vec<u8> {
        let mut buf = Vec::new();
        for _ in 0..4 {
            buf.extend_from_slice(&0i32.to_le_bytes());
        }
        for offset in [0i32, 4, 8, 12, 16] {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_reads_hand_written_empty_batch() {
        let buf = empty_batch();
        let reader = LinearBatchReader::new(&buf).unwrap();
        assert!(reader.updated_components().unwrap().is_empty());
        assert!(reader.reference_frames().unwrap().is_empty());
        assert_eq!(reader.disposed_event_handler_ids().unwrap().values, 16);
        assert_eq!(reader.string_count(), 0);
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(matches!(
            LinearBatchReader::new(&[0u8; 19]),
            Err(DecodeError::Truncated { needed: 20, .. })
        ));
    }

    #[test]
    fn test_string_index_bounds() {
        let buf = empty_batch();
        let reader = LinearBatchReader::new(&buf).unwrap();
        assert_eq!(reader.string(NO_STRING).unwrap(), None);
        assert!(matches!(
            reader.string(0),
            Err(DecodeError::IndexOutOfRange { what: "string", .. })
        ));
    }

    #[test]
    fn test_index_past_count_is_an_error() {
        let buf = empty_batch();
        let reader = LinearBatchReader::new(&buf).unwrap();
        let frames = reader.reference_frames().unwrap();
        assert!(reader.frame_at(frames, 0).is_err());
    }
}
