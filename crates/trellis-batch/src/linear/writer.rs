use super::*;
use crate::error::{EncodeError, wire_i32, wire_u32};
use crate::leb128;
use crate::snapshot::attribute_value_text;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use tracing::trace;
use trellis_core::{FrameKind, RenderBatch, RenderTreeEdit, RenderTreeFrame};

type Result<T> = std::result::Result<T, EncodeError>;

#[derive(Default)]
struct StringTable<'b> {
    strings: Vec<&'b str>,
    deduped: HashMap<&'b str, i32>,
}

impl<'b> StringTable<'b> {
    fn add(&mut self, value: &'b str) -> Result<i32> {
        let index = wire_i32(self.strings.len())?;
        self.strings.push(value);
        Ok(index)
    }

    fn add_deduped(&mut self, value: &'b str) -> Result<i32> {
        if let Some(&index) = self.deduped.get(value) {
            return Ok(index);
        }
        let index = self.add(value)?;
        self.deduped.insert(value, index);
        Ok(index)
    }

    /// Empty attribute values repeat often enough to share
    fn add_attribute_value(&mut self, value: Option<&'b str>) -> Result<i32> {
        match value {
            None => Ok(NO_STRING),
            Some("") => self.add_deduped(""),
            Some(s) => self.add(s),
        }
    }
}

fn offset(buf: &BytesMut) -> Result<i32> {
    wire_i32(buf.len())
}

/// Encode a batch into the linear wire format
pub fn encode(batch: &RenderBatch<'_>) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(256);
    let mut strings = StringTable::default();

    let mut diff_offsets = Vec::with_capacity(batch.updated_component_count());
    for diff in batch.updated_components() {
        diff_offsets.push(offset(&buf)?);
        buf.put_i32_le(diff.component_id.0);
        buf.put_i32_le(wire_i32(diff.edits.len())?);
        for edit in diff.edits {
            write_edit(&mut buf, edit, &mut strings)?;
        }
    }

    let updated_components = offset(&buf)?;
    buf.put_i32_le(wire_i32(diff_offsets.len())?);
    for diff_offset in diff_offsets {
        buf.put_i32_le(diff_offset);
    }

    let reference_frames = offset(&buf)?;
    let frames = batch.reference_frames();
    buf.put_i32_le(wire_i32(frames.len())?);
    for frame in frames {
        write_frame(&mut buf, frame, &mut strings)?;
    }

    let disposed_component_ids = offset(&buf)?;
    let disposed = batch.disposed_component_ids();
    buf.put_i32_le(wire_i32(disposed.len())?);
    for id in disposed {
        buf.put_i32_le(id.0);
    }

    let disposed_event_handler_ids = offset(&buf)?;
    let handlers = batch.disposed_event_handler_ids();
    buf.put_i32_le(wire_i32(handlers.len())?);
    for id in handlers {
        buf.put_u64_le(id.0);
    }

    let mut locations = Vec::with_capacity(strings.strings.len());
    for value in &strings.strings {
        locations.push(offset(&buf)?);
        leb128::write_u32(&mut buf, wire_u32(value.len())?);
        buf.put_slice(value.as_bytes());
    }
    let string_table = offset(&buf)?;
    for location in locations {
        buf.put_i32_le(location);
    }

    buf.put_i32_le(updated_components);
    buf.put_i32_le(reference_frames);
    buf.put_i32_le(disposed_component_ids);
    buf.put_i32_le(disposed_event_handler_ids);
    buf.put_i32_le(string_table);
    offset(&buf)?;

    trace!(
        bytes = buf.len(),
        strings = strings.strings.len(),
        "encoded linear batch"
    );
    Ok(buf.freeze())
}

fn write_edit<'b>(
    buf: &mut BytesMut,
    edit: &'b RenderTreeEdit,
    strings: &mut StringTable<'b>,
) -> Result<()> {
    buf.put_i32_le(edit.edit_type() as i32);
    match edit {
        RenderTreeEdit::UpdateText { .. }
        | RenderTreeEdit::PrependFrame { .. }
        | RenderTreeEdit::SetAttribute { .. }
        | RenderTreeEdit::UpdateMarkup { .. }
        | RenderTreeEdit::PermutationListEntry { .. } => {
            buf.put_i32_le(edit.sibling_index());
            buf.put_i32_le(edit.reference_frame_index());
            buf.put_i32_le(NO_STRING);
        }
        RenderTreeEdit::RemoveAttribute {
            sibling_index,
            removed_attribute_name,
        } => {
            buf.put_i32_le(*sibling_index);
            buf.put_i32_le(0);
            buf.put_i32_le(strings.add_deduped(removed_attribute_name)?);
        }
        RenderTreeEdit::RemoveFrame { sibling_index } | RenderTreeEdit::StepIn { sibling_index } => {
            buf.put_i32_le(*sibling_index);
            buf.put_i32_le(0);
            buf.put_i32_le(NO_STRING);
        }
        RenderTreeEdit::StepOut | RenderTreeEdit::PermutationListEnd => {
            buf.put_i32_le(0);
            buf.put_i32_le(0);
            buf.put_i32_le(NO_STRING);
        }
    }
    Ok(())
}

fn write_frame<'b>(
    buf: &mut BytesMut,
    frame: &'b RenderTreeFrame,
    strings: &mut StringTable<'b>,
) -> Result<()> {
    let start = buf.len();
    buf.put_i32_le(frame.frame_type() as i32);
    match &frame.kind {
        FrameKind::Attribute {
            name,
            value,
            event_handler_id,
            ..
        } => {
            buf.put_i32_le(strings.add_deduped(name)?);
            buf.put_i32_le(strings.add_attribute_value(attribute_value_text(value))?);
            buf.put_u64_le(event_handler_id.map_or(0, |id| id.0));
        }
        FrameKind::Component {
            subtree_length,
            component_id,
            ..
        } => {
            buf.put_i32_le(wire_i32(*subtree_length)?);
            buf.put_i32_le(component_id.map_or(-1, |id| id.0));
        }
        FrameKind::Element {
            name,
            subtree_length,
            ..
        } => {
            buf.put_i32_le(wire_i32(*subtree_length)?);
            buf.put_i32_le(strings.add_deduped(name)?);
        }
        FrameKind::Text { content } | FrameKind::Markup { content } => {
            buf.put_i32_le(strings.add(content)?);
        }
        FrameKind::Region { subtree_length } => {
            buf.put_i32_le(wire_i32(*subtree_length)?);
        }
        FrameKind::ElementReferenceCapture { reference_id, .. } => {
            let index = match reference_id {
                Some(id) => strings.add(id)?,
                None => NO_STRING,
            };
            buf.put_i32_le(index);
        }
        FrameKind::ComponentReferenceCapture { .. } => {}
    }
    buf.put_bytes(0, start + FRAME_LEN - buf.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_table_dedups_only_when_asked() {
        let mut table = StringTable::default();
        assert_eq!(table.add_deduped("div"), Ok(0));
        assert_eq!(table.add("hello"), Ok(1));
        assert_eq!(table.add("hello"), Ok(2));
        assert_eq!(table.add_deduped("div"), Ok(0));
        assert_eq!(table.add_attribute_value(Some("")), Ok(3));
        assert_eq!(table.add_attribute_value(Some("")), Ok(3));
        assert_eq!(table.add_attribute_value(None), Ok(NO_STRING));
        assert_eq!(table.strings.len(), 4);
    }
}
