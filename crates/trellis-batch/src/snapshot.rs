//! Owned, serialisable view of a batch, built from memory or from either
//! wire encoding.

use crate::error::{DecodeError, Result};
use crate::reader::{ArrayRange, BatchReader, EditEntry};
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use trellis_core::{
    AttributeValue, ComponentId, EditType, EventHandlerId, FrameKind, FrameType, RenderBatch,
    RenderTreeEdit, RenderTreeFrame,
};

/// String written for an attribute value. `true` becomes the empty string,
/// `false` and non-text values have no string.
pub fn attribute_value_text(value: &AttributeValue) -> Option<&str> {
    match value {
        AttributeValue::Text(s) => Some(s),
        AttributeValue::Bool(true) => Some(""),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FrameSnapshot {
    Element {
        subtree_length: usize,
        name: SmartString,
    },
    Text {
        content: SmartString,
    },
    Attribute {
        name: SmartString,
        value: Option<SmartString>,
        event_handler_id: Option<EventHandlerId>,
    },
    Component {
        subtree_length: usize,
        component_id: Option<ComponentId>,
    },
    Region {
        subtree_length: usize,
    },
    ElementReferenceCapture {
        reference_id: Option<SmartString>,
    },
    ComponentReferenceCapture,
    Markup {
        content: SmartString,
    },
}

impl FrameSnapshot {
    pub fn capture(frame: &RenderTreeFrame) -> Self {
        match &frame.kind {
            FrameKind::Element {
                name,
                subtree_length,
                ..
            } => FrameSnapshot::Element {
                subtree_length: *subtree_length,
                name: name.clone(),
            },
            FrameKind::Text { content } => FrameSnapshot::Text {
                content: content.clone(),
            },
            FrameKind::Markup { content } => FrameSnapshot::Markup {
                content: content.clone(),
            },
            FrameKind::Attribute {
                name,
                value,
                event_handler_id,
                ..
            } => FrameSnapshot::Attribute {
                name: name.clone(),
                value: attribute_value_text(value).map(SmartString::from),
                event_handler_id: *event_handler_id,
            },
            FrameKind::Component {
                subtree_length,
                component_id,
                ..
            } => FrameSnapshot::Component {
                subtree_length: *subtree_length,
                component_id: *component_id,
            },
            FrameKind::Region { subtree_length } => FrameSnapshot::Region {
                subtree_length: *subtree_length,
            },
            FrameKind::ElementReferenceCapture { reference_id, .. } => {
                FrameSnapshot::ElementReferenceCapture {
                    reference_id: reference_id.clone(),
                }
            }
            FrameKind::ComponentReferenceCapture { .. } => FrameSnapshot::ComponentReferenceCapture,
        }
    }

    pub fn subtree_length(&self) -> usize {
        match self {
            FrameSnapshot::Element { subtree_length, .. }
            | FrameSnapshot::Component { subtree_length, .. }
            | FrameSnapshot::Region { subtree_length } => *subtree_length,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSnapshot {
    pub component_id: ComponentId,
    pub edits: Vec<RenderTreeEdit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub updated_components: Vec<DiffSnapshot>,
    pub reference_frames: Vec<FrameSnapshot>,
    pub disposed_component_ids: Vec<ComponentId>,
    pub disposed_event_handler_ids: Vec<EventHandlerId>,
}

impl BatchSnapshot {
    pub fn capture(batch: &RenderBatch<'_>) -> Self {
        Self {
            updated_components: batch
                .updated_components()
                .map(|diff| DiffSnapshot {
                    component_id: diff.component_id,
                    edits: diff.edits.to_vec(),
                })
                .collect(),
            reference_frames: batch
                .reference_frames()
                .iter()
                .map(FrameSnapshot::capture)
                .collect(),
            disposed_component_ids: batch.disposed_component_ids().to_vec(),
            disposed_event_handler_ids: batch.disposed_event_handler_ids().to_vec(),
        }
    }

    pub fn read<'a>(reader: &impl BatchReader<'a>) -> Result<Self> {
        let diffs = reader.updated_components()?;
        let mut updated_components = Vec::with_capacity(diffs.count);
        for i in 0..diffs.count {
            let diff = reader.diff_at(diffs, i)?;
            let edits = reader.diff_edits(diff)?;
            let mut decoded = Vec::with_capacity(edits.count);
            for j in 0..edits.count {
                decoded.push(read_edit(reader, reader.edit_at(edits, j)?)?);
            }
            updated_components.push(DiffSnapshot {
                component_id: reader.diff_component_id(diff)?,
                edits: decoded,
            });
        }

        let frames = reader.reference_frames()?;
        let mut reference_frames = Vec::with_capacity(frames.count);
        for i in 0..frames.count {
            reference_frames.push(read_frame(reader, frames, i)?);
        }

        let disposed = reader.disposed_component_ids()?;
        let disposed_component_ids = (0..disposed.count)
            .map(|i| reader.disposed_component_id_at(disposed, i))
            .collect::<Result<Vec<_>>>()?;
        let handlers = reader.disposed_event_handler_ids()?;
        let disposed_event_handler_ids = (0..handlers.count)
            .map(|i| reader.disposed_event_handler_id_at(handlers, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            updated_components,
            reference_frames,
            disposed_component_ids,
            disposed_event_handler_ids,
        })
    }

    pub fn edit_count(&self) -> usize {
        self.updated_components.iter().map(|d| d.edits.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.updated_components.is_empty()
            && self.disposed_component_ids.is_empty()
            && self.disposed_event_handler_ids.is_empty()
    }
}

fn read_edit<'a>(reader: &impl BatchReader<'a>, edit: EditEntry) -> Result<RenderTreeEdit> {
    let sibling_index = reader.edit_sibling_index(edit)?;
    let edit = match reader.edit_type(edit)? {
        EditType::UpdateText => RenderTreeEdit::UpdateText {
            sibling_index,
            reference_frame_index: reader.edit_new_tree_index(edit)?,
        },
        EditType::PrependFrame => RenderTreeEdit::PrependFrame {
            sibling_index,
            reference_frame_index: reader.edit_new_tree_index(edit)?,
        },
        EditType::RemoveFrame => RenderTreeEdit::RemoveFrame { sibling_index },
        EditType::SetAttribute => RenderTreeEdit::SetAttribute {
            sibling_index,
            reference_frame_index: reader.edit_new_tree_index(edit)?,
        },
        EditType::RemoveAttribute => RenderTreeEdit::RemoveAttribute {
            sibling_index,
            removed_attribute_name: reader
                .edit_removed_attribute_name(edit)?
                .ok_or(DecodeError::NullPointer("removed attribute name"))?
                .into(),
        },
        EditType::UpdateMarkup => RenderTreeEdit::UpdateMarkup {
            sibling_index,
            reference_frame_index: reader.edit_new_tree_index(edit)?,
        },
        EditType::StepIn => RenderTreeEdit::StepIn { sibling_index },
        EditType::StepOut => RenderTreeEdit::StepOut,
        EditType::PermutationListEntry => RenderTreeEdit::PermutationListEntry {
            sibling_index,
            move_to_sibling_index: reader.edit_new_tree_index(edit)?,
        },
        EditType::PermutationListEnd => RenderTreeEdit::PermutationListEnd,
    };
    Ok(edit)
}

fn read_frame<'a>(
    reader: &impl BatchReader<'a>,
    frames: ArrayRange,
    index: usize,
) -> Result<FrameSnapshot> {
    let frame = reader.frame_at(frames, index)?;
    let required = |value: Option<&'a str>, what: &'static str| {
        value
            .map(SmartString::from)
            .ok_or(DecodeError::NullPointer(what))
    };
    let snapshot = match reader.frame_type(frame)? {
        FrameType::Element => FrameSnapshot::Element {
            subtree_length: reader.frame_subtree_length(frame)?,
            name: required(reader.frame_element_name(frame)?, "element name")?,
        },
        FrameType::Text => FrameSnapshot::Text {
            content: required(reader.frame_text_content(frame)?, "text content")?,
        },
        FrameType::Markup => FrameSnapshot::Markup {
            content: required(reader.frame_text_content(frame)?, "markup content")?,
        },
        FrameType::Attribute => FrameSnapshot::Attribute {
            name: required(reader.frame_attribute_name(frame)?, "attribute name")?,
            value: reader.frame_attribute_value(frame)?.map(SmartString::from),
            event_handler_id: reader.frame_attribute_event_handler_id(frame)?,
        },
        FrameType::Component => {
            let id = reader.frame_component_id(frame)?;
            FrameSnapshot::Component {
                subtree_length: reader.frame_subtree_length(frame)?,
                component_id: (id.0 >= 0).then_some(id),
            }
        }
        FrameType::Region => FrameSnapshot::Region {
            subtree_length: reader.frame_subtree_length(frame)?,
        },
        FrameType::ElementReferenceCapture => FrameSnapshot::ElementReferenceCapture {
            reference_id: reader
                .frame_element_reference_capture_id(frame)?
                .map(SmartString::from),
        },
        FrameType::ComponentReferenceCapture => FrameSnapshot::ComponentReferenceCapture,
    };
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_projection() {
        assert_eq!(attribute_value_text(&"x".into()), Some("x"));
        assert_eq!(attribute_value_text(&true.into()), Some(""));
        assert_eq!(attribute_value_text(&false.into()), None);
        assert_eq!(attribute_value_text(&AttributeValue::Int(3)), None);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = BatchSnapshot {
            updated_components: vec![DiffSnapshot {
                component_id: ComponentId(0),
                edits: vec![RenderTreeEdit::UpdateText {
                    sibling_index: 1,
                    reference_frame_index: 0,
                }],
            }],
            reference_frames: vec![FrameSnapshot::Text {
                content: "world".into(),
            }],
            disposed_component_ids: vec![],
            disposed_event_handler_ids: vec![EventHandlerId(2)],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["updated_components"][0]["edits"][0]["type"], "UpdateText");
        assert_eq!(json["reference_frames"][0]["content"], "world");
        assert_eq!(json["disposed_event_handler_ids"][0], 2);

        let back: BatchSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.edit_count(), 1);
    }
}
