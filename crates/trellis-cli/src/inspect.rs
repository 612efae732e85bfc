use crate::config::OutputFormat;
use anyhow::{Context, Result};
use std::fmt::Write;
use std::fs;
use std::path::Path;
use trellis_batch::{BatchSnapshot, FrameSnapshot, LinearBatchReader};
use trellis_core::RenderTreeEdit;

/// Decode a file holding one linear batch
pub fn decode_file(path: &Path) -> Result<BatchSnapshot> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let reader = LinearBatchReader::new(&bytes)
        .with_context(|| format!("Not a linear batch: {}", path.display()))?;
    BatchSnapshot::read(&reader).with_context(|| format!("Malformed batch: {}", path.display()))
}

pub fn run_inspect(path: &Path, format: OutputFormat) -> Result<()> {
    let snapshot = decode_file(path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Pretty => print!("{}", render_listing(&snapshot)),
    }
    Ok(())
}

pub fn render_listing(snapshot: &BatchSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "updated components: {}", snapshot.updated_components.len());
    for diff in &snapshot.updated_components {
        let _ = writeln!(
            out,
            "  component {} ({} edits)",
            diff.component_id,
            diff.edits.len()
        );
        for edit in &diff.edits {
            let _ = writeln!(out, "    {}", describe_edit(edit));
        }
    }

    let _ = writeln!(out, "reference frames: {}", snapshot.reference_frames.len());
    for (index, frame) in snapshot.reference_frames.iter().enumerate() {
        let _ = writeln!(out, "  [{index}] {}", describe_frame(frame));
    }

    let ids = |items: Vec<String>| {
        if items.is_empty() {
            "-".to_string()
        } else {
            items.join(", ")
        }
    };
    let _ = writeln!(
        out,
        "disposed components: {}",
        ids(snapshot
            .disposed_component_ids
            .iter()
            .map(ToString::to_string)
            .collect())
    );
    let _ = writeln!(
        out,
        "disposed handlers: {}",
        ids(snapshot
            .disposed_event_handler_ids
            .iter()
            .map(ToString::to_string)
            .collect())
    );
    out
}

fn describe_edit(edit: &RenderTreeEdit) -> String {
    match edit {
        RenderTreeEdit::UpdateText {
            sibling_index,
            reference_frame_index,
        } => format!("UpdateText sibling={sibling_index} frame={reference_frame_index}"),
        RenderTreeEdit::PrependFrame {
            sibling_index,
            reference_frame_index,
        } => format!("PrependFrame sibling={sibling_index} frame={reference_frame_index}"),
        RenderTreeEdit::RemoveFrame { sibling_index } => {
            format!("RemoveFrame sibling={sibling_index}")
        }
        RenderTreeEdit::SetAttribute {
            sibling_index,
            reference_frame_index,
        } => format!("SetAttribute sibling={sibling_index} frame={reference_frame_index}"),
        RenderTreeEdit::RemoveAttribute {
            sibling_index,
            removed_attribute_name,
        } => format!("RemoveAttribute sibling={sibling_index} name={removed_attribute_name}"),
        RenderTreeEdit::UpdateMarkup {
            sibling_index,
            reference_frame_index,
        } => format!("UpdateMarkup sibling={sibling_index} frame={reference_frame_index}"),
        RenderTreeEdit::StepIn { sibling_index } => format!("StepIn sibling={sibling_index}"),
        RenderTreeEdit::StepOut => "StepOut".to_string(),
        RenderTreeEdit::PermutationListEntry {
            sibling_index,
            move_to_sibling_index,
        } => format!("PermutationListEntry {sibling_index} -> {move_to_sibling_index}"),
        RenderTreeEdit::PermutationListEnd => "PermutationListEnd".to_string(),
    }
}

fn describe_frame(frame: &FrameSnapshot) -> String {
    match frame {
        FrameSnapshot::Element {
            subtree_length,
            name,
        } => format!("Element <{name}> subtree={subtree_length}"),
        FrameSnapshot::Text { content } => format!("Text {content:?}"),
        FrameSnapshot::Markup { content } => format!("Markup {content:?}"),
        FrameSnapshot::Attribute {
            name,
            value,
            event_handler_id,
        } => match (value, event_handler_id) {
            (_, Some(id)) => format!("Attribute {name} handler={id}"),
            (Some(value), None) => format!("Attribute {name}={value:?}"),
            (None, None) => format!("Attribute {name}"),
        },
        FrameSnapshot::Component {
            subtree_length,
            component_id,
        } => match component_id {
            Some(id) => format!("Component {id} subtree={subtree_length}"),
            None => format!("Component subtree={subtree_length}"),
        },
        FrameSnapshot::Region { subtree_length } => format!("Region subtree={subtree_length}"),
        FrameSnapshot::ElementReferenceCapture { reference_id } => match reference_id {
            Some(id) => format!("ElementReferenceCapture {id}"),
            None => "ElementReferenceCapture".to_string(),
        },
        FrameSnapshot::ComponentReferenceCapture => "ComponentReferenceCapture".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_batch::DiffSnapshot;
    use trellis_core::{ComponentId, EventHandlerId};

    #[test]
    fn test_listing_layout() {
        let snapshot = BatchSnapshot {
            updated_components: vec![DiffSnapshot {
                component_id: ComponentId(0),
                edits: vec![
                    RenderTreeEdit::UpdateText {
                        sibling_index: 1,
                        reference_frame_index: 0,
                    },
                    RenderTreeEdit::RemoveAttribute {
                        sibling_index: 0,
                        removed_attribute_name: "class".into(),
                    },
                ],
            }],
            reference_frames: vec![FrameSnapshot::Text {
                content: "world".into(),
            }],
            disposed_component_ids: vec![],
            disposed_event_handler_ids: vec![EventHandlerId(4), EventHandlerId(5)],
        };
        assert_eq!(
            render_listing(&snapshot),
            "updated components: 1\n\
             \x20 component 0 (2 edits)\n\
             \x20   UpdateText sibling=1 frame=0\n\
             \x20   RemoveAttribute sibling=0 name=class\n\
             reference frames: 1\n\
             \x20 [0] Text \"world\"\n\
             disposed components: -\n\
             disposed handlers: 4, 5\n"
        );
    }
}
