//! Edit-script computation between two renders of one component.
//!
//! Siblings are matched by sequence number, or by key when keys are present.
//! Edits are emitted in a depth-first, left-to-right walk of the new frames.

use crate::batch::{RenderBatchBuilder, RenderTreeDiff};
use crate::component::{ComponentType, ParameterView};
use crate::edit::RenderTreeEdit;
use crate::error::{RenderError, Result};
use crate::event::EventCallback;
use crate::frame::{
    ComponentId, EventHandlerId, FrameKey, FrameKind, FrameType, RenderTreeFrame,
    attributes_end, next_sibling_index,
};
use smallvec::SmallVec;
use smartstring::alias::String as SmartString;
use std::collections::HashMap;

/// Sequence number of attributes inserted by the renderer rather than by
/// component code. Forces name-based attribute matching.
pub const SYSTEM_ADDED_ATTRIBUTE_SEQUENCE: i32 = i32::MIN;

/// Renderer services the diff needs while initialising new frames
pub(crate) trait DiffHost {
    fn instantiate_child(
        &mut self,
        component_type: &ComponentType,
        parent: ComponentId,
    ) -> ComponentId;

    fn set_child_parameters(
        &mut self,
        child: ComponentId,
        parameters: &ParameterView<'_>,
    ) -> Result<()>;

    fn assign_event_handler_id(&mut self, callback: &EventCallback) -> EventHandlerId;

    fn track_replaced_event_handler_id(&mut self, old: EventHandlerId, new: EventHandlerId);

    fn next_element_reference_id(&mut self) -> SmartString;
}

struct DiffContext<'a> {
    host: &'a mut dyn DiffHost,
    batch: &'a mut RenderBatchBuilder,
    old_tree: &'a [RenderTreeFrame],
    new_tree: &'a mut [RenderTreeFrame],
    component_id: ComponentId,
    sibling_index: i32,
}

enum DiffAction {
    Match(usize),
    Insert,
    Delete,
    SkipNew,
}

#[derive(Clone, Copy, Default)]
struct KeyedItemInfo {
    old_index: Option<usize>,
    new_index: Option<usize>,
    old_sibling_index: Option<i32>,
    new_sibling_index: Option<i32>,
}

/// Diff `old` against `new` for `component_id`, appending edits and reference
/// frames to `batch`. New frames receive component ids, handler ids and
/// element reference ids in place.
pub(crate) fn compute_diff(
    host: &mut dyn DiffHost,
    batch: &mut RenderBatchBuilder,
    component_id: ComponentId,
    old: &[RenderTreeFrame],
    new: &mut [RenderTreeFrame],
) -> Result<RenderTreeDiff> {
    let edits_start = batch.edits.len();
    let (old_len, new_len) = (old.len(), new.len());
    let mut ctx = DiffContext {
        host,
        batch,
        old_tree: old,
        new_tree: new,
        component_id,
        sibling_index: 0,
    };
    append_diff_entries_for_range(&mut ctx, 0, old_len, 0, new_len)?;
    Ok(RenderTreeDiff {
        component_id,
        edits: edits_start..ctx.batch.edits.len(),
    })
}

/// Queue the components and record the handler ids found in `frames` for disposal
pub(crate) fn dispose_frames(batch: &mut RenderBatchBuilder, frames: &[RenderTreeFrame]) {
    for frame in frames {
        match &frame.kind {
            FrameKind::Component {
                component_id: Some(id),
                ..
            } => batch.disposal_queue.push_back(*id),
            FrameKind::Attribute {
                event_handler_id: Some(id),
                ..
            } => batch.disposed_event_handler_ids.push(*id),
            _ => {}
        }
    }
}

fn key_of(frame: &RenderTreeFrame) -> Option<FrameKey> {
    frame.key().cloned()
}

fn append_diff_entries_for_range(
    ctx: &mut DiffContext<'_>,
    mut old_start: usize,
    old_end: usize,
    mut new_start: usize,
    new_end: usize,
) -> Result<()> {
    let (orig_old_start, orig_new_start) = (old_start, new_start);
    let mut has_more_old = old_end > old_start;
    let mut has_more_new = new_end > new_start;
    let mut prev_old_seq = -1;
    let mut prev_new_seq = -1;
    let mut keyed_items: Option<HashMap<FrameKey, KeyedItemInfo>> = None;

    while has_more_old || has_more_new {
        let (old_seq, old_key) = if has_more_old {
            let frame = &ctx.old_tree[old_start];
            (frame.sequence, key_of(frame))
        } else {
            (i32::MAX, None)
        };
        let (new_seq, new_key) = if has_more_new {
            let frame = &ctx.new_tree[new_start];
            (frame.sequence, key_of(frame))
        } else {
            (i32::MAX, None)
        };

        let action = if old_key.is_some() || new_key.is_some() {
            let mut infos = match keyed_items.take() {
                Some(infos) => infos,
                None => build_key_lookup(ctx, orig_old_start, old_end, orig_new_start, new_end)?,
            };
            let action = keyed_action(
                &mut infos,
                old_key,
                new_key,
                new_start,
                has_more_old,
                has_more_new,
                ctx.sibling_index,
            );
            keyed_items = Some(infos);
            action
        } else if old_seq == new_seq {
            DiffAction::Match(new_start)
        } else {
            let old_looped_back = old_seq <= prev_old_seq;
            let new_looped_back = new_seq <= prev_new_seq;
            if old_looped_back == new_looped_back {
                if old_looped_back {
                    prev_old_seq = -1;
                    prev_new_seq = -1;
                }
                if new_seq < old_seq {
                    DiffAction::Insert
                } else {
                    DiffAction::Delete
                }
            } else if old_looped_back {
                let new_loops_back_later = (new_start + 1..new_end)
                    .any(|i| ctx.new_tree[i].sequence < new_seq);
                if new_loops_back_later {
                    DiffAction::Insert
                } else {
                    DiffAction::Delete
                }
            } else {
                let old_loops_back_later = (old_start + 1..old_end)
                    .any(|i| ctx.old_tree[i].sequence < old_seq);
                if old_loops_back_later {
                    DiffAction::Delete
                } else {
                    DiffAction::Insert
                }
            }
        };

        match action {
            DiffAction::Match(match_with) => {
                append_diff_entries_for_frames_with_same_sequence(ctx, old_start, match_with)?;
                old_start = next_sibling_index(ctx.old_tree, old_start);
                new_start = next_sibling_index(ctx.new_tree, new_start);
                has_more_old = old_end > old_start;
                has_more_new = new_end > new_start;
                prev_old_seq = old_seq;
                prev_new_seq = new_seq;
            }
            DiffAction::Insert => {
                insert_new_frame(ctx, new_start)?;
                new_start = next_sibling_index(ctx.new_tree, new_start);
                has_more_new = new_end > new_start;
                prev_new_seq = new_seq;
            }
            DiffAction::Delete => {
                remove_old_frame(ctx, old_start)?;
                old_start = next_sibling_index(ctx.old_tree, old_start);
                has_more_old = old_end > old_start;
                prev_old_seq = old_seq;
            }
            DiffAction::SkipNew => {
                new_start = next_sibling_index(ctx.new_tree, new_start);
                has_more_new = new_end > new_start;
            }
        }
    }

    if let Some(infos) = keyed_items {
        let mut moves: SmallVec<[(i32, i32); 8]> = infos
            .values()
            .filter_map(|info| match (info.old_sibling_index, info.new_sibling_index) {
                (Some(from), Some(to)) => Some((from, to)),
                _ => None,
            })
            .collect();
        if !moves.is_empty() {
            moves.sort_unstable();
            for (from, to) in moves {
                ctx.batch.edits.push(RenderTreeEdit::PermutationListEntry {
                    sibling_index: from,
                    move_to_sibling_index: to,
                });
            }
            ctx.batch.edits.push(RenderTreeEdit::PermutationListEnd);
        }
    }

    Ok(())
}

fn keyed_action(
    infos: &mut HashMap<FrameKey, KeyedItemInfo>,
    old_key: Option<FrameKey>,
    new_key: Option<FrameKey>,
    new_start: usize,
    has_more_old: bool,
    has_more_new: bool,
    sibling_index: i32,
) -> DiffAction {
    if old_key == new_key {
        return DiffAction::Match(new_start);
    }

    let lookup = |key: &Option<FrameKey>| {
        key.as_ref()
            .and_then(|k| infos.get(k).copied())
            .unwrap_or_default()
    };
    let old_info = lookup(&old_key);
    let new_info = lookup(&new_key);
    let old_key_in_new_tree = old_info.new_index.is_some();
    let new_key_in_old_tree = new_info.old_index.is_some();

    if old_key_in_new_tree && new_key_in_old_tree {
        // Both items exist on both sides: diff the old one against its new
        // position now and move it with the permutation list afterwards.
        let (Some(old_key), Some(new_key), Some(target)) = (old_key, new_key, old_info.new_index)
        else {
            return DiffAction::Insert;
        };
        if let Some(info) = infos.get_mut(&old_key) {
            info.old_sibling_index = Some(sibling_index);
        }
        if let Some(info) = infos.get_mut(&new_key) {
            info.new_sibling_index = Some(sibling_index);
        }
        DiffAction::Match(target)
    } else if !has_more_new {
        DiffAction::Delete
    } else if new_key_in_old_tree {
        if has_more_old {
            DiffAction::Delete
        } else {
            // old range exhausted and this new key was already paired by a move
            DiffAction::SkipNew
        }
    } else {
        DiffAction::Insert
    }
}

fn build_key_lookup(
    ctx: &DiffContext<'_>,
    mut old_start: usize,
    old_end: usize,
    mut new_start: usize,
    new_end: usize,
) -> Result<HashMap<FrameKey, KeyedItemInfo>> {
    let mut result: HashMap<FrameKey, KeyedItemInfo> = HashMap::new();

    while old_start < old_end {
        if let Some(key) = key_of(&ctx.old_tree[old_start]) {
            if result.contains_key(&key) {
                return Err(RenderError::DuplicateKey(key));
            }
            result.insert(
                key,
                KeyedItemInfo {
                    old_index: Some(old_start),
                    ..Default::default()
                },
            );
        }
        old_start = next_sibling_index(ctx.old_tree, old_start);
    }

    while new_start < new_end {
        if let Some(key) = key_of(&ctx.new_tree[new_start]) {
            let entry = result.entry(key.clone()).or_default();
            if entry.new_index.is_some() {
                return Err(RenderError::DuplicateKey(key));
            }
            entry.new_index = Some(new_start);
        }
        new_start = next_sibling_index(ctx.new_tree, new_start);
    }

    Ok(result)
}

fn append_attribute_diff_entries_for_range(
    ctx: &mut DiffContext<'_>,
    mut old_start: usize,
    old_end: usize,
    mut new_start: usize,
    new_end: usize,
) -> Result<()> {
    let mut has_more_old = old_end > old_start;
    let mut has_more_new = new_end > new_start;

    while has_more_old || has_more_new {
        let old_seq = if has_more_old {
            ctx.old_tree[old_start].sequence
        } else {
            i32::MAX
        };
        let new_seq = if has_more_new {
            ctx.new_tree[new_start].sequence
        } else {
            i32::MAX
        };
        let same_name = has_more_old
            && has_more_new
            && ctx.old_tree[old_start].attribute_name() == ctx.new_tree[new_start].attribute_name();

        if old_seq == new_seq && same_name {
            append_diff_entries_for_attribute_frame(ctx, old_start, new_start)?;
            old_start += 1;
            new_start += 1;
            has_more_old = old_end > old_start;
            has_more_new = new_end > new_start;
        } else if old_seq < new_seq {
            if old_seq == SYSTEM_ADDED_ATTRIBUTE_SEQUENCE {
                return append_attribute_diff_entries_for_range_slow(
                    ctx, old_start, old_end, new_start, new_end,
                );
            }
            remove_old_frame(ctx, old_start)?;
            old_start += 1;
            has_more_old = old_end > old_start;
        } else if old_seq > new_seq {
            insert_new_frame(ctx, new_start)?;
            new_start += 1;
            has_more_new = new_end > new_start;
        } else {
            return append_attribute_diff_entries_for_range_slow(
                ctx, old_start, old_end, new_start, new_end,
            );
        }
    }
    Ok(())
}

fn append_attribute_diff_entries_for_range_slow(
    ctx: &mut DiffContext<'_>,
    old_start: usize,
    old_end: usize,
    new_start: usize,
    new_end: usize,
) -> Result<()> {
    let mut by_name = std::mem::take(&mut ctx.batch.attribute_diff_set);
    by_name.clear();
    for i in new_start..new_end {
        if let Some(name) = ctx.new_tree[i].attribute_name() {
            // a repeated name keeps its last occurrence
            by_name.insert(name.into(), i);
        }
    }

    let mut result = Ok(());
    for i in old_start..old_end {
        let matched = ctx.old_tree[i]
            .attribute_name()
            .and_then(|name| by_name.remove(name));
        result = match matched {
            Some(new_index) => append_diff_entries_for_attribute_frame(ctx, i, new_index),
            None => remove_old_frame(ctx, i),
        };
        if result.is_err() {
            break;
        }
    }

    if result.is_ok() {
        let mut remaining: SmallVec<[usize; 8]> = by_name.values().copied().collect();
        remaining.sort_unstable();
        for new_index in remaining {
            result = insert_new_frame(ctx, new_index);
            if result.is_err() {
                break;
            }
        }
    }

    by_name.clear();
    ctx.batch.attribute_diff_set = by_name;
    result
}

fn append_diff_entries_for_attribute_frame(
    ctx: &mut DiffContext<'_>,
    old_index: usize,
    new_index: usize,
) -> Result<()> {
    let (old_value, old_handler) = match &ctx.old_tree[old_index].kind {
        FrameKind::Attribute {
            value,
            event_handler_id,
            ..
        } => (value, *event_handler_id),
        _ => return Err(RenderError::UnexpectedFrame(ctx.old_tree[old_index].frame_type())),
    };
    let value_changed = match &ctx.new_tree[new_index].kind {
        FrameKind::Attribute { value, .. } => !old_value.eq_value(value),
        _ => return Err(RenderError::UnexpectedFrame(ctx.new_tree[new_index].frame_type())),
    };

    if value_changed {
        initialize_new_attribute_frame(ctx, new_index);
        let reference_frame_index = ctx.batch.add_reference_frame(ctx.new_tree[new_index].clone());
        ctx.batch.edits.push(RenderTreeEdit::SetAttribute {
            sibling_index: ctx.sibling_index,
            reference_frame_index,
        });
        if let Some(old_id) = old_handler {
            if let Some(new_id) = ctx.new_tree[new_index].event_handler_id() {
                ctx.host.track_replaced_event_handler_id(old_id, new_id);
            }
            ctx.batch.disposed_event_handler_ids.push(old_id);
        }
    } else if old_handler.is_some() {
        // same callback: keep the id the UI already knows
        ctx.new_tree[new_index] = ctx.old_tree[old_index].clone();
    }
    Ok(())
}

fn insert_new_frame(ctx: &mut DiffContext<'_>, new_index: usize) -> Result<()> {
    match ctx.new_tree[new_index].frame_type() {
        FrameType::Attribute => {
            initialize_new_attribute_frame(ctx, new_index);
            let reference_frame_index =
                ctx.batch.add_reference_frame(ctx.new_tree[new_index].clone());
            ctx.batch.edits.push(RenderTreeEdit::SetAttribute {
                sibling_index: ctx.sibling_index,
                reference_frame_index,
            });
        }
        FrameType::Element | FrameType::Component => {
            initialize_new_subtree(ctx, new_index)?;
            let end = next_sibling_index(ctx.new_tree, new_index);
            let reference_frame_index =
                ctx.batch.add_reference_frames(&ctx.new_tree[new_index..end]);
            ctx.batch.edits.push(RenderTreeEdit::PrependFrame {
                sibling_index: ctx.sibling_index,
                reference_frame_index,
            });
            ctx.sibling_index += 1;
        }
        FrameType::Region => {
            let end = next_sibling_index(ctx.new_tree, new_index);
            let mut child = new_index + 1;
            while child < end {
                insert_new_frame(ctx, child)?;
                child = next_sibling_index(ctx.new_tree, child);
            }
        }
        FrameType::Text | FrameType::Markup => {
            let reference_frame_index =
                ctx.batch.add_reference_frame(ctx.new_tree[new_index].clone());
            ctx.batch.edits.push(RenderTreeEdit::PrependFrame {
                sibling_index: ctx.sibling_index,
                reference_frame_index,
            });
            ctx.sibling_index += 1;
        }
        FrameType::ElementReferenceCapture => {
            initialize_new_element_reference_capture(ctx, new_index);
        }
        FrameType::ComponentReferenceCapture => {
            initialize_new_component_reference_capture(ctx, new_index)?;
        }
    }
    Ok(())
}

fn remove_old_frame(ctx: &mut DiffContext<'_>, old_index: usize) -> Result<()> {
    let old_tree = ctx.old_tree;
    match &old_tree[old_index].kind {
        FrameKind::Attribute {
            name,
            event_handler_id,
            ..
        } => {
            ctx.batch.edits.push(RenderTreeEdit::RemoveAttribute {
                sibling_index: ctx.sibling_index,
                removed_attribute_name: name.clone(),
            });
            if let Some(id) = event_handler_id {
                ctx.batch.disposed_event_handler_ids.push(*id);
            }
        }
        FrameKind::Element { .. } | FrameKind::Component { .. } => {
            let end = next_sibling_index(ctx.old_tree, old_index);
            dispose_frames(ctx.batch, &ctx.old_tree[old_index..end]);
            ctx.batch.edits.push(RenderTreeEdit::RemoveFrame {
                sibling_index: ctx.sibling_index,
            });
        }
        FrameKind::Region { .. } => {
            let end = next_sibling_index(ctx.old_tree, old_index);
            let mut child = old_index + 1;
            while child < end {
                remove_old_frame(ctx, child)?;
                child = next_sibling_index(ctx.old_tree, child);
            }
        }
        FrameKind::Text { .. } | FrameKind::Markup { .. } => {
            ctx.batch.edits.push(RenderTreeEdit::RemoveFrame {
                sibling_index: ctx.sibling_index,
            });
        }
        // captures have no UI counterpart
        FrameKind::ElementReferenceCapture { .. } | FrameKind::ComponentReferenceCapture { .. } => {}
    }
    Ok(())
}

fn append_diff_entries_for_frames_with_same_sequence(
    ctx: &mut DiffContext<'_>,
    old_index: usize,
    new_index: usize,
) -> Result<()> {
    let old_type = ctx.old_tree[old_index].frame_type();
    let new_type = ctx.new_tree[new_index].frame_type();
    if old_type != new_type {
        insert_new_frame(ctx, new_index)?;
        return remove_old_frame(ctx, old_index);
    }

    match new_type {
        FrameType::Text | FrameType::Markup => {
            let changed = match (&ctx.old_tree[old_index].kind, &ctx.new_tree[new_index].kind) {
                (FrameKind::Text { content: a }, FrameKind::Text { content: b })
                | (FrameKind::Markup { content: a }, FrameKind::Markup { content: b }) => a != b,
                _ => false,
            };
            if changed {
                let reference_frame_index =
                    ctx.batch.add_reference_frame(ctx.new_tree[new_index].clone());
                let sibling_index = ctx.sibling_index;
                ctx.batch.edits.push(if new_type == FrameType::Text {
                    RenderTreeEdit::UpdateText {
                        sibling_index,
                        reference_frame_index,
                    }
                } else {
                    RenderTreeEdit::UpdateMarkup {
                        sibling_index,
                        reference_frame_index,
                    }
                });
            }
            ctx.sibling_index += 1;
        }
        FrameType::Element => {
            let same_name = match (&ctx.old_tree[old_index].kind, &ctx.new_tree[new_index].kind) {
                (FrameKind::Element { name: a, .. }, FrameKind::Element { name: b, .. }) => a == b,
                _ => false,
            };
            if !same_name {
                remove_old_frame(ctx, old_index)?;
                return insert_new_frame(ctx, new_index);
            }

            let old_attributes_end = attributes_end(ctx.old_tree, old_index);
            let new_attributes_end = attributes_end(ctx.new_tree, new_index);
            append_attribute_diff_entries_for_range(
                ctx,
                old_index + 1,
                old_attributes_end,
                new_index + 1,
                new_attributes_end,
            )?;

            let old_children_end = next_sibling_index(ctx.old_tree, old_index);
            let new_children_end = next_sibling_index(ctx.new_tree, new_index);
            let has_children =
                old_children_end > old_attributes_end || new_children_end > new_attributes_end;
            if has_children {
                ctx.batch.edits.push(RenderTreeEdit::StepIn {
                    sibling_index: ctx.sibling_index,
                });
                let prev_sibling_index = ctx.sibling_index;
                ctx.sibling_index = 0;
                append_diff_entries_for_range(
                    ctx,
                    old_attributes_end,
                    old_children_end,
                    new_attributes_end,
                    new_children_end,
                )?;
                append_step_out(ctx);
                ctx.sibling_index = prev_sibling_index + 1;
            } else {
                ctx.sibling_index += 1;
            }
        }
        FrameType::Region => {
            let old_end = next_sibling_index(ctx.old_tree, old_index);
            let new_end = next_sibling_index(ctx.new_tree, new_index);
            append_diff_entries_for_range(ctx, old_index + 1, old_end, new_index + 1, new_end)?;
        }
        FrameType::Component => {
            let same_type = match (&ctx.old_tree[old_index].kind, &ctx.new_tree[new_index].kind) {
                (
                    FrameKind::Component {
                        component_type: a, ..
                    },
                    FrameKind::Component {
                        component_type: b, ..
                    },
                ) => a == b,
                _ => false,
            };
            if same_type {
                update_retained_child_component(ctx, old_index, new_index)?;
                ctx.sibling_index += 1;
            } else {
                remove_old_frame(ctx, old_index)?;
                insert_new_frame(ctx, new_index)?;
            }
        }
        FrameType::ElementReferenceCapture => {
            // the capture action runs once per element; keep the id it received
            let old_id = match &ctx.old_tree[old_index].kind {
                FrameKind::ElementReferenceCapture { reference_id, .. } => reference_id.clone(),
                _ => None,
            };
            if let FrameKind::ElementReferenceCapture { reference_id, .. } =
                &mut ctx.new_tree[new_index].kind
            {
                *reference_id = old_id;
            }
        }
        FrameType::ComponentReferenceCapture => {}
        FrameType::Attribute => return Err(RenderError::UnexpectedFrame(FrameType::Attribute)),
    }
    Ok(())
}

fn append_step_out(ctx: &mut DiffContext<'_>) {
    if matches!(ctx.batch.edits.last(), Some(RenderTreeEdit::StepIn { .. })) {
        ctx.batch.edits.pop();
    } else {
        ctx.batch.edits.push(RenderTreeEdit::StepOut);
    }
}

fn update_retained_child_component(
    ctx: &mut DiffContext<'_>,
    old_index: usize,
    new_index: usize,
) -> Result<()> {
    let Some(id) = ctx.old_tree[old_index].component_id() else {
        return Err(RenderError::UnexpectedFrame(FrameType::Component));
    };
    if let FrameKind::Component { component_id, .. } = &mut ctx.new_tree[new_index].kind {
        *component_id = Some(id);
    }

    let old_parameters = ParameterView::for_component(ctx.old_tree, old_index);
    let new_parameters = ParameterView::for_component(ctx.new_tree, new_index);
    if !new_parameters.definitely_equals(&old_parameters) {
        ctx.host.set_child_parameters(id, &new_parameters)?;
    }
    Ok(())
}

fn initialize_new_subtree(ctx: &mut DiffContext<'_>, root: usize) -> Result<()> {
    let end = next_sibling_index(ctx.new_tree, root);
    let mut in_component_parameters = false;
    for i in root..end {
        match ctx.new_tree[i].frame_type() {
            FrameType::Component => {
                initialize_new_component_frame(ctx, i)?;
                in_component_parameters = true;
            }
            FrameType::Attribute => {
                if !in_component_parameters {
                    initialize_new_attribute_frame(ctx, i);
                }
            }
            FrameType::ElementReferenceCapture => {
                in_component_parameters = false;
                initialize_new_element_reference_capture(ctx, i);
            }
            FrameType::ComponentReferenceCapture => {
                in_component_parameters = false;
                initialize_new_component_reference_capture(ctx, i)?;
            }
            _ => in_component_parameters = false,
        }
    }
    Ok(())
}

fn initialize_new_component_frame(ctx: &mut DiffContext<'_>, index: usize) -> Result<()> {
    let component_type = match &ctx.new_tree[index].kind {
        FrameKind::Component {
            component_type,
            component_id: None,
            ..
        } => *component_type,
        _ => return Err(RenderError::UnexpectedFrame(ctx.new_tree[index].frame_type())),
    };

    let child = ctx.host.instantiate_child(&component_type, ctx.component_id);
    if let FrameKind::Component { component_id, .. } = &mut ctx.new_tree[index].kind {
        *component_id = Some(child);
    }
    let parameters = ParameterView::for_component(ctx.new_tree, index);
    ctx.host.set_child_parameters(child, &parameters)
}

fn initialize_new_attribute_frame(ctx: &mut DiffContext<'_>, index: usize) {
    if let FrameKind::Attribute {
        name,
        value: crate::frame::AttributeValue::Handler(callback),
        event_handler_id,
        ..
    } = &mut ctx.new_tree[index].kind
    {
        if name.len() >= 3 && name.starts_with("on") {
            *event_handler_id = Some(ctx.host.assign_event_handler_id(callback));
        }
    }
}

fn initialize_new_element_reference_capture(ctx: &mut DiffContext<'_>, index: usize) {
    if let FrameKind::ElementReferenceCapture {
        action,
        reference_id,
    } = &mut ctx.new_tree[index].kind
    {
        let id = ctx.host.next_element_reference_id();
        *reference_id = Some(id.clone());
        action(crate::frame::ElementReference { id });
    }
}

fn initialize_new_component_reference_capture(
    ctx: &mut DiffContext<'_>,
    index: usize,
) -> Result<()> {
    let FrameKind::ComponentReferenceCapture {
        parent_frame_index,
        action,
    } = &ctx.new_tree[index].kind
    else {
        return Ok(());
    };
    let component_id = ctx
        .new_tree
        .get(*parent_frame_index)
        .and_then(RenderTreeFrame::component_id)
        .ok_or(RenderError::InvalidReferenceCaptureParent)?;
    action(component_id);
    Ok(())
}
