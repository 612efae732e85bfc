use crate::component::RenderFragment;
use crate::edit::RenderTreeEdit;
use crate::frame::{ComponentId, EventHandlerId, RenderTreeFrame};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::rc::Rc;

/// A queued request to render one component
#[derive(Clone)]
pub struct RenderQueueEntry {
    pub component_id: ComponentId,
    /// `None` renders with the component's own `build_render_tree`
    pub fragment: Option<RenderFragment>,
}

/// FIFO of render requests, shared with every `RenderHandle`
#[derive(Clone, Default)]
pub struct RenderQueue(Rc<RefCell<VecDeque<RenderQueueEntry>>>);

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, component_id: ComponentId, fragment: Option<RenderFragment>) {
        self.0.borrow_mut().push_back(RenderQueueEntry {
            component_id,
            fragment,
        });
    }

    pub fn pop(&self) -> Option<RenderQueueEntry> {
        self.0.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Edits produced for one component, stored as a range of the batch's edit buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTreeDiff {
    pub component_id: ComponentId,
    pub(crate) edits: Range<usize>,
}

/// Accumulates the output of one render cycle
#[derive(Default)]
pub struct RenderBatchBuilder {
    pub(crate) updated_components: Vec<RenderTreeDiff>,
    pub(crate) edits: Vec<RenderTreeEdit>,
    pub(crate) reference_frames: Vec<RenderTreeFrame>,
    pub(crate) disposed_component_ids: Vec<ComponentId>,
    pub(crate) disposed_event_handler_ids: Vec<EventHandlerId>,
    pub(crate) render_queue: RenderQueue,
    pub(crate) disposal_queue: VecDeque<ComponentId>,
    pub(crate) attribute_diff_set: HashMap<smartstring::alias::String, usize>,
}

impl RenderBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_queue(&self) -> &RenderQueue {
        &self.render_queue
    }

    pub fn enqueue_component_render(
        &mut self,
        component_id: ComponentId,
        fragment: Option<RenderFragment>,
    ) {
        self.render_queue.push(component_id, fragment);
    }

    pub fn record_diff(&mut self, diff: RenderTreeDiff) {
        self.updated_components.push(diff);
    }

    pub fn record_disposed_component(&mut self, id: ComponentId) {
        self.disposed_component_ids.push(id);
    }

    pub fn record_disposed_event_handler(&mut self, id: EventHandlerId) {
        self.disposed_event_handler_ids.push(id);
    }

    pub(crate) fn add_reference_frame(&mut self, frame: RenderTreeFrame) -> i32 {
        self.reference_frames.push(frame);
        (self.reference_frames.len() - 1) as i32
    }

    pub(crate) fn add_reference_frames(&mut self, frames: &[RenderTreeFrame]) -> i32 {
        let start = self.reference_frames.len();
        self.reference_frames.extend_from_slice(frames);
        start as i32
    }

    pub fn has_pending_work(&self) -> bool {
        !self.render_queue.is_empty() || !self.disposal_queue.is_empty()
    }

    /// Read-only view of everything recorded since the last `clear`
    pub fn to_batch(&self) -> RenderBatch<'_> {
        RenderBatch {
            updated_components: &self.updated_components,
            edits: &self.edits,
            reference_frames: &self.reference_frames,
            disposed_component_ids: &self.disposed_component_ids,
            disposed_event_handler_ids: &self.disposed_event_handler_ids,
        }
    }

    /// Drop the recorded batch. Queued renders and disposals survive.
    pub fn clear(&mut self) {
        self.updated_components.clear();
        self.edits.clear();
        self.reference_frames.clear();
        self.disposed_component_ids.clear();
        self.disposed_event_handler_ids.clear();
        self.attribute_diff_set.clear();
    }

    /// Drop the recorded batch and every queued request
    pub fn reset(&mut self) {
        self.clear();
        self.render_queue.clear();
        self.disposal_queue.clear();
    }
}

/// Edits of one component within a batch
#[derive(Debug, Clone, Copy)]
pub struct ComponentDiff<'a> {
    pub component_id: ComponentId,
    pub edits: &'a [RenderTreeEdit],
}

/// Snapshot of one render cycle, borrowed from the batch builder.
///
/// The borrow ends before the builder can be cleared, so a transport must
/// encode or copy the batch inside `update_display`.
#[derive(Clone, Copy)]
pub struct RenderBatch<'a> {
    updated_components: &'a [RenderTreeDiff],
    edits: &'a [RenderTreeEdit],
    reference_frames: &'a [RenderTreeFrame],
    disposed_component_ids: &'a [ComponentId],
    disposed_event_handler_ids: &'a [EventHandlerId],
}

impl<'a> RenderBatch<'a> {
    pub fn updated_components(self) -> impl ExactSizeIterator<Item = ComponentDiff<'a>> + 'a {
        let edits = self.edits;
        self.updated_components.iter().map(move |diff| ComponentDiff {
            component_id: diff.component_id,
            edits: &edits[diff.edits.clone()],
        })
    }

    pub fn updated_component_count(&self) -> usize {
        self.updated_components.len()
    }

    pub fn reference_frames(&self) -> &'a [RenderTreeFrame] {
        self.reference_frames
    }

    pub fn disposed_component_ids(&self) -> &'a [ComponentId] {
        self.disposed_component_ids
    }

    pub fn disposed_event_handler_ids(&self) -> &'a [EventHandlerId] {
        self.disposed_event_handler_ids
    }

    pub fn is_empty(&self) -> bool {
        self.updated_components.is_empty()
            && self.disposed_component_ids.is_empty()
            && self.disposed_event_handler_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;

    #[test]
    fn test_to_batch_slices_edits_per_component() {
        let mut builder = RenderBatchBuilder::new();
        builder.edits.push(RenderTreeEdit::RemoveFrame { sibling_index: 0 });
        builder.record_diff(RenderTreeDiff {
            component_id: ComponentId(0),
            edits: 0..1,
        });
        builder.edits.push(RenderTreeEdit::StepIn { sibling_index: 2 });
        builder.edits.push(RenderTreeEdit::StepOut);
        builder.record_diff(RenderTreeDiff {
            component_id: ComponentId(4),
            edits: 1..3,
        });
        builder.record_disposed_component(ComponentId(7));
        builder.record_disposed_event_handler(EventHandlerId(3));

        let batch = builder.to_batch();
        let diffs: Vec<_> = batch.updated_components().collect();
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].edits.len(), 1);
        assert_eq!(diffs[1].component_id, ComponentId(4));
        assert_eq!(diffs[1].edits.len(), 2);
        assert_eq!(batch.disposed_component_ids(), &[ComponentId(7)]);
        assert_eq!(batch.disposed_event_handler_ids(), &[EventHandlerId(3)]);
    }

    #[test]
    fn test_clear_keeps_queues_and_reset_drops_them() {
        let mut builder = RenderBatchBuilder::new();
        builder.enqueue_component_render(ComponentId(1), None);
        builder.disposal_queue.push_back(ComponentId(2));
        builder.add_reference_frame(RenderTreeFrame {
            sequence: 0,
            kind: FrameKind::Text {
                content: "x".into(),
            },
        });

        builder.clear();
        assert!(builder.to_batch().reference_frames().is_empty());
        assert!(builder.has_pending_work());

        builder.reset();
        assert!(!builder.has_pending_work());
        assert!(builder.render_queue().is_empty());
    }
}
