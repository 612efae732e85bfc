/// Batches produced by a real renderer, pushed through both wire encodings
/// and the UI tree applier
use bytes::Bytes;
use std::cell::RefCell;
use std::rc::Rc;
use trellis_batch::linear::{self, LinearBatchReader};
use trellis_batch::{
    AckMode, BatchReader, BatchSnapshot, EncodedPayload, Encoding, EncodingTransport,
    FrameSnapshot, SharedMemoryBatch, SharedMemoryWriter, UiTree,
};
use trellis_core::{
    BatchId, Component, ComponentId, DisplayUpdate, EditType, EventArgs, EventCallback,
    FrameType, ParameterView, Parameters, RenderBatch, RenderHandle, RenderTreeBuilder,
    RenderTreeEdit, Renderer, UiTransport,
};

type Scene = Rc<dyn Fn(&mut RenderTreeBuilder)>;

/// Root component whose output is swapped from the test
#[derive(Clone)]
struct Stage {
    scene: Rc<RefCell<Scene>>,
    handle: Rc<RefCell<Option<RenderHandle>>>,
}

impl Stage {
    fn new(scene: impl Fn(&mut RenderTreeBuilder) + 'static) -> Self {
        Self {
            scene: Rc::new(RefCell::new(Rc::new(scene))),
            handle: Rc::default(),
        }
    }

    fn show(&self, scene: impl Fn(&mut RenderTreeBuilder) + 'static) {
        *self.scene.borrow_mut() = Rc::new(scene);
        if let Some(handle) = self.handle.borrow().as_ref() {
            handle.render();
        }
    }
}

impl Component for Stage {
    fn attach(&mut self, handle: RenderHandle) {
        *self.handle.borrow_mut() = Some(handle);
    }

    fn build_render_tree(&self, b: &mut RenderTreeBuilder) -> anyhow::Result<()> {
        let scene = self.scene.borrow().clone();
        scene(b);
        Ok(())
    }
}

#[derive(Default)]
struct Label {
    text: String,
}

impl Component for Label {
    fn set_parameters(&mut self, parameters: &ParameterView<'_>) -> anyhow::Result<bool> {
        self.text = parameters
            .get("text")
            .and_then(|v| v.as_text())
            .unwrap_or_default()
            .to_string();
        Ok(true)
    }

    fn build_render_tree(&self, b: &mut RenderTreeBuilder) -> anyhow::Result<()> {
        b.open_element(0, "span");
        b.add_content(1, self.text.as_str());
        b.close_element();
        Ok(())
    }
}

/// Captures every batch in memory and in both encodings
#[derive(Default)]
struct TeeTransport {
    captured: Vec<BatchSnapshot>,
    linear: Vec<Bytes>,
    shared: Vec<SharedMemoryBatch>,
}

impl UiTransport for TeeTransport {
    fn update_display(
        &mut self,
        _batch_id: BatchId,
        batch: &RenderBatch<'_>,
    ) -> anyhow::Result<DisplayUpdate> {
        self.captured.push(BatchSnapshot::capture(batch));
        self.linear.push(linear::encode(batch)?);
        self.shared.push(SharedMemoryWriter::new().encode(batch)?);
        Ok(DisplayUpdate::Applied)
    }
}

impl TeeTransport {
    fn assert_backends_agree(&self) {
        for (i, captured) in self.captured.iter().enumerate() {
            let from_linear =
                BatchSnapshot::read(&LinearBatchReader::new(&self.linear[i]).unwrap()).unwrap();
            let from_shared = BatchSnapshot::read(&self.shared[i].reader().unwrap()).unwrap();
            assert_eq!(&from_linear, captured, "linear batch {i}");
            assert_eq!(&from_shared, captured, "shared-memory batch {i}");
        }
    }
}

fn hello(word: &'static str) -> impl Fn(&mut RenderTreeBuilder) + 'static {
    move |b| {
        b.open_element(0, "div");
        b.close_element();
        b.add_content(1, word);
    }
}

fn keyed_list(items: Vec<(i64, &'static str)>) -> impl Fn(&mut RenderTreeBuilder) + 'static {
    move |b| {
        b.open_element(0, "ul");
        for (key, label) in &items {
            b.open_element(1, "li");
            b.set_key(*key);
            b.add_attribute(2, "class", "item");
            b.open_component::<Label>(3);
            b.add_attribute(4, "text", *label);
            b.close_component();
            b.close_element();
        }
        b.close_element();
    }
}

fn start<T: UiTransport>(transport: T, stage: &Stage) -> (Renderer<T>, ComponentId) {
    let mut renderer = Renderer::new(transport);
    let root = renderer.add_root_component(stage.clone());
    renderer
        .render_root_component(root, &Parameters::new())
        .unwrap();
    (renderer, root)
}

fn linear_payload(payload: &EncodedPayload) -> &Bytes {
    match payload {
        EncodedPayload::Linear(bytes) => bytes,
        EncodedPayload::SharedMemory(_) => panic!("expected a linear payload"),
    }
}

fn read_i32_at(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn test_hello_world_update_resolves_through_string_table() {
    let stage = Stage::new(hello("hello"));
    let (mut renderer, root) = start(
        EncodingTransport::new(Encoding::Linear, AckMode::Immediate),
        &stage,
    );
    renderer.transport_mut().drain().for_each(drop);

    stage.show(hello("world"));
    renderer.process_pending_render().unwrap();
    let batch = renderer.transport_mut().pop().unwrap();
    let bytes = linear_payload(&batch.payload);
    let reader = LinearBatchReader::new(bytes).unwrap();

    let diffs = reader.updated_components().unwrap();
    assert_eq!(diffs.count, 1);
    let diff = reader.diff_at(diffs, 0).unwrap();
    assert_eq!(reader.diff_component_id(diff).unwrap(), root);

    let edits = reader.diff_edits(diff).unwrap();
    assert_eq!(edits.count, 1);
    let edit = reader.edit_at(edits, 0).unwrap();
    assert_eq!(reader.edit_type(edit).unwrap(), EditType::UpdateText);
    assert_eq!(reader.edit_sibling_index(edit).unwrap(), 1);

    let frames = reader.reference_frames().unwrap();
    let frame_index = reader.edit_new_tree_index(edit).unwrap() as usize;
    let frame = reader.frame_at(frames, frame_index).unwrap();
    assert_eq!(reader.frame_type(frame).unwrap(), FrameType::Text);
    let string_index = read_i32_at(bytes, frame.0 + linear::FRAME_TEXT_CONTENT);
    assert_eq!(reader.string(string_index).unwrap(), Some("world"));
}

#[test]
fn test_trailer_points_at_each_table() {
    let stage = Stage::new(hello("hello"));
    let (mut renderer, _root) = start(
        EncodingTransport::new(Encoding::Linear, AckMode::Immediate),
        &stage,
    );
    let batch = renderer.transport_mut().pop().unwrap();
    let bytes = linear_payload(&batch.payload);
    let len = bytes.len();
    let trailer = |from_end: usize| read_i32_at(bytes, len - from_end) as usize;

    let updated = trailer(linear::TRAILER_UPDATED_COMPONENTS);
    assert_eq!(read_i32_at(bytes, updated), 1);
    assert_eq!(read_i32_at(bytes, updated + 4), 0, "first diff record starts the buffer");

    let frames = trailer(linear::TRAILER_REFERENCE_FRAMES);
    assert_eq!(read_i32_at(bytes, frames), 2);
    assert_eq!(frames, updated + 8);

    let disposed = trailer(linear::TRAILER_DISPOSED_COMPONENT_IDS);
    assert_eq!(disposed, frames + 4 + 2 * linear::FRAME_LEN);
    let handlers = trailer(linear::TRAILER_DISPOSED_EVENT_HANDLER_IDS);
    assert_eq!(handlers, disposed + 4);

    let string_table = trailer(linear::TRAILER_STRING_TABLE);
    assert_eq!((len - linear::TRAILER_LEN - string_table) / 4, 2);
}

#[test]
fn test_names_and_empty_values_share_strings_but_text_does_not() {
    let stage = Stage::new(|b| {
        b.open_element(0, "ul");
        for _ in 0..3 {
            b.open_element(1, "li");
            b.add_attribute(2, "class", "");
            b.add_content(3, "same");
            b.close_element();
        }
        b.close_element();
    });
    let (mut renderer, _root) = start(
        EncodingTransport::new(Encoding::Linear, AckMode::Immediate),
        &stage,
    );
    let batch = renderer.transport_mut().pop().unwrap();
    let reader = LinearBatchReader::new(linear_payload(&batch.payload)).unwrap();
    // ul, li, class, "" once each; "same" three times
    assert_eq!(reader.string_count(), 7);

    stage.show(|b| {
        b.open_element(0, "ul");
        for _ in 0..3 {
            b.open_element(1, "li");
            b.add_content(3, "same");
            b.close_element();
        }
        b.close_element();
    });
    renderer.process_pending_render().unwrap();
    let batch = renderer.transport_mut().pop().unwrap();
    let bytes = linear_payload(&batch.payload).clone();
    let reader = LinearBatchReader::new(&bytes).unwrap();
    let snapshot = BatchSnapshot::read(&reader).unwrap();
    let removals = snapshot.updated_components[0]
        .edits
        .iter()
        .filter(|e| matches!(e, RenderTreeEdit::RemoveAttribute { .. }))
        .count();
    assert_eq!(removals, 3);
    assert_eq!(reader.string_count(), 1, "removed attribute name is shared");
}

#[test]
fn test_attribute_values_are_projected_to_strings() {
    let stage = Stage::new(|b| {
        b.open_element(0, "input");
        b.add_attribute(1, "checked", true);
        b.add_attribute(2, "disabled", false);
        b.add_attribute(3, "size", 4);
        b.add_attribute(4, "value", "x");
        b.add_attribute(5, "onchange", EventCallback::new(|_| Ok(())));
        b.close_element();
        b.open_component::<Label>(6);
        b.add_attribute(7, "hidden", false);
        b.add_attribute(8, "count", 3);
        b.close_component();
    });
    let (renderer, _root) = start(TeeTransport::default(), &stage);
    let transport = renderer.transport();
    transport.assert_backends_agree();

    let values: Vec<(String, Option<String>, bool)> = transport.captured[0]
        .reference_frames
        .iter()
        .filter_map(|f| match f {
            FrameSnapshot::Attribute {
                name,
                value,
                event_handler_id,
            } => Some((
                name.to_string(),
                value.as_ref().map(|v| v.to_string()),
                event_handler_id.is_some(),
            )),
            _ => None,
        })
        .collect();
    let expected = [
        ("checked", Some(""), false),
        ("size", Some("4"), false),
        ("value", Some("x"), false),
        ("onchange", None, true),
        ("hidden", None, false),
        ("count", None, false),
    ];
    let expected: Vec<(String, Option<String>, bool)> = expected
        .iter()
        .map(|(n, v, h)| (n.to_string(), v.map(str::to_string), *h))
        .collect();
    assert_eq!(values, expected, "element omits false, parameters keep it");
}

#[test]
fn test_every_frame_kind_round_trips_through_both_backends() {
    let stage = Stage::new(|b| {
        b.open_element(0, "section");
        b.add_attribute(1, "id", "main");
        b.add_element_reference_capture(2, |_| {});
        b.open_region(3);
        b.add_content(4, "in region");
        b.add_markup_content(5, "<b>bold</b>");
        b.close_region();
        b.open_component::<Label>(6);
        b.add_attribute(7, "text", "nested");
        b.add_component_reference_capture(8, |_| {});
        b.close_component();
        b.close_element();
    });
    let (mut renderer, _root) = start(TeeTransport::default(), &stage);

    stage.show(|b| {
        b.open_element(0, "section");
        b.add_attribute(1, "id", "other");
        b.add_element_reference_capture(2, |_| {});
        b.add_markup_content(5, "<i>changed</i>");
        b.close_element();
    });
    renderer.process_pending_render().unwrap();

    let transport = renderer.transport();
    assert_eq!(transport.captured.len(), 2);
    transport.assert_backends_agree();

    let first = &transport.captured[0];
    assert!(first.reference_frames.iter().any(|f| matches!(
        f,
        FrameSnapshot::ElementReferenceCapture {
            reference_id: Some(_)
        }
    )));
    assert!(
        first
            .reference_frames
            .contains(&FrameSnapshot::ComponentReferenceCapture)
    );
    let second = &transport.captured[1];
    assert_eq!(second.disposed_component_ids.len(), 1);
}

#[test]
fn test_disposal_lists_survive_encoding() {
    let stage = Stage::new(keyed_list(vec![(1, "a"), (2, "b")]));
    let (mut renderer, _root) = start(TeeTransport::default(), &stage);

    stage.show(|b| {
        b.open_element(0, "button");
        b.add_attribute(1, "onclick", EventCallback::new(|_| Ok(())));
        b.close_element();
    });
    renderer.process_pending_render().unwrap();
    stage.show(|b| {
        b.open_element(0, "button");
        b.close_element();
    });
    renderer.process_pending_render().unwrap();

    let transport = renderer.transport();
    transport.assert_backends_agree();
    assert_eq!(transport.captured[1].disposed_component_ids.len(), 2);
    assert_eq!(transport.captured[2].disposed_event_handler_ids.len(), 1);
}

#[test]
fn test_keyed_move_round_trips_permutation_list() {
    let stage = Stage::new(keyed_list(vec![(1, "a"), (2, "b"), (3, "c")]));
    let (mut renderer, _root) = start(TeeTransport::default(), &stage);
    stage.show(keyed_list(vec![(3, "c"), (1, "a"), (2, "b")]));
    renderer.process_pending_render().unwrap();

    let transport = renderer.transport();
    transport.assert_backends_agree();
    let edits = &transport.captured[1].updated_components[0].edits;
    assert!(edits.contains(&RenderTreeEdit::PermutationListEnd));
    assert!(
        edits
            .iter()
            .any(|e| matches!(e, RenderTreeEdit::PermutationListEntry { .. }))
    );
}

fn replay(tree: &mut UiTree, transport: &mut EncodingTransport) {
    for batch in transport.drain() {
        tree.apply(&batch.payload.snapshot().unwrap()).unwrap();
    }
}

#[test]
fn test_ui_tree_converges_with_fresh_render() {
    let steps = [
        vec![(1, "a"), (2, "b"), (3, "c")],
        vec![(3, "c"), (1, "a"), (2, "b")],
        vec![(3, "C!"), (2, "b")],
        vec![(4, "d"), (3, "C!"), (2, "b"), (5, "e")],
    ];

    let stage = Stage::new(keyed_list(steps[0].clone()));
    let (mut renderer, root) = start(
        EncodingTransport::new(Encoding::Linear, AckMode::Immediate),
        &stage,
    );
    let mut tree = UiTree::new();
    replay(&mut tree, renderer.transport_mut());
    for step in &steps[1..] {
        stage.show(keyed_list(step.clone()));
        renderer.process_pending_render().unwrap();
        replay(&mut tree, renderer.transport_mut());
    }

    let fresh_stage = Stage::new(keyed_list(steps[3].clone()));
    let (mut fresh, fresh_root) = start(
        EncodingTransport::new(Encoding::SharedMemory, AckMode::Immediate),
        &fresh_stage,
    );
    let mut fresh_tree = UiTree::new();
    replay(&mut fresh_tree, fresh.transport_mut());

    let html = tree.to_html(root).unwrap();
    assert_eq!(html, fresh_tree.to_html(fresh_root).unwrap());
    assert_eq!(
        html,
        "<ul><li class=\"item\"><span>d</span></li><li class=\"item\"><span>C!</span></li>\
         <li class=\"item\"><span>b</span></li><li class=\"item\"><span>e</span></li></ul>"
    );
    assert_eq!(tree.component_count(), fresh_tree.component_count());
    assert_eq!(tree.component_count(), renderer.component_count());
}

#[test]
fn test_deferred_ack_keeps_batches_pending() {
    let clicks = Rc::new(RefCell::new(0));
    let counted = clicks.clone();
    let stage = Stage::new(move |b| {
        let counted = counted.clone();
        b.open_element(0, "button");
        b.add_attribute(
            1,
            "onclick",
            EventCallback::new(move |_| {
                *counted.borrow_mut() += 1;
                Ok(())
            }),
        );
        b.add_content(2, "Click");
        b.close_element();
    });
    let (mut renderer, root) = start(
        EncodingTransport::new(Encoding::SharedMemory, AckMode::Deferred),
        &stage,
    );
    assert_eq!(renderer.pending_batch_count(), 1);

    let batch = renderer.transport_mut().pop().unwrap();
    let mut tree = UiTree::new();
    tree.apply(&batch.payload.snapshot().unwrap()).unwrap();
    let handler = tree.find_handler(root, "onclick", "Click").unwrap();

    renderer
        .dispatch_event(handler, None, &EventArgs::new("click"))
        .unwrap();
    assert_eq!(*clicks.borrow(), 1);

    renderer.acknowledge_batch(batch.batch_id, Ok(())).unwrap();
    assert_eq!(renderer.pending_batch_count(), 0);
}
