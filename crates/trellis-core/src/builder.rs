use crate::component::{Component, ComponentType, RenderFragment};
use crate::error::BuildError;
use crate::frame::{
    AttributeValue, ComponentReferenceAction, ElementReferenceAction, FrameKey, FrameKind,
    FrameType, RenderTreeFrame,
};
use smallvec::SmallVec;
use smartstring::alias::String as SmartString;
use std::rc::Rc;

/// Records the frames of one component render.
///
/// Misuse does not panic: the first error is stored, later calls are ignored,
/// and the renderer reports it through `finish`.
#[derive(Default)]
pub struct RenderTreeBuilder {
    entries: Vec<RenderTreeFrame>,
    open_indices: SmallVec<[usize; 8]>,
    last_non_attribute: Option<FrameType>,
    error: Option<BuildError>,
}

impl RenderTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[RenderTreeFrame] {
        &self.entries
    }

    pub(crate) fn frames_mut(&mut self) -> &mut [RenderTreeFrame] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.open_indices.clear();
        self.last_non_attribute = None;
        self.error = None;
    }

    /// Validate the recorded output
    pub fn finish(&mut self) -> Result<(), BuildError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if !self.open_indices.is_empty() {
            return Err(BuildError::UnclosedFrames(self.open_indices.len()));
        }
        Ok(())
    }

    fn fail(&mut self, err: BuildError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn append(&mut self, sequence: i32, kind: FrameKind) -> Option<usize> {
        if self.error.is_some() {
            return None;
        }
        let frame = RenderTreeFrame { sequence, kind };
        let frame_type = frame.frame_type();
        if frame_type != FrameType::Attribute {
            self.last_non_attribute = Some(frame_type);
        }
        self.entries.push(frame);
        Some(self.entries.len() - 1)
    }

    fn open(&mut self, sequence: i32, kind: FrameKind) {
        if let Some(index) = self.append(sequence, kind) {
            self.open_indices.push(index);
        }
    }

    fn close(&mut self, expected: FrameType) {
        if self.error.is_some() {
            return;
        }
        let Some(index) = self.open_indices.pop() else {
            self.fail(BuildError::NothingToClose(expected));
            return;
        };
        let found = self.entries[index].frame_type();
        if found != expected {
            self.fail(BuildError::MismatchedClose { expected, found });
            return;
        }
        let length = self.entries.len() - index;
        self.entries[index].set_subtree_length(length);
        self.last_non_attribute = None;
    }

    fn innermost_open(&self) -> Option<(usize, FrameType)> {
        let index = *self.open_indices.last()?;
        Some((index, self.entries[index].frame_type()))
    }

    pub fn open_element(&mut self, sequence: i32, name: &str) {
        self.open(
            sequence,
            FrameKind::Element {
                name: name.into(),
                subtree_length: 0,
                key: None,
            },
        );
    }

    pub fn close_element(&mut self) {
        self.close(FrameType::Element);
    }

    /// Text content
    pub fn add_content(&mut self, sequence: i32, text: impl Into<SmartString>) {
        self.append(
            sequence,
            FrameKind::Text {
                content: text.into(),
            },
        );
    }

    pub fn add_markup_content(&mut self, sequence: i32, markup: impl Into<SmartString>) {
        self.append(
            sequence,
            FrameKind::Markup {
                content: markup.into(),
            },
        );
    }

    /// Insert a fragment's output wrapped in a region
    pub fn add_fragment(&mut self, sequence: i32, fragment: &RenderFragment) {
        self.open_region(sequence);
        fragment(self);
        self.close_region();
    }

    /// Add an attribute to the open element or a parameter to the open component.
    ///
    /// On elements, `false` omits the attribute and numbers are stored as text.
    pub fn add_attribute(&mut self, sequence: i32, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        let value = match self.last_non_attribute {
            Some(FrameType::Element) => match value {
                AttributeValue::Bool(false) => return,
                AttributeValue::Int(v) => AttributeValue::Text(v.to_string().into()),
                AttributeValue::Float(v) => AttributeValue::Text(v.to_string().into()),
                other => other,
            },
            Some(FrameType::Component) => value,
            _ => {
                self.fail(BuildError::AttributeOutOfPlace);
                return;
            }
        };
        self.append(
            sequence,
            FrameKind::Attribute {
                name: name.into(),
                value,
                event_handler_id: None,
                updates_attribute_name: None,
            },
        );
    }

    /// Name the attribute that the last event handler attribute keeps in sync
    /// with the client, such as `value` for an `onchange` binding
    pub fn set_updates_attribute_name(&mut self, attribute_name: &str) {
        if self.error.is_some() {
            return;
        }
        match self.entries.last_mut().map(|f| &mut f.kind) {
            Some(FrameKind::Attribute {
                updates_attribute_name,
                ..
            }) => *updates_attribute_name = Some(attribute_name.into()),
            _ => self.fail(BuildError::UpdatesAttributeNameOutOfPlace),
        }
    }

    /// Key the innermost open element or component
    pub fn set_key(&mut self, value: impl Into<FrameKey>) {
        if self.error.is_some() {
            return;
        }
        let Some(index) = self.open_indices.last().copied() else {
            self.fail(BuildError::KeyOutOfScope);
            return;
        };
        match &mut self.entries[index].kind {
            FrameKind::Element { key, .. } | FrameKind::Component { key, .. } => {
                *key = Some(value.into())
            }
            _ => self.fail(BuildError::KeyOutOfScope),
        }
    }

    pub fn open_component<C: Component + Default>(&mut self, sequence: i32) {
        self.open_component_of(sequence, ComponentType::of::<C>());
    }

    pub fn open_component_of(&mut self, sequence: i32, component_type: ComponentType) {
        self.open(
            sequence,
            FrameKind::Component {
                component_type,
                subtree_length: 0,
                component_id: None,
                key: None,
            },
        );
    }

    pub fn close_component(&mut self) {
        self.close(FrameType::Component);
    }

    pub fn open_region(&mut self, sequence: i32) {
        self.open(sequence, FrameKind::Region { subtree_length: 0 });
    }

    pub fn close_region(&mut self) {
        self.close(FrameType::Region);
    }

    /// Receive a reference to the innermost open element once it is in the UI
    pub fn add_element_reference_capture(
        &mut self,
        sequence: i32,
        action: impl Fn(crate::frame::ElementReference) + 'static,
    ) {
        if !matches!(self.innermost_open(), Some((_, FrameType::Element))) {
            self.fail(BuildError::ElementCaptureOutOfPlace);
            return;
        }
        let action: ElementReferenceAction = Rc::new(action);
        self.append(
            sequence,
            FrameKind::ElementReferenceCapture {
                action,
                reference_id: None,
            },
        );
    }

    /// Receive the id of the innermost open component once it is instantiated
    pub fn add_component_reference_capture(
        &mut self,
        sequence: i32,
        action: impl Fn(crate::frame::ComponentId) + 'static,
    ) {
        let Some((parent_frame_index, FrameType::Component)) = self.innermost_open() else {
            self.fail(BuildError::ComponentCaptureOutOfPlace);
            return;
        };
        let action: ComponentReferenceAction = Rc::new(action);
        self.append(
            sequence,
            FrameKind::ComponentReferenceCapture {
                parent_frame_index,
                action,
            },
        );
    }

    /// Insert an attribute frame in the middle of a finished tree. Containers
    /// enclosing `index` grow by one; their lengths are fixed up by the caller.
    pub(crate) fn insert_attribute_expensive(
        &mut self,
        index: usize,
        sequence: i32,
        name: &str,
        value: AttributeValue,
    ) {
        self.entries.insert(
            index,
            RenderTreeFrame {
                sequence,
                kind: FrameKind::Attribute {
                    name: name.into(),
                    value,
                    event_handler_id: None,
                    updates_attribute_name: None,
                },
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_sets_subtree_lengths() {
        let mut b = RenderTreeBuilder::new();
        b.open_element(0, "ul");
        b.add_attribute(1, "class", "list");
        b.open_element(2, "li");
        b.add_content(3, "one");
        b.close_element();
        b.close_element();
        b.add_content(4, "tail");
        b.finish().unwrap();

        let frames = b.frames();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0].subtree_length(), 4);
        assert_eq!(frames[2].subtree_length(), 2);
        assert_eq!(frames[4].subtree_length(), 1);
    }

    #[test]
    fn test_element_attribute_value_rules() {
        let mut b = RenderTreeBuilder::new();
        b.open_element(0, "input");
        b.add_attribute(1, "disabled", false);
        b.add_attribute(2, "checked", true);
        b.add_attribute(3, "size", 10);
        b.close_element();
        b.finish().unwrap();

        let frames = b.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].attribute_name(), Some("checked"));
        match &frames[2].kind {
            FrameKind::Attribute { value, .. } => assert_eq!(value.as_text(), Some("10")),
            _ => panic!("expected attribute"),
        }
    }

    #[test]
    fn test_component_parameters_keep_raw_values() {
        #[derive(Default)]
        struct Leaf;
        impl Component for Leaf {
            fn build_render_tree(&self, _: &mut RenderTreeBuilder) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let mut b = RenderTreeBuilder::new();
        b.open_component::<Leaf>(0);
        b.add_attribute(1, "visible", false);
        b.add_attribute(2, "count", 3);
        b.set_key("leaf-1");
        b.close_component();
        b.finish().unwrap();

        let frames = b.frames();
        assert_eq!(frames[0].subtree_length(), 3);
        assert_eq!(frames[0].key(), Some(&FrameKey::Text("leaf-1".into())));
        match &frames[2].kind {
            FrameKind::Attribute { value, .. } => assert_eq!(value.as_int(), Some(3)),
            _ => panic!("expected attribute"),
        }
    }

    #[test]
    fn test_attribute_after_child_is_an_error() {
        let mut b = RenderTreeBuilder::new();
        b.open_element(0, "div");
        b.add_content(1, "text");
        b.add_attribute(2, "class", "late");
        b.close_element();
        assert_eq!(b.finish(), Err(BuildError::AttributeOutOfPlace));
    }

    #[test]
    fn test_unclosed_and_mismatched_frames() {
        let mut b = RenderTreeBuilder::new();
        b.open_element(0, "div");
        assert_eq!(b.finish(), Err(BuildError::UnclosedFrames(1)));

        let mut b = RenderTreeBuilder::new();
        b.open_region(0);
        b.close_element();
        assert_eq!(
            b.finish(),
            Err(BuildError::MismatchedClose {
                expected: FrameType::Element,
                found: FrameType::Region
            })
        );

        let mut b = RenderTreeBuilder::new();
        b.close_region();
        assert_eq!(b.finish(), Err(BuildError::NothingToClose(FrameType::Region)));
    }

    #[test]
    fn test_fragment_is_wrapped_in_region() {
        let fragment: RenderFragment = Rc::new(|b: &mut RenderTreeBuilder| {
            b.add_content(0, "a");
            b.add_content(1, "b");
        });
        let mut b = RenderTreeBuilder::new();
        b.add_fragment(5, &fragment);
        b.finish().unwrap();
        assert_eq!(b.frames()[0].frame_type(), FrameType::Region);
        assert_eq!(b.frames()[0].subtree_length(), 3);
    }

    #[test]
    fn test_key_outside_container_is_an_error() {
        let mut b = RenderTreeBuilder::new();
        b.set_key(1);
        assert_eq!(b.finish(), Err(BuildError::KeyOutOfScope));
    }
}
