use crate::batch::RenderQueue;
use crate::builder::RenderTreeBuilder;
use crate::frame::{AttributeValue, ComponentId, FrameKind, RenderTreeFrame};
use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

/// A piece of UI that can be inserted into a builder
pub type RenderFragment = Rc<dyn Fn(&mut RenderTreeBuilder)>;

/// A UI component driven by a `Renderer`.
///
/// Components must not touch renderer state directly. They request renders
/// through the `RenderHandle` received in `attach`, or by returning `true`
/// from `set_parameters`.
pub trait Component: 'static {
    /// Called once, before any parameters are supplied
    fn attach(&mut self, handle: RenderHandle) {
        let _ = handle;
    }

    /// Receives the latest parameters. Returning `Ok(true)` queues a render.
    fn set_parameters(&mut self, parameters: &ParameterView<'_>) -> anyhow::Result<bool> {
        let _ = parameters;
        Ok(true)
    }

    /// Writes the component's output. Sequence numbers passed to the builder
    /// must be fixed per call site; computed sequence numbers give an
    /// unspecified (but safe) edit script.
    fn build_render_tree(&self, builder: &mut RenderTreeBuilder) -> anyhow::Result<()>;

    /// Called after the UI has applied a batch containing this component's output
    fn on_after_render(&mut self, first_render: bool) -> anyhow::Result<()> {
        let _ = first_render;
        Ok(())
    }

    fn dispose(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Identifies a component implementation and knows how to create one
#[derive(Clone, Copy)]
pub struct ComponentType {
    type_id: TypeId,
    name: &'static str,
    create: fn() -> Box<dyn Component>,
}

impl ComponentType {
    pub fn of<C: Component + Default>() -> Self {
        fn create<C: Component + Default>() -> Box<dyn Component> {
            Box::new(C::default())
        }
        Self {
            type_id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
            create: create::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Component> {
        (self.create)()
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

/// Lets a component ask its renderer for a render.
///
/// Requests only enqueue work. Inside an event dispatch or a render cycle they
/// join the current batch; otherwise the host drains them with
/// `Renderer::process_pending_render`.
#[derive(Clone)]
pub struct RenderHandle {
    component_id: ComponentId,
    queue: RenderQueue,
}

impl RenderHandle {
    pub(crate) fn new(component_id: ComponentId, queue: RenderQueue) -> Self {
        Self {
            component_id,
            queue,
        }
    }

    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Queue a render using the component's own `build_render_tree`
    pub fn render(&self) {
        self.queue.push(self.component_id, None);
    }

    /// Queue a render whose output comes from `fragment`
    pub fn render_fragment(&self, fragment: RenderFragment) {
        self.queue.push(self.component_id, Some(fragment));
    }
}

impl fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHandle")
            .field("component_id", &self.component_id)
            .finish()
    }
}

/// Borrowed view over the attribute frames that follow a component frame
#[derive(Clone, Copy)]
pub struct ParameterView<'a> {
    frames: &'a [RenderTreeFrame],
}

impl<'a> ParameterView<'a> {
    pub fn empty() -> Self {
        Self { frames: &[] }
    }

    /// Parameters of the component frame at `owner_index`
    pub(crate) fn for_component(tree: &'a [RenderTreeFrame], owner_index: usize) -> Self {
        let end = crate::frame::attributes_end(tree, owner_index);
        Self {
            frames: &tree[owner_index + 1..end],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(self) -> impl Iterator<Item = (&'a str, &'a AttributeValue)> + 'a {
        self.frames.iter().filter_map(|frame| match &frame.kind {
            FrameKind::Attribute { name, value, .. } => Some((name.as_str(), value)),
            _ => None,
        })
    }

    pub fn get(self, name: &str) -> Option<&'a AttributeValue> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// True only when both views hold the same names in the same order with
    /// equal values of types whose equality is meaningful
    pub fn definitely_equals(&self, other: &ParameterView<'_>) -> bool {
        if self.frames.len() != other.frames.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|((an, av), (bn, bv))| {
            an == bn && !av.is_opaque() && av.eq_value(bv)
        })
    }
}

/// Owned parameters for root components
#[derive(Default, Clone)]
pub struct Parameters {
    frames: Vec<RenderTreeFrame>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.frames.push(RenderTreeFrame {
            sequence: self.frames.len() as i32,
            kind: FrameKind::Attribute {
                name: name.into(),
                value: value.into(),
                event_handler_id: None,
                updates_attribute_name: None,
            },
        });
        self
    }

    pub fn view(&self) -> ParameterView<'_> {
        ParameterView {
            frames: &self.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventCallback;

    #[test]
    fn test_parameters_lookup_by_name() {
        let params = Parameters::new().with("title", "hi").with("count", 3);
        let view = params.view();
        assert_eq!(view.len(), 2);
        assert_eq!(view.get("title").and_then(|v| v.as_text()), Some("hi"));
        assert_eq!(view.get("count").and_then(|v| v.as_int()), Some(3));
        assert!(view.get("missing").is_none());
    }

    #[test]
    fn test_definitely_equals_rejects_callbacks() {
        let cb = EventCallback::new(|_| Ok(()));
        let a = Parameters::new().with("x", 1).with("onpick", cb.clone());
        let b = Parameters::new().with("x", 1).with("onpick", cb);
        assert!(!a.view().definitely_equals(&b.view()));

        let c = Parameters::new().with("x", 1);
        let d = Parameters::new().with("x", 1);
        assert!(c.view().definitely_equals(&d.view()));
        let e = Parameters::new().with("x", 2);
        assert!(!c.view().definitely_equals(&e.view()));
    }
}
