use crate::component::{ComponentType, RenderFragment};
use crate::event::EventCallback;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;
use std::rc::Rc;

/// Identifies a component within one renderer. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub i32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a registered event handler. Zero is reserved on the wire for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventHandlerId(pub u64);

impl fmt::Display for EventHandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire discriminant of a frame
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Element = 1,
    Text = 2,
    Attribute = 3,
    Component = 4,
    Region = 5,
    ElementReferenceCapture = 6,
    ComponentReferenceCapture = 7,
    Markup = 8,
}

impl FrameType {
    #[inline]
    pub fn from_i32(val: i32) -> Option<Self> {
        match val {
            1 => Some(Self::Element),
            2 => Some(Self::Text),
            3 => Some(Self::Attribute),
            4 => Some(Self::Component),
            5 => Some(Self::Region),
            6 => Some(Self::ElementReferenceCapture),
            7 => Some(Self::ComponentReferenceCapture),
            8 => Some(Self::Markup),
            _ => None,
        }
    }
}

/// Sibling key supplied with `RenderTreeBuilder::set_key`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameKey {
    Int(i64),
    Text(SmartString),
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKey::Int(v) => write!(f, "{v}"),
            FrameKey::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for FrameKey {
    fn from(v: i64) -> Self {
        FrameKey::Int(v)
    }
}

impl From<i32> for FrameKey {
    fn from(v: i32) -> Self {
        FrameKey::Int(v as i64)
    }
}

impl From<usize> for FrameKey {
    fn from(v: usize) -> Self {
        FrameKey::Int(v as i64)
    }
}

impl From<&str> for FrameKey {
    fn from(v: &str) -> Self {
        FrameKey::Text(v.into())
    }
}

impl From<String> for FrameKey {
    fn from(v: String) -> Self {
        FrameKey::Text(v.into())
    }
}

/// Value carried by an attribute frame or a component parameter
#[derive(Clone)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(SmartString),
    Handler(EventCallback),
    Fragment(RenderFragment),
}

impl AttributeValue {
    /// Equality used by the diff. Callbacks and fragments compare by identity.
    pub fn eq_value(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::Int(a), AttributeValue::Int(b)) => a == b,
            (AttributeValue::Float(a), AttributeValue::Float(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (AttributeValue::Text(a), AttributeValue::Text(b)) => a == b,
            (AttributeValue::Handler(a), AttributeValue::Handler(b)) => a.ptr_eq(b),
            (AttributeValue::Fragment(a), AttributeValue::Fragment(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Values whose equality says nothing about whether a component would render differently.
    pub(crate) fn is_opaque(&self) -> bool {
        matches!(self, AttributeValue::Handler(_) | AttributeValue::Fragment(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventCallback> {
        match self {
            AttributeValue::Handler(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_fragment(&self) -> Option<&RenderFragment> {
        match self {
            AttributeValue::Fragment(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "Bool({b})"),
            AttributeValue::Int(v) => write!(f, "Int({v})"),
            AttributeValue::Float(v) => write!(f, "Float({v})"),
            AttributeValue::Text(s) => write!(f, "Text({s:?})"),
            AttributeValue::Handler(_) => write!(f, "Handler"),
            AttributeValue::Fragment(_) => write!(f, "Fragment"),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.into())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v.into())
    }
}

impl From<SmartString> for AttributeValue {
    fn from(v: SmartString) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<EventCallback> for AttributeValue {
    fn from(v: EventCallback) -> Self {
        AttributeValue::Handler(v)
    }
}

/// Reference to a rendered element, handed to element capture actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementReference {
    pub id: SmartString,
}

pub type ElementReferenceAction = Rc<dyn Fn(ElementReference)>;
pub type ComponentReferenceAction = Rc<dyn Fn(ComponentId)>;

/// Kind-specific payload of a frame
#[derive(Clone)]
pub enum FrameKind {
    Element {
        name: SmartString,
        subtree_length: usize,
        key: Option<FrameKey>,
    },
    Text {
        content: SmartString,
    },
    Attribute {
        name: SmartString,
        value: AttributeValue,
        event_handler_id: Option<EventHandlerId>,
        updates_attribute_name: Option<SmartString>,
    },
    Component {
        component_type: ComponentType,
        subtree_length: usize,
        component_id: Option<ComponentId>,
        key: Option<FrameKey>,
    },
    Region {
        subtree_length: usize,
    },
    ElementReferenceCapture {
        action: ElementReferenceAction,
        reference_id: Option<SmartString>,
    },
    ComponentReferenceCapture {
        parent_frame_index: usize,
        action: ComponentReferenceAction,
    },
    Markup {
        content: SmartString,
    },
}

/// One recorded node of a component's output
#[derive(Clone)]
pub struct RenderTreeFrame {
    pub sequence: i32,
    pub kind: FrameKind,
}

impl RenderTreeFrame {
    pub fn frame_type(&self) -> FrameType {
        match &self.kind {
            FrameKind::Element { .. } => FrameType::Element,
            FrameKind::Text { .. } => FrameType::Text,
            FrameKind::Attribute { .. } => FrameType::Attribute,
            FrameKind::Component { .. } => FrameType::Component,
            FrameKind::Region { .. } => FrameType::Region,
            FrameKind::ElementReferenceCapture { .. } => FrameType::ElementReferenceCapture,
            FrameKind::ComponentReferenceCapture { .. } => FrameType::ComponentReferenceCapture,
            FrameKind::Markup { .. } => FrameType::Markup,
        }
    }

    /// Number of frames covered by this frame and its descendants
    pub fn subtree_length(&self) -> usize {
        match &self.kind {
            FrameKind::Element { subtree_length, .. }
            | FrameKind::Component { subtree_length, .. }
            | FrameKind::Region { subtree_length } => *subtree_length,
            _ => 1,
        }
    }

    pub(crate) fn set_subtree_length(&mut self, length: usize) {
        match &mut self.kind {
            FrameKind::Element { subtree_length, .. }
            | FrameKind::Component { subtree_length, .. }
            | FrameKind::Region { subtree_length } => *subtree_length = length,
            _ => {}
        }
    }

    pub fn key(&self) -> Option<&FrameKey> {
        match &self.kind {
            FrameKind::Element { key, .. } | FrameKind::Component { key, .. } => key.as_ref(),
            _ => None,
        }
    }

    pub fn attribute_name(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn event_handler_id(&self) -> Option<EventHandlerId> {
        match &self.kind {
            FrameKind::Attribute {
                event_handler_id, ..
            } => *event_handler_id,
            _ => None,
        }
    }

    pub fn component_id(&self) -> Option<ComponentId> {
        match &self.kind {
            FrameKind::Component { component_id, .. } => *component_id,
            _ => None,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, FrameKind::Attribute { .. })
    }
}

impl fmt::Debug for RenderTreeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FrameKind::Element {
                name,
                subtree_length,
                key,
            } => write!(
                f,
                "Element({}, {name}, len={subtree_length}, key={key:?})",
                self.sequence
            ),
            FrameKind::Text { content } => write!(f, "Text({}, {content:?})", self.sequence),
            FrameKind::Markup { content } => write!(f, "Markup({}, {content:?})", self.sequence),
            FrameKind::Attribute {
                name,
                value,
                event_handler_id,
                ..
            } => write!(
                f,
                "Attribute({}, {name}={value:?}, handler={event_handler_id:?})",
                self.sequence
            ),
            FrameKind::Component {
                component_type,
                subtree_length,
                component_id,
                key,
            } => write!(
                f,
                "Component({}, {}, len={subtree_length}, id={component_id:?}, key={key:?})",
                self.sequence,
                component_type.name()
            ),
            FrameKind::Region { subtree_length } => {
                write!(f, "Region({}, len={subtree_length})", self.sequence)
            }
            FrameKind::ElementReferenceCapture { reference_id, .. } => {
                write!(f, "ElementReferenceCapture({}, {reference_id:?})", self.sequence)
            }
            FrameKind::ComponentReferenceCapture {
                parent_frame_index, ..
            } => write!(
                f,
                "ComponentReferenceCapture({}, parent={parent_frame_index})",
                self.sequence
            ),
        }
    }
}

/// Index of the frame following `index` and its descendants
#[inline]
pub fn next_sibling_index(frames: &[RenderTreeFrame], index: usize) -> usize {
    index + frames[index].subtree_length()
}

/// End (exclusive) of the attribute frames directly following a container at `root`
pub fn attributes_end(frames: &[RenderTreeFrame], root: usize) -> usize {
    let end = root + frames[root].subtree_length();
    let mut index = root + 1;
    while index < end && frames[index].is_attribute() {
        index += 1;
    }
    index
}
