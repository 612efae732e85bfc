use crate::component::RenderHandle;
use crate::frame::{ComponentId, EventHandlerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type Delegate = Rc<dyn Fn(&EventArgs) -> anyhow::Result<()>>;

/// Callback attached to an `on*` attribute.
///
/// When built with a receiver, the receiving component is queued for a render
/// after the delegate returns successfully.
#[derive(Clone)]
pub struct EventCallback {
    receiver: Option<RenderHandle>,
    delegate: Delegate,
}

impl EventCallback {
    pub fn new(f: impl Fn(&EventArgs) -> anyhow::Result<()> + 'static) -> Self {
        Self {
            receiver: None,
            delegate: Rc::new(f),
        }
    }

    pub fn with_receiver(
        receiver: RenderHandle,
        f: impl Fn(&EventArgs) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self {
            receiver: Some(receiver),
            delegate: Rc::new(f),
        }
    }

    pub fn invoke(&self, args: &EventArgs) -> anyhow::Result<()> {
        (self.delegate)(args)?;
        if let Some(receiver) = &self.receiver {
            receiver.render();
        }
        Ok(())
    }

    pub fn ptr_eq(&self, other: &EventCallback) -> bool {
        Rc::ptr_eq(&self.delegate, &other.delegate)
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallback")
            .field("receiver", &self.receiver.as_ref().map(|r| r.component_id()))
            .finish()
    }
}

/// Payload delivered with an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventArgs {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl EventArgs {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            value: serde_json::Value::Null,
        }
    }

    pub fn with_value(event_type: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            event_type: event_type.to_string(),
            value: value.into(),
        }
    }
}

/// Client-side value of the field an event came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

/// Identifies the component whose tree should absorb a client-side field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFieldInfo {
    pub component_id: ComponentId,
    pub field_value: FieldValue,
}

/// Handler table of one renderer
pub(crate) struct EventRegistry {
    last_id: u64,
    bindings: HashMap<EventHandlerId, EventCallback>,
    replacements: HashMap<EventHandlerId, EventHandlerId>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            last_id: 0,
            bindings: HashMap::new(),
            replacements: HashMap::new(),
        }
    }

    pub fn register(&mut self, callback: EventCallback) -> EventHandlerId {
        self.last_id += 1;
        let id = EventHandlerId(self.last_id);
        self.bindings.insert(id, callback);
        id
    }

    pub fn get(&self, id: EventHandlerId) -> Option<&EventCallback> {
        self.bindings.get(&id)
    }

    pub fn contains(&self, id: EventHandlerId) -> bool {
        self.bindings.contains_key(&id)
    }

    pub fn track_replacement(&mut self, old: EventHandlerId, new: EventHandlerId) {
        self.replacements.insert(old, new);
    }

    pub fn forget_replacement(&mut self, old: EventHandlerId) {
        self.replacements.remove(&old);
    }

    /// Follow replacement records to the newest id
    pub fn latest_in_chain(&self, mut id: EventHandlerId) -> EventHandlerId {
        while let Some(next) = self.replacements.get(&id) {
            id = *next;
        }
        id
    }

    pub fn remove(&mut self, id: EventHandlerId) {
        self.bindings.remove(&id);
        self.replacements.remove(&id);
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
        self.replacements.clear();
    }
}
