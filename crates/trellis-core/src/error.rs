use crate::frame::{ComponentId, EventHandlerId, FrameKey, FrameType};
use crate::renderer::BatchId;
use thiserror::Error;

/// Misuse of `RenderTreeBuilder`, recorded at the first offending call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Attributes may only be added immediately after frames of type Element or Component")]
    AttributeOutOfPlace,

    #[error("Cannot set a key outside the scope of a component or element")]
    KeyOutOfScope,

    #[error("Cannot set the updated attribute name outside the scope of an attribute")]
    UpdatesAttributeNameOutOfPlace,

    #[error("Element reference captures may only be added as children of elements")]
    ElementCaptureOutOfPlace,

    #[error("Component reference captures may only be added as children of components")]
    ComponentCaptureOutOfPlace,

    #[error("Cannot close a {expected:?} frame while a {found:?} frame is open")]
    MismatchedClose { expected: FrameType, found: FrameType },

    #[error("Cannot close a {0:?} frame because nothing is open")]
    NothingToClose(FrameType),

    #[error("{0} frame(s) were left open at the end of rendering")]
    UnclosedFrames(usize),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("There is no event handler associated with this event. EventId: '{0}'")]
    UnknownEventHandler(EventHandlerId),

    #[error("The renderer does not have a component with ID {0}")]
    UnknownComponent(ComponentId),

    #[error("Component {0} is not a root component")]
    NotRootComponent(ComponentId),

    #[error("Cannot start a batch when one is already in progress")]
    BatchInProgress,

    #[error("More than one sibling has the same key value, '{0}'. Key values must be unique")]
    DuplicateKey(FrameKey),

    #[error("Invalid render tree in component {component_id}: {source}")]
    Build {
        component_id: ComponentId,
        #[source]
        source: BuildError,
    },

    #[error("Component {component_id} failed to render")]
    Render {
        component_id: ComponentId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Component {component_id} rejected its parameters")]
    SetParameters {
        component_id: ComponentId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Event handler {event_handler_id} failed")]
    EventHandler {
        event_handler_id: EventHandlerId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Component {component_id} failed after rendering")]
    AfterRender {
        component_id: ComponentId,
        #[source]
        source: anyhow::Error,
    },

    #[error("{} component(s) failed to dispose, first was {}", .0.len(), .0[0].0)]
    Disposal(Vec<(ComponentId, anyhow::Error)>),

    #[error("UI transport rejected batch {batch_id}")]
    Transport {
        batch_id: BatchId,
        #[source]
        source: anyhow::Error,
    },

    #[error("UI failed to apply batch {batch_id}: {message}")]
    DisplayUpdateFailed { batch_id: BatchId, message: String },

    #[error("No batch with id {0} is awaiting acknowledgement")]
    UnknownBatch(BatchId),

    #[error("Unexpected {0:?} frame in a sibling range")]
    UnexpectedFrame(FrameType),

    #[error("Component reference capture does not follow an instantiated component frame")]
    InvalidReferenceCaptureParent,
}

pub type Result<T> = std::result::Result<T, RenderError>;
