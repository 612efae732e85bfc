pub mod batch;
pub mod builder;
pub mod component;
pub mod diff;
pub mod edit;
pub mod error;
pub mod event;
pub mod frame;
pub mod renderer;
mod updater;

// Re-export key types
pub use batch::{ComponentDiff, RenderBatch, RenderBatchBuilder, RenderQueue};
pub use builder::RenderTreeBuilder;
pub use component::{
    Component, ComponentType, ParameterView, Parameters, RenderFragment, RenderHandle,
};
pub use edit::{EditType, RenderTreeEdit};
pub use error::{BuildError, RenderError, Result};
pub use event::{EventArgs, EventCallback, EventFieldInfo, FieldValue};
pub use frame::{
    AttributeValue, ComponentId, ElementReference, EventHandlerId, FrameKey, FrameKind,
    FrameType, RenderTreeFrame,
};
pub use renderer::{
    BatchId, ComponentLifecycle, DisplayUpdate, Renderer, RendererConfig, UiTransport,
};
