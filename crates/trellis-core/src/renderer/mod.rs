//! Render orchestration: component table, render queue, batches and events.

mod state;

pub use state::ComponentLifecycle;

use crate::batch::{RenderBatch, RenderBatchBuilder};
use crate::component::{Component, Parameters};
use crate::error::{RenderError, Result};
use crate::event::{EventArgs, EventFieldInfo};
use crate::frame::{ComponentId, EventHandlerId, RenderTreeFrame};
use crate::updater::update_to_match_client_state;
use serde::{Deserialize, Serialize};
use state::RendererCore;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, debug_span, trace, warn};

/// Identity of one flushed batch, increasing per renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a transport handled a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUpdate {
    /// The UI already applied the batch
    Applied,
    /// The UI reports back later through `Renderer::acknowledge_batch`
    Pending,
}

/// Receives every flushed batch.
///
/// The batch borrows the renderer's buffers, so implementations must encode
/// or copy it before returning.
pub trait UiTransport {
    fn update_display(
        &mut self,
        batch_id: BatchId,
        batch: &RenderBatch<'_>,
    ) -> anyhow::Result<DisplayUpdate>;
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Label used in tracing spans
    pub name: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            name: "renderer".to_string(),
        }
    }
}

struct PendingBatch {
    handler_ids: Vec<EventHandlerId>,
    updated_components: Vec<ComponentId>,
}

/// Drives components through render cycles and hands each resulting batch
/// to a `UiTransport`.
///
/// Single-threaded: components request renders through `RenderHandle`s,
/// and the host drains them with `process_pending_render`.
pub struct Renderer<T: UiTransport> {
    core: RendererCore,
    batch_builder: RenderBatchBuilder,
    transport: T,
    is_batch_in_progress: bool,
    next_batch_id: u64,
    pending_acks: BTreeMap<BatchId, PendingBatch>,
    config: RendererConfig,
}

impl<T: UiTransport> Renderer<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, RendererConfig::default())
    }

    pub fn with_config(transport: T, config: RendererConfig) -> Self {
        let batch_builder = RenderBatchBuilder::new();
        let core = RendererCore::new(batch_builder.render_queue().clone());
        Self {
            core,
            batch_builder,
            transport,
            is_batch_in_progress: false,
            next_batch_id: 1,
            pending_acks: BTreeMap::new(),
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Register a root component. It renders once `render_root_component` runs.
    pub fn add_root_component<C: Component>(&mut self, component: C) -> ComponentId {
        self.core.attach(Box::new(component), None)
    }

    pub fn render_root_component(
        &mut self,
        component_id: ComponentId,
        parameters: &Parameters,
    ) -> Result<()> {
        self.require_root(component_id)?;
        self.core.set_parameters(component_id, &parameters.view())?;
        self.process_pending_render()
    }

    pub fn remove_root_component(&mut self, component_id: ComponentId) -> Result<()> {
        self.require_root(component_id)?;
        debug!(component_id = %component_id, "removing root component");
        self.batch_builder.disposal_queue.push_back(component_id);
        self.process_pending_render()
    }

    fn require_root(&self, component_id: ComponentId) -> Result<()> {
        match self.core.components.get(&component_id) {
            None => Err(RenderError::UnknownComponent(component_id)),
            Some(state) if state.lifecycle == ComponentLifecycle::Disposed => {
                Err(RenderError::UnknownComponent(component_id))
            }
            Some(state) if state.parent.is_some() => {
                Err(RenderError::NotRootComponent(component_id))
            }
            Some(_) => Ok(()),
        }
    }

    pub fn component_lifecycle(&self, component_id: ComponentId) -> Option<ComponentLifecycle> {
        self.core.components.get(&component_id).map(|s| s.lifecycle)
    }

    /// Last flushed output of a component
    pub fn component_frames(&self, component_id: ComponentId) -> Option<&[RenderTreeFrame]> {
        self.core
            .components
            .get(&component_id)
            .map(|s| s.current.frames())
    }

    pub fn component_count(&self) -> usize {
        self.core.components.len()
    }

    pub fn is_handler_registered(&self, event_handler_id: EventHandlerId) -> bool {
        self.core.registry.contains(event_handler_id)
    }

    pub fn has_pending_renders(&self) -> bool {
        self.batch_builder.has_pending_work()
    }

    /// Batches handed to the transport and not acknowledged yet
    pub fn pending_batch_count(&self) -> usize {
        self.pending_acks.len()
    }

    /// Deliver an event to the callback registered under `event_handler_id`.
    ///
    /// Renders requested by the callback are folded into one batch that is
    /// flushed before this returns.
    pub fn dispatch_event(
        &mut self,
        event_handler_id: EventHandlerId,
        field_info: Option<EventFieldInfo>,
        args: &EventArgs,
    ) -> Result<()> {
        let _span = debug_span!("renderer", name = %self.config.name).entered();
        let callback = self
            .core
            .registry
            .get(event_handler_id)
            .cloned()
            .ok_or(RenderError::UnknownEventHandler(event_handler_id))?;

        if let Some(info) = field_info {
            let latest = self.core.registry.latest_in_chain(event_handler_id);
            if let Some(state) = self.core.components.get_mut(&info.component_id) {
                update_to_match_client_state(&mut state.current, latest, &info.field_value);
            }
        }

        debug!(
            event_handler_id = %event_handler_id,
            event_type = %args.event_type,
            "handling event"
        );
        let was_in_progress = self.is_batch_in_progress;
        self.is_batch_in_progress = true;
        let handled = callback.invoke(args);
        self.is_batch_in_progress = was_in_progress;

        let rendered = self.process_pending_render();
        handled.map_err(|source| RenderError::EventHandler {
            event_handler_id,
            source,
        })?;
        rendered
    }

    /// Drain the render queue unless a batch is already being built
    pub fn process_pending_render(&mut self) -> Result<()> {
        if self.is_batch_in_progress {
            return Ok(());
        }
        self.process_render_queue()
    }

    fn process_render_queue(&mut self) -> Result<()> {
        if self.is_batch_in_progress {
            return Err(RenderError::BatchInProgress);
        }
        let _span = debug_span!("renderer", name = %self.config.name).entered();
        let mut deferred = None;
        while self.batch_builder.has_pending_work() {
            self.is_batch_in_progress = true;
            let built = self.build_batch();
            let outcome = built.and_then(|()| self.flush());
            self.is_batch_in_progress = false;
            match outcome {
                Ok(Some(err)) => {
                    deferred.get_or_insert(err);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "render cycle aborted");
                    self.core.rollback();
                    self.batch_builder.reset();
                    return Err(err);
                }
            }
        }
        deferred.map_or(Ok(()), Err)
    }

    fn build_batch(&mut self) -> Result<()> {
        if self.batch_builder.render_queue().is_empty() {
            self.core.process_disposal_queue(&mut self.batch_builder);
        }
        while let Some(entry) = self.batch_builder.render_queue().pop() {
            self.core.render_component(&mut self.batch_builder, entry)?;
            self.core.process_disposal_queue(&mut self.batch_builder);
        }
        Ok(())
    }

    /// Send the built batch and commit the cycle. Errors that happen after
    /// the commit are returned in `Ok(Some(..))`.
    fn flush(&mut self) -> Result<Option<RenderError>> {
        if self.batch_builder.to_batch().is_empty() {
            // only stale requests for components that are already gone
            trace!("nothing to flush");
            self.batch_builder.clear();
            self.core.commit();
            return Ok(None);
        }
        let batch_id = BatchId(self.next_batch_id);
        self.next_batch_id += 1;

        let batch = self.batch_builder.to_batch();
        debug!(
            batch_id = %batch_id,
            components = batch.updated_component_count(),
            reference_frames = batch.reference_frames().len(),
            disposed_components = batch.disposed_component_ids().len(),
            disposed_handlers = batch.disposed_event_handler_ids().len(),
            "flushing batch"
        );
        let update = self
            .transport
            .update_display(batch_id, &batch)
            .map_err(|source| RenderError::Transport { batch_id, source })?;

        let mut updated_components: Vec<ComponentId> = Vec::new();
        for diff in batch.updated_components() {
            if !updated_components.contains(&diff.component_id) {
                updated_components.push(diff.component_id);
            }
        }
        let handler_ids = batch.disposed_event_handler_ids().to_vec();
        self.batch_builder.clear();

        let mut disposal_errors = Vec::new();
        for component_id in self.core.commit() {
            if let Some(mut state) = self.core.components.remove(&component_id) {
                if let Err(err) = state.component.dispose() {
                    disposal_errors.push((component_id, err));
                }
            }
        }

        let after_render = match update {
            DisplayUpdate::Applied => {
                self.reclaim_handlers(&handler_ids);
                self.core.notify_after_render(&updated_components).err()
            }
            DisplayUpdate::Pending => {
                self.pending_acks.insert(
                    batch_id,
                    PendingBatch {
                        handler_ids,
                        updated_components,
                    },
                );
                None
            }
        };

        if !disposal_errors.is_empty() {
            return Ok(Some(RenderError::Disposal(disposal_errors)));
        }
        Ok(after_render)
    }

    fn reclaim_handlers(&mut self, handler_ids: &[EventHandlerId]) {
        for &id in handler_ids {
            self.core.registry.remove(id);
        }
    }

    /// Completion signal for a batch the transport reported as `Pending`.
    ///
    /// Handler ids retired by the batch are reclaimed whatever the outcome.
    pub fn acknowledge_batch(
        &mut self,
        batch_id: BatchId,
        outcome: std::result::Result<(), String>,
    ) -> Result<()> {
        let pending = self
            .pending_acks
            .remove(&batch_id)
            .ok_or(RenderError::UnknownBatch(batch_id))?;
        self.reclaim_handlers(&pending.handler_ids);
        debug!(
            batch_id = %batch_id,
            reclaimed = pending.handler_ids.len(),
            ok = outcome.is_ok(),
            "acknowledged batch"
        );
        if let Err(message) = outcome {
            return Err(RenderError::DisplayUpdateFailed { batch_id, message });
        }

        let after_render = self.core.notify_after_render(&pending.updated_components);
        let rendered = self.process_pending_render();
        after_render?;
        rendered
    }

    /// Dispose every component and drop all registrations
    pub fn dispose(&mut self) -> Result<()> {
        debug!(name = %self.config.name, "disposing renderer");
        self.batch_builder.reset();
        self.pending_acks.clear();
        self.core.registry.clear();

        let mut ids: Vec<ComponentId> = self.core.components.keys().copied().collect();
        ids.sort();
        let mut errors = Vec::new();
        for component_id in ids {
            if let Some(mut state) = self.core.components.remove(&component_id) {
                if let Err(err) = state.component.dispose() {
                    errors.push((component_id, err));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RenderError::Disposal(errors))
        }
    }
}
