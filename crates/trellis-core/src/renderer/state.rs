use crate::batch::{RenderBatchBuilder, RenderQueue, RenderQueueEntry};
use crate::builder::RenderTreeBuilder;
use crate::component::{Component, ComponentType, ParameterView, RenderHandle};
use crate::diff::{self, DiffHost};
use crate::error::{RenderError, Result};
use crate::event::{EventCallback, EventRegistry};
use crate::frame::{ComponentId, EventHandlerId};
use smartstring::alias::String as SmartString;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Where a component is in its life with a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentLifecycle {
    /// Registered, not rendered yet
    Attached,
    Rendering,
    Idle,
    /// Removed by a diff or as a root; gone from the table once the cycle commits
    Disposed,
}

pub(crate) struct ComponentState {
    pub(crate) component: Box<dyn Component>,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) current: RenderTreeBuilder,
    scratch: RenderTreeBuilder,
    pub(crate) lifecycle: ComponentLifecycle,
    has_after_rendered: bool,
}

/// Everything a render cycle changed, so an aborted cycle can be undone
#[derive(Default)]
pub(crate) struct CycleJournal {
    saved_trees: HashMap<ComponentId, RenderTreeBuilder>,
    lifecycles: HashMap<ComponentId, ComponentLifecycle>,
    instantiated: Vec<ComponentId>,
    assigned_handlers: Vec<EventHandlerId>,
    replaced_handlers: Vec<EventHandlerId>,
    pub(crate) disposed: Vec<ComponentId>,
}

impl CycleJournal {
    fn note_lifecycle(&mut self, id: ComponentId, lifecycle: ComponentLifecycle) {
        self.lifecycles.entry(id).or_insert(lifecycle);
    }
}

/// Component and handler tables, split from the renderer so the diff can
/// borrow them as its host while the batch builder is borrowed separately
pub(crate) struct RendererCore {
    pub(crate) components: HashMap<ComponentId, ComponentState>,
    pub(crate) registry: EventRegistry,
    next_component_id: i32,
    next_element_reference: u64,
    render_queue: RenderQueue,
    pub(crate) journal: CycleJournal,
}

impl RendererCore {
    pub(crate) fn new(render_queue: RenderQueue) -> Self {
        Self {
            components: HashMap::new(),
            registry: EventRegistry::new(),
            next_component_id: 0,
            next_element_reference: 0,
            render_queue,
            journal: CycleJournal::default(),
        }
    }

    pub(crate) fn attach(
        &mut self,
        mut component: Box<dyn Component>,
        parent: Option<ComponentId>,
    ) -> ComponentId {
        let id = ComponentId(self.next_component_id);
        self.next_component_id += 1;
        component.attach(RenderHandle::new(id, self.render_queue.clone()));
        self.components.insert(
            id,
            ComponentState {
                component,
                parent,
                current: RenderTreeBuilder::new(),
                scratch: RenderTreeBuilder::new(),
                lifecycle: ComponentLifecycle::Attached,
                has_after_rendered: false,
            },
        );
        debug!(component_id = %id, parent = ?parent, "attached component");
        id
    }

    /// Pass parameters to a component, queueing a render if it asks for one
    pub(crate) fn set_parameters(
        &mut self,
        component_id: ComponentId,
        parameters: &ParameterView<'_>,
    ) -> Result<()> {
        let state = self
            .components
            .get_mut(&component_id)
            .ok_or(RenderError::UnknownComponent(component_id))?;
        let wants_render = state
            .component
            .set_parameters(parameters)
            .map_err(|source| RenderError::SetParameters {
                component_id,
                source,
            })?;
        if wants_render {
            self.render_queue.push(component_id, None);
        }
        Ok(())
    }

    /// Render one queued component and diff it against its last output.
    /// Missing or disposed components are skipped.
    pub(crate) fn render_component(
        &mut self,
        batch: &mut RenderBatchBuilder,
        entry: RenderQueueEntry,
    ) -> Result<()> {
        let component_id = entry.component_id;
        let Some(state) = self.components.get_mut(&component_id) else {
            trace!(component_id = %component_id, "skipping render of unknown component");
            return Ok(());
        };
        if state.lifecycle == ComponentLifecycle::Disposed {
            trace!(component_id = %component_id, "skipping render of disposed component");
            return Ok(());
        }

        self.journal.note_lifecycle(component_id, state.lifecycle);
        state.lifecycle = ComponentLifecycle::Rendering;

        let mut next = std::mem::take(&mut state.scratch);
        next.clear();
        let built = match &entry.fragment {
            Some(fragment) => {
                fragment(&mut next);
                Ok(())
            }
            None => state.component.build_render_tree(&mut next),
        };
        if let Err(source) = built {
            state.scratch = next;
            return Err(RenderError::Render {
                component_id,
                source,
            });
        }
        if let Err(source) = next.finish() {
            state.scratch = next;
            return Err(RenderError::Build {
                component_id,
                source,
            });
        }
        let prev = std::mem::take(&mut state.current);

        debug!(component_id = %component_id, frames = next.len(), "rendering component");
        let diff = diff::compute_diff(self, batch, component_id, prev.frames(), next.frames_mut());

        let Some(state) = self.components.get_mut(&component_id) else {
            return Err(RenderError::UnknownComponent(component_id));
        };
        match diff {
            Ok(diff) => {
                trace!(component_id = %component_id, edits = diff.edits.len(), "diffed component");
                batch.record_diff(diff);
                state.current = next;
                state.lifecycle = ComponentLifecycle::Idle;
                if self.journal.saved_trees.contains_key(&component_id) {
                    state.scratch = prev;
                } else {
                    self.journal.saved_trees.insert(component_id, prev);
                }
                Ok(())
            }
            Err(err) => {
                state.current = prev;
                state.scratch = next;
                Err(err)
            }
        }
    }

    /// Mark queued components disposed and record what they owned
    pub(crate) fn process_disposal_queue(&mut self, batch: &mut RenderBatchBuilder) {
        while let Some(component_id) = batch.disposal_queue.pop_front() {
            let Some(state) = self.components.get_mut(&component_id) else {
                continue;
            };
            if state.lifecycle == ComponentLifecycle::Disposed {
                continue;
            }
            self.journal.note_lifecycle(component_id, state.lifecycle);
            state.lifecycle = ComponentLifecycle::Disposed;
            diff::dispose_frames(batch, state.current.frames());
            batch.record_disposed_component(component_id);
            self.journal.disposed.push(component_id);
            debug!(component_id = %component_id, "disposing component");
        }
    }

    /// Forget the journal of a committed cycle
    pub(crate) fn commit(&mut self) -> Vec<ComponentId> {
        let journal = std::mem::take(&mut self.journal);
        journal.disposed
    }

    /// Undo everything the current cycle did to the tables
    pub(crate) fn rollback(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        for (id, tree) in journal.saved_trees {
            if let Some(state) = self.components.get_mut(&id) {
                state.current = tree;
                state.scratch.clear();
            }
        }
        for (id, lifecycle) in journal.lifecycles {
            if let Some(state) = self.components.get_mut(&id) {
                state.lifecycle = lifecycle;
            }
        }
        for id in &journal.instantiated {
            self.components.remove(id);
        }
        for id in journal.assigned_handlers {
            self.registry.remove(id);
        }
        for old in journal.replaced_handlers {
            self.registry.forget_replacement(old);
        }
        debug!(
            dropped_components = journal.instantiated.len(),
            "rolled back render cycle"
        );
    }

    /// Run `on_after_render` for the live components among `updated`
    pub(crate) fn notify_after_render(&mut self, updated: &[ComponentId]) -> Result<()> {
        let mut first_error = None;
        for &component_id in updated {
            let Some(state) = self.components.get_mut(&component_id) else {
                continue;
            };
            if state.lifecycle == ComponentLifecycle::Disposed {
                continue;
            }
            let first_render = !state.has_after_rendered;
            state.has_after_rendered = true;
            if let Err(source) = state.component.on_after_render(first_render) {
                first_error.get_or_insert(RenderError::AfterRender {
                    component_id,
                    source,
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl DiffHost for RendererCore {
    fn instantiate_child(
        &mut self,
        component_type: &ComponentType,
        parent: ComponentId,
    ) -> ComponentId {
        let id = self.attach(component_type.instantiate(), Some(parent));
        self.journal.instantiated.push(id);
        id
    }

    fn set_child_parameters(
        &mut self,
        child: ComponentId,
        parameters: &ParameterView<'_>,
    ) -> Result<()> {
        self.set_parameters(child, parameters)
    }

    fn assign_event_handler_id(&mut self, callback: &EventCallback) -> EventHandlerId {
        let id = self.registry.register(callback.clone());
        self.journal.assigned_handlers.push(id);
        trace!(event_handler_id = %id, "assigned event handler");
        id
    }

    fn track_replaced_event_handler_id(&mut self, old: EventHandlerId, new: EventHandlerId) {
        self.registry.track_replacement(old, new);
        self.journal.replaced_handlers.push(old);
    }

    fn next_element_reference_id(&mut self) -> SmartString {
        self.next_element_reference += 1;
        format!("elref-{}", self.next_element_reference).into()
    }
}
