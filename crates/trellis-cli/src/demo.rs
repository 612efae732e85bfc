//! Built-in app driven end to end: renderer, encoding transport, decoder
//! and UI tree, with clicks dispatched by button label.

use crate::config::OutputFormat;
use anyhow::{Context, Result, anyhow, bail};
use colored::Colorize;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};
use trellis_batch::{
    AckMode, BatchSnapshot, EncodedBatch, EncodedPayload, Encoding, EncodingTransport, UiTree,
};
use trellis_core::{
    BatchId, Component, EventArgs, EventCallback, ParameterView, Parameters, RenderHandle,
    RenderTreeBuilder, Renderer, RendererConfig,
};

pub const DEFAULT_CLICKS: &[&str] = &[
    "Increment",
    "Add item",
    "Add item",
    "Rotate",
    "Remove first",
    "Increment",
];

#[derive(Default)]
struct Item {
    label: String,
}

impl Component for Item {
    fn set_parameters(&mut self, parameters: &ParameterView<'_>) -> anyhow::Result<bool> {
        let label = parameters
            .get("label")
            .and_then(|v| v.as_text())
            .unwrap_or_default();
        if label == self.label {
            return Ok(false);
        }
        self.label = label.to_string();
        Ok(true)
    }

    fn build_render_tree(&self, b: &mut RenderTreeBuilder) -> anyhow::Result<()> {
        b.open_element(0, "span");
        b.add_content(1, self.label.as_str());
        b.close_element();
        Ok(())
    }
}

struct DemoState {
    count: Cell<i32>,
    items: RefCell<Vec<(i64, String)>>,
    next_key: Cell<i64>,
}

impl DemoState {
    fn seeded() -> Self {
        Self {
            count: Cell::new(0),
            items: RefCell::new(vec![(1, "alpha".to_string()), (2, "beta".to_string())]),
            next_key: Cell::new(3),
        }
    }
}

struct Handlers {
    increment: EventCallback,
    add: EventCallback,
    rotate: EventCallback,
    remove_first: EventCallback,
}

struct DemoApp {
    state: Rc<DemoState>,
    handlers: Option<Handlers>,
}

impl Component for DemoApp {
    fn attach(&mut self, handle: RenderHandle) {
        let on = |f: fn(&DemoState)| {
            let state = self.state.clone();
            EventCallback::with_receiver(handle.clone(), move |_| {
                f(&state);
                Ok(())
            })
        };
        self.handlers = Some(Handlers {
            increment: on(|s| s.count.set(s.count.get() + 1)),
            add: on(|s| {
                let key = s.next_key.get();
                s.next_key.set(key + 1);
                s.items.borrow_mut().push((key, format!("item {key}")));
            }),
            rotate: on(|s| {
                let mut items = s.items.borrow_mut();
                if !items.is_empty() {
                    items.rotate_left(1);
                }
            }),
            remove_first: on(|s| {
                let mut items = s.items.borrow_mut();
                if !items.is_empty() {
                    items.remove(0);
                }
            }),
        });
    }

    fn build_render_tree(&self, b: &mut RenderTreeBuilder) -> anyhow::Result<()> {
        let handlers = self
            .handlers
            .as_ref()
            .ok_or_else(|| anyhow!("demo app rendered before attach"))?;
        b.open_element(0, "div");
        b.add_attribute(1, "class", "app");
        b.open_element(2, "h1");
        b.add_content(3, "Trellis demo");
        b.close_element();
        b.open_element(4, "p");
        b.add_content(5, format!("Count: {}", self.state.count.get()));
        b.close_element();
        button(b, 6, "Increment", &handlers.increment);
        button(b, 9, "Add item", &handlers.add);
        button(b, 12, "Rotate", &handlers.rotate);
        button(b, 15, "Remove first", &handlers.remove_first);
        b.open_element(18, "ul");
        for (key, label) in self.state.items.borrow().iter() {
            b.open_element(19, "li");
            b.set_key(*key);
            b.open_component::<Item>(20);
            b.add_attribute(21, "label", label.as_str());
            b.close_component();
            b.close_element();
        }
        b.close_element();
        b.close_element();
        Ok(())
    }
}

fn button(b: &mut RenderTreeBuilder, sequence: i32, label: &str, onclick: &EventCallback) {
    b.open_element(sequence, "button");
    b.add_attribute(sequence + 1, "onclick", onclick.clone());
    b.add_content(sequence + 2, label);
    b.close_element();
}

pub struct DemoOptions {
    pub encoding: Encoding,
    pub ack_mode: AckMode,
    pub clicks: Vec<String>,
    /// Directory receiving `batch-<id>.bin` for every linear batch
    pub dump: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchStats {
    pub batch_id: BatchId,
    pub trigger: String,
    pub bytes: usize,
    pub updated_components: usize,
    pub edits: usize,
    pub reference_frames: usize,
    pub disposed_components: usize,
    pub disposed_handlers: usize,
}

impl BatchStats {
    fn new(batch: &EncodedBatch, snapshot: &BatchSnapshot, trigger: &str) -> Self {
        Self {
            batch_id: batch.batch_id,
            trigger: trigger.to_string(),
            bytes: batch.payload.len(),
            updated_components: snapshot.updated_components.len(),
            edits: snapshot.edit_count(),
            reference_frames: snapshot.reference_frames.len(),
            disposed_components: snapshot.disposed_component_ids.len(),
            disposed_handlers: snapshot.disposed_event_handler_ids.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub encoding: Encoding,
    pub ack_mode: AckMode,
    pub batches: Vec<BatchStats>,
    pub components: usize,
    pub html: String,
}

pub fn run_demo(options: &DemoOptions) -> Result<DemoReport> {
    if options.dump.is_some() && options.encoding != Encoding::Linear {
        bail!("--dump writes linear batches; run with --encoding linear");
    }
    if let Some(dir) = &options.dump {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create dump directory: {}", dir.display()))?;
    }

    let state = Rc::new(DemoState::seeded());
    let mut renderer = Renderer::with_config(
        EncodingTransport::new(options.encoding, options.ack_mode),
        RendererConfig {
            name: "demo".to_string(),
        },
    );
    let root = renderer.add_root_component(DemoApp {
        state,
        handlers: None,
    });
    let mut tree = UiTree::new();
    let mut batches = Vec::new();
    let dump = options.dump.as_deref();

    renderer.render_root_component(root, &Parameters::new())?;
    deliver(&mut renderer, &mut tree, "initial render", dump, &mut batches)?;

    for label in &options.clicks {
        let handler = tree
            .find_handler(root, "onclick", label)
            .ok_or_else(|| anyhow!("No button labelled {label:?}"))?;
        info!(label = %label, event_handler_id = %handler, "clicking");
        renderer.dispatch_event(handler, None, &EventArgs::new("click"))?;
        deliver(&mut renderer, &mut tree, label, dump, &mut batches)?;
    }

    let html = tree.to_html(root)?;
    let components = renderer.component_count();
    renderer.dispose()?;
    Ok(DemoReport {
        encoding: options.encoding,
        ack_mode: options.ack_mode,
        batches,
        components,
        html,
    })
}

/// Decode and apply everything in the outbox, acknowledging as the UI would.
/// Acknowledgements can release queued renders, so loop until it stays empty.
fn deliver(
    renderer: &mut Renderer<EncodingTransport>,
    tree: &mut UiTree,
    trigger: &str,
    dump: Option<&Path>,
    stats: &mut Vec<BatchStats>,
) -> Result<()> {
    loop {
        let batches: Vec<EncodedBatch> = renderer.transport_mut().drain().collect();
        if batches.is_empty() {
            return Ok(());
        }
        for batch in batches {
            let snapshot = batch
                .payload
                .snapshot()
                .with_context(|| format!("Failed to decode batch {}", batch.batch_id))?;
            tree.apply(&snapshot)
                .with_context(|| format!("Failed to apply batch {}", batch.batch_id))?;
            if let (Some(dir), EncodedPayload::Linear(bytes)) = (dump, &batch.payload) {
                let path = dir.join(format!("batch-{}.bin", batch.batch_id));
                fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            debug!(batch_id = %batch.batch_id, edits = snapshot.edit_count(), "applied batch");
            stats.push(BatchStats::new(&batch, &snapshot, trigger));
            if renderer.transport().ack_mode() == AckMode::Deferred {
                renderer.acknowledge_batch(batch.batch_id, Ok(()))?;
            }
        }
    }
}

pub fn print_report(report: &DemoReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Pretty => {
            println!("{}", "─".repeat(60).dimmed());
            println!(
                "{} {} encoding, {} acks",
                "Trellis demo:".bold().cyan(),
                format!("{:?}", report.encoding).to_lowercase(),
                format!("{:?}", report.ack_mode).to_lowercase()
            );
            println!("{}", "─".repeat(60).dimmed());
            for batch in &report.batches {
                println!(
                    "  {} {:<16} {} component(s), {} edit(s), {} frame(s), disposed {}/{}, {} bytes",
                    format!("#{}", batch.batch_id).yellow(),
                    batch.trigger,
                    batch.updated_components,
                    batch.edits,
                    batch.reference_frames,
                    batch.disposed_components,
                    batch.disposed_handlers,
                    batch.bytes
                );
            }
            println!("{}", "─".repeat(60).dimmed());
            println!("{} live component(s)", report.components);
            println!("{}", report.html);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(encoding: Encoding, ack_mode: AckMode, clicks: &[&str]) -> DemoOptions {
        DemoOptions {
            encoding,
            ack_mode,
            clicks: clicks.iter().map(|c| c.to_string()).collect(),
            dump: None,
        }
    }

    #[test]
    fn test_initial_render_only() {
        let report = run_demo(&options(Encoding::Linear, AckMode::Immediate, &[])).unwrap();
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.components, 3);
        assert!(report.html.contains("<p>Count: 0</p>"));
        assert!(report.html.contains("<li><span>alpha</span></li><li><span>beta</span></li>"));
    }

    #[test]
    fn test_default_script_gives_same_html_for_every_mode() {
        let mut html = Vec::new();
        for encoding in [Encoding::Linear, Encoding::SharedMemory] {
            for ack_mode in [AckMode::Immediate, AckMode::Deferred] {
                let report = run_demo(&options(encoding, ack_mode, DEFAULT_CLICKS)).unwrap();
                assert_eq!(report.batches.len(), 1 + DEFAULT_CLICKS.len());
                html.push(report.html);
            }
        }
        assert!(html.windows(2).all(|w| w[0] == w[1]));
        assert!(html[0].contains("<p>Count: 2</p>"));
        assert!(html[0].contains(
            "<ul><li><span>item 3</span></li><li><span>item 4</span></li>\
             <li><span>alpha</span></li></ul>"
        ));
    }

    #[test]
    fn test_unknown_button_is_an_error() {
        let err = run_demo(&options(Encoding::Linear, AckMode::Immediate, &["Nope"])).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_dump_requires_linear() {
        let mut opts = options(Encoding::SharedMemory, AckMode::Immediate, &[]);
        opts.dump = Some(PathBuf::from("unused"));
        assert!(run_demo(&opts).is_err());
    }
}
