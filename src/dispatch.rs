//! Selection dispatch: event → resolver → slot output.
//!
//! Two independent slots, subsystem and scatter. Each event touches exactly
//! one slot; a fault in one slot never changes the other's output.
//!
//! ```text
//! ┌──────────────┐  mpsc   ┌──────────────┐  watch   ┌──────────────┐
//! │   Boundary   │────────►│  Dispatcher  │─────────►│ Slot outputs │
//! │  (requests)  │◄────────│  (one task)  │          │ (latest seq) │
//! └──────────────┘ oneshot └──────────────┘          └──────────────┘
//! ```

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::chart::ChartSpec;
use crate::error::{DashboardError, Result};
use crate::logging::{self, obj, v_int, v_str, Domain};
use crate::resolver::{Subsystem, SubsystemKey, ViewResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotId {
    Subsystem,
    Scatter,
}

impl SlotId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotId::Subsystem => "subsystem",
            SlotId::Scatter => "scatter",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Subsystem(SubsystemKey),
    ScatterX(String),
    ScatterY(String),
    ScatterPair { x: String, y: String },
}

impl SelectionEvent {
    pub fn slot(&self) -> SlotId {
        match self {
            SelectionEvent::Subsystem(_) => SlotId::Subsystem,
            _ => SlotId::Scatter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotOutput {
    Chart { chart: Arc<ChartSpec> },
    /// Nothing to render; not an error.
    Empty,
    Fault { message: String },
}

impl SlotOutput {
    pub fn chart(&self) -> Option<&ChartSpec> {
        match self {
            SlotOutput::Chart { chart } => Some(chart),
            _ => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, SlotOutput::Fault { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotUpdate {
    pub slot: SlotId,
    /// Position of the event that produced this output; 0 for the initial one.
    pub seq: u64,
    pub output: SlotOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScatterSelection {
    pub x: String,
    pub y: String,
}

impl ScatterSelection {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self { x: x.into(), y: y.into() }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    resolver: ViewResolver,
    subsystem_key: SubsystemKey,
    scatter: ScatterSelection,
    subsystem_out: SlotUpdate,
    scatter_out: SlotUpdate,
    seq: u64,
}

impl Dispatcher {
    /// Starts with Drilling selected and the scatter slot on `default_pair`.
    /// The default pair must exist in the registry.
    pub fn new(resolver: ViewResolver, default_pair: ScatterSelection) -> Result<Self> {
        let scatter_chart = resolver.scatter(&default_pair.x, &default_pair.y)?;
        let subsystem_key = SubsystemKey::Known(Subsystem::Drilling);
        let subsystem_output = subsystem_output(resolver.subsystem(&subsystem_key));
        Ok(Self {
            subsystem_out: SlotUpdate { slot: SlotId::Subsystem, seq: 0, output: subsystem_output },
            scatter_out: SlotUpdate {
                slot: SlotId::Scatter,
                seq: 0,
                output: SlotOutput::Chart { chart: Arc::new(scatter_chart) },
            },
            resolver,
            subsystem_key,
            scatter: default_pair,
            seq: 0,
        })
    }

    pub fn resolver(&self) -> &ViewResolver {
        &self.resolver
    }

    pub fn subsystem_selection(&self) -> &SubsystemKey {
        &self.subsystem_key
    }

    pub fn scatter_selection(&self) -> &ScatterSelection {
        &self.scatter
    }

    pub fn output(&self, slot: SlotId) -> &SlotUpdate {
        match slot {
            SlotId::Subsystem => &self.subsystem_out,
            SlotId::Scatter => &self.scatter_out,
        }
    }

    pub fn apply(&mut self, event: SelectionEvent) -> SlotUpdate {
        self.seq += 1;
        let seq = self.seq;
        let slot = event.slot();

        let output = match event {
            SelectionEvent::Subsystem(key) => {
                let output = subsystem_output(self.resolver.subsystem(&key));
                if matches!(output, SlotOutput::Empty) {
                    logging::debug(
                        Domain::Dispatch,
                        "dispatch.empty",
                        obj(&[("seq", v_int(seq)), ("key", v_str(&key.to_string()))]),
                    );
                }
                self.subsystem_key = key;
                output
            }
            SelectionEvent::ScatterX(x) => {
                self.scatter.x = x;
                self.resolve_scatter(seq)
            }
            SelectionEvent::ScatterY(y) => {
                self.scatter.y = y;
                self.resolve_scatter(seq)
            }
            SelectionEvent::ScatterPair { x, y } => {
                self.scatter = ScatterSelection { x, y };
                self.resolve_scatter(seq)
            }
        };

        let update = SlotUpdate { slot, seq, output };
        match slot {
            SlotId::Subsystem => self.subsystem_out = update.clone(),
            SlotId::Scatter => self.scatter_out = update.clone(),
        }
        logging::debug(
            Domain::Dispatch,
            "dispatch.applied",
            obj(&[("seq", v_int(seq)), ("slot", v_str(slot.as_str()))]),
        );
        update
    }

    fn resolve_scatter(&self, seq: u64) -> SlotOutput {
        match self.resolver.scatter(&self.scatter.x, &self.scatter.y) {
            Ok(chart) => SlotOutput::Chart { chart: Arc::new(chart) },
            Err(err) => {
                logging::warn(
                    Domain::View,
                    "view.fault",
                    obj(&[
                        ("seq", v_int(seq)),
                        ("x", v_str(&self.scatter.x)),
                        ("y", v_str(&self.scatter.y)),
                        ("msg", v_str(&err.to_string())),
                    ]),
                );
                SlotOutput::Fault { message: err.to_string() }
            }
        }
    }
}

fn subsystem_output(chart: Option<ChartSpec>) -> SlotOutput {
    match chart {
        Some(chart) => SlotOutput::Chart { chart: Arc::new(chart) },
        None => SlotOutput::Empty,
    }
}

// =============================================================================
// Async handle
// =============================================================================

struct Envelope {
    event: SelectionEvent,
    reply: oneshot::Sender<SlotUpdate>,
}

/// Cloneable front of a dispatcher running on its own task.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<Envelope>,
    subsystem: watch::Receiver<SlotUpdate>,
    scatter: watch::Receiver<SlotUpdate>,
    resolver: ViewResolver,
}

/// Moves `dispatcher` onto a tokio task. Must be called inside a runtime.
pub fn spawn(dispatcher: Dispatcher, capacity: usize) -> DispatchHandle {
    let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
    let (subsystem_tx, subsystem_rx) = watch::channel(dispatcher.output(SlotId::Subsystem).clone());
    let (scatter_tx, scatter_rx) = watch::channel(dispatcher.output(SlotId::Scatter).clone());
    let resolver = dispatcher.resolver().clone();

    tokio::spawn(async move {
        let mut dispatcher = dispatcher;
        while let Some(Envelope { event, reply }) = rx.recv().await {
            let update = dispatcher.apply(event);
            match update.slot {
                SlotId::Subsystem => publish(&subsystem_tx, &update),
                SlotId::Scatter => publish(&scatter_tx, &update),
            }
            // requester may have gone away; the slot is already updated
            let _ = reply.send(update);
        }
        logging::info(Domain::Dispatch, "dispatch.stopped", obj(&[("last_seq", v_int(dispatcher.seq))]));
    });

    DispatchHandle { tx, subsystem: subsystem_rx, scatter: scatter_rx, resolver }
}

/// Replaces the slot value only with a newer update.
fn publish(tx: &watch::Sender<SlotUpdate>, update: &SlotUpdate) {
    tx.send_if_modified(|current| {
        if update.seq > current.seq {
            *current = update.clone();
            true
        } else {
            false
        }
    });
}

impl DispatchHandle {
    pub async fn dispatch(&self, event: SelectionEvent) -> Result<SlotUpdate> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { event, reply })
            .await
            .map_err(|_| DashboardError::DispatcherClosed)?;
        rx.await.map_err(|_| DashboardError::DispatcherClosed)
    }

    pub fn latest(&self, slot: SlotId) -> SlotUpdate {
        match slot {
            SlotId::Subsystem => self.subsystem.borrow().clone(),
            SlotId::Scatter => self.scatter.borrow().clone(),
        }
    }

    pub fn subscribe(&self, slot: SlotId) -> watch::Receiver<SlotUpdate> {
        match slot {
            SlotId::Subsystem => self.subsystem.clone(),
            SlotId::Scatter => self.scatter.clone(),
        }
    }

    pub fn resolver(&self) -> &ViewResolver {
        &self.resolver
    }
}
