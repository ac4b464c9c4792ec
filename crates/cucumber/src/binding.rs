//! Runner binding
//!
//! A runner talks to the adapter through one ordered inbound queue. Protocol
//! events are fire-and-forget; lifecycle hooks carry a reply channel and
//! resolve once the adapter has processed every event queued before them and
//! the crew has settled.
//!
//! ```text
//! runner ──send_event()──────┐
//!        ──after_scenario()──┼──► inbound queue ──► driver ──► adapter ──► Stage
//!        ◄──── reply ────────┘
//! ```

use std::future::Future;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use scenecast_core::CueError;

use crate::adapter::{CucumberEventProtocolAdapter, LifecycleHook};
use crate::error::{AdapterError, AdapterResult};
use crate::protocol::ProtocolEvent;

enum Inbound {
    Event(ProtocolEvent),
    Json(Value),
    Hook {
        hook: LifecycleHook,
        done: oneshot::Sender<Result<(), CueError>>,
    },
}

/// Runner-side handle to a driven adapter
#[derive(Clone)]
pub struct RunnerBinding {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl RunnerBinding {
    /// Queue a protocol event. Never blocks the runner.
    pub fn send_event(&self, event: ProtocolEvent) -> AdapterResult<()> {
        self.tx
            .send(Inbound::Event(event))
            .map_err(|_| AdapterError::BindingClosed)
    }

    /// Queue a raw JSON protocol payload
    pub fn send_json(&self, payload: Value) -> AdapterResult<()> {
        self.tx
            .send(Inbound::Json(payload))
            .map_err(|_| AdapterError::BindingClosed)
    }

    pub async fn before_scenario(&self) -> AdapterResult<()> {
        self.hook(LifecycleHook::BeforeScenario).await
    }

    /// Resolves when every event sent so far is processed and the crew has
    /// settled
    pub async fn after_scenario(&self) -> AdapterResult<()> {
        self.hook(LifecycleHook::AfterScenario).await
    }

    pub async fn after_all(&self) -> AdapterResult<()> {
        self.hook(LifecycleHook::AfterAll).await
    }

    async fn hook(&self, hook: LifecycleHook) -> AdapterResult<()> {
        let (done, reply) = oneshot::channel();
        self.tx
            .send(Inbound::Hook { hook, done })
            .map_err(|_| AdapterError::BindingClosed)?;

        let settled = reply.await.map_err(|_| AdapterError::BindingClosed)?;
        Ok(settled?)
    }
}

/// Bind a runner to `adapter`.
///
/// The returned driver must be polled for anything to happen; it completes
/// once every [`RunnerBinding`] clone has been dropped.
pub fn bind(adapter: CucumberEventProtocolAdapter) -> (RunnerBinding, impl Future<Output = ()> + Send + 'static) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RunnerBinding { tx }, drive(adapter, rx))
}

/// Bind a runner to `adapter` and drive it on the current tokio runtime
pub fn spawn(adapter: CucumberEventProtocolAdapter) -> (RunnerBinding, JoinHandle<()>) {
    let (binding, driver) = bind(adapter);
    (binding, tokio::spawn(driver))
}

async fn drive(mut adapter: CucumberEventProtocolAdapter, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
    while let Some(message) = inbound.recv().await {
        match message {
            Inbound::Event(event) => adapter.notify(event),
            Inbound::Json(payload) => adapter.notify_json(payload),
            Inbound::Hook { hook, done } => {
                let settled = adapter.on_hook(hook).await;
                if done.send(settled).is_err() {
                    trace!(?hook, "runner stopped waiting for hook");
                }
            }
        }
    }
    debug!("runner binding closed");
}
