// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The reusable inference request.
//!
//! One `InferRequest` owns its sub-requests, its blob table, and one
//! optional completion callback. The `Idle → Busy → Ready` state lives in
//! a single atomic guarded by compare-and-swap — concurrent `start()`
//! calls race safely and exactly one wins. Completion is a single-set
//! `watch` channel fulfilled exactly once per run and read either by an
//! awaiting `wait()` or by the callback invoked on the fulfilling worker.

use crate::blob::BlobTable;
use crate::model::ModelInner;
use crate::{executor, PerfCounter, RuntimeError};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tensor_core::Tensor;
use tokio::sync::watch;

const IDLE: u8 = 0;
const BUSY: u8 = 1;
const READY: u8 = 2;

/// Final (or probed) state of one inference run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// The run completed successfully.
    Ready,
    /// `wait` timed out; the run (if any) continues untouched.
    Timeout,
    /// The run was cancelled; some sub-requests may not have started.
    Cancelled,
    /// A sub-request failed; the message is the first failure observed.
    Failed(String),
}

impl RequestStatus {
    /// Returns `true` for [`RequestStatus::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, RequestStatus::Ready)
    }
}

type Callback = Arc<dyn Fn(RequestStatus) + Send + Sync>;
type DoneChannel = watch::Receiver<Option<RequestStatus>>;

/// The reusable, stateful handle through which callers trigger and
/// observe executions of a compiled graph.
///
/// Cloning is shallow; clones observe the same request.
#[derive(Clone)]
pub struct InferRequest {
    inner: Arc<RequestInner>,
}

pub(crate) struct RequestInner {
    model: Arc<ModelInner>,
    state: AtomicU8,
    cancelled: AtomicBool,
    callbacks_enabled: AtomicBool,
    callback: Mutex<Option<Callback>>,
    blobs: crate::BlobTableLock,
    perf: crate::PerfTableLock,
    /// Receiver of the current run's completion value. Replaced on each
    /// `start()`; the paired sender is held by the run's worker tasks.
    done: Mutex<DoneChannel>,
    /// Keeps the pre-first-start channel open so early waiters park
    /// instead of erroring.
    idle_sender: Mutex<Option<watch::Sender<Option<RequestStatus>>>>,
}

impl InferRequest {
    pub(crate) fn new(model: Arc<ModelInner>) -> Self {
        let mut table = BlobTable::new();
        for (&edge, tensor) in &model.constants {
            table.insert(edge, tensor.clone());
        }
        // Inputs start zero-filled so a request is runnable immediately;
        // callers bind real data with `set_blob`.
        for &edge in model.inputs.values() {
            let desc = model.graph.edge(edge).desc.clone();
            table.insert(edge, Arc::new(Tensor::zeros(desc)));
        }

        let perf = model.perf_template.clone();
        let (tx, rx) = watch::channel(None);

        Self {
            inner: Arc::new(RequestInner {
                model,
                state: AtomicU8::new(IDLE),
                cancelled: AtomicBool::new(false),
                callbacks_enabled: AtomicBool::new(true),
                callback: Mutex::new(None),
                blobs: Mutex::new(table),
                perf: Mutex::new(perf),
                done: Mutex::new(rx),
                idle_sender: Mutex::new(Some(tx)),
            }),
        }
    }

    /// Begins an asynchronous run.
    ///
    /// Legal only from `Idle` (or `Ready`, which re-arms the request);
    /// a request already `Busy` returns [`RuntimeError::RequestBusy`]
    /// synchronously — concurrent starts are rejected, never queued.
    /// Sub-requests are spawned onto the current tokio runtime honoring
    /// the boundary dependencies recorded by the partitioner.
    pub fn start(&self) -> Result<(), RuntimeError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;

        let inner = &self.inner;
        let won = inner
            .state
            .compare_exchange(IDLE, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            || inner
                .state
                .compare_exchange(READY, BUSY, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        if !won {
            return Err(RuntimeError::RequestBusy);
        }

        inner.cancelled.store(false, Ordering::Release);

        // Fresh completion channel for this run.
        let (done_tx, done_rx) = watch::channel(None);
        let done_tx = Arc::new(done_tx);
        *lock(&inner.done) = done_rx;
        lock(&inner.idle_sender).take();

        // One completion event per sub-request; dependents park on their
        // producers' events.
        let subgraphs = &inner.model.subgraphs;
        let events: Vec<(Arc<watch::Sender<bool>>, watch::Receiver<bool>)> = subgraphs
            .iter()
            .map(|_| {
                let (tx, rx) = watch::channel(false);
                (Arc::new(tx), rx)
            })
            .collect();
        let remaining = Arc::new(AtomicUsize::new(subgraphs.len()));
        let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        for (index, sub) in subgraphs.iter().enumerate() {
            let sub = sub.clone();
            let deps: Vec<watch::Receiver<bool>> = sub
                .depends_on
                .iter()
                .map(|&d| events[d].1.clone())
                .collect();
            let own_event = events[index].0.clone();
            let inner = self.inner.clone();
            let remaining = remaining.clone();
            let failure = failure.clone();
            let done_tx = done_tx.clone();

            handle.spawn(async move {
                for mut dep in deps {
                    // The producer signals exactly once; a closed channel
                    // means it already finished.
                    let _ = dep.wait_for(|done| *done).await;
                }

                let skip = inner.cancelled.load(Ordering::Acquire)
                    || lock(&failure).is_some();
                if !skip {
                    // Worker failures are captured into a status value;
                    // nothing crosses the async boundary as a panic.
                    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        executor::execute_subgraph(
                            &sub,
                            &inner.blobs,
                            &inner.perf,
                            inner.model.profiling,
                        )
                    }));
                    let error = match outcome {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(_) => Some("panic during sub-request execution".to_string()),
                    };
                    if let Some(message) = error {
                        tracing::warn!("sub-request {} failed: {}", sub.index, message);
                        let mut slot = lock(&failure);
                        if slot.is_none() {
                            *slot = Some(message);
                        }
                    }
                }

                let _ = own_event.send(true);

                // The last sub-request to finish completes the run.
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let status = match lock(&failure).clone() {
                        Some(message) => RequestStatus::Failed(message),
                        None if inner.cancelled.load(Ordering::Acquire) => {
                            RequestStatus::Cancelled
                        }
                        None => RequestStatus::Ready,
                    };
                    inner.state.store(READY, Ordering::Release);
                    let _ = done_tx.send(Some(status.clone()));

                    if inner.callbacks_enabled.load(Ordering::Acquire) {
                        let callback = lock(&inner.callback).clone();
                        if let Some(callback) = callback {
                            callback(status);
                        }
                    }
                }
            });
        }

        Ok(())
    }

    /// Awaits completion of the current run.
    ///
    /// `None` blocks until `Ready`; `Some(d)` returns
    /// [`RequestStatus::Timeout`] after `d` without changing any state;
    /// `Some(Duration::ZERO)` is a non-blocking status probe.
    pub async fn wait(&self, timeout: Option<Duration>) -> RequestStatus {
        if let Some(d) = timeout {
            if d.is_zero() {
                return self.probe();
            }
            return match tokio::time::timeout(d, self.wait_inner()).await {
                Ok(status) => status,
                Err(_) => RequestStatus::Timeout,
            };
        }
        self.wait_inner().await
    }

    /// Blocking convenience for non-async callers. Must not be invoked
    /// from inside a tokio runtime thread.
    pub fn wait_blocking(&self, timeout: Option<Duration>) -> RequestStatus {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("current-thread runtime");
        runtime.block_on(self.wait(timeout))
    }

    /// Synchronous convenience: `start` + `wait`, with callbacks
    /// suppressed around the internal wait so the registered callback is
    /// not invoked for a run the caller observes directly.
    pub async fn infer(&self) -> Result<RequestStatus, RuntimeError> {
        self.inner.callbacks_enabled.store(false, Ordering::Release);
        let started = self.start();
        let result = match started {
            Ok(()) => Ok(self.wait(None).await),
            Err(e) => Err(e),
        };
        self.inner.callbacks_enabled.store(true, Ordering::Release);
        result
    }

    /// Registers the completion callback, replacing any previous one.
    ///
    /// Only legal while the request is not `Busy`.
    pub fn set_callback(
        &self,
        callback: impl Fn(RequestStatus) + Send + Sync + 'static,
    ) -> Result<(), RuntimeError> {
        if self.inner.state.load(Ordering::Acquire) == BUSY {
            return Err(RuntimeError::RequestBusy);
        }
        *lock(&self.inner.callback) = Some(Arc::new(callback));
        Ok(())
    }

    /// Requests best-effort cancellation.
    ///
    /// Sub-requests already running cannot be interrupted; not-yet-started
    /// ones are skipped. The callback is still delivered exactly once,
    /// with [`RequestStatus::Cancelled`].
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` while a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == BUSY
    }

    /// Binds an input blob by name.
    ///
    /// The tensor must match the declared descriptor exactly. Rejected
    /// while the request is `Busy`.
    pub fn set_blob(&self, name: &str, tensor: Tensor) -> Result<(), RuntimeError> {
        if self.inner.state.load(Ordering::Acquire) == BUSY {
            return Err(RuntimeError::RequestBusy);
        }
        let edge = *self
            .inner
            .model
            .inputs
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownBlob { name: name.into() })?;
        let declared = &self.inner.model.graph.edge(edge).desc;
        if tensor.desc() != declared {
            return Err(RuntimeError::BlobMismatch {
                name: name.into(),
                detail: format!("expected {declared}, got {}", tensor.desc()),
            });
        }
        lock(&self.inner.blobs).insert(edge, Arc::new(tensor));
        Ok(())
    }

    /// Reads a blob by name (inputs any time, outputs after a run).
    pub fn get_blob(&self, name: &str) -> Result<Tensor, RuntimeError> {
        let model = &self.inner.model;
        let edge = model
            .inputs
            .get(name)
            .or_else(|| model.outputs.get(name))
            .copied()
            .ok_or_else(|| RuntimeError::UnknownBlob { name: name.into() })?;
        lock(&self.inner.blobs)
            .get(edge)
            .map(|arc| (*arc).clone())
            .ok_or_else(|| RuntimeError::BlobNotReady { name: name.into() })
    }

    /// Returns the per-node performance counters of the last run.
    pub fn performance(&self) -> BTreeMap<String, PerfCounter> {
        lock(&self.inner.perf).clone()
    }

    // ── Private helpers ────────────────────────────────────────────

    /// Non-blocking completion probe.
    fn probe(&self) -> RequestStatus {
        let rx = lock(&self.inner.done).clone();
        let value = rx.borrow().clone();
        value.unwrap_or(RequestStatus::Timeout)
    }

    /// Awaits the current run's completion value. When `start()` swaps in
    /// a fresh channel mid-wait, the closed-channel error re-subscribes
    /// to the new one.
    async fn wait_inner(&self) -> RequestStatus {
        loop {
            let mut rx = lock(&self.inner.done).clone();
            {
                let current = rx.borrow();
                if let Some(status) = current.clone() {
                    return status;
                }
            }
            let waited = rx.wait_for(|value| value.is_some()).await;
            match waited {
                Ok(guard) => {
                    let value = (*guard).clone();
                    drop(guard);
                    if let Some(status) = value {
                        return status;
                    }
                }
                Err(_) => {
                    // Sender dropped: either a new run replaced the
                    // channel, or the request is idle again. Re-check.
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}

impl std::fmt::Debug for InferRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.state.load(Ordering::Acquire) {
            IDLE => "Idle",
            BUSY => "Busy",
            READY => "Ready",
            _ => "?",
        };
        f.debug_struct("InferRequest")
            .field("model", &self.inner.model.graph.name())
            .field("state", &state)
            .finish()
    }
}

/// Locks a mutex, recovering from poisoning: a worker that panicked has
/// already been folded into the run status, and the data under these
/// locks stays structurally valid.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
