// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The dispatch engine: compiles a validated graph into a
//! [`CompiledModel`] and serves inference through reusable
//! [`InferRequest`]s.
//!
//! # Request Lifecycle
//!
//! ```text
//! Idle ── start() ──► Busy ── last sub-request done ──► Ready ── start() ──► Busy …
//! ```
//!
//! The state lives in one atomic; `start()` wins or loses a single
//! compare-and-swap, so concurrent callers race safely and exactly one
//! proceeds — the rest get [`RuntimeError::RequestBusy`] immediately,
//! never a silent queue.
//!
//! Sub-requests within one request form a partial order: those with no
//! producer/consumer relation run concurrently on the tokio worker pool,
//! while a dependent sub-request parks on its producers' completion
//! events. Completion of the last sub-request flips the request to
//! `Ready` and fires the registered callback exactly once; the
//! synchronous [`InferRequest::infer`] suppresses callbacks around its
//! internal wait.
//!
//! # Failure Model
//!
//! No failure crosses the async boundary as a panic: kernel errors (and
//! even panics inside worker execution) are captured and folded into the
//! final [`RequestStatus`], the request still reaches `Ready`, and the
//! callback still fires exactly once.

mod blob;
mod compile;
mod config;
mod error;
mod executor;
mod metrics;
mod model;
mod request;

pub use compile::compile;
pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use metrics::{PerfCounter, PerfStatus};
pub use model::CompiledModel;
pub use request::{InferRequest, RequestStatus};

pub(crate) type BlobTableLock = std::sync::Mutex<blob::BlobTable>;
pub(crate) type PerfTableLock =
    std::sync::Mutex<std::collections::BTreeMap<String, PerfCounter>>;
