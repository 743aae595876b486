// Copyright (c) 2026 Hopwire
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Caller-supplied deadline and cancellation for blocking operations.
//!
//! The guarded future is dropped on expiry or cancellation, which releases
//! whatever stream it owned exactly once.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a guarded operation stopped early.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// The deadline passed.
    #[error("timed out")]
    TimedOut,
}

/// Optional instant plus a cancellation token.
#[derive(Clone, Debug, Default)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: CancellationToken,
}

impl Deadline {
    /// Never expires, never cancelled (unless [`Deadline::cancel`] is called).
    pub fn none() -> Self {
        Self::default()
    }

    /// Expires `d` from now.
    pub fn after(d: Duration) -> Self {
        Self { at: Some(Instant::now() + d), cancel: CancellationToken::new() }
    }

    /// Expires at `at`.
    pub fn at(at: Instant) -> Self {
        Self { at: Some(at), cancel: CancellationToken::new() }
    }

    /// Attach a caller-owned cancellation token.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Keep the earlier of the two instants and this token.
    pub fn min(mut self, at: Option<Instant>) -> Self {
        self.at = match (self.at, at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self
    }

    /// Expiry instant, if any.
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancelled, or past the expiry instant.
    pub fn is_expired(&self) -> bool {
        self.cancel.is_cancelled() || self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fire the cancellation token.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run `fut` until it completes, the deadline passes or the token fires.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        let expiry = async {
            match self.at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = expiry => Err(Interrupted::TimedOut),
            out = fut => Ok(out),
        }
    }
}
