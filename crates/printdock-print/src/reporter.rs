// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upstream lifecycle event sink.
//
// Emission is fire-and-forget: a reporter that cannot deliver an event logs
// and drops it. Events are never queued for redelivery.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use printdock_core::types::LifecycleEvent;

/// Channel through which job lifecycle events leave the executor.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn emit(&self, event: LifecycleEvent);
}

/// Forwards events into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Reporter for ChannelReporter {
    async fn emit(&self, event: LifecycleEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver gone — dropping event");
        }
    }
}
