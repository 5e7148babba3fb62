// src/context.rs
//! Per-operation context
//!
//! Passed explicitly into package and index builds instead of living in
//! global state. Cancellation is cooperative: long-running steps check the
//! token between files and between build stages.

use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    cancel: CancellationToken,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context tied to an externally owned token
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`Error::Cancelled`] once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
