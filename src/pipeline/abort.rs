use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AlignmentError;

const DEFAULT_REASON: &str = "aborted by caller";

/// Shared flag that stops a run before its next stage starts.
///
/// Clones share state, so a handle kept by the caller can stop a run that
/// owns another clone. Aborting is sticky for the lifetime of the handle.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first reason wins; later calls only keep the flag set.
    pub fn abort(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.reason.lock() {
            slot.get_or_insert_with(|| reason.into());
        }
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        if !self.is_aborted() {
            return None;
        }
        let stored = self.reason.lock().ok().and_then(|slot| slot.clone());
        Some(stored.unwrap_or_else(|| DEFAULT_REASON.to_string()))
    }

    /// Fails with `Aborted` naming `stage` as the stage that did not start.
    pub fn check(&self, stage: &'static str) -> Result<(), AlignmentError> {
        match self.reason() {
            Some(reason) => Err(AlignmentError::aborted(stage, reason)),
            None => Ok(()),
        }
    }
}
