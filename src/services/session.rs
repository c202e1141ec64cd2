// Scan Session
// One scan in flight at a time; a cancelled or superseded scan never overwrites a newer result.

use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::models::{AnalysisResult, ScanMode};
use crate::services::classifier::{ScamClassifier, ScanError};
use crate::services::providers::ClassifierTransport;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed(AnalysisResult),
    /// The scan was cancelled while in flight; its result was discarded.
    Superseded,
}

#[derive(Debug, Default)]
struct SessionState {
    active: Option<u64>,
    next_ticket: u64,
    latest: Option<AnalysisResult>,
}

#[derive(Debug, Default)]
pub struct ScanSession {
    state: Mutex<SessionState>,
}

/// Releases the in-flight slot if the scan future is dropped before finishing.
struct InFlight<'a> {
    session: &'a ScanSession,
    ticket: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if state.active == Some(self.ticket) {
            state.active = None;
        }
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Result of the most recent scan that completed without being cancelled.
    pub fn latest(&self) -> Option<AnalysisResult> {
        self.lock().latest.clone()
    }

    /// Abandon the in-flight scan, if any. Its eventual result is discarded.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        match state.active.take() {
            Some(ticket) => {
                info!(ticket, "session.cancelled");
                true
            }
            None => false,
        }
    }

    fn begin(&self) -> Result<InFlight<'_>, ScanError> {
        let mut state = self.lock();
        if state.active.is_some() {
            return Err(ScanError::Busy);
        }
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.active = Some(ticket);
        debug!(ticket, "session.begin");
        Ok(InFlight { session: self, ticket })
    }

    fn finish(&self, ticket: u64, result: AnalysisResult) -> ScanOutcome {
        let mut state = self.lock();
        if state.active != Some(ticket) {
            debug!(ticket, "session.superseded");
            return ScanOutcome::Superseded;
        }
        state.active = None;
        state.latest = Some(result.clone());
        ScanOutcome::Completed(result)
    }

    pub async fn run<T: ClassifierTransport>(
        &self,
        classifier: &ScamClassifier<T>,
        content: &str,
        is_image: bool,
        mode: &ScanMode,
    ) -> Result<ScanOutcome, ScanError> {
        let guard = self.begin()?;
        let result = classifier.classify(content, is_image, mode).await?;
        Ok(self.finish(guard.ticket, result))
    }
}
