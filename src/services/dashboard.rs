// Dashboard
// Pro flow: every scan goes through the session guard, lands in history and is logged.

use std::sync::{Mutex, MutexGuard};

use crate::models::{AnalysisResult, LogKind, ScanMode, ScanStats, SystemLogEntry};
use crate::services::activity_log::ActivityLog;
use crate::services::classifier::{ScamClassifier, ScanError};
use crate::services::detection::is_fail_safe;
use crate::services::history::{HistoryError, HistoryStore};
use crate::services::providers::ClassifierTransport;
use crate::services::session::{ScanOutcome, ScanSession};

pub struct Dashboard<T> {
    classifier: ScamClassifier<T>,
    session: ScanSession,
    history: Mutex<HistoryStore>,
    log: Mutex<ActivityLog>,
}

fn lock<S>(m: &Mutex<S>) -> MutexGuard<'_, S> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: ClassifierTransport> Dashboard<T> {
    pub fn new(classifier: ScamClassifier<T>, history: HistoryStore) -> Self {
        let mut log = ActivityLog::new();
        log.record(
            format!("History loaded ({} entries)", history.len()),
            LogKind::Database,
        );
        Self {
            classifier,
            session: ScanSession::new(),
            history: Mutex::new(history),
            log: Mutex::new(log),
        }
    }

    fn record(&self, message: impl Into<String>, kind: LogKind) {
        lock(&self.log).record(message, kind);
    }

    pub async fn scan(
        &self,
        content: &str,
        is_image: bool,
        mode: &ScanMode,
    ) -> Result<ScanOutcome, ScanError> {
        let what = if is_image { "image" } else { "message" };
        let depth = if mode.deep_scan { "deep" } else { "standard" };
        self.record(format!("Starting {} scan of {}", depth, what), LogKind::Info);

        let outcome = match self.session.run(&self.classifier, content, is_image, mode).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record(format!("Scan rejected: {}", e), LogKind::Error);
                return Err(e);
            }
        };

        match &outcome {
            ScanOutcome::Completed(result) => {
                if is_fail_safe(result) {
                    self.record(
                        "Analysis interrupted; marked suspicious as a precaution",
                        LogKind::Error,
                    );
                } else {
                    self.record(
                        format!("Verdict {} (risk {:.0})", result.verdict, result.risk_score),
                        LogKind::Success,
                    );
                }
                self.store(result.clone());
            }
            ScanOutcome::Superseded => self.record("Scan cancelled", LogKind::Info),
        }

        Ok(outcome)
    }

    fn store(&self, result: AnalysisResult) {
        let saved = {
            let mut history = lock(&self.history);
            history.append(result).map(|_| history.len())
        };
        self.report_write(saved.map(|n| format!("History saved ({} entries)", n)));
    }

    fn report_write(&self, outcome: Result<String, HistoryError>) {
        match outcome {
            Ok(message) => self.record(message, LogKind::Database),
            Err(e) => self.record(format!("History not saved: {}", e), LogKind::Error),
        }
    }

    pub fn cancel(&self) -> bool {
        self.session.cancel()
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub fn latest(&self) -> Option<AnalysisResult> {
        self.session.latest()
    }

    pub fn stats(&self) -> ScanStats {
        lock(&self.history).stats()
    }

    /// Newest first.
    pub fn history(&self) -> Vec<AnalysisResult> {
        lock(&self.history).entries().to_vec()
    }

    pub fn clear_history(&self) {
        let cleared = lock(&self.history).clear();
        self.report_write(cleared.map(|_| "History cleared".to_string()));
    }

    /// Oldest first.
    pub fn logs(&self) -> Vec<SystemLogEntry> {
        lock(&self.log).entries().cloned().collect()
    }
}
