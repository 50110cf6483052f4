use crate::coach::{CoachError, CoachModel};
use crate::ledger::debit_clamped;
use crate::mode::CoachingMode;
use crate::store::{CoachStore, StoreError, UserRecord};
use crate::Turn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What actually happened at session teardown. Persistence is best-effort:
/// a failed remote write is reported here and logged, but the in-memory
/// session state stays authoritative for the process lifetime.
#[derive(Debug, Default, PartialEq)]
pub struct StopReport {
    pub transcript_saved: bool,
    pub credits_used: u64,
    pub new_balance: Option<u64>,
}

/// Finalizes a session exactly once: persist the transcript, then settle
/// the credit ledger, in that order. The shared stop flag is raised first
/// so any still-in-flight completion resolves into a no-op.
pub struct SessionFinisher {
    stop_flag: Arc<AtomicBool>,
    done: AtomicBool,
}

impl SessionFinisher {
    pub fn new(stop_flag: Arc<AtomicBool>) -> Self {
        Self {
            stop_flag,
            done: AtomicBool::new(false),
        }
    }

    /// Raise the stop flag without persisting anything. Used when there is
    /// no store configured; still one-shot together with `finish`.
    pub fn mark_stopped(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Persist and settle. Calling this twice returns a default report the
    /// second time; nothing is saved or debited again.
    pub async fn finish<S: CoachStore>(
        &self,
        store: &S,
        room_id: &str,
        history: &[Turn],
        used: u64,
        user: Option<&mut UserRecord>,
    ) -> StopReport {
        self.mark_stopped();
        if self.done.swap(true, Ordering::SeqCst) {
            tracing::debug!("session already finalized");
            return StopReport::default();
        }

        let mut report = StopReport {
            credits_used: used,
            ..StopReport::default()
        };

        if history.is_empty() {
            tracing::debug!("empty transcript, nothing to persist");
        } else {
            match store.update_conversation(room_id, history).await {
                Ok(()) => {
                    report.transcript_saved = true;
                    tracing::info!("conversation saved, {} turns", history.len());
                }
                Err(e) => {
                    tracing::error!("failed to save conversation: {e}");
                }
            }
        }

        // Debit only after the transcript write, one atomic set, floor zero.
        if used > 0 {
            if let Some(user) = user {
                let new_balance = debit_clamped(user.credits, used);
                match store.update_user_credits(&user.id, new_balance).await {
                    Ok(()) => {
                        user.credits = new_balance;
                        report.new_balance = Some(new_balance);
                        tracing::info!("credits debited: {used}, remaining: {new_balance}");
                    }
                    Err(e) => {
                        tracing::error!("failed to update credits: {e}");
                    }
                }
            }
        }

        report
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("session is still active")]
    SessionActive,
    #[error("summary generation already in progress")]
    Busy,
    #[error("nothing to summarize yet")]
    NothingToSummarize,
    #[error(transparent)]
    Coach(#[from] CoachError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Guards post-session feedback/notes generation: only after the session
/// has stopped, only when the transcript holds more than the greeting, and
/// never two invocations at once. Re-invocation after success overwrites
/// the stored summary.
pub struct SummaryGate {
    ended: Arc<AtomicBool>,
    busy: AtomicBool,
    generated: AtomicBool,
}

impl SummaryGate {
    pub fn new(ended: Arc<AtomicBool>) -> Self {
        Self {
            ended,
            busy: AtomicBool::new(false),
            generated: AtomicBool::new(false),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generated.load(Ordering::SeqCst)
    }

    pub async fn generate<C, S>(
        &self,
        coach: &C,
        store: &S,
        room_id: &str,
        mode: CoachingMode,
        topic: &str,
        history: &[Turn],
    ) -> Result<String, SummaryError>
    where
        C: CoachModel + Send + Sync,
        S: CoachStore,
    {
        if !self.ended.load(Ordering::SeqCst) {
            return Err(SummaryError::SessionActive);
        }
        if history.len() <= 1 {
            return Err(SummaryError::NothingToSummarize);
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(SummaryError::Busy);
        }

        let result = async {
            let summary = coach.summarize(mode, topic, history).await?;
            store.update_summary(room_id, &summary).await?;
            Ok(summary)
        }
        .await;

        self.busy.store(false, Ordering::SeqCst);
        if result.is_ok() {
            self.generated.store(true, Ordering::SeqCst);
        }
        result
    }
}
