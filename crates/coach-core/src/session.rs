use crate::coach::{CoachError, CoachModel, COMPLETION_APOLOGY, RATE_LIMIT_APOLOGY};
use crate::ledger::UsageMeter;
use crate::mode::CoachingMode;
use crate::segment::UtteranceSegmenter;
use crate::{Command, Role, Turn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Inbound events for the session state machine. Everything the runtime
/// observes (socket messages, timers, playback completion) arrives through
/// one ordered channel of these, which is what makes the turn ordering
/// invariants checkable.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A confirmed transcript fragment from the stream client.
    TranscriptFinal(String),
    /// A still-revising candidate fragment; display only.
    TranscriptInterim(String),
    /// The silence timer fired: no confirmed fragment for the quiet period.
    SilenceElapsed,
    /// The speech output gate finished (or failed) playing the last reply.
    SpeakingDone,
}

/// Phases of the dialogue loop. `Idle` is both the initial and the steady
/// state; there is no terminal phase while the session is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingCompletion,
    Speaking,
}

/// The conversation loop state machine.
///
/// Owns the transcript history and the usage counter exclusively, and
/// serializes request/response turns: at most one turn is ever in flight.
/// An utterance that completes while a turn is running is held, not
/// dropped, and emitted once the controller returns to `Idle`.
pub struct SessionController {
    mode: CoachingMode,
    topic: String,
    expert: String,
    phase: TurnPhase,
    history: Vec<Turn>,
    segmenter: UtteranceSegmenter,
    usage: UsageMeter,
    greeting_sent: bool,
    held_utterance: bool,
    stopped: Arc<AtomicBool>,
}

impl SessionController {
    pub fn new(mode: CoachingMode, topic: impl Into<String>, expert: impl Into<String>) -> Self {
        Self {
            mode,
            topic: topic.into(),
            expert: expert.into(),
            phase: TurnPhase::Idle,
            history: Vec::new(),
            segmenter: UtteranceSegmenter::new(),
            usage: UsageMeter::new(),
            greeting_sent: false,
            held_utterance: false,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.history
    }

    pub fn usage_total(&self) -> u64 {
        self.usage.total()
    }

    pub fn expert(&self) -> &str {
        &self.expert
    }

    pub fn mode(&self) -> CoachingMode {
        self.mode
    }

    /// Confirmed buffer plus interim candidate, for live captioning.
    pub fn live_caption(&self) -> (String, bool) {
        self.segmenter.display()
    }

    /// Shared stop flag. Session teardown sets it; a completion call that
    /// resolves afterwards is discarded instead of mutating state.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }

    /// Emit the one-shot mode-specific greeting as an assistant turn:
    /// counted toward usage, spoken, appended to history. Re-invocation is
    /// a no-op.
    pub async fn send_greeting(&mut self, command_tx: &tokio::sync::mpsc::Sender<Command>) {
        if self.greeting_sent {
            return;
        }
        self.greeting_sent = true;

        let greeting = self.mode.greeting(&self.expert, &self.topic);
        self.usage.record(&greeting);
        self.history.push(Turn::assistant(greeting.clone()));
        self.phase = TurnPhase::Speaking;
        self.send_command(command_tx, Command::Speak(greeting)).await;
    }

    pub async fn handle_event<C: CoachModel + Send + Sync>(
        &mut self,
        event: SessionEvent,
        coach: &C,
        command_tx: &tokio::sync::mpsc::Sender<Command>,
    ) {
        match event {
            SessionEvent::TranscriptFinal(text) => {
                if self.segmenter.push_final(&text) {
                    tracing::debug!("confirmed: {text}");
                }
            }
            SessionEvent::TranscriptInterim(text) => {
                self.segmenter.push_interim(&text);
            }
            SessionEvent::SilenceElapsed => {
                if self.phase != TurnPhase::Idle {
                    // A turn is in flight; keep the buffer until Idle so
                    // turns never overlap and nothing is dropped.
                    if self.segmenter.has_confirmed() {
                        self.held_utterance = true;
                        tracing::debug!("utterance held, turn in flight");
                    }
                    return;
                }
                self.emit_buffered(coach, command_tx).await;
            }
            SessionEvent::SpeakingDone => {
                self.phase = TurnPhase::Idle;
                if self.held_utterance {
                    self.held_utterance = false;
                    self.emit_buffered(coach, command_tx).await;
                }
            }
        }
    }

    async fn emit_buffered<C: CoachModel + Send + Sync>(
        &mut self,
        coach: &C,
        command_tx: &tokio::sync::mpsc::Sender<Command>,
    ) {
        let Some(utterance) = self.segmenter.take() else {
            return;
        };
        if self.is_duplicate_of_last_user_turn(&utterance) {
            tracing::debug!("duplicate utterance discarded: {utterance}");
            return;
        }
        self.run_turn(utterance, coach, command_tx).await;
    }

    /// Re-delivery artifact check: an utterance identical to the previous
    /// user turn is discarded rather than answered twice. Read-only on
    /// history.
    fn is_duplicate_of_last_user_turn(&self, utterance: &str) -> bool {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .is_some_and(|turn| turn.content == utterance)
    }

    async fn run_turn<C: CoachModel + Send + Sync>(
        &mut self,
        utterance: String,
        coach: &C,
        command_tx: &tokio::sync::mpsc::Sender<Command>,
    ) {
        self.history.push(Turn::user(utterance));
        self.phase = TurnPhase::AwaitingCompletion;

        let result = coach.complete(self.mode, &self.topic, &self.history).await;

        if self.stopped.load(Ordering::SeqCst) {
            // The session ended while the call was in flight; its result
            // must not leak into whatever state comes next.
            tracing::debug!("completion resolved after stop, discarding");
            self.phase = TurnPhase::Idle;
            return;
        }

        let reply = match result {
            Ok(text) => text,
            Err(CoachError::RateLimited) => {
                tracing::warn!("completion rate limited");
                RATE_LIMIT_APOLOGY.to_string()
            }
            Err(e) => {
                tracing::error!("completion failed: {e}");
                COMPLETION_APOLOGY.to_string()
            }
        };

        self.usage.record(&reply);
        self.history.push(Turn::assistant(reply.clone()));
        self.phase = TurnPhase::Speaking;
        self.send_command(command_tx, Command::Speak(reply)).await;
    }

    async fn send_command(
        &self,
        command_tx: &tokio::sync::mpsc::Sender<Command>,
        command: Command,
    ) {
        if command_tx.send(command).await.is_err() {
            tracing::debug!("command channel closed, runtime is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::MockCoachModel;
    use tokio::sync::mpsc;

    fn controller() -> SessionController {
        SessionController::new(CoachingMode::Lecture, "rust ownership", "Joanna")
    }

    fn channel() -> (mpsc::Sender<Command>, mpsc::Receiver<Command>) {
        mpsc::channel(16)
    }

    async fn say(
        ctl: &mut SessionController,
        coach: &MockCoachModel,
        tx: &mpsc::Sender<Command>,
        text: &str,
    ) {
        ctl.handle_event(SessionEvent::TranscriptFinal(text.to_string()), coach, tx)
            .await;
        ctl.handle_event(SessionEvent::SilenceElapsed, coach, tx).await;
    }

    #[tokio::test]
    async fn greeting_fires_exactly_once() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();

        ctl.send_greeting(&tx).await;
        ctl.send_greeting(&tx).await;

        assert_eq!(ctl.transcript().len(), 1);
        assert_eq!(ctl.transcript()[0].role, Role::Assistant);
        let greeting_len = ctl.transcript()[0].content.chars().count() as u64;
        assert_eq!(ctl.usage_total(), greeting_len);
        assert_eq!(ctl.phase(), TurnPhase::Speaking);

        let Command::Speak(spoken) = rx.try_recv().expect("greeting spoken");
        assert_eq!(spoken, ctl.transcript()[0].content);
        assert!(rx.try_recv().is_err(), "second greeting must not fire");
    }

    #[tokio::test]
    async fn one_turn_runs_through_the_phase_loop() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();

        let mut coach = MockCoachModel::new();
        coach
            .expect_complete()
            .withf(|_, _, history| {
                history.last().is_some_and(|t| t.content == "what is a borrow")
            })
            .returning(|_, _, _| Box::pin(async { Ok("A borrow is a reference.".to_string()) }))
            .once();

        say(&mut ctl, &coach, &tx, "what is a borrow").await;

        assert_eq!(ctl.phase(), TurnPhase::Speaking);
        assert_eq!(ctl.transcript().len(), 2);
        assert_eq!(ctl.transcript()[1].content, "A borrow is a reference.");
        assert_eq!(
            ctl.usage_total(),
            "A borrow is a reference.".chars().count() as u64
        );
        let Command::Speak(spoken) = rx.try_recv().unwrap();
        assert_eq!(spoken, "A borrow is a reference.");

        ctl.handle_event(SessionEvent::SpeakingDone, &coach, &tx).await;
        assert_eq!(ctl.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn utterance_during_turn_is_held_then_emitted_once() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();

        let mut coach = MockCoachModel::new();
        coach
            .expect_complete()
            .returning(|_, _, _| Box::pin(async { Ok("reply".to_string()) }))
            .times(2);

        say(&mut ctl, &coach, &tx, "first question").await;
        assert_eq!(ctl.phase(), TurnPhase::Speaking);
        let _ = rx.try_recv().unwrap();

        // The user keeps talking while the reply is being spoken; silence
        // fires but nothing may be emitted until the controller is free.
        ctl.handle_event(
            SessionEvent::TranscriptFinal("second question".to_string()),
            &coach,
            &tx,
        )
        .await;
        ctl.handle_event(SessionEvent::SilenceElapsed, &coach, &tx).await;
        assert_eq!(ctl.transcript().len(), 2, "no overlapping turn started");
        assert!(rx.try_recv().is_err());

        // Back to Idle: the held utterance goes out exactly once.
        ctl.handle_event(SessionEvent::SpeakingDone, &coach, &tx).await;
        assert_eq!(ctl.transcript().len(), 4);
        assert_eq!(ctl.transcript()[2].content, "second question");
        let Command::Speak(_) = rx.try_recv().unwrap();

        ctl.handle_event(SessionEvent::SpeakingDone, &coach, &tx).await;
        assert_eq!(ctl.phase(), TurnPhase::Idle);
        assert!(rx.try_recv().is_err(), "held utterance emitted only once");
    }

    #[tokio::test]
    async fn duplicate_of_previous_user_turn_is_discarded() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();

        let mut coach = MockCoachModel::new();
        coach
            .expect_complete()
            .returning(|_, _, _| Box::pin(async { Ok("hi!".to_string()) }))
            .once();

        say(&mut ctl, &coach, &tx, "hello").await;
        let _ = rx.try_recv().unwrap();
        ctl.handle_event(SessionEvent::SpeakingDone, &coach, &tx).await;

        // Delayed re-delivery of the same utterance: no second AI call.
        say(&mut ctl, &coach, &tx, "hello").await;
        assert_eq!(ctl.transcript().len(), 2);
        assert_eq!(ctl.phase(), TurnPhase::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn silence_with_empty_buffer_is_a_noop() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();
        let coach = MockCoachModel::new();

        ctl.handle_event(SessionEvent::SilenceElapsed, &coach, &tx).await;
        assert_eq!(ctl.phase(), TurnPhase::Idle);
        assert!(ctl.transcript().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn completion_failure_substitutes_apology_turn() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();

        let mut coach = MockCoachModel::new();
        coach
            .expect_complete()
            .returning(|_, _, _| {
                Box::pin(async { Err(CoachError::Api("boom".to_string())) })
            })
            .once();

        say(&mut ctl, &coach, &tx, "are you there").await;

        // The apology is appended, counted, and spoken like a real reply,
        // and the loop is not stuck.
        assert_eq!(ctl.transcript()[1].content, COMPLETION_APOLOGY);
        assert_eq!(ctl.usage_total(), COMPLETION_APOLOGY.chars().count() as u64);
        assert_eq!(ctl.phase(), TurnPhase::Speaking);
        let Command::Speak(spoken) = rx.try_recv().unwrap();
        assert_eq!(spoken, COMPLETION_APOLOGY);

        ctl.handle_event(SessionEvent::SpeakingDone, &coach, &tx).await;
        assert_eq!(ctl.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn rate_limit_gets_its_own_apology() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();

        let mut coach = MockCoachModel::new();
        coach
            .expect_complete()
            .returning(|_, _, _| Box::pin(async { Err(CoachError::RateLimited) }))
            .once();

        say(&mut ctl, &coach, &tx, "quick question").await;
        assert_eq!(ctl.transcript()[1].content, RATE_LIMIT_APOLOGY);
        let Command::Speak(spoken) = rx.try_recv().unwrap();
        assert_eq!(spoken, RATE_LIMIT_APOLOGY);
    }

    #[tokio::test]
    async fn completion_resolving_after_stop_is_discarded() {
        let mut ctl = controller();
        let (tx, mut rx) = channel();
        let stop = ctl.stop_handle();

        let mut coach = MockCoachModel::new();
        coach
            .expect_complete()
            .returning(move |_, _, _| {
                let stop = stop.clone();
                Box::pin(async move {
                    // Session teardown happens while the call is in flight.
                    stop.store(true, Ordering::SeqCst);
                    Ok("too late".to_string())
                })
            })
            .once();

        say(&mut ctl, &coach, &tx, "last words").await;

        assert_eq!(ctl.phase(), TurnPhase::Idle);
        assert_eq!(ctl.transcript().len(), 1, "no assistant turn appended");
        assert_eq!(ctl.usage_total(), 0);
        assert!(rx.try_recv().is_err(), "nothing spoken after stop");
    }

    #[tokio::test]
    async fn interim_fragments_never_reach_history() {
        let mut ctl = controller();
        let (tx, _rx) = channel();
        let coach = MockCoachModel::new();

        ctl.handle_event(
            SessionEvent::TranscriptInterim("half a thou".to_string()),
            &coach,
            &tx,
        )
        .await;
        let (caption, interim) = ctl.live_caption();
        assert_eq!(caption, "half a thou");
        assert!(interim);
        assert!(ctl.transcript().is_empty());

        ctl.handle_event(SessionEvent::SilenceElapsed, &coach, &tx).await;
        assert!(ctl.transcript().is_empty(), "interim text is never emitted");
    }
}
