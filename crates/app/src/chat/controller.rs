use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use saathi_llm::{
    GatewayError, GatewayErrorKind, GatewayResult, ModelGateway, ProviderMessage,
    Role as ProviderRole,
};
use tokio::sync::watch;

use super::message::{
    ConversationState, Message, MessageId, MessageIdAllocator, Phase, PhaseTransition, Role,
};

/// Shown in place of any failed reply. The failure detail only goes to the log.
pub const APOLOGY_MESSAGE: &str = "Maaf kijiye, kuch takneeki kharabi hai. Dobara koshish karein.";

/// What a presentation layer needs to draw the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub is_loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    EmptyText,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing changed.
    Rejected(SubmitRejection),
    Replied {
        turn: MessageId,
        reply: MessageId,
    },
    /// An apology placeholder was appended instead of a reply.
    Failed {
        turn: MessageId,
        reply: MessageId,
        kind: GatewayErrorKind,
    },
}

struct Inner {
    state: ConversationState,
    input: String,
    ids: MessageIdAllocator,
}

/// Owns the conversation and sequences at most one gateway call at a time.
///
/// All methods take `&self`; state sits behind a mutex that is never held across an await,
/// so `reset` can run while a `submit` is suspended on the gateway.
pub struct ChatController {
    gateway: Arc<dyn ModelGateway>,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
}

impl ChatController {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        let (snapshot_tx, _) = watch::channel(ConversationSnapshot::default());
        Self {
            gateway,
            inner: Mutex::new(Inner {
                state: ConversationState::new(),
                input: String::new(),
                ids: MessageIdAllocator::new(),
            }),
            snapshot_tx,
        }
    }

    pub fn gateway_id(&self) -> &str {
        self.gateway.id()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().state.messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading()
    }

    pub fn phase(&self) -> Phase {
        self.lock().state.phase
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        Self::snapshot_of(&self.lock().state)
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    /// Starts a new conversation. Does not cancel an outstanding call; its reply is still
    /// appended to whatever the conversation holds when it settles.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let cleared = inner.state.messages.len();
        inner.state.messages.clear();
        inner.input.clear();

        tracing::info!(
            cleared,
            awaiting = inner.state.is_loading(),
            "conversation reset"
        );
        self.publish(&inner.state);
    }

    /// Accepts `text` as a new turn: appends the user message, enters `AwaitingResponse`,
    /// and clears the input draft.
    ///
    /// The returned turn carries the history as it was before the user message was added.
    pub fn begin_turn(&self, text: &str) -> Result<PendingTurn<'_>, SubmitRejection> {
        if text.trim().is_empty() {
            return Err(SubmitRejection::EmptyText);
        }

        let mut inner = self.lock();
        if inner.state.is_loading() {
            return Err(SubmitRejection::AwaitingResponse);
        }

        let history = inner
            .state
            .messages
            .iter()
            .map(Self::to_provider_message)
            .collect::<Vec<_>>();

        let now = Utc::now();
        let turn = inner.ids.next(now);
        inner
            .state
            .apply_transition(PhaseTransition::Dispatch(turn))
            .map_err(|_| SubmitRejection::AwaitingResponse)?;

        inner.state.messages.push(Message::user(turn, text, now));
        inner.input.clear();

        tracing::info!(
            turn = %turn,
            history_len = history.len(),
            gateway = %self.gateway.id(),
            "turn dispatched"
        );
        self.publish(&inner.state);

        Ok(PendingTurn {
            controller: self,
            turn,
            history,
            text: text.to_string(),
            settled: false,
        })
    }

    /// Runs one full turn. A rejected submit is a no-op.
    pub async fn submit(&self, text: impl AsRef<str>) -> SubmitOutcome {
        let turn = match self.begin_turn(text.as_ref()) {
            Ok(turn) => turn,
            Err(rejection) => {
                tracing::debug!(?rejection, "submit ignored");
                return SubmitOutcome::Rejected(rejection);
            }
        };

        let result = self.gateway.complete(turn.history(), turn.text()).await;
        turn.settle(result)
    }

    /// Submits the current input draft.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input();
        self.submit(text).await
    }

    fn finish(&self, turn: MessageId, reply: Result<String, GatewayErrorKind>) -> SubmitOutcome {
        let mut inner = self.lock();
        let now = Utc::now();
        let reply_id = inner.ids.next(now);

        let outcome = match reply {
            Ok(text) => {
                inner.state.messages.push(Message::model(reply_id, text, now));
                SubmitOutcome::Replied {
                    turn,
                    reply: reply_id,
                }
            }
            Err(kind) => {
                inner
                    .state
                    .messages
                    .push(Message::model_error(reply_id, APOLOGY_MESSAGE, now));
                SubmitOutcome::Failed {
                    turn,
                    reply: reply_id,
                    kind,
                }
            }
        };

        if let Err(rejection) = inner.state.apply_transition(PhaseTransition::Settle(turn)) {
            // Only reachable if turns were interleaved; never leave the loading flag stuck.
            tracing::error!(?rejection, turn = %turn, "settle rejected; forcing idle");
            inner.state.phase = Phase::Idle;
        }

        tracing::info!(turn = %turn, reply = %reply_id, ?outcome, "turn settled");
        self.publish(&inner.state);
        outcome
    }

    fn to_provider_message(message: &Message) -> ProviderMessage {
        let role = match message.role {
            Role::User => ProviderRole::User,
            Role::Model => ProviderRole::Model,
        };
        ProviderMessage::new(role, message.content.clone())
    }

    fn snapshot_of(state: &ConversationState) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: state.messages.clone(),
            is_loading: state.is_loading(),
        }
    }

    fn publish(&self, state: &ConversationState) {
        self.snapshot_tx.send_replace(Self::snapshot_of(state));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A dispatched turn waiting for its gateway result.
///
/// Dropping it unsettled (the submit future was dropped, or the gateway call panicked)
/// settles it as a failure, so the conversation always leaves `AwaitingResponse`.
pub struct PendingTurn<'a> {
    controller: &'a ChatController,
    turn: MessageId,
    history: Vec<ProviderMessage>,
    text: String,
    settled: bool,
}

impl PendingTurn<'_> {
    pub fn turn(&self) -> MessageId {
        self.turn
    }

    pub fn history(&self) -> &[ProviderMessage] {
        &self.history
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn settle(mut self, result: GatewayResult<String>) -> SubmitOutcome {
        self.settled = true;
        let reply = result.map_err(|error: GatewayError| {
            tracing::warn!(
                turn = %self.turn,
                kind = ?error.kind(),
                stage = error.stage(),
                error = %error,
                "gateway call failed; showing apology"
            );
            error.kind()
        });
        self.controller.finish(self.turn, reply)
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!(turn = %self.turn, "turn abandoned before the gateway settled");
        self.controller.finish(self.turn, Err(GatewayErrorKind::CallFailed));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use futures::FutureExt;
    use futures::future::BoxFuture;
    use tokio::sync::oneshot;

    use super::*;

    /// Answers every call with the same result and records what it was sent.
    struct StubGateway {
        reply: Result<String, GatewayErrorKind>,
        calls: StdMutex<Vec<(Vec<ProviderMessage>, String)>>,
    }

    impl StubGateway {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: StdMutex::new(Vec::new()),
            })
        }

        fn failing(kind: GatewayErrorKind) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(kind),
                calls: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Vec<ProviderMessage>, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ModelGateway for StubGateway {
        fn id(&self) -> &str {
            "stub"
        }

        fn complete<'a>(
            &'a self,
            history: &'a [ProviderMessage],
            new_text: &'a str,
        ) -> BoxFuture<'a, GatewayResult<String>> {
            self.calls
                .lock()
                .unwrap()
                .push((history.to_vec(), new_text.to_string()));
            let result = match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(GatewayErrorKind::MissingCredential) => Err(
                    GatewayError::missing_credential("resolve-credential", "stub"),
                ),
                Err(GatewayErrorKind::CallFailed) => {
                    Err(GatewayError::call_failed("send-request", "stub"))
                }
            };
            async move { result }.boxed()
        }
    }

    /// Holds every call open until the test releases it.
    struct GatedGateway {
        release: StdMutex<Option<oneshot::Receiver<GatewayResult<String>>>>,
    }

    impl GatedGateway {
        fn new() -> (oneshot::Sender<GatewayResult<String>>, Arc<Self>) {
            let (tx, rx) = oneshot::channel();
            let gateway = Arc::new(Self {
                release: StdMutex::new(Some(rx)),
            });
            (tx, gateway)
        }
    }

    impl ModelGateway for GatedGateway {
        fn id(&self) -> &str {
            "gated"
        }

        fn complete<'a>(
            &'a self,
            _history: &'a [ProviderMessage],
            _new_text: &'a str,
        ) -> BoxFuture<'a, GatewayResult<String>> {
            let release = self.release.lock().unwrap().take();
            async move {
                match release {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(GatewayError::call_failed("gate", "gated"))),
                    None => Err(GatewayError::call_failed("gate-reused", "gated")),
                }
            }
            .boxed()
        }
    }

    #[test]
    fn begin_and_settle_drive_the_phase_without_a_runtime() {
        let controller = ChatController::new(StubGateway::replying("unused"));

        let turn = controller.begin_turn("sawal").unwrap();
        assert_eq!(controller.phase(), Phase::AwaitingResponse(turn.turn()));
        assert!(turn.history().is_empty());
        assert_eq!(turn.text(), "sawal");
        assert_eq!(controller.messages()[0].id, turn.turn());

        let outcome = turn.settle(Ok("jawab".to_string()));
        assert!(matches!(outcome, SubmitOutcome::Replied { .. }));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.messages().len(), 2);
    }

    #[tokio::test]
    async fn successful_turn_appends_user_then_model_message() {
        let gateway = StubGateway::replying("Yahan plan hai...");
        let controller = ChatController::new(gateway.clone());

        let outcome = controller.submit("Mujhe grocery store shuru karna hai").await;

        let messages = controller.messages();
        assert!(matches!(outcome, SubmitOutcome::Replied { .. }));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Mujhe grocery store shuru karna hai");
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].content, "Yahan plan hai...");
        assert!(!messages[1].is_error);
        assert!(messages[0].id < messages[1].id);
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn gateway_receives_history_without_the_new_message() {
        let gateway = StubGateway::replying("jawab");
        let controller = ChatController::new(gateway.clone());

        controller.submit("pehla sawal").await;
        controller.submit("doosra sawal").await;

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.is_empty());
        assert_eq!(calls[0].1, "pehla sawal");
        assert_eq!(
            calls[1].0,
            vec![
                ProviderMessage::user("pehla sawal"),
                ProviderMessage::model("jawab"),
            ]
        );
        assert_eq!(calls[1].1, "doosra sawal");
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let gateway = StubGateway::replying("unused");
        let controller = ChatController::new(gateway.clone());
        controller.set_input("draft stays");

        for text in ["", "   ", "\n\t"] {
            assert_eq!(
                controller.submit(text).await,
                SubmitOutcome::Rejected(SubmitRejection::EmptyText)
            );
        }

        assert!(controller.messages().is_empty());
        assert!(!controller.is_loading());
        assert_eq!(controller.input(), "draft stays");
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn both_failure_kinds_show_the_same_apology() {
        for kind in [
            GatewayErrorKind::CallFailed,
            GatewayErrorKind::MissingCredential,
        ] {
            let controller = ChatController::new(StubGateway::failing(kind));

            let outcome = controller.submit("kuch bhi").await;

            let messages = controller.messages();
            assert!(matches!(outcome, SubmitOutcome::Failed { kind: k, .. } if k == kind));
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[1].role, Role::Model);
            assert_eq!(messages[1].content, APOLOGY_MESSAGE);
            assert!(messages[1].is_error);
            assert!(!controller.is_loading());
        }
    }

    #[tokio::test]
    async fn user_message_is_visible_before_the_gateway_settles() {
        let (release, gateway) = GatedGateway::new();
        let controller = ChatController::new(gateway);

        let turn = controller.submit("Daraz par kaise bechun?");
        tokio::pin!(turn);
        assert!(futures::poll!(&mut turn).is_pending());

        let messages = controller.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(controller.is_loading());

        release.send(Ok("Pehle seller account banayein.".to_string())).unwrap();
        assert!(matches!(turn.await, SubmitOutcome::Replied { .. }));
        assert_eq!(controller.messages().len(), 2);
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn submit_while_awaiting_is_dropped() {
        let (release, gateway) = GatedGateway::new();
        let controller = ChatController::new(gateway);

        let first = controller.submit("pehla");
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());
        let before = controller.snapshot();

        assert_eq!(
            controller.submit("doosra").await,
            SubmitOutcome::Rejected(SubmitRejection::AwaitingResponse)
        );
        assert_eq!(controller.snapshot(), before);

        release.send(Ok("theek hai".to_string())).unwrap();
        first.await;
        let contents = controller
            .messages()
            .into_iter()
            .map(|message| message.content)
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["pehla", "theek hai"]);
    }

    #[tokio::test]
    async fn reply_after_reset_lands_in_the_new_conversation() {
        let (release, gateway) = GatedGateway::new();
        let controller = ChatController::new(gateway);

        let turn = controller.submit("purana sawal");
        tokio::pin!(turn);
        assert!(futures::poll!(&mut turn).is_pending());

        controller.reset();
        assert!(controller.messages().is_empty());
        assert!(controller.is_loading());

        release.send(Ok("purana jawab".to_string())).unwrap();
        turn.await;

        let messages = controller.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Model);
        assert_eq!(messages[0].content, "purana jawab");
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn dropping_an_in_flight_submit_settles_as_failure() {
        let (_release, gateway) = GatedGateway::new();
        let controller = ChatController::new(gateway);

        {
            let turn = controller.submit("adhoora");
            tokio::pin!(turn);
            assert!(futures::poll!(&mut turn).is_pending());
            assert!(controller.is_loading());
        }

        let messages = controller.messages();
        assert!(!controller.is_loading());
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_error);
        assert_eq!(messages[1].content, APOLOGY_MESSAGE);
    }

    #[tokio::test]
    async fn submit_input_sends_and_clears_the_draft() {
        let gateway = StubGateway::replying("zaroor");
        let controller = ChatController::new(gateway.clone());

        controller.set_input("WhatsApp marketing kaise karoon?");
        controller.submit_input().await;

        assert_eq!(controller.input(), "");
        assert_eq!(gateway.calls()[0].1, "WhatsApp marketing kaise karoon?");

        controller.set_input("adhoori baat");
        controller.reset();
        assert_eq!(controller.input(), "");
        assert!(controller.messages().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_loading_and_settled_snapshots() {
        let (release, gateway) = GatedGateway::new();
        let controller = ChatController::new(gateway);
        let mut updates = controller.subscribe();

        let turn = controller.submit("salam");
        tokio::pin!(turn);
        assert!(futures::poll!(&mut turn).is_pending());

        assert!(updates.has_changed().unwrap());
        let loading = updates.borrow_and_update().clone();
        assert!(loading.is_loading);
        assert_eq!(loading.messages.len(), 1);

        release.send(Ok("walaikum salam".to_string())).unwrap();
        turn.await;

        let settled = updates.borrow_and_update().clone();
        assert!(!settled.is_loading);
        assert_eq!(settled.messages.len(), 2);
    }
}
