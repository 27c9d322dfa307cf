//! Session Workflow Controller
//!
//! Drives one teaching session: fetch the opening question, exchange
//! answers for questions until the service reports the session finished,
//! then either extend the session or hand it to evaluation.
//!
//! ```text
//! Uninitialized -> AwaitingFirstQuestion -> AwaitingAnswer <-> AwaitingResponse
//!                                                 ^                  |
//!                                                 |                  v
//!                                         ContinuingExtend <---- Finished --> evaluation
//! ```
//!
//! The service owns the session. The controller only keeps the id, the
//! visible transcript and the state above. At most one request is in flight:
//! every transition that issues one takes `&mut self`, and the split
//! [`SessionController::begin_answer`] / [`SessionController::complete_answer`]
//! pair refuses a second answer while the first is outstanding.

use crate::error::{ClientError, Result};
use crate::flow::{EvaluationHandoff, Route};
use crate::models::{Message, Role, SessionHandle, SessionId, TurnReply};
use crate::service::TutorService;
use tracing::{debug, info, instrument, warn};

/// The phrase the service puts in its finish notice.
pub const READINESS_MARKER: &str = "Ready for evaluation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    AwaitingFirstQuestion,
    AwaitingAnswer,
    AwaitingResponse,
    Finished,
    ContinuingExtend,
}

/// What a submission did to the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The input was blank; nothing was appended or sent.
    Ignored,
    /// The service asked another question.
    Question,
    /// The service ended the session.
    Finished,
}

/// An answer accepted by the controller and waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub session_id: SessionId,
    pub answer: String,
}

#[derive(Debug)]
pub struct SessionController {
    handle: SessionHandle,
    messages: Vec<Message>,
    state: SessionState,
    last_error: Option<ClientError>,
}

impl SessionController {
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            messages: Vec::new(),
            state: SessionState::Uninitialized,
            last_error: None,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn session_id(&self) -> &SessionId {
        &self.handle.session_id
    }

    pub fn topic(&self) -> &str {
        &self.handle.topic
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The failure of the most recent exchange, cleared by the next attempt.
    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// True once the service has reported the session finished.
    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    /// Whether the answer input should be enabled.
    pub fn can_submit(&self) -> bool {
        self.state == SessionState::AwaitingAnswer
    }

    /// True when the latest teacher message carries the readiness marker.
    ///
    /// Kept for services that only signal completion in text; the controller
    /// itself follows the structured `finished` flag.
    pub fn detect_finished(&self) -> bool {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Teacher)
            .is_some_and(|m| m.content.contains(READINESS_MARKER))
    }

    /// Fetches the opening question. Does nothing if the session already started.
    #[instrument(skip_all, fields(session_id = %self.handle.session_id))]
    pub async fn start(&mut self, service: &dyn TutorService) -> Result<()> {
        if !self.messages.is_empty() || self.state != SessionState::Uninitialized {
            debug!(state = ?self.state, "Session already started; not requesting again");
            return Ok(());
        }

        self.state = SessionState::AwaitingFirstQuestion;
        self.last_error = None;
        match service.first_question(&self.handle.session_id).await {
            Ok(reply) => {
                self.apply_reply(reply);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Uninitialized;
                Err(self.record_failure(e))
            }
        }
    }

    /// Accepts an answer and appends it to the transcript.
    ///
    /// Returns `Ok(None)` for blank input, which changes nothing. The returned
    /// request must be completed with [`Self::complete_answer`].
    pub fn begin_answer(&mut self, text: &str) -> Result<Option<TurnRequest>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if self.state != SessionState::AwaitingAnswer {
            return Err(ClientError::precondition(format!(
                "Cannot submit an answer while {:?}",
                self.state
            )));
        }

        self.messages.push(Message::user(text));
        self.state = SessionState::AwaitingResponse;
        self.last_error = None;
        Ok(Some(TurnRequest {
            session_id: self.handle.session_id.clone(),
            answer: text.to_string(),
        }))
    }

    /// Applies the service's answer to the request from [`Self::begin_answer`].
    ///
    /// On failure the pending answer is removed again, so the transcript is
    /// exactly as it was before the submission.
    pub fn complete_answer(&mut self, result: Result<TurnReply>) -> Result<SubmitOutcome> {
        if self.state != SessionState::AwaitingResponse {
            return Err(ClientError::precondition("No answer is awaiting a response"));
        }
        match result {
            Ok(reply) => Ok(self.apply_reply(reply)),
            Err(e) => {
                if self.messages.last().is_some_and(|m| m.role == Role::User) {
                    self.messages.pop();
                }
                self.state = SessionState::AwaitingAnswer;
                Err(self.record_failure(e))
            }
        }
    }

    /// Sends one answer and records the reply.
    #[instrument(skip_all, fields(session_id = %self.handle.session_id))]
    pub async fn submit_answer(
        &mut self,
        service: &dyn TutorService,
        text: &str,
    ) -> Result<SubmitOutcome> {
        let Some(request) = self.begin_answer(text)? else {
            return Ok(SubmitOutcome::Ignored);
        };
        let result = service
            .submit_answer(&request.session_id, &request.answer)
            .await;
        self.complete_answer(result)
    }

    /// Extends a finished session under the same id and fetches its next question.
    #[instrument(skip_all, fields(session_id = %self.handle.session_id))]
    pub async fn continue_session(&mut self, service: &dyn TutorService) -> Result<()> {
        if self.state != SessionState::Finished {
            return Err(ClientError::precondition(
                "Only a finished session can be continued",
            ));
        }

        self.state = SessionState::ContinuingExtend;
        self.last_error = None;
        let session_id = self.handle.session_id.clone();
        let result = match service.continue_session(&session_id).await {
            Ok(()) => service.first_question(&session_id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(TurnReply::Question(question)) => {
                info!("Session extended");
                self.messages.push(Message::teacher(question));
                self.state = SessionState::AwaitingAnswer;
                Ok(())
            }
            Ok(TurnReply::Finished { .. }) => {
                self.state = SessionState::Finished;
                Err(self.record_failure(ClientError::MalformedResponse(
                    "session still finished after continuation".to_string(),
                )))
            }
            Err(e) => {
                self.state = SessionState::Finished;
                Err(self.record_failure(e))
            }
        }
    }

    /// Ends the controller and hands the session to evaluation.
    ///
    /// Gives the controller back unchanged unless the session is finished.
    pub fn exit_to_evaluation(self) -> std::result::Result<Route, Self> {
        if self.state != SessionState::Finished {
            return Err(self);
        }
        info!(session_id = %self.handle.session_id, "Leaving session for evaluation");
        Ok(Route::Evaluate(EvaluationHandoff {
            session_id: Some(self.handle.session_id),
            file_refs: self.handle.file_refs,
        }))
    }

    fn apply_reply(&mut self, reply: TurnReply) -> SubmitOutcome {
        match reply {
            TurnReply::Question(question) => {
                if question.contains(READINESS_MARKER) {
                    warn!("Question contains the readiness marker but the session is not finished");
                }
                self.messages.push(Message::teacher(question));
                self.state = SessionState::AwaitingAnswer;
                SubmitOutcome::Question
            }
            TurnReply::Finished { message } => {
                if !message.contains(READINESS_MARKER) {
                    warn!("Finish notice does not contain the readiness marker");
                }
                info!(turns = self.messages.len(), "Session finished");
                self.messages.push(Message::teacher(message));
                self.state = SessionState::Finished;
                SubmitOutcome::Finished
            }
        }
    }

    fn record_failure(&mut self, error: ClientError) -> ClientError {
        warn!(error = %error, state = ?self.state, "Session exchange failed");
        self.last_error = Some(error.clone());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileRefs;
    use crate::service::MockTutorService;
    use mockall::Sequence;

    fn handle() -> SessionHandle {
        SessionHandle {
            session_id: SessionId::new("s1"),
            topic: "Photosynthesis".to_string(),
            file_refs: FileRefs::new(vec!["notes.txt".to_string()]),
        }
    }

    fn question(text: &str) -> TurnReply {
        TurnReply::Question(text.to_string())
    }

    fn finished() -> TurnReply {
        TurnReply::Finished {
            message: "Ready for evaluation. Great job!".to_string(),
        }
    }

    /// Teacher and user alternate, starting with the teacher. The only
    /// permitted teacher-after-teacher is the turn right after a finish notice.
    fn assert_alternates(messages: &[Message]) {
        assert_eq!(messages.first().map(|m| m.role), Some(Role::Teacher));
        for pair in messages.windows(2) {
            match (pair[0].role, pair[1].role) {
                (Role::User, Role::User) => panic!("two user turns in a row: {:?}", pair),
                (Role::Teacher, Role::Teacher) => assert!(
                    pair[0].content.contains(READINESS_MARKER),
                    "two teacher turns without a finish notice: {:?}",
                    pair
                ),
                _ => {}
            }
        }
    }

    async fn started(service: &MockTutorService) -> SessionController {
        let mut controller = SessionController::new(handle());
        controller.start(service).await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_start_appends_first_question() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .withf(|id| id.as_str() == "s1")
            .times(1)
            .returning(|_| Ok(question("Explain the light-dependent reactions.")));

        let controller = started(&service).await;

        assert_eq!(
            controller.messages(),
            &[Message::teacher("Explain the light-dependent reactions.")]
        );
        assert_eq!(controller.state(), SessionState::AwaitingAnswer);
        assert!(controller.can_submit());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .times(1)
            .returning(|_| Ok(question("Q1")));

        let mut controller = started(&service).await;
        controller.start(&service).await.unwrap();

        assert_eq!(controller.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_leaves_controller_retryable() {
        let mut service = MockTutorService::new();
        let mut seq = Sequence::new();
        service
            .expect_first_question()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ClientError::Transport("refused".to_string())));
        service
            .expect_first_question()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(question("Q1")));

        let mut controller = SessionController::new(handle());
        assert!(controller.start(&service).await.is_err());
        assert!(controller.messages().is_empty());
        assert_eq!(controller.state(), SessionState::Uninitialized);
        assert!(controller.last_error().is_some());

        controller.start(&service).await.unwrap();
        assert_eq!(controller.messages().len(), 1);
        assert!(controller.last_error().is_none());
    }

    #[tokio::test]
    async fn test_whitespace_answer_is_a_no_op() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .returning(|_| Ok(question("Q1")));
        service.expect_submit_answer().never();

        let mut controller = started(&service).await;
        for blank in ["", "   ", "\n\t "] {
            let outcome = controller.submit_answer(&service, blank).await.unwrap();
            assert_eq!(outcome, SubmitOutcome::Ignored);
        }
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.state(), SessionState::AwaitingAnswer);
    }

    #[tokio::test]
    async fn test_answer_is_sent_untrimmed_and_question_appended() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .returning(|_| Ok(question("Q1")));
        service
            .expect_submit_answer()
            .withf(|id, answer| id.as_str() == "s1" && answer == "  Chlorophyll absorbs light ")
            .times(1)
            .returning(|_, _| Ok(question("Q2")));

        let mut controller = started(&service).await;
        let outcome = controller
            .submit_answer(&service, "  Chlorophyll absorbs light ")
            .await
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::Question);
        assert_eq!(
            controller.messages(),
            &[
                Message::teacher("Q1"),
                Message::user("  Chlorophyll absorbs light "),
                Message::teacher("Q2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_finished_reply_ends_turn_loop() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .returning(|_| Ok(question("Q1")));
        service
            .expect_submit_answer()
            .times(1)
            .returning(|_, _| Ok(finished()));

        let mut controller = started(&service).await;
        let outcome = controller.submit_answer(&service, "answer").await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Finished);
        assert!(controller.is_finished());
        assert!(controller.detect_finished());
        assert!(!controller.can_submit());
        assert_eq!(controller.messages().len(), 3);

        let err = controller.submit_answer(&service, "more").await.unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
        assert_eq!(controller.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_answer_leaves_transcript_unchanged() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .returning(|_| Ok(question("Q1")));
        service
            .expect_submit_answer()
            .times(1)
            .returning(|_, _| Err(ClientError::Transport("timed out".to_string())));

        let mut controller = started(&service).await;
        let err = controller.submit_answer(&service, "answer").await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(controller.messages(), &[Message::teacher("Q1")]);
        assert_eq!(controller.state(), SessionState::AwaitingAnswer);
        assert_eq!(controller.last_error(), Some(&err));
    }

    #[tokio::test]
    async fn test_second_answer_is_refused_while_in_flight() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .returning(|_| Ok(question("Q1")));

        let mut controller = started(&service).await;
        let request = controller.begin_answer("first").unwrap().unwrap();
        assert_eq!(request.answer, "first");
        assert_eq!(controller.state(), SessionState::AwaitingResponse);

        let err = controller.begin_answer("second").unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
        assert_eq!(controller.messages().len(), 2);

        controller.complete_answer(Ok(question("Q2"))).unwrap();
        assert_eq!(controller.state(), SessionState::AwaitingAnswer);
    }

    #[tokio::test]
    async fn test_complete_without_pending_answer_is_rejected() {
        let mut controller = SessionController::new(handle());
        let err = controller.complete_answer(Ok(question("Q"))).unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
        assert!(controller.messages().is_empty());
    }

    #[test]
    fn test_detect_finished_requires_exact_marker() {
        let mut controller = SessionController::new(handle());
        assert!(!controller.detect_finished());

        for near_miss in [
            "ready for evaluation",
            "READY FOR EVALUATION",
            "Ready  for evaluation",
            "Ready for eval",
        ] {
            controller.messages = vec![Message::teacher(near_miss)];
            assert!(!controller.detect_finished(), "{} matched", near_miss);
        }

        controller.messages = vec![Message::teacher("Good job! Ready for evaluation?")];
        assert!(controller.detect_finished());
    }

    #[test]
    fn test_detect_finished_looks_at_latest_teacher_message() {
        let mut controller = SessionController::new(handle());
        controller.messages = vec![
            Message::teacher("Ready for evaluation."),
            Message::teacher("Now explain the Calvin cycle."),
            Message::user("Ready for evaluation"),
        ];
        assert!(!controller.detect_finished());
    }

    #[tokio::test]
    async fn test_continue_appends_one_question_and_keeps_history() {
        let mut service = MockTutorService::new();
        let mut seq = Sequence::new();
        service
            .expect_first_question()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(question("Q1")));
        service
            .expect_submit_answer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(finished()));
        service
            .expect_continue_session()
            .withf(|id| id.as_str() == "s1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        service
            .expect_first_question()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(question("Q4")));

        let mut controller = started(&service).await;
        controller.submit_answer(&service, "a1").await.unwrap();
        let before: Vec<Message> = controller.messages().to_vec();

        controller.continue_session(&service).await.unwrap();

        assert_eq!(controller.messages().len(), before.len() + 1);
        assert_eq!(&controller.messages()[..before.len()], before.as_slice());
        assert_eq!(controller.messages().last(), Some(&Message::teacher("Q4")));
        assert_eq!(controller.state(), SessionState::AwaitingAnswer);
        assert_eq!(controller.session_id().as_str(), "s1");
        assert_alternates(controller.messages());
    }

    #[tokio::test]
    async fn test_continue_requires_finished_session() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .returning(|_| Ok(question("Q1")));
        service.expect_continue_session().never();

        let mut controller = started(&service).await;
        let err = controller.continue_session(&service).await.unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_failed_continuation_stays_finished() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .times(1)
            .returning(|_| Ok(finished()));
        service.expect_continue_session().times(1).returning(|_| {
            Err(ClientError::Backend {
                status: 404,
                message: "Session not found".to_string(),
            })
        });

        let mut controller = started(&service).await;
        assert!(controller.is_finished());
        assert!(controller.continue_session(&service).await.is_err());
        assert!(controller.is_finished());
        assert_eq!(controller.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_continuation_still_finished_appends_nothing() {
        let mut service = MockTutorService::new();
        service
            .expect_first_question()
            .times(2)
            .returning(|_| Ok(finished()));
        service.expect_continue_session().returning(|_| Ok(()));

        let mut controller = started(&service).await;
        let err = controller.continue_session(&service).await.unwrap_err();

        assert!(matches!(err, ClientError::MalformedResponse(_)));
        assert_eq!(controller.messages().len(), 1);
        assert!(controller.is_finished());
    }

    #[tokio::test]
    async fn test_exit_to_evaluation_only_when_finished() {
        let mut service = MockTutorService::new();
        let mut seq = Sequence::new();
        service
            .expect_first_question()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(question("Q1")));
        service
            .expect_submit_answer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(finished()));

        let controller = started(&service).await;
        let mut controller = controller
            .exit_to_evaluation()
            .expect_err("an active session cannot be evaluated");
        assert_eq!(controller.messages().len(), 1);

        controller.submit_answer(&service, "done").await.unwrap();
        let route = controller.exit_to_evaluation().unwrap();
        assert_eq!(
            route,
            Route::Evaluate(EvaluationHandoff {
                session_id: Some(SessionId::new("s1")),
                file_refs: FileRefs::new(vec!["notes.txt".to_string()]),
            })
        );
    }

    #[tokio::test]
    async fn test_full_dialogue_alternates() {
        let mut service = MockTutorService::new();
        let mut seq = Sequence::new();
        service
            .expect_first_question()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(question("Explain the light-dependent reactions.")));
        service
            .expect_submit_answer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(question("Now explain the Calvin cycle.")));
        service
            .expect_submit_answer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ClientError::Transport("flaky".to_string())));
        service
            .expect_submit_answer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(finished()));

        let mut controller = started(&service).await;
        controller
            .submit_answer(&service, "Chlorophyll absorbs light...")
            .await
            .unwrap();
        assert!(controller
            .submit_answer(&service, "Carbon fixation...")
            .await
            .is_err());
        controller
            .submit_answer(&service, "Carbon fixation...")
            .await
            .unwrap();

        assert_eq!(controller.messages().len(), 5);
        assert!(controller.is_finished());
        assert_alternates(controller.messages());
    }
}
