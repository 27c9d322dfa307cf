//! Evaluation Presenter
//!
//! Fetches the grade for a finished session. Reaching this view without a
//! session id sends the user back to the start.

use crate::flow::{EvaluationHandoff, Route};
use crate::models::{DetailStatus, EvaluationResult, FileRefs, SessionId};
use crate::resource::Resource;
use crate::service::TutorService;
use tracing::{info, instrument, warn};

pub const EVALUATION_FAILED: &str = "Failed to load evaluation";

#[derive(Debug)]
pub struct EvaluationPresenter {
    session_id: Option<SessionId>,
    file_refs: FileRefs,
    result: Resource<EvaluationResult>,
}

impl EvaluationPresenter {
    pub fn new(handoff: EvaluationHandoff) -> Self {
        Self {
            session_id: handoff.session_id,
            file_refs: handoff.file_refs,
            result: Resource::Idle,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn file_refs(&self) -> &FileRefs {
        &self.file_refs
    }

    pub fn result(&self) -> &Resource<EvaluationResult> {
        &self.result
    }

    /// Loads the evaluation. Returns a redirect when there is no session to grade.
    ///
    /// After a failure, calling this again retries.
    #[instrument(skip_all)]
    pub async fn fetch(&mut self, service: &dyn TutorService) -> Option<Route> {
        let Some(session_id) = &self.session_id else {
            warn!("No session to evaluate; returning to start");
            return Some(Route::Welcome);
        };
        if self.result.ready().is_some() {
            return None;
        }

        self.result = Resource::Loading;
        let result = service.evaluate(session_id).await;
        match &result {
            Ok(evaluation) => info!(%session_id, grade = %evaluation.grade, "Evaluation received"),
            Err(e) => warn!(%session_id, error = %e, "Failed to fetch evaluation"),
        }
        self.result = Resource::from_result(result, EVALUATION_FAILED);
        None
    }

    /// One `(point, status)` row per detail, in the order the service sent them.
    pub fn rows(&self) -> Vec<(&str, DetailStatus)> {
        self.result
            .ready()
            .map(|evaluation| {
                evaluation
                    .details
                    .iter()
                    .map(|detail| (detail.point.as_str(), detail.status))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Starts over with a new upload.
    pub fn finish(self) -> Route {
        Route::Welcome
    }
}
