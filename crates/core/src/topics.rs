//! Topic Selector
//!
//! Shows the topics the service proposes for the uploaded files and starts a
//! session on the one the user picks, or on a topic the user types.

use crate::error::{ClientError, Result};
use crate::flow::Route;
use crate::models::{FileRefs, SessionHandle};
use crate::resource::Resource;
use crate::service::TutorService;
use tracing::{info, instrument, warn};

pub const TOPICS_FAILED: &str = "Failed to load topics";

#[derive(Debug)]
pub struct TopicSelector {
    file_refs: FileRefs,
    topics: Resource<Vec<String>>,
}

impl TopicSelector {
    pub fn new(file_refs: FileRefs) -> Self {
        Self {
            file_refs,
            topics: Resource::Idle,
        }
    }

    pub fn file_refs(&self) -> &FileRefs {
        &self.file_refs
    }

    pub fn topics(&self) -> &Resource<Vec<String>> {
        &self.topics
    }

    /// Loads the proposed topics, keeping the server's order as-is.
    ///
    /// Without file refs there is nothing to ask about and the list is empty.
    #[instrument(skip_all, fields(files = self.file_refs.as_slice().len()))]
    pub async fn load_topics(&mut self, service: &dyn TutorService) {
        if self.file_refs.is_empty() {
            self.topics = Resource::Ready(Vec::new());
            return;
        }
        self.topics = Resource::Loading;
        let result = service.list_topics(&self.file_refs).await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to fetch topics");
        }
        self.topics = Resource::from_result(result, TOPICS_FAILED);
    }

    /// Starts a session on one of the proposed topics.
    pub async fn select_topic(&self, service: &dyn TutorService, topic: &str) -> Result<Route> {
        self.start(service, topic).await
    }

    /// Starts a session on a topic the user typed.
    pub async fn select_custom_topic(
        &self,
        service: &dyn TutorService,
        text: &str,
    ) -> Result<Route> {
        self.start(service, text).await
    }

    /// Opens the vault for the same files.
    pub fn open_vault(&self) -> Route {
        Route::Vault {
            file_refs: self.file_refs.clone(),
            selected: self.file_refs.first().map(str::to_string),
        }
    }

    async fn start(&self, service: &dyn TutorService, topic: &str) -> Result<Route> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ClientError::precondition("Topic must not be empty"));
        }

        let session_id = service
            .start_session(topic, &self.file_refs)
            .await
            .inspect_err(|e| warn!(%topic, error = %e, "Failed to start session"))?;
        info!(%session_id, %topic, "Session started");

        Ok(Route::Chat(SessionHandle {
            session_id,
            topic: topic.to_string(),
            file_refs: self.file_refs.clone(),
        }))
    }
}
