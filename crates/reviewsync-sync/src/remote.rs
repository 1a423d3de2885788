use std::sync::Arc;
use std::time::Duration;

use reviewsync_core::{Classifier, ContentFields, Inspection, Outcome, RawResponse};

use crate::SyncError;
use crate::pace::Sleeper;
use crate::transport::{ApiRequest, Transport};

/// Shared handles every stage needs: the transport, the classifier, the
/// content field table and the clock.
#[derive(Clone)]
pub struct Remote {
    transport: Arc<dyn Transport>,
    classifier: Arc<Classifier>,
    content: Arc<ContentFields>,
    sleeper: Arc<dyn Sleeper>,
}

impl Remote {
    /// Uses the default classifier table.
    pub fn new(transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>) -> Result<Self, SyncError> {
        Ok(Self::with_classifier(transport, Classifier::new()?, sleeper))
    }

    pub fn with_classifier(
        transport: Arc<dyn Transport>,
        classifier: Classifier,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            classifier: Arc::new(classifier),
            content: Arc::new(ContentFields::default()),
            sleeper,
        }
    }

    pub fn with_content_fields(mut self, content: ContentFields) -> Self {
        self.content = Arc::new(content);
        self
    }

    pub fn content_fields(&self) -> &ContentFields {
        &self.content
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<RawResponse, SyncError> {
        self.transport.send(request).await
    }

    /// Send and classify in one step.
    pub async fn call(&self, request: &ApiRequest, inspection: Inspection) -> Result<Outcome, SyncError> {
        let response = self.send(request).await?;
        Ok(self.classify(&response, inspection))
    }

    pub fn classify(&self, response: &RawResponse, inspection: Inspection) -> Outcome {
        self.classifier.classify(response, inspection)
    }

    pub async fn pause(&self, duration: Duration) {
        self.sleeper.sleep(duration).await;
    }
}
