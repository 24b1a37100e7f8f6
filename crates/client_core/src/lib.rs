use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ArgumentId, SideFilter, TopicId, VoteDirection},
    error::ApiError,
    protocol::{
        ArgumentView, Comment, CreateArgumentRequest, CreateArgumentResponse,
        CreateCommentRequest, CreateCommentResponse, CreateTopicRequest, CreateTopicResponse,
        MessageResponse, SummaryResponse, TopicDetail, TopicListItem, ValidatePropositionRequest,
        ValidationResult, ValidityVerdict, VerifyAllReport, VoteResponse,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub mod error;
pub mod votes;
pub mod workflow;

pub use error::ClientError;
pub use votes::{VoteError, VoteLedger, VoteTally};
pub use workflow::{
    ArgumentBundle, ArgumentRejection, CommitReceipt, CommitReport, DraftArgument,
    PropositionWorkflow, SubmitOutcome, WorkflowError, WorkflowPhase, WorkflowState,
    MAX_VALIDATION_ATTEMPTS,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Source of the bearer token attached to backend calls.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
    /// Drops the local session; called when the backend answers 401.
    async fn sign_out(&self);
}

pub struct AnonymousSession;

#[async_trait]
impl SessionProvider for AnonymousSession {
    async fn access_token(&self) -> Option<String> {
        None
    }

    async fn sign_out(&self) {}
}

#[derive(Default)]
pub struct StaticSession {
    token: RwLock<Option<String>>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub async fn is_signed_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn replace(&self, token: Option<String>) {
        *self.token.write().await = token;
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn sign_out(&self) {
        self.token.write().await.take();
    }
}

/// Backend operations the proposition workflow depends on.
#[async_trait]
pub trait DebateBackend: Send + Sync {
    async fn validate_proposition(&self, proposition: &str)
        -> Result<ValidationResult, ClientError>;
    async fn create_topic(
        &self,
        request: &CreateTopicRequest,
    ) -> Result<CreateTopicResponse, ClientError>;
    async fn create_argument(
        &self,
        topic_id: TopicId,
        request: &CreateArgumentRequest,
    ) -> Result<CreateArgumentResponse, ClientError>;
}

#[async_trait]
pub trait VoteBackend: Send + Sync {
    async fn vote(
        &self,
        argument_id: ArgumentId,
        direction: VoteDirection,
    ) -> Result<VoteResponse, ClientError>;
}

pub struct MissingDebateBackend;

#[async_trait]
impl DebateBackend for MissingDebateBackend {
    async fn validate_proposition(
        &self,
        _proposition: &str,
    ) -> Result<ValidationResult, ClientError> {
        Err(ClientError::Unavailable(
            "proposition validation is unavailable".into(),
        ))
    }

    async fn create_topic(
        &self,
        _request: &CreateTopicRequest,
    ) -> Result<CreateTopicResponse, ClientError> {
        Err(ClientError::Unavailable("topic creation is unavailable".into()))
    }

    async fn create_argument(
        &self,
        topic_id: TopicId,
        _request: &CreateArgumentRequest,
    ) -> Result<CreateArgumentResponse, ClientError> {
        Err(ClientError::Unavailable(format!(
            "argument creation is unavailable for topic {topic_id}"
        )))
    }
}

/// HTTP client for the debate backend.
pub struct DebateClient {
    http: Client,
    base_url: Url,
    session: Arc<dyn SessionProvider>,
}

impl DebateClient {
    pub fn new(base_url: &str, session: Arc<dyn SessionProvider>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, session, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        session: Arc<dyn SessionProvider>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url.trim())?,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn list_topics(&self) -> Result<Vec<TopicListItem>, ClientError> {
        let url = self.endpoint("/api/topics")?;
        self.send(self.http.get(url)).await
    }

    /// Loads a topic. The backend may verify arguments and build the summary
    /// on first load, so this call can be slow.
    pub async fn get_topic(&self, topic_id: TopicId) -> Result<TopicDetail, ClientError> {
        let url = self.endpoint(&format!("/api/topics/{topic_id}"))?;
        self.send(self.http.get(url)).await
    }

    pub async fn list_arguments(
        &self,
        topic_id: TopicId,
        side: Option<SideFilter>,
    ) -> Result<Vec<ArgumentView>, ClientError> {
        let url = self.endpoint(&format!("/api/topics/{topic_id}/arguments"))?;
        self.send(with_side(self.http.get(url), side)).await
    }

    pub async fn arguments_by_validity(
        &self,
        topic_id: TopicId,
        side: Option<SideFilter>,
    ) -> Result<Vec<ArgumentView>, ClientError> {
        let url = self.endpoint(&format!("/api/topics/{topic_id}/arguments/verified"))?;
        self.send(with_side(self.http.get(url), side)).await
    }

    pub async fn generate_summary(&self, topic_id: TopicId) -> Result<SummaryResponse, ClientError> {
        let url = self.endpoint(&format!("/api/topics/{topic_id}/generate-summary"))?;
        self.send(self.http.post(url)).await
    }

    pub async fn verify_argument(
        &self,
        argument_id: ArgumentId,
    ) -> Result<ValidityVerdict, ClientError> {
        let url = self.endpoint(&format!("/api/arguments/{argument_id}/verify"))?;
        self.send(self.http.post(url)).await
    }

    pub async fn verify_all(&self, topic_id: TopicId) -> Result<VerifyAllReport, ClientError> {
        let url = self.endpoint(&format!("/api/topics/{topic_id}/verify-all"))?;
        self.send(self.http.post(url)).await
    }

    pub async fn list_comments(&self, argument_id: ArgumentId) -> Result<Vec<Comment>, ClientError> {
        let url = self.endpoint(&format!("/api/arguments/{argument_id}/comments"))?;
        self.send(self.http.get(url)).await
    }

    pub async fn add_comment(
        &self,
        argument_id: ArgumentId,
        comment: &str,
    ) -> Result<CreateCommentResponse, ClientError> {
        let url = self.endpoint(&format!("/api/arguments/{argument_id}/comment"))?;
        let body = CreateCommentRequest {
            comment: comment.to_string(),
        };
        self.send(self.http.post(url).json(&body)).await
    }

    /// Tells the backend about the logout, then clears the local session
    /// whether or not the backend call succeeded.
    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        let url = self.endpoint("/api/auth/logout")?;
        let result = self.send(self.http.post(url)).await;
        if let Err(err) = &result {
            warn!("auth: backend logout failed, clearing local session anyway: {err}");
        }
        self.session.sign_out().await;
        result
    }

    pub async fn delete_account(&self) -> Result<MessageResponse, ClientError> {
        let url = self.endpoint("/api/auth/account")?;
        let response: MessageResponse = self.send(self.http.delete(url)).await?;
        self.session.sign_out().await;
        info!("auth: account deleted and local session cleared");
        Ok(response)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let builder = match self.session.access_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let request = builder.build()?;
        debug!("http: {} {}", request.method(), request.url());
        let response = self.http.execute(request).await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!("http: failed to read error body status={status}: {err}");
                String::new()
            }
        };
        let err = ApiError::from_response_body(status.as_u16(), &body);
        if status == StatusCode::UNAUTHORIZED {
            warn!("auth: backend rejected session, clearing local session");
            self.session.sign_out().await;
        }
        Err(err.into())
    }
}

fn with_side(builder: RequestBuilder, side: Option<SideFilter>) -> RequestBuilder {
    match side {
        Some(side) => builder.query(&[("side", side.as_str())]),
        None => builder,
    }
}

#[async_trait]
impl DebateBackend for DebateClient {
    async fn validate_proposition(
        &self,
        proposition: &str,
    ) -> Result<ValidationResult, ClientError> {
        let url = self.endpoint("/api/topics/validate-proposition")?;
        let body = ValidatePropositionRequest {
            proposition: proposition.to_string(),
        };
        self.send(self.http.post(url).json(&body)).await
    }

    async fn create_topic(
        &self,
        request: &CreateTopicRequest,
    ) -> Result<CreateTopicResponse, ClientError> {
        let url = self.endpoint("/api/topics")?;
        self.send(self.http.post(url).json(request)).await
    }

    async fn create_argument(
        &self,
        topic_id: TopicId,
        request: &CreateArgumentRequest,
    ) -> Result<CreateArgumentResponse, ClientError> {
        let url = self.endpoint(&format!("/api/topics/{topic_id}/arguments"))?;
        self.send(self.http.post(url).json(request)).await
    }
}

#[async_trait]
impl VoteBackend for DebateClient {
    async fn vote(
        &self,
        argument_id: ArgumentId,
        direction: VoteDirection,
    ) -> Result<VoteResponse, ClientError> {
        let action = match direction {
            VoteDirection::Upvote => "upvote",
            VoteDirection::Downvote => "downvote",
        };
        let url = self.endpoint(&format!("/api/arguments/{argument_id}/{action}"))?;
        self.send(self.http.post(url)).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
