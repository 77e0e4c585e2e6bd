//! REST client for the per-user task collection and the auth endpoints.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tickit_shared::{
    AuthResponse, HealthStatus, PASSWORD_MIN_CHARS, SignInRequest, SignUpRequest, StatusFilter,
    Task, TaskCreate, TaskId, TaskPatch,
};
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, ClientResult, ValidationError};
use crate::session::Session;

const USER_AGENT: &str = concat!("tickit/", env!("CARGO_PKG_VERSION"));

/// The task collection contract, one operation per REST verb.
///
/// Implemented over HTTP by [`HttpTaskClient`]; the page controller only
/// depends on this trait.
#[allow(async_fn_in_trait)]
pub trait TaskService {
    async fn list(&self, user_id: &str, filter: StatusFilter) -> ClientResult<Vec<Task>>;

    async fn get(&self, user_id: &str, task_id: TaskId) -> ClientResult<Task>;

    async fn create(&self, user_id: &str, create: &TaskCreate) -> ClientResult<Task>;

    async fn update(
        &self,
        user_id: &str,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> ClientResult<Task>;

    async fn toggle_complete(&self, user_id: &str, task_id: TaskId) -> ClientResult<Task>;

    async fn delete(&self, user_id: &str, task_id: TaskId) -> ClientResult<()>;
}

#[derive(Debug, Clone)]
struct Transport {
    http: reqwest::Client,
    base_url: Url,
}

impl Transport {
    fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed building HTTP client: {e}")))?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send().await.map_err(|err| {
            warn!(error = %err, "request did not complete");
            ClientError::from(err)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, url = %response.url(), "request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ClientError::request(status, server_message(&body));
        warn!(status = %status, error = %err, "request rejected by server");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = self.send(builder).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: Url,
        token: Option<&str>,
        body: &B,
    ) -> ClientResult<T> {
        self.send_json(self.request(Method::POST, url, token).json(body))
            .await
    }
}

/// Pulls a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}` and
/// `{"message": "..."}`.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            let joined = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
        _ => {}
    }

    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// [`TaskService`] over HTTP. The session is fixed at construction; a new
/// session means a new client.
#[derive(Debug, Clone)]
pub struct HttpTaskClient {
    transport: Transport,
    session: Session,
}

impl HttpTaskClient {
    pub fn new(base_url: &str, timeout: Duration, session: Session) -> ClientResult<Self> {
        Ok(Self {
            transport: Transport::new(base_url, timeout)?,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.transport.base_url
    }

    fn tasks_url(&self, user_id: &str) -> ClientResult<Url> {
        self.transport.endpoint(&["api", user_id, "tasks"])
    }

    fn task_url(&self, user_id: &str, task_id: TaskId) -> ClientResult<Url> {
        let id = task_id.to_string();
        self.transport.endpoint(&["api", user_id, "tasks", &id])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.transport.request(method, url, self.session.token())
    }

    #[instrument(skip(self))]
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        let url = self.transport.endpoint(&["health"])?;
        self.transport
            .send_json(self.request(Method::GET, url))
            .await
    }
}

impl TaskService for HttpTaskClient {
    #[instrument(skip(self))]
    async fn list(&self, user_id: &str, filter: StatusFilter) -> ClientResult<Vec<Task>> {
        let mut url = self.tasks_url(user_id)?;
        url.query_pairs_mut()
            .append_pair("status_filter", filter.as_str());

        let tasks: Vec<Task> = self
            .transport
            .send_json(self.request(Method::GET, url))
            .await?;
        debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    #[instrument(skip(self))]
    async fn get(&self, user_id: &str, task_id: TaskId) -> ClientResult<Task> {
        let url = self.task_url(user_id, task_id)?;
        self.transport
            .send_json(self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self, create), fields(title_len = create.title.chars().count()))]
    async fn create(&self, user_id: &str, create: &TaskCreate) -> ClientResult<Task> {
        let url = self.tasks_url(user_id)?;
        let task: Task = self
            .transport
            .send_json(self.request(Method::POST, url).json(create))
            .await?;
        debug!(id = task.id, "created task");
        Ok(task)
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        user_id: &str,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> ClientResult<Task> {
        let url = self.task_url(user_id, task_id)?;
        self.transport
            .send_json(self.request(Method::PUT, url).json(patch))
            .await
    }

    #[instrument(skip(self))]
    async fn toggle_complete(&self, user_id: &str, task_id: TaskId) -> ClientResult<Task> {
        let id = task_id.to_string();
        let url = self
            .transport
            .endpoint(&["api", user_id, "tasks", &id, "complete"])?;
        let task: Task = self
            .transport
            .send_json(self.request(Method::PATCH, url))
            .await?;
        debug!(id = task.id, completed = task.completed, "toggled task");
        Ok(task)
    }

    #[instrument(skip(self))]
    async fn delete(&self, user_id: &str, task_id: TaskId) -> ClientResult<()> {
        let url = self.task_url(user_id, task_id)?;
        self.transport
            .send(self.request(Method::DELETE, url))
            .await?;
        debug!("deleted task");
        Ok(())
    }
}

/// Client for the auth collaborator. Each successful call yields the
/// [`Session`] to persist; nothing is stored here.
#[derive(Debug, Clone)]
pub struct AuthClient {
    transport: Transport,
}

impl AuthClient {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            transport: Transport::new(base_url, timeout)?,
        })
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_up(&self, request: &SignUpRequest) -> ClientResult<(Session, AuthResponse)> {
        if request.password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(ValidationError::PasswordTooShort.into());
        }
        let url = self.transport.endpoint(&["api", "auth", "sign-up"])?;
        let auth: AuthResponse = self.transport.post_json(url, None, request).await?;
        debug!(user_id = %auth.user.id, "signed up");
        Ok((Session::from_auth(&auth), auth))
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_in(&self, request: &SignInRequest) -> ClientResult<(Session, AuthResponse)> {
        let url = self.transport.endpoint(&["api", "auth", "sign-in"])?;
        let auth: AuthResponse = self.transport.post_json(url, None, request).await?;
        debug!(user_id = %auth.user.id, "signed in");
        Ok((Session::from_auth(&auth), auth))
    }
}
