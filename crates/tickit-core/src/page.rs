//! Tasks page controller.
//!
//! Holds the in-memory task list for one user and keeps it in step with the
//! server: a fetch replaces the list wholesale, each mutation patches the
//! single affected entry once the server has confirmed it.

use tickit_shared::{StatusFilter, Task, TaskCreate, TaskId, TaskPatch};
use tracing::{debug, info, instrument, warn};

use crate::client::TaskService;
use crate::error::{ClientError, ClientResult, ValidationError};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    SignIn,
}

/// Transient, non-fatal message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A list request in flight. Only the ticket with the latest generation is
/// allowed to land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub filter: StatusFilter,
    user_id: String,
}

impl FetchTicket {
    pub async fn run<S: TaskService>(&self, service: &S) -> ClientResult<Vec<Task>> {
        service.list(&self.user_id, self.filter).await
    }
}

#[derive(Debug)]
pub struct TasksPage<S> {
    service: S,
    session: Session,
    tasks: Vec<Task>,
    filter: StatusFilter,
    loading: bool,
    generation: u64,
    notices: Vec<Notice>,
    fetch_error: Option<ClientError>,
}

impl<S: TaskService> TasksPage<S> {
    pub fn new(service: S, session: Session) -> Self {
        Self {
            service,
            session,
            tasks: Vec::new(),
            filter: StatusFilter::default(),
            loading: false,
            generation: 0,
            notices: Vec::new(),
            fetch_error: None,
        }
    }

    pub fn with_filter(mut self, filter: StatusFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.user_id()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Why the latest list request failed, if it did. The task list still
    /// holds whatever was loaded before.
    pub fn fetch_error(&self) -> Option<&ClientError> {
        self.fetch_error.as_ref()
    }

    pub fn take_fetch_error(&mut self) -> Option<ClientError> {
        self.fetch_error.take()
    }

    fn require_user(&self) -> ClientResult<String> {
        if !self.session.is_authenticated() {
            return Err(ClientError::Unauthenticated);
        }
        self.session
            .user_id()
            .map(str::to_string)
            .ok_or(ClientError::Unauthenticated)
    }

    /// Starts a list request for the current filter. Returns `None` when
    /// there is no session; the caller must send the user to sign-in.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        let user_id = self.require_user().ok()?;
        self.generation += 1;
        self.loading = true;
        debug!(generation = self.generation, filter = %self.filter, "fetch started");
        Some(FetchTicket {
            generation: self.generation,
            filter: self.filter,
            user_id,
        })
    }

    /// Applies a list response if it belongs to the latest request.
    /// Returns whether the response was applied.
    pub fn finish_fetch(&mut self, ticket: &FetchTicket, result: ClientResult<Vec<Task>>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                stale = ticket.generation,
                latest = self.generation,
                "dropping stale list response"
            );
            return false;
        }

        self.loading = false;
        match result {
            Ok(tasks) => {
                info!(count = tasks.len(), filter = %ticket.filter, "task list loaded");
                self.tasks = tasks;
                self.fetch_error = None;
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to load tasks");
                self.notices
                    .push(Notice::new(format!("Failed to load tasks: {err}")));
                self.fetch_error = Some(err);
                false
            }
        }
    }

    #[instrument(skip(self), fields(filter = %self.filter))]
    pub async fn refresh(&mut self) -> Navigation {
        let Some(ticket) = self.begin_fetch() else {
            info!("no session; redirecting to sign-in");
            return Navigation::SignIn;
        };
        let result = ticket.run(&self.service).await;
        self.finish_fetch(&ticket, result);
        Navigation::Stay
    }

    pub async fn mount(&mut self) -> Navigation {
        self.refresh().await
    }

    pub async fn set_filter(&mut self, filter: StatusFilter) -> Navigation {
        self.filter = filter;
        self.refresh().await
    }

    #[instrument(skip(self, create))]
    pub async fn create(&mut self, create: TaskCreate) -> ClientResult<Task> {
        let user_id = self.require_user()?;
        let task = self.service.create(&user_id, &create).await?;
        self.tasks.retain(|t| t.id != task.id);
        self.tasks.insert(0, task.clone());
        Ok(task)
    }

    /// Flips completion. Failures leave the list alone and become a notice.
    #[instrument(skip(self))]
    pub async fn toggle(&mut self, id: TaskId) -> Option<Task> {
        let result = match self.require_user() {
            Ok(user_id) => self.service.toggle_complete(&user_id, id).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(task) => {
                self.replace(task.clone());
                Some(task)
            }
            Err(err) => {
                warn!(error = %err, "toggle failed");
                self.notices
                    .push(Notice::new(format!("Failed to update task: {err}")));
                None
            }
        }
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&mut self, id: TaskId, patch: TaskPatch) -> ClientResult<Task> {
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }
        let user_id = self.require_user()?;
        let task = self.service.update(&user_id, id, &patch).await?;
        self.replace(task.clone());
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: TaskId) -> ClientResult<()> {
        let user_id = self.require_user()?;
        self.service.delete(&user_id, id).await?;
        self.tasks.retain(|t| t.id != id);
        Ok(())
    }

    fn replace(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => debug!(id = task.id, "mutated task is not in the current list"),
        }
    }
}
