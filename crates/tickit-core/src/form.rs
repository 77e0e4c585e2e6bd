//! New-task form: the client-side gate in front of `create`.

use tickit_shared::{DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS, Task, TaskCreate};
use tracing::{debug, instrument};

use crate::client::TaskService;
use crate::error::{ClientError, ValidationError};
use crate::page::TasksPage;

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong(len));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let len = description.chars().count();
    if len > DESCRIPTION_MAX_CHARS {
        return Err(ValidationError::DescriptionTooLong(len));
    }
    Ok(())
}

#[derive(Debug)]
pub enum Submission {
    Created(Task),
    Invalid(ValidationError),
    Failed(ClientError),
}

impl Submission {
    pub fn is_created(&self) -> bool {
        matches!(self, Submission::Created(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    title: String,
    description: String,
    error: Option<String>,
}

impl TaskForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Last submission error, shown next to the form.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn title_counter(&self) -> (usize, usize) {
        (self.title.chars().count(), TITLE_MAX_CHARS)
    }

    pub fn description_counter(&self) -> (usize, usize) {
        (self.description.chars().count(), DESCRIPTION_MAX_CHARS)
    }

    pub fn validate(&self) -> Result<TaskCreate, ValidationError> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        Ok(TaskCreate {
            title: self.title.clone(),
            description: Some(self.description.clone()),
        })
    }

    /// Validates, then creates through the page. Inputs are cleared only
    /// when the task was created.
    #[instrument(skip_all)]
    pub async fn submit<S: TaskService>(&mut self, page: &mut TasksPage<S>) -> Submission {
        let create = match self.validate() {
            Ok(create) => create,
            Err(err) => {
                debug!(error = %err, "form rejected input");
                self.error = Some(err.to_string());
                return Submission::Invalid(err);
            }
        };

        match page.create(create).await {
            Ok(task) => {
                self.title.clear();
                self.description.clear();
                self.error = None;
                Submission::Created(task)
            }
            Err(err) => {
                self.error = Some(format!("Failed to create task: {err}"));
                Submission::Failed(err)
            }
        }
    }
}
