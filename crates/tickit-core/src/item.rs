//! Per-task view/edit state.
//!
//! ```text
//! Viewing --begin_edit--> Editing --save ok / cancel--> Viewing
//! Viewing --request_delete--> ConfirmingDelete --cancel--> Viewing
//!                             ConfirmingDelete --confirm ok--> Deleted
//! ```

use thiserror::Error;
use tickit_shared::{Task, TaskPatch};
use tracing::{debug, instrument};

use crate::client::TaskService;
use crate::error::ClientError;
use crate::form::{validate_description, validate_title};
use crate::page::TasksPage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
}

impl Draft {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
        }
    }

    /// Only the fields that differ from `task`.
    fn patch_against(&self, task: &Task) -> TaskPatch {
        TaskPatch {
            title: (self.title != task.title).then(|| self.title.clone()),
            description: (self.description != task.description)
                .then(|| self.description.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemMode {
    Viewing,
    Editing(Draft),
    ConfirmingDelete,
    Deleted,
}

impl ItemMode {
    fn name(&self) -> &'static str {
        match self {
            ItemMode::Viewing => "viewing",
            ItemMode::Editing(_) => "editing",
            ItemMode::ConfirmingDelete => "confirming delete",
            ItemMode::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("cannot {action} while {mode}")]
    Unavailable {
        action: &'static str,
        mode: &'static str,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone)]
pub struct TaskItem {
    task: Task,
    mode: ItemMode,
}

impl TaskItem {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            mode: ItemMode::Viewing,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn mode(&self) -> &ItemMode {
        &self.mode
    }

    pub fn draft(&self) -> Option<&Draft> {
        match &self.mode {
            ItemMode::Editing(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut Draft> {
        match &mut self.mode {
            ItemMode::Editing(draft) => Some(draft),
            _ => None,
        }
    }

    fn require_viewing(&self, action: &'static str) -> Result<(), ItemError> {
        if self.mode == ItemMode::Viewing {
            Ok(())
        } else {
            Err(ItemError::Unavailable {
                action,
                mode: self.mode.name(),
            })
        }
    }

    /// Takes a fresh snapshot from the page. A draft in progress is kept.
    pub fn sync(&mut self, task: Task) {
        if task.id == self.task.id {
            self.task = task;
        }
    }

    pub fn begin_edit(&mut self) -> Result<(), ItemError> {
        self.require_viewing("edit")?;
        self.mode = ItemMode::Editing(Draft::from_task(&self.task));
        Ok(())
    }

    /// Leaves editing (dropping the draft) or backs out of a pending delete.
    pub fn cancel(&mut self) {
        if matches!(self.mode, ItemMode::Editing(_) | ItemMode::ConfirmingDelete) {
            self.mode = ItemMode::Viewing;
        }
    }

    /// Saves the draft and returns whether anything was sent. On any
    /// failure the item stays in `Editing` with the draft untouched.
    #[instrument(skip_all, fields(id = self.task.id))]
    pub async fn save<S: TaskService>(
        &mut self,
        page: &mut TasksPage<S>,
    ) -> Result<bool, ItemError> {
        let ItemMode::Editing(draft) = &self.mode else {
            return Err(ItemError::Unavailable {
                action: "save",
                mode: self.mode.name(),
            });
        };

        validate_title(&draft.title).map_err(ClientError::from)?;
        validate_description(&draft.description).map_err(ClientError::from)?;

        let patch = draft.patch_against(&self.task);
        if patch.is_empty() {
            debug!("draft unchanged; nothing to save");
            self.mode = ItemMode::Viewing;
            return Ok(false);
        }

        let updated = page.update(self.task.id, patch).await?;
        self.task = updated;
        self.mode = ItemMode::Viewing;
        Ok(true)
    }

    /// Returns whether the toggle went through. A failed toggle is reported
    /// by the page as a notice.
    #[instrument(skip_all, fields(id = self.task.id))]
    pub async fn toggle<S: TaskService>(
        &mut self,
        page: &mut TasksPage<S>,
    ) -> Result<bool, ItemError> {
        self.require_viewing("toggle")?;
        match page.toggle(self.task.id).await {
            Some(task) => {
                self.task = task;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn request_delete(&mut self) -> Result<(), ItemError> {
        self.require_viewing("delete")?;
        self.mode = ItemMode::ConfirmingDelete;
        Ok(())
    }

    #[instrument(skip_all, fields(id = self.task.id))]
    pub async fn confirm_delete<S: TaskService>(
        &mut self,
        page: &mut TasksPage<S>,
    ) -> Result<(), ItemError> {
        if self.mode != ItemMode::ConfirmingDelete {
            return Err(ItemError::Unavailable {
                action: "confirm delete",
                mode: self.mode.name(),
            });
        }

        match page.delete(self.task.id).await {
            Ok(()) => {
                self.mode = ItemMode::Deleted;
                Ok(())
            }
            Err(err) => {
                self.mode = ItemMode::Viewing;
                Err(err.into())
            }
        }
    }
}
