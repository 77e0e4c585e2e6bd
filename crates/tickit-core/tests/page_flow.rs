use std::cell::{Cell, RefCell};

use chrono::Utc;
use reqwest::StatusCode;
use tickit_core::client::TaskService;
use tickit_core::error::{ClientError, ClientResult, ValidationError};
use tickit_core::form::{Submission, TaskForm};
use tickit_core::item::{ItemError, ItemMode, TaskItem};
use tickit_core::page::{Navigation, TasksPage};
use tickit_core::session::Session;
use tickit_shared::{StatusFilter, Task, TaskCreate, TaskId, TaskPatch};

/// In-memory stand-in for the REST backend.
#[derive(Default)]
struct FakeService {
    tasks: RefCell<Vec<Task>>,
    next_id: Cell<TaskId>,
    calls: Cell<usize>,
    failing: Cell<Option<StatusCode>>,
}

impl FakeService {
    fn calls(&self) -> usize {
        self.calls.get()
    }

    fn fail_with(&self, status: StatusCode) {
        self.failing.set(Some(status));
    }

    fn recover(&self) {
        self.failing.set(None);
    }

    fn enter(&self) -> ClientResult<()> {
        self.calls.set(self.calls.get() + 1);
        match self.failing.get() {
            Some(status) => Err(ClientError::request(status, Some("boom".to_string()))),
            None => Ok(()),
        }
    }

    fn not_found(id: TaskId) -> ClientError {
        ClientError::request(
            StatusCode::NOT_FOUND,
            Some(format!("Task with id {id} not found")),
        )
    }

    fn with_task<T>(
        &self,
        user_id: &str,
        id: TaskId,
        f: impl FnOnce(&mut Task) -> T,
    ) -> ClientResult<T> {
        let mut tasks = self.tasks.borrow_mut();
        tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
            .map(f)
            .ok_or_else(|| Self::not_found(id))
    }
}

impl TaskService for FakeService {
    async fn list(&self, user_id: &str, filter: StatusFilter) -> ClientResult<Vec<Task>> {
        self.enter()?;
        Ok(self
            .tasks
            .borrow()
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id && filter.admits(t))
            .cloned()
            .collect())
    }

    async fn get(&self, user_id: &str, task_id: TaskId) -> ClientResult<Task> {
        self.enter()?;
        self.with_task(user_id, task_id, |t| t.clone())
    }

    async fn create(&self, user_id: &str, create: &TaskCreate) -> ClientResult<Task> {
        self.enter()?;
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let now = Utc::now();
        let task = Task {
            id,
            user_id: user_id.to_string(),
            title: create.title.clone(),
            description: create.description.clone().unwrap_or_default(),
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.tasks.borrow_mut().push(task.clone());
        Ok(task)
    }

    async fn update(&self, user_id: &str, task_id: TaskId, patch: &TaskPatch) -> ClientResult<Task> {
        self.enter()?;
        self.with_task(user_id, task_id, |t| {
            if let Some(title) = &patch.title {
                t.title = title.clone();
            }
            if let Some(description) = &patch.description {
                t.description = description.clone();
            }
            t.updated_at = Utc::now();
            t.clone()
        })
    }

    async fn toggle_complete(&self, user_id: &str, task_id: TaskId) -> ClientResult<Task> {
        self.enter()?;
        self.with_task(user_id, task_id, |t| {
            t.completed = !t.completed;
            t.updated_at = Utc::now();
            t.clone()
        })
    }

    async fn delete(&self, user_id: &str, task_id: TaskId) -> ClientResult<()> {
        self.enter()?;
        let mut tasks = self.tasks.borrow_mut();
        let before = tasks.len();
        tasks.retain(|t| !(t.id == task_id && t.user_id == user_id));
        if tasks.len() == before {
            return Err(Self::not_found(task_id));
        }
        Ok(())
    }
}

fn signed_in_page() -> TasksPage<FakeService> {
    TasksPage::new(FakeService::default(), Session::new("tok", "u1"))
}

async fn add(page: &mut TasksPage<FakeService>, title: &str) -> Task {
    let mut form = TaskForm::new();
    form.set_title(title);
    match form.submit(page).await {
        Submission::Created(task) => task,
        other => panic!("expected task to be created, got {other:?}"),
    }
}

#[tokio::test]
async fn buy_milk_lifecycle() {
    let mut page = signed_in_page();
    assert_eq!(page.mount().await, Navigation::Stay);
    assert!(page.tasks().is_empty());
    assert!(!page.is_loading());

    let mut form = TaskForm::new();
    form.set_title("Buy milk");
    let submission = form.submit(&mut page).await;
    assert!(submission.is_created());
    assert_eq!(form.title(), "");
    assert_eq!(form.error(), None);

    let created = page.tasks()[0].clone();
    assert_eq!(created.title, "Buy milk");
    assert!(!created.completed);

    let toggled = page.toggle(created.id).await.expect("first toggle");
    assert!(toggled.completed);
    assert!(page.task(created.id).unwrap().completed);

    let toggled = page.toggle(created.id).await.expect("second toggle");
    assert!(!toggled.completed);
    assert!(!page.task(created.id).unwrap().completed);

    page.delete(created.id).await.expect("delete");
    assert!(page.task(created.id).is_none());

    page.refresh().await;
    assert!(page.task(created.id).is_none());
    assert!(page.notices().is_empty());
}

#[tokio::test]
async fn created_task_is_listed_with_submitted_fields() {
    let mut page = signed_in_page();
    page.mount().await;

    let mut form = TaskForm::new();
    form.set_title("Call the plumber");
    form.set_description("kitchen sink\nbefore Friday");
    let Submission::Created(created) = form.submit(&mut page).await else {
        panic!("expected task to be created");
    };

    page.refresh().await;
    let listed = page.task(created.id).expect("listed after refresh");
    assert_eq!(listed.title, "Call the plumber");
    assert_eq!(listed.description, "kitchen sink\nbefore Friday");
    assert!(!listed.completed);
    assert_eq!(listed.user_id, "u1");
    assert_eq!(listed, &created);
}

#[tokio::test]
async fn buy_milk_moves_between_filters() {
    let mut page = signed_in_page();
    page.mount().await;
    let milk = add(&mut page, "Buy milk").await;
    assert_eq!(milk.id, 1);

    page.set_filter(StatusFilter::Pending).await;
    assert!(page.task(milk.id).is_some());

    page.toggle(milk.id).await.expect("toggle");
    page.refresh().await;
    assert!(page.task(milk.id).is_none());

    page.set_filter(StatusFilter::Completed).await;
    assert!(page.task(milk.id).unwrap().completed);

    page.set_filter(StatusFilter::Pending).await;
    assert!(page.task(milk.id).is_none());
}

#[tokio::test]
async fn deleted_task_is_absent_under_every_filter() {
    let mut page = signed_in_page();
    page.mount().await;
    let done = add(&mut page, "done then gone").await;
    let open = add(&mut page, "open then gone").await;
    let kept = add(&mut page, "kept").await;
    page.toggle(done.id).await.expect("toggle");

    page.delete(done.id).await.expect("delete done");
    page.delete(open.id).await.expect("delete open");

    for filter in StatusFilter::ALL {
        page.set_filter(filter).await;
        assert!(page.take_fetch_error().is_none());
        assert!(page.task(done.id).is_none(), "{filter}");
        assert!(page.task(open.id).is_none(), "{filter}");
    }
    page.set_filter(StatusFilter::Pending).await;
    assert!(page.task(kept.id).is_some());
}

#[tokio::test]
async fn new_tasks_are_prepended() {
    let mut page = signed_in_page();
    page.mount().await;
    add(&mut page, "first").await;
    add(&mut page, "second").await;

    let titles: Vec<&str> = page.tasks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["second", "first"]);
}

#[tokio::test]
async fn pending_and_completed_views_partition_all() {
    let mut page = signed_in_page();
    page.mount().await;
    let a = add(&mut page, "a").await;
    add(&mut page, "b").await;
    add(&mut page, "c").await;
    page.toggle(a.id).await.expect("toggle");

    page.set_filter(StatusFilter::Pending).await;
    let pending: Vec<TaskId> = page.tasks().iter().map(|t| t.id).collect();
    assert!(page.tasks().iter().all(|t| !t.completed));

    page.set_filter(StatusFilter::Completed).await;
    let completed: Vec<TaskId> = page.tasks().iter().map(|t| t.id).collect();
    assert_eq!(completed, [a.id]);

    page.set_filter(StatusFilter::All).await;
    let mut all: Vec<TaskId> = page.tasks().iter().map(|t| t.id).collect();
    let mut union: Vec<TaskId> = pending.into_iter().chain(completed).collect();
    all.sort_unstable();
    union.sort_unstable();
    assert_eq!(all, union);
    assert_eq!(page.filter(), StatusFilter::All);
}

#[tokio::test]
async fn out_of_range_titles_never_reach_the_service() {
    let mut page = signed_in_page();

    for title in [String::new(), "   ".to_string(), "x".repeat(201)] {
        let mut form = TaskForm::new();
        form.set_title(title.clone());
        let submission = form.submit(&mut page).await;
        assert!(matches!(submission, Submission::Invalid(_)));
        assert_eq!(form.title(), title);
        assert!(form.error().is_some());
    }

    let mut form = TaskForm::new();
    form.set_title("fine");
    form.set_description("d".repeat(1001));
    assert!(matches!(
        form.submit(&mut page).await,
        Submission::Invalid(ValidationError::DescriptionTooLong(1001))
    ));

    assert_eq!(page.service().calls(), 0);
    assert!(page.tasks().is_empty());
}

#[tokio::test]
async fn boundary_lengths_are_accepted() {
    let mut page = signed_in_page();
    let mut form = TaskForm::new();
    form.set_title("t".repeat(200));
    form.set_description("d".repeat(1000));
    assert!(form.submit(&mut page).await.is_created());
    assert_eq!(page.service().calls(), 1);
}

#[tokio::test]
async fn stale_list_response_is_dropped() {
    let mut page = signed_in_page();
    page.mount().await;
    let done = add(&mut page, "done").await;
    add(&mut page, "open").await;
    page.toggle(done.id).await.expect("toggle");

    let mut page = page.with_filter(StatusFilter::Pending);
    let first = page.begin_fetch().expect("session");
    let mut page = page.with_filter(StatusFilter::Completed);
    let second = page.begin_fetch().expect("session");
    assert!(second.generation > first.generation);

    let second_result = second.run(page.service()).await;
    let first_result = first.run(page.service()).await;

    assert!(page.finish_fetch(&second, second_result));
    assert!(!page.finish_fetch(&first, first_result));

    let ids: Vec<TaskId> = page.tasks().iter().map(|t| t.id).collect();
    assert_eq!(ids, [done.id]);
    assert!(!page.is_loading());
}

#[tokio::test]
async fn missing_session_redirects_without_requests() {
    for session in [
        Session::anonymous(),
        serde_json::from_str::<Session>(r#"{"token":"tok"}"#).unwrap(),
        serde_json::from_str::<Session>(r#"{"userId":"u1"}"#).unwrap(),
    ] {
        let mut page = TasksPage::new(FakeService::default(), session);
        assert_eq!(page.mount().await, Navigation::SignIn);
        assert!(page.begin_fetch().is_none());

        let err = page
            .create(TaskCreate {
                title: "x".to_string(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(page.service().calls(), 0);
    }
}

#[tokio::test]
async fn failed_list_keeps_previous_tasks_and_adds_notice() {
    let mut page = signed_in_page();
    page.mount().await;
    add(&mut page, "keep me").await;

    page.service().fail_with(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(page.refresh().await, Navigation::Stay);

    assert_eq!(page.tasks().len(), 1);
    assert!(!page.is_loading());
    let notices = page.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.starts_with("Failed to load tasks"));
    assert!(page.notices().is_empty());
    assert_eq!(
        page.fetch_error().and_then(ClientError::status),
        Some(StatusCode::SERVICE_UNAVAILABLE)
    );

    page.service().recover();
    page.refresh().await;
    assert!(page.fetch_error().is_none());
}

#[tokio::test]
async fn failed_toggle_leaves_list_unchanged() {
    let mut page = signed_in_page();
    page.mount().await;
    let task = add(&mut page, "stubborn").await;
    let before = page.tasks().to_vec();

    page.service().fail_with(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(page.toggle(task.id).await.is_none());

    assert_eq!(page.tasks(), before.as_slice());
    assert_eq!(page.notices().len(), 1);
    assert!(page.notices()[0].message.contains("boom"));
}

#[tokio::test]
async fn failed_create_keeps_form_input() {
    let mut page = signed_in_page();
    page.mount().await;
    page.service().fail_with(StatusCode::INTERNAL_SERVER_ERROR);

    let mut form = TaskForm::new();
    form.set_title("Buy milk");
    form.set_description("2 litres");
    let submission = form.submit(&mut page).await;

    assert!(matches!(submission, Submission::Failed(_)));
    assert_eq!(form.title(), "Buy milk");
    assert_eq!(form.description(), "2 litres");
    assert!(form.error().unwrap().contains("boom"));
    assert!(page.tasks().is_empty());

    page.service().recover();
    assert!(form.submit(&mut page).await.is_created());
    assert_eq!(form.title(), "");
}

#[tokio::test]
async fn item_edit_saves_and_updates_page() {
    let mut page = signed_in_page();
    page.mount().await;
    let task = add(&mut page, "Water plants").await;

    let mut item = TaskItem::new(task.clone());
    item.begin_edit().unwrap();
    item.draft_mut().unwrap().title = "Water all plants".to_string();
    assert!(item.save(&mut page).await.expect("save"));

    assert_eq!(item.mode(), &ItemMode::Viewing);
    assert_eq!(item.task().title, "Water all plants");
    assert_eq!(page.task(task.id).unwrap().title, "Water all plants");
}

#[tokio::test]
async fn unchanged_draft_saves_without_request() {
    let mut page = signed_in_page();
    let task = add(&mut page, "Same").await;
    let calls = page.service().calls();

    let mut item = TaskItem::new(task);
    item.begin_edit().unwrap();
    assert!(!item.save(&mut page).await.expect("save"));

    assert_eq!(item.mode(), &ItemMode::Viewing);
    assert_eq!(page.service().calls(), calls);
}

#[tokio::test]
async fn invalid_or_failed_edit_stays_in_editing() {
    let mut page = signed_in_page();
    page.mount().await;
    let task = add(&mut page, "Original").await;
    let calls = page.service().calls();

    let mut item = TaskItem::new(task.clone());
    item.begin_edit().unwrap();
    item.draft_mut().unwrap().title = String::new();
    let err = item.save(&mut page).await.unwrap_err();
    assert!(matches!(
        err,
        ItemError::Client(ClientError::Validation(ValidationError::EmptyTitle))
    ));
    assert_eq!(page.service().calls(), calls);
    assert_eq!(item.draft().unwrap().title, "");

    item.draft_mut().unwrap().title = "Renamed".to_string();
    page.service().fail_with(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(item.save(&mut page).await.is_err());
    assert_eq!(item.draft().unwrap().title, "Renamed");
    assert_eq!(item.task().title, "Original");
    assert_eq!(page.task(task.id).unwrap().title, "Original");
}

#[tokio::test]
async fn empty_patch_is_rejected_locally() {
    let mut page = signed_in_page();
    let task = add(&mut page, "x").await;
    let calls = page.service().calls();

    let err = page.update(task.id, TaskPatch::default()).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::EmptyPatch)
    ));
    assert_eq!(page.service().calls(), calls);
}

#[tokio::test]
async fn item_delete_requires_confirmation() {
    let mut page = signed_in_page();
    page.mount().await;
    let task = add(&mut page, "Old note").await;
    let calls = page.service().calls();

    let mut item = TaskItem::new(task.clone());
    assert!(item.confirm_delete(&mut page).await.is_err());
    assert_eq!(page.service().calls(), calls);

    item.request_delete().unwrap();
    item.confirm_delete(&mut page).await.expect("delete");
    assert_eq!(item.mode(), &ItemMode::Deleted);
    assert!(page.task(task.id).is_none());
}

#[tokio::test]
async fn failed_delete_keeps_task() {
    let mut page = signed_in_page();
    page.mount().await;
    let task = add(&mut page, "Sticky").await;

    page.service().fail_with(StatusCode::INTERNAL_SERVER_ERROR);
    let mut item = TaskItem::new(task.clone());
    item.request_delete().unwrap();
    assert!(item.confirm_delete(&mut page).await.is_err());

    assert_eq!(item.mode(), &ItemMode::Viewing);
    assert!(page.task(task.id).is_some());
}

#[tokio::test]
async fn item_toggle_follows_page() {
    let mut page = signed_in_page();
    page.mount().await;
    let task = add(&mut page, "Flip").await;

    let mut item = TaskItem::new(task.clone());
    assert!(item.toggle(&mut page).await.expect("toggle"));
    assert!(item.task().completed);

    item.begin_edit().unwrap();
    assert!(matches!(
        item.toggle(&mut page).await,
        Err(ItemError::Unavailable { .. })
    ));
    item.cancel();

    page.service().fail_with(StatusCode::BAD_GATEWAY);
    assert!(!item.toggle(&mut page).await.expect("toggle"));
    assert!(item.task().completed);
    assert_eq!(page.notices().len(), 1);
}
