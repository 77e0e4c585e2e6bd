use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow, bail};
use tickit_shared::{AuthResponse, SignInRequest, SignUpRequest, TaskId};
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::client::{AuthClient, HttpTaskClient, TaskService};
use crate::config::Config;
use crate::form::{Submission, TaskForm};
use crate::item::TaskItem;
use crate::page::{Navigation, TasksPage};
use crate::render::Renderer;
use crate::session::SessionStore;

const SIGN_IN_HINT: &str = "not signed in; run `tickit signin --email <address>` first";
const SESSION_REJECTED: &str =
    "session rejected; run `tickit signin --email <address>` again";

#[instrument(skip_all)]
pub async fn dispatch(
    cfg: &Config,
    store: &SessionStore,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let api_url = cfg.api_url();
    let timeout = cfg.request_timeout()?;
    debug!(api_url = %api_url, timeout_secs = timeout.as_secs(), "dispatching");

    match command {
        Command::Signup {
            email,
            name,
            password,
        } => {
            let password = resolve_password(password)?;
            let auth = AuthClient::new(&api_url, timeout)?;
            let (session, response) = auth
                .sign_up(&SignUpRequest {
                    email,
                    password,
                    name,
                })
                .await
                .context("registration failed")?;
            store.save(&session)?;
            println!("Account created. {}", signed_in_line(&response));
        }
        Command::Signin { email, password } => {
            let password = resolve_password(password)?;
            let auth = AuthClient::new(&api_url, timeout)?;
            let (session, response) = auth
                .sign_in(&SignInRequest { email, password })
                .await
                .context("sign-in failed")?;
            store.save(&session)?;
            println!("{}", signed_in_line(&response));
        }
        Command::Signout => {
            let was_signed_in = store.load()?.is_authenticated();
            store.clear()?;
            if was_signed_in {
                println!("Logged out.");
            } else {
                println!("Already signed out.");
            }
        }
        Command::Whoami => {
            let session = store.load()?;
            match session.user_id().filter(|_| session.is_authenticated()) {
                Some(user_id) => println!("{user_id}"),
                None => println!("not signed in"),
            }
        }
        Command::Health => {
            let client = HttpTaskClient::new(&api_url, timeout, store.load()?)?;
            let health = client.health().await.context("backend unreachable")?;
            println!("{} {}", client.base_url(), health.status);
        }
        Command::List { status } => {
            let mut page = open_page(cfg, store)?.with_filter(status);
            if page.mount().await == Navigation::SignIn {
                bail!(SIGN_IN_HINT);
            }
            if let Some(err) = page.take_fetch_error() {
                let context = if err.is_auth() {
                    SESSION_REJECTED
                } else {
                    "failed to load tasks"
                };
                return Err(anyhow::Error::new(err).context(context));
            }
            renderer.print_notices(&page.take_notices())?;
            renderer.print_task_list(page.filter(), page.tasks())?;
        }
        Command::Add { title, description } => {
            let mut page = signed_in_page(cfg, store)?;
            let mut form = TaskForm::new();
            form.set_title(title);
            form.set_description(description);

            match form.submit(&mut page).await {
                Submission::Created(task) => {
                    println!("Task created!");
                    renderer.print_task_info(&task)?;
                }
                Submission::Invalid(err) => bail!("{err}"),
                Submission::Failed(err) => {
                    return Err(anyhow::Error::new(err).context("failed to create task"));
                }
            }
        }
        Command::Show { id } => {
            let page = signed_in_page(cfg, store)?;
            let task = fetch_task(&page, id).await?;
            renderer.print_task_info(&task)?;
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            if title.is_none() && description.is_none() {
                bail!("nothing to change; pass --title and/or --description");
            }
            let mut page = signed_in_page(cfg, store)?;
            let mut item = TaskItem::new(fetch_task(&page, id).await?);
            item.begin_edit()?;
            if let Some(draft) = item.draft_mut() {
                if let Some(title) = title {
                    draft.title = title;
                }
                if let Some(description) = description {
                    draft.description = description;
                }
            }
            let changed = item
                .save(&mut page)
                .await
                .context("failed to update task")?;
            if changed {
                println!("Task updated.");
                renderer.print_task_info(item.task())?;
            } else {
                println!("No changes.");
            }
        }
        Command::Toggle { id } => {
            let mut page = signed_in_page(cfg, store)?;
            match page.toggle(id).await {
                Some(task) => {
                    let state = if task.completed { "completed" } else { "pending" };
                    println!("Task {} is now {state}.", task.id);
                }
                None => {
                    renderer.print_notices(&page.take_notices())?;
                    bail!("task {id} was not updated");
                }
            }
        }
        Command::Delete { id, yes } => {
            let mut page = signed_in_page(cfg, store)?;
            let mut item = TaskItem::new(fetch_task(&page, id).await?);
            item.request_delete()?;

            if !yes && !confirm(&format!("Delete task {id} \"{}\"?", item.task().title))? {
                item.cancel();
                println!("Cancelled.");
                return Ok(());
            }

            item.confirm_delete(&mut page)
                .await
                .context("failed to delete task")?;
            println!("Task {id} deleted.");
        }
    }

    Ok(())
}

fn open_page(cfg: &Config, store: &SessionStore) -> anyhow::Result<TasksPage<HttpTaskClient>> {
    let session = store.load()?;
    let client = HttpTaskClient::new(&cfg.api_url(), cfg.request_timeout()?, session.clone())?;
    Ok(TasksPage::new(client, session))
}

fn signed_in_page(
    cfg: &Config,
    store: &SessionStore,
) -> anyhow::Result<TasksPage<HttpTaskClient>> {
    let page = open_page(cfg, store)?;
    if !page.is_signed_in() {
        bail!(SIGN_IN_HINT);
    }
    Ok(page)
}

async fn fetch_task<S: TaskService>(
    page: &TasksPage<S>,
    id: TaskId,
) -> anyhow::Result<tickit_shared::Task> {
    let user_id = page.user_id().ok_or_else(|| anyhow!(SIGN_IN_HINT))?;
    page.service().get(user_id, id).await.map_err(|err| {
        if err.is_not_found() {
            anyhow!("task {id} not found")
        } else if err.is_auth() {
            anyhow::Error::new(err).context(SESSION_REJECTED)
        } else {
            anyhow::Error::new(err).context(format!("failed to load task {id}"))
        }
    })
}

fn signed_in_line(response: &AuthResponse) -> String {
    let who = response
        .user
        .name
        .as_deref()
        .or(response.user.email.as_deref())
        .unwrap_or(response.user.id.as_str());
    info!(user_id = %response.user.id, "session stored");
    format!("Signed in as {who}.")
}

fn resolve_password(password: Option<String>) -> anyhow::Result<String> {
    match password {
        Some(password) => Ok(password),
        None => rpassword::prompt_password("Password: ").context("failed to read password"),
    }
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let mut err = io::stderr().lock();
    write!(err, "{question} [y/N] ")?;
    err.flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
