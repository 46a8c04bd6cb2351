use askama::Template;
use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, Response},
    routing::{get, post},
};
use chrono::Utc;
use std::sync::Arc;

use super::{Task, TaskForm, TaskService, TaskSettings, WORDING};
use crate::backend::Backend;
use crate::record::multipart::read_submission;
use crate::record::pages::{
    ConfirmDeleteTemplate, PageError, list_redirect, remote_failure_status, render_alert,
    render_page, submit_failure_status,
};
use crate::record::{
    DeleteGuard, ListQuery, ListState, Notice, Wording, display_date, display_or_dash,
    displayable_image,
};

const LIST_HREF: &str = "/tasks";

#[derive(Clone)]
pub struct TaskState {
    pub backend: Arc<dyn Backend>,
    pub settings: TaskSettings,
    pub date_format: String,
    pub deletes: DeleteGuard,
}

impl TaskState {
    fn service(&self) -> TaskService<'_> {
        TaskService::new(self.backend.as_ref(), &self.settings)
    }
}

#[derive(Debug)]
struct TaskRow {
    id: String,
    image_url: Option<String>,
    title: String,
    detail: String,
    is_completed: bool,
    created_at: String,
    update_at: String,
    deleting: bool,
}

impl TaskRow {
    fn new(task: Task, date_format: &str, deletes: &DeleteGuard) -> Self {
        Self {
            image_url: displayable_image(task.image_url.as_deref()),
            title: display_or_dash(task.title),
            detail: display_or_dash(task.detail),
            is_completed: task.is_completed,
            created_at: display_date(task.created_at.as_deref(), date_format),
            update_at: display_date(task.update_at.as_deref(), date_format),
            deleting: deletes.is_deleting(&task.id),
            id: task.id,
        }
    }
}

#[derive(Template)]
#[template(path = "tasks/list.html")]
struct TasksTemplate {
    wording: &'static Wording,
    notice: Option<&'static str>,
    error: Option<String>,
    rows: Vec<TaskRow>,
}

impl TasksTemplate {
    fn new(notice: Option<Notice>, tasks: ListState<TaskRow>) -> Self {
        let error = tasks.error().map(str::to_string);
        let rows = tasks.into_rows();
        Self {
            wording: &WORDING,
            notice: notice.map(|notice| WORDING.notice(notice)),
            error,
            rows,
        }
    }
}

#[derive(Template)]
#[template(path = "tasks/form.html")]
struct TaskFormTemplate {
    wording: &'static Wording,
    subtitle: &'static str,
    heading: &'static str,
    submit_label: &'static str,
    action: String,
    editing: bool,
    form: TaskForm,
    error: Option<&'static str>,
}

impl TaskFormTemplate {
    fn create(form: TaskForm, error: Option<&'static str>) -> Self {
        Self {
            wording: &WORDING,
            subtitle: WORDING.create_subtitle,
            heading: WORDING.create_heading,
            submit_label: WORDING.submit_create,
            action: LIST_HREF.to_string(),
            editing: false,
            form,
            error,
        }
    }

    fn edit(id: &str, form: TaskForm, error: Option<&'static str>) -> Self {
        Self {
            wording: &WORDING,
            subtitle: WORDING.edit_subtitle,
            heading: WORDING.edit_heading,
            submit_label: WORDING.submit_update,
            action: format!("{}/{}", LIST_HREF, id),
            editing: true,
            form,
            error,
        }
    }
}

#[tracing::instrument(skip(state))]
async fn tasks_handler(
    State(state): State<Arc<TaskState>>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, PageError> {
    let tasks = ListState::from_result(state.service().get_all_tasks().await)
        .map(|task| TaskRow::new(task, &state.date_format, &state.deletes));
    let template = TasksTemplate::new(query.notice, tasks);
    template.render().map(Html).map_err(PageError::from)
}

#[tracing::instrument]
async fn new_task_handler() -> Result<Html<String>, PageError> {
    let template = TaskFormTemplate::create(TaskForm::default(), None);
    template.render().map(Html).map_err(PageError::from)
}

#[tracing::instrument(skip(state, multipart))]
async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let submission = read_submission(multipart).await?;
    let form = TaskForm::from_submission(&submission);

    match state
        .service()
        .create_task(&form, submission.image, Utc::now())
        .await
    {
        Ok(()) => Ok(list_redirect(LIST_HREF, Notice::Created)),
        Err(err) => {
            let message = WORDING.submit_error(&err, false);
            Ok(render_page(
                &TaskFormTemplate::create(form, Some(message)),
                submit_failure_status(&err),
            )?)
        }
    }
}

#[tracing::instrument(skip(state))]
async fn edit_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    match state.service().get_task_by_id(&id).await {
        Ok(task) => {
            let template = TaskFormTemplate::edit(&id, TaskForm::from_task(&task), None);
            Ok(render_page(&template, StatusCode::OK)?)
        }
        Err(err) => {
            tracing::error!("Failed to load task {}: {}", id, err);
            render_alert(
                &WORDING,
                WORDING.not_found.to_string(),
                LIST_HREF,
                remote_failure_status(&err),
            )
        }
    }
}

#[tracing::instrument(skip(state, multipart))]
async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let submission = read_submission(multipart).await?;
    let form = TaskForm::from_submission(&submission);

    match state
        .service()
        .update_task_by_id(&id, &form, submission.image, Utc::now())
        .await
    {
        Ok(()) => Ok(list_redirect(LIST_HREF, Notice::Updated)),
        Err(err) => {
            let message = WORDING.submit_error(&err, true);
            Ok(render_page(
                &TaskFormTemplate::edit(&id, form, Some(message)),
                submit_failure_status(&err),
            )?)
        }
    }
}

#[tracing::instrument]
async fn confirm_delete_task_handler(Path(id): Path<String>) -> Result<Html<String>, PageError> {
    let template = ConfirmDeleteTemplate::new(
        &WORDING,
        format!("{}/{}/delete", LIST_HREF, id),
        LIST_HREF.to_string(),
    );
    template.render().map(Html).map_err(PageError::from)
}

#[tracing::instrument(skip(state))]
async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let Some(_ticket) = state.deletes.begin(&id) else {
        return render_alert(
            &WORDING,
            WORDING.deleting.to_string(),
            LIST_HREF,
            StatusCode::CONFLICT,
        );
    };

    match state.service().delete_task_by_id(&id).await {
        Ok(()) => Ok(list_redirect(LIST_HREF, Notice::Deleted)),
        Err(err) => render_alert(
            &WORDING,
            WORDING.delete_error(&err),
            LIST_HREF,
            remote_failure_status(&err),
        ),
    }
}

/// Creates and returns the task router with all task-related routes.
pub fn create_task_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route(LIST_HREF, get(tasks_handler).post(create_task_handler))
        .route("/tasks/new", get(new_task_handler))
        .route("/tasks/{id}", post(update_task_handler))
        .route("/tasks/{id}/edit", get(edit_task_handler))
        .route(
            "/tasks/{id}/delete",
            get(confirm_delete_task_handler).post(delete_task_handler),
        )
        .with_state(state)
}
