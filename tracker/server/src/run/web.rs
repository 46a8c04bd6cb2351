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

use super::{Run, RunForm, RunService, RunSettings, WORDING};
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

const LIST_HREF: &str = "/runs";

#[derive(Clone)]
pub struct RunState {
    pub backend: Arc<dyn Backend>,
    pub settings: RunSettings,
    pub date_format: String,
    pub deletes: DeleteGuard,
}

impl RunState {
    fn service(&self) -> RunService<'_> {
        RunService::new(self.backend.as_ref(), &self.settings)
    }
}

/// One table row, already formatted for display.
#[derive(Debug)]
struct RunRow {
    id: String,
    image_url: Option<String>,
    run_date: String,
    run_distance: String,
    run_place: String,
    created_at: String,
    deleting: bool,
}

impl RunRow {
    fn new(run: Run, date_format: &str, deletes: &DeleteGuard) -> Self {
        Self {
            image_url: displayable_image(run.run_image_url.as_deref()),
            run_date: display_date(run.run_date.as_deref(), date_format),
            run_distance: display_or_dash(run.run_distance),
            run_place: display_or_dash(run.run_place),
            created_at: display_date(run.created_at.as_deref(), date_format),
            deleting: deletes.is_deleting(&run.id),
            id: run.id,
        }
    }
}

#[derive(Template)]
#[template(path = "runs/list.html")]
struct RunsTemplate {
    wording: &'static Wording,
    notice: Option<&'static str>,
    error: Option<String>,
    rows: Vec<RunRow>,
}

impl RunsTemplate {
    fn new(notice: Option<Notice>, runs: ListState<RunRow>) -> Self {
        let error = runs.error().map(str::to_string);
        let rows = runs.into_rows();
        Self {
            wording: &WORDING,
            notice: notice.map(|notice| WORDING.notice(notice)),
            error,
            rows,
        }
    }
}

#[derive(Template)]
#[template(path = "runs/form.html")]
struct RunFormTemplate {
    wording: &'static Wording,
    subtitle: &'static str,
    heading: &'static str,
    submit_label: &'static str,
    action: String,
    editing: bool,
    form: RunForm,
    error: Option<&'static str>,
}

impl RunFormTemplate {
    fn create(form: RunForm, error: Option<&'static str>) -> Self {
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

    fn edit(id: &str, form: RunForm, error: Option<&'static str>) -> Self {
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

/// Handler for GET /runs: fetches every run and renders the table.
#[tracing::instrument(skip(state))]
async fn runs_handler(
    State(state): State<Arc<RunState>>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, PageError> {
    let runs = ListState::from_result(state.service().get_all_runs().await)
        .map(|run| RunRow::new(run, &state.date_format, &state.deletes));
    let template = RunsTemplate::new(query.notice, runs);
    template.render().map(Html).map_err(PageError::from)
}

/// Handler for serving the add run form.
#[tracing::instrument]
async fn new_run_handler() -> Result<Html<String>, PageError> {
    let template = RunFormTemplate::create(RunForm::default(), None);
    template.render().map(Html).map_err(PageError::from)
}

/// Handler for creating a run from the multipart form.
#[tracing::instrument(skip(state, multipart))]
async fn create_run_handler(
    State(state): State<Arc<RunState>>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let submission = read_submission(multipart).await?;
    let form = RunForm::from_submission(&submission);

    match state
        .service()
        .create_run(&form, submission.image, Utc::now())
        .await
    {
        Ok(()) => Ok(list_redirect(LIST_HREF, Notice::Created)),
        Err(err) => {
            let message = WORDING.submit_error(&err, false);
            Ok(render_page(
                &RunFormTemplate::create(form, Some(message)),
                submit_failure_status(&err),
            )?)
        }
    }
}

/// Handler for serving the edit run form, pre-filled from the stored run.
#[tracing::instrument(skip(state))]
async fn edit_run_handler(
    State(state): State<Arc<RunState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    match state.service().get_run_by_id(&id).await {
        Ok(run) => {
            let template = RunFormTemplate::edit(&id, RunForm::from_run(&run), None);
            Ok(render_page(&template, StatusCode::OK)?)
        }
        Err(err) => {
            tracing::error!("Failed to load run {}: {}", id, err);
            render_alert(
                &WORDING,
                WORDING.not_found.to_string(),
                LIST_HREF,
                remote_failure_status(&err),
            )
        }
    }
}

/// Handler for updating a run from the multipart form.
#[tracing::instrument(skip(state, multipart))]
async fn update_run_handler(
    State(state): State<Arc<RunState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let submission = read_submission(multipart).await?;
    let form = RunForm::from_submission(&submission);

    match state
        .service()
        .update_run_by_id(&id, &form, submission.image, Utc::now())
        .await
    {
        Ok(()) => Ok(list_redirect(LIST_HREF, Notice::Updated)),
        Err(err) => {
            let message = WORDING.submit_error(&err, true);
            Ok(render_page(
                &RunFormTemplate::edit(&id, form, Some(message)),
                submit_failure_status(&err),
            )?)
        }
    }
}

/// Handler for GET /runs/{id}/delete: asks before deleting.
#[tracing::instrument]
async fn confirm_delete_run_handler(Path(id): Path<String>) -> Result<Html<String>, PageError> {
    let template = ConfirmDeleteTemplate::new(
        &WORDING,
        format!("{}/{}/delete", LIST_HREF, id),
        LIST_HREF.to_string(),
    );
    template.render().map(Html).map_err(PageError::from)
}

/// Handler for POST /runs/{id}/delete.
#[tracing::instrument(skip(state))]
async fn delete_run_handler(
    State(state): State<Arc<RunState>>,
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

    match state.service().delete_run_by_id(&id).await {
        Ok(()) => Ok(list_redirect(LIST_HREF, Notice::Deleted)),
        Err(err) => render_alert(
            &WORDING,
            WORDING.delete_error(&err),
            LIST_HREF,
            remote_failure_status(&err),
        ),
    }
}

/// Creates and returns the run router with all run-related routes.
pub fn create_run_router(state: Arc<RunState>) -> Router {
    Router::new()
        .route(LIST_HREF, get(runs_handler).post(create_run_handler))
        .route("/runs/new", get(new_run_handler))
        .route("/runs/{id}", post(update_run_handler))
        .route("/runs/{id}/edit", get(edit_run_handler))
        .route(
            "/runs/{id}/delete",
            get(confirm_delete_run_handler).post(delete_run_handler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(image: Option<&str>) -> Run {
        Run {
            id: "r1".to_string(),
            created_at: Some("2024-05-02T06:00:00+00:00".to_string()),
            run_date: Some("2024-05-01".to_string()),
            run_distance: Some(5.2),
            run_place: Some("Park".to_string()),
            run_image_url: image.map(str::to_string),
        }
    }

    #[test]
    fn can_format_row_values() {
        let row = RunRow::new(run(None), "%-m/%-d/%Y", &DeleteGuard::new());

        assert_eq!(row.run_date, "5/1/2024");
        assert_eq!(row.run_distance, "5.2");
        assert_eq!(row.run_place, "Park");
        assert_eq!(row.created_at, "5/2/2024");
        assert_eq!(row.image_url, None);
        assert!(!row.deleting);
    }

    #[test]
    fn can_show_dash_for_missing_values() {
        let row = RunRow::new(
            Run {
                run_distance: None,
                run_place: None,
                run_date: None,
                ..run(None)
            },
            "%Y",
            &DeleteGuard::new(),
        );

        assert_eq!(row.run_distance, "-");
        assert_eq!(row.run_place, "-");
        assert_eq!(row.run_date, "-");
    }

    #[test]
    fn can_mark_row_being_deleted() {
        let deletes = DeleteGuard::new();
        let _ticket = deletes.begin("r1");

        let row = RunRow::new(run(None), "%Y", &deletes);

        assert!(row.deleting);
    }

    #[test]
    fn can_render_table_with_no_image_marker() {
        let rows = vec![RunRow::new(run(None), "%Y-%m-%d", &DeleteGuard::new())];
        let html = RunsTemplate::new(None, ListState::Loaded(rows))
            .render()
            .unwrap();

        assert!(html.contains("2024-05-01"));
        assert!(html.contains("5.2"));
        assert!(html.contains("Park"));
        assert!(html.contains("ไม่มีรูป"));
        assert!(html.contains(r#"href="/runs/r1/edit""#));
        assert!(html.contains(r#"href="/runs/r1/delete""#));
    }

    #[test]
    fn can_render_image_for_valid_url() {
        let rows = vec![RunRow::new(
            run(Some("https://cdn.test/run.png")),
            "%Y",
            &DeleteGuard::new(),
        )];
        let html = RunsTemplate::new(None, ListState::Loaded(rows))
            .render()
            .unwrap();

        assert!(html.contains(r#"src="https://cdn.test/run.png""#));
        assert!(!html.contains("ไม่มีรูป"));
    }

    #[test]
    fn can_render_load_error_inline() {
        let html = RunsTemplate::new(None, ListState::Errored("connection refused".to_string()))
            .render()
            .unwrap();

        assert!(html.contains("เกิดข้อผิดพลาดในการโหลดข้อมูล: connection refused"));
        assert!(html.contains("ไม่มีข้อมูล"));
    }

    #[test]
    fn can_render_notice() {
        let html = RunsTemplate::new(Some(Notice::Created), ListState::Loaded(Vec::new()))
            .render()
            .unwrap();

        assert!(html.contains(WORDING.created));
    }

    #[test]
    fn can_render_edit_form_with_current_image() {
        let form = RunForm::from_run(&run(Some("https://cdn.test/old.png")));
        let html = RunFormTemplate::edit("r1", form, None).render().unwrap();

        assert!(html.contains(r#"action="/runs/r1""#));
        assert!(html.contains(r#"name="current_image_url" value="https://cdn.test/old.png""#));
        assert!(html.contains(r#"value="2024-05-01""#));
        assert!(html.contains(WORDING.submit_update));
    }

    #[test]
    fn can_render_create_form_with_message() {
        let html = RunFormTemplate::create(RunForm::default(), Some(WORDING.missing_fields))
            .render()
            .unwrap();

        assert!(html.contains(r#"action="/runs""#));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
        assert!(html.contains(WORDING.missing_fields));
        assert!(!html.contains("current_image_url"));
    }
}
