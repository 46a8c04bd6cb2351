//! Pages and responses shared by both front-ends: blocking messages, delete
//! confirmation, redirects back to a list and the error type every page
//! handler returns.

use askama::Template;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::{Notice, SubmitError, Wording};
use crate::backend::BackendError;

const RENDER_FAILURE_PAGE: &str =
    "<h1>Internal Server Error</h1><p>This page could not be rendered. Please try again later.</p>";

/// Failures of a page handler that are not part of a form or list flow.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// The request body was not a readable multipart form.
    #[error("Malformed form submission")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Multipart(err) => err.into_response(),
            PageError::Template(err) => {
                tracing::error!("Failed to render page: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(RENDER_FAILURE_PAGE)).into_response()
            }
        }
    }
}

/// A blocking message with a single way forward.
#[derive(Template)]
#[template(path = "alert.html")]
pub struct AlertTemplate<'a> {
    pub wording: &'a Wording,
    pub message: String,
    pub back_href: String,
}

impl<'a> AlertTemplate<'a> {
    pub fn new(wording: &'a Wording, message: String, back_href: String) -> Self {
        Self {
            wording,
            message,
            back_href,
        }
    }
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate<'a> {
    pub wording: &'a Wording,
    pub action: String,
    pub cancel_href: String,
}

impl<'a> ConfirmDeleteTemplate<'a> {
    pub fn new(wording: &'a Wording, action: String, cancel_href: String) -> Self {
        Self {
            wording,
            action,
            cancel_href,
        }
    }
}

/// Renders `template` as an HTML response with `status`.
pub fn render_page<T: Template>(template: &T, status: StatusCode) -> Result<Response, askama::Error> {
    let html = template.render()?;
    Ok((status, Html(html)).into_response())
}

/// Status for a failed remote call: 404 when the row is missing, 502 otherwise.
pub fn remote_failure_status(error: &BackendError) -> StatusCode {
    match error {
        BackendError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Status of a form re-shown after a failed submission.
pub fn submit_failure_status(error: &SubmitError) -> StatusCode {
    match error {
        SubmitError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitError::Upload(err) | SubmitError::Write(err) => remote_failure_status(err),
    }
}

/// `303 See Other` back to a list, carrying the success notice.
pub fn list_redirect(list_href: &str, notice: Notice) -> Response {
    Redirect::to(&format!("{}?notice={}", list_href, notice.as_query())).into_response()
}

/// Blocking message whose only way forward is back to the list.
pub fn render_alert(
    wording: &Wording,
    message: String,
    list_href: &str,
    status: StatusCode,
) -> Result<Response, PageError> {
    let template = AlertTemplate::new(wording, message, list_href.to_string());
    Ok(render_page(&template, status)?)
}
