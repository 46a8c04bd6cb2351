//! Building blocks shared by the task manager and the run tracker.
//!
//! Both front-ends follow the same flow: a form is validated as a unit, an
//! optional image is uploaded, and a single row is written. Lists fetch every
//! row and render a table. The pieces of that flow that do not depend on the
//! entity live here.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::fmt::Write;

use crate::backend::BackendError;

pub mod delete_guard;
pub mod multipart;
pub mod pages;
pub mod pipeline;

pub use delete_guard::{DeleteGuard, DeleteTicket};

/// Reasons a form is rejected before any remote call is made.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FormError {
    #[error("Required fields are empty: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Field {0} is not a number")]
    InvalidNumber(&'static str),
    #[error("Field {0} must not be negative")]
    Negative(&'static str),
    #[error("Field {0} is not a date")]
    InvalidDate(&'static str),
    #[error("Selected file is not an image")]
    NotAnImage,
}

/// The first failing step of a create or edit submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Form rejected: {0}")]
    Invalid(#[from] FormError),
    #[error("Image upload failed: {0}")]
    Upload(#[source] BackendError),
    #[error("Saving the record failed: {0}")]
    Write(#[source] BackendError),
}

/// Success messages shown on the list after a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Created,
    Updated,
    Deleted,
}

impl Notice {
    pub fn as_query(self) -> &'static str {
        match self {
            Notice::Created => "created",
            Notice::Updated => "updated",
            Notice::Deleted => "deleted",
        }
    }

    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Notice::Created),
            "updated" => Some(Notice::Updated),
            "deleted" => Some(Notice::Deleted),
            _ => None,
        }
    }
}

/// Query string accepted by the list views. An unknown notice is ignored so
/// the list always renders.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default, deserialize_with = "deserialize_notice")]
    pub notice: Option<Notice>,
}

fn deserialize_notice<'de, D>(deserializer: D) -> Result<Option<Notice>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Notice::from_query))
}

/// Reads a boolean column that may hold `null`; `null` and absent both mean false.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

/// Everything a front-end says to its user.
#[derive(Debug)]
pub struct Wording {
    pub app_title: &'static str,
    pub list_subtitle: &'static str,
    pub create_subtitle: &'static str,
    pub edit_subtitle: &'static str,
    pub create_heading: &'static str,
    pub edit_heading: &'static str,
    pub add_link: &'static str,
    pub submit_create: &'static str,
    pub submit_update: &'static str,
    pub missing_fields: &'static str,
    pub invalid_fields: &'static str,
    pub not_an_image: &'static str,
    pub upload_failed: &'static str,
    pub create_failed: &'static str,
    pub update_failed: &'static str,
    pub created: &'static str,
    pub updated: &'static str,
    pub not_found: &'static str,
    pub delete_confirm: &'static str,
    pub delete_failed: &'static str,
    pub deleted: &'static str,
    pub deleting: &'static str,
    pub load_failed: &'static str,
}

impl Wording {
    pub fn notice(&self, notice: Notice) -> &'static str {
        match notice {
            Notice::Created => self.created,
            Notice::Updated => self.updated,
            Notice::Deleted => self.deleted,
        }
    }

    pub fn form_error(&self, error: &FormError) -> &'static str {
        match error {
            FormError::MissingFields(_) => self.missing_fields,
            FormError::NotAnImage => self.not_an_image,
            _ => self.invalid_fields,
        }
    }

    /// Message for a failed submission. Remote causes are not told apart.
    pub fn submit_error(&self, error: &SubmitError, editing: bool) -> &'static str {
        match error {
            SubmitError::Invalid(form_error) => self.form_error(form_error),
            SubmitError::Upload(_) => self.upload_failed,
            SubmitError::Write(_) if editing => self.update_failed,
            SubmitError::Write(_) => self.create_failed,
        }
    }

    pub fn delete_error(&self, error: &BackendError) -> String {
        format!("{}{}", self.delete_failed, error)
    }
}

/// Outcome of a list load.
#[derive(Debug)]
pub enum ListState<R> {
    Loaded(Vec<R>),
    Errored(String),
}

impl<R> ListState<R> {
    /// Logs a failed load and keeps only its message.
    pub fn from_result(result: Result<Vec<R>, BackendError>) -> Self {
        match result {
            Ok(rows) => ListState::Loaded(rows),
            Err(err) => {
                tracing::error!("Error fetching records: {}", err);
                ListState::Errored(err.to_string())
            }
        }
    }

    pub fn map<T>(self, f: impl FnMut(R) -> T) -> ListState<T> {
        match self {
            ListState::Loaded(rows) => ListState::Loaded(rows.into_iter().map(f).collect()),
            ListState::Errored(message) => ListState::Errored(message),
        }
    }

    /// Rows to render; an errored load renders an empty table.
    pub fn into_rows(self) -> Vec<R> {
        match self {
            ListState::Loaded(rows) => rows,
            ListState::Errored(_) => Vec::new(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ListState::Loaded(_) => None,
            ListState::Errored(message) => Some(message),
        }
    }
}

/// Accepts ids stored either as text (uuid) or as integers.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Returns the trimmed value, or `None` when it is blank.
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

pub fn is_valid_url(value: &str) -> bool {
    reqwest::Url::parse(value).is_ok()
}

/// Image URL already attached to the record being edited. It is written back
/// exactly as stored; blank means "no image".
pub fn kept_image_url(value: Option<&str>) -> Option<String> {
    value.and_then(non_blank).map(str::to_string)
}

fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|date_time| date_time.date_naive())
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|date_time| date_time.date())
                .ok()
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .map(|date_time| date_time.date())
                .ok()
        })
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

/// Formats a stored date or timestamp for a table cell, `-` when absent.
/// Values that do not parse are shown as stored.
pub fn display_date(raw: Option<&str>, format: &str) -> String {
    let Some(raw) = raw.and_then(non_blank) else {
        return "-".to_string();
    };
    let Some(date) = parse_calendar_date(raw) else {
        return raw.to_string();
    };
    let mut formatted = String::new();
    // an invalid format string surfaces as fmt::Error
    if write!(formatted, "{}", date.format(format)).is_err() {
        return date.to_string();
    }
    formatted
}

/// Value for an `<input type="date">`: `YYYY-MM-DD`, or empty.
pub fn date_input_value(raw: Option<&str>) -> String {
    raw.and_then(non_blank)
        .and_then(parse_calendar_date)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn display_or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

/// The image URL a table cell should show, if it is usable.
pub fn displayable_image(url: Option<&str>) -> Option<String> {
    url.filter(|url| is_valid_url(url)).map(str::to_string)
}
