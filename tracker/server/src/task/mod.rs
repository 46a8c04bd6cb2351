use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{self, Backend, BackendError, ImageUpload};
use crate::record::multipart::Submission;
use crate::record::pipeline::{check_image, store_image};
use crate::record::{FormError, SubmitError, Wording, kept_image_url, non_blank};

pub mod web;

pub static WORDING: Wording = Wording {
    app_title: "Manage Task App",
    list_subtitle: "บริหารจัดการงานที่ต้องทำ",
    create_subtitle: "เพิ่มงานที่ต้องทำ",
    edit_subtitle: "แก้ไขงานที่ต้องทำ",
    create_heading: "➕ เพิ่มงานใหม่",
    edit_heading: "✏️ แก้ไขงาน",
    add_link: "เพิ่มงาน",
    submit_create: "บันทึกงาน",
    submit_update: "อัปเดตงาน",
    missing_fields: "กรุณากรอกข้อมูลให้ครบถ้วน",
    invalid_fields: "ข้อมูลงานไม่ถูกต้อง กรุณาตรวจสอบอีกครั้ง",
    not_an_image: "กรุณาเลือกไฟล์รูปภาพเท่านั้น",
    upload_failed: "เกิดข้อผิดพลาดในการอัปโหลดรูป กรุณาลองใหม่อีกครั้ง",
    create_failed: "เกิดข้อผิดพลาดในการบันทึกข้อมูล กรุณาลองใหม่อีกครั้ง",
    update_failed: "เกิดข้อผิดพลาดในการอัปเดตข้อมูล กรุณาลองใหม่อีกครั้ง",
    created: "บันทึกงานเรียบร้อยแล้ว",
    updated: "อัปเดตงานเรียบร้อยแล้ว",
    not_found: "ไม่พบข้อมูลงานนี้",
    delete_confirm: "แน่ใจหรือไม่ว่าจะลบงานนี้?",
    delete_failed: "เกิดข้อผิดพลาดในการลบข้อมูล: ",
    deleted: "ลบข้อมูลสำเร็จ",
    deleting: "กำลังลบ...",
    load_failed: "เกิดข้อผิดพลาดในการโหลดข้อมูล: ",
};

/// A row of the task table as the backend returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "crate::record::deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "crate::record::deserialize_flag")]
    pub is_completed: bool,
    #[serde(default)]
    pub update_at: Option<String>,
}

/// Editable state of the task form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub detail: String,
    pub is_completed: bool,
    /// Image already attached to the task being edited.
    pub current_image_url: Option<String>,
}

/// Fields written to the task table. Edits overwrite all of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub title: String,
    pub detail: String,
    pub image_url: Option<String>,
    pub is_completed: bool,
    pub update_at: DateTime<Utc>,
}

impl TaskForm {
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            title: submission.field("title").to_string(),
            detail: submission.field("detail").to_string(),
            is_completed: submission.has_field("is_completed"),
            current_image_url: non_blank(submission.field("current_image_url")).map(str::to_string),
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone().unwrap_or_default(),
            detail: task.detail.clone().unwrap_or_default(),
            is_completed: task.is_completed,
            current_image_url: task.image_url.clone(),
        }
    }

    /// Validates the form as a unit and stamps `update_at` with `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<TaskRecord, FormError> {
        let title = non_blank(&self.title);
        let detail = non_blank(&self.detail);
        let (Some(title), Some(detail)) = (title, detail) else {
            let mut missing = Vec::new();
            if title.is_none() {
                missing.push("title");
            }
            if detail.is_none() {
                missing.push("detail");
            }
            return Err(FormError::MissingFields(missing));
        };

        Ok(TaskRecord {
            title: title.to_string(),
            detail: detail.to_string(),
            image_url: kept_image_url(self.current_image_url.as_deref()),
            is_completed: self.is_completed,
            update_at: now,
        })
    }
}

/// Table and bucket the task manager works with.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub table: String,
    pub bucket: String,
}

pub struct TaskService<'a> {
    backend: &'a dyn Backend,
    settings: &'a TaskSettings,
}

impl<'a> TaskService<'a> {
    pub fn new(backend: &'a dyn Backend, settings: &'a TaskSettings) -> Self {
        Self { backend, settings }
    }

    /// Retrieves every task, in the order the backend returns them.
    #[tracing::instrument(skip(self))]
    pub async fn get_all_tasks(&self) -> Result<Vec<Task>, BackendError> {
        backend::fetch_all(self.backend, &self.settings.table).await
    }

    /// Retrieves a single task by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_task_by_id(&self, id: &str) -> Result<Task, BackendError> {
        backend::fetch_one(self.backend, &self.settings.table, id).await
    }

    /// Creates a task. New tasks always start out not completed.
    #[tracing::instrument(skip(self, image))]
    pub async fn create_task(
        &self,
        form: &TaskForm,
        image: Option<ImageUpload>,
        now: DateTime<Utc>,
    ) -> Result<(), SubmitError> {
        let mut record = form.validate(now)?;
        check_image(image.as_ref())?;

        record.is_completed = false;
        record.image_url = store_image(self.backend, &self.settings.bucket, image, now).await?;

        let payload = serde_json::to_value(&record).map_err(|e| SubmitError::Write(e.into()))?;
        self.backend
            .insert(&self.settings.table, payload)
            .await
            .map_err(|err| {
                tracing::error!("Failed to insert task: {}", err);
                SubmitError::Write(err)
            })
    }

    /// Overwrites a task with the submitted form, keeping its image unless a
    /// new one was picked.
    #[tracing::instrument(skip(self, image))]
    pub async fn update_task_by_id(
        &self,
        id: &str,
        form: &TaskForm,
        image: Option<ImageUpload>,
        now: DateTime<Utc>,
    ) -> Result<(), SubmitError> {
        let mut record = form.validate(now)?;
        check_image(image.as_ref())?;

        if let Some(url) = store_image(self.backend, &self.settings.bucket, image, now).await? {
            record.image_url = Some(url);
        }

        let payload = serde_json::to_value(&record).map_err(|e| SubmitError::Write(e.into()))?;
        self.backend
            .update(&self.settings.table, id, payload)
            .await
            .map_err(|err| {
                tracing::error!("Failed to update task {}: {}", id, err);
                SubmitError::Write(err)
            })
    }

    /// Deletes a task by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task_by_id(&self, id: &str) -> Result<(), BackendError> {
        self.backend
            .delete(&self.settings.table, id)
            .await
            .inspect_err(|err| tracing::error!("Failed to delete task {}: {}", id, err))
    }
}
