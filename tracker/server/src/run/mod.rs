use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{self, Backend, BackendError, ImageUpload};
use crate::record::multipart::Submission;
use crate::record::pipeline::{check_image, store_image};
use crate::record::{FormError, SubmitError, Wording, date_input_value, kept_image_url, non_blank};

pub mod web;

pub static WORDING: Wording = Wording {
    app_title: "My Run Tracker",
    list_subtitle: "บันทึกข้อมูลการวิ่งของคุณ",
    create_subtitle: "เพิ่มข้อมูลการวิ่ง",
    edit_subtitle: "แก้ไขข้อมูลการวิ่ง",
    create_heading: "➕ เพิ่มการวิ่งใหม่",
    edit_heading: "✏️ แก้ไขการวิ่ง",
    add_link: "เพิ่มข้อมูลการวิ่ง",
    submit_create: "บันทึกการวิ่ง",
    submit_update: "อัปเดตการวิ่ง",
    missing_fields: "กรุณากรอกข้อมูลให้ครบถ้วน",
    invalid_fields: "ข้อมูลการวิ่งไม่ถูกต้อง กรุณาตรวจสอบอีกครั้ง",
    not_an_image: "กรุณาเลือกไฟล์รูปภาพเท่านั้น",
    upload_failed: "เกิดข้อผิดพลาดในการอัปโหลดรูป กรุณาลองใหม่อีกครั้ง",
    create_failed: "เกิดข้อผิดพลาดในการบันทึกข้อมูล กรุณาลองใหม่อีกครั้ง",
    update_failed: "เกิดข้อผิดพลาดในการอัปเดตข้อมูล กรุณาลองใหม่อีกครั้ง",
    created: "บันทึกการวิ่งเรียบร้อยแล้ว",
    updated: "อัปเดตข้อมูลการวิ่งเรียบร้อยแล้ว",
    not_found: "ไม่พบข้อมูลการวิ่งนี้",
    delete_confirm: "แน่ใจหรือไม่ว่าจะลบข้อมูลการวิ่งนี้?",
    delete_failed: "เกิดข้อผิดพลาดในการลบข้อมูล: ",
    deleted: "ลบข้อมูลสำเร็จ",
    deleting: "กำลังลบ...",
    load_failed: "เกิดข้อผิดพลาดในการโหลดข้อมูล: ",
};

/// A row of the run table as the backend returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Run {
    #[serde(deserialize_with = "crate::record::deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub run_date: Option<String>,
    #[serde(default)]
    pub run_distance: Option<f64>,
    #[serde(default)]
    pub run_place: Option<String>,
    #[serde(default)]
    pub run_image_url: Option<String>,
}

/// Editable state of the run form, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunForm {
    pub run_date: String,
    pub run_distance: String,
    pub run_place: String,
    /// Image already attached to the run being edited.
    pub current_image_url: Option<String>,
}

/// Fields written to the run table on create and edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_date: NaiveDate,
    pub run_distance: f64,
    pub run_place: String,
    pub run_image_url: Option<String>,
}

impl RunForm {
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            run_date: submission.field("run_date").to_string(),
            run_distance: submission.field("run_distance").to_string(),
            run_place: submission.field("run_place").to_string(),
            current_image_url: non_blank(submission.field("current_image_url")).map(str::to_string),
        }
    }

    pub fn from_run(run: &Run) -> Self {
        Self {
            run_date: date_input_value(run.run_date.as_deref()),
            run_distance: run.run_distance.map(|d| d.to_string()).unwrap_or_default(),
            run_place: run.run_place.clone().unwrap_or_default(),
            current_image_url: run.run_image_url.clone(),
        }
    }

    /// Validates every field at once and builds the record to write.
    ///
    /// The image URL is the one already attached to the run; a fresh upload
    /// replaces it afterwards.
    pub fn validate(&self) -> Result<RunRecord, FormError> {
        let run_date = non_blank(&self.run_date);
        let run_distance = non_blank(&self.run_distance);
        let run_place = non_blank(&self.run_place);

        let missing: Vec<&'static str> = [
            ("run_date", run_date.is_none()),
            ("run_distance", run_distance.is_none()),
            ("run_place", run_place.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, missing)| missing.then_some(field))
        .collect();
        let (Some(run_date), Some(run_distance), Some(run_place)) =
            (run_date, run_distance, run_place)
        else {
            return Err(FormError::MissingFields(missing));
        };

        let run_date = NaiveDate::parse_from_str(run_date, "%Y-%m-%d")
            .map_err(|_| FormError::InvalidDate("run_date"))?;
        let run_distance: f64 = run_distance
            .parse()
            .ok()
            .filter(|d: &f64| d.is_finite())
            .ok_or(FormError::InvalidNumber("run_distance"))?;
        if run_distance < 0.0 {
            return Err(FormError::Negative("run_distance"));
        }

        Ok(RunRecord {
            run_date,
            run_distance,
            run_place: run_place.to_string(),
            run_image_url: kept_image_url(self.current_image_url.as_deref()),
        })
    }
}

/// Table and buckets the run tracker works with.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub table: String,
    pub create_bucket: String,
    pub edit_bucket: String,
}

pub struct RunService<'a> {
    backend: &'a dyn Backend,
    settings: &'a RunSettings,
}

impl<'a> RunService<'a> {
    pub fn new(backend: &'a dyn Backend, settings: &'a RunSettings) -> Self {
        Self { backend, settings }
    }

    /// Retrieves every run, in the order the backend returns them.
    #[tracing::instrument(skip(self))]
    pub async fn get_all_runs(&self) -> Result<Vec<Run>, BackendError> {
        backend::fetch_all(self.backend, &self.settings.table).await
    }

    /// Retrieves a single run by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_run_by_id(&self, id: &str) -> Result<Run, BackendError> {
        backend::fetch_one(self.backend, &self.settings.table, id).await
    }

    /// Creates a run: validate, upload the image if any, insert.
    ///
    /// # Arguments
    ///
    /// * `form` - The submitted form.
    /// * `image` - The picked image, if any.
    /// * `now` - Time used to name the uploaded object.
    ///
    /// # Returns
    ///
    /// The first failing step. An uploaded image is kept even if the insert fails.
    #[tracing::instrument(skip(self, image))]
    pub async fn create_run(
        &self,
        form: &RunForm,
        image: Option<ImageUpload>,
        now: DateTime<Utc>,
    ) -> Result<(), SubmitError> {
        let mut record = form.validate()?;
        check_image(image.as_ref())?;

        record.run_image_url =
            store_image(self.backend, &self.settings.create_bucket, image, now).await?;

        let payload = serde_json::to_value(&record).map_err(|e| SubmitError::Write(e.into()))?;
        self.backend
            .insert(&self.settings.table, payload)
            .await
            .map_err(|err| {
                tracing::error!("Failed to insert run: {}", err);
                SubmitError::Write(err)
            })
    }

    /// Overwrites a run with the submitted form.
    ///
    /// Without a new image the run keeps `form.current_image_url`.
    #[tracing::instrument(skip(self, image))]
    pub async fn update_run_by_id(
        &self,
        id: &str,
        form: &RunForm,
        image: Option<ImageUpload>,
        now: DateTime<Utc>,
    ) -> Result<(), SubmitError> {
        let mut record = form.validate()?;
        check_image(image.as_ref())?;

        if let Some(url) = store_image(self.backend, &self.settings.edit_bucket, image, now).await? {
            record.run_image_url = Some(url);
        }

        let payload = serde_json::to_value(&record).map_err(|e| SubmitError::Write(e.into()))?;
        self.backend
            .update(&self.settings.table, id, payload)
            .await
            .map_err(|err| {
                tracing::error!("Failed to update run {}: {}", id, err);
                SubmitError::Write(err)
            })
    }

    /// Deletes a run by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn delete_run_by_id(&self, id: &str) -> Result<(), BackendError> {
        self.backend
            .delete(&self.settings.table, id)
            .await
            .inspect_err(|err| tracing::error!("Failed to delete run {}: {}", id, err))
    }
}
