//! Upload form state.
//!
//! ```text
//! Idle ──edit/select──▶ Filled ──submit──▶ Submitting ──▶ Success
//!  ▲                      │                       │
//!  └──────edit/select─────┘                       └─────▶ Error
//! ```
//!
//! Any edit or selection re-evaluates the submit predicate and lands in
//! `Filled` or `Idle`, including from `Success` and `Error`.

use crate::validator::{validate_selection, SelectedFile, Selection, UploadCandidate};
use crate::writer::{RemoteWriter, SubmissionMetadata, SubmissionReport};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Form is not ready to submit: {}", .missing.join(", "))]
    NotReady { missing: Vec<&'static str> },

    #[error("Unknown form field: {0}")]
    UnknownField(String),
}

/// Text fields of the upload form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Procedure,
    Jurisdiction,
    Description,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Procedure => "SOP",
            FormField::Jurisdiction => "jurisdiction",
            FormField::Description => "description",
        }
    }
}

impl FromStr for FormField {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SOP" | "procedure" => Ok(FormField::Procedure),
            "jurisdiction" => Ok(FormField::Jurisdiction),
            "description" => Ok(FormField::Description),
            other => Err(FormError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStatus {
    /// Nothing submittable yet
    Idle,
    /// All fields filled and at least one valid file selected
    Filled,
    /// Writes in flight
    Submitting,
    /// Every file was stored and registered
    Success,
    /// At least one file failed; see the last report
    Error,
}

/// One upload form instance. Owns its selection; nothing is shared across forms.
#[derive(Debug, Clone)]
pub struct UploadForm {
    metadata: SubmissionMetadata,
    selection: Selection,
    status: FormStatus,
    last_report: Option<SubmissionReport>,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadForm {
    pub fn new() -> Self {
        Self {
            metadata: SubmissionMetadata::default(),
            selection: Selection::default(),
            status: FormStatus::Idle,
            last_report: None,
        }
    }

    pub fn status(&self) -> FormStatus {
        self.status
    }

    pub fn metadata(&self) -> &SubmissionMetadata {
        &self.metadata
    }

    pub fn accepted(&self) -> &[UploadCandidate] {
        &self.selection.accepted
    }

    /// Names of files rejected by the latest selection
    pub fn rejected(&self) -> &[String] {
        &self.selection.rejected
    }

    pub fn last_report(&self) -> Option<&SubmissionReport> {
        self.last_report.as_ref()
    }

    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Procedure => &self.metadata.procedure,
            FormField::Jurisdiction => &self.metadata.jurisdiction,
            FormField::Description => &self.metadata.description,
        }
    }

    pub fn set_field(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::Procedure => self.metadata.procedure = value,
            FormField::Jurisdiction => self.metadata.jurisdiction = value,
            FormField::Description => self.metadata.description = value,
        }
        self.reevaluate();
    }

    /// Replace the current selection with a newly chosen set of files
    pub fn select_files(&mut self, files: impl IntoIterator<Item = SelectedFile>) -> &Selection {
        self.selection = validate_selection(files);
        if !self.selection.rejected.is_empty() {
            metrics::counter!("upload.files.rejected")
                .increment(self.selection.rejected.len() as u64);
        }
        self.reevaluate();
        &self.selection
    }

    /// Submit is enabled iff all fields are non-empty and a valid file is selected
    pub fn can_submit(&self) -> bool {
        self.metadata.is_complete() && !self.selection.accepted.is_empty()
    }

    /// Names of the requirements that currently block submission
    pub fn missing_requirements(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for field in [
            FormField::Procedure,
            FormField::Jurisdiction,
            FormField::Description,
        ] {
            if self.field(field).is_empty() {
                missing.push(field.as_str());
            }
        }
        if self.selection.accepted.is_empty() {
            missing.push("file");
        }
        missing
    }

    /// Write every accepted file and move to `Success` or `Error`.
    ///
    /// On success the form is reset. On failure the fields are kept and the
    /// selection is narrowed to the files that failed, so resubmitting only
    /// retries those.
    pub async fn submit(&mut self, writer: &RemoteWriter) -> Result<&SubmissionReport, FormError> {
        if !self.can_submit() {
            let missing = self.missing_requirements();
            warn!(missing = ?missing, "Submission refused");
            return Err(FormError::NotReady { missing });
        }

        self.status = FormStatus::Submitting;
        let candidates = std::mem::take(&mut self.selection.accepted);

        let report = writer.write_all(&self.metadata, &candidates).await;

        if report.is_complete_success() {
            info!(stored = report.stored_count(), "Submission completed");
            self.metadata = SubmissionMetadata::default();
            self.selection = Selection::default();
            self.status = FormStatus::Success;
        } else {
            warn!(
                stored = report.stored_count(),
                failed = report.failed_count(),
                "Submission completed with failures"
            );
            self.selection.accepted = report
                .failed()
                .map(|(candidate, _, _)| candidate.clone())
                .collect();
            self.status = FormStatus::Error;
        }

        Ok(&*self.last_report.insert(report))
    }

    fn reevaluate(&mut self) {
        self.status = if self.can_submit() {
            FormStatus::Filled
        } else {
            FormStatus::Idle
        };
    }
}
