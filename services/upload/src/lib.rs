//! Callscribe Upload Service
//!
//! Accepts call audio recordings through an upload form, stores each file in
//! S3 and registers a transcript record for it through the managed GraphQL
//! API. Transcription itself is triggered downstream from the stored object.
//!
//! ## Workflow
//!
//! - **File Intake & Validation**: partition the selected files by extension
//!   (`wav`, `mp3`, `mp4`, `flac`) into accepted candidates and rejected names
//! - **Key Derivation**: `{SOP}/{uuid}_{fileName}`, one fresh id per file
//! - **Remote Writes**: object write first, record creation only after it
//!   succeeds; every file reports its own outcome
//! - **Form State**: `Idle → Filled → Submitting → Success | Error`
//!
//! ## Architecture
//!
//! ```text
//!  multipart form
//! ┌──────────────┐
//! │ Upload API   │
//! │ (axum)       │
//! └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐     1. put object      ┌──────────────┐
//! │ Upload Form  │───────────────────────▶│ S3 Bucket    │
//! │ + Validator  │                        │ public/{SOP}/│
//! │ + Writer     │                        └──────────────┘
//! └──────────────┘
//!        │          2. createTranscript   ┌──────────────┐
//!        └───────────────────────────────▶│ GraphQL API  │
//!                                         └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod form;
pub mod keys;
pub mod record_api;
pub mod s3_uploader;
pub mod validator;
pub mod writer;

pub use api::{AppState, UploadResponse};
pub use config::Config;
pub use form::{FormError, FormField, FormStatus, UploadForm};
pub use keys::DerivedKeys;
pub use record_api::{GraphQlRecordApi, RecordApi, RecordError, UploadRecord};
pub use s3_uploader::{ObjectStore, S3Uploader, StorageError};
pub use validator::{validate_selection, SelectedFile, Selection, UploadCandidate};
pub use writer::{
    CandidateOutcome, Clock, RemoteWriter, SubmissionMetadata, SubmissionReport, SystemClock,
    UploadError, WriteStage,
};
