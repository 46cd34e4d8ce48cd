use crate::keys::DerivedKeys;
use crate::record_api::{FileMeta, RecordApi, RecordError, StorageLocation, UploadRecord};
use crate::s3_uploader::{content_type_for, ObjectMetadata, ObjectStore, StorageError};
use crate::validator::UploadCandidate;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Records expire this long after the audio is written (6 hours)
pub const RETENTION_WINDOW_SECS: i64 = 6 * 3600;

/// Source of the current time for expiry computation
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// User-entered context shared by every file in one submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionMetadata {
    /// Standard operating procedure (SOP)
    pub procedure: String,
    pub jurisdiction: String,
    pub description: String,
}

impl SubmissionMetadata {
    pub fn new(
        procedure: impl Into<String>,
        jurisdiction: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            procedure: procedure.into(),
            jurisdiction: jurisdiction.into(),
            description: description.into(),
        }
    }

    /// All three fields are filled in
    pub fn is_complete(&self) -> bool {
        !self.procedure.is_empty() && !self.jurisdiction.is_empty() && !self.description.is_empty()
    }

    /// Object-level tags written alongside one file
    fn object_tags(&self, file_name: &str, file_type: &str) -> ObjectMetadata {
        ObjectMetadata::from([
            ("SOP".to_string(), self.procedure.clone()),
            ("jurisdiction".to_string(), self.jurisdiction.clone()),
            ("description".to_string(), self.description.clone()),
            ("fileName".to_string(), file_name.to_string()),
            ("fileType".to_string(), file_type.to_string()),
        ])
    }
}

/// Which of the two writes failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStage {
    Storage,
    Record,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl UploadError {
    pub fn stage(&self) -> WriteStage {
        match self {
            UploadError::Storage(_) => WriteStage::Storage,
            UploadError::Record(_) => WriteStage::Record,
        }
    }
}

/// Result of writing one candidate
#[derive(Debug, Clone)]
pub enum CandidateOutcome {
    /// Object written and record created
    Stored { record: UploadRecord },
    /// One of the writes failed. With `WriteStage::Record` the object exists
    /// in storage without a record.
    Failed {
        candidate: UploadCandidate,
        object_key: String,
        error: UploadError,
    },
}

impl CandidateOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, CandidateOutcome::Stored { .. })
    }
}

/// Per-candidate outcomes of one submission, in candidate order
#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    pub outcomes: Vec<CandidateOutcome>,
}

impl SubmissionReport {
    pub fn stored(&self) -> impl Iterator<Item = &UploadRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            CandidateOutcome::Stored { record } => Some(record),
            CandidateOutcome::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&UploadCandidate, &str, &UploadError)> {
        self.outcomes.iter().filter_map(|o| match o {
            CandidateOutcome::Failed {
                candidate,
                object_key,
                error,
            } => Some((candidate, object_key.as_str(), error)),
            CandidateOutcome::Stored { .. } => None,
        })
    }

    pub fn stored_count(&self) -> usize {
        self.stored().count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.stored_count()
    }

    /// Every candidate was stored and registered
    pub fn is_complete_success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(CandidateOutcome::is_stored)
    }
}

/// Writes candidates to object storage and registers their records
pub struct RemoteWriter {
    store: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordApi>,
    clock: Arc<dyn Clock>,
    bucket_name: String,
    public_prefix: String,
    concurrency: usize,
}

impl RemoteWriter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordApi>,
        bucket_name: impl Into<String>,
        public_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            records,
            clock: Arc::new(SystemClock),
            bucket_name: bucket_name.into(),
            public_prefix: public_prefix.into(),
            concurrency: 1,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of candidates written at once; 1 writes them sequentially
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Confirm the object store is reachable
    pub async fn check_ready(&self) -> Result<(), StorageError> {
        self.store.check_ready().await
    }

    /// Write every candidate, each as an independent unit of work
    #[instrument(skip_all, fields(procedure = %metadata.procedure, candidates = candidates.len()))]
    pub async fn write_all(
        &self,
        metadata: &SubmissionMetadata,
        candidates: &[UploadCandidate],
    ) -> SubmissionReport {
        let outcomes: Vec<CandidateOutcome> = stream::iter(candidates)
            .map(|candidate| self.write_candidate(metadata, candidate))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .boxed()
            .await;

        let report = SubmissionReport { outcomes };

        info!(
            stored = report.stored_count(),
            failed = report.failed_count(),
            "Submission written"
        );

        report
    }

    /// Store one candidate's audio, then register its record.
    ///
    /// The record is only created once the object write has succeeded.
    #[instrument(skip_all, fields(file_name = %candidate.name()))]
    pub async fn write_candidate(
        &self,
        metadata: &SubmissionMetadata,
        candidate: &UploadCandidate,
    ) -> CandidateOutcome {
        let keys = DerivedKeys::generate(
            &metadata.procedure,
            candidate.name(),
            &self.public_prefix,
        );
        let file_type = if candidate.mime_type().is_empty() {
            content_type_for(candidate.extension())
        } else {
            candidate.mime_type()
        };

        let tags = metadata.object_tags(candidate.name(), file_type);

        if let Err(e) = self
            .store
            .put(&keys.bucket_key, candidate.payload(), file_type, &tags)
            .await
        {
            error!(error = %e, bucket_key = %keys.bucket_key, "Failed to store audio");
            metrics::counter!("upload.objects.failed").increment(1);
            return CandidateOutcome::Failed {
                candidate: candidate.clone(),
                object_key: keys.object_key,
                error: e.into(),
            };
        }
        metrics::counter!("upload.objects.stored").increment(1);

        let record = UploadRecord {
            id: keys.id,
            object_key: keys.object_key,
            expire_time: self.clock.now().timestamp() + RETENTION_WINDOW_SECS,
            file_meta: FileMeta {
                file_name: candidate.name().to_string(),
                file_type: file_type.to_string(),
                procedure: metadata.procedure.clone(),
                jurisdiction: metadata.jurisdiction.clone(),
                description: metadata.description.clone(),
            },
            storage_location: StorageLocation {
                bucket_name: self.bucket_name.clone(),
                bucket_key: keys.bucket_key,
            },
        };

        match self.records.create_record(&record).await {
            Ok(_) => {
                metrics::counter!("upload.records.created").increment(1);
                info!(
                    record_id = %record.id,
                    object_key = %record.object_key,
                    expire_time = record.expire_time,
                    "Audio stored and registered"
                );
                CandidateOutcome::Stored { record }
            }
            Err(e) => {
                // The object stays in storage without a record
                error!(
                    error = %e,
                    record_id = %record.id,
                    object_key = %record.object_key,
                    "Failed to create transcript record"
                );
                metrics::counter!("upload.records.failed").increment(1);
                CandidateOutcome::Failed {
                    candidate: candidate.clone(),
                    object_key: record.object_key,
                    error: e.into(),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record_api::{MockRecordApi, Transcript};
    use crate::s3_uploader::MockObjectStore;
    use crate::validator::{validate_selection, SelectedFile};
    use bytes::Bytes;
    use chrono::TimeZone;
    use std::sync::Mutex;

    pub(crate) struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    pub(crate) fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    pub(crate) fn transcript_for(record: &UploadRecord) -> Transcript {
        Transcript {
            id: record.id.to_string(),
            description: Some(record.file_meta.description.clone()),
            jurisdiction: Some(record.file_meta.jurisdiction.clone()),
            file_type: Some(record.file_meta.file_type.clone()),
            file_name: Some(record.file_meta.file_name.clone()),
            procedure: Some(record.file_meta.procedure.clone()),
            file_data: Some(record.storage_location.clone()),
            expire_time: Some(record.expire_time),
            created_at: None,
            updated_at: None,
        }
    }

    pub(crate) fn candidates(names: &[(&str, &str)]) -> Vec<UploadCandidate> {
        validate_selection(
            names
                .iter()
                .map(|(name, mime)| SelectedFile::new(*name, *mime, Bytes::from_static(b"RIFF"))),
        )
        .accepted
    }

    pub(crate) fn writer(store: MockObjectStore, records: MockRecordApi) -> RemoteWriter {
        RemoteWriter::new(Arc::new(store), Arc::new(records), "audio-bucket", "public")
            .with_clock(Arc::new(FixedClock(fixed_now())))
    }

    fn metadata() -> SubmissionMetadata {
        SubmissionMetadata::new("SOP1", "NY", "test")
    }

    #[test]
    fn test_metadata_completeness() {
        assert!(metadata().is_complete());
        assert!(!SubmissionMetadata::new("SOP1", "", "test").is_complete());
        assert!(!SubmissionMetadata::default().is_complete());
    }

    #[tokio::test]
    async fn test_single_file_stored_and_registered() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|key, payload, content_type, tags| {
                key.starts_with("public/SOP1/")
                    && key.ends_with("_call.wav")
                    && &payload[..] == b"RIFF"
                    && content_type == "audio/wav"
                    && tags.get("SOP").map(String::as_str) == Some("SOP1")
                    && tags.get("jurisdiction").map(String::as_str) == Some("NY")
                    && tags.get("description").map(String::as_str) == Some("test")
                    && tags.get("fileName").map(String::as_str) == Some("call.wav")
                    && tags.get("fileType").map(String::as_str) == Some("audio/wav")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut records = MockRecordApi::new();
        records
            .expect_create_record()
            .withf(|record| {
                record.file_meta.file_name == "call.wav"
                    && record.file_meta.file_type == "audio/wav"
                    && record.file_meta.procedure == "SOP1"
                    && record.file_meta.jurisdiction == "NY"
                    && record.file_meta.description == "test"
                    && record.expire_time == fixed_now().timestamp() + 21600
            })
            .times(1)
            .returning(|record| Ok(transcript_for(record)));

        let writer = writer(store, records);
        let report = writer
            .write_all(&metadata(), &candidates(&[("call.wav", "audio/wav")]))
            .await;

        assert!(report.is_complete_success());
        let record = report.stored().next().unwrap();
        assert_eq!(
            record.object_key,
            format!("SOP1/{}_call.wav", record.id)
        );
        assert_eq!(record.storage_location.bucket_name, "audio-bucket");
        assert_eq!(
            record.storage_location.bucket_key,
            format!("public/{}", record.object_key)
        );
    }

    #[tokio::test]
    async fn test_storage_failure_skips_record_creation() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .returning(|_, _, _, _| Err(StorageError::PutFailed("access denied".to_string())));

        let mut records = MockRecordApi::new();
        records.expect_create_record().times(0);

        let writer = writer(store, records);
        let report = writer
            .write_all(
                &metadata(),
                &candidates(&[("a.wav", "audio/wav"), ("b.mp3", "audio/mpeg")]),
            )
            .await;

        assert!(!report.is_complete_success());
        assert_eq!(report.failed_count(), 2);
        for (_, _, error) in report.failed() {
            assert_eq!(error.stage(), WriteStage::Storage);
        }
    }

    #[tokio::test]
    async fn test_record_failure_reported_after_store() {
        let mut store = MockObjectStore::new();
        store.expect_put().times(1).returning(|_, _, _, _| Ok(()));

        let mut records = MockRecordApi::new();
        records
            .expect_create_record()
            .times(1)
            .returning(|_| Err(RecordError::Status { status: 401, body: "Unauthorized".to_string() }));

        let writer = writer(store, records);
        let report = writer
            .write_all(&metadata(), &candidates(&[("call.flac", "audio/flac")]))
            .await;

        let (candidate, object_key, error) = report.failed().next().unwrap();
        assert_eq!(candidate.name(), "call.flac");
        assert!(object_key.starts_with("SOP1/"));
        assert_eq!(error.stage(), WriteStage::Record);
    }

    #[tokio::test]
    async fn test_object_write_precedes_record_per_candidate() {
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        let store_events = events.clone();
        store.expect_put().returning(move |key, _, _, _| {
            store_events.lock().unwrap().push(format!("put:{}", key));
            Ok(())
        });

        let mut records = MockRecordApi::new();
        let record_events = events.clone();
        records.expect_create_record().returning(move |record| {
            record_events
                .lock()
                .unwrap()
                .push(format!("record:{}", record.object_key));
            Ok(transcript_for(record))
        });

        let writer = writer(store, records).with_concurrency(4);
        let report = writer
            .write_all(
                &metadata(),
                &candidates(&[("a.wav", "audio/wav"), ("b.wav", "audio/wav"), ("c.wav", "audio/wav")]),
            )
            .await;

        assert_eq!(report.stored_count(), 3);

        let events = events.lock().unwrap();
        for record in report.stored() {
            let put_at = events
                .iter()
                .position(|e| *e == format!("put:{}", record.storage_location.bucket_key))
                .unwrap();
            let record_at = events
                .iter()
                .position(|e| *e == format!("record:{}", record.object_key))
                .unwrap();
            assert!(put_at < record_at);
        }
    }

    #[tokio::test]
    async fn test_object_written_at_record_bucket_key() {
        let written = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        let written_keys = written.clone();
        store.expect_put().times(1).returning(move |key, _, _, _| {
            written_keys.lock().unwrap().push(key.to_string());
            Ok(())
        });
        let mut records = MockRecordApi::new();
        records
            .expect_create_record()
            .returning(|record| Ok(transcript_for(record)));

        let writer = writer(store, records);
        let report = writer
            .write_all(&metadata(), &candidates(&[("call.wav", "audio/wav")]))
            .await;

        let record = report.stored().next().unwrap();
        assert_eq!(
            *written.lock().unwrap(),
            vec![record.storage_location.bucket_key.clone()]
        );
    }

    #[tokio::test]
    async fn test_one_id_per_file() {
        let mut store = MockObjectStore::new();
        store.expect_put().returning(|_, _, _, _| Ok(()));
        let mut records = MockRecordApi::new();
        records
            .expect_create_record()
            .returning(|record| Ok(transcript_for(record)));

        let writer = writer(store, records);
        let report = writer
            .write_all(
                &metadata(),
                &candidates(&[("a.wav", "audio/wav"), ("b.wav", "audio/wav")]),
            )
            .await;

        let ids: Vec<_> = report.stored().map(|r| r.id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_missing_mime_type_falls_back_to_extension() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|_, _, content_type, _| content_type == "audio/mpeg")
            .returning(|_, _, _, _| Ok(()));
        let mut records = MockRecordApi::new();
        records
            .expect_create_record()
            .withf(|record| record.file_meta.file_type == "audio/mpeg")
            .returning(|record| Ok(transcript_for(record)));

        let writer = writer(store, records);
        let report = writer
            .write_all(&metadata(), &candidates(&[("call.mp3", "")]))
            .await;

        assert!(report.is_complete_success());
    }

    #[test]
    fn test_empty_report_is_not_success() {
        assert!(!SubmissionReport::default().is_complete_success());
    }
}
