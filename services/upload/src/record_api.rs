//! Transcript record registration through the managed GraphQL API.
//!
//! One record is created per stored audio object with the generated
//! `createTranscript` mutation. `createdAt`/`updatedAt` are assigned by the
//! server and only ever read back.

use crate::config::RecordsConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const CREATE_TRANSCRIPT_MUTATION: &str = r#"
  mutation CreateTranscript(
    $input: CreateTranscriptInput!
    $condition: ModelTranscriptConditionInput
  ) {
    createTranscript(input: $input, condition: $condition) {
      id
      description
      jurisdiction
      fileType
      fileName
      procedure
      fileData {
        bucketName
        bucketKey
      }
      expireTime
      createdAt
      updatedAt
    }
  }
"#;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record API request failed: {0}")]
    Transport(String),

    #[error("Record API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Record API returned errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("Record API returned no data")]
    EmptyResponse,
}

/// Descriptive metadata of a stored audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub file_name: String,
    pub file_type: String,
    pub procedure: String,
    pub jurisdiction: String,
    pub description: String,
}

/// Where the audio object lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocation {
    pub bucket_name: String,
    pub bucket_key: String,
}

/// Metadata row registered for one stored audio object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: Uuid,
    /// Object key below the public prefix; not part of the record input
    #[serde(skip)]
    pub object_key: String,
    /// Expiry in seconds since the epoch
    pub expire_time: i64,
    #[serde(flatten)]
    pub file_meta: FileMeta,
    #[serde(rename = "fileData")]
    pub storage_location: StorageLocation,
}

/// Transcript record as returned by the API
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: String,
    pub description: Option<String>,
    pub jurisdiction: Option<String>,
    pub file_type: Option<String>,
    pub file_name: Option<String>,
    pub procedure: Option<String>,
    pub file_data: Option<StorageLocation>,
    pub expire_time: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Metadata record API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// Create one transcript record
    async fn create_record(&self, record: &UploadRecord) -> Result<Transcript, RecordError>;
}

#[derive(Serialize)]
struct GraphQlRequest<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Serialize)]
struct CreateTranscriptVariables<'a> {
    input: &'a UploadRecord,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTranscriptData {
    create_transcript: Option<Transcript>,
}

/// GraphQL client for the transcript record API
pub struct GraphQlRecordApi {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GraphQlRecordApi {
    pub fn new(config: &RecordsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        info!(endpoint = %config.graphql_endpoint, "Record API client initialized");

        Ok(Self {
            client,
            endpoint: config.graphql_endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl RecordApi for GraphQlRecordApi {
    #[instrument(skip(self, record), fields(record_id = %record.id))]
    async fn create_record(&self, record: &UploadRecord) -> Result<Transcript, RecordError> {
        let body = GraphQlRequest {
            query: CREATE_TRANSCRIPT_MUTATION,
            variables: CreateTranscriptVariables { input: record },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref api_key) = self.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RecordError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RecordError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RecordError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let transcript = parse_create_response(&text)?;

        debug!(record_id = %transcript.id, "Transcript record created");

        Ok(transcript)
    }
}

/// Extract the created transcript from a `createTranscript` response body
fn parse_create_response(body: &str) -> Result<Transcript, RecordError> {
    let response: GraphQlResponse<CreateTranscriptData> =
        serde_json::from_str(body).map_err(|e| RecordError::Transport(e.to_string()))?;

    if !response.errors.is_empty() {
        return Err(RecordError::GraphQl(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }

    response
        .data
        .and_then(|d| d.create_transcript)
        .ok_or(RecordError::EmptyResponse)
}
