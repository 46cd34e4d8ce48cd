use crate::model::DelegatedCredentials;
use async_trait::async_trait;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client;
use thiserror::Error;
use tracing::{info, instrument};

/// Lifetime of issued credentials (15 minutes)
pub const SESSION_DURATION_SECS: i32 = 900;

/// External id the assumed role's trust policy expects
pub const EXTERNAL_ID: &str = "AI_Powered_SA_for_AC";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialError {
    #[error("Failed to assume role: {0}")]
    AssumeRoleFailed(String),

    #[error("Assume role response carried no credentials")]
    MissingCredentials,
}

/// Issues short-lived delegated credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Issue credentials for a session named after the caller's contact
    async fn issue(&self, session_name: &str) -> Result<DelegatedCredentials, CredentialError>;
}

/// STS AssumeRole credential issuer
pub struct StsCredentialIssuer {
    client: Client,
    role_arn: String,
}

impl StsCredentialIssuer {
    pub fn new(client: Client, role_arn: impl Into<String>) -> Self {
        Self {
            client,
            role_arn: role_arn.into(),
        }
    }
}

#[async_trait]
impl CredentialIssuer for StsCredentialIssuer {
    #[instrument(skip(self), fields(role_arn = %self.role_arn))]
    async fn issue(&self, session_name: &str) -> Result<DelegatedCredentials, CredentialError> {
        let output = self
            .client
            .assume_role()
            .role_arn(&self.role_arn)
            .role_session_name(session_name)
            .external_id(EXTERNAL_ID)
            .duration_seconds(SESSION_DURATION_SECS)
            .send()
            .await
            .map_err(|e| CredentialError::AssumeRoleFailed(DisplayErrorContext(e).to_string()))?;

        let credentials = output
            .credentials()
            .ok_or(CredentialError::MissingCredentials)?;

        info!(
            expiration = ?credentials.expiration(),
            "Issued delegated credentials"
        );

        Ok(DelegatedCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
        })
    }
}
