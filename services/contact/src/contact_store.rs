use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, instrument};

const UPDATE_EXPRESSION: &str =
    "SET customerPhoneNumber = :var1, callDate = :var2, callTimestamp = :var3";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContactStoreError {
    #[error("Failed to update contact record: {0}")]
    UpdateFailed(String),
}

/// Caller details stamped onto a contact record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStamp {
    pub customer_phone_number: String,
    /// Local date, e.g. `10/19/2026`
    pub call_date: String,
    /// Local time, e.g. `Mon Oct 19 2026 10:04:05 GMT-0400 (EDT)`
    pub call_timestamp: String,
}

impl CallStamp {
    pub fn new(customer_phone_number: impl Into<String>, at: DateTime<Utc>, time_zone: Tz) -> Self {
        let local = at.with_timezone(&time_zone);

        Self {
            customer_phone_number: customer_phone_number.into(),
            call_date: local.format("%-m/%-d/%Y").to_string(),
            call_timestamp: local.format("%a %b %d %Y %H:%M:%S GMT%z (%Z)").to_string(),
        }
    }
}

/// Keyed store of contact records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Set the caller details on the record for `contact_id`, creating it if absent
    async fn record_call(&self, contact_id: &str, stamp: &CallStamp)
        -> Result<(), ContactStoreError>;
}

/// DynamoDB-backed contact store
pub struct DynamoContactStore {
    client: Client,
    table: String,
}

impl DynamoContactStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ContactStore for DynamoContactStore {
    #[instrument(skip(self, stamp), fields(table = %self.table))]
    async fn record_call(
        &self,
        contact_id: &str,
        stamp: &CallStamp,
    ) -> Result<(), ContactStoreError> {
        let output = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("ContactId", AttributeValue::S(contact_id.to_string()))
            .update_expression(UPDATE_EXPRESSION)
            .expression_attribute_values(
                ":var1",
                AttributeValue::S(stamp.customer_phone_number.clone()),
            )
            .expression_attribute_values(":var2", AttributeValue::S(stamp.call_date.clone()))
            .expression_attribute_values(
                ":var3",
                AttributeValue::S(stamp.call_timestamp.clone()),
            )
            .send()
            .await
            .map_err(|e| ContactStoreError::UpdateFailed(DisplayErrorContext(e).to_string()))?;

        debug!(attributes = ?output.attributes(), "Updated contact record");

        Ok(())
    }
}
