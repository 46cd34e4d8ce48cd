use crate::contact_store::{CallStamp, ContactStore};
use crate::credentials::CredentialIssuer;
use crate::model::{ContactFlowEvent, CredentialsResponse};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Stamps caller details onto the contact record, then issues delegated
/// credentials for the contact's session.
#[derive(Clone)]
pub struct ContactInitHandler {
    store: Arc<dyn ContactStore>,
    issuer: Arc<dyn CredentialIssuer>,
    time_zone: Tz,
}

impl ContactInitHandler {
    pub fn new(
        store: Arc<dyn ContactStore>,
        issuer: Arc<dyn CredentialIssuer>,
        time_zone: Tz,
    ) -> Self {
        Self {
            store,
            issuer,
            time_zone,
        }
    }

    /// Handle one contact flow invocation.
    ///
    /// A failed record update is logged and does not block credential
    /// issuance. A failed issuance yields the error-shaped response.
    #[instrument(skip_all, fields(contact_id = %event.contact_id()))]
    pub async fn handle(&self, event: &ContactFlowEvent, now: DateTime<Utc>) -> CredentialsResponse {
        let contact_id = event.contact_id();
        let stamp = CallStamp::new(event.customer_phone_number(), now, self.time_zone);

        match self.store.record_call(contact_id, &stamp).await {
            Ok(()) => info!(call_date = %stamp.call_date, "Contact record updated"),
            Err(e) => error!(error = %e, "Unable to update contact record"),
        }

        match self.issuer.issue(contact_id).await {
            Ok(credentials) => CredentialsResponse::success(credentials),
            Err(e) => {
                error!(error = %e, "Returning error to contact flow");
                CredentialsResponse::error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact_store::{ContactStoreError, MockContactStore};
    use crate::credentials::{CredentialError, MockCredentialIssuer};
    use crate::model::{DelegatedCredentials, LambdaResult};
    use chrono::TimeZone;
    use mockall::Sequence;

    const CONTACT_ID: &str = "4a573372-1f28-4e26-b97b-000000000001";

    fn event() -> ContactFlowEvent {
        serde_json::from_value(serde_json::json!({
            "Details": {
                "ContactData": {
                    "ContactId": CONTACT_ID,
                    "CustomerEndpoint": {"Address": "+12025550123", "Type": "TELEPHONE_NUMBER"}
                }
            }
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 4, 5).unwrap()
    }

    fn credentials() -> DelegatedCredentials {
        DelegatedCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
        }
    }

    fn handler(store: MockContactStore, issuer: MockCredentialIssuer) -> ContactInitHandler {
        ContactInitHandler::new(
            Arc::new(store),
            Arc::new(issuer),
            chrono_tz::America::New_York,
        )
    }

    #[tokio::test]
    async fn test_updates_record_then_issues_credentials() {
        let mut seq = Sequence::new();

        let mut store = MockContactStore::new();
        store
            .expect_record_call()
            .withf(|contact_id, stamp| {
                contact_id == CONTACT_ID
                    && stamp.customer_phone_number == "+12025550123"
                    && stamp.call_date == "10/19/2026"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut issuer = MockCredentialIssuer::new();
        issuer
            .expect_issue()
            .withf(|session_name| session_name == CONTACT_ID)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(credentials()));

        let response = handler(store, issuer).handle(&event(), now()).await;

        assert_eq!(response, CredentialsResponse::success(credentials()));
    }

    #[tokio::test]
    async fn test_record_failure_still_issues_credentials() {
        let mut store = MockContactStore::new();
        store.expect_record_call().returning(|_, _| {
            Err(ContactStoreError::UpdateFailed(
                "ResourceNotFoundException".to_string(),
            ))
        });

        let mut issuer = MockCredentialIssuer::new();
        issuer
            .expect_issue()
            .times(1)
            .returning(|_| Ok(credentials()));

        let response = handler(store, issuer).handle(&event(), now()).await;

        assert_eq!(response.lambda_result, LambdaResult::Success);
        assert_eq!(response.aid, "ASIAEXAMPLE");
    }

    #[tokio::test]
    async fn test_issuance_failure_returns_empty_credentials() {
        let mut store = MockContactStore::new();
        store.expect_record_call().returning(|_, _| Ok(()));

        let mut issuer = MockCredentialIssuer::new();
        issuer
            .expect_issue()
            .returning(|_| Err(CredentialError::AssumeRoleFailed("AccessDenied".to_string())));

        let response = handler(store, issuer).handle(&event(), now()).await;

        assert_eq!(response, CredentialsResponse::error());
        assert!(response.aid.is_empty());
        assert!(response.sak.is_empty());
        assert!(response.sst.is_empty());
    }
}
