use serde::{Deserialize, Serialize};

/// Invocation event sent by the contact flow
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactFlowEvent {
    pub details: ContactFlowDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactFlowDetails {
    pub contact_data: ContactData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactData {
    pub contact_id: String,
    pub customer_endpoint: CustomerEndpoint,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerEndpoint {
    /// Caller phone number
    pub address: String,
    #[serde(rename = "Type")]
    pub endpoint_type: Option<String>,
}

impl ContactFlowEvent {
    pub fn contact_id(&self) -> &str {
        &self.details.contact_data.contact_id
    }

    pub fn customer_phone_number(&self) -> &str {
        &self.details.contact_data.customer_endpoint.address
    }
}

/// Short-lived credentials issued for one contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LambdaResult {
    Success,
    Error,
}

/// Response returned to the contact flow. Callers must check `lambdaResult`;
/// on error the credential fields are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    pub lambda_result: LambdaResult,
    pub aid: String,
    pub sak: String,
    pub sst: String,
}

impl CredentialsResponse {
    pub fn success(credentials: DelegatedCredentials) -> Self {
        Self {
            lambda_result: LambdaResult::Success,
            aid: credentials.access_key_id,
            sak: credentials.secret_access_key,
            sst: credentials.session_token,
        }
    }

    pub fn error() -> Self {
        Self {
            lambda_result: LambdaResult::Error,
            aid: String::new(),
            sak: String::new(),
            sst: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_contact_flow_event() {
        let raw = r#"{
            "Name": "ContactFlowEvent",
            "Details": {
                "ContactData": {
                    "Channel": "VOICE",
                    "ContactId": "4a573372-1f28-4e26-b97b-XXXXXXXXXXX",
                    "CustomerEndpoint": {"Address": "+12025550123", "Type": "TELEPHONE_NUMBER"},
                    "InitiationMethod": "INBOUND"
                },
                "Parameters": {}
            }
        }"#;

        let event: ContactFlowEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.contact_id(), "4a573372-1f28-4e26-b97b-XXXXXXXXXXX");
        assert_eq!(event.customer_phone_number(), "+12025550123");
    }

    #[test]
    fn test_error_response_shape() {
        let value = serde_json::to_value(CredentialsResponse::error()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"lambdaResult": "Error", "aid": "", "sak": "", "sst": ""})
        );
    }

    #[test]
    fn test_success_response_shape() {
        let response = CredentialsResponse::success(DelegatedCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
        });
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["lambdaResult"], "Success");
        assert_eq!(value["aid"], "ASIAEXAMPLE");
        assert_eq!(value["sak"], "secret");
        assert_eq!(value["sst"], "token");
    }
}
