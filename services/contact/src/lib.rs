//! Callscribe Contact Init
//!
//! Invoked by the contact flow when a call starts. Records the caller's phone
//! number and call time against the contact id, then assumes a narrowly
//! scoped role so the flow can hand 15-minute credentials to the audio
//! streaming consumer.
//!
//! The response always has the same shape; callers check `lambdaResult`
//! rather than relying on an invocation error.

pub mod config;
pub mod contact_store;
pub mod credentials;
pub mod handler;
pub mod model;

pub use config::Config;
pub use contact_store::{CallStamp, ContactStore, DynamoContactStore};
pub use credentials::{CredentialIssuer, StsCredentialIssuer};
pub use handler::ContactInitHandler;
pub use model::{ContactFlowEvent, CredentialsResponse, DelegatedCredentials, LambdaResult};
