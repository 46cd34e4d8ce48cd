use anyhow::Context;
use aws_config::BehaviorVersion;
use chrono::Utc;
use contact_init::{Config, ContactFlowEvent, ContactInitHandler, DynamoContactStore, StsCredentialIssuer};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load().context("Failed to load configuration")?;

    init_tracing(&config.log_level);

    let time_zone = config.tz()?;
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;

    let handler = ContactInitHandler::new(
        Arc::new(DynamoContactStore::new(
            aws_sdk_dynamodb::Client::new(&aws_config),
            config.table_name.clone(),
        )),
        Arc::new(StsCredentialIssuer::new(
            aws_sdk_sts::Client::new(&aws_config),
            config.assume_role.clone(),
        )),
        time_zone,
    );

    info!(table = %config.table_name, time_zone = %time_zone, "Contact init handler ready");

    let func = service_fn(move |event: LambdaEvent<ContactFlowEvent>| {
        let handler = handler.clone();
        async move { Ok::<_, Error>(handler.handle(&event.payload, Utc::now()).await) }
    });

    run(func).await
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_ansi(false).without_time())
        .init();
}
