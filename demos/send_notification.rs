//! Send one SMS or email through the dispatcher without starting the server.
use notifykit::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    let action = flag_or_env("--action", "NOTIFY_ACTION")?;
    let to = flag_or_env("--to", "NOTIFY_TO")?;
    let message = flag_or_env("--message", "NOTIFY_MESSAGE")?;

    let mut channels = ChannelRegistry::new().with(Arc::new(SmsChannel::new(config.sms.clone())?));
    if action == "email" {
        channels = channels.with(Arc::new(EmailChannel::new(config.email.clone())?));
    }
    let dispatcher = Dispatcher::new(
        Arc::new(RateLimiter::default()),
        channels,
        config.sms.rate_limit,
    );

    let report = dispatcher
        .dispatch(SendPayload {
            action: Some(action),
            to: Some(to),
            message: Some(message),
            ..SendPayload::default()
        })
        .await?;
    println!(
        "{}: {}\n{}",
        report.result.status.as_str(),
        report.result.detail,
        serde_json::to_string_pretty(&report)?
    );
    Ok(())
}

/// Value following `flag` on the command line, else the `env_key` variable.
fn flag_or_env(flag: &str, env_key: &str) -> Result<String, Box<dyn std::error::Error>> {
    let from_args = std::env::args().skip_while(|arg| arg != flag).nth(1);
    match from_args {
        Some(value) => Ok(value),
        None => std::env::var(env_key)
            .map_err(|_| format!("pass {} <value> or set {}", flag, env_key).into()),
    }
}
