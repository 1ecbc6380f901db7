//! Notification relay server: `POST /send` for SMS and email.
use notify_web_axum::{router, AppState};
use notifykit::logging::init_logging;
use notifykit::prelude::*;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let _guard = init_logging(&config.logging)?;

    let channels = ChannelRegistry::new()
        .with(Arc::new(SmsChannel::new(config.sms.clone())?))
        .with(Arc::new(EmailChannel::new(config.email.clone())?));

    let dispatcher = Dispatcher::new(
        Arc::new(RateLimiter::default()),
        channels,
        config.sms.rate_limit,
    );

    let app = router(AppState {
        relay: Arc::new(dispatcher),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "Notification relay listening on {} (rate limit {}/min)",
        addr, config.sms.rate_limit
    );
    axum::serve(listener, app).await?;
    Ok(())
}
