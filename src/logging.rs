//! Tracing bootstrap and log redaction helpers.

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Install a compact console subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this more than
/// once, or after another subscriber was installed, is a no-op.
pub fn init(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_string()))
        .compact();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

/// Mask the password of a connection URL for logging.
///
/// Strings that do not parse as URLs are replaced entirely, since they may
/// still carry credentials.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return "<unparseable url>".to_string();
    };

    if url.password().is_some() && url.set_password(Some("***")).is_err() {
        return "<unparseable url>".to_string();
    }
    url.to_string()
}
