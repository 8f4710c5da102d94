//! `tracing-subscriber` bootstrap, mirroring
//! `broz_shared::middleware::init_tracing`: env-filter driven, JSON layer
//! in production, pretty layer otherwise.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{service_name}=debug,tower_http=debug")));

    let is_production = std::env::var("DIALOGUE_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    if is_production {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    tracing::info!(service = service_name, "tracing initialized");
}
