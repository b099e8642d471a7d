use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod events;
pub mod server;
pub mod sink;
pub mod submit;

pub fn set_up_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}
