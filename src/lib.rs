pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use state::SyncRuntime;

/// ログ設定の初期化。二度目以降の呼び出しは無視される。
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "delivery_notes=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
