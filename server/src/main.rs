use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use edupremium_server::config::Config;
use edupremium_server::jobs::scheduler;
use edupremium_server::routes::create_routes;
use edupremium_server::services::gateway::{ParatikaGateway, PaymentGateway};
use edupremium_server::services::meetings::{DailyClient, MeetingProvider};
use edupremium_server::services::notifications::Notifier;
use edupremium_server::state::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("edupremium_server=debug,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        ParatikaGateway::new(config.paratika.clone()).expect("Failed to build payment gateway"),
    );
    let notifier = Notifier::from_config(&config).expect("Failed to build notifier");
    let meetings: Option<Arc<dyn MeetingProvider>> = match &config.daily {
        Some(daily) => Some(Arc::new(
            DailyClient::new(daily.clone()).expect("Failed to build meeting client"),
        )),
        None => {
            tracing::warn!("DAILY_API_KEY not set, lessons will have no meeting links");
            None
        }
    };

    let addr = config.server_addr();
    let scheduler_config = config.scheduler.clone();
    let state = AppState {
        pool,
        config: Arc::new(config),
        gateway,
        notifier,
        meetings,
    };

    let cancel = CancellationToken::new();
    let scheduler_handle = scheduler_config.enabled.then(|| {
        tokio::spawn(scheduler::run(
            state.clone(),
            scheduler_config.interval_secs,
            cancel.clone(),
        ))
    });

    let app = create_routes(state);

    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");
    tracing::info!(%addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    cancel.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        tracing::info!("Job scheduler stopped");
    }
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
