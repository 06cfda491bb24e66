use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use evendemy_server::config::{Config, StoreKind};
use evendemy_server::images::FsImageStore;
use evendemy_server::notifications::smtp::SmtpTransport;
use evendemy_server::notifications::{
    ChannelOutbox, Dispatcher, LogTransport, MailTransport, RetryPolicy,
};
use evendemy_server::routes::create_routes;
use evendemy_server::state::AppState;
use evendemy_server::store::{MeetingStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store: Arc<dyn MeetingStore> = match config.store {
        StoreKind::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Successfully connected to database");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("Migrations run successfully");
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let templates = config
        .load_mail_templates()
        .expect("Failed to load mail templates");

    let transport: Arc<dyn MailTransport> = match (&config.smtp_host, config.production) {
        (Some(host), true) => {
            tracing::info!(host = %host, port = config.smtp_port, "Sending mails via SMTP");
            Arc::new(SmtpTransport::new(
                host.clone(),
                config.smtp_port,
                config.calendar_domain.clone(),
            ))
        }
        _ => {
            tracing::info!("Mails are logged, not sent");
            Arc::new(LogTransport)
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        transport,
        templates,
        config.mail_from.clone(),
    ));
    let (outbox, _worker) = ChannelOutbox::spawn(
        dispatcher,
        RetryPolicy {
            max_attempts: config.dispatch_attempts,
            ..RetryPolicy::default()
        },
    );

    let state = AppState::new(
        store,
        Arc::new(outbox),
        Arc::new(FsImageStore::new(config.image_folder.clone())),
        config.calendar_settings(),
    );
    let app = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
