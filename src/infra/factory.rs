use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;
use crate::domain::ports::{
    EmailService, EventRepository, JobRepository, NotificationDispatcher, RateLimitRepository,
    TicketCodeGenerator, TicketRepository,
};
use crate::domain::services::{
    admission::{AdmissionService, AdmissionSettings},
    event_snapshot::EventCapacitySnapshot,
    lifecycle::TicketLifecycleService,
    notification::{load_templates, JobQueueNotifier},
    rate_limiter::{RateLimiter, RegistrationLimits},
    ticket_code::RandomTicketCodeGenerator,
};
use crate::infra::email::http_email_service::HttpEmailService;
use crate::infra::repositories::{
    postgres_event_repo::PostgresEventRepo, postgres_job_repo::PostgresJobRepo,
    postgres_rate_limit_repo::PostgresRateLimitRepo, postgres_ticket_repo::PostgresTicketRepo,
    sqlite_event_repo::SqliteEventRepo, sqlite_job_repo::SqliteJobRepo,
    sqlite_rate_limit_repo::SqliteRateLimitRepo, sqlite_ticket_repo::SqliteTicketRepo,
};

/// One backend's worth of storage adapters.
pub struct Repositories {
    pub event_repo: Arc<dyn EventRepository>,
    pub ticket_repo: Arc<dyn TicketRepository>,
    pub job_repo: Arc<dyn JobRepository>,
    pub rate_limit_repo: Arc<dyn RateLimitRepository>,
}

impl Repositories {
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            event_repo: Arc::new(SqliteEventRepo::new(pool.clone())),
            ticket_repo: Arc::new(SqliteTicketRepo::new(pool.clone())),
            job_repo: Arc::new(SqliteJobRepo::new(pool.clone())),
            rate_limit_repo: Arc::new(SqliteRateLimitRepo::new(pool)),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            event_repo: Arc::new(PostgresEventRepo::new(pool.clone())),
            ticket_repo: Arc::new(PostgresTicketRepo::new(pool.clone())),
            job_repo: Arc::new(PostgresJobRepo::new(pool.clone())),
            rate_limit_repo: Arc::new(PostgresRateLimitRepo::new(pool)),
        }
    }
}

/// Collaborators that tests swap out. `None` means the production default.
#[derive(Default)]
pub struct Overrides {
    pub notifier: Option<Arc<dyn NotificationDispatcher>>,
    pub code_generator: Option<Arc<dyn TicketCodeGenerator>>,
}

pub fn assemble_state(
    config: &Config,
    repos: Repositories,
    email_service: Arc<dyn EmailService>,
    overrides: Overrides,
) -> Result<AppState, AppError> {
    let templates = Arc::new(load_templates()?);

    let notifier = overrides.notifier
        .unwrap_or_else(|| Arc::new(JobQueueNotifier::new(repos.job_repo.clone())));
    let code_generator = overrides.code_generator
        .unwrap_or_else(|| Arc::new(RandomTicketCodeGenerator));

    let admission_service = Arc::new(AdmissionService::new(
        EventCapacitySnapshot::new(repos.event_repo.clone()),
        repos.ticket_repo.clone(),
        code_generator,
        notifier.clone(),
        AdmissionSettings {
            public_base_url: config.public_base_url.clone(),
            max_code_attempts: config.ticket_code_max_attempts,
            pending_hold: config.pending_hold_minutes.map(chrono::Duration::minutes),
        },
    ));

    let lifecycle_service = Arc::new(TicketLifecycleService::new(
        repos.ticket_repo.clone(),
        repos.job_repo.clone(),
        notifier.clone(),
    ));

    let rate_limiter = Arc::new(RateLimiter::new(
        repos.rate_limit_repo.clone(),
        RegistrationLimits {
            ip_max: config.rate_limit_ip_max,
            email_max: config.rate_limit_email_max,
            window_ms: config.rate_limit_window_ms,
        },
    ));

    Ok(AppState {
        config: config.clone(),
        event_repo: repos.event_repo,
        ticket_repo: repos.ticket_repo,
        job_repo: repos.job_repo,
        rate_limit_repo: repos.rate_limit_repo,
        email_service,
        notifier,
        admission_service,
        lifecycle_service,
        rate_limiter,
        templates,
    })
}

pub async fn bootstrap_state(config: &Config) -> Result<AppState, AppError> {
    let email_service = Arc::new(HttpEmailService::new(
        config.mail_service_url.clone(),
        config.mail_service_token.clone(),
    ));

    let repos = if config.is_postgres() {
        info!("Initializing PostgreSQL connection...");
        Repositories::postgres(connect_postgres(&config.database_url).await?)
    } else {
        info!("Initializing SQLite connection with WAL Mode...");
        Repositories::sqlite(connect_sqlite(&config.database_url).await?)
    };

    assemble_state(config, repos, email_service, Overrides::default())
}

pub async fn connect_postgres(database_url: &str) -> Result<PgPool, AppError> {
    let opts: PgConnectOptions = database_url.parse()
        .map_err(|e| AppError::Config(format!("Invalid Postgres URL: {e}")))?;
    let opts = opts.log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(opts)
        .await?;

    sqlx::migrate!("./migrations/postgres")
        .run(&pool)
        .await
        .map_err(|e| AppError::Config(format!("Failed to run Postgres migrations: {e}")))?;
    Ok(pool)
}

pub async fn connect_sqlite(database_url: &str) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    sqlx::migrate!("./migrations/sqlite")
        .run(&pool)
        .await
        .map_err(|e| AppError::Config(format!("Failed to run SQLite migrations: {e}")))?;
    Ok(pool)
}
