use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use roster_attendance::config::AppConfig;
use roster_attendance::services::{AttendancePolicy, AttendanceRecorder, WindowRegistry};
use roster_attendance::store::{PgAttendanceStore, PgWindowStore};
use roster_attendance::{routes, AppState};
use roster_notification::push::relay::RelayTransport;
use roster_notification::store::{PgNotificationStore, PgSubscriptionStore};
use roster_notification::{NotificationService, PushDelivery};
use roster_shared::audit::{ActivityLog, PgActivityLog};
use roster_shared::clients::db::create_pool;
use roster_shared::clock::{Clock, SystemClock};
use roster_shared::directory::{MemberDirectory, PgMemberDirectory};
use roster_shared::middleware::JWT_SECRET_ENV;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roster_shared::middleware::init_tracing("roster-attendance");

    let config = AppConfig::load()?;
    let port = config.port;
    let policy = AttendancePolicy::from_config(&config)?;

    // The auth extractors read the verification key from the environment.
    std::env::set_var(JWT_SECRET_ENV, &config.jwt_secret);

    let db = create_pool(&config.database_url)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let directory: Arc<dyn MemberDirectory> = Arc::new(PgMemberDirectory::new(db.clone()));
    let activity: Arc<dyn ActivityLog> = Arc::new(PgActivityLog::new(db.clone()));

    let transport = RelayTransport::new(
        reqwest::Client::new(),
        &config.push_relay_url,
        &config.push_relay_api_key,
    );
    let push = Arc::new(PushDelivery::new(
        Arc::new(PgSubscriptionStore::new(db.clone())),
        Arc::new(transport),
        config.push_timeout(),
    ));
    let notifications = Arc::new(NotificationService::new(
        Arc::new(PgNotificationStore::new(db.clone())),
        push,
        directory.clone(),
        activity.clone(),
        clock.clone(),
    ));

    let windows = Arc::new(WindowRegistry::new(
        Arc::new(PgWindowStore::new(db.clone())),
        activity.clone(),
        clock.clone(),
        policy.offset,
    ));
    let recorder = Arc::new(AttendanceRecorder::new(
        Arc::new(PgAttendanceStore::new(db.clone())),
        windows.clone(),
        notifications.clone(),
        directory,
        activity.clone(),
        clock,
        policy,
    ));

    tracing::info!(
        repeat_check_in = ?policy.repeat_check_in,
        classify_lateness = policy.classify_lateness,
        utc_offset = %policy.offset,
        "attendance policy loaded"
    );

    let state = Arc::new(AppState { db, recorder, windows, activity });

    let app = routes::router()
        .with_state(state)
        .merge(roster_notification::routes::router().with_state(notifications))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "roster-attendance starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
