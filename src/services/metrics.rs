use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec};
use sqlx::PgPool;
use tracing::{info, warn};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref APPROVAL_DECISIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_approval_decisions_total",
        "Parental approval decisions by kind",
        &["decision"]
    ).unwrap();

    pub static ref JOIN_REQUESTS_COUNTER: CounterVec = register_counter_vec!(
        "api_join_requests_total",
        "Ryd join requests by initial manifest status",
        &["initial_status"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref USERS_GAUGE: GaugeVec = register_gauge_vec!(
        "rydz_users_total",
        "Users by role",
        &["role"]
    ).unwrap();

    pub static ref ACTIVE_RYDZ_GAUGE: Gauge = register_gauge!(
        "rydz_active_total",
        "Rydz in planning, open or in-progress state"
    ).unwrap();

    pub static ref PENDING_APPROVALS_GAUGE: Gauge = register_gauge!(
        "rydz_pending_parent_approvals_total",
        "Manifest entries awaiting a parent decision"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        if let Err(e) = collect(&pool).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let user_counts: Vec<(String, i64)> =
        sqlx::query_as("SELECT role, COUNT(*)::BIGINT FROM users GROUP BY role")
            .fetch_all(pool)
            .await?;
    for (role, count) in user_counts {
        USERS_GAUGE.with_label_values(&[&role]).set(count as f64);
    }

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*)::BIGINT FROM rydz WHERE status IN ('planning', 'open', 'in_progress')",
    )
    .fetch_one(pool)
    .await?;
    ACTIVE_RYDZ_GAUGE.set(active as f64);

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*)::BIGINT FROM ryd_passengers WHERE status = 'pending_parent_approval'",
    )
    .fetch_one(pool)
    .await?;
    PENDING_APPROVALS_GAUGE.set(pending as f64);

    info!("Metrics: collected");
    Ok(())
}
