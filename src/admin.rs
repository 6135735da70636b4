use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{SalesStats, User},
    store::Store,
};

const TOP_COURSES: i64 = 5;
const REVENUE_WINDOW_DAYS: i64 = 30;

#[derive(Serialize, Debug, Clone)]
pub struct SalesOverview {
    #[serde(flatten)]
    pub stats: SalesStats,
    pub since: DateTime<Utc>,
}

/// Best sellers and the last 30 days of paid revenue. Staff only.
pub async fn sales_overview(
    store: &dyn Store,
    user: &User,
    now: DateTime<Utc>,
) -> AppResult<SalesOverview> {
    if !user.is_staff {
        tracing::warn!(user_id = %user.id, "stats denied: not staff");
        return Err(AppError::forbidden("staff only"));
    }
    let since = now - Duration::days(REVENUE_WINDOW_DAYS);
    let stats = store.sales_stats(since, TOP_COURSES).await?;
    Ok(SalesOverview { stats, since })
}
