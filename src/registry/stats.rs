/// Household statistics
///
/// Read-only. Every count is taken over live head-of-household records, so
/// dependents never inflate household numbers.
use crate::account::Caller;
use crate::error::{RegistryError, RegistryResult};
use crate::registry::policy::{self, AdminAction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::warn;

const LEADERBOARD_SIZE: i64 = 10;
const RECENT_SIZE: i64 = 10;

/// Verified households attributed to one verifier
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct LeaderboardEntry {
    pub identity: String,
    pub count: i64,
}

/// A recently verified household
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentVerification {
    pub location_code: i64,
    pub full_name: String,
    pub verified_by: String,
    pub verified_at: DateTime<Utc>,
}

/// Dashboard statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatistics {
    pub total_households: i64,
    pub verified_households: i64,
    pub unverified_households: i64,
    pub total_accounts: i64,
    pub verification_leaderboard: Vec<LeaderboardEntry>,
    pub recent_verifications: Vec<RecentVerification>,
}

pub struct StatisticsAggregator {
    db: SqlitePool,
}

impl StatisticsAggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Admin-only view of the statistics
    pub async fn statistics_for(&self, caller: Option<&Caller>) -> RegistryResult<RegistryStatistics> {
        policy::authorize_admin_action(caller, AdminAction::ViewStatistics).map_err(|reason| {
            warn!(reason = reason.label(), "Statistics request denied");
            RegistryError::from(reason)
        })?;

        self.compute().await
    }

    /// Compute every figure from the current store state
    pub async fn compute(&self) -> RegistryResult<RegistryStatistics> {
        let (total_households, verified_households): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN verified = 1 THEN 1 ELSE 0 END), 0)
             FROM persons
             WHERE person_id = household_id AND is_deleted = 0",
        )
        .fetch_one(&self.db)
        .await?;

        let total_accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.db)
            .await?;

        let verification_leaderboard = sqlx::query_as::<_, LeaderboardEntry>(
            "SELECT verified_by AS identity, COUNT(*) AS count
             FROM persons
             WHERE person_id = household_id
               AND is_deleted = 0
               AND verified = 1
               AND verified_by IS NOT NULL
             GROUP BY verified_by
             ORDER BY count DESC, identity ASC
             LIMIT ?1",
        )
        .bind(LEADERBOARD_SIZE)
        .fetch_all(&self.db)
        .await?;

        let recent_verifications = sqlx::query_as::<_, RecentVerification>(
            "SELECT location_code, full_name, verified_by, verified_at
             FROM persons
             WHERE person_id = household_id
               AND is_deleted = 0
               AND verified = 1
               AND verified_by IS NOT NULL
               AND verified_at IS NOT NULL
             ORDER BY verified_at DESC
             LIMIT ?1",
        )
        .bind(RECENT_SIZE)
        .fetch_all(&self.db)
        .await?;

        Ok(RegistryStatistics {
            total_households,
            verified_households,
            unverified_households: total_households - verified_households,
            total_accounts,
            verification_leaderboard,
            recent_verifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;
    use crate::db;
    use crate::registry::person::fixtures::person;
    use crate::registry::store;
    use chrono::Duration;

    async fn verified_head(pool: &SqlitePool, person_id: i64, verifier: &str, at: DateTime<Utc>) {
        let mut head = person(person_id, Some(person_id), person_id);
        head.verified = true;
        head.verified_by = Some(verifier.to_string());
        head.verified_at = Some(at);
        let mut conn = pool.acquire().await.unwrap();
        store::insert_person(&mut conn, &head).await.unwrap();
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_count_then_identity() {
        let pool = db::test_pool().await.unwrap();
        let now = Utc::now();
        let mut next_id = 1;
        for (verifier, count) in [("A", 5), ("C", 9), ("B", 9)] {
            for _ in 0..count {
                verified_head(&pool, next_id, verifier, now).await;
                next_id += 1;
            }
        }

        let stats = StatisticsAggregator::new(pool).compute().await.unwrap();
        let order: Vec<(&str, i64)> = stats
            .verification_leaderboard
            .iter()
            .map(|e| (e.identity.as_str(), e.count))
            .collect();
        assert_eq!(order, vec![("B", 9), ("C", 9), ("A", 5)]);
        assert_eq!(stats.total_households, 23);
        assert_eq!(stats.verified_households, 23);
        assert_eq!(stats.unverified_households, 0);
    }

    #[tokio::test]
    async fn test_dependents_and_deleted_heads_are_not_counted() {
        let pool = db::test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let mut dependent = person(1002, Some(1001), 777);
        dependent.verified = true;
        dependent.verified_by = Some("clerk".to_string());
        dependent.verified_at = Some(Utc::now());
        let mut deleted_head = person(3001, Some(3001), 900);
        deleted_head.is_deleted = true;

        for p in [person(1001, Some(1001), 500), dependent, person(2001, Some(2001), 600), deleted_head] {
            store::insert_person(&mut conn, &p).await.unwrap();
        }
        drop(conn);

        let stats = StatisticsAggregator::new(pool).compute().await.unwrap();
        assert_eq!(stats.total_households, 2);
        assert_eq!(stats.verified_households, 0);
        assert_eq!(stats.unverified_households, 2);
        assert!(stats.verification_leaderboard.is_empty());
        assert!(stats.recent_verifications.is_empty());
    }

    #[tokio::test]
    async fn test_recent_verifications_newest_first() {
        let pool = db::test_pool().await.unwrap();
        let now = Utc::now();
        for offset in 0..12 {
            verified_head(&pool, 100 + offset, "clerk", now - Duration::minutes(offset)).await;
        }

        let stats = StatisticsAggregator::new(pool).compute().await.unwrap();
        assert_eq!(stats.recent_verifications.len(), 10);
        assert_eq!(stats.recent_verifications[0].location_code, 100);
        assert_eq!(stats.recent_verifications[9].location_code, 109);
    }

    #[tokio::test]
    async fn test_statistics_require_admin() {
        let pool = db::test_pool().await.unwrap();
        let aggregator = StatisticsAggregator::new(pool);
        let user = Caller {
            account_id: "u1".to_string(),
            username: "clerk".to_string(),
            display_name: None,
            role: Role::User,
            session_id: "s1".to_string(),
        };

        assert!(matches!(
            aggregator.statistics_for(None).await,
            Err(RegistryError::Unauthorized(_))
        ));
        assert!(matches!(
            aggregator.statistics_for(Some(&user)).await,
            Err(RegistryError::Forbidden(_))
        ));
    }
}
