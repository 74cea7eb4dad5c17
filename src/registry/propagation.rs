/// Household propagation engine
///
/// Applies the shared household fields (address, map link, verification)
/// to the head record and then to every member linked to it. Callers run it
/// inside the edit transaction, so a failed dependent write rolls the head
/// write back with it.
use crate::error::{RegistryError, RegistryResult};
use crate::metrics;
use crate::registry::store;
use crate::registry::verification::VerificationStamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

/// Fields shared by every member of a household
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdFields {
    pub address: Option<String>,
    pub map_link: Option<String>,
    /// Present only for user-initiated confirmations
    pub verification: Option<VerificationStamp>,
}

impl HouseholdFields {
    /// Nothing to write
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.map_link.is_none() && self.verification.is_none()
    }

    pub fn with_verification(mut self, stamp: VerificationStamp) -> Self {
        self.verification = Some(stamp);
        self
    }
}

/// Result of one propagation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    pub household_id: i64,
    /// Head plus dependents written; zero when the write was skipped
    pub records_updated: u64,
    pub skipped: bool,
}

/// Propagate `fields` across the household headed by `household_id`
pub async fn propagate(
    conn: &mut SqliteConnection,
    household_id: i64,
    fields: &HouseholdFields,
) -> RegistryResult<PropagationReport> {
    let head = store::find_person(conn, household_id)
        .await?
        .ok_or_else(|| {
            RegistryError::NotFound(format!("Household head {} not found", household_id))
        })?;

    if fields.is_empty() {
        return Ok(PropagationReport {
            household_id: head.person_id,
            records_updated: 0,
            skipped: true,
        });
    }

    if fields.verification.is_none()
        && store::count_divergent_members(conn, household_id, fields).await? == 0
    {
        debug!(household_id, "Household already carries these fields, skipping propagation");
        return Ok(PropagationReport {
            household_id,
            records_updated: 0,
            skipped: true,
        });
    }

    let now = Utc::now();
    let head_updated = store::apply_household_fields_to_head(conn, household_id, fields, now).await?;

    let dependents_updated =
        match store::apply_household_fields_to_dependents(conn, household_id, fields, now).await {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    household_id,
                    error = %e,
                    "household propagation failed after head update"
                );
                metrics::PROPAGATION_FAILURES_TOTAL.inc();
                return Err(e);
            }
        };

    let records_updated = head_updated + dependents_updated;
    metrics::HOUSEHOLD_PROPAGATIONS_TOTAL.inc();
    metrics::RECORDS_PROPAGATED_TOTAL.inc_by(records_updated);

    info!(
        household_id,
        records_updated,
        verified = fields.verification.is_some(),
        "Propagated household fields"
    );

    Ok(PropagationReport {
        household_id,
        records_updated,
        skipped: false,
    })
}
