/// Registry service: the request-level operations on person records
///
/// Each mutation is one short transaction: read current state, decide with
/// the policy, write, commit. Nothing is cached between requests.
use crate::account::Caller;
use crate::config::AuthMode;
use crate::db;
use crate::error::{RegistryError, RegistryResult};
use crate::metrics;
use crate::pagination::{Page, PageRequest};
use crate::registry::person::{Person, PersonChanges};
use crate::registry::policy::{self, AdminAction, DenyReason, EditDecision, ListScope};
use crate::registry::propagation::{self, HouseholdFields};
use crate::registry::store;
use crate::registry::verification::{VerificationStamp, VerificationState};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

/// Search by sabil number
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(alias = "sabilNo")]
    pub location_code: Option<String>,
    pub page: Option<String>,
    #[serde(alias = "limit")]
    pub page_size: Option<String>,
}

impl ListQuery {
    /// Numeric sabil number, or None for an empty or non-numeric input
    pub fn location_code(&self) -> Option<i64> {
        self.location_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .and_then(|code| code.parse().ok())
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.page_size.as_deref())
    }
}

/// How far an edit reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditScope {
    SingleRecord,
    Household,
}

impl EditScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditScope::SingleRecord => "single_record",
            EditScope::Household => "household",
        }
    }
}

/// Result of a person edit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub scope: EditScope,
    /// The edited record, or every live household member after propagation
    pub records: Vec<Person>,
    pub records_updated: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationState>,
    #[serde(skip)]
    pub message: String,
}

/// Result of a soft delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub person_id: i64,
    pub already_deleted: bool,
}

/// Person operations
pub struct RegistryService {
    db: SqlitePool,
    mode: AuthMode,
}

impl RegistryService {
    pub fn new(db: SqlitePool, mode: AuthMode) -> Self {
        Self { db, mode }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// List live records by sabil number; user-role callers see heads only
    pub async fn list_by_location_code(
        &self,
        caller: Option<&Caller>,
        query: &ListQuery,
    ) -> RegistryResult<Page<Person>> {
        let scope = policy::authorize_read(self.mode, caller).map_err(|r| deny(r, "list"))?;
        let request = query.page_request();

        let Some(location_code) = query.location_code() else {
            return Ok(Page::empty(request));
        };

        let heads_only = scope == ListScope::HeadsOnly;
        let mut conn = self.db.acquire().await?;
        let data = store::search_by_location_code(
            &mut conn,
            location_code,
            heads_only,
            request.limit(),
            request.offset(),
        )
        .await?;
        let total = store::count_by_location_code(&mut conn, location_code, heads_only).await?;

        Ok(Page::new(data, request, total))
    }

    /// Single record, soft-deleted ones included
    pub async fn get_person(&self, caller: Option<&Caller>, person_id: i64) -> RegistryResult<Person> {
        policy::authorize_read(self.mode, caller).map_err(|r| deny(r, "get"))?;

        let mut conn = self.db.acquire().await?;
        store::find_person(&mut conn, person_id)
            .await?
            .ok_or_else(|| not_found(person_id))
    }

    /// Live members of the target's household, head first
    pub async fn household_of(&self, caller: Option<&Caller>, person_id: i64) -> RegistryResult<Vec<Person>> {
        policy::authorize_admin_action(caller, AdminAction::ViewHousehold)
            .map_err(|r| deny(r, "household"))?;

        let mut conn = self.db.acquire().await?;
        let target = store::find_person(&mut conn, person_id)
            .await?
            .ok_or_else(|| not_found(person_id))?;

        match target.household_id {
            Some(household_id) => store::household_members(&mut conn, household_id, false).await,
            None => Ok(if target.is_deleted { vec![] } else { vec![target] }),
        }
    }

    /// Admin-only creation of a new, unverified record
    pub async fn create_person(&self, caller: Option<&Caller>, changes: PersonChanges) -> RegistryResult<Person> {
        policy::authorize_admin_action(caller, AdminAction::CreatePerson)
            .map_err(|r| deny(r, "create"))?;

        let person = changes.into_new_person(Utc::now())?;

        let mut tx = db::begin_write(&self.db).await?;
        if store::find_person(&mut tx, person.person_id).await?.is_some() {
            return Err(RegistryError::Conflict(format!(
                "Person {} already exists",
                person.person_id
            )));
        }
        ensure_location_code_free(&mut tx, &person).await?;
        store::insert_person(&mut tx, &person).await?;
        tx.commit().await?;

        info!(person_id = person.person_id, "Created person record");
        Ok(person)
    }

    /// Edit one record. Admins may change every field; user-role callers only
    /// the address of their household head, which propagates and verifies.
    pub async fn edit_person(
        &self,
        caller: Option<&Caller>,
        person_id: i64,
        changes: PersonChanges,
    ) -> RegistryResult<EditOutcome> {
        if caller.is_none() && self.mode == AuthMode::RoleAware {
            return Err(deny(DenyReason::Unauthorized, "edit"));
        }

        let mut tx = db::begin_write(&self.db).await?;
        let target = store::find_person(&mut tx, person_id)
            .await?
            .filter(|p| !p.is_deleted)
            .ok_or_else(|| not_found(person_id))?;

        let outcome = match policy::decide_edit(self.mode, caller, &target) {
            EditDecision::Denied(reason) => return Err(deny(reason, "edit")),
            EditDecision::AddressOnlyEdit => address_only_edit(&mut tx, caller, &target, &changes).await?,
            EditDecision::FullEdit => full_edit(&mut tx, caller, &target, &changes).await?,
        };

        tx.commit().await?;

        metrics::PERSON_EDITS_TOTAL
            .with_label_values(&[outcome.scope.as_str()])
            .inc();
        if outcome.verification.is_some() {
            metrics::VERIFICATIONS_TOTAL.inc();
        }

        Ok(outcome)
    }

    /// Admin-only soft delete; deleting twice is a successful no-op
    pub async fn soft_delete(&self, caller: Option<&Caller>, person_id: i64) -> RegistryResult<DeleteOutcome> {
        policy::authorize_admin_action(caller, AdminAction::DeletePerson)
            .map_err(|r| deny(r, "delete"))?;

        let mut conn = self.db.acquire().await?;
        let target = store::find_person(&mut conn, person_id)
            .await?
            .ok_or_else(|| not_found(person_id))?;

        if target.is_deleted {
            debug!(person_id, "Person already deleted");
            return Ok(DeleteOutcome {
                person_id,
                already_deleted: true,
            });
        }

        let changed = store::soft_delete(&mut conn, person_id, Utc::now()).await?;
        info!(person_id, actor = actor_name(caller), "Soft-deleted person record");

        Ok(DeleteOutcome {
            person_id,
            already_deleted: changed == 0,
        })
    }
}

async fn address_only_edit(
    conn: &mut SqliteConnection,
    caller: Option<&Caller>,
    target: &Person,
    changes: &PersonChanges,
) -> RegistryResult<EditOutcome> {
    let fields = changes.household_fields();
    if fields.is_empty() {
        return Err(RegistryError::Validation(
            "Address or map link is required".to_string(),
        ));
    }

    let ignored = changes.person_specific_fields();
    if !ignored.is_empty() {
        debug!(person_id = target.person_id, ?ignored, "Ignoring non-address fields on user edit");
    }

    let stamp = VerificationStamp::by_caller(caller, Utc::now());
    let verification = VerificationState::of(target).confirm(&stamp);
    let fields = fields.with_verification(stamp);

    let report = propagation::propagate(conn, target.person_id, &fields).await?;
    let records = store::household_members(conn, target.person_id, false).await?;

    info!(
        household_id = target.person_id,
        verifier = actor_name(caller),
        records_updated = report.records_updated,
        "Household address verified"
    );

    Ok(EditOutcome {
        scope: EditScope::Household,
        message: format!("Address updated for all {} household members", records.len()),
        records,
        records_updated: report.records_updated,
        verification: Some(verification),
    })
}

async fn full_edit(
    conn: &mut SqliteConnection,
    caller: Option<&Caller>,
    target: &Person,
    changes: &PersonChanges,
) -> RegistryResult<EditOutcome> {
    changes.validate_full_edit(target.person_id)?;

    let mut updated = target.clone();
    changes.apply_to(&mut updated);
    updated.updated_at = Utc::now();
    ensure_location_code_free(conn, &updated).await?;

    // Resolve the household before any write so a missing head is known up front
    let household = match updated.household_id {
        Some(household_id) if changes.changes_household_fields(target) => {
            if store::find_person(conn, household_id).await?.is_some() {
                Some(household_id)
            } else {
                warn!(
                    person_id = updated.person_id,
                    household_id, "Household head missing, address change stays on this record"
                );
                None
            }
        }
        _ => None,
    };

    store::update_person(conn, &updated).await?;

    let Some(household_id) = household else {
        info!(person_id = updated.person_id, actor = actor_name(caller), "Updated person record");
        return Ok(EditOutcome {
            scope: EditScope::SingleRecord,
            records: vec![updated],
            records_updated: 1,
            verification: None,
            message: "Record updated successfully".to_string(),
        });
    };

    // Admin address edits propagate without stamping verification
    let fields = HouseholdFields {
        verification: None,
        ..changes.household_fields()
    };
    let report = propagation::propagate(conn, household_id, &fields).await?;
    let records = store::household_members(conn, household_id, false).await?;

    info!(
        person_id = updated.person_id,
        household_id,
        actor = actor_name(caller),
        records_updated = report.records_updated,
        "Updated person record and household address"
    );

    Ok(EditOutcome {
        scope: EditScope::Household,
        message: format!("Record updated; address applied to all {} household members", records.len()),
        records,
        records_updated: report.records_updated.max(1),
        verification: None,
    })
}

async fn ensure_location_code_free(conn: &mut SqliteConnection, person: &Person) -> RegistryResult<()> {
    let conflict = store::location_code_conflict(
        conn,
        person.location_code,
        person.person_id,
        person.effective_household(),
    )
    .await?;

    if let Some(other) = conflict {
        debug!(location_code = person.location_code, other, "Sabil number collision");
        return Err(RegistryError::Conflict("Sabil number already exists".to_string()));
    }

    Ok(())
}

fn deny(reason: DenyReason, operation: &'static str) -> RegistryError {
    metrics::DENIED_REQUESTS_TOTAL
        .with_label_values(&[reason.label()])
        .inc();
    warn!(operation, reason = reason.label(), "Request denied");
    reason.into()
}

fn not_found(person_id: i64) -> RegistryError {
    RegistryError::NotFound(format!("Person {} not found", person_id))
}

fn actor_name(caller: Option<&Caller>) -> &str {
    caller.map(|c| c.username.as_str()).unwrap_or("anonymous")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;
    use crate::db;
    use crate::registry::person::fixtures::person;

    fn caller(account_id: &str, role: Role) -> Caller {
        Caller {
            account_id: account_id.to_string(),
            username: account_id.to_string(),
            display_name: None,
            role,
            session_id: format!("session-{}", account_id),
        }
    }

    async fn service(mode: AuthMode) -> RegistryService {
        let pool = db::test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut head = person(1001, Some(1001), 500);
        head.age = Some(60);
        for p in [head, person(1002, Some(1001), 500), person(2001, Some(2001), 600)] {
            store::insert_person(&mut conn, &p).await.unwrap();
        }
        drop(conn);
        RegistryService::new(pool, mode)
    }

    fn address(value: &str) -> PersonChanges {
        PersonChanges {
            address: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn full(person_id: i64, location_code: i64) -> PersonChanges {
        PersonChanges {
            person_id: Some(person_id),
            full_name: Some(format!("Person {}", person_id)),
            location_code: Some(location_code),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_household_edits_queue_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("registry.sqlite"), db::DatabaseOptions::default())
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        {
            let mut conn = pool.acquire().await.unwrap();
            for p in [person(1001, Some(1001), 500), person(1002, Some(1001), 500)] {
                store::insert_person(&mut conn, &p).await.unwrap();
            }
        }

        let service = std::sync::Arc::new(RegistryService::new(pool, AuthMode::RoleAware));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = std::sync::Arc::clone(&service);
                tokio::spawn(async move {
                    let user = caller(&format!("clerk-{}", i), Role::User);
                    service
                        .edit_person(Some(&user), 1001, address(&format!("{} Main St", i)))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.scope, EditScope::Household);
        }

        let admin = caller("admin", Role::Admin);
        let head = service.get_person(Some(&admin), 1001).await.unwrap();
        let dependent = service.get_person(Some(&admin), 1002).await.unwrap();
        assert!(head.verified);
        assert_eq!(head.address, dependent.address);
        assert_eq!(head.verified_by, dependent.verified_by);
        assert_eq!(head.verified_at, dependent.verified_at);
    }

    #[tokio::test]
    async fn test_user_edit_of_dependent_is_forbidden() {
        let service = service(AuthMode::RoleAware).await;
        let user = caller("clerk", Role::User);

        let err = service
            .edit_person(Some(&user), 1002, address("12 Main St"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden(_)));

        let dependent = service.get_person(Some(&user), 1002).await.unwrap();
        assert!(dependent.address.is_none());
    }

    #[tokio::test]
    async fn test_user_edit_ignores_person_specific_fields() {
        let service = service(AuthMode::RoleAware).await;
        let user = caller("clerk", Role::User);

        let changes = PersonChanges {
            full_name: Some("Renamed".to_string()),
            age: Some(1),
            ..address("12 Main St")
        };
        let outcome = service.edit_person(Some(&user), 1001, changes).await.unwrap();
        assert_eq!(outcome.scope, EditScope::Household);

        let head = service.get_person(Some(&user), 1001).await.unwrap();
        assert_eq!(head.full_name, "Person 1001");
        assert_eq!(head.age, Some(60));
        assert_eq!(head.address.as_deref(), Some("12 Main St"));
        assert_eq!(head.verified_by.as_deref(), Some("clerk"));
    }

    #[tokio::test]
    async fn test_user_edit_without_address_is_rejected() {
        let service = service(AuthMode::RoleAware).await;
        let user = caller("clerk", Role::User);

        let changes = PersonChanges {
            age: Some(1),
            ..Default::default()
        };
        let err = service.edit_person(Some(&user), 1001, changes).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_admin_address_edit_propagates_without_verifying() {
        let service = service(AuthMode::RoleAware).await;
        let admin = caller("admin", Role::Admin);

        let changes = PersonChanges {
            household_id: Some(1001),
            ..PersonChanges {
                address: Some("7 Side Rd".to_string()),
                ..full(1002, 500)
            }
        };
        let outcome = service.edit_person(Some(&admin), 1002, changes).await.unwrap();
        assert_eq!(outcome.scope, EditScope::Household);
        assert!(outcome.verification.is_none());
        assert_eq!(outcome.records.len(), 2);
        for record in &outcome.records {
            assert_eq!(record.address.as_deref(), Some("7 Side Rd"));
            assert!(!record.verified);
        }
    }

    #[tokio::test]
    async fn test_admin_edit_rejects_foreign_location_code() {
        let service = service(AuthMode::RoleAware).await;
        let admin = caller("admin", Role::Admin);

        let err = service
            .edit_person(Some(&admin), 1001, full(1001, 600))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_admin_edit_requires_mandatory_fields() {
        let service = service(AuthMode::RoleAware).await;
        let admin = caller("admin", Role::Admin);

        let err = service
            .edit_person(Some(&admin), 1001, address("12 Main St"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_anonymous_edit_follows_auth_mode() {
        let strict = service(AuthMode::RoleAware).await;
        let err = strict.edit_person(None, 1001, full(1001, 500)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));

        let open = service(AuthMode::Open).await;
        let outcome = open
            .edit_person(
                None,
                1001,
                PersonChanges {
                    address: Some("Open Lane".to_string()),
                    ..full(1001, 500)
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.scope, EditScope::Household);
        assert!(outcome.records.iter().all(|p| !p.verified));
    }

    #[tokio::test]
    async fn test_empty_search_skips_the_store() {
        let service = service(AuthMode::RoleAware).await;
        let admin = caller("admin", Role::Admin);
        service.db.close().await;

        for code in [None, Some("   "), Some("abc")] {
            let query = ListQuery {
                location_code: code.map(str::to_string),
                ..Default::default()
            };
            let page = service.list_by_location_code(Some(&admin), &query).await.unwrap();
            assert_eq!(page.pagination.total, 0);
            assert!(page.data.is_empty());
        }
    }

    #[tokio::test]
    async fn test_user_search_sees_heads_only() {
        let service = service(AuthMode::RoleAware).await;
        let query = ListQuery {
            location_code: Some("500".to_string()),
            ..Default::default()
        };

        let admin_page = service
            .list_by_location_code(Some(&caller("admin", Role::Admin)), &query)
            .await
            .unwrap();
        assert_eq!(admin_page.pagination.total, 2);

        let user_page = service
            .list_by_location_code(Some(&caller("clerk", Role::User)), &query)
            .await
            .unwrap();
        assert_eq!(user_page.pagination.total, 1);
        assert_eq!(user_page.data[0].person_id, 1001);
    }

    #[tokio::test]
    async fn test_create_person_is_admin_only() {
        let service = service(AuthMode::RoleAware).await;

        let err = service
            .create_person(Some(&caller("clerk", Role::User)), full(3001, 700))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden(_)));

        let created = service
            .create_person(Some(&caller("admin", Role::Admin)), full(3001, 700))
            .await
            .unwrap();
        assert!(!created.verified);
        assert!(!created.is_deleted);

        let err = service
            .create_person(Some(&caller("admin", Role::Admin)), full(3001, 701))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }
}
