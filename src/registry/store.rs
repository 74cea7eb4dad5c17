/// Person queries against the SQLite record store
///
/// Every function takes a connection so the same query can run on a pooled
/// connection or inside an edit transaction.
use crate::error::{RegistryError, RegistryResult};
use crate::registry::person::Person;
use crate::registry::propagation::HouseholdFields;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

const PERSON_COLUMNS: &str = "person_id, household_id, full_name, age, gender, location_code, \
     sector, contact_number, covenant_status, marital_status, address, map_link, \
     assistant_name, assistant_contact, is_deleted, verified, verified_by, verified_at, \
     created_at, updated_at";

/// Point lookup by person id (soft-deleted rows included)
pub async fn find_person(conn: &mut SqliteConnection, person_id: i64) -> RegistryResult<Option<Person>> {
    let person = sqlx::query_as::<_, Person>(&format!(
        "SELECT {} FROM persons WHERE person_id = ?1",
        PERSON_COLUMNS
    ))
    .bind(person_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(person)
}

/// Insert a new person
pub async fn insert_person(conn: &mut SqliteConnection, person: &Person) -> RegistryResult<()> {
    sqlx::query(
        "INSERT INTO persons (person_id, household_id, full_name, age, gender, location_code,
                              sector, contact_number, covenant_status, marital_status, address,
                              map_link, assistant_name, assistant_contact, is_deleted, verified,
                              verified_by, verified_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
    )
    .bind(person.person_id)
    .bind(person.household_id)
    .bind(&person.full_name)
    .bind(person.age)
    .bind(&person.gender)
    .bind(person.location_code)
    .bind(&person.sector)
    .bind(&person.contact_number)
    .bind(&person.covenant_status)
    .bind(&person.marital_status)
    .bind(&person.address)
    .bind(&person.map_link)
    .bind(&person.assistant_name)
    .bind(&person.assistant_contact)
    .bind(person.is_deleted)
    .bind(person.verified)
    .bind(&person.verified_by)
    .bind(person.verified_at)
    .bind(person.created_at)
    .bind(person.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| unique_violation_as_conflict(e, "Person ID or Sabil number already exists"))?;

    Ok(())
}

/// Write the editable fields of a single record. Verification columns are left alone.
pub async fn update_person(conn: &mut SqliteConnection, person: &Person) -> RegistryResult<()> {
    let result = sqlx::query(
        "UPDATE persons
         SET household_id = ?1, full_name = ?2, age = ?3, gender = ?4, location_code = ?5,
             sector = ?6, contact_number = ?7, covenant_status = ?8, marital_status = ?9,
             address = ?10, map_link = ?11, assistant_name = ?12, assistant_contact = ?13,
             updated_at = ?14
         WHERE person_id = ?15",
    )
    .bind(person.household_id)
    .bind(&person.full_name)
    .bind(person.age)
    .bind(&person.gender)
    .bind(person.location_code)
    .bind(&person.sector)
    .bind(&person.contact_number)
    .bind(&person.covenant_status)
    .bind(&person.marital_status)
    .bind(&person.address)
    .bind(&person.map_link)
    .bind(&person.assistant_name)
    .bind(&person.assistant_contact)
    .bind(person.updated_at)
    .bind(person.person_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| unique_violation_as_conflict(e, "Sabil number already exists"))?;

    if result.rows_affected() == 0 {
        return Err(RegistryError::NotFound(format!(
            "Person {} not found",
            person.person_id
        )));
    }

    Ok(())
}

/// A record of another household already using `location_code`
pub async fn location_code_conflict(
    conn: &mut SqliteConnection,
    location_code: i64,
    person_id: i64,
    household: i64,
) -> RegistryResult<Option<i64>> {
    let conflict: Option<i64> = sqlx::query_scalar(
        "SELECT person_id FROM persons
         WHERE location_code = ?1
           AND person_id != ?2
           AND COALESCE(household_id, person_id) != ?3
         LIMIT 1",
    )
    .bind(location_code)
    .bind(person_id)
    .bind(household)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(conflict)
}

/// One page of live records carrying `location_code`, oldest members first
pub async fn search_by_location_code(
    conn: &mut SqliteConnection,
    location_code: i64,
    heads_only: bool,
    limit: i64,
    offset: i64,
) -> RegistryResult<Vec<Person>> {
    let persons = sqlx::query_as::<_, Person>(&format!(
        "SELECT {} FROM persons
         WHERE location_code = ?1
           AND is_deleted = 0
           AND (?2 = 0 OR person_id = household_id)
         ORDER BY age DESC, person_id DESC
         LIMIT ?3 OFFSET ?4",
        PERSON_COLUMNS
    ))
    .bind(location_code)
    .bind(heads_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(persons)
}

/// Total behind `search_by_location_code`
pub async fn count_by_location_code(
    conn: &mut SqliteConnection,
    location_code: i64,
    heads_only: bool,
) -> RegistryResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM persons
         WHERE location_code = ?1
           AND is_deleted = 0
           AND (?2 = 0 OR person_id = household_id)",
    )
    .bind(location_code)
    .bind(heads_only)
    .fetch_one(&mut *conn)
    .await?;

    Ok(total)
}

/// Every record linked to `household_id`, head first
pub async fn household_members(
    conn: &mut SqliteConnection,
    household_id: i64,
    include_deleted: bool,
) -> RegistryResult<Vec<Person>> {
    let members = sqlx::query_as::<_, Person>(&format!(
        "SELECT {} FROM persons
         WHERE household_id = ?1
           AND (?2 = 1 OR is_deleted = 0)
         ORDER BY (person_id = household_id) DESC, person_id ASC",
        PERSON_COLUMNS
    ))
    .bind(household_id)
    .bind(include_deleted)
    .fetch_all(&mut *conn)
    .await?;

    Ok(members)
}

/// Mark a record deleted; the row stays in the store
pub async fn soft_delete(conn: &mut SqliteConnection, person_id: i64, now: DateTime<Utc>) -> RegistryResult<u64> {
    let result = sqlx::query(
        "UPDATE persons SET is_deleted = 1, updated_at = ?1 WHERE person_id = ?2 AND is_deleted = 0",
    )
    .bind(now)
    .bind(person_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Members of the household whose address or map link differ from `fields`
pub async fn count_divergent_members(
    conn: &mut SqliteConnection,
    household_id: i64,
    fields: &HouseholdFields,
) -> RegistryResult<i64> {
    let mut builder: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM persons WHERE household_id = ");
    builder.push_bind(household_id);
    builder.push(" AND (0");
    if let Some(address) = &fields.address {
        builder.push(" OR address IS NOT ").push_bind(address.clone());
    }
    if let Some(map_link) = &fields.map_link {
        builder.push(" OR map_link IS NOT ").push_bind(map_link.clone());
    }
    builder.push(")");

    let count: i64 = builder
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

/// Write household fields onto the head record only
pub async fn apply_household_fields_to_head(
    conn: &mut SqliteConnection,
    head_id: i64,
    fields: &HouseholdFields,
    now: DateTime<Utc>,
) -> RegistryResult<u64> {
    let mut builder = household_update(fields, now);
    builder.push(" WHERE person_id = ").push_bind(head_id);

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Write household fields onto every member except the head
pub async fn apply_household_fields_to_dependents(
    conn: &mut SqliteConnection,
    household_id: i64,
    fields: &HouseholdFields,
    now: DateTime<Utc>,
) -> RegistryResult<u64> {
    let mut builder = household_update(fields, now);
    builder
        .push(" WHERE household_id = ")
        .push_bind(household_id)
        .push(" AND person_id != ")
        .push_bind(household_id);

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

fn household_update(fields: &HouseholdFields, now: DateTime<Utc>) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new("UPDATE persons SET ");
    {
        let mut assignments = builder.separated(", ");
        if let Some(address) = &fields.address {
            assignments.push("address = ").push_bind_unseparated(address.clone());
        }
        if let Some(map_link) = &fields.map_link {
            assignments.push("map_link = ").push_bind_unseparated(map_link.clone());
        }
        if let Some(stamp) = &fields.verification {
            assignments.push("verified = 1");
            assignments
                .push("verified_by = ")
                .push_bind_unseparated(stamp.verified_by.clone());
            assignments
                .push("verified_at = ")
                .push_bind_unseparated(stamp.verified_at);
        }
        assignments.push("updated_at = ").push_bind_unseparated(now);
    }
    builder
}

/// Households where a live dependent disagrees with its head on a shared field
pub async fn count_inconsistent_households(conn: &mut SqliteConnection) -> RegistryResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT m.household_id)
         FROM persons m
         JOIN persons h ON h.person_id = m.household_id
         WHERE m.person_id != m.household_id
           AND m.is_deleted = 0
           AND (m.address IS NOT h.address
                OR m.map_link IS NOT h.map_link
                OR m.verified != h.verified
                OR m.verified_by IS NOT h.verified_by
                OR m.verified_at IS NOT h.verified_at)",
    )
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

fn unique_violation_as_conflict(err: sqlx::Error, message: &str) -> RegistryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RegistryError::Conflict(message.to_string());
        }
    }
    RegistryError::Database(err)
}
