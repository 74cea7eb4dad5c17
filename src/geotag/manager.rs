/// Geo-tag persistence
use super::{GeoLocation, GeoTag, GeoTagChanges, GeoTagQuery, NewGeoTag};
use crate::{
    account::Caller,
    config::AuthMode,
    error::{RegistryError, RegistryResult},
    pagination::{Page, PageRequest},
    registry::policy,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const GEOTAG_COLUMNS: &str = "id, sabil_no, name, description, latitude, longitude, address, city, \
     country, category, tags, created_at, updated_at";

/// Flat row; tags are stored as a JSON array
#[derive(Debug, FromRow)]
struct GeoTagRow {
    id: String,
    sabil_no: String,
    name: String,
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    category: Option<String>,
    tags: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GeoTagRow> for GeoTag {
    type Error = RegistryError;

    fn try_from(row: GeoTagRow) -> Result<Self, Self::Error> {
        let tags = serde_json::from_str(&row.tags)
            .map_err(|e| RegistryError::Internal(format!("Corrupt tags for geo tag {}: {}", row.id, e)))?;

        Ok(GeoTag {
            id: row.id,
            sabil_no: row.sabil_no,
            name: row.name,
            description: row.description,
            location: GeoLocation {
                latitude: row.latitude,
                longitude: row.longitude,
                address: row.address,
                city: row.city,
                country: row.country,
            },
            category: row.category,
            tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Geo-tag catalog manager
pub struct GeoTagManager {
    db: SqlitePool,
    mode: AuthMode,
}

impl GeoTagManager {
    pub fn new(db: SqlitePool, mode: AuthMode) -> Self {
        Self { db, mode }
    }

    fn authorize(&self, caller: Option<&Caller>) -> RegistryResult<()> {
        policy::authorize_read(self.mode, caller)?;
        Ok(())
    }

    /// Case-insensitive substring search on sabil number, newest first
    pub async fn list(&self, caller: Option<&Caller>, query: &GeoTagQuery) -> RegistryResult<Page<GeoTag>> {
        self.authorize(caller)?;

        let request = PageRequest::parse(query.page.as_deref(), query.page_size.as_deref());
        let needle = query.sabil_no.as_deref().map(str::trim).unwrap_or_default();
        if needle.is_empty() {
            return Ok(Page::empty(request));
        }

        let rows = sqlx::query_as::<_, GeoTagRow>(&format!(
            "SELECT {} FROM geotags
             WHERE instr(lower(sabil_no), lower(?1)) > 0
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3",
            GEOTAG_COLUMNS
        ))
        .bind(needle)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM geotags WHERE instr(lower(sabil_no), lower(?1)) > 0")
                .bind(needle)
                .fetch_one(&self.db)
                .await?;

        let tags = rows
            .into_iter()
            .map(GeoTag::try_from)
            .collect::<RegistryResult<Vec<_>>>()?;

        Ok(Page::new(tags, request, total))
    }

    pub async fn get(&self, caller: Option<&Caller>, id: &str) -> RegistryResult<GeoTag> {
        self.authorize(caller)?;
        self.find(id).await
    }

    async fn find(&self, id: &str) -> RegistryResult<GeoTag> {
        let row = sqlx::query_as::<_, GeoTagRow>(&format!(
            "SELECT {} FROM geotags WHERE id = ?1",
            GEOTAG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| RegistryError::NotFound("Geo tag not found".to_string()))?;

        row.try_into()
    }

    pub async fn create(&self, caller: Option<&Caller>, req: NewGeoTag) -> RegistryResult<GeoTag> {
        self.authorize(caller)?;

        let req = req.normalized();
        req.validate()?;

        let now = Utc::now();
        let tag = GeoTag {
            id: Uuid::new_v4().to_string(),
            sabil_no: req.sabil_no,
            name: req.name,
            description: req.description,
            location: req.location,
            category: req.category,
            tags: req.tags,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO geotags (id, sabil_no, name, description, latitude, longitude, address, city,
                                  country, category, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&tag.id)
        .bind(&tag.sabil_no)
        .bind(&tag.name)
        .bind(&tag.description)
        .bind(tag.location.latitude)
        .bind(tag.location.longitude)
        .bind(&tag.location.address)
        .bind(&tag.location.city)
        .bind(&tag.location.country)
        .bind(&tag.category)
        .bind(encode_tags(&tag.tags)?)
        .bind(tag.created_at)
        .bind(tag.updated_at)
        .execute(&self.db)
        .await
        .map_err(duplicate_sabil_no)?;

        info!(id = %tag.id, sabil_no = %tag.sabil_no, "Created geo tag");
        Ok(tag)
    }

    pub async fn update(&self, caller: Option<&Caller>, id: &str, changes: GeoTagChanges) -> RegistryResult<GeoTag> {
        self.authorize(caller)?;

        let mut tag = self.find(id).await?;
        changes.apply_to(&mut tag);
        tag.updated_at = Utc::now();

        if tag.sabil_no.is_empty() || tag.name.is_empty() {
            return Err(RegistryError::Validation(
                "Sabil No and Name cannot be empty".to_string(),
            ));
        }
        tag.location.validate()?;

        sqlx::query(
            "UPDATE geotags
             SET sabil_no = ?1, name = ?2, description = ?3, latitude = ?4, longitude = ?5,
                 address = ?6, city = ?7, country = ?8, category = ?9, tags = ?10, updated_at = ?11
             WHERE id = ?12",
        )
        .bind(&tag.sabil_no)
        .bind(&tag.name)
        .bind(&tag.description)
        .bind(tag.location.latitude)
        .bind(tag.location.longitude)
        .bind(&tag.location.address)
        .bind(&tag.location.city)
        .bind(&tag.location.country)
        .bind(&tag.category)
        .bind(encode_tags(&tag.tags)?)
        .bind(tag.updated_at)
        .bind(&tag.id)
        .execute(&self.db)
        .await
        .map_err(duplicate_sabil_no)?;

        info!(id = %tag.id, "Updated geo tag");
        Ok(tag)
    }

    /// Permanent delete
    pub async fn delete(&self, caller: Option<&Caller>, id: &str) -> RegistryResult<()> {
        self.authorize(caller)?;

        let result = sqlx::query("DELETE FROM geotags WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound("Geo tag not found".to_string()));
        }

        info!(id, "Deleted geo tag");
        Ok(())
    }

    /// Distinct non-empty categories, sorted
    pub async fn categories(&self, caller: Option<&Caller>) -> RegistryResult<Vec<String>> {
        self.authorize(caller)?;

        let categories = sqlx::query_scalar(
            "SELECT DISTINCT category FROM geotags
             WHERE category IS NOT NULL AND trim(category) != ''
             ORDER BY category",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }
}

fn encode_tags(tags: &[String]) -> RegistryResult<String> {
    serde_json::to_string(tags).map_err(|e| RegistryError::Internal(format!("Failed to encode tags: {}", e)))
}

fn duplicate_sabil_no(err: sqlx::Error) -> RegistryError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RegistryError::Conflict("A geo tag with this Sabil No already exists".to_string())
        }
        _ => RegistryError::Database(err),
    }
}
