/// Geo-tag catalog
///
/// Map locations keyed by sabil number. Plain records with no household
/// semantics.

mod manager;

pub use manager::GeoTagManager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Coordinates plus optional postal details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoTag {
    pub id: String,
    pub sabil_no: String,
    pub name: String,
    pub description: Option<String>,
    pub location: GeoLocation,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGeoTag {
    #[validate(length(min = 1, message = "Sabil No is required"))]
    pub sabil_no: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(nested)]
    pub location: GeoLocation,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial location update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoLocationChanges {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Partial update request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoTagChanges {
    pub sabil_no: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<GeoLocationChanges>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Search by sabil number substring
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoTagQuery {
    pub sabil_no: Option<String>,
    pub page: Option<String>,
    #[serde(alias = "limit")]
    pub page_size: Option<String>,
}

impl NewGeoTag {
    /// Trim every text field and drop blank optionals and tags
    pub fn normalized(self) -> Self {
        Self {
            sabil_no: self.sabil_no.trim().to_string(),
            name: self.name.trim().to_string(),
            description: trimmed(self.description),
            location: GeoLocation {
                address: trimmed(self.location.address),
                city: trimmed(self.location.city),
                country: trimmed(self.location.country),
                ..self.location
            },
            category: trimmed(self.category),
            tags: clean_tags(self.tags),
        }
    }
}

impl GeoTagChanges {
    /// Merge into a stored tag; location fields merge one by one
    pub fn apply_to(self, tag: &mut GeoTag) {
        if let Some(sabil_no) = self.sabil_no {
            tag.sabil_no = sabil_no.trim().to_string();
        }
        if let Some(name) = self.name {
            tag.name = name.trim().to_string();
        }
        if self.description.is_some() {
            tag.description = trimmed(self.description);
        }
        if let Some(location) = self.location {
            if let Some(latitude) = location.latitude {
                tag.location.latitude = latitude;
            }
            if let Some(longitude) = location.longitude {
                tag.location.longitude = longitude;
            }
            if location.address.is_some() {
                tag.location.address = trimmed(location.address);
            }
            if location.city.is_some() {
                tag.location.city = trimmed(location.city);
            }
            if location.country.is_some() {
                tag.location.country = trimmed(location.country);
            }
        }
        if self.category.is_some() {
            tag.category = trimmed(self.category);
        }
        if let Some(tags) = self.tags {
            tag.tags = clean_tags(tags);
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
