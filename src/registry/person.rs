/// Person records and the typed change set used by every edit path
use crate::error::{RegistryError, RegistryResult};
use crate::registry::propagation::HouseholdFields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One individual in the registry
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub person_id: i64,
    /// Person id of the household head; equals `person_id` for the head
    pub household_id: Option<i64>,
    pub full_name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    /// Sabil number
    pub location_code: i64,
    pub sector: Option<String>,
    pub contact_number: Option<String>,
    pub covenant_status: Option<String>,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub map_link: Option<String>,
    pub assistant_name: Option<String>,
    pub assistant_contact: Option<String>,
    pub is_deleted: bool,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Head of household: the record the household id points at
    pub fn is_household_head(&self) -> bool {
        self.household_id == Some(self.person_id)
    }

    /// Household used for sabil uniqueness; unlinked records form their own
    pub fn effective_household(&self) -> i64 {
        self.household_id.unwrap_or(self.person_id)
    }
}

/// Partial update of a person. A `Some` field is a field the caller sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonChanges {
    pub person_id: Option<i64>,
    pub household_id: Option<i64>,
    pub full_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub location_code: Option<i64>,
    pub sector: Option<String>,
    pub contact_number: Option<String>,
    pub covenant_status: Option<String>,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub map_link: Option<String>,
    pub assistant_name: Option<String>,
    pub assistant_contact: Option<String>,
}

impl PersonChanges {
    /// Identifier, full name and sabil number are mandatory on a full edit
    pub fn validate_full_edit(&self, target_id: i64) -> RegistryResult<()> {
        self.validate_required()?;

        if self.person_id != Some(target_id) {
            return Err(RegistryError::Validation(
                "Person ID in the payload must match the record being edited".to_string(),
            ));
        }

        Ok(())
    }

    /// Same required fields for a new record
    pub fn validate_required(&self) -> RegistryResult<()> {
        let has_name = self
            .full_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false);

        if self.person_id.is_none() || !has_name || self.location_code.is_none() {
            return Err(RegistryError::Validation(
                "Person ID, Full Name, and Sabil No are required".to_string(),
            ));
        }

        if self.person_id.map_or(false, |id| id <= 0) {
            return Err(RegistryError::Validation("Person ID must be positive".to_string()));
        }

        if self.location_code.map_or(false, |code| code <= 0) {
            return Err(RegistryError::Validation("Sabil No must be positive".to_string()));
        }

        if let Some(age) = self.age {
            if !(0..=150).contains(&age) {
                return Err(RegistryError::Validation(
                    "Age must be between 0 and 150".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Address-equivalent fields, the only ones shared across a household
    pub fn household_fields(&self) -> HouseholdFields {
        HouseholdFields {
            address: self.address.as_deref().map(clean),
            map_link: self.map_link.as_deref().map(clean),
            verification: None,
        }
    }

    /// True when an address-equivalent field is present and differs from `current`
    pub fn changes_household_fields(&self, current: &Person) -> bool {
        let fields = self.household_fields();
        let address_changed = fields
            .address
            .as_ref()
            .map_or(false, |address| current.address.as_ref() != Some(address));
        let map_link_changed = fields
            .map_link
            .as_ref()
            .map_or(false, |link| current.map_link.as_ref() != Some(link));

        address_changed || map_link_changed
    }

    /// Names of sent fields that are not shared household fields
    pub fn person_specific_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.household_id.is_some() {
            fields.push("householdId");
        }
        if self.full_name.is_some() {
            fields.push("fullName");
        }
        if self.age.is_some() {
            fields.push("age");
        }
        if self.gender.is_some() {
            fields.push("gender");
        }
        if self.location_code.is_some() {
            fields.push("locationCode");
        }
        if self.sector.is_some() {
            fields.push("sector");
        }
        if self.contact_number.is_some() {
            fields.push("contactNumber");
        }
        if self.covenant_status.is_some() {
            fields.push("covenantStatus");
        }
        if self.marital_status.is_some() {
            fields.push("maritalStatus");
        }
        if self.assistant_name.is_some() {
            fields.push("assistantName");
        }
        if self.assistant_contact.is_some() {
            fields.push("assistantContact");
        }
        fields
    }

    /// Merge the sent fields into a single record. Verification is never touched.
    pub fn apply_to(&self, person: &mut Person) {
        if let Some(household_id) = self.household_id {
            person.household_id = Some(household_id);
        }
        if let Some(name) = &self.full_name {
            person.full_name = clean(name);
        }
        if let Some(age) = self.age {
            person.age = Some(age);
        }
        if let Some(code) = self.location_code {
            person.location_code = code;
        }
        merge_text(&mut person.gender, &self.gender);
        merge_text(&mut person.sector, &self.sector);
        merge_text(&mut person.contact_number, &self.contact_number);
        merge_text(&mut person.covenant_status, &self.covenant_status);
        merge_text(&mut person.marital_status, &self.marital_status);
        merge_text(&mut person.address, &self.address);
        merge_text(&mut person.map_link, &self.map_link);
        merge_text(&mut person.assistant_name, &self.assistant_name);
        merge_text(&mut person.assistant_contact, &self.assistant_contact);
    }

    /// Build a fresh, unverified record from a validated change set
    pub fn into_new_person(self, now: DateTime<Utc>) -> RegistryResult<Person> {
        self.validate_required()?;

        let (person_id, location_code) = match (self.person_id, self.location_code) {
            (Some(id), Some(code)) => (id, code),
            _ => {
                return Err(RegistryError::Validation(
                    "Person ID, Full Name, and Sabil No are required".to_string(),
                ))
            }
        };

        let mut person = Person {
            person_id,
            household_id: None,
            full_name: String::new(),
            age: None,
            gender: None,
            location_code,
            sector: None,
            contact_number: None,
            covenant_status: None,
            marital_status: None,
            address: None,
            map_link: None,
            assistant_name: None,
            assistant_contact: None,
            is_deleted: false,
            verified: false,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        self.apply_to(&mut person);
        Ok(person)
    }
}

fn clean(value: &str) -> String {
    value.trim().to_string()
}

fn merge_text(target: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        *target = Some(clean(value));
    }
}
