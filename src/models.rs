use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

/// Lifecycle of a pet ad, as shown on the listing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "postgres-store", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres-store",
    sqlx(type_name = "pet_status", rename_all = "kebab-case")
)]
pub enum PetStatus {
    InSearch,
    Found,
    TemporaryShelter,
    InShelter,
}

impl Default for PetStatus {
    fn default() -> Self {
        PetStatus::InSearch
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    #[schema(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

/// Registration payload. The password arrives in clear and is hashed before
/// it ever reaches a repository.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
}

/// What actually reaches a repository: the registration payload with the
/// password already hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserRecord {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct PetAd {
    pub id: Id,
    pub name: String,
    pub pet_type: String,
    pub description: String,
    pub status: PetStatus,
    pub address: String,
    pub district: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact_phone: String,
    pub photo_path: Option<String>,
    pub date_lost: Option<DateTime<Utc>>,
    pub user_id: Id, // owner; immutable after creation
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPetAd {
    pub name: String,
    pub pet_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: PetStatus,
    pub address: String,
    pub district: String,
    #[serde(default)]
    pub contact_phone: String,
    pub photo_path: Option<String>,
    pub date_lost: Option<DateTime<Utc>>,
}

/// Partial update; `None` keeps the stored value. The owner cannot be
/// changed through an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePetAd {
    pub name: Option<String>,
    pub pet_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<PetStatus>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub contact_phone: Option<String>,
    pub photo_path: Option<String>,
    pub date_lost: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Comment {
    pub id: Id,
    pub pet_ad_id: Id,
    pub user_id: Id,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewComment {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Like {
    pub id: Id,
    pub pet_ad_id: Id,
    pub user_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Favorite {
    pub id: Id,
    pub pet_ad_id: Id,
    pub user_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Volunteer {
    pub id: Id,
    pub name: String,
    pub contacts: String,
    pub districts: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewVolunteer {
    pub name: String,
    pub contacts: String,
    pub districts: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateVolunteer {
    pub name: Option<String>,
    pub contacts: Option<String>,
    pub districts: Option<String>,
    pub comment: Option<String>,
}

/// Projection served to the map page; only ads with coordinates appear.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapMarker {
    pub id: Id,
    pub name: String,
    pub pet_type: String,
    pub status: PetStatus,
    pub address: String,
    pub photo_path: Option<String>,
    pub description: String,
    pub contact_phone: String,
    pub date_lost: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
}

impl MapMarker {
    pub fn from_ad(ad: &PetAd) -> Option<Self> {
        let (latitude, longitude) = (ad.latitude?, ad.longitude?);
        Some(Self {
            id: ad.id,
            name: ad.name.clone(),
            pet_type: ad.pet_type.clone(),
            status: ad.status,
            address: ad.address.clone(),
            photo_path: ad.photo_path.clone(),
            description: ad.description.clone(),
            contact_phone: ad.contact_phone.clone(),
            date_lost: ad.date_lost,
            latitude,
            longitude,
        })
    }
}

/// Minimal projection the statistics module aggregates over. Both store
/// backends produce the same rows so the grouping logic exists once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct AdStatRow {
    pub district: String,
    pub pet_type: String,
    pub status: PetStatus,
    pub user_id: Id,
}
