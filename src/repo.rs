use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("{0}")] Conflict(String),
    #[error("store error: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

/// Handler-computed coordinate outcome for an ad update. `Keep` when the
/// address did not change; `Set` carries the fresh (possibly failed) geocode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordsChange {
    Keep,
    Set {
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user; `Conflict` when the username or email is taken.
    async fn create_user(&self, new: NewUserRecord) -> RepoResult<User>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<User>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
}

#[async_trait]
pub trait PetAdRepo: Send + Sync {
    async fn list_pet_ads(&self) -> RepoResult<Vec<PetAd>>;
    async fn get_pet_ad(&self, id: Id) -> RepoResult<PetAd>;
    async fn create_pet_ad(
        &self,
        new: NewPetAd,
        owner: Id,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> RepoResult<PetAd>;
    async fn update_pet_ad(
        &self,
        id: Id,
        upd: UpdatePetAd,
        coords: CoordsChange,
    ) -> RepoResult<PetAd>;
    async fn set_pet_ad_status(&self, id: Id, status: PetStatus) -> RepoResult<PetAd>;
    /// Delete the ad together with its comments, likes and favorites.
    async fn delete_pet_ad(&self, id: Id) -> RepoResult<()>;
    async fn stat_rows(&self) -> RepoResult<Vec<AdStatRow>>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn list_comments(&self, pet_ad_id: Id) -> RepoResult<Vec<Comment>>;
    async fn create_comment(&self, pet_ad_id: Id, user_id: Id, text: String)
        -> RepoResult<Comment>;
}

#[async_trait]
pub trait LikeRepo: Send + Sync {
    /// Insert the (ad, user) row if absent, remove it otherwise.
    /// Returns the resulting state: `true` when the ad is now liked.
    async fn toggle_like(&self, pet_ad_id: Id, user_id: Id) -> RepoResult<bool>;
    async fn like_count(&self, pet_ad_id: Id) -> RepoResult<i64>;
}

#[async_trait]
pub trait FavoriteRepo: Send + Sync {
    async fn toggle_favorite(&self, pet_ad_id: Id, user_id: Id) -> RepoResult<bool>;
    /// The user's favorited ads, most recently favorited first.
    async fn list_favorite_ads(&self, user_id: Id) -> RepoResult<Vec<PetAd>>;
}

#[async_trait]
pub trait VolunteerRepo: Send + Sync {
    async fn list_volunteers(&self) -> RepoResult<Vec<Volunteer>>;
    async fn list_volunteers_for(&self, user_id: Id) -> RepoResult<Vec<Volunteer>>;
    async fn get_volunteer(&self, id: Id) -> RepoResult<Volunteer>;
    async fn create_volunteer(&self, new: NewVolunteer, user_id: Id) -> RepoResult<Volunteer>;
    async fn update_volunteer(&self, id: Id, upd: UpdateVolunteer) -> RepoResult<Volunteer>;
    async fn delete_volunteer(&self, id: Id) -> RepoResult<()>;
}

pub trait Repo:
    UserRepo + PetAdRepo + CommentRepo + LikeRepo + FavoriteRepo + VolunteerRepo
{
}

impl<T> Repo for T where
    T: UserRepo + PetAdRepo + CommentRepo + LikeRepo + FavoriteRepo + VolunteerRepo
{
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        users: HashMap<Id, User>,
        pet_ads: HashMap<Id, PetAd>,
        comments: HashMap<Id, Comment>,
        likes: HashMap<Id, Like>,
        favorites: HashMap<Id, Favorite>,
        volunteers: HashMap<Id, Volunteer>,
        next_id: Id,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("PETAFF_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        fn snapshot_path() -> PathBuf {
            if std::env::var("PETAFF_DATA_DIR").is_ok() {
                let mut p = Self::data_dir();
                p.push("state.json");
                p
            } else {
                PathBuf::from(SNAPSHOT_PATH)
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!(
                            "failed to parse snapshot '{}': {e}. Starting empty.",
                            path.display()
                        );
                        State::default()
                    }
                },
                Err(_) => State::default(),
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            if let Ok(s) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, s) {
                    log::error!("failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            }
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUserRecord) -> RepoResult<User> {
            let mut s = self.state.write().unwrap();
            if s.users
                .values()
                .any(|u| u.username == new.username || u.email == new.email)
            {
                return Err(RepoError::Conflict(
                    "username or email already taken".into(),
                ));
            }
            let id = Self::next_id(&mut s);
            let user = User {
                id,
                username: new.username,
                email: new.email,
                password_hash: new.password_hash,
                first_name: new.first_name,
                last_name: new.last_name,
                phone_number: new.phone_number,
                created_at: Utc::now(),
            };
            s.users.insert(id, user.clone());
            drop(s);
            self.persist();
            Ok(user)
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            let s = self.state.read().unwrap();
            s.users
                .values()
                .find(|u| u.username == username)
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            let s = self.state.read().unwrap();
            s.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl PetAdRepo for InMemRepo {
        async fn list_pet_ads(&self) -> RepoResult<Vec<PetAd>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s.pet_ads.values().cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn get_pet_ad(&self, id: Id) -> RepoResult<PetAd> {
            let s = self.state.read().unwrap();
            s.pet_ads.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_pet_ad(
            &self,
            new: NewPetAd,
            owner: Id,
            latitude: Option<f64>,
            longitude: Option<f64>,
        ) -> RepoResult<PetAd> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let ad = PetAd {
                id,
                name: new.name,
                pet_type: new.pet_type,
                description: new.description,
                status: new.status,
                address: new.address,
                district: new.district,
                latitude,
                longitude,
                contact_phone: new.contact_phone,
                photo_path: new.photo_path,
                date_lost: new.date_lost,
                user_id: owner,
                created_at: Utc::now(),
            };
            s.pet_ads.insert(id, ad.clone());
            drop(s);
            self.persist();
            Ok(ad)
        }

        async fn update_pet_ad(
            &self,
            id: Id,
            upd: UpdatePetAd,
            coords: CoordsChange,
        ) -> RepoResult<PetAd> {
            let mut s = self.state.write().unwrap();
            let ad = s.pet_ads.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(name) = upd.name { ad.name = name; }
            if let Some(pet_type) = upd.pet_type { ad.pet_type = pet_type; }
            if let Some(description) = upd.description { ad.description = description; }
            if let Some(status) = upd.status { ad.status = status; }
            if let Some(address) = upd.address { ad.address = address; }
            if let Some(district) = upd.district { ad.district = district; }
            if let Some(phone) = upd.contact_phone { ad.contact_phone = phone; }
            if let Some(photo) = upd.photo_path { ad.photo_path = Some(photo); }
            if let Some(date_lost) = upd.date_lost { ad.date_lost = Some(date_lost); }
            if let CoordsChange::Set { latitude, longitude } = coords {
                ad.latitude = latitude;
                ad.longitude = longitude;
            }
            let updated = ad.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn set_pet_ad_status(&self, id: Id, status: PetStatus) -> RepoResult<PetAd> {
            let mut s = self.state.write().unwrap();
            let ad = s.pet_ads.get_mut(&id).ok_or(RepoError::NotFound)?;
            ad.status = status;
            let updated = ad.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_pet_ad(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            if s.pet_ads.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            // dependents go with the ad
            s.comments.retain(|_, c| c.pet_ad_id != id);
            s.likes.retain(|_, l| l.pet_ad_id != id);
            s.favorites.retain(|_, f| f.pet_ad_id != id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn stat_rows(&self) -> RepoResult<Vec<AdStatRow>> {
            let s = self.state.read().unwrap();
            Ok(s.pet_ads
                .values()
                .map(|a| AdStatRow {
                    district: a.district.clone(),
                    pet_type: a.pet_type.clone(),
                    status: a.status,
                    user_id: a.user_id,
                })
                .collect())
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn list_comments(&self, pet_ad_id: Id) -> RepoResult<Vec<Comment>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .comments
                .values()
                .filter(|c| c.pet_ad_id == pet_ad_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(v)
        }

        async fn create_comment(
            &self,
            pet_ad_id: Id,
            user_id: Id,
            text: String,
        ) -> RepoResult<Comment> {
            let mut s = self.state.write().unwrap();
            if !s.pet_ads.contains_key(&pet_ad_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let comment = Comment {
                id,
                pet_ad_id,
                user_id,
                text,
                created_at: Utc::now(),
            };
            s.comments.insert(id, comment.clone());
            drop(s);
            self.persist();
            Ok(comment)
        }
    }

    #[async_trait]
    impl LikeRepo for InMemRepo {
        async fn toggle_like(&self, pet_ad_id: Id, user_id: Id) -> RepoResult<bool> {
            let mut s = self.state.write().unwrap();
            if !s.pet_ads.contains_key(&pet_ad_id) {
                return Err(RepoError::NotFound);
            }
            let existing = s
                .likes
                .iter()
                .find(|(_, l)| l.pet_ad_id == pet_ad_id && l.user_id == user_id)
                .map(|(id, _)| *id);
            let liked = match existing {
                Some(id) => {
                    s.likes.remove(&id);
                    false
                }
                None => {
                    let id = Self::next_id(&mut s);
                    s.likes.insert(
                        id,
                        Like {
                            id,
                            pet_ad_id,
                            user_id,
                            created_at: Utc::now(),
                        },
                    );
                    true
                }
            };
            drop(s);
            self.persist();
            Ok(liked)
        }

        async fn like_count(&self, pet_ad_id: Id) -> RepoResult<i64> {
            let s = self.state.read().unwrap();
            Ok(s.likes.values().filter(|l| l.pet_ad_id == pet_ad_id).count() as i64)
        }
    }

    #[async_trait]
    impl FavoriteRepo for InMemRepo {
        async fn toggle_favorite(&self, pet_ad_id: Id, user_id: Id) -> RepoResult<bool> {
            let mut s = self.state.write().unwrap();
            if !s.pet_ads.contains_key(&pet_ad_id) {
                return Err(RepoError::NotFound);
            }
            let existing = s
                .favorites
                .iter()
                .find(|(_, f)| f.pet_ad_id == pet_ad_id && f.user_id == user_id)
                .map(|(id, _)| *id);
            let favorited = match existing {
                Some(id) => {
                    s.favorites.remove(&id);
                    false
                }
                None => {
                    let id = Self::next_id(&mut s);
                    s.favorites.insert(
                        id,
                        Favorite {
                            id,
                            pet_ad_id,
                            user_id,
                            created_at: Utc::now(),
                        },
                    );
                    true
                }
            };
            drop(s);
            self.persist();
            Ok(favorited)
        }

        async fn list_favorite_ads(&self, user_id: Id) -> RepoResult<Vec<PetAd>> {
            let s = self.state.read().unwrap();
            let mut favs: Vec<_> = s
                .favorites
                .values()
                .filter(|f| f.user_id == user_id)
                .cloned()
                .collect();
            favs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(favs
                .iter()
                .filter_map(|f| s.pet_ads.get(&f.pet_ad_id).cloned())
                .collect())
        }
    }

    #[async_trait]
    impl VolunteerRepo for InMemRepo {
        async fn list_volunteers(&self) -> RepoResult<Vec<Volunteer>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s.volunteers.values().cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn list_volunteers_for(&self, user_id: Id) -> RepoResult<Vec<Volunteer>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .volunteers
                .values()
                .filter(|v| v.user_id == Some(user_id))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn get_volunteer(&self, id: Id) -> RepoResult<Volunteer> {
            let s = self.state.read().unwrap();
            s.volunteers.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_volunteer(&self, new: NewVolunteer, user_id: Id) -> RepoResult<Volunteer> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let volunteer = Volunteer {
                id,
                name: new.name,
                contacts: new.contacts,
                districts: new.districts,
                comment: new.comment,
                created_at: Utc::now(),
                user_id: Some(user_id),
            };
            s.volunteers.insert(id, volunteer.clone());
            drop(s);
            self.persist();
            Ok(volunteer)
        }

        async fn update_volunteer(&self, id: Id, upd: UpdateVolunteer) -> RepoResult<Volunteer> {
            let mut s = self.state.write().unwrap();
            let volunteer = s.volunteers.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(name) = upd.name { volunteer.name = name; }
            if let Some(contacts) = upd.contacts { volunteer.contacts = contacts; }
            if let Some(districts) = upd.districts { volunteer.districts = districts; }
            if let Some(comment) = upd.comment { volunteer.comment = Some(comment); }
            let updated = volunteer.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_volunteer(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            if s.volunteers.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            drop(s);
            self.persist();
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    const PET_AD_COLS: &str = "id, name, pet_type, description, status, address, district, \
         latitude, longitude, contact_phone, photo_path, date_lost, user_id, created_at";

    fn map_db(e: sqlx::Error) -> RepoError {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db)
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                RepoError::Conflict("already exists".into())
            }
            sqlx::Error::Database(db)
                if matches!(db.kind(), sqlx::error::ErrorKind::ForeignKeyViolation) =>
            {
                RepoError::NotFound
            }
            _ => RepoError::Internal(e.to_string()),
        }
    }

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUserRecord) -> RepoResult<User> {
            let rec = sqlx::query_as::<_, User>(
                "INSERT INTO users (username, email, password_hash, first_name, last_name, phone_number) \
                 VALUES ($1,$2,$3,$4,$5,$6) \
                 RETURNING id, username, email, password_hash, first_name, last_name, phone_number, created_at",
            )
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match map_db(e) {
                RepoError::Conflict(_) => {
                    RepoError::Conflict("username or email already taken".into())
                }
                other => other,
            })?;
            Ok(rec)
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "SELECT id, username, email, password_hash, first_name, last_name, phone_number, created_at \
                 FROM users WHERE username = $1",
            )
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "SELECT id, username, email, password_hash, first_name, last_name, phone_number, created_at \
                 FROM users WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }
    }

    #[async_trait]
    impl PetAdRepo for PgRepo {
        async fn list_pet_ads(&self) -> RepoResult<Vec<PetAd>> {
            sqlx::query_as::<_, PetAd>(&format!(
                "SELECT {PET_AD_COLS} FROM pet_ads ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn get_pet_ad(&self, id: Id) -> RepoResult<PetAd> {
            sqlx::query_as::<_, PetAd>(&format!("SELECT {PET_AD_COLS} FROM pet_ads WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db)
        }

        async fn create_pet_ad(
            &self,
            new: NewPetAd,
            owner: Id,
            latitude: Option<f64>,
            longitude: Option<f64>,
        ) -> RepoResult<PetAd> {
            sqlx::query_as::<_, PetAd>(&format!(
                "INSERT INTO pet_ads (name, pet_type, description, status, address, district, \
                 latitude, longitude, contact_phone, photo_path, date_lost, user_id) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12) RETURNING {PET_AD_COLS}"
            ))
            .bind(&new.name)
            .bind(&new.pet_type)
            .bind(&new.description)
            .bind(new.status)
            .bind(&new.address)
            .bind(&new.district)
            .bind(latitude)
            .bind(longitude)
            .bind(&new.contact_phone)
            .bind(&new.photo_path)
            .bind(new.date_lost)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn update_pet_ad(
            &self,
            id: Id,
            upd: UpdatePetAd,
            coords: CoordsChange,
        ) -> RepoResult<PetAd> {
            let mut tx = self.pool.begin().await.map_err(map_db)?;
            sqlx::query(
                "UPDATE pet_ads SET \
                 name = COALESCE($2, name), \
                 pet_type = COALESCE($3, pet_type), \
                 description = COALESCE($4, description), \
                 status = COALESCE($5, status), \
                 address = COALESCE($6, address), \
                 district = COALESCE($7, district), \
                 contact_phone = COALESCE($8, contact_phone), \
                 photo_path = COALESCE($9, photo_path), \
                 date_lost = COALESCE($10, date_lost) \
                 WHERE id = $1",
            )
            .bind(id)
            .bind(upd.name.as_ref())
            .bind(upd.pet_type.as_ref())
            .bind(upd.description.as_ref())
            .bind(upd.status)
            .bind(upd.address.as_ref())
            .bind(upd.district.as_ref())
            .bind(upd.contact_phone.as_ref())
            .bind(upd.photo_path.as_ref())
            .bind(upd.date_lost)
            .execute(&mut *tx)
            .await
            .map_err(map_db)?;
            if let CoordsChange::Set { latitude, longitude } = coords {
                sqlx::query("UPDATE pet_ads SET latitude = $2, longitude = $3 WHERE id = $1")
                    .bind(id)
                    .bind(latitude)
                    .bind(longitude)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_db)?;
            }
            let updated =
                sqlx::query_as::<_, PetAd>(&format!("SELECT {PET_AD_COLS} FROM pet_ads WHERE id = $1"))
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_db)?;
            tx.commit().await.map_err(map_db)?;
            Ok(updated)
        }

        async fn set_pet_ad_status(&self, id: Id, status: PetStatus) -> RepoResult<PetAd> {
            sqlx::query_as::<_, PetAd>(&format!(
                "UPDATE pet_ads SET status = $2 WHERE id = $1 RETURNING {PET_AD_COLS}"
            ))
            .bind(id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn delete_pet_ad(&self, id: Id) -> RepoResult<()> {
            // comments/likes/favorites cascade in the schema
            let res = sqlx::query("DELETE FROM pet_ads WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_db)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn stat_rows(&self) -> RepoResult<Vec<AdStatRow>> {
            sqlx::query_as::<_, AdStatRow>(
                "SELECT district, pet_type, status, user_id FROM pet_ads",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_db)
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn list_comments(&self, pet_ad_id: Id) -> RepoResult<Vec<Comment>> {
            sqlx::query_as::<_, Comment>(
                "SELECT id, pet_ad_id, user_id, text, created_at FROM comments \
                 WHERE pet_ad_id = $1 ORDER BY created_at ASC, id ASC",
            )
            .bind(pet_ad_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn create_comment(
            &self,
            pet_ad_id: Id,
            user_id: Id,
            text: String,
        ) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(
                "INSERT INTO comments (pet_ad_id, user_id, text) VALUES ($1,$2,$3) \
                 RETURNING id, pet_ad_id, user_id, text, created_at",
            )
            .bind(pet_ad_id)
            .bind(user_id)
            .bind(&text)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }
    }

    #[async_trait]
    impl LikeRepo for PgRepo {
        async fn toggle_like(&self, pet_ad_id: Id, user_id: Id) -> RepoResult<bool> {
            let mut tx = self.pool.begin().await.map_err(map_db)?;
            let removed = sqlx::query("DELETE FROM likes WHERE pet_ad_id = $1 AND user_id = $2")
                .bind(pet_ad_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(map_db)?
                .rows_affected();
            let liked = if removed == 0 {
                sqlx::query("INSERT INTO likes (pet_ad_id, user_id) VALUES ($1,$2)")
                    .bind(pet_ad_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_db)?;
                true
            } else {
                false
            };
            tx.commit().await.map_err(map_db)?;
            Ok(liked)
        }

        async fn like_count(&self, pet_ad_id: Id) -> RepoResult<i64> {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM likes WHERE pet_ad_id = $1")
                    .bind(pet_ad_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_db)?;
            Ok(count)
        }
    }

    #[async_trait]
    impl FavoriteRepo for PgRepo {
        async fn toggle_favorite(&self, pet_ad_id: Id, user_id: Id) -> RepoResult<bool> {
            let mut tx = self.pool.begin().await.map_err(map_db)?;
            let removed =
                sqlx::query("DELETE FROM favorites WHERE pet_ad_id = $1 AND user_id = $2")
                    .bind(pet_ad_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_db)?
                    .rows_affected();
            let favorited = if removed == 0 {
                sqlx::query("INSERT INTO favorites (pet_ad_id, user_id) VALUES ($1,$2)")
                    .bind(pet_ad_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_db)?;
                true
            } else {
                false
            };
            tx.commit().await.map_err(map_db)?;
            Ok(favorited)
        }

        async fn list_favorite_ads(&self, user_id: Id) -> RepoResult<Vec<PetAd>> {
            sqlx::query_as::<_, PetAd>(
                "SELECT a.id, a.name, a.pet_type, a.description, a.status, a.address, \
                 a.district, a.latitude, a.longitude, a.contact_phone, a.photo_path, \
                 a.date_lost, a.user_id, a.created_at \
                 FROM favorites f JOIN pet_ads a ON a.id = f.pet_ad_id \
                 WHERE f.user_id = $1 ORDER BY f.created_at DESC, f.id DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db)
        }
    }

    #[async_trait]
    impl VolunteerRepo for PgRepo {
        async fn list_volunteers(&self) -> RepoResult<Vec<Volunteer>> {
            sqlx::query_as::<_, Volunteer>(
                "SELECT id, name, contacts, districts, comment, created_at, user_id \
                 FROM volunteers ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn list_volunteers_for(&self, user_id: Id) -> RepoResult<Vec<Volunteer>> {
            sqlx::query_as::<_, Volunteer>(
                "SELECT id, name, contacts, districts, comment, created_at, user_id \
                 FROM volunteers WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn get_volunteer(&self, id: Id) -> RepoResult<Volunteer> {
            sqlx::query_as::<_, Volunteer>(
                "SELECT id, name, contacts, districts, comment, created_at, user_id \
                 FROM volunteers WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn create_volunteer(&self, new: NewVolunteer, user_id: Id) -> RepoResult<Volunteer> {
            sqlx::query_as::<_, Volunteer>(
                "INSERT INTO volunteers (name, contacts, districts, comment, user_id) \
                 VALUES ($1,$2,$3,$4,$5) \
                 RETURNING id, name, contacts, districts, comment, created_at, user_id",
            )
            .bind(&new.name)
            .bind(&new.contacts)
            .bind(&new.districts)
            .bind(&new.comment)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn update_volunteer(&self, id: Id, upd: UpdateVolunteer) -> RepoResult<Volunteer> {
            sqlx::query_as::<_, Volunteer>(
                "UPDATE volunteers SET \
                 name = COALESCE($2, name), \
                 contacts = COALESCE($3, contacts), \
                 districts = COALESCE($4, districts), \
                 comment = COALESCE($5, comment) \
                 WHERE id = $1 \
                 RETURNING id, name, contacts, districts, comment, created_at, user_id",
            )
            .bind(id)
            .bind(upd.name.as_ref())
            .bind(upd.contacts.as_ref())
            .bind(upd.districts.as_ref())
            .bind(upd.comment.as_ref())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db)
        }

        async fn delete_volunteer(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM volunteers WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_db)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }
}
