use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt as _;
use std::sync::Arc;

use crate::auth::{create_jwt_for, hash_password, validate_password, verify_password, Auth};
use crate::error::ApiError;
use crate::geocode::Geocoder;
use crate::models::*;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::{CoordsChange, Repo};
use crate::stats::{build_report, StatisticsReport};
use crate::storage::{PhotoStore, PhotoStoreError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/auth/register").route(web::post().to(register)))
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(
                web::resource("/pet-ads")
                    .route(web::get().to(list_pet_ads))
                    .route(web::post().to(create_pet_ad)),
            )
            .service(
                web::resource("/pet-ads/{id}")
                    .route(web::get().to(get_pet_ad))
                    .route(web::put().to(update_pet_ad))
                    .route(web::delete().to(delete_pet_ad)),
            )
            .service(web::resource("/pet-ads/{id}/status").route(web::post().to(set_pet_ad_status)))
            .service(
                web::resource("/pet-ads/{id}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(add_comment)),
            )
            .service(web::resource("/pet-ads/{id}/like").route(web::post().to(toggle_like)))
            .service(web::resource("/pet-ads/{id}/favorite").route(web::post().to(toggle_favorite)))
            .service(web::resource("/favorites").route(web::get().to(list_favorites)))
            .service(
                web::resource("/volunteers")
                    .route(web::get().to(list_volunteers))
                    .route(web::post().to(create_volunteer)),
            )
            .service(
                web::resource("/volunteers/{id}")
                    .route(web::put().to(update_volunteer))
                    .route(web::delete().to(delete_volunteer)),
            )
            .service(web::resource("/map/markers").route(web::get().to(map_markers)))
            .service(web::resource("/statistics").route(web::get().to(statistics)))
            .service(web::resource("/photos").route(web::post().to(upload_photo))),
    );
    // public fetch route (no /api/v1 prefix so <img src="/uploads/{name}"> works)
    cfg.route("/uploads/{name}", web::get().to(get_photo));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub photo_store: Arc<dyn PhotoStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub limiter: RateLimiterFacade,
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

macro_rules! ensure_owner {
    ($actor:expr, $owner:expr) => {
        if $owner != $actor {
            return Err(ApiError::Forbidden);
        }
    };
}

// ---------------- Auth -----------------------------------------------

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn validate_registration(new: &NewUser) -> Result<(), ApiError> {
    if new.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username is required".into()));
    }
    if new.email.trim().is_empty() || !new.email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".into()));
    }
    validate_password(&new.password).map_err(ApiError::BadRequest)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = NewUser,
    responses(
        (status = 201, description = "Registered and logged in", body = AuthResponse),
        (status = 400, description = "Invalid field"),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn register(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    if !data.limiter.allow_auth(&client_ip(&req)) {
        return Err(ApiError::TooManyRequests);
    }
    let new = payload.into_inner();
    validate_registration(&new)?;
    let password_hash = hash_password(&new.password).map_err(|e| {
        log::error!("password hashing failed: {e}");
        ApiError::Internal
    })?;
    let user = data
        .repo
        .create_user(NewUserRecord {
            username: new.username.trim().to_string(),
            email: new.email.trim().to_string(),
            password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            phone_number: new.phone_number,
        })
        .await?;
    // auto-login after registration
    let token = create_jwt_for(&user).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Created().json(AuthResponse { token, user }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Unknown user or wrong password"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    if !data.limiter.allow_auth(&client_ip(&req)) {
        return Err(ApiError::TooManyRequests);
    }
    // same response for unknown user and wrong password
    let user = data
        .repo
        .find_user_by_username(&payload.username)
        .await
        .map_err(|_| ApiError::Unauthorized)?;
    if !verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }
    let token = create_jwt_for(&user).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = data
        .repo
        .get_user(auth.user_id().map_err(|_| ApiError::Unauthorized)?)
        .await
        .map_err(|_| ApiError::Unauthorized)?;
    Ok(HttpResponse::Ok().json(user))
}

// ---------------- Pet ads --------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/pet-ads",
    responses((status = 200, description = "All listings, newest first", body = [PetAd]))
)]
pub async fn list_pet_ads(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let ads = data.repo.list_pet_ads().await?;
    Ok(HttpResponse::Ok().json(ads))
}

#[utoipa::path(
    get,
    path = "/api/v1/pet-ads/{id}",
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 200, description = "Listing", body = PetAd),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn get_pet_ad(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let ad = data.repo.get_pet_ad(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ad))
}

fn validate_new_ad(new: &NewPetAd) -> Result<(), ApiError> {
    for (field, value) in [
        ("name", &new.name),
        ("pet_type", &new.pet_type),
        ("address", &new.address),
        ("district", &new.district),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{field} is required")));
        }
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/pet-ads",
    request_body = NewPetAd,
    responses(
        (status = 201, description = "Listing created", body = PetAd),
        (status = 400, description = "Missing required field"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_pet_ad(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewPetAd>,
) -> Result<HttpResponse, ApiError> {
    let owner = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let new = payload.into_inner();
    validate_new_ad(&new)?;
    // best effort; a failed lookup just leaves the coordinates empty
    let point = data.geocoder.geocode(&new.address).await;
    let ad = data
        .repo
        .create_pet_ad(
            new,
            owner,
            point.map(|p| p.latitude),
            point.map(|p| p.longitude),
        )
        .await?;
    Ok(HttpResponse::Created().json(ad))
}

#[utoipa::path(
    put,
    path = "/api/v1/pet-ads/{id}",
    request_body = UpdatePetAd,
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 200, description = "Listing updated", body = PetAd),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn update_pet_ad(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdatePetAd>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let id = path.into_inner();
    let existing = data.repo.get_pet_ad(id).await?;
    ensure_owner!(actor, existing.user_id);
    let upd = payload.into_inner();
    // re-geocode only when the address actually changed
    let coords = match upd.address.as_deref() {
        Some(address) if address != existing.address => {
            let point = data.geocoder.geocode(address).await;
            CoordsChange::Set {
                latitude: point.map(|p| p.latitude),
                longitude: point.map(|p| p.longitude),
            }
        }
        _ => CoordsChange::Keep,
    };
    // a replaced photo leaves no orphan file behind
    let replaced_photo = match upd.photo_path.as_deref() {
        Some(photo) if existing.photo_path.as_deref() != Some(photo) => {
            existing.photo_path.clone()
        }
        _ => None,
    };
    let ad = data.repo.update_pet_ad(id, upd, coords).await?;
    if let Some(photo) = replaced_photo {
        if let Err(e) = data.photo_store.delete(&photo).await {
            log::warn!("failed to remove replaced photo '{photo}' for ad {id}: {e}");
        }
    }
    Ok(HttpResponse::Ok().json(ad))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct StatusChange {
    pub status: PetStatus,
}

#[utoipa::path(
    post,
    path = "/api/v1/pet-ads/{id}/status",
    request_body = StatusChange,
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 200, description = "Status updated", body = PetAd),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn set_pet_ad_status(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<StatusChange>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let id = path.into_inner();
    let existing = data.repo.get_pet_ad(id).await?;
    ensure_owner!(actor, existing.user_id);
    let ad = data.repo.set_pet_ad_status(id, payload.status).await?;
    Ok(HttpResponse::Ok().json(ad))
}

#[utoipa::path(
    delete,
    path = "/api/v1/pet-ads/{id}",
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 204, description = "Listing deleted together with its comments and photo"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn delete_pet_ad(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let id = path.into_inner();
    let existing = data.repo.get_pet_ad(id).await?;
    ensure_owner!(actor, existing.user_id);
    data.repo.delete_pet_ad(id).await?;
    if let Some(photo) = existing.photo_path {
        if let Err(e) = data.photo_store.delete(&photo).await {
            log::warn!("failed to remove photo '{photo}' for deleted ad {id}: {e}");
        }
    }
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- Comments / likes / favorites ------------------------

#[utoipa::path(
    get,
    path = "/api/v1/pet-ads/{id}/comments",
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 200, description = "Comments, oldest first", body = [Comment]),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn list_comments(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let pet_ad_id = path.into_inner();
    data.repo.get_pet_ad(pet_ad_id).await?;
    let comments = data.repo.list_comments(pet_ad_id).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[utoipa::path(
    post,
    path = "/api/v1/pet-ads/{id}/comments",
    request_body = NewComment,
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty comment"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn add_comment(
    req: HttpRequest,
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("comment must not be empty".into()));
    }
    if !data.limiter.allow_comment(&client_ip(&req)) {
        return Err(ApiError::TooManyRequests);
    }
    let comment = data
        .repo
        .create_comment(path.into_inner(), actor, payload.into_inner().text)
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct LikeToggleResponse {
    /// State after the toggle.
    pub liked: bool,
    pub likes: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/pet-ads/{id}/like",
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeToggleResponse),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn toggle_like(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let pet_ad_id = path.into_inner();
    let liked = data.repo.toggle_like(pet_ad_id, actor).await?;
    let likes = data.repo.like_count(pet_ad_id).await?;
    Ok(HttpResponse::Ok().json(LikeToggleResponse { liked, likes }))
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct FavoriteToggleResponse {
    pub favorited: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/pet-ads/{id}/favorite",
    params(("id" = Id, Path, description = "Pet ad id")),
    responses(
        (status = 200, description = "Favorite toggled", body = FavoriteToggleResponse),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn toggle_favorite(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let favorited = data.repo.toggle_favorite(path.into_inner(), actor).await?;
    Ok(HttpResponse::Ok().json(FavoriteToggleResponse { favorited }))
}

#[utoipa::path(
    get,
    path = "/api/v1/favorites",
    responses(
        (status = 200, description = "Favorited ads, most recent first", body = [PetAd]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_favorites(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let ads = data.repo.list_favorite_ads(actor).await?;
    Ok(HttpResponse::Ok().json(ads))
}

// ---------------- Map / statistics ------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/map/markers",
    responses((status = 200, description = "Markers for every ad with coordinates", body = [MapMarker]))
)]
pub async fn map_markers(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let ads = data.repo.list_pet_ads().await?;
    let markers: Vec<MapMarker> = ads.iter().filter_map(MapMarker::from_ad).collect();
    Ok(HttpResponse::Ok().json(markers))
}

#[utoipa::path(
    get,
    path = "/api/v1/statistics",
    responses((status = 200, description = "Listing counts by district and type", body = StatisticsReport))
)]
pub async fn statistics(
    auth: Option<Auth>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.as_ref().and_then(|a| a.user_id().ok());
    let rows = data.repo.stat_rows().await?;
    Ok(HttpResponse::Ok().json(build_report(&rows, actor)))
}

// ---------------- Volunteers ------------------------------------------

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct VolunteerBoard {
    pub volunteers: Vec<Volunteer>,
    /// The caller's own sign-ups; present only when authenticated.
    pub mine: Option<Vec<Volunteer>>,
}

#[utoipa::path(
    get,
    path = "/api/v1/volunteers",
    responses((status = 200, description = "All sign-ups, newest first", body = VolunteerBoard))
)]
pub async fn list_volunteers(
    auth: Option<Auth>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let volunteers = data.repo.list_volunteers().await?;
    let mine = match auth.as_ref().and_then(|a| a.user_id().ok()) {
        Some(actor) => Some(data.repo.list_volunteers_for(actor).await?),
        None => None,
    };
    Ok(HttpResponse::Ok().json(VolunteerBoard { volunteers, mine }))
}

fn validate_volunteer(new: &NewVolunteer) -> Result<(), ApiError> {
    for (field, value) in [
        ("name", &new.name),
        ("contacts", &new.contacts),
        ("districts", &new.districts),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{field} is required")));
        }
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/volunteers",
    request_body = NewVolunteer,
    responses(
        (status = 201, description = "Sign-up created", body = Volunteer),
        (status = 400, description = "Missing required field"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_volunteer(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewVolunteer>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let new = payload.into_inner();
    validate_volunteer(&new)?;
    let volunteer = data.repo.create_volunteer(new, actor).await?;
    Ok(HttpResponse::Created().json(volunteer))
}

#[utoipa::path(
    put,
    path = "/api/v1/volunteers/{id}",
    request_body = UpdateVolunteer,
    params(("id" = Id, Path, description = "Volunteer id")),
    responses(
        (status = 200, description = "Sign-up updated", body = Volunteer),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Sign-up not found")
    )
)]
pub async fn update_volunteer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateVolunteer>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let id = path.into_inner();
    let existing = data.repo.get_volunteer(id).await?;
    if existing.user_id != Some(actor) {
        return Err(ApiError::Forbidden);
    }
    let volunteer = data.repo.update_volunteer(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(volunteer))
}

#[utoipa::path(
    delete,
    path = "/api/v1/volunteers/{id}",
    params(("id" = Id, Path, description = "Volunteer id")),
    responses(
        (status = 204, description = "Sign-up deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Sign-up not found")
    )
)]
pub async fn delete_volunteer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.user_id().map_err(|_| ApiError::Unauthorized)?;
    let id = path.into_inner();
    let existing = data.repo.get_volunteer(id).await?;
    if existing.user_id != Some(actor) {
        return Err(ApiError::Forbidden);
    }
    data.repo.delete_volunteer(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- Photos ----------------------------------------------

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct PhotoUploadResponse {
    /// Stored filename; fetch via `/uploads/{path}`.
    pub path: String,
    pub mime: String,
    pub size: usize,
}

const PHOTO_SIZE_LIMIT: usize = 5 * 1024 * 1024; // 5 MB

const ALLOWED_PHOTO_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

#[utoipa::path(
    post,
    path = "/api/v1/photos",
    responses(
        (status = 201, description = "Photo stored", body = PhotoUploadResponse),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Not an allowed image type"),
        (status = 429, description = "Too many uploads")
    )
)]
pub async fn upload_photo(
    req: HttpRequest,
    _auth: Auth,
    data: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    if !data.limiter.allow_photo(&client_ip(&req)) {
        return Err(ApiError::TooManyRequests);
    }
    let mut bytes: Vec<u8> = Vec::new();
    while let Some(field) = payload.try_next().await.map_err(|e| {
        log::error!("multipart error: {e}");
        ApiError::Internal
    })? {
        if let Some(name) = field.content_disposition().get_name() {
            if name != "file" {
                continue;
            }
        } else {
            continue;
        }
        let mut field_stream = field;
        while let Some(chunk) = field_stream.try_next().await.map_err(|e| {
            log::error!("stream read error: {e}");
            ApiError::Internal
        })? {
            if bytes.len() + chunk.len() > PHOTO_SIZE_LIMIT {
                return Err(ApiError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
        // trust the sniffed type, never the client extension
        let kind = infer::get(&bytes).ok_or(ApiError::UnsupportedMediaType)?;
        let mime = kind.mime_type().to_string();
        if !ALLOWED_PHOTO_MIME.contains(&mime.as_str()) {
            return Err(ApiError::UnsupportedMediaType);
        }
        let path = data
            .photo_store
            .save(kind.extension(), &bytes)
            .await
            .map_err(|e| {
                log::error!("photo_store save error: {e}");
                ApiError::Internal
            })?;
        let resp = PhotoUploadResponse { path, mime, size: bytes.len() };
        return Ok(HttpResponse::Created().json(resp));
    }
    Err(ApiError::BadRequest("multipart field 'file' is required".into()))
}

/// Serve a stored photo by filename.
pub async fn get_photo(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    match data.photo_store.load(&name).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok()
            .insert_header(("Content-Type", mime))
            .body(bytes)),
        Err(PhotoStoreError::NotFound) => Err(ApiError::NotFound),
        Err(e) => {
            log::error!("photo_store load error: {e}");
            Err(ApiError::Internal)
        }
    }
}
