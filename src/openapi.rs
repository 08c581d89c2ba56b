use crate::models::{
    Comment, Credentials, MapMarker, NewComment, NewPetAd, NewUser, NewVolunteer, PetAd,
    PetStatus, UpdatePetAd, UpdateVolunteer, User, Volunteer,
};
use crate::stats::{GroupStat, ScopeStats, StatisticsReport};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::register,
        crate::routes::login,
        crate::routes::auth_me,
        crate::routes::list_pet_ads,
        crate::routes::get_pet_ad,
        crate::routes::create_pet_ad,
        crate::routes::update_pet_ad,
        crate::routes::set_pet_ad_status,
        crate::routes::delete_pet_ad,
        crate::routes::list_comments,
        crate::routes::add_comment,
        crate::routes::toggle_like,
        crate::routes::toggle_favorite,
        crate::routes::list_favorites,
        crate::routes::map_markers,
        crate::routes::statistics,
        crate::routes::list_volunteers,
        crate::routes::create_volunteer,
        crate::routes::update_volunteer,
        crate::routes::delete_volunteer,
        crate::routes::upload_photo,
    ),
    components(schemas(
        User, NewUser, Credentials, PetAd, NewPetAd, UpdatePetAd, PetStatus,
        Comment, NewComment, Volunteer, NewVolunteer, UpdateVolunteer, MapMarker,
        StatisticsReport, ScopeStats, GroupStat,
        crate::routes::AuthResponse, crate::routes::StatusChange,
        crate::routes::LikeToggleResponse, crate::routes::FavoriteToggleResponse,
        crate::routes::VolunteerBoard, crate::routes::PhotoUploadResponse
    )),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "pet-ads", description = "Lost/found pet listings"),
        (name = "interactions", description = "Comments, likes, favorites"),
        (name = "discovery", description = "Map markers and statistics"),
        (name = "volunteers", description = "Volunteer sign-ups"),
    )
)]
pub struct ApiDoc;
