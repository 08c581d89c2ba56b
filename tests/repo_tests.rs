#![cfg(feature = "inmem-store")]

use petaff::models::{NewPetAd, NewUserRecord, NewVolunteer, PetStatus, UpdatePetAd, UpdateVolunteer};
use petaff::repo::{inmem::InMemRepo, CoordsChange, RepoError};
use petaff::repo::{
    CommentRepo, FavoriteRepo, LikeRepo, PetAdRepo, UserRepo, VolunteerRepo,
};

/// Helper that returns a fresh, empty repository for every test run.
fn repo() -> InMemRepo {
    // isolate state: do **not** persist to the default file path
    std::env::set_var("PETAFF_DATA_DIR", tempfile::tempdir().unwrap().path());
    InMemRepo::new()
}

fn user(username: &str) -> NewUserRecord {
    NewUserRecord {
        username: username.into(),
        email: format!("{username}@example.com"),
        password_hash: "$argon2id$fake".into(),
        first_name: String::new(),
        last_name: String::new(),
        phone_number: String::new(),
    }
}

fn ad(name: &str, district: &str) -> NewPetAd {
    NewPetAd {
        name: name.into(),
        pet_type: "cat".into(),
        description: String::new(),
        status: PetStatus::InSearch,
        address: format!("{district} high street 1"),
        district: district.into(),
        contact_phone: String::new(),
        photo_path: None,
        date_lost: None,
    }
}

#[tokio::test]
async fn user_uniqueness() {
    let r = repo();
    let u = r.create_user(user("alice")).await.unwrap();
    assert_eq!(u.username, "alice");

    // same username, fresh email
    let mut dup = user("alice");
    dup.email = "other@example.com".into();
    assert!(matches!(
        r.create_user(dup).await.unwrap_err(),
        RepoError::Conflict(_)
    ));

    // same email, fresh username
    let mut dup = user("bob");
    dup.email = "alice@example.com".into();
    assert!(matches!(
        r.create_user(dup).await.unwrap_err(),
        RepoError::Conflict(_)
    ));

    assert_eq!(r.find_user_by_username("alice").await.unwrap().id, u.id);
    assert!(matches!(
        r.find_user_by_username("nobody").await.unwrap_err(),
        RepoError::NotFound
    ));
}

#[tokio::test]
async fn pet_ad_crud() {
    let r = repo();
    let owner = r.create_user(user("carol")).await.unwrap();

    assert!(r.list_pet_ads().await.unwrap().is_empty());

    let created = r
        .create_pet_ad(ad("Murka", "Center"), owner.id, Some(55.75), Some(37.61))
        .await
        .unwrap();
    assert_eq!(created.user_id, owner.id);
    assert_eq!(created.latitude, Some(55.75));

    // partial update keeps untouched fields
    let updated = r
        .update_pet_ad(
            created.id,
            UpdatePetAd { name: Some("Murzik".into()), ..Default::default() },
            CoordsChange::Keep,
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Murzik");
    assert_eq!(updated.district, "Center");
    assert_eq!(updated.latitude, Some(55.75));
    assert_eq!(updated.user_id, owner.id);

    // an address change comes with fresh coordinates, possibly empty
    let moved = r
        .update_pet_ad(
            created.id,
            UpdatePetAd { address: Some("nowhere".into()), ..Default::default() },
            CoordsChange::Set { latitude: None, longitude: None },
        )
        .await
        .unwrap();
    assert_eq!(moved.latitude, None);
    assert_eq!(moved.longitude, None);

    let with_status = r
        .set_pet_ad_status(created.id, PetStatus::Found)
        .await
        .unwrap();
    assert_eq!(with_status.status, PetStatus::Found);

    assert!(matches!(
        r.get_pet_ad(9999).await.unwrap_err(),
        RepoError::NotFound
    ));
}

#[tokio::test]
async fn deleting_an_ad_takes_its_dependents() {
    let r = repo();
    let owner = r.create_user(user("dave")).await.unwrap();
    let reader = r.create_user(user("erin")).await.unwrap();
    let listing = r
        .create_pet_ad(ad("Sharik", "North"), owner.id, None, None)
        .await
        .unwrap();

    r.create_comment(listing.id, reader.id, "seen him!".into())
        .await
        .unwrap();
    assert!(r.toggle_like(listing.id, reader.id).await.unwrap());
    assert!(r.toggle_favorite(listing.id, reader.id).await.unwrap());

    r.delete_pet_ad(listing.id).await.unwrap();

    assert!(matches!(
        r.get_pet_ad(listing.id).await.unwrap_err(),
        RepoError::NotFound
    ));
    assert!(r.list_comments(listing.id).await.unwrap().is_empty());
    assert_eq!(r.like_count(listing.id).await.unwrap(), 0);
    assert!(r.list_favorite_ads(reader.id).await.unwrap().is_empty());

    // interacting with the deleted ad is a NotFound, not a resurrection
    assert!(matches!(
        r.toggle_like(listing.id, reader.id).await.unwrap_err(),
        RepoError::NotFound
    ));
}

#[tokio::test]
async fn like_toggle_is_idempotent_over_two_calls() {
    let r = repo();
    let owner = r.create_user(user("fred")).await.unwrap();
    let listing = r
        .create_pet_ad(ad("Barsik", "South"), owner.id, None, None)
        .await
        .unwrap();

    assert!(r.toggle_like(listing.id, owner.id).await.unwrap());
    assert_eq!(r.like_count(listing.id).await.unwrap(), 1);
    // toggling twice restores the starting state
    assert!(!r.toggle_like(listing.id, owner.id).await.unwrap());
    assert_eq!(r.like_count(listing.id).await.unwrap(), 0);
    assert!(r.toggle_like(listing.id, owner.id).await.unwrap());
    assert_eq!(r.like_count(listing.id).await.unwrap(), 1);
}

#[tokio::test]
async fn favorites_list_most_recent_first() {
    let r = repo();
    let owner = r.create_user(user("gina")).await.unwrap();
    let first = r
        .create_pet_ad(ad("Pushok", "East"), owner.id, None, None)
        .await
        .unwrap();
    let second = r
        .create_pet_ad(ad("Ryzhik", "West"), owner.id, None, None)
        .await
        .unwrap();

    assert!(r.toggle_favorite(first.id, owner.id).await.unwrap());
    assert!(r.toggle_favorite(second.id, owner.id).await.unwrap());

    let favs = r.list_favorite_ads(owner.id).await.unwrap();
    assert_eq!(favs.len(), 2);
    assert_eq!(favs[0].id, second.id);

    // un-favorite removes from the list
    assert!(!r.toggle_favorite(second.id, owner.id).await.unwrap());
    let favs = r.list_favorite_ads(owner.id).await.unwrap();
    assert_eq!(favs.len(), 1);
    assert_eq!(favs[0].id, first.id);
}

#[tokio::test]
async fn comments_append_in_order() {
    let r = repo();
    let owner = r.create_user(user("hugo")).await.unwrap();
    let listing = r
        .create_pet_ad(ad("Tom", "Center"), owner.id, None, None)
        .await
        .unwrap();

    r.create_comment(listing.id, owner.id, "first".into()).await.unwrap();
    r.create_comment(listing.id, owner.id, "second".into()).await.unwrap();

    let comments = r.list_comments(listing.id).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].text, "first");
    assert_eq!(comments[1].text, "second");

    assert!(matches!(
        r.create_comment(9999, owner.id, "lost".into()).await.unwrap_err(),
        RepoError::NotFound
    ));
}

#[tokio::test]
async fn volunteer_crud_scoped_to_user() {
    let r = repo();
    let owner = r.create_user(user("ivan")).await.unwrap();
    let other = r.create_user(user("judy")).await.unwrap();

    let v = r
        .create_volunteer(
            NewVolunteer {
                name: "Ivan".into(),
                contacts: "+7 900 000-00-00".into(),
                districts: "Center, North".into(),
                comment: None,
            },
            owner.id,
        )
        .await
        .unwrap();
    assert_eq!(v.user_id, Some(owner.id));

    assert_eq!(r.list_volunteers().await.unwrap().len(), 1);
    assert_eq!(r.list_volunteers_for(owner.id).await.unwrap().len(), 1);
    assert!(r.list_volunteers_for(other.id).await.unwrap().is_empty());

    let updated = r
        .update_volunteer(
            v.id,
            UpdateVolunteer { districts: Some("South".into()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated.districts, "South");
    assert_eq!(updated.name, "Ivan");

    r.delete_volunteer(v.id).await.unwrap();
    assert!(r.list_volunteers().await.unwrap().is_empty());
    assert!(matches!(
        r.delete_volunteer(v.id).await.unwrap_err(),
        RepoError::NotFound
    ));
}

#[tokio::test]
async fn stat_rows_mirror_the_ads() {
    let r = repo();
    let owner = r.create_user(user("kate")).await.unwrap();
    r.create_pet_ad(ad("A", "Center"), owner.id, None, None).await.unwrap();
    let found = r.create_pet_ad(ad("B", "North"), owner.id, None, None).await.unwrap();
    r.set_pet_ad_status(found.id, PetStatus::Found).await.unwrap();

    let rows = r.stat_rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|row| row.status == PetStatus::Found));
    assert!(rows.iter().all(|row| row.user_id == owner.id));
}
