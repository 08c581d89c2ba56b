#![cfg(feature = "inmem-store")]

use actix_web::{test, App};
use petaff::geocode::NoopGeocoder;
use petaff::rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use petaff::repo::inmem::InMemRepo;
use petaff::storage::FsPhotoStore;
use petaff::{config, AppState};
use serial_test::serial;
use std::sync::Arc;

// Smallest PNG that passes magic-byte sniffing: signature + a little tail.
const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
    b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
];

fn setup_env(uploads: &tempfile::TempDir) {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    std::env::set_var("PETAFF_DATA_DIR", tempfile::tempdir().unwrap().path());
    std::env::set_var("PETAFF_UPLOADS_DIR", uploads.path());
}

fn state(repo: InMemRepo) -> actix_web::web::Data<AppState> {
    actix_web::web::Data::new(AppState {
        repo: Arc::new(repo),
        photo_store: Arc::new(FsPhotoStore::new()),
        geocoder: Arc::new(NoopGeocoder),
        limiter: RateLimiterFacade::new(
            InMemoryRateLimiter::new(false),
            RateLimitConfig::from_env(),
        ),
    })
}

fn multipart_body(boundary: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

macro_rules! register {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(&serde_json::json!({
                "username": $username,
                "email": format!("{}@example.com", $username),
                "password": "hunter2hunter2"
            }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), 201);
        let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        v["token"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
#[serial]
async fn test_upload_then_fetch_photo() {
    let uploads = tempfile::tempdir().unwrap();
    setup_env(&uploads);
    let app = test::init_service(App::new().app_data(state(InMemRepo::new())).configure(config))
        .await;
    let token = register!(&app, "shutterbug");

    let boundary = "----petaff-test-boundary";
    let req = test::TestRequest::post()
        .uri("/api/v1/photos")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, "pet.png", PNG_BYTES))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let uploaded: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let name = uploaded["path"].as_str().unwrap().to_string();
    assert!(name.ends_with(".png"));
    assert_eq!(uploaded["mime"], "image/png");
    assert_eq!(uploaded["size"].as_u64().unwrap() as usize, PNG_BYTES.len());

    let req = test::TestRequest::get()
        .uri(&format!("/uploads/{name}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "image/png"
    );
    assert_eq!(test::read_body(resp).await.as_ref(), PNG_BYTES);

    // names with path separators never reach the filesystem
    let req = test::TestRequest::get()
        .uri("/uploads/..%2Fstate.json")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn test_upload_rejections() {
    let uploads = tempfile::tempdir().unwrap();
    setup_env(&uploads);
    let app = test::init_service(App::new().app_data(state(InMemRepo::new())).configure(config))
        .await;
    let token = register!(&app, "rejected");
    let boundary = "----petaff-test-boundary";

    // anonymous upload
    let req = test::TestRequest::post()
        .uri("/api/v1/photos")
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, "pet.png", PNG_BYTES))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // not an image, whatever the filename claims
    let req = test::TestRequest::post()
        .uri("/api/v1/photos")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, "pet.png", b"just some text"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 415);

    // wrong field name means no file at all
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"picture\"; \
             filename=\"pet.png\"\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(PNG_BYTES);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    let req = test::TestRequest::post()
        .uri("/api/v1/photos")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
#[serial]
async fn test_upload_size_cap() {
    let uploads = tempfile::tempdir().unwrap();
    setup_env(&uploads);
    let app = test::init_service(App::new().app_data(state(InMemRepo::new())).configure(config))
        .await;
    let token = register!(&app, "oversized");
    let boundary = "----petaff-test-boundary";

    // one byte over the 5 MB cap
    let mut huge = Vec::new();
    huge.extend_from_slice(PNG_BYTES);
    huge.resize(5 * 1024 * 1024 + 1, 0);
    let req = test::TestRequest::post()
        .uri("/api/v1/photos")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, "pet.png", &huge))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 413);

    // exactly at the cap still goes through
    let mut exact = Vec::new();
    exact.extend_from_slice(PNG_BYTES);
    exact.resize(5 * 1024 * 1024, 0);
    let req = test::TestRequest::post()
        .uri("/api/v1/photos")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, "pet.png", &exact))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
}

#[actix_web::test]
#[serial]
async fn test_deleting_an_ad_removes_its_photo_file() {
    let uploads = tempfile::tempdir().unwrap();
    setup_env(&uploads);
    let app = test::init_service(App::new().app_data(state(InMemRepo::new())).configure(config))
        .await;
    let token = register!(&app, "cleaner");

    let boundary = "----petaff-test-boundary";
    let req = test::TestRequest::post()
        .uri("/api/v1/photos")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, "pet.png", PNG_BYTES))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let uploaded: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let name = uploaded["path"].as_str().unwrap().to_string();
    assert!(uploads.path().join(&name).exists());

    let req = test::TestRequest::post()
        .uri("/api/v1/pet-ads")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({
            "name": "Murka",
            "pet_type": "cat",
            "address": "Center high street 1",
            "district": "Center",
            "photo_path": name
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let ad: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let ad_id = ad["id"].as_i64().unwrap();
    assert_eq!(ad["photo_path"].as_str().unwrap(), name);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/pet-ads/{ad_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    assert!(!uploads.path().join(&name).exists());
}

#[actix_web::test]
#[serial]
async fn test_replacing_a_photo_removes_the_old_file() {
    let uploads = tempfile::tempdir().unwrap();
    setup_env(&uploads);
    let app = test::init_service(App::new().app_data(state(InMemRepo::new())).configure(config))
        .await;
    let token = register!(&app, "swapper");
    let boundary = "----petaff-test-boundary";

    let mut names = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/v1/photos")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .insert_header((
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, "pet.png", PNG_BYTES))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        names.push(v["path"].as_str().unwrap().to_string());
    }
    let (first, second) = (names[0].clone(), names[1].clone());

    let req = test::TestRequest::post()
        .uri("/api/v1/pet-ads")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({
            "name": "Murka",
            "pet_type": "cat",
            "address": "Center high street 1",
            "district": "Center",
            "photo_path": first
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let ad: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let ad_id = ad["id"].as_i64().unwrap();

    // an edit that keeps the same photo leaves the file alone
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/pet-ads/{ad_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({"photo_path": first, "description": "grey tabby"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(uploads.path().join(&first).exists());

    // swapping to a fresh photo removes the replaced file
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/pet-ads/{ad_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({"photo_path": second}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let ad: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(ad["photo_path"].as_str().unwrap(), second);
    assert!(!uploads.path().join(&first).exists());
    assert!(uploads.path().join(&second).exists());
}
