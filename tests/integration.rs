use actix_web::{http::StatusCode, test, web, App};
use serde_json::Value;
use std::io::Cursor;

use gallery_vault::app_state::AppState;
use gallery_vault::service::routes;

fn png_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    image::RgbaImage::new(1, 1)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_upload_then_list_round_trip() {
    let app = test_app!(AppState::new_for_testing());

    let req = test::TestRequest::post()
        .uri("/gallery/upload?title=Opening%20Night&category=event")
        .insert_header(("User", "editor-1"))
        .insert_header(("Role", "editor"))
        .insert_header(("File-Name", "opening night.png"))
        .insert_header(("Content-Type", "image/png"))
        .set_payload(png_bytes())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let item: Value = test::read_body_json(resp).await;
    assert_eq!(item["title"], "Opening Night");
    assert_eq!(item["category"], "event");
    let storage_path = item["storage_path"].as_str().unwrap();
    assert!(storage_path.starts_with("gallery/editor-1/"));
    assert!(item["image_url"].as_str().unwrap().ends_with(storage_path));

    // anonymous listing sees the published item with pagination metadata
    let req = test::TestRequest::get().uri("/gallery").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["data"][0]["title"], "Opening Night");
}

#[actix_web::test]
async fn test_upload_rejection_reports_every_error() {
    let app = test_app!(AppState::new_for_testing());

    let req = test::TestRequest::post()
        .uri("/gallery/upload")
        .insert_header(("User", "editor-1"))
        .insert_header(("File-Name", "malware.exe"))
        .insert_header(("Content-Type", "application/x-msdownload"))
        .set_payload(vec![0u8; 16])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_failed");
    let details = body["details"].as_array().unwrap();
    assert_eq!(details.len(), 2); // unsupported type and denied extension
}

#[actix_web::test]
async fn test_draft_items_hidden_from_non_admin_listing() {
    let app = test_app!(AppState::new_for_testing());

    let req = test::TestRequest::post()
        .uri("/gallery/items")
        .insert_header(("User", "editor-1"))
        .set_json(serde_json::json!({ "title": "wip", "status": "draft" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/gallery").to_request();
    let page: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(page["total"], 0);

    let req = test::TestRequest::get()
        .uri("/gallery")
        .insert_header(("User", "root"))
        .insert_header(("Role", "admin"))
        .to_request();
    let page: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(page["total"], 1);
}

#[actix_web::test]
async fn test_item_update_and_delete_over_http() {
    let app = test_app!(AppState::new_for_testing());

    let req = test::TestRequest::post()
        .uri("/gallery/items")
        .insert_header(("User", "editor-1"))
        .set_json(serde_json::json!({ "title": "first" }))
        .to_request();
    let item: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let id = item["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/gallery/items/{}", id))
        .insert_header(("User", "editor-1"))
        .set_json(serde_json::json!({ "title": "renamed", "status": "archived" }))
        .to_request();
    let updated: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(updated["title"], "renamed");
    assert_eq!(updated["status"], "archived");

    let req = test::TestRequest::delete()
        .uri(&format!("/gallery/items/{}", id))
        .insert_header(("User", "editor-1"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/gallery/items/{}", id))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_consistency_endpoints() {
    let app = test_app!(AppState::new_for_testing());

    // a row created by hand with a storage path has no blob behind it
    let req = test::TestRequest::post()
        .uri("/gallery/items")
        .insert_header(("User", "editor-1"))
        .set_json(serde_json::json!({
            "title": "dangling",
            "storage_path": "gallery/u/1-aaaaaaaa-gone.png"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/maintenance/check")
        .insert_header(("User", "ops"))
        .to_request();
    let report: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(report["issues"].as_array().unwrap().len(), 1);
    assert_eq!(report["issues"][0]["issue_type"], "missing_file");

    let req = test::TestRequest::post()
        .uri("/maintenance/cleanup")
        .insert_header(("User", "ops"))
        .to_request();
    let report: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(report["attempted"], 0);
    assert_eq!(report["deleted"], 0);
}

#[actix_web::test]
async fn test_restore_is_admin_only() {
    let app = test_app!(AppState::new_for_testing());

    let req = test::TestRequest::post()
        .uri("/gallery/items")
        .insert_header(("User", "editor-1"))
        .set_json(serde_json::json!({ "title": "snapshot me" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/backup")
        .insert_header(("User", "root"))
        .insert_header(("Role", "admin"))
        .set_json(serde_json::json!({ "backup_type": "manual" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let record: Value = test::read_body_json(resp).await;
    let storage_path = record["storage_path"].as_str().unwrap().to_string();

    // catalog lists the snapshot
    let req = test::TestRequest::get().uri("/backup").to_request();
    let catalog: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(catalog.as_array().unwrap().len(), 1);

    let req = test::TestRequest::post()
        .uri("/backup/restore")
        .insert_header(("User", "editor-1"))
        .insert_header(("Role", "editor"))
        .set_json(serde_json::json!({ "storage_path": storage_path }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::post()
        .uri("/backup/restore")
        .insert_header(("User", "root"))
        .insert_header(("Role", "admin"))
        .set_json(serde_json::json!({ "storage_path": storage_path }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["restored"], 1);
    assert_eq!(report["failed"], 0);
}
