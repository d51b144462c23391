//service/mod.rs
pub mod backup_service;
pub mod cleanup_worker;
pub mod consistency;
pub mod gallery_service;
pub mod path_gen;
pub mod upload_service;
pub mod user_context;
pub mod validator;

use actix_web::error::{ErrorBadRequest, ErrorForbidden, ErrorInternalServerError};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use bytes::BytesMut;
use futures::StreamExt;
use log::{debug, error, info, warn};
use log_mdc;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use crate::app_state::AppState;
use crate::rows::{
    GalleryCategory, GalleryFilter, GalleryItemPatch, GalleryStatus, NewAuditEntry,
    NewGalleryItem,
};
use crate::service::backup_service::BackupType;
use crate::service::upload_service::{UploadFile, UploadOptions};
use crate::service::user_context::{Role, UserContext};

fn header_handler(req: &HttpRequest) -> Result<UserContext, Error> {
    let user_id = req
        .headers()
        .get("User")
        .ok_or_else(|| ErrorBadRequest("Missing User header"))?
        .to_str()
        .map_err(|_| ErrorBadRequest("Invalid User header value"))?
        .to_string();

    let role = match req.headers().get("Role").and_then(|h| h.to_str().ok()) {
        Some(raw) => Role::from_str(raw).map_err(ErrorBadRequest)?,
        None => Role::User,
    };

    log_mdc::insert("user", &user_id);
    log_mdc::insert("role", role_label(role));

    let mut context = UserContext::with_role(user_id, role);

    // Extract any additional headers as metadata
    for (header_name, header_value) in req.headers() {
        if let Ok(value_str) = header_value.to_str() {
            if header_name.as_str() != "user" && header_name.as_str() != "role" {
                context.set_metadata(header_name.as_str().to_string(), value_str.to_string());
            }
        }
    }

    Ok(context)
}

/// Caller context for read endpoints, where anonymous access is fine
fn read_context(req: &HttpRequest) -> Result<UserContext, Error> {
    if req.headers().contains_key("User") {
        header_handler(req)
    } else {
        log_mdc::insert("user", "anonymous");
        log_mdc::insert("role", "anonymous");
        Ok(UserContext::with_role("anonymous".to_string(), Role::Anonymous))
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Editor => "editor",
        Role::User => "user",
        Role::Anonymous => "anonymous",
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub title: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub optimize: bool,
    #[serde(default)]
    pub generate_thumbnail: bool,
}

pub async fn upload_handler(
    mut payload: web::Payload,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;

    let file_name = req
        .headers()
        .get("File-Name")
        .ok_or_else(|| ErrorBadRequest("Missing File-Name header"))?
        .to_str()
        .map_err(|_| ErrorBadRequest("Invalid File-Name header value"))?
        .to_string();
    let mime_type = req
        .headers()
        .get("Content-Type")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    debug!("Upload requested by {}: {}", context.user_id, file_name);

    info!("Starting chunk load for user: {}", context.user_id);
    let mut bytes = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(ErrorInternalServerError)?;
        bytes.extend_from_slice(&chunk);
    }
    info!("Total received data size: {} bytes", bytes.len());

    let category = match &query.category {
        Some(raw) => GalleryCategory::from_str(raw).map_err(ErrorBadRequest)?,
        None => GalleryCategory::default(),
    };
    let status = match &query.status {
        Some(raw) => GalleryStatus::from_str(raw).map_err(ErrorBadRequest)?,
        None => GalleryStatus::default(),
    };
    let options = UploadOptions {
        optimize: query.optimize,
        generate_thumbnail: query.generate_thumbnail,
        compression_quality: None,
    };

    let file = UploadFile {
        file_name: file_name.clone(),
        mime_type,
        bytes: bytes.freeze(),
    };
    let outcome = app_state.upload_service.upload(&file, &context, &options)?;

    // default title is the filename stem
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| file_name.clone());
    let new_item = NewGalleryItem {
        title: query.title.clone().unwrap_or(stem),
        storage_path: Some(outcome.storage_path.clone()),
        image_url: Some(outcome.url.clone()),
        category,
        status,
        file_metadata: Some(outcome.metadata.clone()),
        ..Default::default()
    };
    let item = match app_state.rows.insert_item(&new_item) {
        Ok(item) => item,
        Err(e) => {
            // The blob landed but the row did not. The blob is now an
            // orphan until the reclaimer's grace window expires.
            error!(
                "Row insert failed after blob write, {} left orphaned: {}",
                outcome.storage_path, e
            );
            return Err(e.into());
        }
    };
    if let Err(e) = app_state.rows.insert_audit(&NewAuditEntry {
        action: "upload".to_string(),
        item_id: Some(item.id.clone()),
        user_id: context.user_id.clone(),
        detail: format!("uploaded {} to {}", item.title, outcome.storage_path),
    }) {
        warn!("Audit write failed for upload of {}: {}", item.id, e);
    }

    info!("Upload complete: {} -> {}", item.title, outcome.storage_path);
    Ok(HttpResponse::Created().json(item))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<chrono::DateTime<chrono::Utc>>,
    pub date_to: Option<chrono::DateTime<chrono::Utc>>,
    /// Comma-separated tag list
    pub tags: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> Result<GalleryFilter, Error> {
        let category = match &self.category {
            Some(raw) => Some(GalleryCategory::from_str(raw).map_err(ErrorBadRequest)?),
            None => None,
        };
        let status = match &self.status {
            Some(raw) => Some(GalleryStatus::from_str(raw).map_err(ErrorBadRequest)?),
            None => None,
        };
        let tags = self.tags.as_deref().map(|raw| {
            raw.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        });
        Ok(GalleryFilter {
            category,
            status,
            search: self.search.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            tags,
        })
    }
}

pub async fn list_handler(
    req: HttpRequest,
    query: web::Query<ListQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = read_context(&req)?;
    let filter = query.filter()?;
    let page = app_state.gallery_service.list(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(20),
        &filter,
        &context,
    )?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn search_handler(
    req: HttpRequest,
    query: web::Query<SearchQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = read_context(&req)?;
    let hits = app_state.gallery_service.search_ranked(&query.q, &context)?;
    Ok(HttpResponse::Ok().json(hits))
}

pub async fn get_item_handler(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let item = app_state.gallery_service.get_item(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn create_item_handler(
    req: HttpRequest,
    body: web::Json<NewGalleryItem>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    let item = app_state.gallery_service.add_item(&body, &context)?;
    Ok(HttpResponse::Created().json(item))
}

pub async fn update_item_handler(
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Json<GalleryItemPatch>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    let item = app_state
        .gallery_service
        .update_item(&path.into_inner(), &body, &context)?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn delete_item_handler(
    path: web::Path<String>,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    let id = path.into_inner();
    app_state.gallery_service.delete_item(&id, &context)?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
    pub ids: Vec<String>,
}

pub async fn bulk_delete_handler(
    req: HttpRequest,
    body: web::Json<BulkDeleteBody>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    let report = app_state.gallery_service.delete_many(&body.ids, &context)?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn stats_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let stats = app_state.gallery_service.stats()?;
    Ok(HttpResponse::Ok().json(stats))
}

pub async fn check_handler(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    info!("Consistency check requested by {}", context.user_id);
    let report = app_state.consistency_service.check()?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn cleanup_handler(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    let report = app_state.consistency_service.cleanup(&context)?;
    Ok(HttpResponse::Ok().json(report))
}

#[derive(Debug, Deserialize, Default)]
pub struct BackupBody {
    pub backup_type: Option<String>,
}

pub async fn create_backup_handler(
    req: HttpRequest,
    body: Option<web::Json<BackupBody>>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    let backup_type = match body.as_ref().and_then(|b| b.backup_type.as_deref()) {
        Some(raw) => BackupType::from_str(raw).map_err(ErrorBadRequest)?,
        None => BackupType::Manual,
    };
    let record = app_state.backup_service.create_backup(backup_type, &context)?;
    Ok(HttpResponse::Created().json(record))
}

pub async fn list_backups_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let records = app_state.backup_service.list_backups()?;
    Ok(HttpResponse::Ok().json(records))
}

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
    pub storage_path: String,
}

pub async fn restore_handler(
    req: HttpRequest,
    body: web::Json<RestoreBody>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = header_handler(&req)?;
    // Restore replaces the whole dataset, so it stays admin-only
    if !context.is_admin() {
        warn!("Restore refused for non-admin user {}", context.user_id);
        return Err(ErrorForbidden("restore requires the admin role"));
    }
    let report = app_state
        .backup_service
        .restore_from_backup(&body.storage_path, &context)?;
    Ok(HttpResponse::Ok().json(report))
}

/// Route table shared by the server binary and the HTTP-level tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/gallery", web::get().to(list_handler))
        .route("/gallery/search", web::get().to(search_handler))
        .route("/gallery/stats", web::get().to(stats_handler))
        .route("/gallery/upload", web::post().to(upload_handler))
        .route("/gallery/items", web::post().to(create_item_handler))
        .route("/gallery/items/delete", web::post().to(bulk_delete_handler))
        .route("/gallery/items/{id}", web::get().to(get_item_handler))
        .route("/gallery/items/{id}", web::put().to(update_item_handler))
        .route("/gallery/items/{id}", web::delete().to(delete_item_handler))
        .route("/maintenance/check", web::post().to(check_handler))
        .route("/maintenance/cleanup", web::post().to(cleanup_handler))
        .route("/backup", web::post().to(create_backup_handler))
        .route("/backup", web::get().to(list_backups_handler))
        .route("/backup/restore", web::post().to(restore_handler));
}

// All handler-level unit tests live here; service logic is tested in the
// service modules themselves.

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_header_handler_with_valid_user() {
        let req = TestRequest::default()
            .insert_header(("User", "test_user"))
            .to_http_request();

        let context = header_handler(&req).unwrap();
        assert_eq!(context.user_id, "test_user");
        assert_eq!(context.role, Role::User);
    }

    #[test]
    fn test_header_handler_parses_role() {
        let req = TestRequest::default()
            .insert_header(("User", "root"))
            .insert_header(("Role", "admin"))
            .to_http_request();

        let context = header_handler(&req).unwrap();
        assert!(context.is_admin());
    }

    #[test]
    fn test_header_handler_rejects_unknown_role() {
        let req = TestRequest::default()
            .insert_header(("User", "u"))
            .insert_header(("Role", "owner"))
            .to_http_request();

        assert!(header_handler(&req).is_err());
    }

    #[test]
    fn test_header_handler_missing_user_header() {
        let req = TestRequest::default().to_http_request();
        assert!(header_handler(&req).is_err());
    }

    #[test]
    fn test_read_context_defaults_to_anonymous() {
        let req = TestRequest::default().to_http_request();
        let context = read_context(&req).unwrap();
        assert_eq!(context.user_id, "anonymous");
        assert_eq!(context.role, Role::Anonymous);
    }

    #[test]
    fn test_list_query_filter_parsing() {
        let query = ListQuery {
            page: Some(1),
            limit: Some(10),
            category: Some("event".to_string()),
            status: Some("draft".to_string()),
            search: Some("neon".to_string()),
            date_from: None,
            date_to: None,
            tags: Some("live, rooftop ,".to_string()),
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.category, Some(GalleryCategory::Event));
        assert_eq!(filter.status, Some(GalleryStatus::Draft));
        assert_eq!(
            filter.tags,
            Some(vec!["live".to_string(), "rooftop".to_string()])
        );

        let bad = ListQuery {
            page: None,
            limit: None,
            category: Some("nope".to_string()),
            status: None,
            search: None,
            date_from: None,
            date_to: None,
            tags: None,
        };
        assert!(bad.filter().is_err());
    }
}
