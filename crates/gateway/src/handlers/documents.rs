//! Document management handlers

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;
use noe_common::{
    auth::AuthSession,
    db::DocumentFilter,
    errors::{AppError, Result},
    models::{decode_payload, encode_payload, Document, DocumentType},
    response::{clamp_limit, ApiResponse, Pagination},
};

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    #[serde(rename = "type")]
    pub doc_type: Option<DocumentType>,
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,

    pub content: Option<String>,

    /// Standard base64, optionally as a data URL. Absent keeps the stored
    /// file; `null` or an empty string removes it.
    #[serde(default, deserialize_with = "present")]
    pub file_data: Option<Option<String>>,

    #[validate(length(max = 255))]
    pub file_name: Option<String>,

    #[validate(length(max = 255))]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
}

/// Tells an explicit `null` apart from a missing field
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// MIME type carried by a `data:<mime>;base64,` prefix
fn data_url_mime(data: &str) -> Option<String> {
    data.strip_prefix("data:")?
        .split_once(";base64,")
        .map(|(mime, _)| mime.to_string())
        .filter(|mime| !mime.is_empty())
}

/// Validate and normalise input onto a document
fn apply_input(document: &mut Document, input: DocumentInput, max_bytes: usize) -> Result<()> {
    document.name = input.name;
    document.doc_type = input.doc_type;
    document.content = input.content;
    document.tags = input
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    match input.file_data {
        None => {
            if input.file_name.is_some() {
                document.file_name = input.file_name;
            }
            if input.mime_type.is_some() {
                document.mime_type = input.mime_type;
            }
        }
        Some(data) => {
            document.file_name = input.file_name;
            document.mime_type = input.mime_type;
            document.file_data = match data.filter(|d| !d.trim().is_empty()) {
                Some(data) => {
                    let bytes = decode_payload(&data)?;
                    if bytes.len() > max_bytes {
                        return Err(AppError::PayloadTooLarge {
                            size: bytes.len(),
                            limit: max_bytes,
                        });
                    }
                    if document.mime_type.is_none() {
                        document.mime_type = data_url_mime(&data);
                    }
                    Some(encode_payload(&bytes))
                }
                None => None,
            };
        }
    }

    document.size = document.compute_size()?;
    Ok(())
}

async fn load_document(state: &AppState, id: Uuid) -> Result<Document> {
    state
        .store
        .find_document(id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })
}

/// List documents, newest first; file payloads are left out
pub async fn list_documents(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiQuery(query): ApiQuery<ListDocumentsQuery>,
) -> Result<ApiResponse<Vec<Document>>> {
    let filter = DocumentFilter {
        doc_type: query.doc_type,
        search: query.search,
        offset: query.offset.unwrap_or(0),
        limit: clamp_limit(query.limit),
    };

    let (mut documents, total) = state.store.list_documents(&filter).await?;
    for document in &mut documents {
        document.file_data = None;
    }

    Ok(ApiResponse::ok(documents).with_pagination(Pagination {
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// Upload a document
pub async fn create_document(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiJson(mut input): ApiJson<DocumentInput>,
) -> Result<(StatusCode, Json<ApiResponse<Document>>)> {
    input.name = input.name.trim().to_string();
    input.validate()?;

    let mut document = Document::new(input.name.clone(), input.doc_type);
    apply_input(&mut document, input, state.config.documents.max_file_bytes)?;

    let document = state.store.insert_document(document).await?;

    tracing::info!(
        document_id = %document.id,
        doc_type = %document.doc_type,
        size = document.size,
        user = %auth.session.username,
        "Document uploaded"
    );

    Ok(ApiResponse::ok(document)
        .with_message("Document uploaded")
        .with_status(StatusCode::CREATED))
}

/// Get a document by ID, payload included
pub async fn get_document(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<Document>> {
    Ok(ApiResponse::ok(load_document(&state, id).await?))
}

/// Replace a document
pub async fn update_document(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut input): ApiJson<DocumentInput>,
) -> Result<ApiResponse<Document>> {
    input.name = input.name.trim().to_string();
    input.validate()?;

    let mut document = load_document(&state, id).await?;
    apply_input(&mut document, input, state.config.documents.max_file_bytes)?;
    document.modified_at = Utc::now();

    let document = state
        .store
        .update_document(document)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

    tracing::info!(document_id = %id, user = %auth.session.username, "Document updated");
    Ok(ApiResponse::ok(document).with_message("Document updated"))
}

/// Delete a document
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<DeletedResponse>> {
    if !state.store.delete_document(id).await? {
        return Err(AppError::DocumentNotFound { id: id.to_string() });
    }

    tracing::info!(document_id = %id, user = %auth.session.username, "Document deleted");
    Ok(ApiResponse::ok(DeletedResponse { id }).with_message("Document deleted"))
}

/// Raw document body: the decoded file, or the inline text
pub async fn get_content(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response> {
    let document = load_document(&state, id).await?;

    if let Some(bytes) = document.decoded_file()? {
        let mime = document
            .mime_type
            .as_deref()
            .and_then(|m| HeaderValue::from_str(m).ok())
            .unwrap_or(HeaderValue::from_static("application/octet-stream"));

        let mut response = (StatusCode::OK, bytes).into_response();
        response.headers_mut().insert(header::CONTENT_TYPE, mime);

        if let Some(name) = document.file_name.as_deref() {
            let safe: String = name.chars().filter(|c| *c != '"' && !c.is_control()).collect();
            if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", safe)) {
                response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
            }
        }
        return Ok(response);
    }

    match document.content {
        Some(text) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response()),
        None => Err(AppError::NotFound {
            resource_type: "document content".to_string(),
            id: id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::data_url_mime;
    use crate::test_support::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use noe_common::models::encode_payload;
    use serde_json::json;
    use tower::ServiceExt;

    #[test]
    fn test_data_url_mime() {
        assert_eq!(data_url_mime("data:image/png;base64,AAAA").as_deref(), Some("image/png"));
        assert_eq!(data_url_mime("AAAA"), None);
    }

    #[tokio::test]
    async fn test_text_document_lifecycle() {
        let app = app(test_state());
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/documents",
            Some(&token),
            Some(json!({
                "name": "Closing checklist",
                "type": "procedure",
                "content": "Lock the walk-in",
                "tags": ["closing", " "]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["type"], "procedure");
        assert_eq!(body["data"]["size"], 16);
        assert_eq!(body["data"]["tags"], json!(["closing"]));
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/documents/{id}"),
            Some(&token),
            Some(json!({ "name": "Closing checklist v2", "type": "procedure", "content": "Lock up" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Closing checklist v2");
        assert_eq!(body["data"]["size"], 7);

        let (status, _) = send(&app, "DELETE", &format!("/api/documents/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "GET", &format!("/api/documents/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "DOCUMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_file_upload_and_content() {
        let app = app(test_state());
        let token = login(&app).await;

        let data = format!("data:application/pdf;base64,{}", encode_payload(b"%PDF-1.4 menu"));
        let (status, body) = send(
            &app,
            "POST",
            "/api/documents",
            Some(&token),
            Some(json!({ "name": "Spring menu", "type": "menu", "fileData": data, "fileName": "menu.pdf" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["mimeType"], "application/pdf");
        assert_eq!(body["data"]["size"], 13);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, list) = send(&app, "GET", "/api/documents", Some(&token), None).await;
        assert_eq!(list["pagination"]["total"], 1);
        assert!(list["data"][0].get("fileData").is_none());

        let request = Request::builder()
            .uri(format!("/api/documents/{id}/content"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4 menu");
    }

    #[tokio::test]
    async fn test_update_without_file_data_keeps_file() {
        let app = app(test_state());
        let token = login(&app).await;

        let (_, body) = send(
            &app,
            "POST",
            "/api/documents",
            Some(&token),
            Some(json!({
                "name": "Walk-in temps",
                "type": "procedure",
                "fileData": encode_payload(b"date,temp"),
                "fileName": "temps.csv",
                "mimeType": "text/csv"
            })),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/documents/{id}");

        // Rename using the listed copy, which carries no payload
        let (_, list) = send(&app, "GET", "/api/documents", Some(&token), None).await;
        let mut listed = list["data"][0].clone();
        listed["name"] = json!("Walk-in temperatures");
        let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(listed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Walk-in temperatures");
        assert_eq!(body["data"]["size"], 9);
        assert_eq!(body["data"]["mimeType"], "text/csv");
        assert_eq!(body["data"]["fileData"], encode_payload(b"date,temp"));

        let (status, _) = send(&app, "GET", &format!("{uri}/content"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        // An explicit null removes it
        let (_, body) = send(
            &app,
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "name": "Walk-in temperatures", "fileData": null })),
        )
        .await;
        assert!(body["data"].get("fileData").is_none());
        assert_eq!(body["data"]["size"], 0);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let app = app(test_state());
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/documents",
            Some(&token),
            Some(json!({ "name": "  \t ", "content": "text" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_base64_rejected() {
        let app = app(test_state());
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/documents",
            Some(&token),
            Some(json!({ "name": "Scan", "fileData": "@@not base64@@" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let mut config = test_config();
        config.documents.max_file_bytes = 8;
        let state = crate::AppState::new(
            config,
            std::sync::Arc::new(noe_common::db::MemoryStore::new()),
        )
        .unwrap();
        let app = app(state);
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/documents",
            Some(&token),
            Some(json!({ "name": "Invoice", "type": "invoice", "fileData": encode_payload(&[7u8; 16]) })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_content_missing() {
        let app = app(test_state());
        let token = login(&app).await;

        let (_, body) = send(
            &app,
            "POST",
            "/api/documents",
            Some(&token),
            Some(json!({ "name": "Empty" })),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "GET", &format!("/api/documents/{id}/content"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
