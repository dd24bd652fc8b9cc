//! HTTP surface for the record store: CRUD, filtered queries, free-text
//! search, batch re-validation, duplicate report and aggregate stats.

use crate::batch;
use crate::errors::RegistryError;
use crate::rules;
use crate::store::ClientStore;
use crate::types::{Client, ClientFilter, ClientStats};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub fn router(store: ClientStore) -> Router {
    Router::new()
        .route("/clients", get(list_clients).delete(clear_clients))
        .route("/clients/search", get(search_clients))
        .route("/clients/validate", post(validate_all_clients))
        .route("/clients/validate-one", post(validate_single))
        .route("/clients/duplicates", get(duplicate_claves))
        .route(
            "/clients/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/stats", get(get_stats))
        .with_state(store)
}

#[derive(Serialize)]
struct ClientListResponse {
    clients: Vec<Client>,
    total: usize,
    page: usize,
    limit: usize,
}

impl IntoResponse for ClientListResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Serialize)]
struct SearchResponse {
    clients: Vec<Client>,
    total: usize,
    search_term: String,
}

#[derive(Serialize)]
struct ValidateResponse {
    clients: Vec<Client>,
    stats: ClientStats,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error_message: String,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match self {
            RegistryError::NotFound => StatusCode::NOT_FOUND,
            RegistryError::DuplicateClave(_) => StatusCode::CONFLICT,
        };

        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        (status, body).into_response()
    }
}

async fn list_clients(
    State(store): State<ClientStore>,
    Query(filter): Query<ClientFilter>,
) -> ClientListResponse {
    let clients = store.query(&filter);
    ClientListResponse {
        clients,
        total: store.count(),
        page: filter.page,
        limit: filter.limit,
    }
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search_clients(
    State(store): State<ClientStore>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiErrorResponse> {
    if params.q.is_empty() {
        return Err(ApiErrorResponse {
            error_message: "search term is required".to_string(),
        });
    }

    let term = params.q.to_lowercase();
    let clients: Vec<Client> = store
        .get_all()
        .into_iter()
        .filter(|client| {
            client.clave.to_lowercase().contains(&term)
                || client.nombre.to_lowercase().contains(&term)
                || client.correo.to_lowercase().contains(&term)
                || client.telefono.contains(&params.q)
        })
        .collect();

    let total = clients.len();
    Ok(Json(SearchResponse {
        clients,
        total,
        search_term: params.q,
    }))
}

async fn get_client(
    State(store): State<ClientStore>,
    Path(id): Path<u64>,
) -> Result<Json<Client>, RegistryError> {
    store.get_by_id(id).map(Json)
}

/// Replaces a record, re-validating the submitted fields first so the stored
/// copy always carries a fresh error state.
async fn update_client(
    State(store): State<ClientStore>,
    Path(id): Path<u64>,
    Json(mut client): Json<Client>,
) -> Result<Json<Client>, RegistryError> {
    rules::validate(&mut client);
    store.update(id, client).map(Json)
}

async fn delete_client(
    State(store): State<ClientStore>,
    Path(id): Path<u64>,
) -> Result<StatusCode, RegistryError> {
    store.delete(id).map(|()| StatusCode::NO_CONTENT)
}

async fn clear_clients(State(store): State<ClientStore>) -> StatusCode {
    store.clear();
    StatusCode::NO_CONTENT
}

/// Re-runs batch validation over the whole store and swaps the results back
/// in, ids and all.
async fn validate_all_clients(State(store): State<ClientStore>) -> Json<ValidateResponse> {
    let validated = batch::validate_all(store.get_all());
    store.replace_all(validated.clone());

    Json(ValidateResponse {
        clients: validated,
        stats: store.stats(),
    })
}

/// Validates a submitted record without storing it.
async fn validate_single(Json(mut client): Json<Client>) -> Json<Client> {
    rules::validate(&mut client);
    Json(client)
}

async fn duplicate_claves(
    State(store): State<ClientStore>,
) -> Json<HashMap<String, Vec<u64>>> {
    Json(store.duplicate_claves())
}

async fn get_stats(State(store): State<ClientStore>) -> Json<ClientStats> {
    Json(store.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::util::ServiceExt;

    fn seeded_store() -> ClientStore {
        let store = ClientStore::new();
        store
            .create(Client::new("120", "Ana María", "ana@gmail.com", "961-123-4567"))
            .unwrap();
        store
            .create(Client::new("121", "Eva Luz", "eva@hotmail.com", "962-123-4567"))
            .unwrap();
        store
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn list_applies_filter_and_reports_total() {
        let app = router(seeded_store());
        let response = app
            .oneshot(get_request("/clients?correo=hotmail"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["clients"].as_array().unwrap().len(), 1);
        assert_eq!(body["clients"][0]["clave"], "121");
        // total is the store size, not the match count.
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn get_missing_client_is_404() {
        let app = router(seeded_store());
        let response = app.oneshot(get_request("/clients/99")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error_message"], "client not found");
    }

    #[tokio::test]
    async fn update_revalidates_the_payload() {
        let store = seeded_store();
        let app = router(store.clone());

        let payload = serde_json::json!({
            "clave": "12a",
            "nombre": "Ana",
            "correo": "ana@gmail.com",
            "telefono": "961-123-4567",
        });
        let response = app
            .oneshot(json_request("PUT", "/clients/1", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["is_valid"], false);
        assert!(body["errors"]["clave"].is_string());
        assert!(!store.get_by_id(1).unwrap().is_valid);
    }

    #[tokio::test]
    async fn update_to_taken_clave_conflicts() {
        let app = router(seeded_store());
        let payload = serde_json::json!({
            "clave": "121",
            "nombre": "Ana",
            "correo": "ana@gmail.com",
            "telefono": "961-123-4567",
        });
        let response = app
            .oneshot(json_request("PUT", "/clients/1", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let store = seeded_store();
        let app = router(store.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/clients/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.count(), 1);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/clients/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_requires_a_term() {
        let app = router(seeded_store());
        let response = app
            .clone()
            .oneshot(get_request("/clients/search"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(get_request("/clients/search?q=eva"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["clients"][0]["clave"], "121");
    }

    #[tokio::test]
    async fn validate_all_marks_duplicates_in_place() {
        let store = ClientStore::new();
        store.batch_create(vec![
            Client::new("42", "Ana", "ana@gmail.com", "961-123-4567"),
            Client::new("42", "Eva", "eva@gmail.com", "962-123-4567"),
        ]);
        let app = router(store.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/clients/validate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["stats"]["invalid"], 2);
        for client in store.get_all() {
            assert!(client.error("clave").unwrap().contains("duplicate"));
        }
    }

    #[tokio::test]
    async fn validate_single_does_not_store() {
        let store = ClientStore::new();
        let app = router(store.clone());

        let payload = serde_json::json!({
            "clave": "120",
            "nombre": "Ana",
            "correo": "a@b.com",
            "telefono": "961-123-4567",
        });
        let response = app
            .oneshot(json_request("POST", "/clients/validate-one", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["is_valid"], false);
        assert!(body["errors"]["correo"].is_string());
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn duplicates_and_stats_endpoints() {
        let store = ClientStore::new();
        store.batch_create(vec![
            Client::new("42", "Ana", "ana@gmail.com", "961-123-4567"),
            Client::new("42", "Eva", "eva@gmail.com", "962-123-4567"),
        ]);
        let app = router(store);

        let response = app
            .clone()
            .oneshot(get_request("/clients/duplicates"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["42"].as_array().unwrap().len(), 2);

        let response = app.oneshot(get_request("/stats")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 2);
    }
}
