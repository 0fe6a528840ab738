use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use shared::domain::{ClientId, ClientRecord};
use shared::protocol::{ClientFields, ClientPatch};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use super::*;
use shared::protocol::TokenPair;

#[derive(Clone, Default)]
struct ServerState {
    seen_auth: Arc<Mutex<Vec<Option<String>>>>,
}

impl ServerState {
    async fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.seen_auth.lock().await.push(auth);
    }
}

fn canonical(id: i64, fields: &ClientFields) -> ClientRecord {
    ClientRecord {
        id: ClientId(id),
        name: fields.name.clone(),
        email: fields.email.clone(),
        phone: fields.phone.clone(),
        company: fields.company.clone(),
    }
}

async fn create_client(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(fields): Json<ClientFields>,
) -> (StatusCode, Json<ClientRecord>) {
    state.record_auth(&headers).await;
    (StatusCode::CREATED, Json(canonical(42, &fields)))
}

async fn list_clients(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Json<Vec<ClientRecord>> {
    state.record_auth(&headers).await;
    Json(vec![canonical(
        1,
        &ClientFields {
            name: "Jane".to_string(),
            email: None,
            phone: "+254712345678".to_string(),
            company: "Acme".to_string(),
        },
    )])
}

async fn update_client(
    Path(id): Path<i64>,
    Json(fields): Json<ClientFields>,
) -> Json<ClientRecord> {
    Json(canonical(id, &fields))
}

async fn patch_client(Path(id): Path<i64>, Json(patch): Json<ClientPatch>) -> Json<ClientRecord> {
    let mut record = canonical(
        id,
        &ClientFields {
            name: "Jane".to_string(),
            email: None,
            phone: "+254712345678".to_string(),
            company: "Acme".to_string(),
        },
    );
    record.apply_patch(&patch);
    Json(record)
}

async fn delete_client(Path(_id): Path<i64>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn validation_error() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"phone": ["Enter a valid phone number."]})),
    )
}

async fn missing() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"detail": "Authentication credentials were not provided."})),
    )
}

async fn spawn_api_server(state: ServerState) -> String {
    let app = Router::new()
        .route("/api/clients/", post(create_client).get(list_clients))
        .route(
            "/api/clients/:id/",
            put(update_client)
                .patch(patch_client)
                .delete(delete_client),
        )
        .route("/api/invalid/", post(validation_error))
        .route("/api/invalid/:id/", put(validation_error))
        .route("/api/missing/:id/", put(missing).delete(missing))
        .route("/api/broken/", get(broken).post(broken))
        .route("/api/locked/", get(unauthorized))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/api")
}

fn fields() -> ClientFields {
    ClientFields {
        name: "Jane".to_string(),
        email: None,
        phone: "+254712345678".to_string(),
        company: "Acme".to_string(),
    }
}

async fn authed_session() -> Session {
    let session = Session::new();
    session
        .install(TokenPair {
            access: "access-123".to_string(),
            refresh: "refresh-456".to_string(),
        })
        .await;
    session
}

#[tokio::test]
async fn attaches_the_bearer_token_when_the_session_holds_one() {
    let state = ServerState::default();
    let base = spawn_api_server(state.clone()).await;
    let transport = RestTransport::new(base, authed_session().await);

    let record = RecordApi::<ClientRecord>::create(&transport, &fields())
        .await
        .expect("create");
    assert_eq!(record.id, ClientId(42));

    let seen = state.seen_auth.lock().await;
    assert_eq!(seen.as_slice(), [Some("Bearer access-123".to_string())]);
}

#[tokio::test]
async fn anonymous_calls_omit_the_authorization_header() {
    let state = ServerState::default();
    let base = spawn_api_server(state.clone()).await;
    let transport = RestTransport::new(base, Session::new());

    let listed = RecordApi::<ClientRecord>::list(&transport)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);

    let seen = state.seen_auth.lock().await;
    assert_eq!(seen.as_slice(), [None]);
}

#[tokio::test]
async fn update_and_delete_address_the_record_url() {
    let base = spawn_api_server(ServerState::default()).await;
    let transport = RestTransport::new(base, Session::new());

    let updated = RecordApi::<ClientRecord>::update(&transport, 7, &fields())
        .await
        .expect("update");
    assert_eq!(updated.id, ClientId(7));

    let patched = RecordApi::<ClientRecord>::partial_update(
        &transport,
        7,
        &ClientPatch {
            company: Some("Initech".to_string()),
            ..ClientPatch::default()
        },
    )
    .await
    .expect("patch");
    assert_eq!(patched.company, "Initech");

    RecordApi::<ClientRecord>::delete(&transport, 7)
        .await
        .expect("delete");
}

#[tokio::test]
async fn four_hundreds_decode_into_field_scoped_validation_failures() {
    let base = spawn_api_server(ServerState::default()).await;
    let transport = RestTransport::new(base.clone(), Session::new());

    let failure = transport
        .send_json::<ClientRecord>(transport.http.post(format!("{base}/invalid/")).json(&fields()))
        .await
        .expect_err("must fail");
    match failure {
        ApiFailure::Validation(errors) => {
            assert_eq!(errors.field("phone"), Some("Enter a valid phone number."));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn missing_records_map_to_not_found() {
    let base = spawn_api_server(ServerState::default()).await;
    let transport = RestTransport::new(base.clone(), Session::new());

    let failure = transport
        .send_json::<ClientRecord>(transport.http.put(format!("{base}/missing/9/")).json(&fields()))
        .await
        .expect_err("must fail");
    assert_eq!(failure, ApiFailure::NotFound);
}

#[tokio::test]
async fn five_hundreds_surface_the_status() {
    let base = spawn_api_server(ServerState::default()).await;
    let transport = RestTransport::new(base.clone(), Session::new());

    let failure = transport
        .send_json::<Vec<ClientRecord>>(transport.http.get(format!("{base}/broken/")))
        .await
        .expect_err("must fail");
    assert_eq!(failure, ApiFailure::Server { status: 500 });
}

#[tokio::test]
async fn auth_rejections_map_to_auth_failures() {
    let base = spawn_api_server(ServerState::default()).await;
    let transport = RestTransport::new(base.clone(), Session::new());

    let failure = transport
        .send_json::<Vec<ClientRecord>>(transport.http.get(format!("{base}/locked/")))
        .await
        .expect_err("must fail");
    match failure {
        ApiFailure::Auth(reason) => {
            assert_eq!(reason, "Authentication credentials were not provided.")
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_hosts_are_network_failures() {
    // Port 9 (discard) is assumed closed; the connection is refused.
    let transport = RestTransport::new("http://127.0.0.1:9/api", Session::new());
    let failure = RecordApi::<ClientRecord>::list(&transport)
        .await
        .expect_err("must fail");
    assert!(matches!(failure, ApiFailure::Network(_)));
}
