use axum::Json;
use axum::http::StatusCode;
use axum::routing::{get, post};
use mxd_appservice::{Appservice, Transport, TransportError};
use mxd_domain::registration::Registration;
use mxd_domain::room::RoomCreationOptions;
use serde_json::{Value, json};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const HS_TOKEN: &str = "hs-secret";
const AS_TOKEN: &str = "as-secret";
const WAIT: Duration = Duration::from_secs(5);

/// Minimal homeserver: every user already exists, every room gets the same id.
async fn fake_homeserver() -> SocketAddr {
    let app = axum::Router::new()
        .route(
            "/_matrix/client/v3/register",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "errcode": "M_USER_IN_USE", "error": "User ID already taken." })),
                )
            }),
        )
        .route(
            "/_matrix/client/v3/createRoom",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "room_id": "!created:example.org", "echo": body }))
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind homeserver");
    let address = listener.local_addr().expect("address");
    tokio::spawn(async move { axum::serve(listener, app).await });
    address
}

fn appservice(homeserver: SocketAddr) -> Arc<Appservice> {
    let registration = Registration::discord(
        "http://localhost:9005",
        AS_TOKEN.to_owned(),
        HS_TOKEN.to_owned(),
    );
    let built = Appservice::builder()
        .bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .domain("example.org")
        .homeserver_url(format!("http://{homeserver}"))
        .registration(registration)
        .build()
        .expect("build");
    Arc::new(built)
}

async fn listen(appservice: &Appservice) -> String {
    let address = appservice.begin().await.expect("begin");
    format!("http://{address}")
}

#[tokio::test]
async fn requests_without_valid_hs_token_are_rejected() {
    let appservice = appservice(fake_homeserver().await);
    let base = listen(&appservice).await;
    let http = reqwest::Client::new();

    let missing = http
        .put(format!("{base}/_matrix/app/v1/transactions/1"))
        .json(&json!({ "events": [] }))
        .send()
        .await
        .expect("send");
    assert_eq!(missing.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = missing.json().await.expect("json");
    assert_eq!(body["errcode"], "M_UNAUTHORIZED");

    let wrong = http
        .get(format!("{base}/_matrix/app/v1/rooms/%23_discord_1:example.org"))
        .bearer_auth("nope")
        .send()
        .await
        .expect("send");
    assert_eq!(wrong.status(), reqwest::StatusCode::FORBIDDEN);

    appservice.stop();
}

#[tokio::test]
async fn transactions_are_delivered_once() {
    let appservice = appservice(fake_homeserver().await);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _events = appservice
        .room_events()
        .subscribe(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        })
        .expect("subscribe");
    let base = listen(&appservice).await;
    let http = reqwest::Client::new();

    let transaction = json!({
        "events": [
            { "room_id": "!a:example.org", "type": "m.room.message", "content": { "body": "hi" } },
            { "type": "m.presence" },
        ]
    });
    for _ in 0..2 {
        let response = http
            .put(format!("{base}/_matrix/app/v1/transactions/txn-1?access_token={HS_TOKEN}"))
            .json(&transaction)
            .send()
            .await
            .expect("send");
        assert!(response.status().is_success());
    }

    let event = tokio::time::timeout(WAIT, rx.recv()).await.expect("delivered").expect("event");
    assert_eq!(event.room_id, "!a:example.org");
    assert_eq!(event.event_type(), Some("m.room.message"));

    // The retried transaction and the room-less event produce nothing more.
    assert!(tokio::time::timeout(Duration::from_millis(300), rx.recv()).await.is_err());

    appservice.stop();
}

#[tokio::test]
async fn answered_alias_query_returns_ok() {
    let appservice = appservice(fake_homeserver().await);
    let _queries = appservice
        .room_alias_queries()
        .subscribe(|query| async move {
            query.create_room(RoomCreationOptions::default()).await.expect("room created");
        })
        .expect("subscribe");
    let base = listen(&appservice).await;

    let response = reqwest::Client::new()
        .get(format!("{base}/_matrix/app/v1/rooms/%23_discord_1_2:example.org"))
        .bearer_auth(HS_TOKEN)
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    appservice.stop();
}

#[tokio::test]
async fn dropped_alias_query_returns_not_found() {
    let appservice = appservice(fake_homeserver().await);
    let _queries = appservice
        .room_alias_queries()
        .subscribe(|query| async move { drop(query) })
        .expect("subscribe");
    let base = listen(&appservice).await;

    let response = reqwest::Client::new()
        .get(format!("{base}/rooms/%23_discord_9:example.org"))
        .bearer_auth(HS_TOKEN)
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["errcode"], "M_NOT_FOUND");

    appservice.stop();
}

#[tokio::test]
async fn health_reports_up() {
    let appservice = appservice(fake_homeserver().await);
    let base = listen(&appservice).await;

    let response = reqwest::get(format!("{base}/health")).await.expect("send");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers()["cache-control"].to_str().expect("header").contains("no-store"));
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["status"], "up");

    appservice.stop();
}

#[tokio::test]
async fn mounted_routes_are_served_and_mount_closes_after_begin() {
    let appservice = appservice(fake_homeserver().await);
    appservice
        .mount(axum::Router::new().route("/extra", get(|| async { "extra" })))
        .expect("mount");
    let base = listen(&appservice).await;

    let response = reqwest::get(format!("{base}/extra")).await.expect("send");
    let body = response.text().await.expect("text");
    assert_eq!(body, "extra");

    let late = appservice.mount(axum::Router::new());
    assert!(matches!(late, Err(TransportError::AlreadyStarted { .. })));
    assert!(matches!(appservice.begin().await, Err(TransportError::AlreadyStarted { .. })));

    appservice.stop();
}

#[tokio::test]
async fn existing_user_counts_as_registered() {
    let appservice = appservice(fake_homeserver().await);
    appservice.ensure_registered("_discord_bot").await.expect("user in use is fine");
    assert_eq!(appservice.registration().bot_user_id("example.org"), "@_discord_bot:example.org");
}

#[tokio::test]
async fn unreachable_homeserver_fails_registration() {
    let unused = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = unused.local_addr().expect("address");
    drop(unused);

    let appservice = appservice(address);
    let err = appservice.ensure_registered("_discord_bot").await.unwrap_err();
    assert!(matches!(err, TransportError::Http { .. }));
}
