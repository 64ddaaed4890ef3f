use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use link_shortener::{LinkShortener, ShareLink, viewer_link};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const BASE: &str = "https://viewer.example/viewer";

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });
    format!("http://{addr}/api/v1/shorten")
}

async fn echo_short(Json(body): Json<Value>) -> Json<Value> {
    let long = body["url"].as_str().unwrap_or_default().len();
    Json(json!({ "shortUrl": format!("https://s.example/{long}") }))
}

#[tokio::test]
async fn returns_short_link_from_service() {
    let endpoint = serve(Router::new().route("/api/v1/shorten", post(echo_short))).await;
    let shortener = LinkShortener::new(endpoint, BASE).unwrap();

    let link = shortener.share("https://cdn.example/pano.mp4").await.unwrap();

    let long = viewer_link(BASE, "https://cdn.example/pano.mp4").unwrap();
    assert_eq!(
        link,
        ShareLink::Short {
            short: format!("https://s.example/{}", long.len()),
            long,
        }
    );
    assert!(link.is_short());
}

#[tokio::test]
async fn falls_back_when_short_url_is_missing() {
    let router = Router::new().route(
        "/api/v1/shorten",
        post(|| async { (StatusCode::BAD_REQUEST, Json(json!({ "error": "quota" }))).into_response() }),
    );
    let shortener = LinkShortener::new(serve(router).await, BASE).unwrap();

    let link = shortener.share("https://cdn.example/pano.jpg").await.unwrap();

    let long = viewer_link(BASE, "https://cdn.example/pano.jpg").unwrap();
    assert_eq!(link, ShareLink::Unshortened { long: long.clone() });
    assert_eq!(link.link(), Some(long.as_str()));
    assert!(link.to_string().starts_with("Failed to shorten the URL."));
}

#[tokio::test]
async fn falls_back_when_service_is_unreachable() {
    // Bind then drop so the port is known to be closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let shortener = LinkShortener::new(format!("http://{addr}/api/v1/shorten"), BASE).unwrap();

    let link = shortener.share("https://cdn.example/pano.jpg").await.unwrap();

    assert!(matches!(link, ShareLink::Failed { .. }));
    assert!(link.to_string().starts_with("Error generating short link."));
}

#[tokio::test]
async fn non_json_reply_counts_as_failure() {
    let router = Router::new().route("/api/v1/shorten", post(|| async { "<html>busy</html>" }));
    let shortener = LinkShortener::new(serve(router).await, BASE).unwrap();

    let link = shortener.share("https://cdn.example/pano.jpg").await.unwrap();

    assert!(matches!(link, ShareLink::Failed { .. }));
}
