use super::*;
use axum::{
    body::Bytes,
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode as AxumStatus},
    routing::put,
    Router,
};
use chrono::TimeZone;

#[test]
fn preference_key_embeds_name_and_millis() {
    let at = Utc
        .with_ymd_and_hms(2024, 9, 1, 12, 0, 0)
        .single()
        .expect("timestamp");
    assert_eq!(
        preference_object_key("Ada Lovelace", at),
        format!("preferences/preferences-Ada Lovelace-{}.json", at.timestamp_millis())
    );
}

#[test]
fn preference_key_cannot_escape_prefix() {
    let at = Utc.timestamp_millis_opt(1_000).single().expect("timestamp");
    let key = preference_object_key("../../etc/passwd", at);
    assert_eq!(key, "preferences/preferences-..-..-etc-passwd-1000.json");
    validate_key(&key).expect("valid key");
}

#[test]
fn long_names_are_cut_on_a_char_boundary() {
    let at = Utc.timestamp_millis_opt(1_000).single().expect("timestamp");
    let key = preference_object_key(&"a".repeat(300), at);
    let file_name = key.strip_prefix(PREFERENCES_PREFIX).expect("prefix");
    assert!(file_name.len() <= 255);
    assert_eq!(key, format!("preferences/preferences-{}-1000.json", "a".repeat(MAX_KEY_NAME_BYTES)));

    let key = preference_object_key(&"é".repeat(200), at);
    let fragment = key
        .strip_prefix("preferences/preferences-")
        .and_then(|rest| rest.strip_suffix("-1000.json"))
        .expect("fragment");
    assert_eq!(fragment, "é".repeat(MAX_KEY_NAME_BYTES / 2));
}

#[tokio::test]
async fn fs_store_accepts_keys_for_very_long_names() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FsObjectStore::new(temp.path());
    let at = Utc.timestamp_millis_opt(1_000).single().expect("timestamp");
    let key = preference_object_key(&"a".repeat(300), at);
    store
        .put_object(&key, b"{}".to_vec(), JSON_CONTENT_TYPE)
        .await
        .expect("put");
    assert_eq!(store.get_object(&key).await.expect("get"), Some(b"{}".to_vec()));
}

#[test]
fn rejects_relative_segments() {
    assert!(validate_key("").is_err());
    assert!(validate_key("/abs").is_err());
    assert!(validate_key("a/../b").is_err());
    assert!(validate_key("a//b").is_err());
    assert!(validate_key("preferences/x.json").is_ok());
}

#[tokio::test]
async fn fs_store_creates_prefix_directories_and_reads_back() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FsObjectStore::new(temp.path().join("bucket"));
    store
        .put_object("preferences/a.json", b"{}".to_vec(), JSON_CONTENT_TYPE)
        .await
        .expect("put");
    store
        .put_object("other/b.json", b"[]".to_vec(), JSON_CONTENT_TYPE)
        .await
        .expect("put");

    assert!(temp.path().join("bucket").join("preferences").join("a.json").exists());
    assert_eq!(
        store.get_object("preferences/a.json").await.expect("get"),
        Some(b"{}".to_vec())
    );
    assert_eq!(store.get_object("preferences/missing.json").await.expect("get"), None);
    assert_eq!(
        store.list_keys(PREFERENCES_PREFIX).await.expect("list"),
        vec!["preferences/a.json".to_string()]
    );
}

#[tokio::test]
async fn fs_store_lists_nothing_before_first_write() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FsObjectStore::new(temp.path().join("never-created"));
    assert!(store.list_keys("").await.expect("list").is_empty());
}

#[tokio::test]
async fn memory_store_keeps_content_type() {
    let store = MemoryObjectStore::new();
    store
        .put_object("preferences/a.json", b"{}".to_vec(), JSON_CONTENT_TYPE)
        .await
        .expect("put");
    let object = store.object("preferences/a.json").await.expect("object");
    assert_eq!(object.content_type, JSON_CONTENT_TYPE);
    assert_eq!(store.list_keys("preferences/").await.len(), 1);
    assert!(store.put_object("../x", Vec::new(), JSON_CONTENT_TYPE).await.is_err());
}

#[test]
fn http_store_builds_path_style_urls() {
    let store = HttpObjectStore::new("http://localhost:9000/", "seating", None).expect("store");
    let url = store.object_url("preferences/preferences-Ada Lovelace-1.json").expect("url");
    assert_eq!(
        url.as_str(),
        "http://localhost:9000/seating/preferences/preferences-Ada%20Lovelace-1.json"
    );
    assert!(HttpObjectStore::new("http://localhost:9000", " ", None).is_err());
    assert!(HttpObjectStore::new("not a url", "seating", None).is_err());
}

type Received = Arc<RwLock<Vec<(String, Option<String>, Option<String>, Vec<u8>)>>>;

async fn accept_put(
    State(received): State<Received>,
    AxumPath(path): AxumPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AxumStatus {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    received.write().await.push((
        path,
        header("content-type"),
        header("authorization"),
        body.to_vec(),
    ));
    AxumStatus::OK
}

#[tokio::test]
async fn http_store_puts_with_content_type_and_token() {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/*path", put(accept_put))
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let store = HttpObjectStore::new(&format!("http://{addr}"), "seating", Some("secret".into()))
        .expect("store");
    store
        .put_object("preferences/a.json", b"{\"name\":\"Ada\"}".to_vec(), JSON_CONTENT_TYPE)
        .await
        .expect("put");

    let received = received.read().await;
    assert_eq!(received.len(), 1);
    let (path, content_type, authorization, body) = &received[0];
    assert_eq!(path, "seating/preferences/a.json");
    assert_eq!(content_type.as_deref(), Some(JSON_CONTENT_TYPE));
    assert_eq!(authorization.as_deref(), Some("Bearer secret"));
    assert_eq!(body, b"{\"name\":\"Ada\"}");
}

#[tokio::test]
async fn http_store_surfaces_error_status() {
    let app = Router::new().route("/*path", put(|| async { AxumStatus::FORBIDDEN }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let store = HttpObjectStore::new(&format!("http://{addr}"), "seating", None).expect("store");
    let err = store
        .put_object("preferences/a.json", Vec::new(), JSON_CONTENT_TYPE)
        .await
        .expect_err("forbidden");
    assert!(err.to_string().contains("403"));
}
