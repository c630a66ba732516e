//! Integration tests for the HTTP note fetcher against a mock platform.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xhs_api::extractor::{
    parse_post_url, resolve, Credentials, ExtractError, NoteFetcher, NoteSource, PostDescriptor,
    ProxyConfig,
};

const ID: &str = "67d7c713000000000900e391";
const COOKIES: &str = "a1=abc; web_session=def";

fn descriptor(with_token: bool) -> PostDescriptor {
    let query = if with_token {
        "?xsec_token=tok123&xsec_source=pc_feed"
    } else {
        ""
    };
    parse_post_url(&format!("https://www.xiaohongshu.com/explore/{ID}{query}")).unwrap()
}

fn creds() -> Credentials {
    resolve(Some(COOKIES), None, None).unwrap()
}

fn fetcher(server: &MockServer) -> NoteFetcher {
    NoteFetcher::new(&server.uri(), Duration::from_secs(2))
}

fn page(state: &Value) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>t</title></head><body><div id=\"app\"></div>\
         <script>window.__INITIAL_STATE__={state}</script></body></html>"
    )
}

fn note_state() -> Value {
    json!({
        "user": { "loggedIn": true },
        "note": {
            "noteDetailMap": {
                ID: {
                    "note": {
                        "noteId": ID,
                        "type": "normal",
                        "title": "hello",
                        "imageList": [{ "traceId": "abc" }]
                    }
                }
            }
        }
    })
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_fetch_sends_credentials_and_returns_note() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/explore/{ID}")))
        .and(query_param("xsec_token", "tok123"))
        .and(query_param("xsec_source", "pc_feed"))
        .and(header("cookie", COOKIES))
        .and(header("sec-fetch-mode", "navigate"))
        .and(header_exists("user-agent"))
        .and(header_exists("referer"))
        .respond_with(html(page(&note_state())))
        .expect(1)
        .mount(&server)
        .await;

    let payload = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap();
    assert_eq!(payload.as_value()["noteId"], json!(ID));
    assert_eq!(payload.as_value()["title"], json!("hello"));
}

#[tokio::test]
async fn test_undefined_literals_in_state_are_tolerated() {
    let server = MockServer::start().await;
    let body = page(&note_state()).replace("\"loggedIn\":true", "\"loggedIn\":true,\"x\":undefined");
    Mock::given(method("GET"))
        .respond_with(html(body))
        .mount(&server)
        .await;

    assert!(fetcher(&server).fetch(&descriptor(true), &creds()).await.is_ok());
}

#[tokio::test]
async fn test_redirect_to_404_with_token_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/explore/{ID}")))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/404?source=note&error_code=300031"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/404"))
        .respond_with(html("<html><body>gone</body></html>".to_string()))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn test_redirect_to_404_without_token_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/explore/{ID}")))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/404?error_code=300017"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/404"))
        .respond_with(html("<html></html>".to_string()))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(false), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Auth(_)), "{err:?}");
}

#[tokio::test]
async fn test_redirect_to_login_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/explore/{ID}")))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html("<html></html>".to_string()))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Auth(_)), "{err:?}");
}

#[tokio::test]
async fn test_forbidden_is_auth_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Auth(_)), "{err:?}");
}

#[tokio::test]
async fn test_throttle_status_is_rate_limited_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(461))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::RateLimited(_)), "{err:?}");
}

#[tokio::test]
async fn test_server_error_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html(page(&note_state())))
        .mount(&server)
        .await;

    let payload = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap();
    assert_eq!(payload.as_value()["noteId"], json!(ID));
}

#[tokio::test]
async fn test_timeout_is_network_error_after_one_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(page(&note_state())).set_delay(Duration::from_secs(3)))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = NoteFetcher::new(&server.uri(), Duration::from_millis(200));
    let err = fetcher.fetch(&descriptor(true), &creds()).await.unwrap_err();
    assert!(matches!(err, ExtractError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn test_page_without_state_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<html><body>maintenance</body></html>".to_string()))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::ParseFailure(_)), "{err:?}");
}

#[tokio::test]
async fn test_verification_page_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(
            "<html><body><div class=\"captcha-container\"></div></body></html>".to_string(),
        ))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::RateLimited(_)), "{err:?}");
}

#[tokio::test]
async fn test_state_without_note_is_not_found() {
    let server = MockServer::start().await;
    let state = json!({ "user": { "loggedIn": true }, "note": { "noteDetailMap": {} } });
    Mock::given(method("GET"))
        .respond_with(html(page(&state)))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn test_logged_out_state_without_note_is_auth_error() {
    let server = MockServer::start().await;
    let state = json!({ "user": { "loggedIn": false }, "note": { "noteDetailMap": {} } });
    Mock::given(method("GET"))
        .respond_with(html(page(&state)))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .fetch(&descriptor(true), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Auth(_)), "{err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop a listener so the port is closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("http://127.0.0.1:{port}");
    let fetcher = NoteFetcher::new(&uri, Duration::from_secs(1));
    let err = fetcher.fetch(&descriptor(true), &creds()).await.unwrap_err();
    assert!(matches!(err, ExtractError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn test_requests_go_through_configured_proxy() {
    let proxy_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/explore/{ID}")))
        .and(header("cookie", COOKIES))
        .respond_with(html(page(&note_state())))
        .expect(2)
        .mount(&proxy_server)
        .await;

    let proxy = ProxyConfig {
        host: "127.0.0.1".to_string(),
        port: proxy_server.address().port(),
    };
    let creds = resolve(Some(COOKIES), None, Some(&proxy)).unwrap();
    // Unresolvable origin: only the proxy can answer.
    let fetcher = NoteFetcher::new("http://platform.invalid", Duration::from_secs(2));

    for _ in 0..2 {
        let payload = fetcher.fetch(&descriptor(true), &creds).await.unwrap();
        assert_eq!(payload.as_value()["noteId"], json!(ID));
    }
}

#[tokio::test]
async fn test_upper_case_post_id_finds_lower_case_note() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/explore/{ID}")))
        .respond_with(html(page(&note_state())))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = parse_post_url(&format!(
        "https://www.xiaohongshu.com/explore/{}?xsec_token=tok123",
        ID.to_ascii_uppercase()
    ))
    .unwrap();
    let payload = fetcher(&server).fetch(&descriptor, &creds()).await.unwrap();
    assert_eq!(payload.as_value()["noteId"], json!(ID));
}
