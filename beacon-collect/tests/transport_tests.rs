use beacon_collect::{HttpTransport, Transport};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn body() -> Vec<u8> {
    br#"{"eventList":[]}"#.to_vec()
}

#[tokio::test]
async fn posts_json_and_maps_204_to_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/events"))
        .and(header("content-type", "application/json"))
        .and(body_string_contains("eventList"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new();
    let outcome = transport
        .send(&format!("{}/v1/events", server.uri()), body())
        .await;

    assert_eq!(outcome.status, 204);
    assert!(!outcome.network_error);
    assert!(outcome.is_success());
}

#[tokio::test]
async fn server_errors_are_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/events"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = HttpTransport::new();
    let outcome = transport
        .send(&format!("{}/v1/events", server.uri()), body())
        .await;

    assert_eq!(outcome.status, 500);
    assert!(!outcome.network_error);
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn a_200_is_not_the_collect_acknowledgment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/events"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = HttpTransport::new();
    let outcome = transport
        .send(&format!("{}/v1/events", server.uri()), body())
        .await;

    assert!(!outcome.is_success());
}

#[tokio::test]
async fn unreachable_host_maps_to_a_network_error() {
    // Grab a port that nothing is listening on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let transport = HttpTransport::new();
    let outcome = transport
        .send(&format!("http://127.0.0.1:{port}/v1/events"), body())
        .await;

    assert!(outcome.network_error);
    assert!(!outcome.is_success());
}
