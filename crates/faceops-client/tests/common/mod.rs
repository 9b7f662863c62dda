#![allow(dead_code)]

use faceops_client::{ApiClient, Config, MemorySessionStore, Session, StoredCredentials};
use wiremock::MockServer;

pub const TOKEN: &str = "jwt-test-token";

pub fn config_for(server: &MockServer) -> Config {
    Config {
        api_base_url: format!("{}/api/v1", server.uri()),
        request_timeout_secs: 5,
        ..Config::default()
    }
}

/// Client whose session already holds [`TOKEN`].
pub fn logged_in(server: &MockServer) -> ApiClient {
    let store = MemorySessionStore::with_credentials(StoredCredentials {
        access_token: TOKEN.into(),
        username: Some("admin".into()),
    });
    ApiClient::new(&config_for(server), Session::hydrate(store).unwrap()).unwrap()
}

pub fn logged_out(server: &MockServer) -> ApiClient {
    ApiClient::new(
        &config_for(server),
        Session::hydrate(MemorySessionStore::new()).unwrap(),
    )
    .unwrap()
}

pub fn bearer() -> String {
    format!("Bearer {TOKEN}")
}

/// Frame a JSON payload the way the bulk endpoint does.
pub fn frame(json: &str) -> String {
    format!("data: {json}\n\n")
}
