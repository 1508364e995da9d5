use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .user_agent(concat!("prompt_studio/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// Shared connection pool; per-request timeouts are set by the caller.
pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
