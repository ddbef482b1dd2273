use std::net::IpAddr;

/// Default base URL: a local OpenAI-compatible server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Normalize a base URL to its chat completions endpoint.
///
/// Blank input falls back to [`DEFAULT_BASE_URL`]; trailing slashes are
/// stripped before `/chat/completions` is appended.
pub fn normalize_chat_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    format!("{}{CHAT_COMPLETIONS_PATH}", base.trim_end_matches('/'))
}

/// Returns true when the endpoint host is `localhost` or a loopback address.
pub fn is_loopback_endpoint(endpoint: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(endpoint) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok_and(|address| address.is_loopback())
}
