//! Cache Key & Expiration Policy

use std::time::Duration;

/// Successful quotes are refreshed roughly once per provider update
pub const SUCCESS_TTL: Duration = Duration::from_secs(61);

/// HTTP 429 from the provider
pub const RATE_LIMITED_TTL: Duration = Duration::from_secs(61);

/// Other 4xx: bad symbol, bad key, plan restrictions
pub const CLIENT_ERROR_TTL: Duration = Duration::from_secs(60 * 60);

/// 5xx with a structured body
pub const SERVER_ERROR_TTL: Duration = Duration::from_secs(30);

/// Non-success status with no recognizable error body
pub const UNCLASSIFIED_TTL: Duration = Duration::from_secs(15);

/// Cache key for one upstream query.
///
/// Both parameters must already be escaped and comma-joined; escaping turns
/// every `:` inside a symbol into `%3A`, so the separators cannot be forged.
pub fn cache_key(crypto_param: &str, fiat_param: &str, include_tokens: bool) -> String {
    format!("cc:{crypto_param}_fiat:{fiat_param}_inct:{include_tokens}")
}

/// TTL for a structured provider error answered with `status`
pub const fn provider_error_ttl(status: u16) -> Duration {
    match status {
        429 => RATE_LIMITED_TTL,
        0..=499 => CLIENT_ERROR_TTL,
        _ => SERVER_ERROR_TTL,
    }
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Percent-escape everything outside the RFC 3986 unreserved set
pub fn escape_data(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push('%');
            out.push(char::from(HEX_UPPER[usize::from(byte >> 4)]));
            out.push(char::from(HEX_UPPER[usize::from(byte & 0x0F)]));
        }
    }
    out
}

/// Escape each symbol and join with `,`
pub fn join_escaped<S: AsRef<str>>(symbols: &[S]) -> String {
    symbols
        .iter()
        .map(|s| escape_data(s.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_deterministic() {
        assert_eq!(
            cache_key("BTC,ETH", "USD", false),
            "cc:BTC,ETH_fiat:USD_inct:false"
        );
        assert_eq!(cache_key("BTC", "EUR", true), cache_key("BTC", "EUR", true));
        assert_ne!(cache_key("BTC", "EUR", true), cache_key("BTC", "EUR", false));
        assert_ne!(cache_key("BTC,ETH", "USD", true), cache_key("ETH,BTC", "USD", true));
    }

    #[test]
    fn test_escaped_symbols_cannot_forge_separators() {
        let forged = cache_key(&join_escaped(&["A_fiat:B"]), &join_escaped(&["C"]), false);
        let honest = cache_key(&join_escaped(&["A"]), &join_escaped(&["B_fiat:C"]), false);
        assert_ne!(forged, honest);
    }

    #[test]
    fn test_escape_data() {
        assert_eq!(escape_data("BTC"), "BTC");
        assert_eq!(escape_data("a b,c"), "a%20b%2Cc");
        assert_eq!(escape_data("x:y&z"), "x%3Ay%26z");
        assert_eq!(escape_data("é"), "%C3%A9");
        assert_eq!(escape_data("\n\u{7f}/"), "%0A%7F%2F");
        assert_eq!(join_escaped(&["BTC", "ETH"]), "BTC,ETH");
    }

    #[test]
    fn test_provider_error_ttl() {
        assert_eq!(provider_error_ttl(429), Duration::from_secs(61));
        assert_eq!(provider_error_ttl(400), Duration::from_secs(3600));
        assert_eq!(provider_error_ttl(401), Duration::from_secs(3600));
        assert_eq!(provider_error_ttl(500), Duration::from_secs(30));
        assert_eq!(provider_error_ttl(503), Duration::from_secs(30));
    }
}
