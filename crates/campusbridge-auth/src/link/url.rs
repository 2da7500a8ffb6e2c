//! URL normalisation helpers.

use url::Url;

/// Reduces a URL to `scheme://host` + path + `?query`, dropping the port.
///
/// Reverse proxies often remap ports between the URL a partner sees and the
/// configured base URL, so base URLs are compared in this form. User info
/// and fragment are dropped as well. Strings that do not parse as absolute
/// URLs are returned unchanged.
#[must_use]
pub fn strip_port(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return raw.to_string();
    };

    let mut stripped = format!("{}://{}{}", parsed.scheme(), host, parsed.path());
    if let Some(query) = parsed.query() {
        stripped.push('?');
        stripped.push_str(query);
    }
    stripped
}

/// Returns `true` if both URLs are equal once their ports are stripped.
#[must_use]
pub fn same_ignoring_port(a: &str, b: &str) -> bool {
    strip_port(a) == strip_port(b)
}
