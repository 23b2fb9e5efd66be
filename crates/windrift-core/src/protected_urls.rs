//! The fixed set of URL scheme prefixes a recovery snapshot must never
//! contain, per spec §4.6 step 2. Glob patterns are explicitly out of
//! scope (spec §9) — prefix matching only.

pub const PROTECTED_URL_PREFIXES: [&str; 7] = [
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "file://",
    "javascript:",
    "data:",
];

pub fn is_protected_url(url: &str) -> bool {
    PROTECTED_URL_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix))
}
