//! URL helpers shared by the gate.
//!
//! Login-action detection and redirect bookkeeping compare URLs after
//! [`normalize`], so `/users/login/`, `users/login` and `/users//login?x=1`
//! all name the same location.

/// Normalize an application-relative URL.
///
/// - adds a leading slash
/// - drops query string and fragment
/// - collapses repeated slashes
/// - removes a trailing slash (except for the root)
///
/// Absolute URLs (`scheme://host/...`) are reduced to their path.
pub fn normalize(url: &str) -> String {
    let url = strip_origin(url);
    let path = url.split(['?', '#']).next().unwrap_or("");

    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Reduce a referrer to a local path.
///
/// Relative referrers are returned as-is. Absolute referrers are returned as
/// their path (plus query) only when their host equals `host`; foreign
/// referrers yield `None`.
pub fn local_referrer(referrer: &str, host: Option<&str>) -> Option<String> {
    let referrer = referrer.trim();
    if referrer.is_empty() {
        return None;
    }
    if referrer.starts_with('/') && !referrer.starts_with("//") {
        return Some(referrer.to_string());
    }

    let (_, rest) = referrer.split_once("://")?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    let host = host?;
    if authority.eq_ignore_ascii_case(host) {
        Some(path.to_string())
    } else {
        None
    }
}

fn strip_origin(url: &str) -> &str {
    match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|idx| &rest[idx..]).unwrap_or(""),
        None => url,
    }
}
