//! Domain normalization and object-key sanitizing.

use url::Url;

const MAX_KEY_LEN: usize = 50;

/// Ensure a catalog URL has a scheme so it can be navigated to.
pub fn page_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Bare hostname for a catalog URL: scheme, `www.`, port and path stripped.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let url = Url::parse(&page_url(raw)).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Object-key-safe form of a domain.
///
/// `https://www.My_Site.com/` becomes `my-site-com`.
pub fn sanitize_key(domain: &str) -> String {
    let lowered = domain.trim().to_ascii_lowercase();
    let stripped = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let stripped = stripped.strip_prefix("www.").unwrap_or(stripped);

    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let trimmed = out.trim_matches('-');
    let truncated: String = trimmed.chars().take(MAX_KEY_LEN).collect();
    let key = truncated.trim_end_matches('-').to_string();
    if key.is_empty() {
        "site".to_string()
    } else {
        key
    }
}
