//! Server URL normalization.

use url::Url;

use crate::CredentialError;

/// Normalizes a server URL so equivalent spellings collide: scheme and
/// host are lowercased, default ports and trailing slashes are dropped,
/// and a missing scheme defaults to https.
pub fn normalize_server_url(raw: &str) -> Result<String, CredentialError> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&with_scheme).map_err(|source| CredentialError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    let host = parsed.host_str().ok_or(CredentialError::InvalidUrl {
        url: raw.to_string(),
        source: url::ParseError::EmptyHost,
    })?;

    let mut normalized = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    let path = parsed.path().trim_end_matches('/');
    normalized.push_str(path);
    Ok(normalized)
}
