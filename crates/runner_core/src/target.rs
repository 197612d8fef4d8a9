use url::Url;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("empty list entry")]
    Empty,
    #[error("cannot parse {entry:?} as a URL: {message}")]
    Unparsable { entry: String, message: String },
}

/// Normalizes free-form URL text.
///
/// Trims whitespace; text without an `http://` or `https://` scheme gets
/// `https://` prepended after stripping leading slashes. Blank input yields `None`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if has_web_scheme(value) {
        return Some(value.to_string());
    }
    Some(format!("https://{}", value.trim_start_matches('/')))
}

fn has_web_scheme(value: &str) -> bool {
    let lower = value
        .get(..8)
        .unwrap_or(value)
        .to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Builds the navigation target for a list entry: the normalized URL with
/// `param` set to `token`, replacing any value already present.
pub fn build_target(entry: &str, param: &str, token: &str) -> Result<String, TargetError> {
    let normalized = normalize_url(entry).ok_or(TargetError::Empty)?;
    let mut url = Url::parse(&normalized).map_err(|err| TargetError::Unparsable {
        entry: entry.to_string(),
        message: err.to_string(),
    })?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut placed = false;
    for (key, value) in url.query_pairs() {
        if key == param {
            if !placed {
                pairs.push((param.to_string(), token.to_string()));
                placed = true;
            }
        } else {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    if !placed {
        pairs.push((param.to_string(), token.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(url.to_string())
}

/// Extracts the trimmed, non-empty value of `param` from a page address.
pub fn token_from_address(address: &str, param: &str) -> Option<String> {
    let url = Url::parse(address).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_detection_is_case_insensitive() {
        assert_eq!(
            normalize_url("HTTP://Example.com").as_deref(),
            Some("HTTP://Example.com")
        );
        assert_eq!(
            normalize_url("//example.com/a").as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn short_values_do_not_panic() {
        assert_eq!(normalize_url("a").as_deref(), Some("https://a"));
        assert_eq!(normalize_url("ü").as_deref(), Some("https://ü"));
    }
}
