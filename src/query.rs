use url::Url;

/// Merges a query fragment into an existing query string.
///
/// An empty existing query yields `fragment` as-is; otherwise the leading `?`
/// of `existing` is stripped and `fragment` is appended after `&`. The result
/// never carries a `?`, the URL layer adds it.
pub fn merge_query(existing: &str, fragment: &str) -> String {
    let existing = existing.strip_prefix('?').unwrap_or(existing);
    if existing.is_empty() {
        return fragment.to_owned();
    }
    if fragment.is_empty() {
        return existing.to_owned();
    }
    format!("{existing}&{fragment}")
}

/// Appends `fragment` to the query of `url` using [`merge_query`].
pub fn append_query(url: &mut Url, fragment: &str) {
    let merged = merge_query(url.query().unwrap_or_default(), fragment);
    url.set_query(if merged.is_empty() { None } else { Some(&merged) });
}
