use url::Url;

const TRACKING_PARAMS: [&str; 10] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "ref",
    "_ga",
    "_gid",
];

/// Absolute, same-origin form of a discovered link, without fragment or
/// tracking parameters. `None` for anything that can't be made into one.
pub fn normalize_discovered_url(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut url = if raw.starts_with("http://") || raw.starts_with("https://") {
        Url::parse(raw).ok()?
    } else if raw.starts_with('/') {
        base.join(raw).ok()?
    } else {
        base.join(&format!("/{raw}")).ok()?
    };

    url.set_fragment(None);
    strip_tracking(&mut url);

    if url.origin() != base.origin() {
        return None;
    }
    Some(url.to_string())
}

fn strip_tracking(url: &mut Url) {
    if url.query().is_none() {
        return;
    }
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_str()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else if kept.len() != pairs.len() {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
}
