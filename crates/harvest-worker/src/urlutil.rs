// URL normalization and host grouping.

use url::Url;

/// Normalize a URL for duplicate detection: lowercase scheme and host, drop
/// default ports, query parameters, fragments and trailing slashes.
pub fn normalize_for_dedup(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.trim().to_string();
    };
    let scheme = parsed.scheme().to_lowercase();
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let port = match (parsed.port(), scheme.as_str()) {
        (Some(80), "http") | (Some(443), "https") | (None, _) => String::new(),
        (Some(port), _) => format!(":{port}"),
    };
    let path = parsed.path().trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };
    format!("{scheme}://{host}{port}{path}")
}

/// Host of a URL, lowercased; empty string when unparsable.
pub fn host_of(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// Group items by URL host, preserving the original order within each host
/// and first-appearance order across hosts. The concatenation of all groups
/// is a permutation of the input with per-host order intact.
pub fn group_by_host<T, F>(items: Vec<T>, url_of: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> &str,
{
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for item in items {
        let host = host_of(url_of(&item));
        match groups.iter_mut().find(|(h, _)| *h == host) {
            Some((_, bucket)) => bucket.push(item),
            None => groups.push((host, vec![item])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_query_fragment_and_slash() {
        assert_eq!(normalize_for_dedup("http://example.com"), "http://example.com/");
        assert_eq!(
            normalize_for_dedup("http://example.com/?foo=1"),
            "http://example.com/"
        );
        assert_eq!(
            normalize_for_dedup("HTTP://EXAMPLE.COM/Path#sec"),
            "http://example.com/Path"
        );
        assert_eq!(
            normalize_for_dedup("https://example.com:443/a/"),
            "https://example.com/a"
        );
        assert_eq!(
            normalize_for_dedup("http://example.com:8080/a"),
            "http://example.com:8080/a"
        );
    }

    #[test]
    fn path_case_is_preserved() {
        assert_eq!(
            normalize_for_dedup("http://example.com/CaseSensitive"),
            "http://example.com/CaseSensitive"
        );
    }

    #[test]
    fn grouping_preserves_order_and_partitions() {
        let urls = vec![
            "https://a.com/1",
            "https://b.com/1",
            "https://a.com/2",
            "https://c.com/1",
            "https://b.com/2",
        ];
        let groups = group_by_host(urls.clone(), |u| u);

        let hosts: Vec<&str> = groups.iter().map(|(h, _)| h.as_str()).collect();
        assert_eq!(hosts, vec!["a.com", "b.com", "c.com"]);

        assert_eq!(groups[0].1, vec!["https://a.com/1", "https://a.com/2"]);
        assert_eq!(groups[1].1, vec!["https://b.com/1", "https://b.com/2"]);

        // Union equals the input.
        let mut all: Vec<&str> = groups.into_iter().flat_map(|(_, v)| v).collect();
        all.sort();
        let mut expected = urls;
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn unparsable_urls_group_under_empty_host() {
        let groups = group_by_host(vec!["not a url"], |u| u);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, "");
    }
}
