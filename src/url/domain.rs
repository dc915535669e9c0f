use std::net::IpAddr;
use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use delve::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable domain of a URL's host
///
/// The domain is one label below the host's public suffix, looked up in the
/// public suffix list (ICANN and private sections). `blog.example.com` maps
/// to `example.com`, `news.bbc.co.uk` to `bbc.co.uk` and
/// `alice.herokuapp.com` stays `alice.herokuapp.com`. IP addresses,
/// single-label hosts (such as `localhost`) and bare public suffixes are
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use delve::url::registrable_domain;
///
/// let url = Url::parse("https://docs.example.com/guide").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return Some(host);
    }

    let host = host.trim_end_matches('.');
    let domain = psl::domain_str(host).unwrap_or(host);
    Some(domain.to_string())
}

/// Checks whether two URLs share a registrable domain
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (registrable_domain(a), registrable_domain(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
