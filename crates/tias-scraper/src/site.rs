//! Fixed facts about the TIAS website

use url::Url;

pub const SITE_ROOT: &str = "https://www.state.gov/";

/// Path marker of the yearly index pages
pub const INDEX_MARKER: &str = "treaties-and-agreements";

pub fn year_index_url(year: &str) -> String {
    format!("https://www.state.gov/{year}-TIAS/?results=200")
}

/// Browser-like headers sent with every page request
pub fn request_headers(platform: &str) -> Vec<(String, String)> {
    [
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Referer", SITE_ROOT),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "same-origin"),
        (
            "Sec-Ch-Ua",
            r#""Chromium";v="128", "Not;A=Brand";v="24", "Google Chrome";v="128""#,
        ),
        ("Sec-Ch-Ua-Mobile", "?0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain([("Sec-Ch-Ua-Platform".to_string(), format!("\"{platform}\""))])
    .collect()
}

/// Resolves `href` against `base`, the way a browser would follow the link
pub fn join_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_relative_and_absolute_links() {
        let page = "https://www.state.gov/2020-TIAS/?results=200";
        assert_eq!(join_url(page, "/10-413"), "https://www.state.gov/10-413");
        assert_eq!(
            join_url(page, "https://www.state.gov/16-629/"),
            "https://www.state.gov/16-629/"
        );
        assert_eq!(
            join_url("https://www.state.gov/16-629/", "docs/a.pdf"),
            "https://www.state.gov/16-629/docs/a.pdf"
        );
        assert_eq!(join_url("not a url", "/10-413"), "/10-413");
    }

    #[test]
    fn platform_header_is_quoted() {
        let headers = request_headers("macOS");
        assert!(headers.contains(&("Sec-Ch-Ua-Platform".into(), "\"macOS\"".into())));
        assert_eq!(headers.len(), 10);
    }
}
