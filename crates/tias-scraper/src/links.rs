use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tias_crawler::{CrawlerConfig, PageAction, RenderPlan, RenderedPage, Scrapable};

use crate::site::{join_url, request_headers, INDEX_MARKER, SITE_ROOT};
use crate::writer::{CsvSink, CsvWriter};

pub const HEADERS: [&str; 1] = ["URL"];

/// Parenthesized site URLs, as found in markdown-like renderings
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((https://www\.state\.gov/[^)]+)\)").unwrap());
/// Site root followed by an agreement code
static AGREEMENT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://www\.state\.gov/\d{2}-\d{3,4}$").unwrap());

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul.collection-results a[href]").unwrap());
static ANY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

const RESULTS_ITEM: &str = "ul.collection-results li";
const SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);
const SCROLLS: usize = 3;
const SCROLL_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    #[serde(rename = "URL")]
    pub url: String,
}

/// Agreement page links referenced by a yearly index page.
///
/// Two strategies are unioned: a scan of the raw markup for parenthesized
/// agreement URLs, and the anchors of the results list resolved against
/// `page_url`. Links to other index pages are dropped.
pub fn extract_agreement_links(html: &str, page_url: &str) -> BTreeSet<String> {
    let markdown_links = MARKDOWN_LINK
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(['\r', '\n']))
        .collect::<Vec<_>>();
    let mut agreement_links = markdown_links
        .iter()
        .filter(|link| AGREEMENT_URL.is_match(link))
        .map(|link| link.to_string())
        .collect::<BTreeSet<_>>();
    log::debug!(
        "Found {} markdown links, {} valid: {:?}",
        markdown_links.len(),
        agreement_links.len(),
        agreement_links.iter().take(5).collect::<Vec<_>>()
    );

    let document = Html::parse_document(html);
    let result_links = document
        .select(&RESULT_LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| join_url(page_url, href))
        .collect::<BTreeSet<_>>();
    let all_hrefs = document
        .select(&ANY_LINK)
        .filter_map(|a| a.value().attr("href"))
        .collect::<Vec<_>>();
    log::debug!(
        "Found {} total <a> hrefs: {:?}",
        all_hrefs.len(),
        all_hrefs.iter().take(20).collect::<Vec<_>>()
    );
    log::debug!(
        "Found {} agreement-like hrefs: {:?}",
        result_links.len(),
        result_links.iter().take(10).collect::<Vec<_>>()
    );

    agreement_links.extend(result_links);
    agreement_links.retain(|link| !link.to_lowercase().contains(INDEX_MARKER));
    log::debug!(
        "Total {} unique agreement links: {:?}",
        agreement_links.len(),
        agreement_links.iter().take(5).collect::<Vec<_>>()
    );

    agreement_links
}

/// Name of the debug dump of an index page: its second to last path segment
pub fn debug_file_name(url: &str) -> String {
    let segments = url.split('/').collect::<Vec<_>>();
    let name = match segments.len() {
        n if n >= 2 => segments[n - 2],
        _ => "",
    };
    if name.is_empty() {
        String::from("index.html")
    } else {
        format!("{name}.html")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinksScraperConfig {
    pub seed: Vec<String>,
    pub csv_file: PathBuf,
    pub debug_dir: Option<PathBuf>,
}

pub struct LinksScraper {
    seed: Vec<String>,
    debug_dir: Option<PathBuf>,
    sink: CsvSink<LinkRecord>,
}

impl LinksScraper {
    /// Index pages are heavy, requests are spaced out a lot more
    pub fn crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            download_delay: 45.,
            ..CrawlerConfig::default()
        }
    }

    fn dump(&self, page: &RenderedPage) -> anyhow::Result<()> {
        let (Some(dir), Some(url)) = (&self.debug_dir, page.url()) else {
            return Ok(());
        };
        let path = dir.join(debug_file_name(url));
        fs_err::write(&path, &page.html)?;
        log::debug!("Saved HTML to {}", path.display());
        Ok(())
    }
}

impl Scrapable for LinksScraper {
    type Config = LinksScraperConfig;

    fn new(config: &LinksScraperConfig) -> anyhow::Result<Self> {
        if let Some(dir) = &config.debug_dir {
            fs_err::create_dir_all(dir)?;
        }
        let sink = CsvSink::new(CsvWriter::create(&config.csv_file)?, &HEADERS)?;

        Ok(Self {
            seed: config.seed.clone(),
            debug_dir: config.debug_dir.clone(),
            sink,
        })
    }

    fn seed(&self) -> Vec<String> {
        self.seed.clone()
    }

    fn render_plan(&self) -> RenderPlan {
        let mut actions = vec![
            PageAction::WaitForNetworkIdle,
            PageAction::WaitForSelector {
                selector: RESULTS_ITEM.into(),
                timeout: SELECTOR_TIMEOUT,
            },
        ];
        for _ in 0..SCROLLS {
            actions.push(PageAction::ScrollToBottom);
            actions.push(PageAction::Pause(SCROLL_PAUSE));
        }

        RenderPlan {
            headers: request_headers("macOS"),
            actions,
        }
    }

    fn on_rendered(&mut self, page: &RenderedPage) {
        if let Err(e) = self.dump(page) {
            log::warn!("Couldn't save HTML of {}: {e}", page.location);
        }
    }

    fn scrap(&mut self, page: &RenderedPage) -> anyhow::Result<usize> {
        let links = extract_agreement_links(&page.html, page.url().unwrap_or(SITE_ROOT));
        let n = links.len();
        for url in links {
            log::debug!("Yielding link: {url}");
            self.sink.send(LinkRecord { url });
        }
        Ok(n)
    }

    fn finalizer(&mut self) {
        self.sink.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://www.state.gov/2020-TIAS/?results=200";

    #[test]
    fn results_list_anchors_are_domain_joined() {
        let html = r#"
            <html><body>
              <nav><a href="/about">About</a></nav>
              <ul class="collection-results">
                <li><a class="collection-result__link" href="/10-413">10-413</a></li>
                <li><a href="/argentina-97-826">Argentina</a></li>
              </ul>
            </body></html>"#;

        let links = extract_agreement_links(html, PAGE);
        assert_eq!(
            links,
            BTreeSet::from([
                "https://www.state.gov/10-413".to_string(),
                "https://www.state.gov/argentina-97-826".to_string(),
            ])
        );
    }

    #[test]
    fn markdown_links_must_look_like_agreements() {
        let html = "[10-413](https://www.state.gov/10-413) \
                    [About](https://www.state.gov/about) \
                    [16-6290](https://www.state.gov/16-6290) \
                    [x](https://www.state.gov/16-62)";

        let links = extract_agreement_links(html, PAGE);
        assert_eq!(
            links,
            BTreeSet::from([
                "https://www.state.gov/10-413".to_string(),
                "https://www.state.gov/16-6290".to_string(),
            ])
        );
    }

    #[test]
    fn both_strategies_are_unioned_without_index_pages() {
        let html = r#"
            <p>(https://www.state.gov/10-413)</p>
            <p>(https://www.state.gov/12-345)</p>
            <ul class="collection-results">
              <li><a href="https://www.state.gov/10-413">dup</a></li>
              <li><a href="/16-629/">16-629</a></li>
              <li><a href="/Treaties-and-Agreements/2019/">2019</a></li>
              <li><a href="">empty</a></li>
            </ul>"#;

        let links = extract_agreement_links(html, PAGE);
        assert_eq!(
            links,
            BTreeSet::from([
                "https://www.state.gov/10-413".to_string(),
                "https://www.state.gov/12-345".to_string(),
                "https://www.state.gov/16-629/".to_string(),
            ])
        );
    }

    #[test]
    fn markdown_link_may_end_with_a_newline() {
        let html = "[10-413](https://www.state.gov/10-413\n) [x](https://www.state.gov/16-629/\n)";
        assert_eq!(
            extract_agreement_links(html, PAGE),
            BTreeSet::from(["https://www.state.gov/10-413".to_string()])
        );
    }

    #[test]
    fn anchors_outside_results_are_ignored() {
        let html = r#"<div><a href="/10-413">10-413</a></div>"#;
        assert!(extract_agreement_links(html, PAGE).is_empty());
    }

    #[test]
    fn debug_names_from_url() {
        assert_eq!(debug_file_name(PAGE), "2020-TIAS.html");
        assert_eq!(debug_file_name("https://www.state.gov/10-413"), "www.state.gov.html");
        assert_eq!(debug_file_name("nothing"), "index.html");
    }

    #[test]
    fn index_plan_scrolls_three_times() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = LinksScraper::new(&LinksScraperConfig {
            seed: vec![PAGE.into()],
            csv_file: dir.path().join("links.csv"),
            debug_dir: None,
        })
        .unwrap();

        let plan = scraper.render_plan();
        let scrolls = plan
            .actions
            .iter()
            .filter(|a| **a == PageAction::ScrollToBottom)
            .count();
        assert_eq!(scrolls, 3);
        assert_eq!(plan.actions[0], PageAction::WaitForNetworkIdle);
        assert!(matches!(
            &plan.actions[1],
            PageAction::WaitForSelector { selector, .. } if selector == RESULTS_ITEM
        ));
    }
}
