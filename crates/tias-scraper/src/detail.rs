use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tias_crawler::{CrawlerConfig, PageAction, PageLocation, RenderPlan, RenderedPage, Scrapable};

use crate::seed::detail_seed;
use crate::site::{join_url, request_headers, SITE_ROOT};
use crate::writer::{CsvSink, CsvWriter};

pub const HEADERS: [&str; 6] = [
    "source_url",
    "title",
    "paragraphs",
    "agreement_codes",
    "primary_pdf",
    "other_pdfs",
];

pub const PARAGRAPH_SEPARATOR: &str = " | ";
pub const LIST_SEPARATOR: &str = ", ";

static TITLE_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)class="featured-content__headline stars-above">\s*(.*?)\s*</h1>"#).unwrap()
});
static AGREEMENT_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{2}[-\s]?\d{3,4}\b").unwrap());

static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.featured-content__headline.stars-above").unwrap());
static PDF_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"a[href$=".pdf"]"#).unwrap());
static DOWNLOAD_BUTTON: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.button--download").unwrap());

const MIN_PAUSE: Duration = Duration::from_secs(1);
const MAX_PAUSE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgreementRecord {
    pub source_url: String,
    pub title: String,
    pub paragraphs: String,
    pub agreement_codes: String,
    pub primary_pdf: String,
    pub other_pdfs: String,
}

pub fn extract_agreement(html: &str, page_url: &str) -> AgreementRecord {
    let document = Html::parse_document(html);

    let title = extract_title(html, &document);
    log::debug!("Extracted title: {title}");

    let paragraphs = paragraph_texts(&document);
    log::debug!("Extracted {} paragraphs", paragraphs.len());
    let paragraphs = paragraphs.join(PARAGRAPH_SEPARATOR);

    let pdf_links = document.select(&PDF_LINK).collect::<Vec<_>>();
    let pdf_texts = pdf_links.iter().flat_map(|a| own_texts(*a));
    let agreement_codes = agreement_codes(std::iter::once(paragraphs.as_str()).chain(pdf_texts))
        .into_iter()
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR);
    log::debug!("Extracted agreement codes: {agreement_codes}");

    let primary_pdf = document
        .select(&DOWNLOAD_BUTTON)
        .filter_map(|a| a.value().attr("href"))
        .next()
        .filter(|href| !href.is_empty())
        .map(|href| join_url(page_url, href))
        .unwrap_or_default();
    log::debug!("Primary PDF: {primary_pdf}");

    let other_pdfs = pdf_links
        .iter()
        .filter_map(|a| a.value().attr("href"))
        .map(|href| join_url(page_url, href))
        .filter(|link| *link != primary_pdf)
        .collect::<Vec<_>>();
    log::debug!("Found {} other PDF links", other_pdfs.len());

    AgreementRecord {
        source_url: page_url.to_string(),
        title,
        paragraphs,
        agreement_codes,
        primary_pdf,
        other_pdfs: other_pdfs.join(LIST_SEPARATOR),
    }
}

/// Headline text, read from the raw markup first and from the parsed
/// headline element otherwise
fn extract_title(html: &str, document: &Html) -> String {
    let title = TITLE_MARKUP
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().replace(['\n', '\t'], ""))
        .unwrap_or_default();
    if !title.is_empty() {
        return title;
    }

    document
        .select(&TITLE)
        .next()
        .and_then(|h1| own_texts(h1).next())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

/// Every non-blank text node nested in a `<p>`, trimmed, in document order
pub fn paragraph_texts(document: &Html) -> Vec<String> {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let in_paragraph = node
                .ancestors()
                .any(|a| a.value().as_element().is_some_and(|e| e.name() == "p"));
            let text = text.trim();
            (in_paragraph && !text.is_empty()).then(|| text.to_string())
        })
        .collect()
}

/// Agreement codes found in any of `texts`, deduplicated
pub fn agreement_codes<'a, I>(texts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    texts
        .into_iter()
        .flat_map(|text| AGREEMENT_CODE.find_iter(text))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Text nodes that are direct children of `elem`
fn own_texts(elem: ElementRef<'_>) -> impl Iterator<Item = &str> {
    elem.children()
        .filter_map(|child| child.value().as_text().map(|t| &**t))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetailScraperConfig {
    pub urls_file: Option<PathBuf>,
    pub csv_file: PathBuf,
}

pub struct DetailScraper {
    seed: Vec<String>,
    sink: CsvSink<AgreementRecord>,
}

impl DetailScraper {
    pub fn crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            download_delay: 5.,
            ..CrawlerConfig::default()
        }
    }
}

/// Record of a rendered or local page, local ones resolve links against the site root
pub fn scrap_agreement(page: &RenderedPage) -> AgreementRecord {
    match &page.location {
        PageLocation::Url(url) => extract_agreement(&page.html, url),
        PageLocation::Path(path) => AgreementRecord {
            source_url: path.display().to_string(),
            ..extract_agreement(&page.html, SITE_ROOT)
        },
    }
}

impl Scrapable for DetailScraper {
    type Config = DetailScraperConfig;

    fn new(config: &DetailScraperConfig) -> anyhow::Result<Self> {
        let seed = detail_seed(config.urls_file.as_deref())?;
        let sink = CsvSink::new(CsvWriter::create(&config.csv_file)?, &HEADERS)?;
        Ok(Self { seed, sink })
    }

    fn seed(&self) -> Vec<String> {
        self.seed.clone()
    }

    fn render_plan(&self) -> RenderPlan {
        RenderPlan {
            headers: request_headers("Windows"),
            actions: vec![
                PageAction::WaitForNetworkIdle,
                PageAction::PauseBetween(MIN_PAUSE, MAX_PAUSE),
            ],
        }
    }

    fn scrap(&mut self, page: &RenderedPage) -> anyhow::Result<usize> {
        self.sink.send(scrap_agreement(page));
        Ok(1)
    }

    fn finalizer(&mut self) {
        self.sink.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://www.state.gov/12-345/";

    const AGREEMENT: &str = r#"
        <html><body>
          <h1 class="featured-content__headline stars-above">Agreement on Trade</h1>
          <p>Entered into force <b>12-345</b></p>
          <p>   </p>
          <p>Signed at Washington</p>
          <a class="button--download" href="/docs/a.pdf">Download</a>
          <a href="/docs/b.pdf">TIAS 16 629</a>
          <a href="/docs/a.pdf">Same as primary</a>
        </body></html>"#;

    #[test]
    fn agreement_fields() {
        let record = extract_agreement(AGREEMENT, PAGE);

        assert_eq!(record.source_url, PAGE);
        assert_eq!(record.title, "Agreement on Trade");
        assert_eq!(
            record.paragraphs,
            "Entered into force | 12-345 | Signed at Washington"
        );
        assert_eq!(record.agreement_codes, "12-345, 16 629");
        assert_eq!(record.primary_pdf, "https://www.state.gov/docs/a.pdf");
        assert_eq!(record.other_pdfs, "https://www.state.gov/docs/b.pdf");
    }

    #[test]
    fn multiline_title_is_flattened() {
        let html = "<h1 class=\"featured-content__headline stars-above\">\n\t\tAgreement\n\ton Trade\n</h1>";
        assert_eq!(extract_agreement(html, PAGE).title, "Agreementon Trade");
    }

    #[test]
    fn title_falls_back_to_selector() {
        let html = r#"<h1 class="stars-above featured-content__headline"> Agreement on Trade <span>x</span></h1>"#;
        assert_eq!(extract_agreement(html, PAGE).title, "Agreement on Trade");
    }

    #[test]
    fn empty_page_still_yields_a_record() {
        let record = extract_agreement("<html></html>", PAGE);
        assert_eq!(
            record,
            AgreementRecord {
                source_url: PAGE.into(),
                ..AgreementRecord::default()
            }
        );
    }

    #[test]
    fn without_primary_every_pdf_is_other() {
        let html = r#"<a href="a.pdf">A</a><a href="/b.pdf">B</a><a href="/c.PDF">C</a>"#;
        let record = extract_agreement(html, PAGE);
        assert_eq!(record.primary_pdf, "");
        assert_eq!(
            record.other_pdfs,
            "https://www.state.gov/12-345/a.pdf, https://www.state.gov/b.pdf"
        );
    }

    #[test]
    fn primary_is_never_in_others() {
        let html = r#"
            <a class="button button--download" href="https://www.state.gov/wp-content/uploads/16-629-Chile.pdf">Download</a>
            <a href="/wp-content/uploads/16-629-Chile.pdf">16-629</a>
            <a href="/wp-content/uploads/16-629-Annex.pdf">Annex</a>"#;
        let record = extract_agreement(html, PAGE);
        assert!(!record.primary_pdf.is_empty());
        assert!(!record
            .other_pdfs
            .split(LIST_SEPARATOR)
            .any(|link| link == record.primary_pdf));
        assert_eq!(
            record.other_pdfs,
            "https://www.state.gov/wp-content/uploads/16-629-Annex.pdf"
        );
        assert_eq!(record.agreement_codes, "16-629");
    }

    #[test]
    fn codes_ignore_paragraph_order() {
        let texts = ["Treaty 10-413 amends 97-826", "See 10 4130 and 10-413"];
        let forward = agreement_codes(texts);
        let backward = agreement_codes(texts.into_iter().rev());
        assert_eq!(forward, backward);
        assert_eq!(
            forward,
            BTreeSet::from(["10 4130".to_string(), "10-413".into(), "97-826".into()])
        );
    }

    #[test]
    fn codes_need_word_boundaries() {
        assert!(agreement_codes(["phone 123-4567", "year 2020", "1-2345"]).is_empty());
        assert_eq!(
            agreement_codes(["TIAS 12345"]),
            BTreeSet::from(["12345".to_string()])
        );
    }

    #[test]
    fn nested_paragraph_text_in_order() {
        let document = Html::parse_document(
            "<div>outside</div><p>one <i>two <b>three</b></i> four</p><span>no</span><p>five</p>",
        );
        assert_eq!(
            paragraph_texts(&document),
            ["one", "two", "three", "four", "five"]
        );
    }

    #[test]
    fn local_page_uses_site_root() {
        let page = RenderedPage {
            location: PageLocation::Path("debug_html/12-345.html".into()),
            status: 200,
            html: r#"<a class="button--download" href="/docs/a.pdf">x</a>"#.into(),
        };
        let record = scrap_agreement(&page);
        assert_eq!(record.source_url, "debug_html/12-345.html");
        assert_eq!(record.primary_pdf, "https://www.state.gov/docs/a.pdf");
    }
}
