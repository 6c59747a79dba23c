#![cfg(unix)]

use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tias_crawler::{
    crawl_site_with, CrawlStats, CrawlerConfig, PageLocation, Render, RenderPlan, RenderedPage,
    Scrapable,
};

const RENDER_TIME: Duration = Duration::from_secs(4);

struct SlowRenderer;

impl Render for SlowRenderer {
    fn render(&self, url: &str, _plan: &RenderPlan) -> anyhow::Result<RenderedPage> {
        thread::sleep(RENDER_TIME);
        Ok(RenderedPage {
            location: PageLocation::Url(url.into()),
            status: 200,
            html: String::new(),
        })
    }
}

struct PagesScraper(Vec<String>);

impl Scrapable for PagesScraper {
    type Config = Vec<String>;

    fn new(config: &Vec<String>) -> anyhow::Result<Self> {
        Ok(Self(config.clone()))
    }

    fn seed(&self) -> Vec<String> {
        self.0.clone()
    }

    fn render_plan(&self) -> RenderPlan {
        RenderPlan::default()
    }

    fn scrap(&mut self, _page: &RenderedPage) -> anyhow::Result<usize> {
        Ok(1)
    }
}

// Alone in its test binary, SIGINT is sent to the whole process
#[tokio::test]
async fn sigint_abandons_the_page_being_rendered() {
    let seed = vec![
        "https://www.state.gov/10-413".to_string(),
        "https://www.state.gov/16-629/".to_string(),
    ];
    let crawler_conf = CrawlerConfig {
        download_delay: 0.,
        randomize_delay: false,
        handle_sigint: true,
        ..CrawlerConfig::default()
    };

    let pid = std::process::id().to_string();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        Command::new("kill").args(["-INT", &pid]).status().unwrap();
    });

    let start = Instant::now();
    let stats = crawl_site_with::<PagesScraper, _>(&crawler_conf, &seed, Arc::new(SlowRenderer))
        .await
        .unwrap();

    assert!(start.elapsed() < RENDER_TIME, "took {:?}", start.elapsed());
    assert_eq!(
        stats,
        CrawlStats {
            seeded: 2,
            rendered: 1,
            ignored: 2,
            ..CrawlStats::default()
        }
    );
}
