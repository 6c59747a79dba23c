use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::task::spawn_blocking;

use crate::config::{CrawlerConfig, OnError};
use crate::error::FetchError;
use crate::limiter::DelayLimiter;
use crate::render::{ChromeRenderer, Render, RenderPlan, RenderedPage};
use crate::scrapable::Scrapable;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlStats {
    /// Seed URLs
    pub seeded: usize,
    /// Render attempts, retries included
    pub rendered: usize,
    /// Pages handed over to the scraper
    pub scraped: usize,
    /// Records emitted by the scraper
    pub records: usize,
    pub blocked: usize,
    pub failed: usize,
    pub ignored: usize,
}

pub async fn crawl_site<T>(
    crawler_conf: &CrawlerConfig,
    scraper_conf: &T::Config,
) -> Result<CrawlStats>
where
    T: Scrapable,
{
    let browser_conf = crawler_conf.browser.clone();
    let renderer = spawn_blocking(move || ChromeRenderer::launch(&browser_conf)).await??;
    crawl_site_with::<T, _>(crawler_conf, scraper_conf, Arc::new(renderer)).await
}

pub async fn crawl_site_with<T, R>(
    crawler_conf: &CrawlerConfig,
    scraper_conf: &T::Config,
    renderer: Arc<R>,
) -> Result<CrawlStats>
where
    T: Scrapable,
    R: Render,
{
    let mut scraper = <T as Scrapable>::new(scraper_conf)?;
    let seed = scraper.seed();
    let plan = Arc::new(scraper.render_plan());
    let mut limiter = DelayLimiter::new(crawler_conf.download_delay, crawler_conf.randomize_delay);
    let mut stats = CrawlStats {
        seeded: seed.len(),
        ..CrawlStats::default()
    };

    log::info!("Crawling {} page(s)", seed.len());

    let mut urls = seed.into_iter();
    let res = loop {
        let Some(url) = urls.next() else {
            break Ok(());
        };

        let attempts = AtomicUsize::new(0);
        let fetched = if crawler_conf.handle_sigint {
            tokio::select! {
                fetched = fetch(
                    crawler_conf, &renderer, &plan, &url, &mut limiter, &attempts,
                ) => fetched,
                _ = tokio::signal::ctrl_c() => {
                    log::warn!("Interrupted, abandoning remaining pages");
                    stats.rendered += attempts.load(Ordering::Relaxed);
                    let abandoned = std::iter::once(url.clone()).chain(urls.by_ref());
                    for url in abandoned {
                        FetchError::Ignored { url, reason: "interrupted".into() }.log();
                        stats.ignored += 1;
                    }
                    break Ok(());
                }
            }
        } else {
            fetch(crawler_conf, &renderer, &plan, &url, &mut limiter, &attempts).await
        };
        stats.rendered += attempts.load(Ordering::Relaxed);

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                e.log();
                match e {
                    FetchError::Ignored { .. } => stats.ignored += 1,
                    FetchError::Render { .. } => stats.failed += 1,
                }
                continue;
            }
        };

        log::debug!("Processing URL: {} (Status: {})", page.location, page.status);
        scraper.on_rendered(&page);

        if crawler_conf.is_blocked(page.status, &page.html) {
            log::error!(
                "Blocked or forbidden response for {} (Status: {})",
                page.location,
                page.status
            );
            stats.blocked += 1;
            continue;
        }

        match scraper.scrap(&page) {
            Ok(n) => {
                stats.scraped += 1;
                stats.records += n;
            }
            Err(e) => match crawler_conf.on_scrap_error {
                OnError::SkipAndLog => {
                    log::error!("Skipping scrap for page {} got: {e}", page.location);
                }
                OnError::Fail => break Err(e.context(format!("Couldn't scrap {}", page.location))),
            },
        }
    };

    scraper.finalizer();
    log::info!("Crawl finished: {stats:?}");
    res.map(|()| stats)
}

/// Renders `url`, retrying on render errors and on retryable status codes.
///
/// `started` counts render attempts as they begin, so that an abandoned
/// fetch still accounts for the render left running.
async fn fetch<R>(
    crawler_conf: &CrawlerConfig,
    renderer: &Arc<R>,
    plan: &Arc<RenderPlan>,
    url: &str,
    limiter: &mut DelayLimiter,
    started: &AtomicUsize,
) -> Result<RenderedPage, FetchError>
where
    R: Render,
{
    if !is_http_url(url) {
        let reason = "not an absolute http(s) URL".into();
        return Err(FetchError::Ignored { url: url.into(), reason });
    }

    loop {
        limiter.wait().await;
        let attempts = started.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("Rendering {url} (attempt {attempts})");

        let (renderer, plan, target) = (renderer.clone(), plan.clone(), url.to_string());
        let res = spawn_blocking(move || renderer.render(&target, &plan))
            .await
            .unwrap_or_else(|e| Err(anyhow!(e)));

        let can_retry = attempts <= crawler_conf.retry_times;
        match res {
            Ok(page) if can_retry && crawler_conf.is_retryable(page.status) => {
                log::debug!(
                    "Retrying {url} (status {}), attempt {attempts}/{}",
                    page.status,
                    crawler_conf.retry_times + 1
                );
            }
            Ok(page) => return Ok(page),
            Err(e) if can_retry => {
                log::debug!(
                    "Retrying {url} got: {e}, attempt {attempts}/{}",
                    crawler_conf.retry_times + 1
                );
            }
            Err(source) => {
                let url = url.into();
                return Err(FetchError::Render { url, attempts, source });
            }
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::is_http_url;

    #[test]
    fn http_urls() {
        assert!(is_http_url("https://www.state.gov/10-413"));
        assert!(is_http_url("http://www.state.gov/2020-TIAS/?results=200"));
        assert!(!is_http_url("www.state.gov/10-413"));
        assert!(!is_http_url("ftp://www.state.gov/10-413"));
        assert!(!is_http_url(""));
    }
}
