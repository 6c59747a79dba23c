use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;

use crate::config::BrowserConfig;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
const RESOURCE_COUNT: &str = "performance.getEntriesByType('resource').length";
const NAVIGATION_STATUS: &str =
    "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || 0";

const IDLE_POLL: Duration = Duration::from_millis(250);
const IDLE_QUIET: Duration = Duration::from_millis(500);

/// One step executed in the page once navigation has started
#[derive(Debug, Clone, PartialEq)]
pub enum PageAction {
    /// Wait until no new network resource has been requested for a while
    WaitForNetworkIdle,
    WaitForSelector { selector: String, timeout: Duration },
    ScrollToBottom,
    Pause(Duration),
    /// Pause for a duration drawn uniformly in `[min, max)`
    PauseBetween(Duration, Duration),
}

#[derive(Debug, Clone, Default)]
pub struct RenderPlan {
    pub headers: Vec<(String, String)>,
    pub actions: Vec<PageAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLocation {
    Url(String),
    Path(PathBuf),
}

impl fmt::Display for PageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub location: PageLocation,
    pub status: u16,
    pub html: String,
}

impl RenderedPage {
    pub fn url(&self) -> Option<&str> {
        match &self.location {
            PageLocation::Url(url) => Some(url),
            PageLocation::Path(_) => None,
        }
    }
}

/// Turns a URL into its JavaScript-rendered HTML.
///
/// Implementations are blocking, the crawl loop calls them from
/// `spawn_blocking`.
pub trait Render: Send + Sync + 'static {
    fn render(&self, url: &str, plan: &RenderPlan) -> Result<RenderedPage>;
}

pub struct ChromeRenderer {
    browser: Browser,
    config: BrowserConfig,
}

impl ChromeRenderer {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let lang = format!("--lang={}", config.locale);
        let browser = Browser::new(LaunchOptions {
            headless: config.headless,
            window_size: Some(config.viewport),
            ignore_certificate_errors: config.ignore_https_errors,
            idle_browser_timeout: Duration::from_secs(600),
            args: vec![
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new(&lang),
            ],
            ..LaunchOptions::default()
        })?;
        log::info!(
            "Launched browser (headless: {}, viewport: {:?}, locale: {})",
            config.headless,
            config.viewport,
            config.locale
        );

        Ok(Self {
            browser,
            config: config.clone(),
        })
    }

    fn prepare_tab(&self, tab: &Tab, plan: &RenderPlan) -> Result<()> {
        tab.set_default_timeout(self.config.navigation_timeout());

        let user_agent = self
            .config
            .user_agents
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| anyhow!("No user agent available"))?;
        log::debug!("Using user agent {user_agent}");
        tab.set_user_agent(user_agent, Some(&self.config.locale), None)?;

        let headers = plan
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<HashMap<_, _>>();
        tab.set_extra_http_headers(headers)?;

        Ok(())
    }

    fn run_plan(&self, tab: &Tab, url: &str, plan: &RenderPlan) -> Result<RenderedPage> {
        self.prepare_tab(tab, plan)?;
        tab.navigate_to(url)?.wait_until_navigated()?;

        for action in &plan.actions {
            log::trace!("{url}: {action:?}");
            match action {
                PageAction::WaitForNetworkIdle => {
                    wait_for_network_idle(tab, self.config.navigation_timeout())?;
                }
                PageAction::WaitForSelector { selector, timeout } => {
                    tab.wait_for_element_with_custom_timeout(selector, *timeout)
                        .map_err(|e| anyhow!("Selector {selector:?} not found: {e}"))?;
                }
                PageAction::ScrollToBottom => {
                    tab.evaluate(SCROLL_TO_BOTTOM, false)?;
                }
                PageAction::Pause(d) => thread::sleep(*d),
                PageAction::PauseBetween(min, max) => {
                    let d = if min < max {
                        rand::thread_rng().gen_range(*min..*max)
                    } else {
                        *min
                    };
                    thread::sleep(d);
                }
            }
        }

        let status = match tab.evaluate(NAVIGATION_STATUS, false)?.value {
            Some(Value::Number(n)) => n.as_u64().filter(|&s| s > 0).unwrap_or(200) as u16,
            _ => 200,
        };

        Ok(RenderedPage {
            location: PageLocation::Url(tab.get_url()),
            status,
            html: tab.get_content()?,
        })
    }
}

impl Render for ChromeRenderer {
    fn render(&self, url: &str, plan: &RenderPlan) -> Result<RenderedPage> {
        let tab = self.browser.new_tab()?;
        let res = self.run_plan(&tab, url, plan);
        close_tab(&tab);
        res
    }
}

fn close_tab(tab: &Arc<Tab>) {
    if let Err(e) = tab.close(true) {
        log::warn!("Couldn't close tab: {e}");
    }
}

fn wait_for_network_idle(tab: &Tab, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    let mut count = resource_count(tab)?;
    let mut quiet_since = Instant::now();

    loop {
        if quiet_since.elapsed() >= IDLE_QUIET {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            anyhow::bail!("Network still busy after {timeout:?}");
        }
        thread::sleep(IDLE_POLL);
        let current = resource_count(tab)?;
        if current != count {
            count = current;
            quiet_since = Instant::now();
        }
    }
}

fn resource_count(tab: &Tab) -> Result<u64> {
    match tab.evaluate(RESOURCE_COUNT, false)?.value {
        Some(Value::Number(n)) => Ok(n.as_u64().unwrap_or(0)),
        _ => Ok(0),
    }
}
