mod config;
mod crawler;
mod error;
mod limiter;
mod render;
mod scrapable;

pub use config::{BrowserConfig, CrawlerConfig, OnError};
pub use crawler::{crawl_site, crawl_site_with, CrawlStats};
pub use error::FetchError;
pub use limiter::DelayLimiter;
pub use render::{ChromeRenderer, PageAction, PageLocation, Render, RenderPlan, RenderedPage};
pub use scrapable::Scrapable;

pub use anyhow;
