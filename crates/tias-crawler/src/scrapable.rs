use crate::render::{RenderPlan, RenderedPage};

pub trait Scrapable {
    type Config: Clone + Send + 'static;

    fn new(config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Page URLs to crawl, in order
    fn seed(&self) -> Vec<String>;

    /// How the pages of this scraper are rendered
    fn render_plan(&self) -> RenderPlan;

    /// Called with every rendered page, before the blocked check
    fn on_rendered(&mut self, _page: &RenderedPage) {}

    /// Called with every rendered page that passed the blocked check, returns
    /// the number of emitted records
    fn scrap(&mut self, page: &RenderedPage) -> anyhow::Result<usize>;

    fn finalizer(&mut self) {}
}
