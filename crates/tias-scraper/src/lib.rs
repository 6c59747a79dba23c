pub mod detail;
pub mod links;
pub mod offline;
pub mod seed;
pub mod site;
pub mod writer;

pub use detail::{extract_agreement, AgreementRecord, DetailScraper, DetailScraperConfig};
pub use links::{extract_agreement_links, LinkRecord, LinksScraper, LinksScraperConfig};
pub use offline::{scrap_glob, scrap_paths, PageKind};

pub use anyhow;
