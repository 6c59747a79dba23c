use std::path::PathBuf;

use serde::Serialize;
use tias_crawler::{PageLocation, RenderedPage};

use crate::detail::{self, scrap_agreement};
use crate::links::{self, extract_agreement_links, LinkRecord};
use crate::site::SITE_ROOT;
use crate::writer::{CsvSink, CsvWriter};

/// Which extractor to run on local pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum PageKind {
    /// Yearly index page, yields agreement links
    Links,
    /// Agreement page, yields its metadata
    Detail,
}

/// Scraps every local HTML file matching `pattern`, returns the number of
/// written records
pub fn scrap_glob(kind: PageKind, pattern: &str, wtr: CsvWriter) -> anyhow::Result<usize> {
    let mut paths = vec![];
    for path in glob::glob(pattern)? {
        match path {
            Ok(path) => paths.push(path),
            Err(e) => log::error!("Skipping unreadable path: {e}"),
        }
    }
    if paths.is_empty() {
        log::warn!("No file matches {pattern}");
    }
    scrap_paths(kind, paths, wtr)
}

pub fn scrap_paths(kind: PageKind, paths: Vec<PathBuf>, wtr: CsvWriter) -> anyhow::Result<usize> {
    match kind {
        PageKind::Links => scrap_with(paths, wtr, &links::HEADERS, |page| {
            extract_agreement_links(&page.html, SITE_ROOT)
                .into_iter()
                .map(|url| LinkRecord { url })
                .collect()
        }),
        PageKind::Detail => scrap_with(paths, wtr, &detail::HEADERS, |page| {
            vec![scrap_agreement(page)]
        }),
    }
}

fn scrap_with<R, F>(
    paths: Vec<PathBuf>,
    wtr: CsvWriter,
    headers: &[&str],
    extract: F,
) -> anyhow::Result<usize>
where
    R: Serialize + Send + 'static,
    F: Fn(&RenderedPage) -> Vec<R>,
{
    let mut sink = CsvSink::new(wtr, headers)?;
    let mut count = 0;

    for path in paths {
        let html = match fs_err::read_to_string(&path) {
            Ok(html) => html,
            Err(e) => {
                log::error!("Skipping page scrap: {e}");
                continue;
            }
        };
        let page = RenderedPage {
            location: PageLocation::Path(path),
            status: 200,
            html,
        };
        for record in extract(&page) {
            sink.send(record);
            count += 1;
        }
    }

    sink.finish();
    Ok(count)
}
