use std::path::Path;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;

use crate::site::year_index_url;

pub const YEARS_URL: &str = "https://raw.githubusercontent.com/nicolesorense/Diplomatic-agreements-files-and-code/refs/heads/main/treaty_years.csv";

pub const YEARS_COLUMN: &str = "Years";

pub const DEFAULT_DETAIL_URLS: [&str; 3] = [
    "https://www.state.gov/16-629/",
    "https://www.state.gov/10-413",
    "https://www.state.gov/argentina-97-826",
];

static HTTP_CLI: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Downloads the year list and turns it into yearly index page URLs,
/// keeping only the first `limit` of them when it is a positive integer.
pub async fn resolve_index_seed(years_url: &str, limit: Option<&str>) -> Result<Vec<String>> {
    let body = HTTP_CLI
        .get(years_url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .with_context(|| format!("Couldn't fetch year list {years_url}"))?
        .text()
        .await?;

    let years = parse_years(&body).with_context(|| format!("Invalid year list {years_url}"))?;
    let urls = apply_limit(years.iter().map(|y| year_index_url(y)).collect(), limit);
    log::debug!("Processing {} year URLs: {urls:?}", urls.len());

    Ok(urls)
}

pub fn parse_years(csv_text: &str) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let column = rdr
        .headers()?
        .iter()
        .position(|h| h.trim() == YEARS_COLUMN)
        .ok_or_else(|| anyhow!("Missing column {YEARS_COLUMN:?}"))?;

    let mut years = vec![];
    for record in rdr.records() {
        let record = record?;
        let Some(year) = record.get(column).map(str::trim) else {
            continue;
        };
        if year.is_empty() {
            continue;
        }
        years.push(year.strip_suffix(".0").unwrap_or(year).to_string());
    }

    Ok(years)
}

pub fn apply_limit(mut urls: Vec<String>, limit: Option<&str>) -> Vec<String> {
    let Some(limit) = limit else {
        return urls;
    };
    match limit.trim().parse::<usize>() {
        Ok(n) if n > 0 => urls.truncate(n),
        _ => log::warn!("Invalid max_years: {limit}, processing all years"),
    }
    urls
}

/// Seed URLs of the detail pipeline: the non-blank lines of `urls_file`, or
/// the built-in examples
pub fn detail_seed(urls_file: Option<&Path>) -> Result<Vec<String>> {
    match urls_file {
        Some(path) => {
            let content = fs_err::read_to_string(path)?;
            Ok(parse_url_lines(&content))
        }
        None => Ok(DEFAULT_DETAIL_URLS.iter().map(|u| u.to_string()).collect()),
    }
}

pub fn parse_url_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
