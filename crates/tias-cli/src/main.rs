use std::fs::File;
use std::future::Future;
use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use log::LevelFilter;
use tias_crawler::{crawl_site, CrawlerConfig, OnError};
use tias_scraper::seed::{resolve_index_seed, YEARS_URL};
use tias_scraper::writer::CsvWriter;
use tias_scraper::{
    scrap_glob, scrap_paths, DetailScraper, DetailScraperConfig, LinksScraper,
    LinksScraperConfig, PageKind,
};
use tokio::runtime;

const LEVELS: [LevelFilter; 6] = [
    LevelFilter::Off,
    LevelFilter::Error,
    LevelFilter::Warn,
    LevelFilter::Info,
    LevelFilter::Debug,
    LevelFilter::Trace,
];

/// Treaties and Other International Acts Series scraper
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "links")]
    Links(LinksArgs),
    #[command(name = "pdfs")]
    Pdfs(PdfsArgs),
    #[command(name = "scrap")]
    Scrap(ScrapArgs),
    #[command(hide = true)]
    Completion,
}

#[derive(Debug, Clone, Copy, clap::Args)]
pub struct Verbosity {
    /// When quiet no logs are outputted
    #[arg(long, short, global = true)]
    pub quiet: bool,
    /// More verbose logs, can be repeated
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Verbosity {
    /// Builds the logger once, `RUST_LOG` still has the last word
    fn init_logger(self, default: LevelFilter) {
        let level = if self.quiet {
            LevelFilter::Off
        } else {
            let idx = default as usize + self.verbose as usize;
            LEVELS[idx.min(LEVELS.len() - 1)]
        };
        env_logger::Builder::new()
            .filter_level(LevelFilter::Warn)
            .filter_module("tias", level)
            .filter_module("tias_crawler", level)
            .filter_module("tias_scraper", level)
            .parse_default_env()
            .init();
    }
}

/// Crawler settings shared by the crawling subcommands
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Optional crawler yaml configuration file, replaces the subcommand defaults
    #[arg(env = "TIAS_CRAWLER_CONFIG", long)]
    pub crawler_config: Option<PathBuf>,
    /// Override crawler's delay between two page requests, in seconds
    #[arg(long)]
    pub download_delay: Option<f32>,
    /// Wait exactly the download delay between requests
    #[arg(long)]
    pub no_randomize_delay: bool,
    /// Override crawler's number of retries per page
    #[arg(long)]
    pub retry_times: Option<usize>,
    /// Override browser's user agents, one is picked per page
    #[arg(long)]
    pub user_agent: Vec<String>,
    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
    /// No SIGINT handling, remaining pages won't be logged as ignored
    #[arg(long)]
    pub no_sigint: bool,
    /// Override crawler's scrap error handling strategy
    #[arg(value_enum, long)]
    pub on_scrap_error: Option<OnError>,
}

impl CrawlArgs {
    fn crawler_config(&self, defaults: CrawlerConfig) -> anyhow::Result<CrawlerConfig> {
        let mut conf = if let Some(file) = self.crawler_config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            defaults
        };
        if let Some(download_delay) = self.download_delay {
            conf.download_delay = download_delay;
        }
        if self.no_randomize_delay {
            conf.randomize_delay = false;
        }
        if let Some(retry_times) = self.retry_times {
            conf.retry_times = retry_times;
        }
        if !self.user_agent.is_empty() {
            conf.browser.user_agents = self.user_agent.clone();
        }
        if self.headful {
            conf.browser.headless = false;
        }
        if self.no_sigint {
            conf.handle_sigint = false;
        }
        if let Some(on_scrap_error) = self.on_scrap_error {
            conf.on_scrap_error = on_scrap_error;
        }
        Ok(conf)
    }
}

/// Crawl yearly index pages and collect agreement links
#[derive(Debug, clap::Args)]
pub struct LinksArgs {
    /// Only crawl the first N years of the list
    #[arg(long)]
    pub max_years: Option<String>,
    /// CSV file listing the years to crawl, in a `Years` column
    #[arg(long, default_value = YEARS_URL)]
    pub years_url: String,
    /// Path to the output file that will contain agreement links
    #[arg(long, short, default_value = "all_extracted_links.csv")]
    pub output: PathBuf,
    /// Directory where rendered index pages are saved
    #[arg(long, default_value = "debug_html")]
    pub debug_dir: PathBuf,
    #[command(flatten)]
    pub crawl: CrawlArgs,
}

pub fn links(args: LinksArgs) -> anyhow::Result<()> {
    let crawler_conf = args.crawl.crawler_config(LinksScraper::crawler_config())?;
    run_crawl(async {
        let seed = resolve_index_seed(&args.years_url, args.max_years.as_deref()).await?;
        let scraper_conf = LinksScraperConfig {
            seed,
            csv_file: args.output,
            debug_dir: Some(args.debug_dir),
        };
        crawl_site::<LinksScraper>(&crawler_conf, &scraper_conf).await?;
        Ok::<_, anyhow::Error>(())
    })
}

/// Crawl agreement pages and extract their metadata and PDF links
#[derive(Debug, clap::Args)]
pub struct PdfsArgs {
    /// File with one agreement URL per line, built-in examples otherwise
    #[arg(long)]
    pub urls_file: Option<PathBuf>,
    /// Path to the output file that will contain agreement metadata
    #[arg(long, short, default_value = "tias_scraped_data.csv")]
    pub output: PathBuf,
    #[command(flatten)]
    pub crawl: CrawlArgs,
}

pub fn pdfs(args: PdfsArgs) -> anyhow::Result<()> {
    let crawler_conf = args.crawl.crawler_config(DetailScraper::crawler_config())?;
    let scraper_conf = DetailScraperConfig {
        urls_file: args.urls_file,
        csv_file: args.output,
    };
    run_crawl(async {
        crawl_site::<DetailScraper>(&crawler_conf, &scraper_conf).await?;
        Ok::<_, anyhow::Error>(())
    })
}

/// Runs a crawl to completion without waiting for a render abandoned on Ctrl-C
fn run_crawl<F>(crawl: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let res = rt.block_on(crawl);
    rt.shutdown_background();
    res
}

/// Scrap saved pages and print the result to stdout
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("page").required(true))]
pub struct ScrapArgs {
    /// Kind of the saved pages
    #[arg(value_enum, long)]
    pub kind: PageKind,
    /// A local html page to scrap
    #[arg(group = "page", long)]
    pub file: Option<PathBuf>,
    /// A glob matching local html pages, such as `debug_html/*.html`
    #[arg(group = "page", long)]
    pub glob: Option<String>,
}

pub fn scrap(args: ScrapArgs) -> anyhow::Result<()> {
    let wtr = CsvWriter::stdout();
    let count = if let Some(path) = args.file {
        scrap_paths(args.kind, vec![path], wtr)?
    } else if let Some(pattern) = args.glob {
        scrap_glob(args.kind, &pattern, wtr)?
    } else {
        anyhow::bail!("Missing `file` or `glob`");
    };
    log::info!("Scraped {count} record(s)");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity;

    match args.cmd {
        SubCommand::Links(args) => {
            verbosity.init_logger(LevelFilter::Debug);
            links(args)
        }
        SubCommand::Pdfs(args) => {
            verbosity.init_logger(LevelFilter::Info);
            pdfs(args)
        }
        SubCommand::Scrap(args) => {
            verbosity.init_logger(LevelFilter::Warn);
            scrap(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "tias", &mut io::stdout());
            Ok(())
        }
    }
}
