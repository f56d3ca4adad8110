use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use craigslist_jobs::export::{OutputFormat, csv_output_path, save, write_json};
use craigslist_jobs::filter::JobFilter;
use craigslist_jobs::search::{
    self, SearchEvent, SearchOptions, SearchSummary, SectionStatus,
};
use craigslist_jobs::types::Section;
use craigslist_jobs::{CrawlConfig, ScraperConfig, WebScraper};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "craigslist-jobs")]
#[command(about = "A Craigslist job and gig listing scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        default_value_t = 2.0,
        global = true,
        help = "Seconds to wait between requests"
    )]
    delay: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a single section and export every posting that passes the filters
    Crawl {
        #[arg(
            long,
            default_value = "jjj",
            value_parser = parse_section,
            help = "Craigslist section code to search"
        )]
        section: Section,

        #[arg(
            long,
            default_value = "smm,video,tiktok",
            help = "Comma-separated keywords matched against title and description"
        )]
        keywords: String,

        #[arg(long, default_value_t = 7, help = "Only include jobs posted within this many days")]
        days: u32,

        #[arg(long, help = "Comma-separated locations to include (default: any)")]
        locations: Option<String>,

        #[arg(
            long,
            default_value_t = 100,
            help = "Maximum number of postings to visit (0 for no limit)"
        )]
        max_jobs: usize,

        #[arg(
            short = 'O',
            long = "output",
            help = "Output file; .csv writes CSV, anything else JSON. Prints JSON to stdout when omitted"
        )]
        output: Option<PathBuf>,

        #[arg(long, help = "Save the search page here when no listings can be extracted")]
        debug_page: Option<PathBuf>,
    },
    /// Search Chicago social media and media gigs across curated sections
    Search {
        #[arg(
            short = 'k',
            long,
            default_value = search::DEFAULT_KEYWORDS,
            help = "Comma-separated keywords for job search"
        )]
        keywords: String,

        #[arg(
            short = 's',
            long,
            default_value = search::DEFAULT_SECTIONS,
            help = "Comma-separated Craigslist sections to search"
        )]
        sections: String,

        #[arg(
            short = 'd',
            long,
            default_value_t = 7,
            help = "Only include jobs posted within this many days"
        )]
        days: u32,

        #[arg(
            long,
            default_value = search::DEFAULT_LOCATIONS,
            help = "Comma-separated locations to include"
        )]
        locations: String,

        #[arg(
            short = 'm',
            long,
            default_value_t = 50,
            help = "Maximum number of jobs to collect per section"
        )]
        max_jobs: usize,

        #[arg(
            short = 'o',
            long,
            default_value = search::DEFAULT_OUTPUT,
            help = "Output file name"
        )]
        output: PathBuf,

        #[arg(long, help = "Output in CSV format instead of JSON")]
        csv: bool,

        #[arg(short = 'q', long, help = "Only print the final results count")]
        quiet: bool,

        #[arg(
            long,
            help = "Daily check preset: 1 day, 30 jobs per section, crg and cpg, chicago only, quiet"
        )]
        monitor: bool,
    },
}

fn parse_section(s: &str) -> Result<Section, String> {
    s.parse::<Section>().map_err(|e| e.to_string())
}

fn build_scraper(delay: f64) -> WebScraper {
    let download_delay = Duration::try_from_secs_f64(delay).unwrap_or_else(|e| {
        log::error!("Invalid delay {delay}: {e}");
        process::exit(1);
    });

    WebScraper::new(ScraperConfig {
        download_delay,
        ..ScraperConfig::default()
    })
    .unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    })
}

fn print_search_header(options: &SearchOptions) {
    let sections = options
        .sections()
        .map(|s| s.iter().map(Section::to_string).collect::<Vec<_>>())
        .unwrap_or_default();

    println!("[SMM Search] Monitoring Chicago SMM/media jobs");
    println!("Period: last {} days", options.days);
    println!("Location: {}", options.location_list().join(", "));
    println!("Sections: {}", sections.join(", "));
    println!("Max per section: {}", options.max_jobs);
    println!("{}", "-".repeat(50));
}

fn print_search_event(event: SearchEvent<'_>) {
    match event {
        SearchEvent::Started(section) => {
            println!(
                "[SMM Search] Scanning section '{}' ({})...",
                section,
                section.label()
            );
        }
        SearchEvent::Finished(section, SectionStatus::Completed(count)) => {
            println!("[SMM Search] Section '{}': {} jobs", section, count);
        }
        SearchEvent::Finished(section, SectionStatus::Failed(reason)) => {
            let reason: String = reason.chars().take(100).collect();
            println!("[SMM Search] Section '{}' failed: {}...", section, reason);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let scraper = build_scraper(cli.delay);

    match cli.command {
        Commands::Crawl {
            section,
            keywords,
            days,
            locations,
            max_jobs,
            output,
            debug_page,
        } => {
            let crawl = CrawlConfig {
                section,
                filter: JobFilter::from_args(&keywords, days, locations.as_deref()),
                max_jobs,
                debug_page,
            };

            let report = scraper.crawl_section(&crawl).await.unwrap_or_else(|e| {
                log::error!("Error crawling section '{}': {}", crawl.section, e);
                process::exit(1);
            });

            log::info!("{}", report.stats);

            let result = match &output {
                Some(path) => save(&report.postings, path, OutputFormat::from_path(path)),
                None => write_json(&report.postings, io::stdout().lock()),
            };
            if let Err(e) = result {
                log::error!("Error writing results: {}", e);
                process::exit(1);
            }
        }

        Commands::Search {
            keywords,
            sections,
            days,
            locations,
            max_jobs,
            output,
            csv,
            quiet,
            monitor,
        } => {
            let mut options = SearchOptions {
                keywords,
                sections,
                days,
                locations,
                max_jobs,
                output,
                csv,
                quiet,
            };
            if monitor {
                options = options.monitor();
            }

            let options = options.validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            if !options.quiet {
                print_search_header(&options);
            }

            let quiet = options.quiet;
            let outcome = search::run_search(&scraper, &options, |event| {
                if !quiet {
                    print_search_event(event);
                }
            })
            .await
            .unwrap_or_else(|e| {
                log::error!("Error running search: {}", e);
                process::exit(1);
            });

            log::debug!("{}", outcome.stats);

            let (path, format) = if options.csv {
                (csv_output_path(&options.output), OutputFormat::Csv)
            } else {
                (options.output.clone(), OutputFormat::Json)
            };

            if let Err(e) = save(&outcome.postings, &path, format) {
                log::error!("Error writing {}: {}", path.display(), e);
                process::exit(1);
            }

            if options.quiet {
                println!("{} new jobs found", outcome.postings.len());
            } else {
                print!(
                    "{}",
                    SearchSummary {
                        postings: &outcome.postings,
                        output: &path,
                    }
                );
                println!("\nTo see all results: open {}", path.display());
                println!("For daily monitoring: craigslist-jobs search --monitor");
            }
        }
    }
}
