pub mod export;
pub mod filter;
mod parser;
pub mod scraper;
pub mod search;
pub mod types;

pub use parser::{is_blocked, parse_job_detail, parse_next_page, parse_search_results};
pub use scraper::{CrawlConfig, CrawlReport, ScraperConfig, ScraperError, WebScraper};

pub(crate) const BASE_URL: &str = "https://chicago.craigslist.org";
