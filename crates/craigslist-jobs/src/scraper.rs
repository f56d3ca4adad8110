use crate::filter::{CrawlStats, JobFilter, resolve_location, short_description};
use crate::parser::{is_blocked, parse_job_detail, parse_next_page, parse_search_results};
use crate::types::{JobListing, JobPosting, Section};

use chrono::{Local, NaiveDateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request blocked or rejected by the server: {0}")]
    Blocked(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Failed to write debug page: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Pause between consecutive requests.
    pub download_delay: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: crate::BASE_URL.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            download_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub section: Section,
    pub filter: JobFilter,
    /// Maximum number of postings to visit across all pages. Zero means no limit.
    pub max_jobs: usize,
    /// Where to save the search page when no listings could be extracted from it.
    pub debug_page: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            section: Section::default(),
            filter: JobFilter::default(),
            max_jobs: 100,
            debug_page: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub section: Section,
    pub postings: Vec<JobPosting>,
    pub stats: CrawlStats,
}

/// Sleeps for the configured delay before every request except the first.
struct Throttle {
    delay: Duration,
    primed: bool,
}

impl Throttle {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            primed: false,
        }
    }

    async fn wait(&mut self) {
        if self.primed && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.primed = true;
    }
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    config: ScraperConfig,
}

impl WebScraper {
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(header::DNT, HeaderValue::from_static("1"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn search_url(&self, section: &Section) -> String {
        format!(
            "{}/search/{}",
            self.config.base_url.trim_end_matches('/'),
            section.code()
        )
    }

    /// Crawls one section: walks the search pages, visits each posting and
    /// keeps the ones passing the keyword, date and location filters.
    pub async fn crawl_section(&self, crawl: &CrawlConfig) -> Result<CrawlReport, ScraperError> {
        log::info!(
            "Crawling section '{}' with keywords={:?}, days={}, locations={:?}, max_jobs={}",
            crawl.section,
            crawl.filter.keywords,
            crawl.filter.days,
            crawl.filter.locations,
            crawl.max_jobs
        );

        let now = Local::now().naive_local();
        let mut throttle = Throttle::new(self.config.download_delay);
        let mut stats = CrawlStats::default();
        let mut postings = Vec::new();
        let mut seen_postings = HashSet::new();
        let mut seen_pages = HashSet::new();
        let mut remaining = if crawl.max_jobs == 0 {
            usize::MAX
        } else {
            crawl.max_jobs
        };
        let mut page_url = self.search_url(&crawl.section);

        loop {
            let first_page = seen_pages.is_empty();
            seen_pages.insert(page_url.clone());

            throttle.wait().await;
            log::info!("Fetching search page {}", page_url);
            let html = match self.get_html(&page_url).await {
                Ok(html) => html,
                Err(e) if first_page => return Err(e),
                Err(e) => {
                    log::error!("Request failed: {} - {}", page_url, e);
                    stats.failed_requests += 1;
                    break;
                }
            };

            if is_blocked(&html) {
                if first_page {
                    return Err(ScraperError::Blocked(page_url));
                }
                log::error!("Possibly blocked on search page {}", page_url);
                stats.failed_requests += 1;
                break;
            }
            stats.pages += 1;

            let listings = parse_search_results(&html, &self.config.base_url);
            if listings.is_empty() {
                log::warn!("No job rows found on {}. Page structure may have changed.", page_url);
                if let Some(path) = &crawl.debug_page {
                    match std::fs::write(path, &html) {
                        Ok(()) => log::warn!("Saved search page to {}", path.display()),
                        Err(e) => {
                            log::error!("{}", ScraperError::from(e));
                            stats.failed_requests += 1;
                        }
                    }
                }
                break;
            }
            log::info!("Found {} jobs on current page.", listings.len());
            stats.rows_found += listings.len();

            for listing in listings {
                if remaining == 0 {
                    break;
                }
                if !seen_postings.insert(listing.url.clone()) {
                    continue;
                }
                remaining -= 1;

                throttle.wait().await;
                if let Some(posting) = self
                    .visit_posting(&listing, crawl, now, &mut stats)
                    .await
                {
                    postings.push(posting);
                }
            }

            if remaining == 0 {
                log::debug!("Reached max_jobs={} for '{}'", crawl.max_jobs, crawl.section);
                break;
            }

            let Some(next) = parse_next_page(&html) else {
                break;
            };
            let next_url = match join_url(&page_url, &next) {
                Ok(url) => url,
                Err(e) => {
                    log::error!("Cannot follow next page from {}: {}", page_url, e);
                    stats.failed_requests += 1;
                    break;
                }
            };
            if seen_pages.contains(&next_url) {
                log::debug!("Next page {} already visited", next_url);
                break;
            }
            log::info!("Following next page: {}", next_url);
            page_url = next_url;
        }

        log::info!(
            "Section '{}' finished with {} matching job(s)",
            crawl.section,
            postings.len()
        );

        Ok(CrawlReport {
            section: crawl.section.clone(),
            postings,
            stats,
        })
    }

    async fn visit_posting(
        &self,
        listing: &JobListing,
        crawl: &CrawlConfig,
        now: NaiveDateTime,
        stats: &mut CrawlStats,
    ) -> Option<JobPosting> {
        let html = match self.get_html(&listing.url).await {
            Ok(html) => html,
            Err(e) => {
                log::error!("Request failed: {} - {}", listing.url, e);
                stats.failed_requests += 1;
                return None;
            }
        };
        if is_blocked(&html) {
            log::warn!("Blocked or error on detail page: {}", listing.url);
            stats.failed_requests += 1;
            return None;
        }
        stats.details_fetched += 1;

        let detail = parse_job_detail(&html);
        let title = if listing.title.is_empty() {
            detail.title.unwrap_or_default()
        } else {
            listing.title.clone()
        };
        let location = resolve_location(&listing.location, &detail.description);

        if !crawl.filter.matches_keywords(&title, &detail.description) {
            log::debug!("Job filtered out by keywords: {}", title);
            return None;
        }
        stats.after_keyword_filter += 1;

        if !crawl.filter.is_recent(detail.posted_date.as_deref(), now) {
            log::debug!("Job filtered out by date: {}", title);
            return None;
        }
        stats.after_date_filter += 1;

        if !crawl.filter.matches_location(&location) {
            log::debug!("Job filtered out by location: {} ({})", title, location);
            return None;
        }
        stats.after_location_filter += 1;

        log::info!("Scraped job: {}", title);
        Some(JobPosting {
            short_description: short_description(&detail.description),
            title,
            job_url: listing.url.clone(),
            posted_date: detail.posted_date,
            location,
            section: crawl.section.clone(),
            scraped_at: Utc::now(),
        })
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

fn join_url(current: &str, href: &str) -> Result<String, ScraperError> {
    let base = Url::parse(current).map_err(|e| ScraperError::InvalidUrl(format!("{current}: {e}")))?;
    base.join(href)
        .map(String::from)
        .map_err(|e| ScraperError::InvalidUrl(format!("{href}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn scraper_for(server: &Server) -> WebScraper {
        WebScraper::new(ScraperConfig {
            base_url: server.url(),
            download_delay: Duration::ZERO,
            ..ScraperConfig::default()
        })
        .unwrap()
    }

    fn posting_page(title: &str, date: &str, body: &str) -> String {
        format!(
            r#"<html><body>
                <span id="titletextonly">{title}</span>
                <section id="postingbody">{body}</section>
                <div class="postinginfos"><time datetime="{date}">{date}</time></div>
            </body></html>"#
        )
    }

    fn days_ago(days: i64) -> String {
        (Local::now().naive_local() - chrono::Duration::days(days))
            .format("%Y-%m-%dT%H:%M:%S-0500")
            .to_string()
    }

    const PAGE_ONE: &str = r#"<html><body><ol>
        <li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/1.html">TikTok creator</a></div>
            <div class="details"><div class="location">(Chicago)</div></div></li>
        <li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/2.html">Line cook</a></div>
            <div class="details"><div class="location">(Chicago)</div></div></li>
        <li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/3.html">Video shoot</a></div>
            <div class="details"><div class="location">(Gary, IN)</div></div></li>
        </ol><a class="button next" href="/search/crg?s=120">next</a></body></html>"#;

    const PAGE_TWO: &str = r#"<html><body><ol>
        <li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/1.html">TikTok creator</a></div></li>
        <li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/4.html">Old smm gig</a></div>
            <div class="details"><div class="location">(Chicago)</div></div></li>
        </ol></body></html>"#;

    #[tokio::test]
    async fn test_crawl_section_filters_and_paginates() {
        let mut server = Server::new_async().await;
        let page_one = server
            .mock("GET", "/search/crg")
            .with_status(200)
            .with_body(PAGE_ONE)
            .expect(1)
            .create_async()
            .await;
        let page_two = server
            .mock("GET", "/search/crg?s=120")
            .with_status(200)
            .with_body(PAGE_TWO)
            .expect(1)
            .create_async()
            .await;
        let first = server
            .mock("GET", "/chc/crg/d/1.html")
            .with_status(200)
            .with_body(posting_page("TikTok creator", &days_ago(1), "Film short videos"))
            .expect(1)
            .create_async()
            .await;
        let _mock1 = server
            .mock("GET", "/chc/crg/d/2.html")
            .with_status(200)
            .with_body(posting_page("Line cook", &days_ago(1), "Kitchen work"))
            .create_async()
            .await;
        let _mock2 = server
            .mock("GET", "/chc/crg/d/3.html")
            .with_status(200)
            .with_body(posting_page("Video shoot", &days_ago(2), "On location"))
            .create_async()
            .await;
        let _mock3 = server
            .mock("GET", "/chc/crg/d/4.html")
            .with_status(200)
            .with_body(posting_page("Old smm gig", &days_ago(30), "Posting"))
            .create_async()
            .await;

        let scraper = scraper_for(&server);
        let crawl = CrawlConfig {
            section: "crg".parse().unwrap(),
            filter: JobFilter::from_args("smm,video,tiktok", 7, Some("chicago")),
            max_jobs: 0,
            debug_page: None,
        };

        let report = scraper.crawl_section(&crawl).await.unwrap();

        assert_eq!(report.postings.len(), 1);
        let posting = &report.postings[0];
        assert_eq!(posting.title, "TikTok creator");
        assert_eq!(posting.job_url, format!("{}/chc/crg/d/1.html", server.url()));
        assert_eq!(posting.location, "Chicago");
        assert_eq!(posting.short_description, "Film short videos");
        assert_eq!(posting.section.code(), "crg");

        assert_eq!(report.stats.pages, 2);
        assert_eq!(report.stats.rows_found, 5);
        assert_eq!(report.stats.details_fetched, 4);
        assert_eq!(report.stats.after_keyword_filter, 3);
        assert_eq!(report.stats.after_date_filter, 2);
        assert_eq!(report.stats.after_location_filter, 1);

        page_one.assert_async().await;
        page_two.assert_async().await;
        first.assert_async().await;
    }

    #[tokio::test]
    async fn test_crawl_section_respects_max_jobs() {
        let mut server = Server::new_async().await;
        let _mock4 = server
            .mock("GET", "/search/crg")
            .with_status(200)
            .with_body(PAGE_ONE)
            .create_async()
            .await;
        let page_two = server
            .mock("GET", "/search/crg?s=120")
            .expect(0)
            .create_async()
            .await;
        let first = server
            .mock("GET", "/chc/crg/d/1.html")
            .with_status(200)
            .with_body(posting_page("TikTok creator", &days_ago(1), "Film"))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/chc/crg/d/2.html")
            .expect(0)
            .create_async()
            .await;

        let scraper = scraper_for(&server);
        let crawl = CrawlConfig {
            section: "crg".parse().unwrap(),
            max_jobs: 1,
            ..CrawlConfig::default()
        };

        let report = scraper.crawl_section(&crawl).await.unwrap();
        assert_eq!(report.postings.len(), 1);

        page_two.assert_async().await;
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_crawl_section_failed_posting_is_not_fatal() {
        let mut server = Server::new_async().await;
        let _mock5 = server
            .mock("GET", "/search/crg")
            .with_status(200)
            .with_body(PAGE_TWO)
            .create_async()
            .await;
        let _mock6 = server
            .mock("GET", "/chc/crg/d/1.html")
            .with_status(404)
            .create_async()
            .await;
        let _mock7 = server
            .mock("GET", "/chc/crg/d/4.html")
            .with_status(200)
            .with_body(posting_page("Recent smm gig", &days_ago(1), "Posting"))
            .create_async()
            .await;

        let scraper = scraper_for(&server);
        let crawl = CrawlConfig {
            section: "crg".parse().unwrap(),
            ..CrawlConfig::default()
        };

        let report = scraper.crawl_section(&crawl).await.unwrap();
        assert_eq!(report.stats.failed_requests, 1);
        assert_eq!(report.postings.len(), 1);
        assert_eq!(report.postings[0].title, "Old smm gig");
    }

    #[tokio::test]
    async fn test_crawl_section_blocked_search_page() {
        let mut server = Server::new_async().await;
        let _mock8 = server
            .mock("GET", "/search/jjj")
            .with_status(200)
            .with_body("<p>Your IP has been blocked.</p>")
            .create_async()
            .await;

        let scraper = scraper_for(&server);
        let result = scraper.crawl_section(&CrawlConfig::default()).await;

        assert!(matches!(result, Err(ScraperError::Blocked(_))));
    }

    #[tokio::test]
    async fn test_crawl_section_saves_debug_page() {
        let mut server = Server::new_async().await;
        let _mock9 = server
            .mock("GET", "/search/jjj")
            .with_status(200)
            .with_body("<html><body><p>redesigned page</p></body></html>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let debug_page = dir.path().join("debug_page.html");
        let scraper = scraper_for(&server);
        let crawl = CrawlConfig {
            debug_page: Some(debug_page.clone()),
            ..CrawlConfig::default()
        };

        let report = scraper.crawl_section(&crawl).await.unwrap();
        assert!(report.postings.is_empty());
        assert_eq!(report.stats.pages, 1);

        let saved = std::fs::read_to_string(debug_page).unwrap();
        assert!(saved.contains("redesigned page"));
    }

    #[tokio::test]
    async fn test_crawl_section_keeps_postings_on_bad_next_link() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/search/crg")
            .with_status(200)
            .with_body(
                r#"<ol><li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/1.html">TikTok creator</a></div></li></ol>
                   <a class="button next" href="https://">next</a>"#,
            )
            .create_async()
            .await;
        let _posting = server
            .mock("GET", "/chc/crg/d/1.html")
            .with_status(200)
            .with_body(posting_page("TikTok creator", &days_ago(1), "Film"))
            .create_async()
            .await;

        let scraper = scraper_for(&server);
        let crawl = CrawlConfig {
            section: "crg".parse().unwrap(),
            ..CrawlConfig::default()
        };

        let report = scraper.crawl_section(&crawl).await.unwrap();
        assert_eq!(report.postings.len(), 1);
        assert_eq!(report.stats.failed_requests, 1);
    }

    #[tokio::test]
    async fn test_crawl_section_keeps_postings_when_debug_page_unwritable() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/search/jjj")
            .with_status(200)
            .with_body("<html><body><p>redesigned page</p></body></html>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let scraper = scraper_for(&server);
        let crawl = CrawlConfig {
            debug_page: Some(dir.path().join("missing").join("debug_page.html")),
            ..CrawlConfig::default()
        };

        let report = scraper.crawl_section(&crawl).await.unwrap();
        assert_eq!(report.stats.pages, 1);
        assert_eq!(report.stats.failed_requests, 1);
    }

    #[tokio::test]
    async fn test_crawl_section_stops_on_link_back_to_visited_page() {
        let mut server = Server::new_async().await;
        let page_one = server
            .mock("GET", "/search/crg")
            .with_status(200)
            .with_body(
                r#"<ol><li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/1.html">TikTok creator</a></div></li></ol>
                   <a class="button next" href="/search/crg?s=120">next</a>"#,
            )
            .expect(1)
            .create_async()
            .await;
        let page_two = server
            .mock("GET", "/search/crg?s=120")
            .with_status(200)
            .with_body(
                r#"<ol><li class="cl-static-search-result"><div class="title"><a href="/chc/crg/d/2.html">Video gig</a></div></li></ol>
                   <a class="button next" href="/search/crg">next</a>"#,
            )
            .expect(1)
            .create_async()
            .await;
        let _first = server
            .mock("GET", "/chc/crg/d/1.html")
            .with_status(200)
            .with_body(posting_page("TikTok creator", &days_ago(1), "Film"))
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/chc/crg/d/2.html")
            .with_status(200)
            .with_body(posting_page("Video gig", &days_ago(1), "Shoot"))
            .create_async()
            .await;

        let scraper = scraper_for(&server);
        let crawl = CrawlConfig {
            section: "crg".parse().unwrap(),
            max_jobs: 0,
            ..CrawlConfig::default()
        };

        let report = scraper.crawl_section(&crawl).await.unwrap();
        assert_eq!(report.stats.pages, 2);
        assert_eq!(report.postings.len(), 2);

        page_one.assert_async().await;
        page_two.assert_async().await;
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://chicago.craigslist.org/search/crg", "/search/crg?s=120").unwrap(),
            "https://chicago.craigslist.org/search/crg?s=120"
        );
        assert_eq!(
            join_url("https://chicago.craigslist.org/search/crg", "https://example.org/x").unwrap(),
            "https://example.org/x"
        );
        assert!(join_url("not a url", "/x").is_err());
    }
}
