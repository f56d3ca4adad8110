//! Curated multi-section search for Chicago social media and media work.
//!
//! Each section is crawled in turn, the results are merged, duplicate
//! postings are dropped by URL and the remainder is ordered newest first.

use std::collections::HashSet;
use std::fmt::Display;
use std::path::PathBuf;

use crate::filter::{CrawlStats, JobFilter, parse_list};
use crate::scraper::{CrawlConfig, WebScraper};
use crate::types::{JobPosting, Section, SectionParseError};

pub const DEFAULT_KEYWORDS: &str = "social media,content creator,tiktok,instagram,video editor,videographer,reels,short-form video,UGC creator,digital marketing,smm,content,marketing,creative,design,photo,part-time,intern,freelance";
pub const DEFAULT_SECTIONS: &str = "crg,cpg,mar";
pub const DEFAULT_LOCATIONS: &str = "chicago";
pub const DEFAULT_OUTPUT: &str = "daily_smm_jobs.json";
pub const MONITOR_OUTPUT: &str = "monitor_jobs.json";
const MONITOR_SECTIONS: &str = "crg,cpg";

const PREVIEW_COUNT: usize = 3;
const PREVIEW_TITLE_LEN: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("At least one section is required")]
    NoSections,
    #[error(transparent)]
    InvalidSection(#[from] SectionParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub keywords: String,
    pub sections: String,
    pub days: u32,
    pub locations: String,
    pub max_jobs: usize,
    pub output: PathBuf,
    pub csv: bool,
    pub quiet: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.to_string(),
            sections: DEFAULT_SECTIONS.to_string(),
            days: 7,
            locations: DEFAULT_LOCATIONS.to_string(),
            max_jobs: 50,
            output: PathBuf::from(DEFAULT_OUTPUT),
            csv: false,
            quiet: false,
        }
    }
}

impl SearchOptions {
    /// Monitor mode: today's postings from the busiest gig sections, with
    /// only the final count printed.
    pub fn monitor(mut self) -> Self {
        self.days = 1;
        self.max_jobs = 30;
        self.sections = MONITOR_SECTIONS.to_string();
        self.locations = DEFAULT_LOCATIONS.to_string();
        self.quiet = true;
        if self.output == PathBuf::from(DEFAULT_OUTPUT) {
            self.output = PathBuf::from(MONITOR_OUTPUT);
        }
        self
    }

    pub fn sections(&self) -> Result<Vec<Section>, SearchError> {
        let sections = self
            .sections
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<Section>)
            .collect::<Result<Vec<Section>, _>>()?;
        if sections.is_empty() {
            return Err(SearchError::NoSections);
        }
        Ok(sections)
    }

    pub fn validate(self) -> Result<Self, SearchError> {
        self.sections()?;
        Ok(self)
    }

    pub fn filter(&self) -> JobFilter {
        JobFilter::from_args(&self.keywords, self.days, Some(&self.locations))
    }

    pub fn location_list(&self) -> Vec<String> {
        parse_list(&self.locations)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionStatus {
    Completed(usize),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub postings: Vec<JobPosting>,
    pub sections: Vec<(Section, SectionStatus)>,
    pub stats: CrawlStats,
}

/// Dedup key for a posting URL: scheme and host lowercased, query, fragment
/// and trailing slash dropped.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = url.split('#').next().unwrap_or(url);
    let url = url.split('?').next().unwrap_or(url);
    let url = url.trim_end_matches('/');

    match url.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = match rest.find('/') {
                Some(i) => rest.split_at(i),
                None => (rest, ""),
            };
            format!("{}://{}{}", scheme.to_lowercase(), host.to_lowercase(), path)
        }
        None => url.to_string(),
    }
}

/// Keeps the first posting per normalized URL, then orders newest first.
/// Undated postings sort last.
pub fn merge_postings(postings: Vec<JobPosting>) -> Vec<JobPosting> {
    let mut seen = HashSet::new();
    let mut unique: Vec<JobPosting> = postings
        .into_iter()
        .filter(|p| seen.insert(normalize_url(&p.job_url)))
        .collect();

    unique.sort_by(|a, b| b.posted_date.cmp(&a.posted_date));
    unique
}

#[derive(Debug, Clone, Copy)]
pub enum SearchEvent<'a> {
    Started(&'a Section),
    Finished(&'a Section, &'a SectionStatus),
}

/// Crawls every section in order. A failing section is reported through
/// `on_event` and contributes no postings.
pub async fn run_search<F>(
    scraper: &WebScraper,
    options: &SearchOptions,
    mut on_event: F,
) -> Result<SearchOutcome, SearchError>
where
    F: FnMut(SearchEvent<'_>),
{
    let sections = options.sections()?;
    let filter = options.filter();

    let mut all = Vec::new();
    let mut statuses = Vec::with_capacity(sections.len());
    let mut stats = CrawlStats::default();

    for section in sections {
        on_event(SearchEvent::Started(&section));

        let crawl = CrawlConfig {
            section: section.clone(),
            filter: filter.clone(),
            max_jobs: options.max_jobs,
            debug_page: None,
        };

        let status = match scraper.crawl_section(&crawl).await {
            Ok(report) => {
                stats.merge(&report.stats);
                let count = report.postings.len();
                all.extend(report.postings);
                SectionStatus::Completed(count)
            }
            Err(e) => {
                log::warn!("Section '{}' failed: {}", section, e);
                SectionStatus::Failed(e.to_string())
            }
        };

        on_event(SearchEvent::Finished(&section, &status));
        statuses.push((section, status));
    }

    Ok(SearchOutcome {
        postings: merge_postings(all),
        sections: statuses,
        stats,
    })
}

pub struct SearchSummary<'a> {
    pub postings: &'a [JobPosting],
    pub output: &'a std::path::Path,
}

impl Display for SearchSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "-".repeat(50))?;
        writeln!(f, "[SMM Search] Complete!")?;
        writeln!(f, "Total unique jobs found: {}", self.postings.len())?;
        writeln!(f, "Results saved to: {}", self.output.display())?;

        if !self.postings.is_empty() {
            writeln!(f, "\nLatest jobs preview:")?;
            for (i, posting) in self.postings.iter().take(PREVIEW_COUNT).enumerate() {
                let title: String = posting.title.chars().take(PREVIEW_TITLE_LEN).collect();
                writeln!(f, "  {}. {}... ({})", i + 1, title, posting.location.trim())?;
            }
            if self.postings.len() > PREVIEW_COUNT {
                writeln!(
                    f,
                    "  ... and {} more jobs",
                    self.postings.len() - PREVIEW_COUNT
                )?;
            }
        }
        Ok(())
    }
}
