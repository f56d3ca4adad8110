use chrono::{Duration, NaiveDateTime};

pub const NO_LOCATION: &str = "N/A";
pub const REMOTE: &str = "remote";

const SHORT_DESCRIPTION_LEN: usize = 200;
const POSTED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Splits a comma separated argument into trimmed, lowercased, non-empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn normalize_location(raw: &str) -> String {
    let cleaned = raw.trim_matches(|c: char| c == ' ' || c == '(' || c == ')');
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        NO_LOCATION.to_string()
    } else if cleaned.to_lowercase().contains(REMOTE) {
        REMOTE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// A listing page location is overridden to `remote` when the posting body
/// says so, unless the location is already `remote` or unknown.
pub fn resolve_location(location: &str, description: &str) -> String {
    if location != REMOTE
        && location != NO_LOCATION
        && description.to_lowercase().contains(REMOTE)
    {
        REMOTE.to_string()
    } else {
        location.to_string()
    }
}

pub fn short_description(description: &str) -> String {
    if description.chars().count() <= SHORT_DESCRIPTION_LEN {
        return description.to_string();
    }

    let cut = description
        .char_indices()
        .nth(SHORT_DESCRIPTION_LEN)
        .map(|(i, _)| i)
        .unwrap_or(description.len());
    let head = &description[..cut];
    match head.rfind(' ') {
        Some(space) => head[..space].to_string(),
        None => head.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    pub keywords: Vec<String>,
    pub days: u32,
    pub locations: Option<Vec<String>>,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            keywords: vec!["smm".to_string(), "video".to_string(), "tiktok".to_string()],
            days: 7,
            locations: None,
        }
    }
}

impl JobFilter {
    /// Builds a filter from raw comma separated arguments. A location list that
    /// is empty after parsing disables location filtering.
    pub fn from_args(keywords: &str, days: u32, locations: Option<&str>) -> Self {
        let locations = locations.map(parse_list).filter(|l| !l.is_empty());
        Self {
            keywords: parse_list(keywords),
            days,
            locations,
        }
    }

    pub fn matches_keywords(&self, title: &str, description: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = format!("{} {}", title, description).to_lowercase();
        self.keywords.iter().any(|kw| haystack.contains(kw.as_str()))
    }

    /// Undated or unparseable postings are treated as recent, as is every
    /// posting when the window reaches past the earliest representable date.
    pub fn is_recent(&self, posted_date: Option<&str>, now: NaiveDateTime) -> bool {
        let Some(raw) = posted_date else {
            return true;
        };
        let prefix: String = raw.chars().take(19).collect();
        match NaiveDateTime::parse_from_str(&prefix, POSTED_DATE_FORMAT) {
            Ok(posted) => Duration::try_days(i64::from(self.days))
                .and_then(|window| now.checked_sub_signed(window))
                .is_none_or(|cutoff| posted >= cutoff),
            Err(e) => {
                log::warn!("Date parsing error for '{}': {}", raw, e);
                true
            }
        }
    }

    pub fn matches_location(&self, location: &str) -> bool {
        match &self.locations {
            None => true,
            Some(allowed) if allowed.is_empty() => true,
            Some(allowed) => {
                let location = location.to_lowercase();
                allowed.iter().any(|a| location.contains(a.as_str()))
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: usize,
    pub rows_found: usize,
    pub details_fetched: usize,
    pub failed_requests: usize,
    pub after_keyword_filter: usize,
    pub after_date_filter: usize,
    pub after_location_filter: usize,
}

impl CrawlStats {
    pub fn merge(&mut self, other: &CrawlStats) {
        self.pages += other.pages;
        self.rows_found += other.rows_found;
        self.details_fetched += other.details_fetched;
        self.failed_requests += other.failed_requests;
        self.after_keyword_filter += other.after_keyword_filter;
        self.after_date_filter += other.after_date_filter;
        self.after_location_filter += other.after_location_filter;
    }
}

impl std::fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Search pages:          {}", self.pages)?;
        writeln!(f, "  Listings found:        {}", self.rows_found)?;
        writeln!(f, "  Postings fetched:      {}", self.details_fetched)?;
        writeln!(f, "  Failed requests:       {}", self.failed_requests)?;
        writeln!(f, "  After keyword filter:  {}", self.after_keyword_filter)?;
        writeln!(f, "  After date filter:     {}", self.after_date_filter)?;
        writeln!(f, "  After location filter: {}", self.after_location_filter)
    }
}
