use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Invalid section '{0}'. Expected a Craigslist section code such as 'jjj', 'crg' or 'mar'")]
pub struct SectionParseError(String);

/// A Craigslist search section code, e.g. `jjj` (all jobs) or `crg` (creative gigs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Section(String);

impl Section {
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn label(&self) -> &str {
        match self.0.as_str() {
            "jjj" => "All jobs",
            "ggg" => "All gigs",
            "mar" => "Marketing",
            "med" => "Media",
            "art" => "Art/Design",
            "crg" => "Creative gigs",
            "cpg" => "Computer gigs",
            other => other,
        }
    }
}

impl Default for Section {
    fn default() -> Self {
        Section("jjj".to_string())
    }
}

impl FromStr for Section {
    type Err = SectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SectionParseError(s.to_string()));
        }
        Ok(Section(code))
    }
}

impl TryFrom<String> for Section {
    type Error = SectionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Section> for String {
    fn from(section: Section) -> Self {
        section.0
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row on a search results page, before its posting page is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListing {
    pub title: String,
    pub url: String,
    pub location: String,
}

/// Fields extracted from a single posting page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDetail {
    pub title: Option<String>,
    pub posted_date: Option<String>,
    pub description: String,
}

/// A posting that passed every filter. Field order is the export column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub job_url: String,
    pub posted_date: Option<String>,
    pub location: String,
    pub short_description: String,
    pub section: Section,
    pub scraped_at: DateTime<Utc>,
}

impl Display for JobPosting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let date = self.posted_date.as_deref().unwrap_or("undated");
        write!(
            f,
            "[{}] {} — {} ({})",
            self.section, date, self.title, self.location
        )
    }
}
