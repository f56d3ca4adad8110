use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::filter::normalize_location;
use crate::types::{JobDetail, JobListing};

static RE_QR_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^QR Code Link to This Post\s*").expect("invalid regex: qr code prefix")
});

const BODY_NOISE: [&str; 4] = ["craigslist", "navigation", "menu", "search"];
const MAX_BODY_BLOCKS: usize = 10;

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

/// Text of the element's direct text children, ignoring nested elements.
fn own_text(element: ElementRef) -> String {
    element
        .children()
        .filter_map(|n| n.value().as_text())
        .map(|t| &**t)
        .collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(element: ElementRef, selectors: &[&Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        element
            .select(sel)
            .next()
            .map(|e| normalize_whitespace(&elem_text(e)))
            .filter(|s| !s.is_empty())
    })
}

fn first_attr(element: ElementRef, selectors: &[&Selector], attr: &str) -> Option<String> {
    selectors.iter().find_map(|sel| {
        element
            .select(sel)
            .find_map(|e| e.value().attr(attr))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn absolute_url(url: &str, base_url: &str) -> String {
    if url.starts_with('/') && !url.starts_with("//") {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}

/// Craigslist serves a short interstitial page mentioning "blocked" when it
/// rate-limits a client.
pub fn is_blocked(html: &str) -> bool {
    html.to_lowercase().contains("blocked")
}

fn select_job_rows(document: &Html) -> Vec<ElementRef<'_>> {
    let strategies = [
        "li.cl-static-search-result",
        "li.result-row",
        "li[data-pid]",
        "li[class*=\"result\"]",
    ];

    for (i, css) in strategies.iter().enumerate() {
        let sel = Selector::parse(css).unwrap();
        let rows: Vec<_> = document.select(&sel).collect();
        if !rows.is_empty() {
            log::debug!("Using row selector #{} ({})", i + 1, css);
            return rows;
        }
    }
    Vec::new()
}

pub fn parse_search_results(html: &str, base_url: &str) -> Vec<JobListing> {
    let document = Html::parse_document(html);
    let modern_title_sel = Selector::parse("div.title a").unwrap();
    let anchor_sel = Selector::parse("a.cl-app-anchor").unwrap();
    let legacy_title_sel = Selector::parse("a.result-title").unwrap();
    let modern_location_sel = Selector::parse("div.details > div.location").unwrap();
    let meta_hood_sel = Selector::parse("div.result-meta .result-hood").unwrap();
    let hood_sel = Selector::parse(".result-hood").unwrap();
    let title_div_sel = Selector::parse("div.title").unwrap();
    let any_link_sel = Selector::parse("a[href]").unwrap();

    let title_sels = [
        &modern_title_sel,
        &anchor_sel,
        &legacy_title_sel,
        &title_div_sel,
    ];
    let url_sels = [
        &modern_title_sel,
        &anchor_sel,
        &legacy_title_sel,
        &any_link_sel,
    ];
    let location_sels = [&modern_location_sel, &meta_hood_sel, &hood_sel];

    select_job_rows(&document)
        .into_iter()
        .filter_map(|row| {
            let url = first_attr(row, &url_sels, "href")?;
            let title = first_text(row, &title_sels).unwrap_or_default();
            let location = first_text(row, &location_sels).unwrap_or_default();

            Some(JobListing {
                title,
                url: absolute_url(&url, base_url),
                location: normalize_location(&location),
            })
        })
        .collect()
}

/// Returns the raw `href` of the next-page link, which may be relative.
pub fn parse_next_page(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for css in ["a.button.next[href]", "a.next[href]"] {
        let sel = Selector::parse(css).unwrap();
        if let Some(href) = document
            .select(&sel)
            .find_map(|e| e.value().attr("href"))
            .filter(|h| !h.trim().is_empty())
        {
            return Some(href.trim().to_string());
        }
    }

    let link_sel = Selector::parse("a[href]").unwrap();
    document
        .select(&link_sel)
        .find(|a| {
            own_text(*a).contains("next")
                || a.value().attr("class").is_some_and(|c| c.contains("next"))
        })
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

fn strip_qr_prefix(text: &str) -> String {
    RE_QR_PREFIX.replace(text.trim(), "").trim().to_string()
}

fn parse_posted_date(document: &Html) -> Option<String> {
    for css in ["time[datetime]", ".postinginfos time[datetime]"] {
        let sel = Selector::parse(css).unwrap();
        if let Some(date) = document
            .select(&sel)
            .find_map(|e| e.value().attr("datetime"))
            .filter(|d| !d.trim().is_empty())
        {
            return Some(date.trim().to_string());
        }
    }

    let date_text_sel = Selector::parse(".postinginfos .date").unwrap();
    document
        .select(&date_text_sel)
        .next()
        .map(|e| normalize_whitespace(&elem_text(e)))
        .filter(|s| !s.is_empty())
}

fn parse_description(document: &Html) -> String {
    let body_sel = Selector::parse("#postingbody").unwrap();
    if let Some(body) = document
        .select(&body_sel)
        .next()
        .map(|e| normalize_whitespace(&elem_text(e)))
        .filter(|s| !s.is_empty())
    {
        return strip_qr_prefix(&body);
    }

    let userbody_sel = Selector::parse(".userbody").unwrap();
    let userbody = document
        .select(&userbody_sel)
        .flat_map(|e| e.text())
        .collect::<Vec<_>>()
        .join(" ");
    let userbody = normalize_whitespace(&userbody);
    if !userbody.is_empty() {
        return strip_qr_prefix(&userbody);
    }

    let page_sel = Selector::parse("body").unwrap();
    document
        .select(&page_sel)
        .flat_map(|e| e.text())
        .map(str::trim)
        .filter(|t| {
            let lower = t.to_lowercase();
            t.chars().count() > 10 && !BODY_NOISE.iter().any(|noise| lower.contains(noise))
        })
        .take(MAX_BODY_BLOCKS)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_job_detail(html: &str) -> JobDetail {
    let document = Html::parse_document(html);
    let title_only_sel = Selector::parse("span#titletextonly").unwrap();
    let heading_sel = Selector::parse("h1.postingtitle").unwrap();

    let title = [&title_only_sel, &heading_sel].iter().find_map(|sel| {
        document
            .select(sel)
            .next()
            .map(|e| normalize_whitespace(&elem_text(e)))
            .filter(|s| !s.is_empty())
    });

    JobDetail {
        title,
        posted_date: parse_posted_date(&document),
        description: parse_description(&document),
    }
}
