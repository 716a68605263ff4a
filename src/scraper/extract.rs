use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use ::scraper::{ElementRef, Html, Selector};

use crate::models::target::DEFAULT_TITLE;
use crate::models::{JobRecord, Target, job_id};
use crate::scraper::salary::parse_salary;

pub const DEFAULT_DESCRIPTION_LIMIT: usize = 1000;
pub const UNKNOWN: &str = "Unknown";

static LINK: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("a[href]").ok());
static HEADINGS: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse(DEFAULT_TITLE).ok());

/// Selector-driven job extraction. Best effort: every matched container
/// yields a job, with placeholder values for fields its selectors miss.
#[derive(Debug, Clone)]
pub struct Extractor {
    description_limit: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor {
            description_limit: DEFAULT_DESCRIPTION_LIMIT,
        }
    }
}

impl Extractor {
    pub fn new(description_limit: usize) -> Self {
        Extractor { description_limit }
    }

    pub fn extract(&self, html: &str, target: &Target) -> Vec<JobRecord> {
        let document = Html::parse_document(html);
        let scraped_at = Utc::now();

        let mut jobs = Vec::new();
        for container in document.select(&target.selectors.job_container) {
            jobs.push(self.extract_item(container, target, scraped_at));
        }

        tracing::debug!(target_name = %target.name, count = jobs.len(), "Extracted jobs");
        jobs
    }

    fn extract_item(
        &self,
        container: ElementRef<'_>,
        target: &Target,
        scraped_at: DateTime<Utc>,
    ) -> JobRecord {
        let selectors = &target.selectors;

        let title = first_text(container, &selectors.title)
            .or_else(|| HEADINGS.as_ref().and_then(|s| first_text(container, s)));
        let location = first_text(container, &selectors.location);
        let description = first_text(container, &selectors.description);
        let href = LINK
            .as_ref()
            .and_then(|s| container.select(s).next())
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty());

        let title = title.unwrap_or_else(|| UNKNOWN.to_string());
        let location = location.unwrap_or_else(|| UNKNOWN.to_string());
        let description = truncate_chars(&description.unwrap_or_default(), self.description_limit);

        let url = href
            .and_then(|h| target.base_url.join(h).ok())
            .unwrap_or_else(|| target.career_url.clone())
            .to_string();

        let salary_text = first_text(container, &selectors.salary).unwrap_or_default();
        let (salary_min, salary_max) = parse_salary(&salary_text);

        let employment_type = selectors
            .employment_type
            .as_ref()
            .and_then(|s| first_text(container, s));
        let requirements = selectors
            .requirements
            .as_ref()
            .and_then(|s| all_texts(container, s));
        let benefits = selectors
            .benefits
            .as_ref()
            .and_then(|s| all_texts(container, s));

        JobRecord {
            id: job_id(&target.name, &title, &location),
            title,
            company: target.name.clone(),
            location,
            description,
            url,
            posted_date: scraped_at,
            salary_min,
            salary_max,
            employment_type,
            requirements,
            benefits,
            scraped_at,
        }
    }
}

/// Visible text of an element, whitespace-collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(container: ElementRef<'_>, selector: &Selector) -> Option<String> {
    container
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn all_texts(container: ElementRef<'_>, selector: &Selector) -> Option<Vec<String>> {
    let items: Vec<String> = container
        .select(selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
