//! DOM extraction of search results and posting details.
//!
//! Works on the rendered HTML handed over by the browser session, so it is
//! pure and testable against saved pages. Every field is read through the
//! selector table of the [`SiteProfile`]: candidates are tried in order and
//! the first one passing the field's plausibility rule wins.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use htmd::HtmlToMarkdown;
use jobscout_core::error::AppError;
use jobscout_core::identifier::JobId;
use jobscout_core::location::parse_location_line;
use jobscout_core::models::{PostingRecord, WorkType};
use jobscout_core::site::{FieldRule, SiteProfile};
use jobscout_core::traits::PageExtractor;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Accessible labels of skill rows, e.g. "Your profile has Rust as a skill"
/// or "Your profile does not show Kafka as a skill".
static SKILL_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:has|shows?)\s+(.+?)\s+as\s+an?\s+skill\b").unwrap()
});

const MAX_SKILL_CHARS: usize = 80;

#[derive(Clone)]
pub struct DomExtractor {
    profile: Arc<SiteProfile>,
    converter: Arc<HtmlToMarkdown>,
}

impl DomExtractor {
    pub fn new(profile: Arc<SiteProfile>) -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "button", "svg", "noscript", "iframe", "img",
            ])
            .build();
        Self {
            profile,
            converter: Arc::new(converter),
        }
    }

    fn field(&self, doc: &Html, rule: &FieldRule) -> String {
        for raw in &rule.selectors {
            let Some(selector) = compile(raw) else {
                continue;
            };
            for element in doc.select(&selector) {
                let candidate = match &rule.attribute {
                    Some(attr) => element
                        .value()
                        .attr(attr)
                        .map(str::trim)
                        .unwrap_or_default()
                        .to_string(),
                    None => visible_text(element),
                };
                if rule.plausibility.accepts(&candidate) {
                    return candidate;
                }
            }
        }
        String::new()
    }

    fn description(&self, doc: &Html) -> String {
        let rule = &self.profile.detail.description;
        for raw in &rule.selectors {
            let Some(selector) = compile(raw) else {
                continue;
            };
            for element in doc.select(&selector) {
                let text = match self.converter.convert(&element.inner_html()) {
                    Ok(text) => text.trim().to_string(),
                    Err(e) => {
                        tracing::debug!(selector = %raw, error = %e, "Could not convert description");
                        continue;
                    }
                };
                if rule.plausibility.accepts(&text) {
                    return text;
                }
            }
        }
        String::new()
    }

    fn skills(&self, doc: &Html) -> BTreeSet<String> {
        let detail = &self.profile.detail;
        let Some(items) = compile_group(&detail.skill_items) else {
            return BTreeSet::new();
        };

        let scopes: Vec<ElementRef<'_>> = match compile_group(&detail.skills_modal) {
            Some(modal) => doc.select(&modal).collect(),
            None => Vec::new(),
        };
        let from_scope = |root: ElementRef<'_>| -> Vec<String> {
            root.select(&items).filter_map(skill_name).collect()
        };

        let mut skills: BTreeSet<String> = scopes.into_iter().flat_map(&from_scope).collect();
        if skills.is_empty() {
            skills = from_scope(doc.root_element()).into_iter().collect();
        }
        skills
    }

    fn work_type(&self, doc: &Html) -> WorkType {
        let detail = &self.profile.detail;
        let texts = [&detail.skills_modal, &detail.insights]
            .into_iter()
            .filter_map(|group| compile_group(group))
            .map(|selector| {
                doc.select(&selector)
                    .map(visible_text)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            });

        for text in texts {
            let found = detail
                .work_type_phrases
                .iter()
                .find(|p| text.contains(&p.phrase.to_lowercase()));
            if let Some(phrase) = found {
                return phrase.work_type;
            }
        }
        WorkType::Unspecified
    }
}

impl PageExtractor for DomExtractor {
    fn search_results(&self, html: &str) -> Vec<String> {
        let Some(links) = compile_group(&self.profile.search.job_links) else {
            return Vec::new();
        };
        let doc = Html::parse_document(html);

        let mut seen = HashSet::new();
        doc.select(&links)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.profile.absolute_url(href))
            .filter(|url| match JobId::from_url(url) {
                Some(id) => seen.insert(id),
                None => false,
            })
            .collect()
    }

    fn extract(
        &self,
        html: &str,
        url: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<PostingRecord, AppError> {
        let job_id = JobId::from_url(url)
            .ok_or_else(|| AppError::ExtractionEmpty(format!("no job id in {url}")))?;
        let doc = Html::parse_document(html);
        let detail = &self.profile.detail;

        let title = self.field(&doc, &detail.title);
        let company_name = self.field(&doc, &detail.company);
        if title.is_empty() && company_name.is_empty() {
            return Err(AppError::ExtractionEmpty(format!(
                "posting {job_id} has neither title nor company"
            )));
        }

        let location_raw = self.field(&doc, &detail.location);
        let info = parse_location_line(&location_raw, captured_at);
        // Postings without an external apply link are applied to in place.
        let apply_href = self.field(&doc, &detail.apply_url);
        let apply_url = if apply_href.is_empty() {
            url.to_string()
        } else {
            self.profile
                .absolute_url(&apply_href)
                .unwrap_or_else(|| url.to_string())
        };

        Ok(PostingRecord {
            job_id,
            title,
            company_name,
            location: info.location,
            location_raw,
            posted_at: info.posted_at,
            applicants: info.applicants,
            description: self.description(&doc),
            apply_url,
            work_type: self.work_type(&doc),
            skills: self.skills(&doc),
            captured_at,
        })
    }
}

fn compile(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!(selector = %raw, error = ?e, "Skipping invalid selector");
            None
        }
    }
}

/// One selector list out of the valid members of `raws`, matching in
/// document order.
fn compile_group(raws: &[String]) -> Option<Selector> {
    let valid: Vec<&str> = raws
        .iter()
        .map(String::as_str)
        .filter(|raw| compile(raw).is_some())
        .collect();
    if valid.is_empty() {
        return None;
    }
    Selector::parse(&valid.join(", ")).ok()
}

/// Element text with whitespace runs collapsed.
fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn skill_name(item: ElementRef<'_>) -> Option<String> {
    let labelled = std::iter::once(item)
        .chain(item.descendants().filter_map(ElementRef::wrap))
        .filter_map(|e| e.value().attr("aria-label"))
        .find_map(|label| {
            SKILL_LABEL_RE
                .captures(label)
                .map(|caps| caps[1].trim().to_string())
        });

    let name = labelled.or_else(|| {
        item.text()
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    })?;
    (!name.is_empty() && name.chars().count() <= MAX_SKILL_CHARS).then_some(name)
}
