//! Site profile: URLs and DOM selectors of the target site.
//!
//! Selectors drift with every redesign of the site, so they are data rather
//! than code. The built-in profile can be overridden field by field from a
//! JSON file; anything left out keeps its default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::identifier::JobId;
use crate::models::WorkType;
use crate::traits::{ReadyProbe, Readiness};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Acceptance test for a candidate text value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plausibility {
    pub min_chars: usize,
    pub max_chars: usize,
    /// Case-insensitive substrings that disqualify a candidate.
    pub reject_phrases: Vec<String>,
}

impl Default for Plausibility {
    fn default() -> Self {
        Self {
            min_chars: 1,
            max_chars: usize::MAX,
            reject_phrases: Vec::new(),
        }
    }
}

impl Plausibility {
    pub fn new(min_chars: usize, max_chars: usize) -> Self {
        Self {
            min_chars,
            max_chars,
            reject_phrases: Vec::new(),
        }
    }

    pub fn rejecting(mut self, phrases: &[&str]) -> Self {
        self.reject_phrases = strings(phrases);
        self
    }

    pub fn accepts(&self, text: &str) -> bool {
        let len = text.chars().count();
        if len < self.min_chars || len > self.max_chars {
            return false;
        }
        let lower = text.to_lowercase();
        !self
            .reject_phrases
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
    }
}

/// Ordered candidate selectors for one field plus its plausibility rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRule {
    pub selectors: Vec<String>,
    /// Read this attribute instead of the element text.
    pub attribute: Option<String>,
    pub plausibility: Plausibility,
}

impl FieldRule {
    pub fn new(selectors: &[&str], plausibility: Plausibility) -> Self {
        Self {
            selectors: strings(selectors),
            attribute: None,
            plausibility,
        }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.attribute = Some(name.to_string());
        self
    }
}

/// A fixed phrase that reveals the work type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTypePhrase {
    pub phrase: String,
    pub work_type: WorkType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    /// Navigation chrome only shown to signed-in users.
    pub nav: Vec<String>,
    pub form: Vec<String>,
    pub username: String,
    pub password: String,
    pub submit: String,
    pub error: Vec<String>,
    pub challenge: Vec<String>,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            nav: strings(&["#global-nav", "nav.global-nav", ".global-nav__content"]),
            form: strings(&["form.login__form", "#username", "input[name=\"session_key\"]"]),
            username: "#username".to_string(),
            password: "#password".to_string(),
            submit: "button[type=\"submit\"]".to_string(),
            error: strings(&[
                "#error-for-username:not(.hidden)",
                "#error-for-password:not(.hidden)",
                ".form__label--error",
                ".alert-content",
            ]),
            challenge: strings(&[
                "#input__email_verification_pin",
                "#input__phone_verification_pin",
                "#captcha-internal",
                "form#email-pin-challenge",
                ".challenge-dialog",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSelectors {
    pub results: Vec<String>,
    pub job_links: Vec<String>,
    pub no_results: Vec<String>,
    /// Scrollable pane holding the result cards (lazy loaded).
    pub results_pane: Vec<String>,
}

impl Default for SearchSelectors {
    fn default() -> Self {
        Self {
            results: strings(&[
                ".jobs-search-results-list",
                ".scaffold-layout__list",
                "ul.jobs-search__results-list",
                "[data-job-id]",
            ]),
            job_links: strings(&[
                "a.job-card-container__link[href]",
                "a.job-card-list__title[href]",
                "a.base-card__full-link[href]",
                "a[href*=\"/jobs/view/\"]",
            ]),
            no_results: strings(&[
                ".jobs-search-no-results-banner",
                ".jobs-search-two-pane__no-results-banner--expand",
                ".artdeco-empty-state",
            ]),
            results_pane: strings(&[".jobs-search-results-list", ".scaffold-layout__list > div"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    pub title: FieldRule,
    pub company: FieldRule,
    pub location: FieldRule,
    pub description: FieldRule,
    pub apply_url: FieldRule,
    pub not_found: Vec<String>,
    pub show_more: Vec<String>,
    pub skills_opener: Vec<String>,
    pub skills_modal: Vec<String>,
    pub skill_items: Vec<String>,
    /// Containers outside the modal that may carry work-type phrases.
    pub insights: Vec<String>,
    pub work_type_phrases: Vec<WorkTypePhrase>,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        let role_phrases = [
            "responsible for",
            "we are looking",
            "you will",
            "about the job",
            "ansvarlig for",
            "vi søger",
        ];
        Self {
            title: FieldRule::new(
                &[
                    ".job-details-jobs-unified-top-card__job-title h1",
                    ".job-details-jobs-unified-top-card__job-title",
                    ".jobs-unified-top-card__job-title",
                    ".top-card-layout__title",
                    "h1.t-24",
                    "h1",
                ],
                Plausibility::new(2, 200),
            ),
            company: FieldRule::new(
                &[
                    ".job-details-jobs-unified-top-card__company-name a",
                    ".job-details-jobs-unified-top-card__company-name",
                    ".jobs-unified-top-card__company-name a",
                    ".jobs-unified-top-card__company-name",
                    ".topcard__org-name-link",
                    ".jobs-details-top-card__company-url",
                ],
                Plausibility::new(1, 100).rejecting(&role_phrases),
            ),
            location: FieldRule::new(
                &[
                    ".job-details-jobs-unified-top-card__tertiary-description-container",
                    ".job-details-jobs-unified-top-card__primary-description-container",
                    ".jobs-unified-top-card__primary-description",
                    ".topcard__flavor-row",
                ],
                Plausibility::new(1, 300),
            ),
            description: FieldRule::new(
                &[
                    "#job-details",
                    ".jobs-description-content__text",
                    ".jobs-box__html-content",
                    ".jobs-description__content",
                    ".show-more-less-html__markup",
                    ".description__text",
                ],
                Plausibility::new(51, usize::MAX),
            ),
            apply_url: FieldRule::new(
                &[
                    "a.jobs-apply-button[href]",
                    ".jobs-apply-button--top-card a[href]",
                    "a.apply-button[href]",
                ],
                Plausibility::new(1, 2048),
            )
            .attribute("href"),
            not_found: strings(&[
                ".not-found-404",
                ".jobs-details__404",
                "[data-test-id=\"not-found\"]",
                ".artdeco-empty-state__headline",
            ]),
            show_more: strings(&[
                "button.jobs-description__footer-button",
                "button.show-more-less-html__button--more",
                "button[aria-label*=\"see more\" i]",
                "button[aria-label*=\"vis mere\" i]",
            ]),
            skills_opener: strings(&[
                "button.job-details-jobs-unified-top-card__job-insight-text-button",
                "a[href*=\"skills\"].app-aware-link",
                "button[aria-label*=\"skills\" i]",
                "button[aria-label*=\"kompetencer\" i]",
            ]),
            skills_modal: strings(&[
                ".job-details-skill-match-modal",
                "[data-test-modal][role=\"dialog\"]",
                "div[role=\"dialog\"]",
            ]),
            skill_items: strings(&[
                "li.job-details-skill-match-status-list__item",
                ".job-details-skill-match-status-list li",
            ]),
            insights: strings(&[
                ".job-details-preferences-and-skills",
                ".job-details-jobs-unified-top-card__job-insight",
                ".jobs-unified-top-card__workplace-type",
            ]),
            work_type_phrases: vec![
                WorkTypePhrase {
                    phrase: "remote".to_string(),
                    work_type: WorkType::Remote,
                },
                WorkTypePhrase {
                    phrase: "fjernarbejde".to_string(),
                    work_type: WorkType::Remote,
                },
                WorkTypePhrase {
                    phrase: "hybrid".to_string(),
                    work_type: WorkType::Hybrid,
                },
                WorkTypePhrase {
                    phrase: "on-site".to_string(),
                    work_type: WorkType::OnSite,
                },
                WorkTypePhrase {
                    phrase: "på stedet".to_string(),
                    work_type: WorkType::OnSite,
                },
            ],
        }
    }
}

/// URLs, timeouts and selectors of the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub base_url: String,
    pub login_path: String,
    pub search_path: String,
    /// Detail URL path; `{id}` is replaced by the job identifier.
    pub detail_path: String,
    pub ready_timeout_ms: u64,
    pub modal_timeout_ms: u64,
    pub login: LoginSelectors,
    pub search: SearchSelectors,
    pub detail: DetailSelectors,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com".to_string(),
            login_path: "/login".to_string(),
            search_path: "/jobs/search/".to_string(),
            detail_path: "/jobs/view/{id}/".to_string(),
            ready_timeout_ms: 10_000,
            modal_timeout_ms: 5_000,
            login: LoginSelectors::default(),
            search: SearchSelectors::default(),
            detail: DetailSelectors::default(),
        }
    }
}

impl SiteProfile {
    /// Load a (partial) profile from a JSON file on top of the defaults.
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read selectors {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn base(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base(), self.login_path)
    }

    /// Search surface URL for `(keywords, location, start)`.
    pub fn search_url(&self, keywords: &str, location: &str, start: usize) -> Result<String, AppError> {
        let mut url = Url::parse(&format!("{}{}", self.base(), self.search_path))
            .map_err(|e| AppError::ConfigError(format!("Invalid search URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("keywords", keywords)
            .append_pair("location", location)
            .append_pair("start", &start.to_string());
        Ok(url.to_string())
    }

    /// Canonical detail URL, reconstructed from the identifier alone.
    pub fn detail_url(&self, id: &JobId) -> String {
        format!("{}{}", self.base(), self.detail_path.replace("{id}", id.as_str()))
    }

    /// Resolve a possibly relative link found on a page.
    pub fn absolute_url(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.base()).ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn modal_timeout(&self) -> Duration {
        Duration::from_millis(self.modal_timeout_ms)
    }

    /// Readiness after navigating to the login surface.
    pub fn login_probe(&self) -> ReadyProbe {
        ReadyProbe::new(self.ready_timeout())
            .group(Readiness::Content, &self.login.nav)
            .group(Readiness::Challenge, &self.login.challenge)
            .group(Readiness::LoginRequired, &self.login.form)
    }

    /// Readiness after submitting credentials.
    pub fn login_result_probe(&self) -> ReadyProbe {
        ReadyProbe::new(self.ready_timeout())
            .group(Readiness::Content, &self.login.nav)
            .group(Readiness::Challenge, &self.login.challenge)
            .group(Readiness::ErrorSurface, &self.login.error)
    }

    pub fn search_probe(&self) -> ReadyProbe {
        ReadyProbe::new(self.ready_timeout())
            .group(Readiness::ErrorSurface, &self.search.no_results)
            .group(Readiness::Content, &self.search.results)
            .group(Readiness::LoginRequired, &self.login.form)
    }

    pub fn detail_probe(&self) -> ReadyProbe {
        ReadyProbe::new(self.ready_timeout())
            .group(Readiness::ErrorSurface, &self.detail.not_found)
            .group(Readiness::Content, &self.detail.title.selectors)
            .group(Readiness::LoginRequired, &self.login.form)
    }
}
