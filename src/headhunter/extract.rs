//! Field lookups on HeadHunter pages.
//!
//! Every lookup is best-effort: a missing element gives `None` (or a default), never an error.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::JobRecord;

const PAGE_QUERY: &str = "disableBrowserCache=true&hhtmFrom=vacancy_search_list";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static CATEGORY_ITEM: LazyLock<Selector> =
    LazyLock::new(|| selector("ul.multiple-column-list li.multiple-column-list-item"));
static CATEGORY_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.bloko-link"));
static PAGER_PAGE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a.bloko-button[data-qa="pager-page"]"#));
static LISTING_LINK: LazyLock<Selector> = LazyLock::new(|| selector(LISTING_LINK_CSS));
static VACANCY_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("div.vacancy-title"));
static TITLE_HEADER: LazyLock<Selector> = LazyLock::new(|| selector("h1.bloko-header-section-1"));
static COMPANY_NAME: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        r#"span[class="bloko-header-section-2 bloko-header-section-2_lite"][data-qa="bloko-header-2"]"#,
    )
});
static ADDRESS: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"span[data-qa="vacancy-view-raw-address"]"#));
static EXPERIENCE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"span[data-qa="vacancy-experience"]"#));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| selector("div.g-user-content"));
static SKILL_TAG: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"div[class="bloko-tag bloko-tag_inline"]"#));

/// Links to listings on a search result page, rendering is done once these show up.
pub const LISTING_LINK_CSS: &str = r#"a.serp-item__title[data-qa="serp-item__title"]"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: Url,
}

/// Categories listed on the index page at `base`, in page order.
///
/// A name seen twice keeps its first position and the last link.
pub fn parse_categories(base: &Url, html: &str) -> Vec<Category> {
    let document = Html::parse_document(html);
    let mut categories: Vec<Category> = Vec::new();
    for item in document.select(&CATEGORY_ITEM) {
        let Some(href) = item
            .select(&CATEGORY_LINK)
            .next()
            .and_then(|link| link.value().attr("href"))
        else {
            tracing::debug!("category item without link, skipping");
            continue;
        };
        let url = match base.join(href) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(href, "invalid category link: {}", err);
                continue;
            }
        };
        let name = text(item).trim().to_string();
        match categories.iter_mut().find(|category| category.name == name) {
            Some(existing) => existing.url = url,
            None => categories.push(Category { name, url }),
        }
    }
    categories
}

/// Number of result pages, taken from the last pager button. Defaults to 1.
pub fn max_page(html: &str) -> usize {
    let document = Html::parse_document(html);
    document
        .select(&PAGER_PAGE)
        .last()
        .and_then(|page| text(page).trim().parse().ok())
        .unwrap_or(1)
}

/// URL of the zero-based result page `page` of a category search.
pub fn page_url(search_url: &str, page: usize) -> String {
    let separator = if search_url.contains('?') { '&' } else { '?' };
    format!("{search_url}{separator}page={page}&{PAGE_QUERY}")
}

/// Links to the individual listings on a search result page.
pub fn listing_links(page_url: &Url, html: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    document
        .select(&LISTING_LINK)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| match page_url.join(href) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::debug!(href, "invalid listing link: {}", err);
                None
            }
        })
        .collect()
}

/// The first eight characters after `/vacancy/`.
pub fn vacancy_id(url: &str) -> Option<String> {
    url.split("/vacancy/")
        .nth(1)
        .map(|rest| rest.chars().take(8).collect())
}

pub fn job_title(document: &Html) -> Option<String> {
    document
        .select(&VACANCY_TITLE)
        .next()?
        .select(&TITLE_HEADER)
        .next()
        .map(text)
}

pub fn company_name(document: &Html) -> Option<String> {
    first_text(document, &COMPANY_NAME).map(|name| without_nbsp(&name))
}

pub fn job_location(document: &Html) -> Option<String> {
    first_text(document, &ADDRESS)
}

pub fn required_experience(document: &Html) -> Option<String> {
    first_text(document, &EXPERIENCE)
}

pub fn job_description(document: &Html) -> Option<String> {
    first_text(document, &DESCRIPTION)
}

/// Skill tags, capitalized and joined with `", "`. Empty when the listing has none.
pub fn required_skills(document: &Html) -> Option<String> {
    let skills: Vec<String> = document
        .select(&SKILL_TAG)
        .map(|tag| capitalize(&without_nbsp(&text(tag))))
        .collect();
    Some(skills.join(", "))
}

/// Builds the record of the listing at `url` found under the category `job_market`.
pub fn parse_listing(url: &str, html: &str, job_market: &str) -> JobRecord {
    let document = Html::parse_document(html);
    JobRecord {
        id: vacancy_id(url),
        job_title: job_title(&document),
        company_name: company_name(&document),
        location: job_location(&document),
        required_experience: required_experience(&document),
        job_market: job_market.to_string(),
        description: job_description(&document),
        required_skills: required_skills(&document),
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(text)
}

fn text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn without_nbsp(text: &str) -> String {
    text.replace('\u{a0}', " ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
