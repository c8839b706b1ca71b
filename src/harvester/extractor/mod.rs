#[cfg(test)]
mod tests;

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Name used when a detail page has no `h1`
pub const DEFAULT_ITEM_NAME: &str = "Unknown";

/// Breadcrumb labels too generic to be a sub-category
const BREADCRUMB_DENYLIST: [&str; 4] = ["accueil", "home", "boutique", "shop"];

static ITEM_LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.woocommerce-LoopProduct-link[href]").expect("valid selector")
});
static NAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static PRICE_BEFORE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("del bdi").expect("valid selector"));
static SALE_PRICE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ins bdi").expect("valid selector"));
static REGULAR_PRICE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.price bdi").expect("valid selector"));
static DISCOUNT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.onsale").expect("valid selector"));
static CATEGORY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.product_meta span.posted_in a").expect("valid selector")
});
static BREADCRUMB_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("nav.woocommerce-breadcrumb a").expect("valid selector"));
static DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.electro-description").expect("valid selector"));
static GALLERY_IMAGE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".woocommerce-product-gallery__wrapper img[src]").expect("valid selector")
});

/// Fields read from one product detail page. Missing markup leaves a field empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    pub name: String,
    pub price_before: Option<String>,
    pub price_after: Option<String>,
    pub discount: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub description: Option<String>,
    /// Raw `src` attributes of the gallery, first-seen order, without duplicates
    pub image_sources: Vec<String>,
}

/// Item detail links of a listing page, resolved against `page_url`,
/// de-duplicated in first-seen order
#[inline]
pub fn extract_item_links(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);

    let links: Vec<String> = document
        .select(&ITEM_LINK_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| match page_url.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!("Skipping unresolvable item link '{}': {}", href, e);
                None
            }
        })
        .unique()
        .collect();

    debug!("Found {} item links on {}", links.len(), page_url);
    links
}

/// Read the product fields of a detail page
#[inline]
pub fn extract_product(html: &str) -> ProductPage {
    let document = Html::parse_document(html);

    let name =
        first_text(&document, &NAME_SELECTOR).unwrap_or_else(|| DEFAULT_ITEM_NAME.to_string());
    let price_after = first_text(&document, &SALE_PRICE_SELECTOR)
        .or_else(|| first_text(&document, &REGULAR_PRICE_SELECTOR));

    ProductPage {
        name,
        price_before: first_text(&document, &PRICE_BEFORE_SELECTOR),
        price_after,
        discount: first_text(&document, &DISCOUNT_SELECTOR),
        category: first_text(&document, &CATEGORY_SELECTOR),
        sub_category: extract_sub_category(&document),
        description: first_text(&document, &DESCRIPTION_SELECTOR),
        image_sources: extract_image_sources(&document),
    }
}

fn extract_sub_category(document: &Html) -> Option<String> {
    let last = document.select(&BREADCRUMB_SELECTOR).last()?;
    let label = clean_text(last)?;

    if BREADCRUMB_DENYLIST.contains(&label.to_lowercase().as_str()) {
        return None;
    }
    Some(label)
}

fn extract_image_sources(document: &Html) -> Vec<String> {
    document
        .select(&GALLERY_IMAGE_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().and_then(clean_text)
}

/// Whitespace-collapsed text content; `None` when nothing is left
#[inline]
pub fn clean_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().flat_map(str::split_whitespace).join(" ");
    (!text.is_empty()).then_some(text)
}
