//! HTML extraction of product records
//!
//! This module turns a fetched product page into a `ProductRecord`:
//! - product name, rating, description, availability
//! - reviews with per-review star ratings
//! - gallery image URLs resolved against the site origin
//! - specification table, prices and colour variants
//!
//! Only the product name is mandatory. A page without one is not a product
//! page and is rejected with `ExtractionError::MissingField`; every other
//! field degrades to empty or absent.

use crate::product::{Price, ProductRecord, Review};
use crate::url::resolve_image_url;
use crate::ExtractionError;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Parses raw page bytes into a product record
///
/// Implementations are pure: same input, same output, no side effects.
pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str, html: &[u8]) -> Result<ProductRecord, ExtractionError>;
}

const NAME: &str =
    ".product-variant-second.product-variant-tab-first.rs-zoom.rs-product > div > div > div > div > h1";
const RATING: &str = ".product-rating__score";
const REVIEW: &str = ".product-review-item";
const REVIEW_STARS: &str = ".rating-stars__act";
const GALLERY_IMAGE: &str = "div.product-gallery > div > .swiper-wrapper > .swiper-slide img";
const DESCRIPTION: &str = "div[id=\"tab-description\"]";
const SPEC_ROW: &str = "div[id=\"tab-property\"] > ul.product-chars > li";
const SPEC_KEY: &str = "div > div:nth-child(1)";
const SPEC_VALUE: &str = "div > div:nth-child(2)";
const PRICE_CASH: &str = "span.rs-price-new";
const PRICE_CARD: &str = "span.rs-price-old";
const AVAILABLE: &str = ".available_item";
const NOT_AVAILABLE: &str = ".not_available_item";
const VARIANT_COLOR: &str = "ul.item-product-choose li div > input[data-property-id=\"Цвет\"]";

/// Extractor for the site's product page markup
#[derive(Debug)]
pub struct SiteExtractor {
    base_url: Url,
    name: Selector,
    rating: Selector,
    review: Selector,
    review_stars: Selector,
    gallery_image: Selector,
    description: Selector,
    spec_row: Selector,
    spec_key: Selector,
    spec_value: Selector,
    price_cash: Selector,
    price_card: Selector,
    available: Selector,
    not_available: Selector,
    variant_color: Selector,
}

impl SiteExtractor {
    /// Compiles the selectors once; gallery paths resolve against `base_url`
    pub fn new(base_url: Url) -> Result<Self, ExtractionError> {
        Ok(Self {
            base_url,
            name: selector(NAME)?,
            rating: selector(RATING)?,
            review: selector(REVIEW)?,
            review_stars: selector(REVIEW_STARS)?,
            gallery_image: selector(GALLERY_IMAGE)?,
            description: selector(DESCRIPTION)?,
            spec_row: selector(SPEC_ROW)?,
            spec_key: selector(SPEC_KEY)?,
            spec_value: selector(SPEC_VALUE)?,
            price_cash: selector(PRICE_CASH)?,
            price_card: selector(PRICE_CARD)?,
            available: selector(AVAILABLE)?,
            not_available: selector(NOT_AVAILABLE)?,
            variant_color: selector(VARIANT_COLOR)?,
        })
    }

    fn extract_reviews(&self, document: &Html) -> Vec<Review> {
        document
            .select(&self.review)
            .map(|element| Review {
                text: element_text(&element),
                rating: element
                    .select(&self.review_stars)
                    .next()
                    .and_then(|stars| stars.value().attr("style"))
                    .and_then(parse_star_width),
            })
            .collect()
    }

    fn extract_gallery(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.gallery_image)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| resolve_image_url(&self.base_url, src))
            .collect()
    }

    fn extract_specifications(&self, document: &Html) -> BTreeMap<String, String> {
        let mut specifications = BTreeMap::new();

        for row in document.select(&self.spec_row) {
            let key = row
                .select(&self.spec_key)
                .next()
                .map(|cell| own_text(&cell))
                .unwrap_or_default();
            if key.is_empty() {
                continue;
            }

            let value = row
                .select(&self.spec_value)
                .next()
                .map(|cell| element_text(&cell))
                .unwrap_or_default();

            specifications.insert(key, value);
        }

        specifications
    }

    fn extract_variants(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.variant_color)
            .filter_map(|input| input.value().attr("value"))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Extractor for SiteExtractor {
    fn extract(&self, url: &str, html: &[u8]) -> Result<ProductRecord, ExtractionError> {
        let html = String::from_utf8_lossy(html);
        let document = Html::parse_document(&html);

        let product_name = first_text(&document, &self.name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ExtractionError::MissingField {
                url: url.to_string(),
                field: "product name",
            })?;

        let rating = first_text(&document, &self.rating).and_then(|text| parse_rating(&text));

        let availability = first_text(&document, &self.available)
            .filter(|text| !text.is_empty())
            .or_else(|| first_text(&document, &self.not_available))
            .unwrap_or_default();

        Ok(ProductRecord {
            url: url.to_string(),
            product_name,
            rating,
            reviews: self.extract_reviews(&document),
            gallery: self.extract_gallery(&document),
            description: first_text(&document, &self.description).unwrap_or_default(),
            specifications: self.extract_specifications(&document),
            price: Price {
                cash: first_inner_html(&document, &self.price_cash),
                card: first_inner_html(&document, &self.price_card),
            },
            availability,
            variants: self.extract_variants(&document),
        })
    }
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Selector {
        selector: css.to_string(),
        cause: e.to_string(),
    })
}

/// Trimmed text of all elements matching `selector`, concatenated
///
/// None when nothing matches.
fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    let mut matches = document.select(selector).peekable();
    matches.peek()?;
    let text: String = matches.flat_map(|element| element.text()).collect();
    Some(text.trim().to_string())
}

/// Trimmed inner HTML of the first match, None when absent or empty
fn first_inner_html(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|element| element.inner_html().trim().to_string())
        .filter(|html| !html.is_empty())
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the element's direct text-node children only
fn own_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|text| text.to_string()))
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_rating(text: &str) -> Option<f64> {
    leading_number(text)
}

/// Converts a `width: NN%` star bar into a 0-5 rating
fn parse_star_width(style: &str) -> Option<f64> {
    let (_, after) = style.split_once("width")?;
    let after = after.trim_start().strip_prefix(':')?;
    let percent = leading_number(after)?;
    Some(percent / 100.0 * 5.0)
}

/// The number at the start of `text`, ignoring whatever follows it
///
/// Accepts an optional sign and either `.` or `,` as the decimal separator,
/// so `"4,5 из 5"` reads as 4.5.
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let mut number = String::new();
    let mut seen_digit = false;
    let mut seen_separator = false;

    for (i, c) in text.char_indices() {
        match c {
            '+' | '-' if i == 0 => number.push(c),
            '0'..='9' => {
                number.push(c);
                seen_digit = true;
            }
            '.' | ',' if !seen_separator => {
                number.push('.');
                seen_separator = true;
            }
            _ => break,
        }
    }

    if !seen_digit {
        return None;
    }

    number
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
