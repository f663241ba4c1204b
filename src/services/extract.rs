// src/services/extract.rs

//! Structural extraction from fetched pages.
//!
//! Pure functions from a parsed document or a backend JSON payload to
//! domain records. No network or retry concerns; selectors come from
//! configuration.

use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Category, Offer, Product, SelectorConfig, Shop};

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Collect an element's text with collapsed whitespace.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the category tree from the catalog root page.
///
/// Selects the top-level section blocks; each yields a parent category from
/// its name/link elements and one child category per nested subsection,
/// referencing that parent. Returns the children in document order.
pub fn extract_categories(document: &Html, selectors: &SelectorConfig) -> Result<Vec<Category>> {
    let section_sel = parse_selector(&selectors.section)?;
    let name_sel = parse_selector(&selectors.section_name)?;
    let link_sel = parse_selector(&selectors.section_link)?;
    let subsection_sel = parse_selector(&selectors.subsection)?;

    let mut categories = Vec::new();

    for section in document.select(&section_sel) {
        let Some(name_elem) = section.select(&name_sel).next() else {
            continue;
        };
        let Some(link) = section
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        let parent = Arc::new(Category::root(element_text(name_elem), link));

        for subsection in section.select(&subsection_sel) {
            let Some(href) = subsection
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };

            categories.push(Category::child(
                element_text(subsection),
                href,
                Arc::clone(&parent),
            ));
        }
    }

    Ok(categories)
}

/// Extract product identifiers from a listing page, in document order.
pub fn extract_product_ids(document: &Html, selectors: &SelectorConfig) -> Result<Vec<String>> {
    let card_sel = parse_selector(&selectors.product_card)?;

    Ok(document
        .select(&card_sel)
        .filter_map(|card| card.value().attr(&selectors.product_id_attr))
        .map(str::to_string)
        .collect())
}

/// Map an offer-detail payload into an `Offer`.
///
/// Missing optional fields stay unset rather than failing.
pub fn extract_offer(raw: &Value) -> Offer {
    let shops = raw
        .pointer("/availability_info/offer_store_amount")
        .and_then(Value::as_array)
        .map(|stores| {
            stores
                .iter()
                .map(|store| Shop {
                    address: store
                        .get("address")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    availability: store
                        .pointer("/availability/text")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    Offer {
        code: raw.get("code").and_then(Value::as_str).map(str::to_string),
        size: raw.get("size").and_then(Value::as_str).map(str::to_string),
        price: raw.get("retail_price").and_then(Value::as_f64),
        discount_price: raw.get("discount_price").and_then(Value::as_f64),
        shops,
    }
}

/// Map a product-detail payload into a `Product` without offers, plus the
/// offer ids to resolve separately (one backend call per offer).
pub fn extract_product(raw: &Value) -> Result<(Product, Vec<String>)> {
    let id = raw
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| AppError::validation("product payload missing numeric 'id'"))?;

    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let offer_ids = raw
        .get("offers")
        .and_then(Value::as_array)
        .map(|offers| {
            offers
                .iter()
                .filter_map(|offer| offer.get("id"))
                .filter_map(|id| match id {
                    Value::Number(n) => Some(n.to_string()),
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok((
        Product {
            id,
            name,
            offers: Vec::new(),
        },
        offer_ids,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG_FIXTURE: &str = r#"
        <div class="catalogue">
            <div class="section_info">
                <div class="name">Кошки</div>
                <a href="/catalogue/koshki/"></a>
                <div class="sect"><a href="/catalogue/koshki/korm/">Корм для кошек</a></div>
                <div class="sect"><a href="/catalogue/koshki/igrushki/">Игрушки</a></div>
                <div class="sect"><a href="/catalogue/koshki/lotki/">Лотки</a></div>
            </div>
            <div class="section_info">
                <div class="name">Собаки</div>
                <a href="/catalogue/sobaki/"></a>
            </div>
        </div>
    "#;

    const LISTING_FIXTURE: &str = r#"
        <div class="catalog-list">
            <div class="bth-card-element" data-product-id="101"></div>
            <div class="bth-card-element" data-product-id="202"></div>
            <div class="bth-card-element" data-product-id="303"></div>
            <div class="other-card" data-product-id="999"></div>
        </div>
    "#;

    #[test]
    fn test_extract_categories_parent_links() {
        let document = Html::parse_document(CATALOG_FIXTURE);
        let categories =
            extract_categories(&document, &SelectorConfig::default()).unwrap();

        assert_eq!(categories.len(), 3);
        assert_eq!(categories[0].name, "Корм для кошек");
        assert_eq!(categories[0].url, "/catalogue/koshki/korm/");
        assert_eq!(categories[2].url, "/catalogue/koshki/lotki/");

        for category in &categories {
            let parent = category.parent.as_deref().unwrap();
            assert_eq!(parent.name, "Кошки");
            assert_eq!(parent.url, "/catalogue/koshki/");
        }
    }

    #[test]
    fn test_extract_categories_empty_document() {
        let document = Html::parse_document("<html><body></body></html>");
        let categories =
            extract_categories(&document, &SelectorConfig::default()).unwrap();
        assert!(categories.is_empty());
    }

    #[test]
    fn test_extract_product_ids_in_document_order() {
        let document = Html::parse_document(LISTING_FIXTURE);
        let ids = extract_product_ids(&document, &SelectorConfig::default()).unwrap();
        assert_eq!(ids, vec!["101", "202", "303"]);
    }

    #[test]
    fn test_extract_offer_full_payload() {
        let raw = json!({
            "code": "BTH-1",
            "size": "2 кг",
            "retail_price": 1190.0,
            "discount_price": 990.0,
            "availability_info": {
                "offer_store_amount": [
                    {
                        "address": "Москва, ул. Ленина 1",
                        "availability": {"text": "в наличии"}
                    }
                ]
            }
        });

        let offer = extract_offer(&raw);
        assert_eq!(offer.code.as_deref(), Some("BTH-1"));
        assert_eq!(offer.price, Some(1190.0));
        assert_eq!(offer.shops.len(), 1);
        assert_eq!(offer.shops[0].availability.as_deref(), Some("в наличии"));
    }

    #[test]
    fn test_extract_offer_missing_fields_stay_unset() {
        let offer = extract_offer(&json!({"code": "BTH-2"}));
        assert_eq!(offer.code.as_deref(), Some("BTH-2"));
        assert!(offer.size.is_none());
        assert!(offer.price.is_none());
        assert!(offer.shops.is_empty());
    }

    #[test]
    fn test_extract_product_with_offer_ids() {
        let raw = json!({
            "id": 101,
            "name": "Корм сухой",
            "offers": [{"id": 7}, {"id": 8}]
        });

        let (product, offer_ids) = extract_product(&raw).unwrap();
        assert_eq!(product.id, 101);
        assert_eq!(product.name, "Корм сухой");
        assert!(product.offers.is_empty());
        assert_eq!(offer_ids, vec!["7", "8"]);
    }

    #[test]
    fn test_extract_product_requires_id() {
        assert!(extract_product(&json!({"name": "без id"})).is_err());
    }
}
