use adwatch_core::AppError;
use scraper::{Html, Selector};

// Default selectors match the markup of the classified-ad site this watcher
// was built against; the class names appear inside longer generated class
// attributes, hence the substring match.
const DEFAULT_TITLE_SELECTOR: &str = r#"[class*="title-info-title-text"]"#;
const DEFAULT_PRICE_SELECTOR: &str = r#"[class*="js-item-price"]"#;

/// Pulls the title and price out of a rendered listing page.
#[derive(Clone, Debug)]
pub struct ListingParser {
    title: Selector,
    price: Selector,
}

impl ListingParser {
    /// Parser with the default ad-site selectors.
    pub fn new() -> Result<Self, AppError> {
        Self::with_selectors(DEFAULT_TITLE_SELECTOR, DEFAULT_PRICE_SELECTOR)
    }

    /// Parser with custom CSS selectors for the title and price elements.
    pub fn with_selectors(title: &str, price: &str) -> Result<Self, AppError> {
        Ok(Self {
            title: Selector::parse(title)
                .map_err(|e| AppError::Config(format!("bad title selector {title:?}: {e}")))?,
            price: Selector::parse(price)
                .map_err(|e| AppError::Config(format!("bad price selector {price:?}: {e}")))?,
        })
    }

    /// Extract `(title, price)` from page HTML.
    pub fn parse(&self, html: &str) -> Result<(String, f64), AppError> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .ok_or_else(|| AppError::Extraction("title element not found".into()))?
            .text()
            .collect::<String>()
            .trim()
            .to_string();

        let price_text = document
            .select(&self.price)
            .next()
            .ok_or_else(|| AppError::Extraction("price element not found".into()))?
            .text()
            .collect::<String>();

        Ok((title, parse_price(&price_text)?))
    }
}

/// Listing pages render prices with currency signs and thousands separators
/// ("1 250 000 ₽"); keep the digits only.
fn parse_price(raw: &str) -> Result<f64, AppError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(AppError::Extraction(format!(
            "no digits in price text {raw:?}"
        )));
    }
    digits
        .parse::<f64>()
        .map_err(|e| AppError::Extraction(format!("price {digits:?}: {e}")))
}
