//! Link resolution: period → download URL from a fund page.
//!
//! A download link is recognised by three query parameters: the fund
//! identifier, the fund type (fixed to the institution's retail-fund value) and
//! the period length in months. Only configured periods are kept, and when the
//! page carries several links for one period the last one in document order
//! wins.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::domain::{LinkMap, Period};

/// Query markers identifying a per-period download link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkPattern {
    /// Fixed origin that root-relative targets are joined to.
    pub origin: Url,
    pub id_param: String,
    pub type_param: String,
    /// Value of `type_param` denoting the institution's retail funds.
    pub type_value: String,
    pub period_param: String,
}

impl Default for LinkPattern {
    fn default() -> Self {
        Self {
            origin: Url::parse("https://www.uniqa.pl").expect("static origin is a valid URL"),
            id_param: "fundId".into(),
            type_param: "fundType".into(),
            type_value: "FIO".into(),
            period_param: "period".into(),
        }
    }
}

impl LinkPattern {
    /// Period carried by `url`, if it has all three markers.
    pub fn match_period(&self, url: &Url) -> Option<u32> {
        let mut has_id = false;
        let mut has_type = false;
        let mut period = None;

        for (key, value) in url.query_pairs() {
            if key.eq_ignore_ascii_case(&self.id_param) && !value.trim().is_empty() {
                has_id = true;
            } else if key.eq_ignore_ascii_case(&self.type_param)
                && value.trim().eq_ignore_ascii_case(&self.type_value)
            {
                has_type = true;
            } else if key.eq_ignore_ascii_case(&self.period_param) {
                period = value.trim().parse::<u32>().ok();
            }
        }

        if has_id && has_type {
            period
        } else {
            None
        }
    }

    /// Resolve an `href` to an absolute URL.
    ///
    /// - `/path` → joined to the fixed origin
    /// - `//host/path` → host and path kept, scheme taken from the page
    /// - `https://…` → as is
    /// - anything else → joined against the page URL
    pub fn resolve_target(&self, href: &str, page: &Url) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        if href.starts_with("//") {
            return Url::parse(&format!("{}:{href}", page.scheme())).ok();
        }
        if href.starts_with('/') {
            return self.origin.join(href).ok();
        }
        match Url::parse(href) {
            Ok(absolute) => Some(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => page.join(href).ok(),
            Err(_) => None,
        }
    }
}

/// Scan every hyperlink on the page and build the period → URL map.
///
/// Periods without a candidate are simply absent; the completeness validator
/// reports them later.
pub fn resolve_links(
    html: &str,
    page: &Url,
    pattern: &LinkPattern,
    periods: &[Period],
) -> LinkMap {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("static selector is valid");

    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let url = pattern.resolve_target(href, page)?;
            let months = pattern.match_period(&url)?;
            let period = Period(months);
            if periods.contains(&period) {
                Some((period, url))
            } else {
                debug!(%url, months, "ignoring link for unconfigured period");
                None
            }
        })
        .fold(LinkMap::new(), |mut links, (period, url)| {
            if let Some(previous) = links.insert(period, url) {
                debug!(%period, %previous, "later link overrides earlier one");
            }
            links
        })
}
