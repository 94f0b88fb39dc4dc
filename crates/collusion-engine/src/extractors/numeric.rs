// Price and cost-subtotal extraction from bid text
use std::collections::BTreeMap;

use bid_types::CostCategory;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns::{char_offset, COST_CATEGORY_KEYWORDS};

/// Amounts written in units of ten thousand yuan
const WAN_YUAN: &str = "万元";
const WAN_MULTIPLIER: f64 = 10_000.0;

lazy_static! {
    /// Total-price templates, tried in order
    static ref PRICE_PATTERNS: Vec<Regex> = vec![
        // 投标总价：1,234,567.89 元
        Regex::new(r"(?:投标总?价|报价|总[价报]|合计金额)[：:为\s]*(?:人民币)?\s*([0-9,，]+(?:\.[0-9]{1,2})?)\s*(?:元|万元)").unwrap(),
        // ￥1,234,567.89
        Regex::new(r"[￥¥]\s*([0-9,，]+(?:\.[0-9]{1,2})?)").unwrap(),
        // 总价(元)：1234567.89
        Regex::new(r"总价\s*(?:\(元\))?\s*[：:]\s*([0-9,，]+(?:\.[0-9]{1,2})?)").unwrap(),
    ];

    /// Subtotal patterns per cost category, keywords in priority order
    static ref COST_PATTERNS: Vec<(CostCategory, Vec<Regex>)> = COST_CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| {
            let patterns = keywords
                .iter()
                .map(|kw| {
                    Regex::new(&format!(
                        r"{}[：:为\s]*([0-9,，]+(?:\.[0-9]{{1,2}})?)\s*(?:元|万元)?",
                        regex::escape(kw)
                    ))
                    .unwrap()
                })
                .collect();
            (*category, patterns)
        })
        .collect();
}

/// An amount found in the text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMention {
    /// Amount in yuan
    pub value: f64,
    pub raw_text: String,
    /// Character offset of the mention
    pub position: usize,
}

/// Parse a captured amount, dropping thousands separators and applying the 万元 unit
fn parse_amount(digits: &str, whole_match: &str) -> Option<f64> {
    let cleaned: String = digits.chars().filter(|c| *c != ',' && *c != '，').collect();
    let value: f64 = cleaned.parse().ok()?;
    let value = if whole_match.contains(WAN_YUAN) {
        value * WAN_MULTIPLIER
    } else {
        value
    };
    (value > 0.0).then_some(value)
}

/// Every positive amount matched by the price templates, template by template
pub fn extract_prices(text: &str) -> Vec<PriceMention> {
    let mut mentions = Vec::new();
    for pattern in PRICE_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            let (Some(whole), Some(amount)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            if let Some(value) = parse_amount(amount.as_str(), whole.as_str()) {
                mentions.push(PriceMention {
                    value,
                    raw_text: whole.as_str().to_string(),
                    position: char_offset(text, whole.start()),
                });
            }
        }
    }
    mentions
}

/// The document total: the first extracted amount
pub fn extract_total_price(text: &str) -> Option<f64> {
    extract_prices(text).first().map(|m| m.value)
}

/// Subtotal per cost category; the first keyword yielding a positive amount wins
pub fn extract_cost_breakdown(text: &str) -> BTreeMap<CostCategory, f64> {
    let mut breakdown = BTreeMap::new();
    for (category, patterns) in COST_PATTERNS.iter() {
        let amount = patterns.iter().find_map(|pattern| {
            pattern.captures_iter(text).find_map(|cap| {
                let whole = cap.get(0)?;
                parse_amount(cap.get(1)?.as_str(), whole.as_str())
            })
        });
        if let Some(amount) = amount {
            breakdown.insert(*category, amount);
        }
    }
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_keyword_price() {
        let prices = extract_prices("投标总价：1,234,567.89 元");
        // keyword template first, then the 总价 header template on the same text
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].value, 1_234_567.89);
        assert_eq!(prices[0].raw_text, "投标总价：1,234,567.89 元");
        assert_eq!(prices[0].position, 0);
        assert_eq!(prices[1].position, 2);
    }

    #[test]
    fn test_extract_wan_yuan() {
        assert_eq!(extract_total_price("报价为 128.5 万元"), Some(1_285_000.0));
    }

    #[test]
    fn test_extract_currency_sign_and_fullwidth_separator() {
        assert_eq!(extract_total_price("合同金额￥3，500，000"), Some(3_500_000.0));
    }

    #[test]
    fn test_extract_total_price_header() {
        assert_eq!(extract_total_price("总价(元)：987654.32"), Some(987_654.32));
    }

    #[test]
    fn test_zero_and_missing_prices() {
        assert_eq!(extract_total_price("报价：0 元"), None);
        assert_eq!(extract_total_price("本项目不涉及金额"), None);
    }

    #[test]
    fn test_keyword_template_takes_precedence() {
        let text = "材料清单￥5000，投标总价：1000000元";
        assert_eq!(extract_total_price(text), Some(1_000_000.0));
    }

    #[test]
    fn test_cost_breakdown() {
        let text = "人工费：300,000元；材料费：500,000元；机械费 100000 元；管理费为5万元；利润：30000元";
        let breakdown = extract_cost_breakdown(text);
        assert_eq!(breakdown[&CostCategory::Labor], 300_000.0);
        assert_eq!(breakdown[&CostCategory::Material], 500_000.0);
        assert_eq!(breakdown[&CostCategory::Equipment], 100_000.0);
        assert_eq!(breakdown[&CostCategory::Management], 50_000.0);
        assert_eq!(breakdown[&CostCategory::Profit], 30_000.0);
        assert!(!breakdown.contains_key(&CostCategory::Tax));
    }

    #[test]
    fn test_cost_breakdown_first_keyword_wins() {
        let breakdown = extract_cost_breakdown("劳务费：1000元，人工费：2000元");
        assert_eq!(breakdown[&CostCategory::Labor], 2000.0);
    }
}
