//! Entity and intent extraction.
//!
//! Turns question text into a `QueryDescriptor` by matching gazetteer names,
//! four-digit years and intent cue words. Extraction never fails: text with
//! nothing recognisable yields an empty `lookup` descriptor.
//!
//! When several intent cues are present the type is chosen by fixed
//! precedence: comparison, then trend, then correlation, then lookup.

use crate::gazetteer::{contains_phrase, find_crops, find_locations, tokenize};
use crate::types::{QueryDescriptor, QueryType};
use std::ops::RangeInclusive;

/// Years accepted as data years.
pub const YEAR_RANGE: RangeInclusive<i32> = 1950..=2050;

const COMPARISON_CUES: &[&str] = &["compare", "compared", "comparing", "comparison", "vs", "versus", "difference"];
const TREND_CUES: &[&str] = &["trend", "trends", "over time", "over the years", "decade", "pattern", "year on year", "historical"];
const CORRELATION_CUES: &[&str] = &["correlate", "correlated", "correlation", "relationship", "relation", "impact", "effect", "affect", "affects", "depend"];
const CLIMATE_CUES: &[&str] = &["rainfall", "rain", "rains", "temperature", "climate", "weather", "monsoon", "precipitation", "drought"];
const PRICE_CUES: &[&str] = &["price", "prices", "market", "mandi", "msp", "rate", "rates"];

/// Maps question text to a structured query.
///
/// Implementations must be pure: the same text always yields the same
/// descriptor.
pub trait IntentExtractor: Send + Sync {
    fn extract(&self, text: &str) -> QueryDescriptor;
}

/// Gazetteer and cue-word extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct GazetteerExtractor;

impl IntentExtractor for GazetteerExtractor {
    fn extract(&self, text: &str) -> QueryDescriptor {
        let tokens = tokenize(text);
        let mut descriptor = QueryDescriptor::empty(text);

        if tokens.is_empty() {
            return descriptor;
        }

        descriptor.locations = find_locations(text, &tokens).into_iter().collect();
        descriptor.crops = find_crops(&tokens).into_iter().collect();
        descriptor.years = find_years(&tokens);
        descriptor.query_type = classify(&tokens);
        descriptor.requires_climate = any_cue(&tokens, CLIMATE_CUES);
        descriptor.requires_prices = any_cue(&tokens, PRICE_CUES);

        tracing::debug!(
            "Extracted {} query: locations={:?} crops={:?} years={:?} climate={} prices={}",
            descriptor.query_type,
            descriptor.locations,
            descriptor.crops,
            descriptor.years,
            descriptor.requires_climate,
            descriptor.requires_prices
        );

        descriptor
    }
}

/// Extract with the default gazetteer extractor.
pub fn extract(text: &str) -> QueryDescriptor {
    GazetteerExtractor.extract(text)
}

fn find_years(tokens: &[String]) -> std::collections::BTreeSet<i32> {
    tokens
        .iter()
        .filter(|t| t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|t| t.parse::<i32>().ok())
        .filter(|y| YEAR_RANGE.contains(y))
        .collect()
}

fn classify(tokens: &[String]) -> QueryType {
    if any_cue(tokens, COMPARISON_CUES) {
        QueryType::Comparison
    } else if any_cue(tokens, TREND_CUES) {
        QueryType::Trend
    } else if any_cue(tokens, CORRELATION_CUES) {
        QueryType::Correlation
    } else {
        QueryType::Lookup
    }
}

fn any_cue(tokens: &[String], cues: &[&str]) -> bool {
    cues.iter().any(|cue| contains_phrase(tokens, cue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_question() {
        let d = extract("Compare rice production in Maharashtra and Punjab");

        assert_eq!(d.query_type, QueryType::Comparison);
        assert_eq!(
            d.locations.iter().cloned().collect::<Vec<_>>(),
            vec!["Maharashtra", "Punjab"]
        );
        assert_eq!(d.crops.iter().cloned().collect::<Vec<_>>(), vec!["Rice"]);
        assert!(d.years.is_empty());
        assert!(!d.requires_climate);
        assert!(!d.requires_prices);
    }

    #[test]
    fn test_empty_and_gibberish_text() {
        for text in ["", "   ", "asdf qwerty zxcv", "!!!???", "12345 99"] {
            let d = extract(text);
            assert_eq!(d.query_type, QueryType::Lookup, "text: {:?}", text);
            assert!(!d.has_entities(), "text: {:?}", text);
            assert_eq!(d.raw_text, text);
        }
    }

    #[test]
    fn test_years_in_range_only() {
        let d = extract("Wheat in Punjab in 2019, 2021 and 1890 or 3000");
        assert_eq!(d.years.into_iter().collect::<Vec<_>>(), vec![2019, 2021]);
    }

    #[test]
    fn test_intent_precedence() {
        assert_eq!(
            extract("compare the trend of rainfall and its correlation with yield").query_type,
            QueryType::Comparison
        );
        assert_eq!(
            extract("trend of rainfall and its correlation with yield").query_type,
            QueryType::Trend
        );
        assert_eq!(
            extract("is there a correlation between rainfall and rice").query_type,
            QueryType::Correlation
        );
        assert_eq!(
            extract("how does rainfall correlate with rice output").query_type,
            QueryType::Correlation
        );
        assert_eq!(extract("rice output in Bihar").query_type, QueryType::Lookup);
    }

    #[test]
    fn test_climate_and_price_cues() {
        let d = extract("Monsoon rainfall in Kerala");
        assert!(d.requires_climate);
        assert!(!d.requires_prices);

        let d = extract("What is the mandi price of onion in Nashik?");
        assert!(d.requires_prices);
        assert_eq!(d.crops.iter().cloned().collect::<Vec<_>>(), vec!["Onion"]);
        assert_eq!(d.locations.iter().cloned().collect::<Vec<_>>(), vec!["Nashik"]);
    }

    #[test]
    fn test_extraction_is_pure() {
        let text = "Trend of wheat production in Haryana over the years";
        assert_eq!(extract(text), extract(text));
        assert_eq!(extract(text).query_type, QueryType::Trend);
    }
}
