//!  Nikifare Fare Search
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Route & Tax Extractor
//!
//! Route label, currency and flat tax surcharge, and the fare-mixing marker.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::document_reader::DocumentQuery;
use crate::errors::OfferError;
use crate::offers_query_builder::{SearchContext, Trip};
use crate::price_reconciler::parse_amount;

const ROUTE_CLASS: &str = "vacancy_route";
const SURCHARGE_CLASS: &str = "additionals-tsc";
const SURCHARGE_COLUMN: usize = 2;
/// Fare value only offered when cabin classes cannot be mixed across legs.
const COMFORT_FARE_VALUE: &str = "COMF";

/// Currency code and the flat surcharge applied once per itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxInfo {
    pub currency: String,
    pub amount: Decimal,
}

/// Human-readable route, e.g. `BERLIN (TXL) - ROME (FCO) - BERLIN (TXL)`.
///
/// `None` when the route summary node is missing or empty.
pub fn route_label<D: DocumentQuery>(document: &D, trip: &Trip) -> Option<String> {
    let node = document.first_with_class(ROUTE_CLASS)?;
    let summary = document.node_text(node);
    let summary = summary.split(',').next().unwrap_or_default().trim();

    let mut segments: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for token in summary.split_whitespace() {
        if token.chars().any(char::is_alphanumeric) {
            current.push(token);
        } else if !current.is_empty() {
            segments.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        segments.push(current.join(" "));
    }

    let first = segments.first()?.clone();
    let mut label = segments.join(" - ");
    if !trip.is_one_way() {
        label.push_str(" - ");
        label.push_str(&first);
    }
    Some(label.to_uppercase())
}

/// Route label built from the airport codes alone.
pub fn fallback_route_label(context: &SearchContext) -> String {
    let mut label = format!("{} - {}", context.origin, context.destination);
    if !context.trip.is_one_way() {
        label.push_str(" - ");
        label.push_str(&context.origin);
    }
    label
}

/// Currency and surcharge from the price overview template.
pub fn tax_info<D: DocumentQuery>(document: &D) -> Result<TaxInfo, OfferError> {
    let line = document
        .first_with_class(SURCHARGE_CLASS)
        .and_then(|row| document.child_text(row, SURCHARGE_COLUMN, ""))
        .ok_or_else(|| OfferError::structure("tax surcharge line is missing"))?;

    let mut parts = line.split_whitespace();
    let currency = parts.next().unwrap_or_default();
    // Thousands groups may arrive as separate tokens, e.g. `RUB 1 150.00`.
    let amount_text = parts.collect::<Vec<_>>().join(" ");
    if amount_text.is_empty() {
        return Err(OfferError::structure(format!(
            "malformed tax surcharge line '{}'",
            line
        )));
    }
    let amount = parse_amount(&amount_text).ok_or_else(|| {
        OfferError::structure(format!("malformed tax surcharge amount '{}'", amount_text))
    })?;

    Ok(TaxInfo {
        currency: currency.to_string(),
        amount,
    })
}

/// Whether outbound and return legs may use different fare classes.
pub fn combinability<D: DocumentQuery>(document: &D) -> bool {
    !document.has_attribute_value("value", COMFORT_FARE_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_reader::HtmlDocument;
    use chrono::NaiveDate;
    use std::str::FromStr;

    const ROUTE: &str = r#"<div class="vacancy_route">Berlin (TXL) &#8594; Rome (FCO), 29.08.2017</div>"#;

    fn round_trip() -> Trip {
        Trip::RoundTrip {
            return_date: NaiveDate::from_ymd_opt(2017, 9, 5).unwrap(),
        }
    }

    #[test]
    fn test_one_way_route_label() {
        let doc = HtmlDocument::parse(ROUTE);
        assert_eq!(
            route_label(&doc, &Trip::OneWay).as_deref(),
            Some("BERLIN (TXL) - ROME (FCO)")
        );
    }

    #[test]
    fn test_round_trip_route_label() {
        let doc = HtmlDocument::parse(ROUTE);
        assert_eq!(
            route_label(&doc, &round_trip()).as_deref(),
            Some("BERLIN (TXL) - ROME (FCO) - BERLIN (TXL)")
        );
    }

    #[test]
    fn test_missing_route_node() {
        let doc = HtmlDocument::parse("<div class=\"other\">x</div>");
        assert_eq!(route_label(&doc, &Trip::OneWay), None);
    }

    #[test]
    fn test_tax_info() {
        let doc = HtmlDocument::parse(
            r#"<table><tbody><tr class="additionals-tsc"><td>Taxes and fees</td><td> RUB 1,150.00 </td></tr></tbody></table>"#,
        );
        let tax = tax_info(&doc).unwrap();
        assert_eq!(tax.currency, "RUB");
        assert_eq!(tax.amount, Decimal::from_str("1150.00").unwrap());
    }

    #[test]
    fn test_tax_amount_with_grouped_thousands() {
        for cell in ["RUB 1\u{a0}150.00", "RUB 1 150.00", "RUB 12 345 678.90"] {
            let doc = HtmlDocument::parse(&format!(
                r#"<table><tbody><tr class="additionals-tsc"><td>Taxes</td><td>{}</td></tr></tbody></table>"#,
                cell
            ));
            let tax = tax_info(&doc).unwrap();
            assert_eq!(tax.currency, "RUB");
            let expected = cell.trim_start_matches("RUB ").replace(['\u{a0}', ' '], "");
            assert_eq!(tax.amount, Decimal::from_str(&expected).unwrap(), "{}", cell);
        }

        let doc = HtmlDocument::parse(
            r#"<table><tbody><tr class="additionals-tsc"><td>Taxes</td><td>EUR 12 incl. VAT</td></tr></tbody></table>"#,
        );
        assert!(matches!(tax_info(&doc), Err(OfferError::Structure(_))));
    }

    #[test]
    fn test_tax_line_missing_or_malformed() {
        let doc = HtmlDocument::parse("<table><tbody><tr><td>x</td></tr></tbody></table>");
        assert!(matches!(tax_info(&doc), Err(OfferError::Structure(_))));

        let doc = HtmlDocument::parse(
            r#"<table><tbody><tr class="additionals-tsc"><td>Taxes</td><td>EUR</td></tr></tbody></table>"#,
        );
        assert!(matches!(tax_info(&doc), Err(OfferError::Structure(_))));

        let doc = HtmlDocument::parse(
            r#"<table><tbody><tr class="additionals-tsc"><td>Taxes</td><td>EUR free</td></tr></tbody></table>"#,
        );
        assert!(matches!(tax_info(&doc), Err(OfferError::Structure(_))));
    }

    #[test]
    fn test_combinability() {
        let mixed = HtmlDocument::parse(r#"<input type="radio" value="ECO">"#);
        assert!(combinability(&mixed));
        let strict = HtmlDocument::parse(r#"<input type="radio" value="COMF">"#);
        assert!(!combinability(&strict));
    }
}
