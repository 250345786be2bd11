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

//! # Price Reconciler
//!
//! Resolves the price of one (row, fare class) cell. The plain cell text wins;
//! otherwise the was/now pair is read, preferring the "now" value.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::document_reader::{DocumentQuery, FIRST_PRICE_COLUMN};
use crate::errors::OfferError;

const PLAIN_PRICE_PATH: &str = "span";
const CURRENT_PRICE_PATH: &str = "label/div[2]/span";
const LOWEST_PRICE_PATH: &str = "label/div[1]/span";

/// Price of one fare-class cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "amount", rename_all = "snake_case")]
pub enum PriceCell {
    Amount(Decimal),
    NotBookable,
}

impl PriceCell {
    /// Numeric stand-in for a not-bookable cell. Fares are always positive.
    pub const NOT_BOOKABLE_SENTINEL: Decimal = Decimal::ZERO;

    /// Non-positive amounts never denote a transactable fare.
    pub fn from_amount(amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            PriceCell::Amount(amount)
        } else {
            PriceCell::NotBookable
        }
    }

    pub fn amount(self) -> Option<Decimal> {
        match self {
            PriceCell::Amount(amount) => Some(amount),
            PriceCell::NotBookable => None,
        }
    }

    /// The amount, or the sentinel zero when not bookable.
    pub fn value(self) -> Decimal {
        self.amount().unwrap_or(Self::NOT_BOOKABLE_SENTINEL)
    }

    pub fn is_bookable(self) -> bool {
        matches!(self, PriceCell::Amount(_))
    }
}

/// Price of the row's cell for the fare class at `fare_position` (0-based).
///
/// Plain cell text that is not a number is the site's not-bookable marker.
/// Was/now text that is not a number is a row format fault.
pub fn price_for<'d, D: DocumentQuery>(
    document: &'d D,
    row: D::Node<'d>,
    fare_position: usize,
) -> Result<PriceCell, OfferError> {
    let column = FIRST_PRICE_COLUMN + fare_position;

    if let Some(plain) = document.child_text(row, column, PLAIN_PRICE_PATH) {
        return Ok(parse_amount(&plain)
            .map(PriceCell::from_amount)
            .unwrap_or(PriceCell::NotBookable));
    }

    let was_now = document
        .child_text(row, column, CURRENT_PRICE_PATH)
        .or_else(|| document.child_text(row, column, LOWEST_PRICE_PATH));

    match was_now {
        None => Ok(PriceCell::NotBookable),
        Some(text) => parse_amount(&text)
            .map(PriceCell::from_amount)
            .ok_or_else(|| OfferError::format(format!("invalid price '{}'", text))),
    }
}

/// Parse a decimal amount, stripping thousands separators.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let normalized: String = s
        .chars()
        .filter(|c| !matches!(*c, ',' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if normalized.is_empty() {
        return None;
    }
    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_reader::{HtmlDocument, Leg, rows_for_leg};

    const ROW: &str = r#"
        <table class="flighttable"><tbody><tr class="flightrow">
          <td></td><td></td><td></td><td></td>
          <td><label><div><span>1,249.00</span></div><div><span>1,099.00</span></div></label></td>
          <td><label><div><span>310.50</span></div></label></td>
          <td><span>150.00</span></td>
          <td><span>Not bookable</span></td>
          <td><label><div></div><div></div></label></td>
          <td><label><div><span>soon</span></div></label></td>
        </tr></tbody></table>
    "#;

    fn cells() -> Vec<Result<PriceCell, OfferError>> {
        let doc = HtmlDocument::parse(ROW);
        let rows = rows_for_leg(&doc, Leg::Outbound).unwrap();
        (0..6).map(|i| price_for(&doc, rows[0], i)).collect()
    }

    fn amount(s: &str) -> PriceCell {
        PriceCell::Amount(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_was_now_prefers_second_value() {
        assert_eq!(cells()[0], Ok(amount("1099.00")));
    }

    #[test]
    fn test_was_now_falls_back_to_first_value() {
        assert_eq!(cells()[1], Ok(amount("310.50")));
    }

    #[test]
    fn test_plain_text_price() {
        assert_eq!(cells()[2], Ok(amount("150")));
    }

    #[test]
    fn test_not_bookable_cells() {
        let cells = cells();
        assert_eq!(cells[3], Ok(PriceCell::NotBookable));
        assert_eq!(cells[4], Ok(PriceCell::NotBookable));
        assert_eq!(PriceCell::NotBookable.value(), Decimal::ZERO);
    }

    #[test]
    fn test_garbled_was_now_is_format_error() {
        assert!(cells()[5].as_ref().unwrap_err().is_format());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.50"), Decimal::from_str("1234.50").ok());
        assert_eq!(parse_amount("12\u{a0}000"), Decimal::from_str("12000").ok());
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(PriceCell::from_amount(Decimal::ZERO), PriceCell::NotBookable);
    }
}
