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

//! # Document Reader
//!
//! Structural (positional) queries into the result markup. The core only
//! talks to [`DocumentQuery`]; [`HtmlDocument`] is the scraper-backed implementation.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::errors::OfferError;
use crate::price_reconciler::{PriceCell, price_for};

/// 1-based column of the first price cell in a flight row.
pub const FIRST_PRICE_COLUMN: usize = 5;

const TIMES_COLUMN: usize = 2;
const DURATION_COLUMN: usize = 4;

static DAY_OFFSET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\s*(\d+)").unwrap());

/// One directional leg of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Outbound,
    Return,
}

impl Leg {
    /// 1-based position of the leg's tables in the document.
    pub fn index(self) -> usize {
        match self {
            Leg::Outbound => 1,
            Leg::Return => 2,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Outbound => write!(f, "outbound"),
            Leg::Return => write!(f, "return"),
        }
    }
}

/// Capability interface over a parsed result document.
///
/// Paths are XPath-like child steps (`span/time[1]`), positions are 1-based
/// and counted among same-named siblings.
pub trait DocumentQuery {
    type Node<'a>: Copy
    where
        Self: 'a;

    /// Flight rows of the leg's table in document order, `None` when the table is absent.
    fn leg_rows(&self, leg: Leg) -> Option<Vec<Self::Node<'_>>>;

    /// Fare-class labels of the leg's fare table in document order, `None` when absent.
    fn fare_labels(&self, leg: Leg) -> Option<Vec<String>>;

    /// Number of `td` cells in a row.
    fn cell_count<'a>(&'a self, row: Self::Node<'a>) -> usize;

    /// Whitespace-normalized text at `subpath` below the row's `column`-th cell.
    /// `None` when the node is missing or its text is empty.
    fn child_text<'a>(&'a self, row: Self::Node<'a>, column: usize, subpath: &str)
        -> Option<String>;

    /// First element whose class attribute is exactly `class`.
    fn first_with_class(&self, class: &str) -> Option<Self::Node<'_>>;

    /// Whitespace-normalized text of a node and its descendants.
    fn node_text<'a>(&'a self, node: Self::Node<'a>) -> String;

    /// Whether any element carries `name="value"`.
    fn has_attribute_value(&self, name: &str, value: &str) -> bool;
}

struct OfferSelectors {
    flight_table: Selector,
    flight_row: Selector,
    fare_types: Selector,
    cell: Selector,
}

impl OfferSelectors {
    fn new() -> Self {
        Self {
            flight_table: Selector::parse(r#"[class="flighttable"]"#).unwrap(),
            flight_row: Selector::parse(r#"[class="flightrow"], [class="flightrow selected"]"#)
                .unwrap(),
            fare_types: Selector::parse(r#"[class="faretypes"]"#).unwrap(),
            cell: Selector::parse("td").unwrap(),
        }
    }
}

/// A parsed HTML template from the response bundle.
pub struct HtmlDocument {
    html: Html,
    selectors: OfferSelectors,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
            selectors: OfferSelectors::new(),
        }
    }
}

impl DocumentQuery for HtmlDocument {
    type Node<'a> = ElementRef<'a>;

    fn leg_rows(&self, leg: Leg) -> Option<Vec<ElementRef<'_>>> {
        let table = self
            .html
            .select(&self.selectors.flight_table)
            .nth(leg.index() - 1)?;
        Some(table.select(&self.selectors.flight_row).collect())
    }

    fn fare_labels(&self, leg: Leg) -> Option<Vec<String>> {
        let fare_types = self
            .html
            .select(&self.selectors.fare_types)
            .nth(leg.index() - 1)?;
        let labels = fare_types
            .select(&self.selectors.cell)
            .flat_map(|cell| walk_path(cell, "div[1]/label/p"))
            .map(element_text)
            .filter(|label| !label.is_empty())
            .collect();
        Some(labels)
    }

    fn cell_count<'a>(&'a self, row: ElementRef<'a>) -> usize {
        child_elements(row, "td").count()
    }

    fn child_text<'a>(&'a self, row: ElementRef<'a>, column: usize, subpath: &str) -> Option<String> {
        let path = if subpath.is_empty() {
            format!("td[{}]", column)
        } else {
            format!("td[{}]/{}", column, subpath)
        };
        walk_path(row, &path)
            .into_iter()
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    fn first_with_class(&self, class: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(&format!(r#"[class="{}"]"#, class)).ok()?;
        self.html.select(&selector).next()
    }

    fn node_text<'a>(&'a self, node: ElementRef<'a>) -> String {
        element_text(node)
    }

    fn has_attribute_value(&self, name: &str, value: &str) -> bool {
        match Selector::parse(&format!(r#"[{}="{}"]"#, name, value)) {
            Ok(selector) => self.html.select(&selector).next().is_some(),
            Err(_) => false,
        }
    }
}

struct PathStep<'p> {
    name: &'p str,
    position: Option<usize>,
}

impl<'p> PathStep<'p> {
    fn parse(step: &'p str) -> Self {
        match step.split_once('[') {
            Some((name, rest)) => Self {
                name,
                position: rest.trim_end_matches(']').parse().ok(),
            },
            None => Self {
                name: step,
                position: None,
            },
        }
    }
}

fn child_elements<'a>(parent: ElementRef<'a>, name: &str) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

/// Follow child steps from `start`, keeping every match in document order.
fn walk_path<'a>(start: ElementRef<'a>, path: &str) -> Vec<ElementRef<'a>> {
    let mut current = vec![start];
    for step in path.split('/').filter(|s| !s.is_empty()).map(PathStep::parse) {
        current = current
            .into_iter()
            .flat_map(|el| {
                let mut matching = child_elements(el, step.name);
                match step.position {
                    Some(n) => n
                        .checked_sub(1)
                        .and_then(|i| matching.nth(i))
                        .into_iter()
                        .collect::<Vec<_>>(),
                    None => matching.collect(),
                }
            })
            .collect();
        if current.is_empty() {
            break;
        }
    }
    current
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// One flight option of a leg before time resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLegRow {
    pub departure_time: String,
    pub arrival_time: String,
    /// Days added to the leg's base date to reach the arrival date.
    pub arrival_day_offset: u32,
    pub duration: String,
    /// One cell per fare class, in fare-class order.
    pub prices: Vec<PriceCell>,
}

/// Flight rows of a leg's table, in document order.
pub fn rows_for_leg<D: DocumentQuery>(
    document: &D,
    leg: Leg,
) -> Result<Vec<D::Node<'_>>, OfferError> {
    document
        .leg_rows(leg)
        .ok_or_else(|| OfferError::structure(format!("{} flight table is missing", leg)))
}

/// Read the raw text fields and price cells of one row.
///
/// A row whose price-cell count differs from `fare_count` is a structural
/// fault: the columns would no longer line up with the fare classes.
pub fn read_raw_row<'d, D: DocumentQuery>(
    document: &'d D,
    row: D::Node<'d>,
    fare_count: usize,
) -> Result<RawLegRow, OfferError> {
    let price_cells = document
        .cell_count(row)
        .saturating_sub(FIRST_PRICE_COLUMN - 1);
    if price_cells != fare_count {
        return Err(OfferError::structure(format!(
            "row has {} price cells for {} fare classes",
            price_cells, fare_count
        )));
    }

    let text = |column: usize, subpath: &str| {
        document
            .child_text(row, column, subpath)
            .unwrap_or_default()
    };

    let departure_time = text(TIMES_COLUMN, "span/time[1]");
    let arrival_time = text(TIMES_COLUMN, "span/time[2]");
    let arrival_day_offset = parse_day_offset(&text(TIMES_COLUMN, "span/strong"))?;
    let duration = text(DURATION_COLUMN, "span");

    let prices = (0..fare_count)
        .map(|position| price_for(document, row, position))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawLegRow {
        departure_time,
        arrival_time,
        arrival_day_offset,
        duration,
        prices,
    })
}

/// Parse the arrival day marker (`""`, `"+1"`, `"+2 days"`).
pub fn parse_day_offset(s: &str) -> Result<u32, OfferError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    DAY_OFFSET_RE
        .captures(s)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| OfferError::format(format!("invalid arrival day offset '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        <table class="flighttable"><tbody>
          <tr class="flightrow">
            <td>1</td>
            <td><span><time>06:30</time><time>08:45</time></span></td>
            <td>x</td>
            <td><span> 2h 15min </span></td>
            <td><label><div><span>99.00</span></div></label></td>
          </tr>
          <tr class="flightrow selected">
            <td>2</td>
            <td><span><time>23:50</time><time>01:10</time><strong>+1</strong></span></td>
            <td>x</td>
            <td><span>1h 20min</span></td>
            <td><span>not bookable</span></td>
          </tr>
          <tr class="flightrow-details"><td>ignored</td></tr>
        </tbody></table>
    "#;

    #[test]
    fn test_rows_include_selected_variant() {
        let doc = HtmlDocument::parse(TABLE);
        let rows = rows_for_leg(&doc, Leg::Outbound).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(doc.child_text(rows[1], 2, "span/time[1]").as_deref(), Some("23:50"));
    }

    #[test]
    fn test_missing_leg_table_is_structural() {
        let doc = HtmlDocument::parse(TABLE);
        let err = rows_for_leg(&doc, Leg::Return).unwrap_err();
        assert!(matches!(err, OfferError::Structure(_)));
    }

    #[test]
    fn test_positional_child_text() {
        let doc = HtmlDocument::parse(TABLE);
        let rows = rows_for_leg(&doc, Leg::Outbound).unwrap();
        assert_eq!(doc.child_text(rows[0], 2, "span/time[2]").as_deref(), Some("08:45"));
        assert_eq!(doc.child_text(rows[0], 4, "span").as_deref(), Some("2h 15min"));
        assert_eq!(doc.child_text(rows[0], 2, "span/strong"), None);
        assert_eq!(doc.child_text(rows[0], 9, "span"), None);
        assert_eq!(doc.cell_count(rows[0]), 5);
    }

    #[test]
    fn test_read_raw_row() {
        let doc = HtmlDocument::parse(TABLE);
        let rows = rows_for_leg(&doc, Leg::Outbound).unwrap();
        let raw = read_raw_row(&doc, rows[1], 1).unwrap();
        assert_eq!(raw.departure_time, "23:50");
        assert_eq!(raw.arrival_time, "01:10");
        assert_eq!(raw.arrival_day_offset, 1);
        assert_eq!(raw.duration, "1h 20min");
        assert_eq!(raw.prices, vec![PriceCell::NotBookable]);
    }

    #[test]
    fn test_misaligned_price_cells() {
        let doc = HtmlDocument::parse(TABLE);
        let rows = rows_for_leg(&doc, Leg::Outbound).unwrap();
        let err = read_raw_row(&doc, rows[0], 2).unwrap_err();
        assert!(matches!(err, OfferError::Structure(_)));
    }

    #[test]
    fn test_day_offset_parsing() {
        assert_eq!(parse_day_offset("").unwrap(), 0);
        assert_eq!(parse_day_offset("+1").unwrap(), 1);
        assert_eq!(parse_day_offset(" +2 days").unwrap(), 2);
        assert!(parse_day_offset("next day").unwrap_err().is_format());
    }
}
