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

//! # Offers Results Parser
//!
//! Side-effect free extraction of a fetched response bundle into ranked
//! itineraries: leg tables → raw rows → normalized offers → combination.

use serde::{Deserialize, Serialize};

use crate::document_reader::{DocumentQuery, HtmlDocument, Leg, read_raw_row, rows_for_leg};
use crate::errors::{FetchError, OfferError};
use crate::fare_combination::{CombinationOutcome, LegFares, combine_round_trip, rank_one_way};
use crate::fare_table::{FareClass, ensure_fare_classes, fare_classes_for_leg};
use crate::offer_normalizer::{LegOffer, RowErrorPolicy, normalize};
use crate::offers_query_builder::SearchContext;
use crate::route_tax::{TaxInfo, combinability, fallback_route_label, route_label, tax_info};

/// Keyed bundle returned by the vacancy endpoint.
///
/// Error bundles carry only `error`; every other answer must carry the
/// `main` and `priceoverview` templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<Templates>,
}

impl ResponseBundle {
    /// The rendered templates, or an unexpected-response fault when absent.
    pub fn templates(&self) -> Result<&Templates, FetchError> {
        self.templates.as_ref().ok_or_else(|| {
            FetchError::UnexpectedResponse("response bundle carries no templates".to_string())
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Templates {
    /// Leg tables, fare-class lists and the route summary.
    pub main: String,
    /// Price overview carrying the tax surcharge line.
    pub priceoverview: String,
    /// Date strip; says "No connections" when the dates have no flights.
    #[serde(default)]
    pub dateoverview: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    pub row_policy: RowErrorPolicy,
}

/// A row left out of its leg because its text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRow {
    pub leg: Leg,
    /// 0-based position among the leg's flight rows.
    pub row: usize,
    pub reason: String,
}

/// Fare columns and normalized offers of one leg, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegTable {
    pub leg: Leg,
    pub fare_classes: Vec<FareClass>,
    pub offers: Vec<LegOffer>,
    pub dropped: Vec<DroppedRow>,
}

impl LegTable {
    pub fn fares(&self) -> LegFares<'_> {
        LegFares {
            offers: &self.offers,
            fare_classes: &self.fare_classes,
        }
    }
}

/// Extract, validate and normalize one leg.
pub fn parse_leg<D: DocumentQuery>(
    document: &D,
    context: &SearchContext,
    leg: Leg,
    options: ParseOptions,
) -> Result<LegTable, OfferError> {
    let base_date = context.base_date(leg).ok_or_else(|| {
        OfferError::structure(format!("{} leg requested for a one-way search", leg))
    })?;

    let rows = rows_for_leg(document, leg)?;
    let fare_classes = fare_classes_for_leg(document, leg);
    ensure_fare_classes(leg, &fare_classes, rows.len())?;

    let mut offers = Vec::with_capacity(rows.len());
    let mut dropped = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        let parsed = read_raw_row(document, row, fare_classes.len())
            .and_then(|raw| normalize(&raw, base_date));
        match parsed {
            Ok(offer) => offers.push(offer),
            Err(err @ OfferError::Format(_)) => match options.row_policy {
                RowErrorPolicy::Skip => {
                    tracing::warn!("Dropping {} row {}: {}", leg, index, err);
                    dropped.push(DroppedRow {
                        leg,
                        row: index,
                        reason: err.to_string(),
                    });
                }
                RowErrorPolicy::Abort => {
                    return Err(OfferError::format(format!(
                        "{} row {}: {}",
                        leg, index, err
                    )));
                }
            },
            Err(err) => return Err(err),
        }
    }

    tracing::debug!(
        "Parsed {} {} offers over {} fare classes ({} rows dropped)",
        offers.len(),
        leg,
        fare_classes.len(),
        dropped.len()
    );

    Ok(LegTable {
        leg,
        fare_classes,
        offers,
        dropped,
    })
}

/// Ranked offers of one search together with what they were derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSearchResult {
    pub context: SearchContext,
    pub route: String,
    pub tax: TaxInfo,
    pub combinable: bool,
    pub outbound: LegTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<LegTable>,
    pub outcome: CombinationOutcome,
}

impl OfferSearchResult {
    /// Parse the `main` and `priceoverview` templates of a response bundle.
    pub fn from_templates(
        templates: &Templates,
        context: SearchContext,
        options: ParseOptions,
    ) -> Result<Self, OfferError> {
        let main = HtmlDocument::parse(&templates.main);
        let price_overview = HtmlDocument::parse(&templates.priceoverview);
        Self::from_documents(&main, &price_overview, context, options)
    }

    pub fn from_documents<M: DocumentQuery, P: DocumentQuery>(
        main: &M,
        price_overview: &P,
        context: SearchContext,
        options: ParseOptions,
    ) -> Result<Self, OfferError> {
        let outbound = parse_leg(main, &context, Leg::Outbound, options)?;
        let inbound = if context.trip.is_one_way() {
            None
        } else {
            Some(parse_leg(main, &context, Leg::Return, options)?)
        };

        let tax = tax_info(price_overview)?;
        let combinable = combinability(main);
        let route = route_label(main, &context.trip).unwrap_or_else(|| {
            tracing::warn!("Route summary missing, labelling route from airport codes");
            fallback_route_label(&context)
        });

        let outcome = match &inbound {
            None => rank_one_way(outbound.fares(), &tax),
            Some(inbound) => combine_round_trip(outbound.fares(), inbound.fares(), &tax, combinable),
        };

        Ok(Self {
            context,
            route,
            tax,
            combinable,
            outbound,
            inbound,
            outcome,
        })
    }

    pub fn itineraries(&self) -> &[crate::Itinerary] {
        self.outcome.itineraries()
    }

    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    /// Rows dropped from either leg.
    pub fn dropped_rows(&self) -> impl Iterator<Item = &DroppedRow> {
        self.outbound
            .dropped
            .iter()
            .chain(self.inbound.iter().flat_map(|leg| leg.dropped.iter()))
    }
}
