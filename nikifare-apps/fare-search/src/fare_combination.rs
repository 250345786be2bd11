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

//! # Fare Combination
//!
//! Builds the ranked itinerary list. One-way searches pair every offer with
//! every bookable fare; round trips enumerate outbound × return × fare × fare
//! and keep the pairs that connect, are bookable and respect fare mixing.

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fare_table::FareClass;
use crate::offer_normalizer::{LegOffer, priced_fares};
use crate::route_tax::TaxInfo;

/// Minimum gap between outbound arrival and return departure, in hours.
pub const MIN_CONNECTION_HOURS: i64 = 1;

/// One leg of an itinerary with the fare chosen for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegChoice {
    pub offer: LegOffer,
    pub fare_class: FareClass,
    pub price: Decimal,
}

/// A complete bookable combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    pub outbound: LegChoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<LegChoice>,
    pub total_price: Decimal,
    pub total_with_tax: Decimal,
}

/// Result of the engine. An empty result is a normal outcome, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "itineraries", rename_all = "snake_case")]
pub enum CombinationOutcome {
    Offers(Vec<Itinerary>),
    NoCombinableOffers,
}

impl CombinationOutcome {
    fn from_itineraries(itineraries: Vec<Itinerary>) -> Self {
        if itineraries.is_empty() {
            CombinationOutcome::NoCombinableOffers
        } else {
            CombinationOutcome::Offers(itineraries)
        }
    }

    pub fn itineraries(&self) -> &[Itinerary] {
        match self {
            CombinationOutcome::Offers(itineraries) => itineraries,
            CombinationOutcome::NoCombinableOffers => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.itineraries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.itineraries().is_empty()
    }
}

/// Normalized offers of one leg together with that leg's fare columns.
#[derive(Debug, Clone, Copy)]
pub struct LegFares<'a> {
    pub offers: &'a [LegOffer],
    pub fare_classes: &'a [FareClass],
}

/// Whether the return leg leaves at least the minimum connection time after
/// the outbound arrival. The exact boundary connects.
pub fn connects(outbound: &LegOffer, inbound: &LegOffer) -> bool {
    outbound
        .arrival
        .checked_add_signed(TimeDelta::hours(MIN_CONNECTION_HOURS))
        .is_some_and(|earliest| earliest <= inbound.departure)
}

/// One itinerary per (offer, bookable fare), ranked by departure.
///
/// Ties keep row order, then fare-column order.
pub fn rank_one_way(leg: LegFares<'_>, tax: &TaxInfo) -> CombinationOutcome {
    let mut itineraries = Vec::new();
    for offer in leg.offers {
        for (fare_class, cell) in priced_fares(offer, leg.fare_classes) {
            let Some(price) = cell.amount() else {
                continue;
            };
            itineraries.push(Itinerary {
                outbound: LegChoice {
                    offer: offer.clone(),
                    fare_class: fare_class.clone(),
                    price,
                },
                inbound: None,
                total_price: price,
                total_with_tax: price + tax.amount,
            });
        }
    }

    itineraries.sort_by(|a, b| a.outbound.offer.departure.cmp(&b.outbound.offer.departure));
    tracing::debug!("Ranked {} one-way itineraries", itineraries.len());
    CombinationOutcome::from_itineraries(itineraries)
}

/// Every connecting, bookable outbound × return fare pairing, ranked by total
/// with tax, then outbound departure, then return departure.
///
/// When `combinable` is false both legs must use the same fare-class label.
pub fn combine_round_trip(
    outbound: LegFares<'_>,
    inbound: LegFares<'_>,
    tax: &TaxInfo,
    combinable: bool,
) -> CombinationOutcome {
    let mut itineraries = Vec::new();
    let mut rejected_connections = 0usize;

    for out_offer in outbound.offers {
        for ret_offer in inbound.offers {
            if !connects(out_offer, ret_offer) {
                rejected_connections += 1;
                continue;
            }
            for (out_fare, out_cell) in priced_fares(out_offer, outbound.fare_classes) {
                let Some(out_price) = out_cell.amount() else {
                    continue;
                };
                for (ret_fare, ret_cell) in priced_fares(ret_offer, inbound.fare_classes) {
                    let Some(ret_price) = ret_cell.amount() else {
                        continue;
                    };
                    if !combinable && out_fare.label != ret_fare.label {
                        continue;
                    }
                    let total_price = out_price + ret_price;
                    itineraries.push(Itinerary {
                        outbound: LegChoice {
                            offer: out_offer.clone(),
                            fare_class: out_fare.clone(),
                            price: out_price,
                        },
                        inbound: Some(LegChoice {
                            offer: ret_offer.clone(),
                            fare_class: ret_fare.clone(),
                            price: ret_price,
                        }),
                        total_price,
                        total_with_tax: total_price + tax.amount,
                    });
                }
            }
        }
    }

    itineraries.sort_by(|a, b| {
        a.total_with_tax
            .cmp(&b.total_with_tax)
            .then_with(|| a.outbound.offer.departure.cmp(&b.outbound.offer.departure))
            .then_with(|| return_departure(a).cmp(&return_departure(b)))
    });

    tracing::debug!(
        "Combined {} round-trip itineraries ({} leg pairs rejected by connection time)",
        itineraries.len(),
        rejected_connections
    );
    CombinationOutcome::from_itineraries(itineraries)
}

fn return_departure(itinerary: &Itinerary) -> Option<chrono::NaiveDateTime> {
    itinerary.inbound.as_ref().map(|leg| leg.offer.departure)
}
