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

// Library for nikifare-fare-search
// Offer extraction and fare combination for flyniki.com searches

mod document_reader;
mod errors;
mod fare_combination;
mod fare_table;
mod offer_normalizer;
mod offers_query_builder;
mod offers_results_parser;
mod offers_search;
mod price_reconciler;
mod route_tax;

pub use document_reader::{
    DocumentQuery, FIRST_PRICE_COLUMN, HtmlDocument, Leg, RawLegRow, parse_day_offset,
    read_raw_row, rows_for_leg,
};
pub use errors::{FetchError, OfferError, SearchError};
pub use fare_combination::{
    CombinationOutcome, Itinerary, LegChoice, LegFares, MIN_CONNECTION_HOURS, combine_round_trip,
    connects, rank_one_way,
};
pub use fare_table::{FareClass, ensure_fare_classes, fare_classes_for_leg};
pub use offer_normalizer::{LegOffer, RowErrorPolicy, normalize, parse_duration, priced_fares};
pub use offers_query_builder::{SearchContext, SearchContextBuilder, Trip, cookie_header};
pub use offers_results_parser::{
    DroppedRow, LegTable, OfferSearchResult, ParseOptions, ResponseBundle, Templates, parse_leg,
};
pub use offers_search::{ClientConfig, FlynikiClient, SearchOutcome, check_for_result_errors};
pub use price_reconciler::{PriceCell, parse_amount, price_for};
pub use route_tax::{TaxInfo, combinability, fallback_route_label, route_label, tax_info};
