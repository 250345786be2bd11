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

//! # Errors
//!
//! Fault taxonomy for a single search. Structural faults abort the search,
//! row format faults are recovered per row, fetch faults are surfaced as-is.

use thiserror::Error;

/// Faults raised while extracting offers from a fetched response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    /// An expected element (leg table, fare-class list, tax line) is missing
    /// or the page layout no longer lines up.
    #[error("unexpected response structure: {0}")]
    Structure(String),
    /// A single row carries time, offset, duration or price text that cannot be parsed.
    #[error("unparsable row data: {0}")]
    Format(String),
}

impl OfferError {
    pub(crate) fn structure(msg: impl Into<String>) -> Self {
        Self::Structure(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Faults raised by the HTTP fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no response from {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: wreq::Error,
    },
    #[error("wrong data format from the booking site: {0}")]
    UnexpectedResponse(String),
    #[error("booking site reported an error: {0}")]
    Site(String),
}

/// Any fault that ends a search attempt.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Offer(#[from] OfferError),
}
