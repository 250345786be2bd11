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

//! # Offers Query Builder
//!
//! Side-effect free search parameters for a flyniki.com fare search.
//! Builds the `_ajax[...]` form posted to the vacancy page and the language/shop cookie.

use anyhow::{Result, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format the booking site expects in request parameters.
const SITE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Whether the search has a return leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trip {
    OneWay,
    RoundTrip { return_date: NaiveDate },
}

impl Trip {
    pub fn is_one_way(&self) -> bool {
        matches!(self, Trip::OneWay)
    }

    /// Number of leg tables the result page carries for this trip.
    pub fn leg_count(&self) -> usize {
        match self {
            Trip::OneWay => 1,
            Trip::RoundTrip { .. } => 2,
        }
    }
}

/// Immutable per-search parameters, passed by reference to every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    pub origin: String,
    pub destination: String,
    pub outbound_date: NaiveDate,
    pub trip: Trip,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl SearchContext {
    pub fn builder(
        origin: String,
        destination: String,
        outbound_date: NaiveDate,
    ) -> SearchContextBuilder {
        SearchContextBuilder {
            origin,
            destination,
            outbound_date,
            return_date: None,
            adults: 1,
            children: 0,
            infants: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.origin.is_empty(), "Origin airport is required");
        ensure!(
            !self.destination.is_empty(),
            "Destination airport is required"
        );
        ensure!(self.adults > 0, "At least one adult is required");
        ensure!(
            self.infants <= self.adults,
            "Cannot have more infants ({}) than adults ({})",
            self.infants,
            self.adults
        );
        Ok(())
    }

    /// Calendar date the given leg's times are anchored to.
    pub fn base_date(&self, leg: crate::Leg) -> Option<NaiveDate> {
        match (leg, self.trip) {
            (crate::Leg::Outbound, _) => Some(self.outbound_date),
            (crate::Leg::Return, Trip::RoundTrip { return_date }) => Some(return_date),
            (crate::Leg::Return, Trip::OneWay) => None,
        }
    }

    /// Ordered form fields posted to the vacancy page.
    ///
    /// Duplicate `_ajax[templates][]` keys are intentional: each names one
    /// template the response bundle should carry.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let (return_date, oneway) = match self.trip {
            Trip::OneWay => (String::new(), "on".to_string()),
            Trip::RoundTrip { return_date } => {
                (return_date.format(SITE_DATE_FORMAT).to_string(), String::new())
            }
        };

        vec![
            ("_ajax[templates][]", "main".to_string()),
            ("_ajax[templates][]", "priceoverview".to_string()),
            ("_ajax[templates][]", "infos".to_string()),
            ("_ajax[templates][]", "flightinfo".to_string()),
            ("_ajax[templates][]", "dateoverview".to_string()),
            ("_ajax[requestParams][departure]", self.origin.clone()),
            ("_ajax[requestParams][destination]", self.destination.clone()),
            ("_ajax[requestParams][returnDeparture]", String::new()),
            ("_ajax[requestParams][returnDestination]", String::new()),
            (
                "_ajax[requestParams][outboundDate]",
                self.outbound_date.format(SITE_DATE_FORMAT).to_string(),
            ),
            ("_ajax[requestParams][returnDate]", return_date),
            ("_ajax[requestParams][adultCount]", self.adults.to_string()),
            ("_ajax[requestParams][childCount]", self.children.to_string()),
            ("_ajax[requestParams][infantCount]", self.infants.to_string()),
            ("_ajax[requestParams][openDateOverview]", String::new()),
            ("_ajax[requestParams][oneway]", oneway),
        ]
    }

    /// `application/x-www-form-urlencoded` body for [`Self::form_fields`].
    pub fn form_body(&self) -> String {
        self.form_fields()
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Cookie selecting the site language and shop (market) for the session.
pub fn cookie_header(language: &str, shop: &str) -> String {
    format!("remember=0%3B{}0%3B{}", language, shop)
}

#[derive(Clone)]
pub struct SearchContextBuilder {
    origin: String,
    destination: String,
    outbound_date: NaiveDate,
    return_date: Option<NaiveDate>,
    adults: u32,
    children: u32,
    infants: u32,
}

impl SearchContextBuilder {
    pub fn return_date(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }

    pub fn passengers(mut self, adults: u32, children: u32, infants: u32) -> Self {
        self.adults = adults;
        self.children = children;
        self.infants = infants;
        self
    }

    pub fn build(self) -> Result<SearchContext> {
        let trip = match self.return_date {
            Some(return_date) => Trip::RoundTrip { return_date },
            None => Trip::OneWay,
        };
        let context = SearchContext {
            origin: self.origin.to_uppercase(),
            destination: self.destination.to_uppercase(),
            outbound_date: self.outbound_date,
            trip,
            adults: self.adults,
            children: self.children,
            infants: self.infants,
        };
        context.validate()?;
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_one_way_form_fields() {
        let ctx = SearchContext::builder("ber".into(), "rom".into(), date(2017, 8, 29))
            .build()
            .unwrap();
        assert_eq!(ctx.origin, "BER");
        assert!(ctx.trip.is_one_way());

        let fields = ctx.form_fields();
        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("_ajax[requestParams][outboundDate]"), Some("2017-08-29"));
        assert_eq!(get("_ajax[requestParams][returnDate]"), Some(""));
        assert_eq!(get("_ajax[requestParams][oneway]"), Some("on"));
        assert_eq!(get("_ajax[requestParams][adultCount]"), Some("1"));
        let templates = fields
            .iter()
            .filter(|(k, _)| *k == "_ajax[templates][]")
            .count();
        assert_eq!(templates, 5);
    }

    #[test]
    fn test_round_trip_form_body() {
        let ctx = SearchContext::builder("DME".into(), "LON".into(), date(2017, 4, 17))
            .return_date(date(2017, 5, 6))
            .build()
            .unwrap();
        assert_eq!(ctx.trip.leg_count(), 2);
        assert_eq!(ctx.base_date(crate::Leg::Return), Some(date(2017, 5, 6)));

        let body = ctx.form_body();
        assert!(body.contains("_ajax%5BrequestParams%5D%5BreturnDate%5D=2017-05-06"));
        assert!(body.ends_with("_ajax%5BrequestParams%5D%5Boneway%5D="));
    }

    #[test]
    fn test_passenger_validation() {
        let bad = SearchContext::builder("BER".into(), "ROM".into(), date(2017, 8, 29))
            .passengers(0, 1, 0)
            .build();
        assert!(bad.is_err(), "Building with 0 adults should fail");

        let bad = SearchContext::builder("BER".into(), "ROM".into(), date(2017, 8, 29))
            .passengers(1, 0, 2)
            .build();
        assert!(bad.is_err(), "More infants than adults should fail");
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(cookie_header("en", "RU"), "remember=0%3Ben0%3BRU");
    }
}
