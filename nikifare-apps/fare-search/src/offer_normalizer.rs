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

//! # Offer Normalizer
//!
//! Anchors a raw row's time-of-day strings and day offset to the leg's
//! calendar date, producing absolute timestamps.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document_reader::RawLegRow;
use crate::errors::OfferError;
use crate::fare_table::FareClass;
use crate::price_reconciler::PriceCell;

const TIME_OF_DAY_FORMAT: &str = "%H:%M";

static DURATION_CLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s*:\s*(\d{2})").unwrap());
static DURATION_H_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*h").unwrap());
static DURATION_M_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*m").unwrap());

/// What to do with a row whose text cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy {
    /// Drop the row, log a warning, keep the rest of the leg.
    #[default]
    Skip,
    /// Fail the whole search on the first bad row.
    Abort,
}

/// One flight option of a leg with absolute timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegOffer {
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub duration: String,
    pub duration_minutes: u32,
    /// One cell per fare class, indexed by [`FareClass::position`].
    pub prices: Vec<PriceCell>,
}

impl LegOffer {
    /// Price for a fare class; a column outside the row is not bookable.
    pub fn price(&self, fare_class: &FareClass) -> PriceCell {
        self.prices
            .get(fare_class.position)
            .copied()
            .unwrap_or(PriceCell::NotBookable)
    }

    /// Days between the leg's base date and the arrival date.
    pub fn arrival_day_offset(&self) -> u32 {
        let days = (self.arrival.date() - self.departure.date()).num_days();
        u32::try_from(days).unwrap_or(0)
    }

    /// The time-of-day strings and day offset this offer was built from.
    pub fn raw_times(&self) -> (String, String, u32) {
        (
            self.departure.format(TIME_OF_DAY_FORMAT).to_string(),
            self.arrival.format(TIME_OF_DAY_FORMAT).to_string(),
            self.arrival_day_offset(),
        )
    }
}

/// Convert a raw row into an offer anchored at `base_date`.
///
/// Fails with a format fault when a time or the duration cannot be parsed,
/// or when the arrival would precede the departure.
pub fn normalize(raw: &RawLegRow, base_date: NaiveDate) -> Result<LegOffer, OfferError> {
    let departure_time = parse_time_of_day(&raw.departure_time)?;
    let arrival_time = parse_time_of_day(&raw.arrival_time)?;
    let duration_minutes = parse_duration(&raw.duration)?;

    let departure = base_date.and_time(departure_time);
    let arrival_date = if raw.arrival_day_offset > 0 {
        base_date
            .checked_add_days(Days::new(u64::from(raw.arrival_day_offset)))
            .ok_or_else(|| {
                OfferError::format(format!(
                    "arrival day offset {} out of range",
                    raw.arrival_day_offset
                ))
            })?
    } else {
        base_date
    };
    let arrival = arrival_date.and_time(arrival_time);

    if arrival < departure {
        return Err(OfferError::format(format!(
            "arrival {} precedes departure {}",
            arrival, departure
        )));
    }

    Ok(LegOffer {
        departure,
        arrival,
        duration: raw.duration.trim().to_string(),
        duration_minutes,
        prices: raw.prices.clone(),
    })
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime, OfferError> {
    NaiveTime::parse_from_str(s.trim(), TIME_OF_DAY_FORMAT)
        .map_err(|_| OfferError::format(format!("invalid time of day '{}'", s.trim())))
}

/// Flight duration in minutes from `2:15 h`, `2h 15min`, `45 min` and similar.
pub fn parse_duration(s: &str) -> Result<u32, OfferError> {
    let s = s.trim();
    let invalid = || OfferError::format(format!("invalid duration '{}'", s));

    if let Some(caps) = DURATION_CLOCK_RE.captures(s) {
        let hours: u32 = caps[1].parse().map_err(|_| invalid())?;
        let minutes: u32 = caps[2].parse().map_err(|_| invalid())?;
        return total_minutes(hours, minutes).ok_or_else(invalid);
    }

    let hours = DURATION_H_RE
        .captures(s)
        .map(|caps| caps[1].parse::<u32>().map_err(|_| invalid()))
        .transpose()?;
    let minutes = DURATION_M_RE
        .captures(s)
        .map(|caps| caps[1].parse::<u32>().map_err(|_| invalid()))
        .transpose()?;

    match (hours, minutes) {
        (None, None) => Err(invalid()),
        (h, m) => total_minutes(h.unwrap_or(0), m.unwrap_or(0)).ok_or_else(invalid),
    }
}

fn total_minutes(hours: u32, minutes: u32) -> Option<u32> {
    hours.checked_mul(60)?.checked_add(minutes)
}

/// Fare classes paired with their prices for one offer.
pub fn priced_fares<'f>(
    offer: &LegOffer,
    fare_classes: &'f [FareClass],
) -> impl Iterator<Item = (&'f FareClass, PriceCell)> {
    fare_classes.iter().map(|fare| (fare, offer.price(fare)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 8, 29).unwrap()
    }

    fn raw(dep: &str, arr: &str, offset: u32, duration: &str) -> RawLegRow {
        RawLegRow {
            departure_time: dep.to_string(),
            arrival_time: arr.to_string(),
            arrival_day_offset: offset,
            duration: duration.to_string(),
            prices: vec![PriceCell::Amount(Decimal::new(19900, 2)), PriceCell::NotBookable],
        }
    }

    #[test]
    fn test_same_day_arrival() {
        let offer = normalize(&raw("06:30", "08:45", 0, " 2h 15min "), base()).unwrap();
        assert_eq!(offer.departure, base().and_hms_opt(6, 30, 0).unwrap());
        assert_eq!(offer.arrival, base().and_hms_opt(8, 45, 0).unwrap());
        assert_eq!(offer.duration, "2h 15min");
        assert_eq!(offer.duration_minutes, 135);
        assert_eq!(offer.price(&FareClass::new("Flex", 1)), PriceCell::NotBookable);
        assert_eq!(offer.price(&FareClass::new("Ghost", 7)), PriceCell::NotBookable);
    }

    #[test]
    fn test_next_day_arrival() {
        let offer = normalize(&raw("23:50", "01:10", 1, "1h 20min"), base()).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2017, 8, 30).unwrap();
        assert_eq!(offer.arrival, next_day.and_hms_opt(1, 10, 0).unwrap());
        assert!(offer.arrival > offer.departure);
    }

    #[test]
    fn test_raw_times_round_trip() {
        let original = raw("23:50", "01:10", 1, "1h 20min");
        let offer = normalize(&original, base()).unwrap();
        let (dep, arr, offset) = offer.raw_times();
        assert_eq!(dep, original.departure_time);
        assert_eq!(arr, original.arrival_time);
        assert_eq!(offset, original.arrival_day_offset);
    }

    #[test]
    fn test_format_faults() {
        assert!(normalize(&raw("6.30", "08:45", 0, "2h"), base()).unwrap_err().is_format());
        assert!(normalize(&raw("06:30", "", 0, "2h"), base()).unwrap_err().is_format());
        assert!(normalize(&raw("06:30", "08:45", 0, "soon"), base()).unwrap_err().is_format());
        // overnight arrival without a day marker
        assert!(normalize(&raw("23:50", "01:10", 0, "1h 20min"), base()).unwrap_err().is_format());
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("2:15 h").unwrap(), 135);
        assert_eq!(parse_duration("2h 05min").unwrap(), 125);
        assert_eq!(parse_duration("1 h").unwrap(), 60);
        assert_eq!(parse_duration("45 min").unwrap(), 45);
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_overlong_duration_is_format_fault() {
        assert!(parse_duration("99999999h").unwrap_err().is_format());
        assert!(parse_duration("71582788:59 h").unwrap_err().is_format());
        assert!(parse_duration("99999999999h").unwrap_err().is_format());
        assert!(parse_duration("99999999999h 5min").unwrap_err().is_format());
        assert!(normalize(&raw("06:30", "08:45", 0, "99999999h 5min"), base())
            .unwrap_err()
            .is_format());
    }
}
