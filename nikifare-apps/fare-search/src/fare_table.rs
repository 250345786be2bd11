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

//! # Fare Table
//!
//! Discovers the cabin-class columns of a leg. Column order is the alignment
//! every price cell of that leg's rows follows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document_reader::{DocumentQuery, Leg};
use crate::errors::OfferError;

/// A cabin-class label and its column position (0-based) within the leg's fare table.
///
/// Labels are not guaranteed unique; duplicates map to distinct columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FareClass {
    pub label: String,
    pub position: usize,
}

impl FareClass {
    pub fn new(label: impl Into<String>, position: usize) -> Self {
        Self {
            label: label.into(),
            position,
        }
    }

    /// Fare classes for labels given in column order.
    pub fn sequence<S: AsRef<str>>(labels: &[S]) -> Vec<FareClass> {
        labels
            .iter()
            .enumerate()
            .map(|(position, label)| FareClass::new(label.as_ref(), position))
            .collect()
    }
}

impl fmt::Display for FareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Fare classes of a leg in document order. An absent fare table yields none.
pub fn fare_classes_for_leg<D: DocumentQuery>(document: &D, leg: Leg) -> Vec<FareClass> {
    let labels = document.fare_labels(leg).unwrap_or_default();
    FareClass::sequence(&labels)
}

/// Zero fare classes is only consistent with an empty row set.
pub fn ensure_fare_classes(
    leg: Leg,
    fare_classes: &[FareClass],
    row_count: usize,
) -> Result<(), OfferError> {
    if fare_classes.is_empty() && row_count > 0 {
        return Err(OfferError::structure(format!(
            "{} leg has {} flight rows but no fare classes",
            leg, row_count
        )));
    }
    Ok(())
}
