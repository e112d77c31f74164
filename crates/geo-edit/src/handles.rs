// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Placement of the "insert point here" handles around a selected path point.

use crate::geo::Location;

/// Which side of the selected point a handle sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleSide {
    /// Before the selection; dragging it inserts at the selection's position.
    Negative,
    /// After the selection; dragging it inserts right after the selection.
    Positive,
}

impl HandleSide {
    /// 1-based insertion position for a handle next to the point at `index`.
    #[must_use]
    pub fn insert_position(self, index: usize) -> usize {
        match self {
            Self::Negative => index + 1,
            Self::Positive => index + 2,
        }
    }
}

fn midpoint(a: Location, b: Location) -> Location {
    Location::new((a.lat + b.lat) / 2.0, (a.lon + b.lon) / 2.0)
}

/// Location of the edit handle on `side` of `locations[index]`.
///
/// With a neighbor on that side the handle sits at the midpoint of the
/// segment. At an endpoint it sits `delta` degrees beyond the endpoint along
/// the direction from the other neighbor, so its offset does not depend on the
/// segment length. A lone point (or a coincident neighbor) offsets by `delta`
/// in longitude only. Returns `None` when `index` is out of range.
#[must_use]
pub fn place_handle(
    locations: &[Location],
    index: usize,
    side: HandleSide,
    delta: f64,
) -> Option<Location> {
    let selected = *locations.get(index)?;

    let (toward, away) = match side {
        HandleSide::Negative => (
            index.checked_sub(1).and_then(|i| locations.get(i)),
            locations.get(index + 1),
        ),
        HandleSide::Positive => (
            locations.get(index + 1),
            index.checked_sub(1).and_then(|i| locations.get(i)),
        ),
    };

    if let Some(neighbor) = toward {
        return Some(midpoint(selected, *neighbor));
    }

    let sign = match side {
        HandleSide::Negative => -1.0,
        HandleSide::Positive => 1.0,
    };
    let lone = Location::new(selected.lat, selected.lon + sign * delta);

    let Some(other) = away else {
        return Some(lone);
    };

    let d_lat = selected.lat - other.lat;
    let d_lon = selected.lon - other.lon;
    let length = d_lat.hypot(d_lon);
    if length <= f64::EPSILON {
        return Some(lone);
    }

    Some(Location::new(
        selected.lat + d_lat / length * delta,
        selected.lon + d_lon / length * delta,
    ))
}
