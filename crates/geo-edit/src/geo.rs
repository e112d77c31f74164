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

//! Geographic and screen coordinate primitives.
//!
//! Locations are plain latitude/longitude pairs in degrees. Screen positions are
//! viewport-local pixels with the origin at the top-left corner and y growing
//! downwards. The [`Projection`] trait is the only bridge between the two; the
//! editing core never assumes a particular map projection.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Web Mercator tile edge in pixels.
const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

const MIN_ZOOM: f64 = 1.0;
const MAX_ZOOM: f64 = 19.0;

/// A geographic location in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A position in viewport-local screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPos {
    pub x: f64,
    pub y: f64,
}

impl ScreenPos {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another screen position.
    #[must_use]
    pub fn distance_sq(self, other: ScreenPos) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn distance(self, other: ScreenPos) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

/// Converts between geographic and screen coordinates.
pub trait Projection {
    fn project_to_screen(&self, location: Location) -> ScreenPos;
    fn screen_to_geo(&self, pos: ScreenPos) -> Location;
}

/// Axis-aligned latitude/longitude bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    /// Bounds containing a single location.
    #[must_use]
    pub fn around(location: Location) -> Self {
        Self {
            min_lat: location.lat,
            min_lon: location.lon,
            max_lat: location.lat,
            max_lon: location.lon,
        }
    }

    /// Smallest bounds covering every location, or `None` for an empty input.
    pub fn from_locations<I>(locations: I) -> Option<Self>
    where
        I: IntoIterator<Item = Location>,
    {
        let mut iter = locations.into_iter();
        let mut bounds = Self::around(iter.next()?);
        for location in iter {
            bounds.extend(location);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, location: Location) {
        self.min_lat = self.min_lat.min(location.lat);
        self.min_lon = self.min_lon.min(location.lon);
        self.max_lat = self.max_lat.max(location.lat);
        self.max_lon = self.max_lon.max(location.lon);
    }

    /// Grow the bounds by `margin_deg` on every side.
    #[must_use]
    pub fn padded(self, margin_deg: f64) -> Self {
        Self {
            min_lat: (self.min_lat - margin_deg).max(-MAX_MERCATOR_LAT),
            min_lon: self.min_lon - margin_deg,
            max_lat: (self.max_lat + margin_deg).min(MAX_MERCATOR_LAT),
            max_lon: self.max_lon + margin_deg,
        }
    }

    #[must_use]
    pub fn center(&self) -> Location {
        Location::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Great-circle distance between two locations in meters (haversine).
#[must_use]
pub fn haversine_m(a: Location, b: Location) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// The point `meters` due east of `center` along its parallel.
///
/// Used as the "edge" point of a ring so the ring's on-screen radius can be
/// measured after projection.
#[must_use]
pub fn east_of(center: Location, meters: f64) -> Location {
    let cos_lat = center.lat.to_radians().cos().max(1e-6);
    let delta_lon = (meters / EARTH_RADIUS_M / cos_lat).to_degrees();
    Location::new(center.lat, center.lon + delta_lon)
}

fn lon_to_x(lon: f64, zoom: f64) -> f64 {
    (lon + 180.0) / 360.0 * 2_f64.powf(zoom)
}

fn lat_to_y(lat: f64, zoom: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    y * 2_f64.powf(zoom)
}

fn x_to_lon(x: f64, zoom: f64) -> f64 {
    x / 2_f64.powf(zoom) * 360.0 - 180.0
}

fn y_to_lat(y: f64, zoom: f64) -> f64 {
    let n = 2_f64.powf(zoom);
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

/// A Web Mercator map view with a fractional zoom level.
///
/// `width`/`height` are the viewport size in pixels; the view center always
/// projects to the middle of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercatorView {
    pub center: Location,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl WebMercatorView {
    #[must_use]
    pub fn new(center: Location, zoom: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    fn world_px(&self, location: Location, zoom: f64) -> (f64, f64) {
        (
            lon_to_x(location.lon, zoom) * TILE_SIZE,
            lat_to_y(location.lat, zoom) * TILE_SIZE,
        )
    }

    fn set_center_world(&mut self, x: f64, y: f64) {
        let lat = y_to_lat(y / TILE_SIZE, self.zoom).clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        self.center = Location::new(lat, x_to_lon(x / TILE_SIZE, self.zoom));
    }

    /// Move the map content by `(dx, dy)` pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let (cx, cy) = self.world_px(self.center, self.zoom);
        self.set_center_world(cx - dx, cy - dy);
    }

    /// Change the zoom by `levels`, keeping the location under `anchor` fixed.
    pub fn zoom_at(&mut self, levels: f64, anchor: ScreenPos) {
        let pinned = self.screen_to_geo(anchor);
        self.zoom = (self.zoom + levels).clamp(MIN_ZOOM, MAX_ZOOM);

        let (px, py) = self.world_px(pinned, self.zoom);
        let cx = px - (anchor.x - self.width / 2.0);
        let cy = py - (anchor.y - self.height / 2.0);
        self.set_center_world(cx, cy);
    }

    /// Center on `bounds` and pick the largest zoom that shows all of it.
    pub fn fit(&mut self, bounds: GeoBounds) {
        let (x0, y0) = self.world_px(Location::new(bounds.max_lat, bounds.min_lon), 0.0);
        let (x1, y1) = self.world_px(Location::new(bounds.min_lat, bounds.max_lon), 0.0);
        let span_x = (x1 - x0).abs();
        let span_y = (y1 - y0).abs();

        if self.width > 0.0 && self.height > 0.0 && (span_x > 0.0 || span_y > 0.0) {
            let scale_x = if span_x > 0.0 { self.width / span_x } else { f64::INFINITY };
            let scale_y = if span_y > 0.0 { self.height / span_y } else { f64::INFINITY };
            self.zoom = scale_x.min(scale_y).log2().clamp(MIN_ZOOM, MAX_ZOOM);
        }

        let (mx, my) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        let scale = 2_f64.powf(self.zoom);
        self.set_center_world(mx * scale, my * scale);
    }

    /// Geographic corners of the viewport, clockwise from the top-left.
    #[must_use]
    pub fn corners(&self) -> [Location; 4] {
        [
            self.screen_to_geo(ScreenPos::new(0.0, 0.0)),
            self.screen_to_geo(ScreenPos::new(self.width, 0.0)),
            self.screen_to_geo(ScreenPos::new(self.width, self.height)),
            self.screen_to_geo(ScreenPos::new(0.0, self.height)),
        ]
    }
}

impl Projection for WebMercatorView {
    fn project_to_screen(&self, location: Location) -> ScreenPos {
        let (x, y) = self.world_px(location, self.zoom);
        let (cx, cy) = self.world_px(self.center, self.zoom);
        ScreenPos::new(x - cx + self.width / 2.0, y - cy + self.height / 2.0)
    }

    fn screen_to_geo(&self, pos: ScreenPos) -> Location {
        let (cx, cy) = self.world_px(self.center, self.zoom);
        let x = cx + pos.x - self.width / 2.0;
        let y = cy + pos.y - self.height / 2.0;
        Location::new(y_to_lat(y / TILE_SIZE, self.zoom), x_to_lon(x / TILE_SIZE, self.zoom))
    }
}
