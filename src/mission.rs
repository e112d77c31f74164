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

//! Mission files: routes and marks loaded into the editor at startup.
//!
//! ```json
//! {
//!   "name": "Strike",
//!   "routes": [{ "key": "R1", "points": [{ "lat": 42.17, "lon": 42.48 }] }],
//!   "marks": [{ "kind": "unit_enemy", "key": "SA-6", "location": { "lat": 42.5, "lon": 41.6 }, "ring_radius_m": 25000 }]
//! }
//! ```

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use geo_edit::{Location, Renderer, Surface, TagKind};

#[derive(Debug, Error)]
pub enum MissionError {
    #[error("failed to read mission file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid mission file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("mark {key} has kind {kind}, which is not a mark kind")]
    NotAMark { key: String, kind: TagKind },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteDef {
    /// Generated when absent
    #[serde(default)]
    pub key: Option<String>,
    pub points: Vec<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkDef {
    pub kind: TagKind,
    #[serde(default)]
    pub key: Option<String>,
    pub location: Location,
    #[serde(default)]
    pub ring_radius_m: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub routes: Vec<RouteDef>,
    #[serde(default)]
    pub marks: Vec<MarkDef>,
}

fn generated_key() -> String {
    Uuid::new_v4().to_string()
}

impl Mission {
    /// Read and validate a mission file.
    pub fn load(path: &Path) -> Result<Self, MissionError> {
        let text = std::fs::read_to_string(path).map_err(|source| MissionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, MissionError> {
        let mission: Self = serde_json::from_str(text)?;
        for mark in &mission.marks {
            if !mark.kind.is_mark() {
                return Err(MissionError::NotAMark {
                    key: mark.key.clone().unwrap_or_default(),
                    kind: mark.kind,
                });
            }
        }
        Ok(mission)
    }

    /// The mission shown when no file is given.
    pub fn demo() -> Self {
        Self {
            name: "Demo: Kutaisi sweep".to_string(),
            routes: vec![
                RouteDef {
                    key: Some("R1".to_string()),
                    points: vec![
                        Location::new(42.176, 42.482),
                        Location::new(42.240, 42.047),
                        Location::new(42.590, 41.650),
                        Location::new(42.858, 41.128),
                    ],
                },
                RouteDef {
                    key: Some("R2".to_string()),
                    points: vec![Location::new(41.930, 44.950), Location::new(42.250, 43.600)],
                },
            ],
            marks: vec![
                MarkDef {
                    kind: TagKind::Bullseye,
                    key: Some("BULLSEYE".to_string()),
                    location: Location::new(42.500, 42.200),
                    ring_radius_m: 0.0,
                },
                MarkDef {
                    kind: TagKind::UnitEnemy,
                    key: Some("SA-6".to_string()),
                    location: Location::new(42.700, 41.800),
                    ring_radius_m: 25_000.0,
                },
                MarkDef {
                    kind: TagKind::UnitEnemy,
                    key: Some("SA-10".to_string()),
                    location: Location::new(43.100, 40.600),
                    ring_radius_m: 90_000.0,
                },
                MarkDef {
                    kind: TagKind::UnitFriend,
                    key: Some("TANKER".to_string()),
                    location: Location::new(41.800, 42.900),
                    ring_radius_m: 0.0,
                },
                MarkDef {
                    kind: TagKind::PoiUser,
                    key: Some("IP".to_string()),
                    location: Location::new(42.400, 41.900),
                    ring_radius_m: 0.0,
                },
            ],
        }
    }

    /// Add every route and mark through `surface`, so other surfaces receive
    /// them via the mirror. Returns how many routes and marks were accepted.
    pub fn populate<R: Renderer>(&self, surface: &mut Surface<R>) -> (usize, usize) {
        let mut routes = 0;
        for route in &self.routes {
            let key = route.key.clone().unwrap_or_else(generated_key);
            if surface.add_path(&key, &route.points) {
                routes += 1;
            } else {
                warn!("Route {key} was not added on {}", surface.name());
            }
        }

        let mut marks = 0;
        for mark in &self.marks {
            let key = mark.key.clone().unwrap_or_else(generated_key);
            if surface.add_mark(mark.kind, &key, mark.location, mark.ring_radius_m) {
                marks += 1;
            } else {
                warn!("Mark {key} was not added on {}", surface.name());
            }
        }

        info!("Loaded mission '{}': {routes} routes, {marks} marks", self.name);
        (routes, marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_edit::{EditMask, EditorConfig, Scene, VerbMirror};

    #[test]
    fn test_parse_minimal_mission() {
        let mission = Mission::parse(
            r#"{
                "routes": [{ "points": [{ "lat": 1.0, "lon": 2.0 }] }],
                "marks": [{ "kind": "unit_enemy", "location": { "lat": 3.0, "lon": 4.0 } }]
            }"#,
        )
        .unwrap();
        assert_eq!(mission.routes[0].key, None);
        assert_eq!(mission.marks[0].ring_radius_m, 0.0);
        assert!(mission.name.is_empty());
    }

    #[test]
    fn test_rejects_non_mark_kind() {
        let err = Mission::parse(
            r#"{ "marks": [{ "kind": "nav_point", "key": "X", "location": { "lat": 0, "lon": 0 } }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, MissionError::NotAMark { kind: TagKind::NavPoint, .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(Mission::parse("{ nope"), Err(MissionError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Mission::load(Path::new("/nonexistent/mission.json")).unwrap_err();
        assert!(matches!(err, MissionError::Io { .. }));
    }

    #[test]
    fn test_populate_mirrors_to_other_surface() {
        let mirror = VerbMirror::new(64);
        let mut editor = Surface::new("editor", Scene::new(), EditMask::all(), EditorConfig::default(), &mirror);
        let mut popout = Surface::new("popout", Scene::new(), EditMask::read_only(), EditorConfig::default(), &mirror);

        let mission = Mission::demo();
        assert_eq!(mission.populate(&mut editor), (2, 5));

        popout.sync(std::time::Instant::now());
        assert_eq!(popout.model().paths().count(), 2);
        assert_eq!(popout.model().marks().count(), 5);
        assert!(popout.model().mark("SA-10").unwrap().has_ring());
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let mirror = VerbMirror::new(8);
        let mut editor = Surface::new("editor", Scene::new(), EditMask::all(), EditorConfig::default(), &mirror);
        let point = Location::new(1.0, 1.0);
        let mission = Mission {
            name: String::new(),
            routes: vec![
                RouteDef { key: None, points: vec![point] },
                RouteDef { key: None, points: vec![point] },
            ],
            marks: Vec::new(),
        };
        assert_eq!(mission.populate(&mut editor), (2, 0));
        assert_eq!(editor.model().paths().count(), 2);
    }
}
