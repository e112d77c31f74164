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

//! Tag addressing for interactive map elements.
//!
//! Every element a user can touch (a route point, a marker, an edit handle) is
//! addressed by a [`Tag`]: its kind, the key of the path or mark that owns it,
//! and, for path elements, its 1-based position. Tags are plain values; the
//! model resolves them to its own storage and to renderer handles through
//! lookup tables, so nothing ever holds a reference across that boundary.
//!
//! Tags also have an opaque string form (`kind:key:position`) for attaching to
//! external visuals. Decoding that form never fails: anything malformed becomes
//! the Unknown tag, which every consumer treats as "nothing there".

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoded position used when a tag has none.
const NO_POSITION: i64 = -1;

/// Errors produced when parsing the string form of a tag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown tag kind: {0}")]
    UnknownKind(String),

    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

/// The kind of an interactive element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    PoiSystem,
    PoiUser,
    PoiCampaign,
    NavPoint,
    UserPoint,
    UnitFriend,
    UnitEnemy,
    Bullseye,
    PathEditHandle,
    RingEditHandle,
    Unknown,
}

impl TagKind {
    pub const ALL: [TagKind; 11] = [
        Self::PoiSystem,
        Self::PoiUser,
        Self::PoiCampaign,
        Self::NavPoint,
        Self::UserPoint,
        Self::UnitFriend,
        Self::UnitEnemy,
        Self::Bullseye,
        Self::PathEditHandle,
        Self::RingEditHandle,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PoiSystem => "poi_system",
            Self::PoiUser => "poi_user",
            Self::PoiCampaign => "poi_campaign",
            Self::NavPoint => "nav_point",
            Self::UserPoint => "user_point",
            Self::UnitFriend => "unit_friend",
            Self::UnitEnemy => "unit_enemy",
            Self::Bullseye => "bullseye",
            Self::PathEditHandle => "path_edit_handle",
            Self::RingEditHandle => "ring_edit_handle",
            Self::Unknown => "unknown",
        }
    }

    /// Standalone marker kinds stored as marks.
    #[must_use]
    pub fn is_mark(self) -> bool {
        matches!(
            self,
            Self::PoiSystem
                | Self::PoiUser
                | Self::PoiCampaign
                | Self::UserPoint
                | Self::UnitFriend
                | Self::UnitEnemy
                | Self::Bullseye
        )
    }

    #[must_use]
    pub fn is_edit_handle(self) -> bool {
        matches!(self, Self::PathEditHandle | Self::RingEditHandle)
    }

    /// Kinds whose tags carry a 1-based position within a path.
    #[must_use]
    pub fn has_position(self) -> bool {
        matches!(self, Self::NavPoint | Self::PathEditHandle)
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagKind {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TagParseError::UnknownKind(s.to_string()))
    }
}

/// Address of one interactive element.
///
/// Invariant: an Unknown tag has no key and no position, and only kinds for
/// which [`TagKind::has_position`] holds ever carry a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    kind: TagKind,
    key: Option<String>,
    position: Option<usize>,
}

impl Tag {
    /// Build a tag, normalizing fields the kind does not use.
    #[must_use]
    pub fn encode(kind: TagKind, key: Option<&str>, position: Option<usize>) -> Self {
        if kind == TagKind::Unknown {
            return Self::unknown();
        }
        Self {
            kind,
            key: key.map(str::to_string),
            position: position.filter(|p| kind.has_position() && *p > 0),
        }
    }

    /// Decode the string form of a tag; `None` and malformed input yield Unknown.
    #[must_use]
    pub fn decode(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                debug!("Ignoring malformed tag {raw:?}: {e}");
                Self::unknown()
            }),
            None => Self::unknown(),
        }
    }

    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            kind: TagKind::Unknown,
            key: None,
            position: None,
        }
    }

    /// A point of a path at a 1-based position.
    #[must_use]
    pub fn nav_point(key: &str, position: usize) -> Self {
        Self::encode(TagKind::NavPoint, Some(key), Some(position))
    }

    /// A whole path, with no particular point.
    #[must_use]
    pub fn path(key: &str) -> Self {
        Self::encode(TagKind::NavPoint, Some(key), None)
    }

    /// A path edit handle that inserts at the given 1-based position.
    #[must_use]
    pub fn path_handle(key: &str, position: usize) -> Self {
        Self::encode(TagKind::PathEditHandle, Some(key), Some(position))
    }

    #[must_use]
    pub fn mark(kind: TagKind, key: &str) -> Self {
        Self::encode(kind, Some(key), None)
    }

    #[must_use]
    pub fn ring_handle(key: &str) -> Self {
        Self::encode(TagKind::RingEditHandle, Some(key), None)
    }

    #[must_use]
    pub fn kind(&self) -> TagKind {
        self.kind
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// 1-based position, for path points and path edit handles.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// 0-based index derived from the position.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.position.map(|p| p - 1)
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        self.kind != TagKind::Unknown
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = self
            .position
            .and_then(|p| i64::try_from(p).ok())
            .unwrap_or(NO_POSITION);
        write!(
            f,
            "{}:{}:{}",
            self.kind,
            self.key.as_deref().unwrap_or_default(),
            position
        )
    }
}

impl FromStr for Tag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s.split_once(':').ok_or(TagParseError::MissingField("key"))?;
        let (key, position) = rest
            .rsplit_once(':')
            .ok_or(TagParseError::MissingField("position"))?;

        let kind: TagKind = kind.parse()?;
        let position: i64 = position
            .parse()
            .map_err(|e| TagParseError::InvalidPosition(format!("{position}: {e}")))?;
        let position = match position {
            NO_POSITION => None,
            p => Some(
                usize::try_from(p).map_err(|e| TagParseError::InvalidPosition(format!("{p}: {e}")))?,
            ),
        };
        let key = (!key.is_empty()).then_some(key);

        Ok(Self::encode(kind, key, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_invariant() {
        let tag = Tag::encode(TagKind::Unknown, Some("R1"), Some(3));
        assert_eq!(tag.kind(), TagKind::Unknown);
        assert_eq!(tag.key(), None);
        assert_eq!(tag.position(), None);
        assert_eq!(tag.to_string(), "unknown::-1");
    }

    #[test]
    fn test_marks_never_carry_position() {
        let tag = Tag::encode(TagKind::UnitEnemy, Some("SA-6"), Some(2));
        assert_eq!(tag.position(), None);
        assert_eq!(tag.to_string(), "unit_enemy:SA-6:-1");
    }

    #[test]
    fn test_zero_position_is_dropped() {
        assert_eq!(Tag::encode(TagKind::NavPoint, Some("R1"), Some(0)).position(), None);
    }

    #[test]
    fn test_decode_string_form() {
        let tag = Tag::decode(Some("nav_point:R1:2"));
        assert_eq!(tag, Tag::nav_point("R1", 2));
        assert_eq!(tag.index(), Some(1));
    }

    #[test]
    fn test_decode_key_with_separator() {
        let tag = Tag::decode(Some("poi_user:Batumi:Tower:-1"));
        assert_eq!(tag.kind(), TagKind::PoiUser);
        assert_eq!(tag.key(), Some("Batumi:Tower"));
    }

    #[test]
    fn test_decode_malformed_is_unknown() {
        for raw in ["", "nav_point", "nav_point:R1", "bogus:R1:1", "nav_point:R1:x", "nav_point:R1:-7"] {
            assert_eq!(Tag::decode(Some(raw)), Tag::unknown(), "input {raw:?}");
        }
        assert_eq!(Tag::decode(None), Tag::unknown());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("nav_point".parse::<Tag>(), Err(TagParseError::MissingField("key")));
        assert_eq!(
            "ship:A:1".parse::<Tag>(),
            Err(TagParseError::UnknownKind("ship".to_string()))
        );
    }

    #[test]
    fn test_kind_predicates() {
        assert!(TagKind::Bullseye.is_mark());
        assert!(!TagKind::NavPoint.is_mark());
        assert!(TagKind::RingEditHandle.is_edit_handle());
        assert!(TagKind::PathEditHandle.has_position());
        assert!(!TagKind::RingEditHandle.has_position());
    }
}
