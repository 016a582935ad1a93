#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region definitions.
//!
//! A region is a named set of state names plus a display color. The
//! built-in table is embedded at compile time from `regions.toml`; a
//! custom table can be parsed with [`RegionTable::from_toml_str`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedded default table.
const BUILTIN_REGIONS: &str = include_str!("../regions.toml");

/// Color for states outside every region.
pub const DEFAULT_REGION_COLOR: &str = "#CCCCCC";

/// Errors that can occur when loading or querying a region table.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The TOML could not be parsed.
    #[error("Region table parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// No region has this name.
    #[error("Unknown region: {name}")]
    UnknownRegion {
        /// The requested name.
        name: String,
    },
}

/// One region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region name (e.g. `"West"`).
    pub name: String,
    /// Display color as `#RRGGBB`.
    pub color: String,
    /// Full names of member states.
    pub states: Vec<String>,
}

impl Region {
    /// Returns `true` if the state belongs to this region.
    #[must_use]
    pub fn contains(&self, state_name: &str) -> bool {
        self.states.iter().any(|s| s == state_name)
    }
}

/// All regions, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTable {
    #[serde(default = "default_color")]
    default_color: String,
    #[serde(rename = "region", default)]
    regions: Vec<Region>,
}

fn default_color() -> String {
    DEFAULT_REGION_COLOR.to_string()
}

impl RegionTable {
    /// The built-in five-region table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `regions.toml` fails to parse. It is a
    /// compile-time constant, so a failure is a development error caught
    /// by the tests below.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_REGIONS)
            .unwrap_or_else(|e| panic!("Failed to parse built-in region table: {e}"))
    }

    /// Parses a table from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Parse`] if the TOML is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, RegionError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// All regions.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Region names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.name.as_str())
    }

    /// Looks up a region by name, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::UnknownRegion`] if there is no such region.
    pub fn get(&self, name: &str) -> Result<&Region, RegionError> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| RegionError::UnknownRegion {
                name: name.to_string(),
            })
    }

    /// Member state names of a region.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::UnknownRegion`] if there is no such region.
    pub fn states_in(&self, name: &str) -> Result<&[String], RegionError> {
        self.get(name).map(|r| r.states.as_slice())
    }

    /// The first region containing the state, if any.
    #[must_use]
    pub fn region_of_state(&self, state_name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(state_name))
    }

    /// Display color of a region, or the default color for unknown names.
    #[must_use]
    pub fn color(&self, name: &str) -> &str {
        self.get(name)
            .map_or(self.default_color.as_str(), |r| r.color.as_str())
    }

    /// Display color for a state: its region's color or the default.
    #[must_use]
    pub fn state_color(&self, state_name: &str) -> &str {
        self.region_of_state(state_name)
            .map_or(self.default_color.as_str(), |r| r.color.as_str())
    }
}
