//! # Reference Constructions
//!
//! Named mazes with known shortest-path lengths, embedded from
//! `constructions.json`. These document hand-built families (the counter
//! pump most prominently), anchor the end-to-end tests, and give the CLI
//! something to demonstrate without a search.

use crate::maze::Maze;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;

/// One documented construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Construction {
    /// Lookup name, e.g. "counter-pump-n5-w3".
    pub name: String,
    pub nterm: usize,
    /// Maze in the standard textual format.
    pub maze: String,
    /// Known shortest-path length.
    pub length: usize,
}

impl Construction {
    pub fn to_maze(&self) -> Maze {
        Maze::parse(self.nterm, &self.maze)
            .unwrap_or_else(|e| panic!("construction {} does not parse: {}", self.name, e))
    }
}

static CONSTRUCTIONS_DATA: Lazy<Vec<Construction>> = Lazy::new(|| {
    const CONSTRUCTIONS_JSON: &str = include_str!("constructions.json");
    serde_json::from_str(CONSTRUCTIONS_JSON).expect("failed to parse constructions.json")
});

/// All known constructions, in documentation order.
pub fn all_constructions() -> &'static [Construction] {
    &CONSTRUCTIONS_DATA
}

static CONSTRUCTION_MAP: Lazy<HashMap<&str, &Construction>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for c in CONSTRUCTIONS_DATA.iter() {
        map.insert(c.name.as_str(), c);
    }
    map
});

/// Looks up a construction by name.
pub fn get_construction(name: &str) -> Option<&'static Construction> {
    CONSTRUCTION_MAP.get(name).copied()
}
