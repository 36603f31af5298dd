//! Rock hardness table and free-text rock classification

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Mechanical properties of a rock class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RockHardness {
    /// Mohs scale, 1-10
    pub mohs: f64,
    /// Uniaxial compressive strength (MPa)
    pub compressive_strength: f64,
    pub weight: f64,
}

impl RockHardness {
    const fn new(mohs: f64, compressive_strength: f64, weight: f64) -> Self {
        Self {
            mohs,
            compressive_strength,
            weight,
        }
    }

    /// `(0.4 × mohs/10 + 0.6 × strength/200) × weight`
    pub fn composite(&self) -> f64 {
        (0.4 * self.mohs / 10.0 + 0.6 * self.compressive_strength / 200.0) * self.weight
    }
}

/// Hardness composite assumed for rock types missing from the table.
pub const UNKNOWN_HARDNESS: f64 = 0.5;

/// Rock classes that host productive aquifers.
pub const AQUIFER_ROCKS: [&str; 3] = ["sandstone", "limestone", "gravel"];

/// Table lookup by canonical rock class.
pub fn hardness_of(rock: &str) -> Option<RockHardness> {
    let h = match rock {
        "granite" => RockHardness::new(7.0, 200.0, 0.7),
        "limestone" => RockHardness::new(5.0, 60.0, 0.5),
        "sandstone" => RockHardness::new(4.0, 50.0, 0.4),
        "shale" => RockHardness::new(3.0, 30.0, 0.3),
        "clay" => RockHardness::new(1.0, 10.0, 0.1),
        "metamorphic" => RockHardness::new(6.0, 150.0, 0.6),
        "plutonic" => RockHardness::new(7.0, 200.0, 0.7),
        _ => return None,
    };
    Some(h)
}

fn rock_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(granodiorite|granite|diorite|gabbro|syenite|tonalite|plutonic|intrusive|limestone|dolostone|dolomite|chalk|carbonate|sandstone|arenite|greywacke|conglomerate|shale|mudstone|siltstone|claystone|clay|gneiss|schist|quartzite|marble|slate|amphibolite|metamorphic|gravel|alluvium)\b",
            )
            .map_err(|e| warn!(error = %e, "Rock classification pattern failed to compile"))
            .ok()
        })
        .as_ref()
}

/// Map a free-text rock description ("Fine-grained Sandstone",
/// "biotite gneiss") to a canonical class. The leftmost recognised word
/// wins.
pub fn classify_rock(text: &str) -> Option<&'static str> {
    let word = rock_pattern()?.find(text)?.as_str().to_lowercase();
    let class = match word.as_str() {
        "granite" | "granodiorite" => "granite",
        "diorite" | "gabbro" | "syenite" | "tonalite" | "plutonic" | "intrusive" => "plutonic",
        "limestone" | "dolostone" | "dolomite" | "chalk" | "carbonate" => "limestone",
        "sandstone" | "arenite" | "greywacke" | "conglomerate" => "sandstone",
        "shale" | "mudstone" | "siltstone" => "shale",
        "clay" | "claystone" => "clay",
        "gneiss" | "schist" | "quartzite" | "marble" | "slate" | "amphibolite" | "metamorphic" => {
            "metamorphic"
        }
        "gravel" | "alluvium" => "gravel",
        _ => return None,
    };
    Some(class)
}

pub fn is_aquifer_rock(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    AQUIFER_ROCKS.contains(&lower.as_str())
        || classify_rock(&lower).is_some_and(|c| AQUIFER_ROCKS.contains(&c))
}
