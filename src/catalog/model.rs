//! Dance library records.
//!
//! The serialized shape matches `catalog.json`: camelCase field names and
//! lowercase difficulty tags.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::video::VideoHandle;

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// How hard an element is to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Position on the easy → hard scale, used for sorting.
    pub fn rank(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Easy
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}' (expected easy, medium or hard)")),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// DanceElement / Dance
// ---------------------------------------------------------------------------

/// A single named movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanceElement {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Handle into the in-memory video registry.  Only valid for the life of
    /// the process that created it.
    #[serde(default, rename = "videoUrl", skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub elements: Vec<DanceElement>,
}

impl Dance {
    pub fn element(&self, element_id: &str) -> Option<&DanceElement> {
        self.elements.iter().find(|e| e.id == element_id)
    }

    /// Elements in display order for `order`.  The sort is stable, so equal
    /// difficulties keep their insertion order.
    pub fn sorted_elements(&self, order: SortOrder) -> Vec<&DanceElement> {
        let mut elements: Vec<&DanceElement> = self.elements.iter().collect();
        match order {
            SortOrder::Default => {}
            SortOrder::DifficultyAsc => {
                elements.sort_by(|a, b| a.difficulty.rank().cmp(&b.difficulty.rank()))
            }
            SortOrder::DifficultyDesc => {
                elements.sort_by(|a, b| b.difficulty.rank().cmp(&a.difficulty.rank()))
            }
        }
        elements
    }
}

// ---------------------------------------------------------------------------
// SortOrder / DifficultyFilter
// ---------------------------------------------------------------------------

/// Element ordering in the library listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Insertion order.
    #[default]
    Default,
    DifficultyAsc,
    DifficultyDesc,
}

/// Which difficulties are visible in the element picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DifficultyFilter {
    #[default]
    All,
    Only(Difficulty),
}

impl DifficultyFilter {
    pub fn matches(self, element: &DanceElement) -> bool {
        match self {
            DifficultyFilter::All => true,
            DifficultyFilter::Only(d) => element.difficulty == d,
        }
    }
}

/// Case-insensitive name comparison used by listings.
pub(crate) fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, difficulty: Difficulty) -> DanceElement {
        DanceElement {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            difficulty,
            video: None,
        }
    }

    fn dance() -> Dance {
        Dance {
            id: "d".into(),
            name: "Dance".into(),
            elements: vec![
                element("a", Difficulty::Hard),
                element("b", Difficulty::Easy),
                element("c", Difficulty::Medium),
                element("d", Difficulty::Easy),
            ],
        }
    }

    fn ids(elements: &[&DanceElement]) -> Vec<String> {
        elements.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn default_order_is_insertion_order() {
        let d = dance();
        assert_eq!(ids(&d.sorted_elements(SortOrder::Default)), ["a", "b", "c", "d"]);
    }

    #[test]
    fn ascending_sort_is_stable() {
        let d = dance();
        assert_eq!(
            ids(&d.sorted_elements(SortOrder::DifficultyAsc)),
            ["b", "d", "c", "a"]
        );
    }

    #[test]
    fn descending_sort() {
        let d = dance();
        assert_eq!(
            ids(&d.sorted_elements(SortOrder::DifficultyDesc)),
            ["a", "c", "b", "d"]
        );
    }

    #[test]
    fn filter_matches_only_requested_difficulty() {
        let d = dance();
        let easy: Vec<_> = d
            .elements
            .iter()
            .filter(|e| DifficultyFilter::Only(Difficulty::Easy).matches(e))
            .collect();
        assert_eq!(easy.len(), 2);
        assert!(d.elements.iter().all(|e| DifficultyFilter::All.matches(e)));
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn element_json_uses_camel_case_and_lowercase_difficulty() {
        let json = serde_json::to_value(element("x", Difficulty::Medium)).unwrap();
        assert_eq!(json["difficulty"], "medium");
        assert!(json.get("videoUrl").is_none());

        let parsed: DanceElement = serde_json::from_str(
            r#"{"id":"x","name":"X","description":"","difficulty":"hard","videoUrl":"video:1"}"#,
        )
        .unwrap();
        assert_eq!(parsed.difficulty, Difficulty::Hard);
        assert!(parsed.video.is_some());
    }
}
