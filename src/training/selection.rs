//! What the user has picked for the next session.
//!
//! Selection is scoped to one dance: switching the dance clears the picked
//! elements and resets the difficulty filter.

use std::collections::BTreeSet;

use crate::catalog::{Catalog, DanceElement, DifficultyFilter};

use super::scheduler::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSelection {
    dance_id: Option<String>,
    element_ids: BTreeSet<String>,
    filter: DifficultyFilter,
    interval_secs: i64,
    music_id: Option<String>,
}

impl ElementSelection {
    /// Start on the first dance of `catalog` with nothing selected.
    pub fn new(catalog: &Catalog, interval_secs: i64) -> Self {
        Self {
            dance_id: catalog.dances().first().map(|d| d.id.clone()),
            element_ids: BTreeSet::new(),
            filter: DifficultyFilter::All,
            interval_secs,
            music_id: None,
        }
    }

    pub fn dance_id(&self) -> Option<&str> {
        self.dance_id.as_deref()
    }

    /// Switch to another dance.  Re-selecting the current dance keeps the
    /// selection.
    pub fn select_dance(&mut self, dance_id: &str) {
        if self.dance_id.as_deref() == Some(dance_id) {
            return;
        }
        self.dance_id = Some(dance_id.to_string());
        self.element_ids.clear();
        self.filter = DifficultyFilter::All;
    }

    /// Fall back to the first dance when the selected one no longer exists.
    /// Returns `true` when the selection changed.
    pub fn reconcile(&mut self, catalog: &Catalog) -> bool {
        let still_there = self
            .dance_id
            .as_deref()
            .is_some_and(|id| catalog.dance(id).is_some());
        if still_there {
            return false;
        }
        let fallback = catalog.dances().first().map(|d| d.id.clone());
        if fallback == self.dance_id {
            return false;
        }
        self.dance_id = fallback;
        self.element_ids.clear();
        self.filter = DifficultyFilter::All;
        true
    }

    pub fn filter(&self) -> DifficultyFilter {
        self.filter
    }

    /// Changing the filter does not touch the selected ids.
    pub fn set_filter(&mut self, filter: DifficultyFilter) {
        self.filter = filter;
    }

    /// Elements of the current dance visible under the current filter.
    pub fn filtered<'a>(&self, catalog: &'a Catalog) -> Vec<&'a DanceElement> {
        self.dance_id
            .as_deref()
            .and_then(|id| catalog.dance(id))
            .map(|dance| {
                dance
                    .elements
                    .iter()
                    .filter(|e| self.filter.matches(e))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.element_ids
    }

    pub fn is_selected(&self, element_id: &str) -> bool {
        self.element_ids.contains(element_id)
    }

    /// Flip one element.  Returns whether it is selected afterwards.
    pub fn toggle(&mut self, element_id: &str) -> bool {
        if self.element_ids.remove(element_id) {
            false
        } else {
            self.element_ids.insert(element_id.to_string());
            true
        }
    }

    /// Replace the selection with every visible element.
    pub fn select_all(&mut self, catalog: &Catalog) {
        self.element_ids = self
            .filtered(catalog)
            .into_iter()
            .map(|e| e.id.clone())
            .collect();
    }

    pub fn deselect_all(&mut self) {
        self.element_ids.clear();
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    pub fn set_interval_secs(&mut self, secs: i64) {
        self.interval_secs = secs;
    }

    pub fn music_id(&self) -> Option<&str> {
        self.music_id.as_deref()
    }

    pub fn set_music(&mut self, music_id: Option<String>) {
        self.music_id = music_id;
    }

    /// Snapshot for [`TrainingScheduler::start`](super::TrainingScheduler::start).
    /// `None` when there is no dance to train.
    pub fn session_config(&self) -> Option<SessionConfig> {
        Some(SessionConfig {
            dance_id: self.dance_id.clone()?,
            element_ids: self.element_ids.clone(),
            interval_secs: self.interval_secs,
            music_id: self.music_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{initial_dances, Difficulty};

    fn catalog() -> Catalog {
        Catalog::in_memory(initial_dances())
    }

    #[test]
    fn starts_on_first_dance() {
        let c = catalog();
        let sel = ElementSelection::new(&c, 8);
        assert_eq!(sel.dance_id(), Some("salsa"));
        assert!(sel.selected().is_empty());
        assert_eq!(sel.filter(), DifficultyFilter::All);
    }

    #[test]
    fn empty_catalog_has_no_dance_and_no_session() {
        let c = Catalog::in_memory(Vec::new());
        let sel = ElementSelection::new(&c, 8);
        assert!(sel.dance_id().is_none());
        assert!(sel.session_config().is_none());
    }

    #[test]
    fn toggle_flips() {
        let c = catalog();
        let mut sel = ElementSelection::new(&c, 8);
        assert!(sel.toggle("salsa-1"));
        assert!(sel.is_selected("salsa-1"));
        assert!(!sel.toggle("salsa-1"));
        assert!(!sel.is_selected("salsa-1"));
    }

    #[test]
    fn switching_dance_clears_selection_and_filter() {
        let c = catalog();
        let mut sel = ElementSelection::new(&c, 8);
        sel.toggle("salsa-1");
        sel.set_filter(DifficultyFilter::Only(Difficulty::Hard));

        sel.select_dance("salsa");
        assert!(sel.is_selected("salsa-1"));

        sel.select_dance("bachata");
        assert!(sel.selected().is_empty());
        assert_eq!(sel.filter(), DifficultyFilter::All);
    }

    #[test]
    fn select_all_respects_filter() {
        let c = catalog();
        let mut sel = ElementSelection::new(&c, 8);
        sel.toggle("salsa-5");
        sel.set_filter(DifficultyFilter::Only(Difficulty::Easy));
        sel.select_all(&c);
        let ids: Vec<&str> = sel.selected().iter().map(String::as_str).collect();
        assert_eq!(ids, ["salsa-1", "salsa-2"]);

        sel.deselect_all();
        assert!(sel.selected().is_empty());
    }

    #[test]
    fn filter_change_keeps_hidden_selections() {
        let c = catalog();
        let mut sel = ElementSelection::new(&c, 8);
        sel.toggle("salsa-5");
        sel.set_filter(DifficultyFilter::Only(Difficulty::Easy));
        assert!(sel.is_selected("salsa-5"));
        assert_eq!(sel.filtered(&c).len(), 2);
    }

    #[test]
    fn reconcile_falls_back_to_first_dance() {
        let c = catalog();
        let mut sel = ElementSelection::new(&c, 8);
        sel.select_dance("gone");
        sel.toggle("x");
        assert!(sel.reconcile(&c));
        assert_eq!(sel.dance_id(), Some("salsa"));
        assert!(sel.selected().is_empty());
        assert!(!sel.reconcile(&c));
    }

    #[test]
    fn unknown_dance_then_select_all_uses_first_dance() {
        let c = catalog();
        let mut sel = ElementSelection::new(&c, 8);
        sel.select_dance("tango");
        assert!(sel.reconcile(&c));
        sel.select_all(&c);

        let cfg = sel.session_config().unwrap();
        assert_eq!(cfg.dance_id, "salsa");
        assert_eq!(cfg.element_ids.len(), 5);
    }

    #[test]
    fn session_config_snapshots_choices() {
        let c = catalog();
        let mut sel = ElementSelection::new(&c, 8);
        sel.toggle("salsa-2");
        sel.set_interval_secs(0);
        sel.set_music(Some("music-1".into()));

        let cfg = sel.session_config().unwrap();
        assert_eq!(cfg.dance_id, "salsa");
        assert_eq!(cfg.interval_secs, 0);
        assert_eq!(cfg.music_id.as_deref(), Some("music-1"));
        assert!(cfg.element_ids.contains("salsa-2"));
    }
}
