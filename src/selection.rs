//! Checklist selection state
//!
//! Maps every catalog package name to a "selected" flag. All flags start
//! false. The installer never reads this state directly: `snapshot()` copies
//! the selected names (in catalog order) when a run starts, so later toggles
//! cannot affect an in-flight run.

use std::collections::HashMap;

use crate::catalog::Catalog;
use crate::error::{Result, ZapError};

/// Operator's current package selection
#[derive(Debug, Clone)]
pub struct SelectionState {
    /// Package names in catalog insertion order
    order: Vec<String>,
    flags: HashMap<String, bool>,
}

impl SelectionState {
    /// Create a selection covering every package in the catalog, none selected
    pub fn new(catalog: &Catalog) -> Self {
        let order: Vec<String> = catalog.package_names().map(str::to_string).collect();
        let flags = order.iter().map(|name| (name.clone(), false)).collect();
        Self { order, flags }
    }

    /// Set the flag for one package
    ///
    /// # Errors
    ///
    /// `UnknownPackage` if the name is not part of this selection
    pub fn set(&mut self, name: &str, selected: bool) -> Result<()> {
        match self.flags.get_mut(name) {
            Some(flag) => {
                *flag = selected;
                Ok(())
            }
            None => Err(ZapError::unknown_package(name)),
        }
    }

    pub fn select(&mut self, name: &str) -> Result<()> {
        self.set(name, true)
    }

    pub fn deselect(&mut self, name: &str) -> Result<()> {
        self.set(name, false)
    }

    /// Flip one flag, returning the new value
    pub fn toggle(&mut self, name: &str) -> Result<bool> {
        let flag = self
            .flags
            .get_mut(name)
            .ok_or_else(|| ZapError::unknown_package(name))?;
        *flag = !*flag;
        Ok(*flag)
    }

    pub fn select_all(&mut self) {
        self.flags.values_mut().for_each(|flag| *flag = true);
    }

    pub fn deselect_all(&mut self) {
        self.flags.values_mut().for_each(|flag| *flag = false);
    }

    /// Returns false for unknown names
    pub fn is_selected(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn selected_count(&self) -> usize {
        self.flags.values().filter(|&&flag| flag).count()
    }

    /// All package names, selected or not, in catalog order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Selected names in catalog insertion order (not the order they were
    /// selected in).
    pub fn snapshot(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.is_selected(name))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, PackageEntry};

    fn catalog() -> Catalog {
        Catalog::from_categories(vec![
            Category::new(
                "Development",
                vec![
                    PackageEntry::new("Git", "w", "l", "m"),
                    PackageEntry::new("Python", "w", "l", "m"),
                ],
            ),
            Category::new("Browsers", vec![PackageEntry::new("Firefox", "w", "l", "m")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_selection_is_empty() {
        let selection = SelectionState::new(&catalog());
        assert_eq!(selection.selected_count(), 0);
        assert!(selection.snapshot().is_empty());
        assert_eq!(selection.names(), ["Git", "Python", "Firefox"]);
    }

    #[test]
    fn test_snapshot_uses_catalog_order() {
        let mut selection = SelectionState::new(&catalog());
        selection.select("Firefox").unwrap();
        selection.select("Python").unwrap();
        selection.select("Git").unwrap();

        assert_eq!(selection.snapshot(), vec!["Git", "Python", "Firefox"]);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_changes() {
        let mut selection = SelectionState::new(&catalog());
        selection.select("Git").unwrap();
        let snapshot = selection.snapshot();

        selection.deselect("Git").unwrap();
        selection.select("Firefox").unwrap();

        assert_eq!(snapshot, vec!["Git"]);
    }

    #[test]
    fn test_toggle_flips_flag() {
        let mut selection = SelectionState::new(&catalog());
        assert!(selection.toggle("Python").unwrap());
        assert!(selection.is_selected("Python"));
        assert!(!selection.toggle("Python").unwrap());
        assert!(!selection.is_selected("Python"));
    }

    #[test]
    fn test_select_all_and_deselect_all() {
        let mut selection = SelectionState::new(&catalog());
        selection.select_all();
        assert_eq!(selection.selected_count(), 3);
        assert_eq!(selection.snapshot(), vec!["Git", "Python", "Firefox"]);

        selection.deselect_all();
        assert_eq!(selection.selected_count(), 0);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let mut selection = SelectionState::new(&catalog());
        assert!(matches!(selection.select("Vim"), Err(ZapError::UnknownPackage(_))));
        assert!(selection.toggle("Vim").is_err());
        assert!(!selection.is_selected("Vim"));
    }
}
