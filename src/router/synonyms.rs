//! Synonym groups for focus matching

use std::collections::{BTreeSet, HashMap};

/// Groups of interchangeable product terms
///
/// Every term maps to the first term of its group, so comparing canonical
/// forms expands synonyms in both directions at once.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    canonical: HashMap<String, String>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::new(&[
            &["stretch wrap", "stretch film", "pallet wrap", "pallet film"],
            &["shrink wrap", "shrink film"],
            &[
                "corrugated boxes",
                "corrugated box",
                "shipping boxes",
                "cardboard boxes",
            ],
            &["poly mailers", "mailer bags", "poly bags"],
            &["mailer boxes", "mailer box"],
            &["bubble wrap", "air pillows", "cushioning"],
            &["packing tape", "packaging tape", "carton sealing tape"],
            &["void fill", "packing peanuts", "kraft paper"],
            &["strapping", "pallet strapping", "banding"],
            &["labels", "shipping labels"],
        ])
    }
}

impl SynonymTable {
    pub fn new(groups: &[&[&str]]) -> Self {
        let mut canonical = HashMap::new();
        for group in groups {
            let Some(head) = group.first().map(|t| normalize(t)) else {
                continue;
            };
            for term in group.iter() {
                canonical.entry(normalize(term)).or_insert_with(|| head.clone());
            }
        }
        Self { canonical }
    }

    /// Canonical form of `term`; unknown terms stand for themselves
    pub fn canonical(&self, term: &str) -> String {
        let key = normalize(term);
        match self.canonical.get(&key) {
            Some(head) => head.clone(),
            None => key,
        }
    }

    /// Canonical forms of `terms`, blanks dropped
    pub fn canonical_set<'a>(&self, terms: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
        terms
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| self.canonical(t))
            .collect()
    }

    /// Jaccard similarity of two term lists after canonicalization
    ///
    /// Returns `None` when `focuses` is empty.
    pub fn jaccard(&self, focuses: &[String], found: &[String]) -> Option<f64> {
        let focus_set = self.canonical_set(focuses);
        if focus_set.is_empty() {
            return None;
        }
        let found_set = self.canonical_set(found);

        let shared = focus_set.intersection(&found_set).count();
        let union = focus_set.union(&found_set).count();
        Some(shared as f64 / union as f64)
    }
}

fn normalize(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_synonyms_share_canonical_form() {
        let table = SynonymTable::default();
        assert_eq!(table.canonical("Pallet  Film"), "stretch wrap");
        assert_eq!(table.canonical("stretch wrap"), "stretch wrap");
        assert_eq!(table.canonical("Foam Inserts"), "foam inserts");
    }

    #[test]
    fn test_jaccard_with_synonyms() {
        let table = SynonymTable::default();

        let full = table
            .jaccard(&terms(&["stretch wrap"]), &terms(&["pallet film", "stretch film"]))
            .unwrap();
        assert_eq!(full, 1.0);

        let half = table
            .jaccard(&terms(&["stretch wrap"]), &terms(&["pallet wrap", "bubble wrap"]))
            .unwrap();
        assert_eq!(half, 0.5);

        let none = table.jaccard(&terms(&["shrink wrap"]), &[]).unwrap();
        assert_eq!(none, 0.0);
    }

    #[test]
    fn test_no_focus_is_none() {
        let table = SynonymTable::default();
        assert_eq!(table.jaccard(&[], &terms(&["labels"])), None);
        assert_eq!(table.jaccard(&terms(&[" "]), &terms(&["labels"])), None);
    }
}
