use serde::{Deserialize, Serialize};

/// One pollable metric within a vendor namespace.
///
/// `statistics_kind` names the aggregate field the transform extracts
/// (`"Average"`, `"Maximum"`, ...). A comma-joined list means any of the
/// listed fields may be present in a datapoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceCatalogEntry {
    pub namespace: String,
    pub metric_name: String,
    #[serde(default)]
    pub statistics_kind: String,
}

impl NamespaceCatalogEntry {
    pub fn new(
        namespace: impl Into<String>,
        metric_name: impl Into<String>,
        statistics_kind: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            statistics_kind: statistics_kind.into(),
        }
    }

    /// The candidate statistics fields in listed order, blanks dropped.
    pub fn statistics_kinds(&self) -> impl Iterator<Item = &str> {
        self.statistics_kind
            .split(',')
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
    }
}

/// Sort and de-duplicate a freshly listed catalog.
///
/// Catalogs are compared by value to detect drift; normalizing first keeps
/// a vendor-side reordering from looking like a change.
pub fn normalize_catalog(mut entries: Vec<NamespaceCatalogEntry>) -> Vec<NamespaceCatalogEntry> {
    entries.sort();
    entries.dedup();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_kinds_split_in_order() {
        let entry = NamespaceCatalogEntry::new("acs_ecs", "cpu", "Maximum, Average,,Minimum");
        let kinds: Vec<_> = entry.statistics_kinds().collect();
        assert_eq!(kinds, vec!["Maximum", "Average", "Minimum"]);
    }

    #[test]
    fn empty_statistics_kind_yields_nothing() {
        let entry = NamespaceCatalogEntry::new("acs_ecs", "cpu", "");
        assert_eq!(entry.statistics_kinds().count(), 0);
    }

    #[test]
    fn normalize_ignores_order_and_duplicates() {
        let a = normalize_catalog(vec![
            NamespaceCatalogEntry::new("ns", "b", "Average"),
            NamespaceCatalogEntry::new("ns", "a", "Average"),
            NamespaceCatalogEntry::new("ns", "b", "Average"),
        ]);
        let b = normalize_catalog(vec![
            NamespaceCatalogEntry::new("ns", "a", "Average"),
            NamespaceCatalogEntry::new("ns", "b", "Average"),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn statistics_kind_is_part_of_equality() {
        let a = NamespaceCatalogEntry::new("ns", "cpu", "Average");
        let b = NamespaceCatalogEntry::new("ns", "cpu", "Maximum");
        assert_ne!(a, b);
    }
}
