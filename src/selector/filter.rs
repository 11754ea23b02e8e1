use std::fmt;

use crate::tree::{ElementKind, RawChild};

/// Predicate over a metadata-enriched item.
pub struct ItemFilter(Box<dyn Fn(&RawChild) -> bool>);

impl ItemFilter {
    pub fn new(predicate: impl Fn(&RawChild) -> bool + 'static) -> Self {
        Self(Box::new(predicate))
    }

    /// Accepts items whose metadata holds every given key with the given value.
    pub fn requiring(pairs: Vec<(String, String)>) -> Self {
        Self::new(move |item| {
            pairs
                .iter()
                .all(|(key, value)| item.metadata.get(key) == Some(value))
        })
    }

    pub fn accepts(&self, item: &RawChild) -> bool {
        (self.0)(item)
    }
}

impl fmt::Debug for ItemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ItemFilter(..)")
    }
}

/// What the selector shows: which kinds, and which items among them.
#[derive(Debug, Default)]
pub struct SelectionFilter {
    /// Kinds of interest. Empty means every kind.
    pub types: Vec<ElementKind>,
    /// Metadata keys to request before applying `item_filter`.
    pub metadata_types: Vec<String>,
    pub item_filter: Option<ItemFilter>,
}

impl SelectionFilter {
    /// Kinds to ask the source for. Asking for directories means asking for everything.
    pub fn server_types(&self) -> &[ElementKind] {
        if self.types.contains(&ElementKind::Directory) {
            &[]
        } else {
            &self.types
        }
    }

    pub fn accepts_kind(&self, kind: &ElementKind) -> bool {
        self.types.is_empty() || kind.is_directory() || self.types.contains(kind)
    }

    pub fn needs_metadata(&self) -> bool {
        !self.metadata_types.is_empty()
    }

    pub fn accepts_item(&self, item: &RawChild) -> bool {
        item.kind.is_directory()
            || self
                .item_filter
                .as_ref()
                .is_none_or(|filter| filter.accepts(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn filter(types: &[&str]) -> SelectionFilter {
        SelectionFilter {
            types: types.iter().map(|tag| ElementKind::from(*tag)).collect(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&["csv"], 1)]
    #[case(&["csv", "directory"], 0)]
    fn server_types_drop_when_directories_requested(
        #[case] types: &[&str],
        #[case] expected: usize,
    ) {
        assert_eq!(filter(types).server_types().len(), expected);
    }

    #[rstest]
    #[case(&[], "txt", true)]
    #[case(&["csv"], "csv", true)]
    #[case(&["csv"], "txt", false)]
    #[case(&["directory"], "txt", false)]
    #[case(&["csv"], "directory", true)]
    fn content_filter(#[case] types: &[&str], #[case] kind: &str, #[case] expected: bool) {
        assert_eq!(filter(types).accepts_kind(&ElementKind::from(kind)), expected);
    }

    #[test]
    fn required_metadata_must_all_match() {
        let filter = ItemFilter::requiring(vec![
            ("extension".into(), "csv".into()),
            ("readonly".into(), "false".into()),
        ]);
        let item = RawChild::item("x", "x.csv", "csv")
            .described("extension", "csv")
            .described("readonly", "false");
        assert!(filter.accepts(&item));

        let partial = RawChild::item("y", "y.csv", "csv").described("extension", "csv");
        assert!(!filter.accepts(&partial));
    }

    #[test]
    fn directories_bypass_item_filter() {
        let selection = SelectionFilter {
            item_filter: Some(ItemFilter::new(|_| false)),
            ..Default::default()
        };
        assert!(selection.accepts_item(&RawChild::directory("d", "Dir")));
        assert!(!selection.accepts_item(&RawChild::item("i", "Item", "csv")));
    }
}
