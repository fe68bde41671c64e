//! Selection controller: active collection, filter and current index.

use std::sync::Arc;

use crate::catalog::{Catalog, Item};
use crate::token::{Generation, SelectionToken};

/// What a selection change resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Item { index: usize, item: Arc<Item> },
    /// The filtered sequence is empty.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChange {
    pub token: SelectionToken,
    pub selection: Selection,
}

impl SelectionChange {
    pub fn item(&self) -> Option<&Arc<Item>> {
        match &self.selection {
            Selection::Item { item, .. } => Some(item),
            Selection::Empty => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match &self.selection {
            Selection::Item { index, .. } => Some(*index),
            Selection::Empty => None,
        }
    }
}

/// Receiver for selection side effects.
///
/// Called synchronously in this order: `highlight`, `swap_asset`, `details`.
pub trait SelectionSink {
    fn highlight(&mut self, index: Option<usize>);
    fn swap_asset(&mut self, change: &SelectionChange);
    /// The selected item, shared with the catalog.
    fn details(&mut self, item: Option<&Arc<Item>>);
}

/// Sink that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SelectionSink for NullSink {
    fn highlight(&mut self, _index: Option<usize>) {}
    fn swap_asset(&mut self, _change: &SelectionChange) {}
    fn details(&mut self, _item: Option<&Arc<Item>>) {}
}

pub struct SelectionController {
    catalog: Arc<Catalog>,
    generation: Generation,
    collection: Option<String>,
    query: String,
    filtered: Vec<Arc<Item>>,
    index: usize,
}

impl SelectionController {
    /// Start on the first collection with an empty query. No token is issued
    /// until the first change.
    pub fn new(catalog: Arc<Catalog>, generation: Generation) -> Self {
        let mut ctl = Self {
            catalog,
            generation,
            collection: None,
            query: String::new(),
            filtered: Vec::new(),
            index: 0,
        };
        ctl.refilter(None);
        ctl
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn collection_id(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filtered(&self) -> &[Arc<Item>] {
        &self.filtered
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Arc<Item>> {
        self.filtered.get(self.index)
    }

    /// Apply a query (and optionally switch collection), then select index 0.
    pub fn set_filter(
        &mut self,
        query: &str,
        collection: Option<&str>,
        sink: &mut dyn SelectionSink,
    ) -> SelectionChange {
        self.query = query.to_string();
        let target = collection.map(str::to_string).or_else(|| self.collection.clone());
        self.refilter(target.as_deref());
        self.select(0, sink)
    }

    /// Switch collection, keeping the current query.
    pub fn set_collection(&mut self, id: &str, sink: &mut dyn SelectionSink) -> SelectionChange {
        let query = self.query.clone();
        self.set_filter(&query, Some(id), sink)
    }

    /// Select `index` wrapped into the filtered sequence.
    pub fn select(&mut self, index: i64, sink: &mut dyn SelectionSink) -> SelectionChange {
        let token = self.generation.issue();
        let len = self.filtered.len() as i64;

        let selection = if len == 0 {
            self.index = 0;
            Selection::Empty
        } else {
            self.index = (((index % len) + len) % len) as usize;
            Selection::Item { index: self.index, item: Arc::clone(&self.filtered[self.index]) }
        };
        let change = SelectionChange { token, selection };
        tracing::debug!(token = %token, index = ?change.index(), "selection changed");

        sink.highlight(change.index());
        sink.swap_asset(&change);
        sink.details(change.item());
        change
    }

    /// Move the selection by `delta` rows.
    pub fn step(&mut self, delta: i64, sink: &mut dyn SelectionSink) -> SelectionChange {
        self.select(self.index as i64 + delta, sink)
    }

    fn refilter(&mut self, collection: Option<&str>) {
        let needle = self.query.trim().to_lowercase();
        let col = self.catalog.resolve(collection);
        self.collection = col.map(|c| c.id.clone());
        self.filtered = col
            .map(|c| c.items.iter().filter(|it| it.matches(&needle)).cloned().collect())
            .unwrap_or_default();
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::normalize;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl SelectionSink for Recorder {
        fn highlight(&mut self, index: Option<usize>) {
            self.calls.push(format!("highlight {index:?}"));
        }
        fn swap_asset(&mut self, change: &SelectionChange) {
            self.calls.push(format!("swap {}", change.token.value()));
        }
        fn details(&mut self, item: Option<&Arc<Item>>) {
            self.calls.push(format!("details {}", item.map_or("-", |i| i.id.as_str())));
        }
    }

    fn controller() -> SelectionController {
        let catalog = normalize(&json!({
            "collections": [
                { "id": "handhelds", "items": [
                    { "id": "GB-01", "name": "Game Boy", "tags": ["nintendo"] },
                    { "id": "GG-01", "name": "Game Gear", "tags": ["sega"] },
                    { "id": "LX-01", "name": "Lynx", "tags": ["atari"] }
                ]},
                { "id": "empty", "items": [] }
            ]
        }))
        .unwrap();
        SelectionController::new(Arc::new(catalog), Generation::new())
    }

    #[test]
    fn test_select_wraps() {
        let mut ctl = controller();
        let mut sink = NullSink;
        for (i, expected) in [(0, 0), (2, 2), (3, 0), (-1, 2), (-4, 2), (7, 1)] {
            let change = ctl.select(i, &mut sink);
            assert_eq!(change.index(), Some(expected), "select({i})");
        }
    }

    #[test]
    fn test_step() {
        let mut ctl = controller();
        let mut sink = NullSink;
        ctl.select(0, &mut sink);
        assert_eq!(ctl.step(-1, &mut sink).index(), Some(2));
        assert_eq!(ctl.step(1, &mut sink).index(), Some(0));
    }

    #[test]
    fn test_filter_matches_id_name_and_tags() {
        let mut ctl = controller();
        let mut sink = NullSink;
        ctl.set_filter("  GAME ", None, &mut sink);
        assert_eq!(ctl.filtered().len(), 2);
        ctl.set_filter("atari", None, &mut sink);
        assert_eq!(ctl.current().map(|i| i.id.as_str()), Some("LX-01"));
        ctl.set_filter("", None, &mut sink);
        let ids: Vec<&str> = ctl.filtered().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["GB-01", "GG-01", "LX-01"]);
    }

    #[test]
    fn test_empty_selection_still_issues_token() {
        let mut ctl = controller();
        let mut sink = NullSink;
        let first = ctl.select(0, &mut sink);
        let empty = ctl.set_filter("zzz", None, &mut sink);
        assert_eq!(empty.selection, Selection::Empty);
        assert!(empty.token > first.token);
        assert!(ctl.generation().is_current(empty.token));
    }

    #[test]
    fn test_unknown_collection_falls_back() {
        let mut ctl = controller();
        let mut sink = NullSink;
        ctl.set_collection("empty", &mut sink);
        assert_eq!(ctl.collection_id(), Some("empty"));
        assert!(ctl.filtered().is_empty());
        ctl.set_collection("nope", &mut sink);
        assert_eq!(ctl.collection_id(), Some("handhelds"));
        assert_eq!(ctl.filtered().len(), 3);
    }

    #[test]
    fn test_collection_keeps_query() {
        let mut ctl = controller();
        let mut sink = NullSink;
        ctl.set_filter("sega", None, &mut sink);
        ctl.set_collection("handhelds", &mut sink);
        assert_eq!(ctl.query(), "sega");
        assert_eq!(ctl.filtered().len(), 1);
    }

    #[test]
    fn test_sink_order() {
        let mut ctl = controller();
        let mut rec = Recorder::default();
        let change = ctl.select(1, &mut rec);
        assert_eq!(
            rec.calls,
            vec![
                "highlight Some(1)".to_string(),
                format!("swap {}", change.token.value()),
                "details GG-01".to_string(),
            ]
        );

        rec.calls.clear();
        ctl.set_collection("empty", &mut rec);
        assert_eq!(rec.calls[0], "highlight None");
        assert_eq!(rec.calls[2], "details -");
    }

    #[test]
    fn test_details_shares_catalog_item() {
        struct Keep(Option<Arc<Item>>);
        impl SelectionSink for Keep {
            fn highlight(&mut self, _index: Option<usize>) {}
            fn swap_asset(&mut self, _change: &SelectionChange) {}
            fn details(&mut self, item: Option<&Arc<Item>>) {
                self.0 = item.cloned();
            }
        }

        let mut ctl = controller();
        let mut sink = Keep(None);
        ctl.select(2, &mut sink);
        let held = sink.0.expect("item shown");
        let stored = &ctl.catalog().collections()[0].items[2];
        assert!(Arc::ptr_eq(&held, stored));
    }
}
