use crate::models::Bookmark;

/// Local mirror of the owner's bookmarks.
///
/// Every fetch takes a sequence number from [`ListState::begin_fetch`]; a
/// result that is not newer than the last applied one is dropped, so an
/// overtaken refetch can never roll the list back.
#[derive(Debug, Default)]
pub struct ListState {
    items: Vec<Bookmark>,
    issued: u64,
    applied: u64,
    loaded: bool,
}

impl ListState {
    pub fn items(&self) -> &[Bookmark] {
        &self.items
    }

    /// Whether at least one fetch has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn begin_fetch(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Replace the list wholesale. Returns `false` for a stale result.
    pub fn apply_fetch(&mut self, seq: u64, items: Vec<Bookmark>) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        self.items = items;
        self.loaded = true;
        true
    }

    /// Settle the first load without data, e.g. after a failed fetch.
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Local removal. Fetches already in flight carry a pre-removal
    /// snapshot, so they are invalidated.
    pub fn remove(&mut self, id: &str) -> Option<Bookmark> {
        let idx = self.items.iter().position(|b| b.id == id)?;
        self.applied = self.issued;
        Some(self.items.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bm(id: &str) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            title: id.to_string(),
            url: format!("https://{id}.dev"),
            user_id: "u".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_out_of_order_results_are_discarded() {
        let mut s = ListState::default();
        let first = s.begin_fetch();
        let second = s.begin_fetch();

        assert!(s.apply_fetch(second, vec![bm("new")]));
        assert!(!s.apply_fetch(first, vec![bm("old")]));
        assert_eq!(s.items()[0].id, "new");
    }

    #[test]
    fn test_in_order_results_apply() {
        let mut s = ListState::default();
        assert!(!s.is_loaded());

        let a = s.begin_fetch();
        assert!(s.apply_fetch(a, vec![bm("a")]));
        let b = s.begin_fetch();
        assert!(s.apply_fetch(b, vec![bm("a"), bm("b")]));

        assert!(s.is_loaded());
        assert_eq!(s.items().len(), 2);
    }

    #[test]
    fn test_remove_invalidates_fetches_in_flight() {
        let mut s = ListState::default();
        let first = s.begin_fetch();
        s.apply_fetch(first, vec![bm("a"), bm("b")]);

        let in_flight = s.begin_fetch();
        assert!(s.remove("a").is_some());
        assert!(!s.apply_fetch(in_flight, vec![bm("a"), bm("b")]));
        assert_eq!(s.items().len(), 1);

        let after = s.begin_fetch();
        assert!(s.apply_fetch(after, vec![bm("b")]));
    }

    #[test]
    fn test_mark_loaded_without_data() {
        let mut s = ListState::default();
        s.mark_loaded();
        assert!(s.is_loaded());
        assert!(s.items().is_empty());
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let mut s = ListState::default();
        let seq = s.begin_fetch();
        s.apply_fetch(seq, vec![bm("a")]);

        assert!(s.remove("zzz").is_none());
        assert_eq!(s.remove("a").map(|b| b.id), Some("a".to_string()));
        assert!(s.items().is_empty());
    }
}
