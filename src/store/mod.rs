use crate::backend::{Query, TableClient};
use crate::error::{RejectReason, SyncError, SyncResult};
use crate::models::{Bookmark, NewBookmark};
use std::rc::Rc;

pub(crate) const BOOKMARKS_TABLE: &str = "bookmarks";
pub(crate) const OWNER_COLUMN: &str = "user_id";
const CREATED_AT_COLUMN: &str = "created_at";

/// Result of a form submission; a rejection never reaches the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// Title and URL after client-side checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidBookmark {
    pub title: String,
    pub url: String,
}

fn has_web_scheme(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
    })
}

/// Prefix `https://` unless the URL already starts with `http://` or `https://`.
/// Any other scheme is treated as part of the address.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if has_web_scheme(url) {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

pub fn validate_new_bookmark(title: &str, url: &str) -> Result<ValidBookmark, RejectReason> {
    let title = title.trim();
    let url = url.trim();

    if title.is_empty() {
        return Err(RejectReason::EmptyTitle);
    }
    if url.is_empty() {
        return Err(RejectReason::EmptyUrl);
    }
    if !url.contains('.') {
        return Err(RejectReason::MalformedUrl);
    }

    Ok(ValidBookmark {
        title: title.to_string(),
        url: normalize_url(url),
    })
}

/// Owner-scoped create/read/delete over the `bookmarks` table.
pub struct BookmarkStore<C> {
    client: Rc<C>,
}

impl<C> Clone for BookmarkStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C: TableClient> BookmarkStore<C> {
    pub fn new(client: Rc<C>) -> Self {
        Self { client }
    }

    /// All bookmarks owned by `owner_id`, newest first.
    pub async fn fetch_all(&self, owner_id: &str) -> SyncResult<Vec<Bookmark>> {
        let query = Query::table(BOOKMARKS_TABLE)
            .eq(OWNER_COLUMN, owner_id)
            .order(CREATED_AT_COLUMN, false);

        let mut rows: Vec<Bookmark> = self.client.select(&query).await.map_err(|e| {
            tracing::warn!(owner = owner_id, error = %e, "bookmark fetch failed");
            SyncError::StoreUnavailable(e.message)
        })?;

        // Row-level security is the real guard; this keeps a misconfigured
        // policy from leaking other owners' rows into the view.
        let before = rows.len();
        rows.retain(|b| b.user_id == owner_id);
        if rows.len() != before {
            tracing::warn!(
                owner = owner_id,
                dropped = before - rows.len(),
                "store returned rows owned by someone else"
            );
        }

        // `None` timestamps sort last; the sort is stable so server order breaks ties.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        tracing::debug!(owner = owner_id, count = rows.len(), "fetched bookmarks");
        Ok(rows)
    }

    pub async fn create(&self, owner_id: &str, title: &str, url: &str) -> SyncResult<CreateOutcome> {
        let valid = match validate_new_bookmark(title, url) {
            Ok(v) => v,
            Err(reason) => {
                tracing::debug!(%reason, "bookmark rejected before insert");
                return Ok(CreateOutcome::Rejected(reason));
            }
        };

        let row = NewBookmark {
            title: valid.title,
            url: valid.url,
            user_id: owner_id.to_string(),
        };

        self.client
            .insert(BOOKMARKS_TABLE, &row)
            .await
            .map_err(|e| {
                tracing::error!(owner = owner_id, error = %e, "bookmark insert failed");
                SyncError::StoreUnavailable(e.message)
            })?;

        tracing::info!(owner = owner_id, url = %row.url, "bookmark created");
        Ok(CreateOutcome::Accepted)
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> SyncResult<()> {
        let query = Query::table(BOOKMARKS_TABLE)
            .eq("id", id)
            .eq(OWNER_COLUMN, owner_id);

        self.client
            .delete(&query)
            .await
            .map_err(|e| SyncError::StoreUnavailable(e.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use futures::executor::block_on;

    fn store(fake: &FakeBackend) -> BookmarkStore<FakeBackend> {
        BookmarkStore::new(Rc::new(fake.clone()))
    }

    #[test]
    fn test_normalize_url_prefixes_missing_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("  example.com/a "), "https://example.com/a");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("HTTPS://example.com"), "HTTPS://example.com");
        assert_eq!(
            normalize_url("ftp://files.example.com"),
            "https://ftp://files.example.com"
        );
        assert_eq!(
            normalize_url("javascript://x.com%0Aalert(1)"),
            "https://javascript://x.com%0Aalert(1)"
        );
        // "httpbin.org" starts with "http" but carries no scheme.
        assert_eq!(normalize_url("httpbin.org"), "https://httpbin.org");
    }

    #[test]
    fn test_validation_rejections() {
        assert_eq!(
            validate_new_bookmark("", "x.com"),
            Err(RejectReason::EmptyTitle)
        );
        assert_eq!(
            validate_new_bookmark("   ", "x.com"),
            Err(RejectReason::EmptyTitle)
        );
        assert_eq!(validate_new_bookmark("T", ""), Err(RejectReason::EmptyUrl));
        assert_eq!(
            validate_new_bookmark("T", "localhost"),
            Err(RejectReason::MalformedUrl)
        );
    }

    #[test]
    fn test_rejected_create_makes_no_store_call() {
        let fake = FakeBackend::default();
        let s = store(&fake);

        let out = block_on(s.create("u-1", "", "x.com")).expect("no transport error");
        assert_eq!(out, CreateOutcome::Rejected(RejectReason::EmptyTitle));

        let out = block_on(s.create("u-1", "T", "")).expect("no transport error");
        assert_eq!(out, CreateOutcome::Rejected(RejectReason::EmptyUrl));

        assert!(fake.row_ids().is_empty());
        assert_eq!(fake.store_calls(), 0);
    }

    #[test]
    fn test_create_normalizes_and_scopes_to_owner() {
        let fake = FakeBackend::default();
        let s = store(&fake);

        let out = block_on(s.create("u-1", "T", "example.com")).expect("create");
        assert_eq!(out, CreateOutcome::Accepted);

        let rows = block_on(s.fetch_all("u-1")).expect("fetch");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, "https://example.com");
        assert_eq!(rows[0].title, "T");
        assert_eq!(rows[0].user_id, "u-1");
    }

    #[test]
    fn test_fetch_all_newest_first() {
        let fake = FakeBackend::default();
        fake.seed("a", "u-1", "oldest");
        fake.seed("b", "u-1", "middle");
        fake.seed("c", "u-1", "newest");

        let rows = block_on(store(&fake).fetch_all("u-1")).expect("fetch");
        let ids: Vec<&str> = rows.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(
            fake.calls(),
            vec!["select bookmarks user_id=eq.u-1&order=created_at.desc".to_string()]
        );
    }

    #[test]
    fn test_two_owners_never_see_each_other() {
        let fake = FakeBackend::default();
        fake.seed("a", "alice", "A");
        fake.seed("b", "bob", "B");
        let s = store(&fake);

        let alice = block_on(s.fetch_all("alice")).expect("fetch");
        let bob = block_on(s.fetch_all("bob")).expect("fetch");
        assert_eq!(alice.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(bob.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_fetch_all_drops_foreign_rows_from_leaky_server() {
        let fake = FakeBackend::default();
        fake.seed("a", "alice", "A");
        fake.seed("b", "bob", "B");
        fake.state.borrow_mut().leaky_select = true;

        let rows = block_on(store(&fake).fetch_all("alice")).expect("fetch");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "alice");
    }

    #[test]
    fn test_delete_is_owner_scoped() {
        let fake = FakeBackend::default();
        fake.seed("a", "alice", "A");
        let s = store(&fake);

        block_on(s.delete("bob", "a")).expect("delete");
        assert_eq!(fake.row_ids(), vec!["a".to_string()]);

        block_on(s.delete("alice", "a")).expect("delete");
        assert!(fake.row_ids().is_empty());
    }

    #[test]
    fn test_store_errors_surface_as_store_unavailable() {
        let fake = FakeBackend::default();
        fake.state.borrow_mut().fail_select = 1;
        fake.state.borrow_mut().fail_delete = 1;
        let s = store(&fake);

        assert!(matches!(
            block_on(s.fetch_all("u-1")),
            Err(SyncError::StoreUnavailable(_))
        ));
        assert!(matches!(
            block_on(s.delete("u-1", "x")),
            Err(SyncError::StoreUnavailable(_))
        ));
    }
}
