use crate::backend::{AuthProvider, Navigator};
use crate::error::{SyncError, SyncResult};
use crate::models::Session;

pub(crate) const LOGIN_PATH: &str = "/login";

/// Gate for the bookmarks view.
///
/// A missing, failed or expired session redirects to login and is terminal for
/// the current view; there is no retry.
pub async fn require_session<A: AuthProvider>(
    auth: &A,
    navigator: &dyn Navigator,
    now_secs: i64,
) -> SyncResult<Session> {
    let reason = match auth.get_session().await {
        Ok(Some(session)) if !session.is_expired(now_secs) => {
            tracing::info!(user = %session.user.id, "session validated");
            return Ok(session);
        }
        Ok(Some(_)) => "session expired".to_string(),
        Ok(None) => "no session".to_string(),
        Err(e) => format!("session lookup failed: {e}"),
    };

    tracing::warn!(%reason, "redirecting to login");
    navigator.redirect(LOGIN_PATH);
    Err(SyncError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{user, FakeBackend, RecordingNavigator};
    use futures::executor::block_on;

    #[test]
    fn test_valid_session_passes_without_redirect() {
        let fake = FakeBackend::signed_in(user("u-1", "a@b.c"));
        let nav = RecordingNavigator::default();

        let s = block_on(require_session(&fake, &nav, 1_000)).expect("session");
        assert_eq!(s.user.id, "u-1");
        assert!(nav.redirects.borrow().is_empty());
    }

    #[test]
    fn test_missing_session_redirects() {
        let fake = FakeBackend::default();
        let nav = RecordingNavigator::default();

        let r = block_on(require_session(&fake, &nav, 1_000));
        assert_eq!(r, Err(SyncError::Unauthenticated));
        assert_eq!(*nav.redirects.borrow(), vec!["/login".to_string()]);
    }

    #[test]
    fn test_expired_session_redirects() {
        let fake = FakeBackend::signed_in(user("u-1", "a@b.c"));
        if let Some(s) = fake.state.borrow_mut().session.as_mut() {
            s.expires_at = Some(999);
        }
        let nav = RecordingNavigator::default();

        assert_eq!(
            block_on(require_session(&fake, &nav, 1_000)),
            Err(SyncError::Unauthenticated)
        );
        assert_eq!(nav.redirects.borrow().len(), 1);
    }

    #[test]
    fn test_auth_error_redirects() {
        let fake = FakeBackend::signed_in(user("u-1", "a@b.c"));
        fake.state.borrow_mut().session_error = true;
        let nav = RecordingNavigator::default();

        assert_eq!(
            block_on(require_session(&fake, &nav, 1_000)),
            Err(SyncError::Unauthenticated)
        );
        assert_eq!(*nav.redirects.borrow(), vec!["/login".to_string()]);
    }
}
