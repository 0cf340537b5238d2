//! Home-directory resolution for remedy state
//!
//! All runtime state (locks, ticket histories, config) lives under a
//! single home directory, resolved as:
//!
//! 1. a thread-local override (tests only),
//! 2. the `REMEDY_HOME` environment variable,
//! 3. `.remedy/` under the current working directory.
//!
//! The thread-local override exists so parallel tests can isolate their
//! state without racing on process-global environment variables.

use camino::Utf8PathBuf;
use std::cell::RefCell;

thread_local! {
    static HOME_OVERRIDE: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Override the remedy home for the current thread
///
/// Passing `None` clears the override. Test-only escape hatch; release
/// code resolves the home through the environment.
pub fn set_thread_home(home: Option<Utf8PathBuf>) {
    HOME_OVERRIDE.with(|cell| *cell.borrow_mut() = home);
}

/// Resolve the remedy home directory
#[must_use]
pub fn remedy_home() -> Utf8PathBuf {
    if let Some(home) = HOME_OVERRIDE.with(|cell| cell.borrow().clone()) {
        return home;
    }
    if let Ok(home) = std::env::var("REMEDY_HOME") {
        return Utf8PathBuf::from(home);
    }
    Utf8PathBuf::from(".remedy")
}

/// Directory holding per-ticket lock artifacts
#[must_use]
pub fn locks_dir() -> Utf8PathBuf {
    remedy_home().join("locks")
}

/// Directory holding per-ticket state
#[must_use]
pub fn ticket_dir(ticket_id: &str) -> Utf8PathBuf {
    remedy_home().join("tickets").join(ticket_id)
}

/// Per-ticket attempt audit log (one JSON record per line)
#[must_use]
pub fn attempt_log_path(ticket_id: &str) -> Utf8PathBuf {
    ticket_dir(ticket_id).join("attempts.jsonl")
}

/// Run `f` with the thread-local home pointed at a fresh temp directory
///
/// The override is cleared even if `f` panics.
#[cfg(any(test, feature = "test-support"))]
pub fn with_isolated_home<T>(f: impl FnOnce(&Utf8PathBuf) -> T) -> T {
    struct ClearOnDrop;
    impl Drop for ClearOnDrop {
        fn drop(&mut self) {
            set_thread_home(None);
        }
    }

    let tmp = tempfile::tempdir().expect("create temp home");
    let home = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 temp path");
    set_thread_home(Some(home.clone()));
    let _clear = ClearOnDrop;
    f(&home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_home_is_dot_remedy() {
        set_thread_home(None);
        if std::env::var("REMEDY_HOME").is_err() {
            assert_eq!(remedy_home(), Utf8PathBuf::from(".remedy"));
        }
    }

    #[test]
    fn thread_override_wins() {
        with_isolated_home(|home| {
            assert_eq!(&remedy_home(), home);
            assert_eq!(locks_dir(), home.join("locks"));
            assert_eq!(
                attempt_log_path("BUG-3"),
                home.join("tickets").join("BUG-3").join("attempts.jsonl")
            );
        });
    }

    #[test]
    fn override_cleared_after_isolated_run() {
        let before = remedy_home();
        with_isolated_home(|_| {});
        assert_eq!(remedy_home(), before);
    }
}
