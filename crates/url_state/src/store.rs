use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;
use url::Url;

use crate::codec::UrlParams;

/// Read/write access to the query parameters of the navigable location.
///
/// Writes replace the whole snapshot; callers derive the next snapshot from
/// the previous one so unrelated keys survive.
pub trait ParamStore: Send + Sync {
    fn read(&self) -> UrlParams;

    fn write(&self, next: UrlParams);

    fn update(&self, f: &dyn Fn(&UrlParams) -> UrlParams) {
        let next = f(&self.read());
        self.write(next);
    }
}

struct HistoryEntry {
    base: Url,
    params: UrlParams,
}

/// In-process stand-in for a browser location with a back stack.
pub struct MemoryLocation {
    base: Mutex<Url>,
    params: watch::Sender<UrlParams>,
    back_stack: Mutex<Vec<HistoryEntry>>,
}

impl MemoryLocation {
    pub fn new(mut href: Url) -> Self {
        let params = href.query().map(UrlParams::parse).unwrap_or_default();
        href.set_query(None);
        href.set_fragment(None);
        let (params, _) = watch::channel(params);
        Self {
            base: Mutex::new(href),
            params,
            back_stack: Mutex::new(Vec::new()),
        }
    }

    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(href)?))
    }

    pub fn href(&self) -> String {
        let mut url = lock(&self.base).clone();
        let query = self.params.borrow().to_query_string();
        if !query.is_empty() {
            url.set_query(Some(&query));
        }
        url.into()
    }

    /// Follows a link, absolute or relative to the current location, pushing
    /// the current entry on the back stack.
    pub fn navigate(&self, href: &str) -> Result<(), url::ParseError> {
        let mut target = lock(&self.base).join(href)?;
        let params = target.query().map(UrlParams::parse).unwrap_or_default();
        target.set_query(None);
        target.set_fragment(None);
        debug!(href, "location: navigate");

        let previous = std::mem::replace(&mut *lock(&self.base), target);
        self.push_history(previous);
        self.params.send_replace(params);
        Ok(())
    }

    /// Returns to the previous entry. `false` when the back stack is empty.
    pub fn back(&self) -> bool {
        let Some(entry) = lock(&self.back_stack).pop() else {
            return false;
        };
        *lock(&self.base) = entry.base;
        self.params.send_replace(entry.params);
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<UrlParams> {
        self.params.subscribe()
    }

    fn push_history(&self, base: Url) {
        let params = self.params.borrow().clone();
        lock(&self.back_stack).push(HistoryEntry { base, params });
    }
}

impl ParamStore for MemoryLocation {
    fn read(&self) -> UrlParams {
        self.params.borrow().clone()
    }

    fn write(&self, next: UrlParams) {
        if *self.params.borrow() == next {
            return;
        }
        let base = lock(&self.base).clone();
        self.push_history(base);
        self.params.send_replace(next);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_query_string_becomes_params() {
        let location =
            MemoryLocation::parse("http://admin.test/companies?limit=20&s_name=asc#top")
                .expect("location");
        let params = location.read();
        assert_eq!(params.get("limit"), Some("20"));
        assert_eq!(params.get("s_name"), Some("asc"));
        assert_eq!(
            location.href(),
            "http://admin.test/companies?limit=20&s_name=asc"
        );
    }

    #[test]
    fn write_is_reflected_in_href_and_can_go_back() {
        let location = MemoryLocation::parse("http://admin.test/companies").expect("location");
        location.write([("limit", "5"), ("offset", "10")].into_iter().collect());
        assert_eq!(
            location.href(),
            "http://admin.test/companies?limit=5&offset=10"
        );

        assert!(location.back());
        assert!(location.read().is_empty());
        assert_eq!(location.href(), "http://admin.test/companies");
        assert!(!location.back());
    }

    #[test]
    fn update_preserves_unrelated_keys() {
        let location =
            MemoryLocation::parse("http://admin.test/companies?f_name=acme").expect("location");
        location.update(&|prev| {
            let mut next = prev.clone();
            next.insert("s_name", "desc");
            next
        });
        let params = location.read();
        assert_eq!(params.get("f_name"), Some("acme"));
        assert_eq!(params.get("s_name"), Some("desc"));
    }

    #[test]
    fn relative_navigation_replaces_path_and_params() {
        let location =
            MemoryLocation::parse("http://admin.test/companies?limit=5").expect("location");
        location.navigate("/people?f_role=owner").expect("navigate");
        assert_eq!(location.href(), "http://admin.test/people?f_role=owner");

        assert!(location.back());
        assert_eq!(location.href(), "http://admin.test/companies?limit=5");
    }

    #[tokio::test]
    async fn subscribers_observe_writes() {
        let location = MemoryLocation::parse("http://admin.test/companies").expect("location");
        let mut rx = location.subscribe();
        location.write([("offset", "30")].into_iter().collect());
        rx.changed().await.expect("changed");
        assert_eq!(rx.borrow().get("offset"), Some("30"));
    }
}
