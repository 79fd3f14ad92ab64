//! Lazily resolved associations.
//!
//! A [`LazyAssociation`] stands in for an association whose secondary
//! statement has not run yet. It carries everything the fetch needs (the
//! statement id and the key values taken from the owning row) plus the
//! [`AssociationLoader`] that will run it.
//!
//! Resolution is single-flight: the first access runs the fetch, concurrent
//! accesses block until it finishes, and every later access returns the
//! stored outcome. A failed fetch is stored too and re-raised on each access
//! as [`Error::LazyLoad`]; it is never retried.
//!
//! ```text
//! Unresolved --first access--> Resolving --ok--> Resolved
//!                                        \-err-> Failed
//! ```
//!
//! Cloning a `LazyAssociation` (or the entity holding it) shares the same
//! resolution state.

use crate::entity::Entity;
use sqlmapper_core::{Error, LazyLoadError, Result};
use sqlmapper_registry::{Cardinality, Params};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Everything needed to run one secondary fetch.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Type name of the entity owning the association.
    pub owner_type: String,
    /// Association property on the owner.
    pub property: String,
    /// Secondary statement id.
    pub statement: String,
    /// Parameters built from the owner's key columns.
    pub params: Params,
    pub cardinality: Cardinality,
    /// Nesting depth of eager nested-query loads that led here. Lazy
    /// requests always start at 0.
    pub depth: usize,
}

/// Result of a secondary fetch.
#[derive(Debug, Clone)]
pub enum Loaded {
    One(Option<Entity>),
    Many(Vec<Entity>),
}

/// Runs secondary fetches for nested-query associations.
///
/// Sessions implement this; tests substitute counting stubs.
pub trait AssociationLoader: Send + Sync {
    fn load(&self, request: &LoadRequest) -> Result<Loaded>;
}

/// Observable state of a lazy association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

struct LazyInner {
    request: LoadRequest,
    loader: Arc<dyn AssociationLoader>,
    started: AtomicBool,
    outcome: OnceLock<std::result::Result<Loaded, Arc<Error>>>,
}

/// A deferred association; see the module docs.
#[derive(Clone)]
pub struct LazyAssociation {
    inner: Arc<LazyInner>,
}

impl LazyAssociation {
    pub fn new(request: LoadRequest, loader: Arc<dyn AssociationLoader>) -> Self {
        Self {
            inner: Arc::new(LazyInner {
                request,
                loader,
                started: AtomicBool::new(false),
                outcome: OnceLock::new(),
            }),
        }
    }

    pub fn request(&self) -> &LoadRequest {
        &self.inner.request
    }

    pub fn state(&self) -> LazyState {
        match self.inner.outcome.get() {
            Some(Ok(_)) => LazyState::Resolved,
            Some(Err(_)) => LazyState::Failed,
            None if self.inner.started.load(Ordering::Acquire) => LazyState::Resolving,
            None => LazyState::Unresolved,
        }
    }

    /// Whether the fetch has completed, successfully or not.
    pub fn is_settled(&self) -> bool {
        self.inner.outcome.get().is_some()
    }

    /// The loaded value, without triggering a fetch.
    pub fn peek(&self) -> Option<&Loaded> {
        match self.inner.outcome.get() {
            Some(Ok(loaded)) => Some(loaded),
            _ => None,
        }
    }

    /// Resolve the association, running the fetch at most once.
    pub fn resolve(&self) -> Result<&Loaded> {
        let inner = &*self.inner;
        let outcome = inner.outcome.get_or_init(|| {
            inner.started.store(true, Ordering::Release);
            tracing::debug!(
                target: "sqlmapper::lazy",
                owner = %inner.request.owner_type,
                property = %inner.request.property,
                statement = %inner.request.statement,
                "Resolving lazy association"
            );
            // A panicking loader settles the proxy as Failed; leaving the
            // cell empty would let the next access fetch again.
            let result = panic::catch_unwind(AssertUnwindSafe(|| inner.loader.load(&inner.request)))
                .unwrap_or_else(|payload| Err(Error::Custom(panic_message(&*payload))))
                .map_err(Arc::new);
            if let Err(e) = &result {
                tracing::debug!(
                    target: "sqlmapper::lazy",
                    property = %inner.request.property,
                    error = %e,
                    "Lazy association failed"
                );
            }
            result
        });

        outcome.as_ref().map_err(|cause| {
            Error::LazyLoad(LazyLoadError {
                property: inner.request.property.clone(),
                cause: Arc::clone(cause),
            })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    format!("association loader panicked: {detail}")
}

impl fmt::Debug for LazyAssociation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("LazyAssociation");
        s.field("statement", &self.inner.request.statement)
            .field("state", &self.state());
        if let Some(loaded) = self.peek() {
            s.field("loaded", loaded);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::{ExecutionError, ExecutionErrorKind, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingLoader {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    impl AssociationLoader for CountingLoader {
        fn load(&self, request: &LoadRequest) -> Result<Loaded> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            let mut author = Entity::new("Author");
            author.set("author_id", request.params.lookup("author_id").unwrap_or(Value::Null));
            author.set("author_name", "qingshan");
            Ok(Loaded::One(Some(author)))
        }
    }

    struct FailingLoader {
        calls: AtomicUsize,
    }

    impl AssociationLoader for FailingLoader {
        fn load(&self, _request: &LoadRequest) -> Result<Loaded> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Execution(ExecutionError {
                kind: ExecutionErrorKind::Database,
                sql: Some("SELECT * FROM author WHERE author_id = ?".into()),
                message: "no such table: author".into(),
                source: None,
            }))
        }
    }

    struct PanickingLoader {
        calls: AtomicUsize,
    }

    impl AssociationLoader for PanickingLoader {
        fn load(&self, _request: &LoadRequest) -> Result<Loaded> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("connection handle vanished");
        }
    }

    fn request() -> LoadRequest {
        LoadRequest {
            owner_type: "BlogAndAuthor".into(),
            property: "author".into(),
            statement: "BlogMapper.selectAuthor".into(),
            params: Params::scalar(1001),
            cardinality: Cardinality::One,
            depth: 0,
        }
    }

    #[test]
    fn resolves_once() {
        let loader = CountingLoader::new(Duration::ZERO);
        let lazy = LazyAssociation::new(request(), loader.clone());
        assert_eq!(lazy.state(), LazyState::Unresolved);
        assert!(lazy.peek().is_none());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);

        let Loaded::One(Some(author)) = lazy.resolve().unwrap() else {
            panic!("expected an author");
        };
        assert_eq!(author.get("author_id"), Some(&Value::Int(1001)));
        assert_eq!(lazy.state(), LazyState::Resolved);

        lazy.resolve().unwrap();
        lazy.clone().resolve().unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_access_is_single_flight() {
        let loader = CountingLoader::new(Duration::from_millis(50));
        let lazy = LazyAssociation::new(request(), loader.clone());
        let lazy = &lazy;

        let names: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || match lazy.resolve().unwrap() {
                        Loaded::One(Some(author)) => author
                            .get("author_name")
                            .and_then(Value::as_str)
                            .unwrap()
                            .to_string(),
                        other => panic!("unexpected {other:?}"),
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(names.iter().all(|n| n == "qingshan"));
    }

    #[test]
    fn failure_is_permanent() {
        let loader = Arc::new(FailingLoader {
            calls: AtomicUsize::new(0),
        });
        let lazy = LazyAssociation::new(request(), loader.clone());

        let first = lazy.resolve().unwrap_err();
        let second = lazy.resolve().unwrap_err();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.state(), LazyState::Failed);
        assert!(lazy.is_settled());

        match (first, second) {
            (Error::LazyLoad(a), Error::LazyLoad(b)) => {
                assert_eq!(a.property, "author");
                assert!(Arc::ptr_eq(&a.cause, &b.cause));
                assert!(a.cause.is_execution_error());
            }
            other => panic!("expected lazy load errors, got {other:?}"),
        }
    }

    #[test]
    fn panicking_loader_settles_as_failed() {
        let loader = Arc::new(PanickingLoader {
            calls: AtomicUsize::new(0),
        });
        let lazy = LazyAssociation::new(request(), loader.clone());

        for _ in 0..2 {
            match lazy.resolve() {
                Err(Error::LazyLoad(e)) => {
                    assert!(e.cause.to_string().contains("connection handle vanished"));
                }
                other => panic!("expected a lazy load error, got {other:?}"),
            }
        }
        assert_eq!(lazy.state(), LazyState::Failed);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_does_not_resolve() {
        let loader = CountingLoader::new(Duration::ZERO);
        let lazy = LazyAssociation::new(request(), loader.clone());
        let rendered = format!("{lazy:?}");
        assert!(rendered.contains("Unresolved"));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }
}
