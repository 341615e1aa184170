use std::{
    cell::RefCell,
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::{trace, warn};

use super::path::ResourcePath;

/// Lifecycle of a handle. `Ready` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub path: ResourcePath,
    pub reason: String,
}

impl LoadError {
    pub fn new(path: ResourcePath, reason: impl Into<String>) -> Self {
        Self {
            path,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load {}: {}", self.path, self.reason)
    }
}

impl std::error::Error for LoadError {}

/// What an observer receives once a handle settles.
pub enum LoadOutcome<T> {
    Ready(Rc<RefCell<T>>),
    Failed(LoadError),
}

impl<T> Clone for LoadOutcome<T> {
    fn clone(&self) -> Self {
        match self {
            LoadOutcome::Ready(target) => LoadOutcome::Ready(Rc::clone(target)),
            LoadOutcome::Failed(err) => LoadOutcome::Failed(err.clone()),
        }
    }
}

impl<T> fmt::Debug for LoadOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Ready(_) => f.write_str("Ready"),
            LoadOutcome::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// One-shot view of a handle's readiness: either it has already settled, or
/// the caller has to park an observer and wait for [`ResourceHandle::register_observer`]
/// to fire.
#[derive(Debug)]
pub enum Readiness<T> {
    Settled(LoadOutcome<T>),
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl ObserverToken {
    fn next() -> Self {
        ObserverToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

type Observer<T> = Box<dyn FnOnce(LoadOutcome<T>)>;

enum Slot<T> {
    Loading,
    Ready(Rc<RefCell<T>>),
    Error(LoadError),
}

struct HandleInner<T> {
    path: ResourcePath,
    slot: RefCell<Slot<T>>,
    observer: RefCell<Option<(ObserverToken, Observer<T>)>>,
}

/// Shared proxy for an asynchronously loaded resource.
///
/// Handles live on the editing thread only. The resource manager settles them
/// when it pumps completed loads, which is also where observers fire.
pub struct ResourceHandle<T> {
    inner: Rc<HandleInner<T>>,
}

impl<T> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("path", &self.inner.path)
            .field("state", &self.state())
            .finish()
    }
}

impl<T> ResourceHandle<T> {
    pub(crate) fn loading(path: ResourcePath) -> Self {
        Self {
            inner: Rc::new(HandleInner {
                path,
                slot: RefCell::new(Slot::Loading),
                observer: RefCell::new(None),
            }),
        }
    }

    pub fn path(&self) -> &ResourcePath {
        &self.inner.path
    }

    pub fn state(&self) -> LoadState {
        match &*self.inner.slot.borrow() {
            Slot::Loading => LoadState::Loading,
            Slot::Ready(_) => LoadState::Ready,
            Slot::Error(_) => LoadState::Error,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LoadState::Ready
    }

    /// The loaded object, if the handle is ready.
    pub fn get(&self) -> Option<Rc<RefCell<T>>> {
        match &*self.inner.slot.borrow() {
            Slot::Ready(target) => Some(Rc::clone(target)),
            _ => None,
        }
    }

    pub fn same_resource(&self, other: &ResourceHandle<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn await_ready(&self) -> Readiness<T> {
        match &*self.inner.slot.borrow() {
            Slot::Loading => Readiness::Pending,
            Slot::Ready(target) => Readiness::Settled(LoadOutcome::Ready(Rc::clone(target))),
            Slot::Error(err) => Readiness::Settled(LoadOutcome::Failed(err.clone())),
        }
    }

    pub fn has_observer(&self) -> bool {
        self.inner.observer.borrow().is_some()
    }

    /// Parks a one-shot observer on the handle.
    ///
    /// A handle that has already settled runs the observer immediately, before
    /// this returns; the returned token is then already spent. Either way the
    /// observer runs exactly once.
    ///
    /// # Panics
    /// A handle holds at most one observer. Registering a second one while the
    /// first is still parked is a programmer error.
    pub fn register_observer<F>(&self, observer: F) -> ObserverToken
    where
        F: FnOnce(LoadOutcome<T>) + 'static,
    {
        let token = ObserverToken::next();
        if let Readiness::Settled(outcome) = self.await_ready() {
            trace!(path = %self.inner.path, "handle already settled, firing observer inline");
            observer(outcome);
            return token;
        }

        let mut slot = self.inner.observer.borrow_mut();
        assert!(
            slot.is_none(),
            "resource '{}' already has a readiness observer",
            self.inner.path
        );
        *slot = Some((token, Box::new(observer)));
        token
    }

    /// Drops the parked observer if `token` still owns it. Calling this with a
    /// spent or foreign token is a no-op.
    pub fn unregister_observer(&self, token: ObserverToken) -> bool {
        let mut slot = self.inner.observer.borrow_mut();
        match &*slot {
            Some((owner, _)) if *owner == token => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn settle(&self, result: Result<T, LoadError>) {
        let outcome = {
            let mut slot = self.inner.slot.borrow_mut();
            if !matches!(*slot, Slot::Loading) {
                warn!(path = %self.inner.path, "ignoring second completion for a settled handle");
                return;
            }
            match result {
                Ok(value) => {
                    let target = Rc::new(RefCell::new(value));
                    *slot = Slot::Ready(Rc::clone(&target));
                    LoadOutcome::Ready(target)
                }
                Err(err) => {
                    *slot = Slot::Error(err.clone());
                    LoadOutcome::Failed(err)
                }
            }
        };

        let observer = self.inner.observer.borrow_mut().take();
        if let Some((_, observer)) = observer {
            observer(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, impl FnOnce(LoadOutcome<u32>) + 'static) {
        let fired = Rc::new(Cell::new(0));
        let hits = Rc::clone(&fired);
        (fired, move |_| hits.set(hits.get() + 1))
    }

    #[test]
    fn observer_fires_once_when_loading_completes() {
        let handle = ResourceHandle::<u32>::loading(ResourcePath::new("a.mat"));
        let (fired, observer) = counter();
        handle.register_observer(observer);
        assert_eq!(fired.get(), 0);
        assert!(handle.has_observer());

        handle.settle(Ok(7));
        assert_eq!(fired.get(), 1);
        assert_eq!(handle.state(), LoadState::Ready);
        assert_eq!(*handle.get().unwrap().borrow(), 7);
        assert!(!handle.has_observer());
    }

    #[test]
    fn observer_on_ready_handle_fires_inline_exactly_once() {
        let handle = ResourceHandle::<u32>::loading(ResourcePath::new("a.mat"));
        handle.settle(Ok(1));

        let (fired, observer) = counter();
        let token = handle.register_observer(observer);
        assert_eq!(fired.get(), 1);

        handle.settle(Ok(2));
        assert_eq!(fired.get(), 1);
        assert_eq!(*handle.get().unwrap().borrow(), 1);
        assert!(!handle.unregister_observer(token));
    }

    #[test]
    fn unregistered_observer_never_fires() {
        let handle = ResourceHandle::<u32>::loading(ResourcePath::new("a.mat"));
        let (fired, observer) = counter();
        let token = handle.register_observer(observer);
        assert!(handle.unregister_observer(token));
        assert!(!handle.unregister_observer(token));

        handle.settle(Ok(3));
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn error_is_terminal_and_reported() {
        let handle = ResourceHandle::<u32>::loading(ResourcePath::new("broken.mat"));
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        handle.register_observer(move |outcome| *sink.borrow_mut() = Some(outcome));

        handle.settle(Err(LoadError::new(ResourcePath::new("broken.mat"), "bad json")));
        handle.settle(Ok(9));

        assert_eq!(handle.state(), LoadState::Error);
        assert!(handle.get().is_none());
        match seen.borrow().as_ref() {
            Some(LoadOutcome::Failed(err)) => assert_eq!(err.reason, "bad json"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "already has a readiness observer")]
    fn second_observer_is_rejected() {
        let handle = ResourceHandle::<u32>::loading(ResourcePath::new("a.mat"));
        handle.register_observer(|_| {});
        handle.register_observer(|_| {});
    }

    #[test]
    fn await_ready_reflects_state() {
        let handle = ResourceHandle::<u32>::loading(ResourcePath::new("a.mat"));
        assert!(matches!(handle.await_ready(), Readiness::Pending));
        handle.settle(Ok(4));
        assert!(matches!(
            handle.await_ready(),
            Readiness::Settled(LoadOutcome::Ready(_))
        ));
    }
}
