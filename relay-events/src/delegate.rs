//! Comparable listener handles.
//!
//! Every way of binding a listener is normalized at construction into one
//! [`Delegate`]: a trampoline that invokes the callable, plus a
//! [`DelegateKey`] that identifies it. Two delegates are equal when their keys
//! are equal, so a listener can be removed by rebuilding the same binding
//! instead of holding on to a registration handle.
//!
//! | Constructor                  | Kind                            | Identity            | Instance |
//! |------------------------------|---------------------------------|---------------------|----------|
//! | [`Delegate::free`]           | `FreeFunction`                  | function address    | none     |
//! | [`Delegate::method`]         | `BoundMethod`                   | method address      | `Rc`     |
//! | [`Delegate::pointer`]        | `FunctionPointer`               | function address    | none     |
//! | [`Delegate::pointer_with`]   | `FunctionPointerWithInstance`   | function address    | `Rc`     |
//! | [`Delegate::functor`]        | `StatelessFunctor`              | closure type        | none     |
//! | [`Delegate::functor_with`]   | `StatelessFunctor`              | closure type        | `Rc`     |

use crate::dispatcher::Dispatcher;
use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::ptr;
use std::rc::Rc;

/// Listener for one payload type.
pub type EventDelegate<T> = Delegate<T>;

/// Hook run after a batch is staged and before its listeners fire.
///
/// Receives the dispatcher so it can build a [`Viewer`](relay_core::Viewer)
/// over any staged type.
pub type ViewDelegate = Delegate<Dispatcher>;

/// How a delegate was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    FreeFunction,
    BoundMethod,
    FunctionPointer,
    FunctionPointerWithInstance,
    StatelessFunctor,
    /// Destroys owned payloads after every user listener has seen them
    Teardown,
}

/// What a delegate calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Address of a function or method
    Address(usize),
    /// Type of a zero-sized closure
    Functor(TypeId),
    /// Reserved for the dispatcher's teardown delegate
    Teardown,
}

/// Equality key of a delegate: the callable plus the bound instance, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateKey {
    pub identity: Identity,
    pub instance: Option<usize>,
}

enum Trampoline<A: 'static> {
    Function(fn(&A)),
    Closure(Rc<dyn Fn(&A)>),
    Teardown(unsafe fn(*mut A)),
}

impl<A: 'static> Clone for Trampoline<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Function(f) => Self::Function(*f),
            Self::Closure(f) => Self::Closure(Rc::clone(f)),
            Self::Teardown(f) => Self::Teardown(*f),
        }
    }
}

/// Normalized, comparable handle to a listener taking `&A`.
pub struct Delegate<A: 'static> {
    key: DelegateKey,
    kind: BindingKind,
    call: Trampoline<A>,
}

impl<A: 'static> Delegate<A> {
    /// Bind a free function.
    pub fn free(f: fn(&A)) -> Self {
        Self {
            key: DelegateKey {
                identity: Identity::Address(f as usize),
                instance: None,
            },
            kind: BindingKind::FreeFunction,
            call: Trampoline::Function(f),
        }
    }

    /// Bind a function pointer chosen at runtime.
    ///
    /// Compares equal to [`Delegate::free`] over the same function.
    pub fn pointer(f: fn(&A)) -> Self {
        Self {
            kind: BindingKind::FunctionPointer,
            ..Self::free(f)
        }
    }

    /// Bind a method that needs mutable access to its receiver.
    ///
    /// The delegate keeps `instance` alive. A listener re-entering the same
    /// instance while it is borrowed panics.
    pub fn method<I: 'static>(instance: &Rc<RefCell<I>>, f: fn(&mut I, &A)) -> Self {
        let receiver = Rc::clone(instance);
        Self {
            key: DelegateKey {
                identity: Identity::Address(f as usize),
                instance: Some(instance_address(instance)),
            },
            kind: BindingKind::BoundMethod,
            call: Trampoline::Closure(Rc::new(move |event: &A| {
                f(&mut receiver.borrow_mut(), event)
            })),
        }
    }

    /// Bind a function pointer together with a shared instance.
    pub fn pointer_with<I: 'static>(instance: &Rc<I>, f: fn(&I, &A)) -> Self {
        let receiver = Rc::clone(instance);
        Self {
            key: DelegateKey {
                identity: Identity::Address(f as usize),
                instance: Some(instance_address(instance)),
            },
            kind: BindingKind::FunctionPointerWithInstance,
            call: Trampoline::Closure(Rc::new(move |event: &A| f(&receiver, event))),
        }
    }

    /// Bind a stateless closure. Identity is the closure's type.
    ///
    /// Capturing closures are rejected at compile time, since two captures of
    /// the same closure type could not be told apart.
    pub fn functor<F>(f: F) -> Self
    where
        F: Fn(&A) + 'static,
    {
        const { assert!(mem::size_of::<F>() == 0, "functor delegates must not capture state") };

        Self {
            key: DelegateKey {
                identity: Identity::Functor(TypeId::of::<F>()),
                instance: None,
            },
            kind: BindingKind::StatelessFunctor,
            call: Trampoline::Closure(Rc::new(f)),
        }
    }

    /// Bind a stateless closure together with a shared instance.
    pub fn functor_with<I, F>(instance: &Rc<I>, f: F) -> Self
    where
        I: 'static,
        F: Fn(&I, &A) + 'static,
    {
        const { assert!(mem::size_of::<F>() == 0, "functor delegates must not capture state") };

        let receiver = Rc::clone(instance);
        Self {
            key: DelegateKey {
                identity: Identity::Functor(TypeId::of::<F>()),
                instance: Some(instance_address(instance)),
            },
            kind: BindingKind::StatelessFunctor,
            call: Trampoline::Closure(Rc::new(move |event: &A| f(&receiver, event))),
        }
    }

    /// Delegate that runs `A`'s destructor in place.
    pub(crate) fn teardown() -> Self {
        Self {
            key: DelegateKey {
                identity: Identity::Teardown,
                instance: None,
            },
            kind: BindingKind::Teardown,
            call: Trampoline::Teardown(ptr::drop_in_place::<A>),
        }
    }

    pub fn key(&self) -> DelegateKey {
        self.key
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn is_teardown(&self) -> bool {
        self.kind == BindingKind::Teardown
    }

    /// Invoke the listener. Teardown delegates ignore borrowed payloads.
    pub fn call(&self, event: &A) {
        match &self.call {
            Trampoline::Function(f) => f(event),
            Trampoline::Closure(f) => f(event),
            Trampoline::Teardown(_) => {}
        }
    }

    /// Destroy an owned payload if this is a teardown delegate.
    ///
    /// # Safety
    ///
    /// `event` must point to a live `A` that nothing reads or drops afterward.
    pub(crate) unsafe fn release(&self, event: *mut A) {
        if let Trampoline::Teardown(destroy) = self.call {
            // SAFETY: forwarded from the caller.
            unsafe { destroy(event) }
        }
    }
}

impl<A: 'static> From<fn(&A)> for Delegate<A> {
    fn from(f: fn(&A)) -> Self {
        Self::free(f)
    }
}

impl<A: 'static> Clone for Delegate<A> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            kind: self.kind,
            call: self.call.clone(),
        }
    }
}

impl<A: 'static> PartialEq for Delegate<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<A: 'static> Eq for Delegate<A> {}

impl<A: 'static> fmt::Debug for Delegate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .finish()
    }
}

fn instance_address<I>(instance: &Rc<I>) -> usize {
    Rc::as_ptr(instance).cast::<()>() as usize
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Ping(u32);

    #[derive(Default)]
    struct Counter {
        total: u32,
    }

    impl Counter {
        fn add(&mut self, ping: &Ping) {
            self.total += ping.0;
        }
    }

    struct Probe {
        seen: Cell<u32>,
    }

    fn on_ping(ping: &Ping) {
        std::hint::black_box(ping.0);
    }

    fn on_ping_other(ping: &Ping) {
        std::hint::black_box(ping.0.wrapping_add(1));
    }

    fn probe_ping(probe: &Probe, ping: &Ping) {
        probe.seen.set(probe.seen.get() + ping.0);
    }

    #[test]
    fn test_free_delegates_compare_by_function() {
        assert_eq!(Delegate::free(on_ping), Delegate::free(on_ping));
        assert_ne!(Delegate::free(on_ping), Delegate::free(on_ping_other));
    }

    #[test]
    fn test_from_function_pointer_is_free_binding() {
        let delegate: Delegate<Ping> = (on_ping as fn(&Ping)).into();
        assert_eq!(delegate.kind(), BindingKind::FreeFunction);
        assert_eq!(delegate, Delegate::free(on_ping));
    }

    #[test]
    fn test_pointer_equals_free_over_same_function() {
        let free = Delegate::free(on_ping);
        let pointer = Delegate::pointer(on_ping);
        assert_eq!(free, pointer);
        assert_eq!(pointer.kind(), BindingKind::FunctionPointer);
    }

    #[test]
    fn test_method_identity_includes_instance() {
        let first = Rc::new(RefCell::new(Counter::default()));
        let second = Rc::new(RefCell::new(Counter::default()));

        let a = Delegate::method(&first, Counter::add);
        let b = Delegate::method(&first, Counter::add);
        let c = Delegate::method(&second, Counter::add);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.kind(), BindingKind::BoundMethod);
    }

    #[test]
    fn test_method_mutates_receiver() {
        let counter = Rc::new(RefCell::new(Counter::default()));
        let delegate = Delegate::method(&counter, Counter::add);
        delegate.call(&Ping(3));
        delegate.call(&Ping(4));
        assert_eq!(counter.borrow().total, 7);
    }

    #[test]
    fn test_pointer_with_passes_instance() {
        let probe = Rc::new(Probe { seen: Cell::new(0) });
        let delegate = Delegate::pointer_with(&probe, probe_ping);
        delegate.call(&Ping(5));
        assert_eq!(probe.seen.get(), 5);
        assert_eq!(delegate.key().instance, Some(Rc::as_ptr(&probe) as usize));
    }

    #[test]
    fn test_functor_identity_is_closure_type() {
        fn make() -> Delegate<Ping> {
            Delegate::functor(|_: &Ping| {})
        }
        // Same closure expression, same type.
        assert_eq!(make(), make());
        assert_ne!(make(), Delegate::functor(|_: &Ping| {}));
        assert!(matches!(make().key().identity, Identity::Functor(_)));
    }

    #[test]
    fn test_functor_with_distinguishes_instances() {
        fn make(probe: &Rc<Probe>) -> Delegate<Ping> {
            Delegate::functor_with(probe, |probe: &Probe, ping: &Ping| {
                probe.seen.set(ping.0)
            })
        }
        let first = Rc::new(Probe { seen: Cell::new(0) });
        let second = Rc::new(Probe { seen: Cell::new(0) });
        assert_eq!(make(&first), make(&first));
        assert_ne!(make(&first), make(&second));

        make(&second).call(&Ping(9));
        assert_eq!(second.seen.get(), 9);
        assert_eq!(first.seen.get(), 0);
    }

    #[test]
    fn test_teardown_identity_is_reserved() {
        let teardown = Delegate::<String>::teardown();
        assert!(teardown.is_teardown());
        assert_eq!(teardown.key().identity, Identity::Teardown);
        assert_ne!(teardown, Delegate::free(|_: &String| {}));
    }

    #[test]
    fn test_teardown_release_drops_in_place() {
        let drops = Rc::new(Cell::new(0));
        struct Guard(Rc<Cell<u32>>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let mut slot = mem::ManuallyDrop::new(Guard(Rc::clone(&drops)));
        let teardown = Delegate::<Guard>::teardown();
        teardown.call(&slot);
        assert_eq!(drops.get(), 0);

        // SAFETY: slot is live and never used again.
        unsafe { teardown.release(&mut *slot) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_clone_shares_identity() {
        let counter = Rc::new(RefCell::new(Counter::default()));
        let delegate = Delegate::method(&counter, Counter::add);
        let copy = delegate.clone();
        assert_eq!(delegate, copy);
        copy.call(&Ping(2));
        assert_eq!(counter.borrow().total, 2);
    }
}
