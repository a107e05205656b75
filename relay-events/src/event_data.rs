//! Per-type dispatcher state.

use crate::delegate::{EventDelegate, ViewDelegate};
use crate::dispatcher::Dispatcher;
use relay_core::{Arena, Batcher, EventInfo};
use std::any::Any;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

/// Listeners, hooks and staged events of one payload type.
///
/// For payloads with drop glue, `listeners[0]` is the teardown delegate. User
/// listeners occupy `first_user()..` and fire from the end of the list toward
/// the front, so teardown always runs after them.
pub(crate) struct EventData<T: 'static> {
    info: EventInfo,
    listeners: Vec<EventDelegate<T>>,
    hooks: Vec<ViewDelegate>,
    arena: Arena,
}

impl<T: 'static> EventData<T> {
    pub(crate) fn new(initial_capacity: usize) -> Self {
        let info = EventInfo::of::<T>();
        let listeners = if info.needs_drop {
            vec![EventDelegate::<T>::teardown()]
        } else {
            Vec::new()
        };
        Self {
            info,
            listeners,
            hooks: Vec::new(),
            arena: Arena::with_capacity(initial_capacity.saturating_mul(info.stride)),
        }
    }

    fn first_user(&self) -> usize {
        usize::from(self.info.needs_drop)
    }

    pub(crate) fn listen(&mut self, delegate: EventDelegate<T>) {
        self.listeners.push(delegate);
    }

    /// Remove the most recently added listener equal to `delegate`.
    pub(crate) fn unlisten(&mut self, delegate: &EventDelegate<T>) -> bool {
        for index in (self.first_user()..self.listeners.len()).rev() {
            if self.listeners[index] == *delegate {
                self.listeners.remove(index);
                return true;
            }
        }
        false
    }

    pub(crate) fn clear_listeners(&mut self) {
        let first = self.first_user();
        self.listeners.truncate(first);
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len() - self.first_user()
    }

    pub(crate) fn listen_view(&mut self, hook: ViewDelegate) {
        self.hooks.push(hook);
    }

    pub(crate) fn unlisten_view(&mut self, hook: &ViewDelegate) -> bool {
        match self.hooks.iter().rposition(|bound| bound == hook) {
            Some(index) => {
                self.hooks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Fan `event` out to the user listeners, newest first.
    pub(crate) fn trigger(&self, event: &T) {
        for index in (self.first_user()..self.listeners.len()).rev() {
            self.listeners[index].call(event);
        }
    }

    /// Append one event to the current cycle.
    pub(crate) fn stage(&mut self, event: T) -> &mut T {
        self.arena.construct(event)
    }

    pub(crate) fn batcher(&mut self) -> Batcher<'_, T> {
        Batcher::new(&mut self.arena)
    }

    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }
}

/// Type-erased face of [`EventData`] stored in the dispatcher's registry.
pub(crate) trait ErasedEventData {
    fn info(&self) -> &EventInfo;

    /// Number of staged events.
    fn staged(&self) -> usize;

    /// Run the view hooks, newest first.
    fn run_hooks(&self, dispatcher: &Dispatcher);

    /// Deliver every staged event to every listener, then tear the events down
    /// and reset the arena. Returns the number of events delivered.
    fn dispatch_staged(&mut self) -> usize;

    /// Deliver one queued record and take ownership of it.
    ///
    /// # Safety
    ///
    /// `payload` must point to a live value of this type that the caller
    /// forgets afterward.
    unsafe fn dispatch_record(&mut self, payload: NonNull<u8>);

    /// Tear down one queued record without delivering it.
    ///
    /// # Safety
    ///
    /// As for [`dispatch_record`](Self::dispatch_record).
    unsafe fn discard_record(&mut self, payload: NonNull<u8>);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ErasedEventData for EventData<T> {
    fn info(&self) -> &EventInfo {
        &self.info
    }

    fn staged(&self) -> usize {
        self.arena.count::<T>()
    }

    fn run_hooks(&self, dispatcher: &Dispatcher) {
        for hook in self.hooks.iter().rev() {
            hook.call(dispatcher);
        }
    }

    fn dispatch_staged(&mut self) -> usize {
        let count = self.arena.count::<T>();
        if count == 0 {
            return 0;
        }

        // Listener-major: each listener sees the whole batch before the next.
        let events = self.arena.as_slice::<T>();
        for index in (self.first_user()..self.listeners.len()).rev() {
            let listener = &self.listeners[index];
            for event in events {
                listener.call(event);
            }
        }

        if !self.info.needs_drop {
            self.arena.reset();
            return count;
        }

        let staged = self.arena.as_mut_slice::<T>().as_mut_ptr();
        self.arena.reset();
        let teardown = &self.listeners[0];
        for index in 0..count {
            // SAFETY: the arena no longer tracks these values, each of which
            // is live and released exactly once here.
            unsafe { teardown.release(staged.add(index)) };
        }
        count
    }

    unsafe fn dispatch_record(&mut self, payload: NonNull<u8>) {
        // SAFETY: payload holds a live T that the caller forgets.
        let mut event = ManuallyDrop::new(unsafe { payload.cast::<T>().as_ptr().read() });
        self.trigger(&event);
        if self.info.needs_drop {
            // SAFETY: event is owned here and never touched again.
            unsafe { self.listeners[0].release(&mut *event) };
        }
    }

    unsafe fn discard_record(&mut self, payload: NonNull<u8>) {
        if self.info.needs_drop {
            // SAFETY: forwarded from the caller.
            unsafe { self.listeners[0].release(payload.cast::<T>().as_ptr()) };
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: 'static> Drop for EventData<T> {
    fn drop(&mut self) {
        // Events staged but never run still own their resources.
        Batcher::<T>::new(&mut self.arena).clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::Delegate;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Collision {
        entity: u64,
        force: f32,
    }

    struct Tracked {
        id: u32,
        drops: Rc<Cell<u32>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn log_a(log: &RefCell<Vec<String>>, event: &Collision) {
        log.borrow_mut().push(format!("a{}", event.entity));
    }

    fn log_b(log: &RefCell<Vec<String>>, event: &Collision) {
        log.borrow_mut().push(format!("b{}", event.entity));
    }

    fn logger(log: &Log, label: &str) -> EventDelegate<Collision> {
        match label {
            "a" => Delegate::pointer_with(log, log_a),
            _ => Delegate::pointer_with(log, log_b),
        }
    }

    #[test]
    fn test_trivial_type_has_no_teardown() {
        let data = EventData::<Collision>::new(0);
        assert_eq!(data.first_user(), 0);
        assert_eq!(data.listener_count(), 0);
        assert!(data.listeners.is_empty());
    }

    #[test]
    fn test_drop_glue_installs_teardown_first() {
        let mut data = EventData::<Tracked>::new(0);
        data.listen(Delegate::free(|_: &Tracked| {}));
        assert!(data.listeners[0].is_teardown());
        assert_eq!(data.listener_count(), 1);

        data.clear_listeners();
        assert_eq!(data.listeners.len(), 1);
        assert!(data.listeners[0].is_teardown());
    }

    #[test]
    fn test_initial_capacity_preallocates() {
        let data = EventData::<Collision>::new(8);
        assert_eq!(
            data.arena().capacity(),
            8 * std::mem::size_of::<Collision>()
        );
    }

    #[test]
    fn test_dispatch_staged_is_listener_major() {
        let log: Log = Rc::default();
        let mut data = EventData::<Collision>::new(0);
        data.listen(logger(&log, "a"));
        data.listen(logger(&log, "b"));

        let mut batch = data.batcher();
        batch.push_back(Collision { entity: 1, force: 0.0 });
        batch.push_back(Collision { entity: 2, force: 0.0 });

        assert_eq!(data.dispatch_staged(), 2);
        assert_eq!(*log.borrow(), ["b1", "b2", "a1", "a2"]);
        assert_eq!(data.staged(), 0);
    }

    #[test]
    fn test_dispatch_staged_tears_down_without_listeners() {
        let drops = Rc::new(Cell::new(0));
        let mut data = EventData::<Tracked>::new(0);
        let mut batch = data.batcher();
        for id in 0..3 {
            batch.push_back(Tracked {
                id,
                drops: Rc::clone(&drops),
            });
        }
        assert_eq!(data.dispatch_staged(), 3);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn test_teardown_runs_after_listeners_see_payload() {
        let drops = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut data = EventData::<Tracked>::new(0);

        let observed = Rc::clone(&drops);
        let record = Rc::clone(&seen);
        data.listen(Delegate::functor_with(
            &Rc::new((observed, record)),
            |(drops, seen): &(Rc<Cell<u32>>, Rc<RefCell<Vec<(u32, u32)>>>), t: &Tracked| {
                seen.borrow_mut().push((t.id, drops.get()))
            },
        ));

        let mut batch = data.batcher();
        batch.push_back(Tracked {
            id: 7,
            drops: Rc::clone(&drops),
        });
        batch.push_back(Tracked {
            id: 8,
            drops: Rc::clone(&drops),
        });
        data.dispatch_staged();

        assert_eq!(*seen.borrow(), [(7, 0), (8, 0)]);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn test_unlisten_removes_newest_match_only() {
        let log: Log = Rc::default();
        let mut data = EventData::<Collision>::new(0);
        data.listen(logger(&log, "a"));
        data.listen(logger(&log, "b"));
        data.listen(logger(&log, "a"));

        assert!(data.unlisten(&logger(&log, "a")));
        assert_eq!(data.listener_count(), 2);
        data.trigger(&Collision { entity: 5, force: 1.0 });
        assert_eq!(*log.borrow(), ["b5", "a5"]);
    }

    #[test]
    fn test_unlisten_cannot_reach_teardown() {
        let mut data = EventData::<Tracked>::new(0);
        let teardown = EventDelegate::<Tracked>::teardown();
        assert!(!data.unlisten(&teardown));
        assert!(data.listeners[0].is_teardown());
    }

    #[test]
    fn test_dispatch_record_takes_ownership() {
        let drops = Rc::new(Cell::new(0));
        let mut data = EventData::<Tracked>::new(0);
        let calls = Rc::new(Cell::new(0u32));
        data.listen(Delegate::functor_with(&calls, |calls: &Cell<u32>, _: &Tracked| {
            calls.set(calls.get() + 1)
        }));

        let mut slot = ManuallyDrop::new(Tracked {
            id: 1,
            drops: Rc::clone(&drops),
        });
        // SAFETY: slot is forgotten after the call.
        unsafe { data.dispatch_record(NonNull::from(&mut *slot).cast()) };
        assert_eq!(calls.get(), 1);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_drop_releases_staged_events() {
        let drops = Rc::new(Cell::new(0));
        {
            let mut data = EventData::<Tracked>::new(0);
            let mut batch = data.batcher();
            batch.push_back(Tracked {
                id: 0,
                drops: Rc::clone(&drops),
            });
            batch.push_back(Tracked {
                id: 1,
                drops: Rc::clone(&drops),
            });
        }
        assert_eq!(drops.get(), 2);
    }
}
