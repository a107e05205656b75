//! The event dispatcher.
//!
//! Three delivery models share one registry of per-type listener lists:
//!
//! ```text
//! trigger(&e)   ──────────────────────────────→ listeners (now)
//! emit(e)       ──→ Arena<T>  ──run()────────→ hooks, then listeners per type
//! emit_bus(e)   ──→ EventQueue ──run_bus()───→ listeners, strict FIFO across types
//! ```
//!
//! Listeners fire newest first. Staged events are delivered listener-major:
//! one listener sees a type's whole batch before the next listener runs.

use crate::delegate::{EventDelegate, ViewDelegate};
use crate::event_data::{ErasedEventData, EventData};
use relay_core::{
    fatal, Batcher, DispatchError, EventInfo, EventQueue, QueueError, RelayConfig, RelayResult,
    Viewer,
};
use std::any::{self, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Registry of event types, their listeners and their pending events.
///
/// Single-threaded: listeners are `Rc`-based and the dispatcher is neither
/// `Send` nor `Sync`.
///
/// # Example
///
/// ```
/// use relay_events::{Delegate, Dispatcher};
///
/// struct Resize {
///     width: u32,
/// }
///
/// fn on_resize(event: &Resize) {
///     assert!(event.width > 0);
/// }
///
/// let mut dispatcher = Dispatcher::new();
/// dispatcher.listen(Delegate::free(on_resize));
///
/// dispatcher.trigger(&Resize { width: 640 });
/// dispatcher.emit(Resize { width: 800 });
/// dispatcher.emit_bus(Resize { width: 1024 });
/// assert_eq!(dispatcher.flush(), 2);
/// ```
pub struct Dispatcher {
    events: HashMap<TypeId, Box<dyn ErasedEventData>>,
    queue: EventQueue,
    config: RelayConfig,
}

impl Dispatcher {
    /// Dispatcher with the default configuration.
    pub fn new() -> Self {
        Self::build(RelayConfig::default())
    }

    /// Dispatcher with a validated configuration.
    pub fn with_config(config: RelayConfig) -> RelayResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RelayConfig) -> Self {
        Self {
            events: HashMap::new(),
            queue: EventQueue::with_capacity(config.queue_page_size),
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Append a listener for `T`, registering `T` if needed.
    ///
    /// Duplicates are kept; each fires once per event.
    pub fn listen<T: 'static>(&mut self, delegate: EventDelegate<T>) -> &mut Self {
        self.secure::<T>().listen(delegate);
        self
    }

    /// Append a hook that runs when `T` has staged events, before any
    /// listener of the cycle.
    pub fn listen_view<T: 'static>(&mut self, hook: ViewDelegate) -> &mut Self {
        self.secure::<T>().listen_view(hook);
        self
    }

    /// Register `T` without binding anything.
    pub fn register<T: 'static>(&mut self) -> &mut Self {
        self.secure::<T>();
        self
    }

    /// Remove the most recently added listener equal to `delegate`.
    ///
    /// Returns whether one was found.
    pub fn unlisten<T: 'static>(&mut self, delegate: &EventDelegate<T>) -> bool {
        self.data_mut::<T>()
            .is_some_and(|data| data.unlisten(delegate))
    }

    /// Remove the most recently added hook equal to `hook`.
    pub fn unlisten_view<T: 'static>(&mut self, hook: &ViewDelegate) -> bool {
        self.data_mut::<T>()
            .is_some_and(|data| data.unlisten_view(hook))
    }

    /// Remove every listener of `T`. `T` stays registered.
    pub fn clear<T: 'static>(&mut self) {
        if let Some(data) = self.data_mut::<T>() {
            data.clear_listeners();
        }
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.events.contains_key(&TypeId::of::<T>())
    }

    pub fn has_listeners<T: 'static>(&self) -> bool {
        self.listener_count::<T>() > 0
    }

    /// Number of listeners bound to `T`.
    pub fn listener_count<T: 'static>(&self) -> usize {
        self.data::<T>().map_or(0, EventData::listener_count)
    }

    // ========================================================================
    // IMMEDIATE DELIVERY
    // ========================================================================

    /// Call every listener of `T` with `event`, newest first.
    ///
    /// The event stays owned by the caller.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    #[track_caller]
    pub fn trigger<T: 'static>(&self, event: &T) {
        if let Err(err) = self.try_trigger(event) {
            fatal(err)
        }
    }

    /// Checked form of [`Dispatcher::trigger`].
    pub fn try_trigger<T: 'static>(&self, event: &T) -> Result<(), DispatchError> {
        let data = self.data::<T>().ok_or(DispatchError::Unregistered {
            name: any::type_name::<T>(),
        })?;
        data.trigger(event);
        Ok(())
    }

    // ========================================================================
    // BATCHED DELIVERY
    // ========================================================================

    /// Stage `event` for the next [`run`](Self::run).
    pub fn emit<T: 'static>(&mut self, event: T) {
        self.secure::<T>().stage(event);
    }

    /// Stage `event` and return the staged value.
    pub fn batch<T: 'static>(&mut self, event: T) -> &mut T {
        self.secure::<T>().stage(event)
    }

    /// Producer facade over `T`'s staging arena.
    pub fn batcher<T: 'static>(&mut self) -> Batcher<'_, T> {
        self.secure::<T>().batcher()
    }

    /// Events of `T` staged for the next cycle. Empty for unknown types.
    pub fn view<T: 'static>(&self) -> Viewer<'_, T> {
        match self.data::<T>() {
            Some(data) => Viewer::new(data.arena()),
            None => Viewer::empty(),
        }
    }

    /// Number of staged events of `T`.
    pub fn staged<T: 'static>(&self) -> usize {
        self.data::<T>().map_or(0, |data| data.staged())
    }

    /// Deliver every staged event.
    ///
    /// First the hooks of every type with staged events run, then each type's
    /// listeners receive its batch in staging order. Order between types is
    /// unspecified. Returns the number of events delivered.
    pub fn run(&mut self) -> usize {
        for data in self.events.values() {
            if data.staged() > 0 {
                data.run_hooks(self);
            }
        }

        let mut types = 0;
        let mut delivered = 0;
        for data in self.events.values_mut() {
            let count = data.dispatch_staged();
            if count > 0 {
                types += 1;
                delivered += count;
            }
        }

        tracing::trace!(types, delivered, "drained staged events");
        delivered
    }

    // ========================================================================
    // QUEUED DELIVERY
    // ========================================================================

    /// Queue `event` for the next [`run_bus`](Self::run_bus).
    ///
    /// `T` need not be registered yet; it must be by the time the bus drains.
    ///
    /// # Panics
    ///
    /// Panics if the queue page has no room for the record.
    #[track_caller]
    pub fn emit_bus<T: 'static>(&mut self, event: T) {
        self.queue.push(event);
    }

    /// Same as [`emit_bus`](Self::emit_bus).
    #[track_caller]
    pub fn enqueue<T: 'static>(&mut self, event: T) {
        self.queue.push(event);
    }

    /// Checked form of [`Dispatcher::emit_bus`].
    pub fn try_emit_bus<T: 'static>(&mut self, event: T) -> Result<(), QueueError> {
        self.queue.try_push(event)
    }

    /// Records waiting on the bus.
    pub fn bus_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_bus_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Deliver every queued record in emission order, then rewind the queue.
    ///
    /// Returns the number of records delivered.
    ///
    /// # Panics
    ///
    /// Panics on a record whose type was never registered.
    #[track_caller]
    pub fn run_bus(&mut self) -> usize {
        match self.try_run_bus() {
            Ok(delivered) => delivered,
            Err(err) => fatal(err),
        }
    }

    /// Checked form of [`Dispatcher::run_bus`].
    ///
    /// Stops at the first record of an unregistered type and leaves it, and
    /// everything after it, queued.
    pub fn try_run_bus(&mut self) -> Result<usize, DispatchError> {
        let mut delivered = 0;
        while let Some(key) = self.queue.check() {
            let Some(data) = self.events.get_mut(&key.id()) else {
                return Err(DispatchError::UnregisteredRecord { name: key.name() });
            };
            let Some(payload) = self.queue.peek() else {
                break;
            };
            self.queue.pop();
            // SAFETY: check() identified the record as this data's type and
            // the record is popped, so the queue never touches it again.
            unsafe { data.dispatch_record(payload) };
            delivered += 1;
        }

        self.queue.reset();
        tracing::trace!(delivered, "drained event bus");
        Ok(delivered)
    }

    /// [`run`](Self::run) followed by [`run_bus`](Self::run_bus).
    #[track_caller]
    pub fn flush(&mut self) -> usize {
        self.run() + self.run_bus()
    }

    // ========================================================================
    // REGISTRY
    // ========================================================================

    /// Info of every registered type, in no particular order.
    pub fn registered(&self) -> impl Iterator<Item = &EventInfo> + '_ {
        self.events.values().map(|data| data.info())
    }

    fn secure<T: 'static>(&mut self) -> &mut EventData<T> {
        let initial_capacity = self.config.arena_initial_capacity;
        let data = self.events.entry(TypeId::of::<T>()).or_insert_with(|| {
            let data: Box<dyn ErasedEventData> = Box::new(EventData::<T>::new(initial_capacity));
            let info = data.info();
            tracing::debug!(
                event = info.name,
                size = info.size,
                teardown = info.needs_drop,
                "registered event type"
            );
            data
        });
        match data.as_any_mut().downcast_mut::<EventData<T>>() {
            Some(data) => data,
            None => unreachable!("event data keyed under a foreign type id"),
        }
    }

    fn data<T: 'static>(&self) -> Option<&EventData<T>> {
        let data = self.events.get(&TypeId::of::<T>())?;
        match data.as_any().downcast_ref::<EventData<T>>() {
            Some(data) => Some(data),
            None => unreachable!("event data keyed under a foreign type id"),
        }
    }

    fn data_mut<T: 'static>(&mut self) -> Option<&mut EventData<T>> {
        let data = self.events.get_mut(&TypeId::of::<T>())?;
        match data.as_any_mut().downcast_mut::<EventData<T>>() {
            Some(data) => Some(data),
            None => unreachable!("event data keyed under a foreign type id"),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Pending records of registered types still own their resources.
        // Staged events are released by each EventData.
        while let Some(key) = self.queue.check() {
            let Some(payload) = self.queue.peek() else {
                break;
            };
            self.queue.pop();
            if let Some(data) = self.events.get_mut(&key.id()) {
                // SAFETY: the record is of data's type and already popped.
                unsafe { data.discard_record(payload) };
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("types", &self.events.len())
            .field("bus", &self.queue)
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
