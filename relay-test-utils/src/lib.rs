//! RELAY Test Utilities
//!
//! Shared test infrastructure for the RELAY workspace:
//! - Payload fixtures covering plain, zero-sized and drop-glue events
//! - Recording listeners that log what they observe, and in which order
//! - Proptest generators for payloads and bus scripts
//! - Custom assertions for dispatcher state

// Re-export core types for convenience
pub use relay_core::{Arena, Batcher, DispatchError, EventQueue, RelayConfig, Viewer};
pub use relay_events::{Delegate, Dispatcher, EventDelegate, ViewDelegate};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

// ============================================================================
// PAYLOADS
// ============================================================================

/// Chat line with owned strings; has drop glue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub msg: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            msg: msg.into(),
        }
    }
}

/// Keyboard input; trivially copyable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: i32,
    pub pressed: bool,
}

/// Window close request; zero-sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloseEvent;

/// Physics contact between two entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub entity: u64,
    pub other: u64,
    pub force: f32,
}

/// Payload that reports every destruction to its [`DropCounter`].
#[derive(Debug)]
pub struct DropCounted {
    pub id: u32,
    drops: Rc<Cell<usize>>,
}

impl Drop for DropCounted {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

/// Shared tally of [`DropCounted`] destructions.
#[derive(Debug, Clone, Default)]
pub struct DropCounter {
    drops: Rc<Cell<usize>>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A payload tied to this counter.
    pub fn event(&self, id: u32) -> DropCounted {
        DropCounted {
            id,
            drops: Rc::clone(&self.drops),
        }
    }

    pub fn count(&self) -> usize {
        self.drops.get()
    }
}

// ============================================================================
// RECORDING LISTENERS
// ============================================================================

/// Listener that keeps a copy of every event it receives.
#[derive(Debug, Default)]
pub struct Recorder<T> {
    seen: RefCell<Vec<T>>,
}

impl<T: Clone + 'static> Recorder<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            seen: RefCell::new(Vec::new()),
        })
    }

    /// Delegate bound to this recorder. Equal for every call on the same `Rc`.
    pub fn delegate(self: &Rc<Self>) -> EventDelegate<T> {
        Delegate::pointer_with(self, Self::record)
    }

    /// Store a copy of `event`.
    pub fn record(&self, event: &T) {
        self.seen.borrow_mut().push(event.clone());
    }

    pub fn events(&self) -> Vec<T> {
        self.seen.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.seen.borrow_mut().clear();
    }
}

/// Ordered log of which labelled listener fired.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: RefCell<Vec<&'static str>>,
}

impl CallLog {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Listener source that appends `label` to this log when called.
    pub fn tag(self: &Rc<Self>, label: &'static str) -> Rc<Tagged> {
        Rc::new(Tagged {
            label,
            log: Rc::clone(self),
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

/// One labelled listener writing into a [`CallLog`].
#[derive(Debug)]
pub struct Tagged {
    label: &'static str,
    log: Rc<CallLog>,
}

impl Tagged {
    /// Delegate for payload `T`. Equal for every call on the same `Rc`.
    pub fn delegate<T: 'static>(self: &Rc<Self>) -> EventDelegate<T> {
        Delegate::pointer_with(self, Self::record::<T>)
    }

    /// View hook for the same label.
    pub fn hook(self: &Rc<Self>) -> ViewDelegate {
        Delegate::pointer_with(self, Self::record::<Dispatcher>)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    fn record<T>(&self, _: &T) {
        self.log.calls.borrow_mut().push(self.label);
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for RELAY payloads and scripts.

    use super::*;
    use proptest::prelude::*;

    /// Generate a KeyEvent.
    pub fn arb_key_event() -> impl Strategy<Value = KeyEvent> {
        (any::<i32>(), any::<bool>()).prop_map(|(key, pressed)| KeyEvent { key, pressed })
    }

    /// Generate a ChatMessage with a capitalised sender.
    pub fn arb_chat_message() -> impl Strategy<Value = ChatMessage> {
        ("[A-Z][a-z]{2,8}", "[A-Za-z !?]{0,40}")
            .prop_map(|(sender, msg)| ChatMessage { sender, msg })
    }

    /// Generate a Collision with a finite force.
    pub fn arb_collision() -> impl Strategy<Value = Collision> {
        (any::<u64>(), any::<u64>(), -1.0e6f32..1.0e6).prop_map(|(entity, other, force)| {
            Collision {
                entity,
                other,
                force,
            }
        })
    }

    /// One emission of a mixed-type bus script.
    #[derive(Debug, Clone, PartialEq)]
    pub enum BusEvent {
        Key(KeyEvent),
        Chat(ChatMessage),
        Collision(Collision),
        Close,
    }

    impl BusEvent {
        /// Queue this event on `dispatcher`'s bus.
        pub fn emit_bus(self, dispatcher: &mut Dispatcher) {
            match self {
                BusEvent::Key(event) => dispatcher.emit_bus(event),
                BusEvent::Chat(event) => dispatcher.emit_bus(event),
                BusEvent::Collision(event) => dispatcher.emit_bus(event),
                BusEvent::Close => dispatcher.emit_bus(CloseEvent),
            }
        }

        /// Stage this event in its type's arena.
        pub fn emit(self, dispatcher: &mut Dispatcher) {
            match self {
                BusEvent::Key(event) => dispatcher.emit(event),
                BusEvent::Chat(event) => dispatcher.emit(event),
                BusEvent::Collision(event) => dispatcher.emit(event),
                BusEvent::Close => dispatcher.emit(CloseEvent),
            }
        }
    }

    /// Generate a BusEvent of any payload type.
    pub fn arb_bus_event() -> impl Strategy<Value = BusEvent> {
        prop_oneof![
            arb_key_event().prop_map(BusEvent::Key),
            arb_chat_message().prop_map(BusEvent::Chat),
            arb_collision().prop_map(BusEvent::Collision),
            Just(BusEvent::Close),
        ]
    }

    /// Generate a script of up to `max` bus emissions.
    pub fn arb_bus_script(max: usize) -> impl Strategy<Value = Vec<BusEvent>> {
        prop::collection::vec(arb_bus_event(), 0..max)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-wired dispatchers for common scenarios.

    use super::generators::BusEvent;
    use super::*;

    /// Recorders for every fixture payload type.
    pub struct Recorders {
        pub keys: Rc<Recorder<KeyEvent>>,
        pub chats: Rc<Recorder<ChatMessage>>,
        pub collisions: Rc<Recorder<Collision>>,
        pub closes: Rc<Recorder<CloseEvent>>,
    }

    impl Recorders {
        /// Events observed across every recorder.
        pub fn total(&self) -> usize {
            self.keys.len() + self.chats.len() + self.collisions.len() + self.closes.len()
        }
    }

    /// Dispatcher with one recorder listening on each fixture payload type.
    pub fn recording_dispatcher() -> (Dispatcher, Recorders) {
        let recorders = Recorders {
            keys: Recorder::new(),
            chats: Recorder::new(),
            collisions: Recorder::new(),
            closes: Recorder::new(),
        };
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .listen(recorders.keys.delegate())
            .listen(recorders.chats.delegate())
            .listen(recorders.collisions.delegate())
            .listen(recorders.closes.delegate());
        (dispatcher, recorders)
    }

    /// Dispatcher whose listeners push a [`BusEvent`] per delivery into one
    /// shared log, preserving cross-type order.
    pub fn bus_log_dispatcher() -> (Dispatcher, Rc<RefCell<Vec<BusEvent>>>) {
        let log: Rc<RefCell<Vec<BusEvent>>> = Rc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .listen(Delegate::functor_with(
                &log,
                |log: &RefCell<Vec<BusEvent>>, event: &KeyEvent| {
                    log.borrow_mut().push(BusEvent::Key(*event))
                },
            ))
            .listen(Delegate::functor_with(
                &log,
                |log: &RefCell<Vec<BusEvent>>, event: &ChatMessage| {
                    log.borrow_mut().push(BusEvent::Chat(event.clone()))
                },
            ))
            .listen(Delegate::functor_with(
                &log,
                |log: &RefCell<Vec<BusEvent>>, event: &Collision| {
                    log.borrow_mut().push(BusEvent::Collision(*event))
                },
            ))
            .listen(Delegate::functor_with(
                &log,
                |log: &RefCell<Vec<BusEvent>>, _: &CloseEvent| {
                    log.borrow_mut().push(BusEvent::Close)
                },
            ));
        (dispatcher, log)
    }

    /// Dispatcher limited to a small queue page.
    pub fn small_bus_dispatcher() -> Dispatcher {
        let config = RelayConfig {
            queue_page_size: relay_core::MIN_QUEUE_PAGE_SIZE,
            ..RelayConfig::default()
        };
        match Dispatcher::with_config(config) {
            Ok(dispatcher) => dispatcher,
            Err(e) => panic!("fixture config rejected: {}", e),
        }
    }

    /// The two-line chat exchange used across scenario tests.
    pub fn chat_exchange() -> [ChatMessage; 2] {
        [
            ChatMessage::new("Tom", "Hello"),
            ChatMessage::new("Liam", "Hi"),
        ]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over dispatcher state.

    use super::*;

    /// Assert that the bus holds no records.
    #[track_caller]
    pub fn assert_bus_drained(dispatcher: &Dispatcher) {
        assert!(
            dispatcher.is_bus_empty(),
            "Expected empty bus, {} records pending",
            dispatcher.bus_len()
        );
    }

    /// Assert that nothing of `T` is staged.
    #[track_caller]
    pub fn assert_nothing_staged<T: 'static>(dispatcher: &Dispatcher) {
        assert_eq!(
            dispatcher.staged::<T>(),
            0,
            "Expected no staged {}",
            std::any::type_name::<T>()
        );
    }

    /// Assert that a dispatch result failed on an unregistered type.
    #[track_caller]
    pub fn assert_unregistered<T: std::fmt::Debug>(result: &Result<T, DispatchError>) {
        match result {
            Err(DispatchError::Unregistered { .. }) | Err(DispatchError::UnregisteredRecord { .. }) => {}
            other => panic!("Expected unregistered type error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
