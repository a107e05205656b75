//! Type identity and per-type layout metadata.
//!
//! The storage engine never derives identities on its own. It asks
//! [`TypeKey::of`] for a process-stable key and a diagnostic name, and
//! captures everything else it needs about a payload type in [`EventInfo`].

use std::any::{self, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

// ============================================================================
// TYPE KEY
// ============================================================================

/// Process-stable identity of one concrete payload type.
///
/// Equality and hashing use the [`TypeId`] only; the name is carried for
/// diagnostics and never compared.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Identity of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    /// The underlying type id.
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Diagnostic type name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether this key identifies `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// EVENT INFO
// ============================================================================

/// Byte distance between consecutive `T` values in an arena.
///
/// Zero-sized payloads occupy one alignment unit so they can still be counted.
pub const fn stride_of<T>() -> usize {
    if mem::size_of::<T>() == 0 {
        mem::align_of::<T>()
    } else {
        mem::size_of::<T>()
    }
}

/// Layout and identity of one payload type, captured on first registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventInfo {
    /// Diagnostic name of the payload type
    pub name: &'static str,
    /// Identity of the payload type
    pub type_id: TypeId,
    /// `size_of::<T>()`
    pub size: usize,
    /// `align_of::<T>()`
    pub align: usize,
    /// Arena slot width, see [`stride_of`]
    pub stride: usize,
    /// Whether dropping a `T` runs any code
    pub needs_drop: bool,
}

impl EventInfo {
    /// Capture the info of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            name: any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            stride: stride_of::<T>(),
            needs_drop: mem::needs_drop::<T>(),
        }
    }

    /// The identity key for this type.
    pub fn key(&self) -> TypeKey {
        TypeKey {
            id: self.type_id,
            name: self.name,
        }
    }

    /// Check whether this info describes `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for EventInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size)
    }
}

// =============================================================================
// TESTS
// =============================================================================
