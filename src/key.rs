//! Type keys for slot storage and lookup.

use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies the type a slot answers for.
///
/// A `TypeKey` pairs the process-stable [`TypeId`] of a type with its
/// `type_name` for diagnostics. Keys work for sized types and trait objects
/// alike, so `TypeKey::of::<dyn Render>()` is as valid as
/// `TypeKey::of::<Widget>()`.
///
/// Equality and hashing use only the `TypeId`. Ordering is by name first and
/// `TypeId` second, which gives every layer the same globally consistent order
/// for multi-slot lock acquisition and a readable order for diagnostic dumps.
///
/// # Examples
///
/// ```rust
/// use stratum_di::TypeKey;
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key.name(), "alloc::string::String");
/// assert_eq!(key, TypeKey::of::<String>());
/// assert_ne!(key, TypeKey::of::<u32>());
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The full `type_name` of the keyed type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The `TypeId` of the keyed type.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The type name without module paths, e.g. `Widget` for `app::model::Widget`.
    ///
    /// Generic arguments are shortened as well.
    ///
    /// ```rust
    /// use stratum_di::TypeKey;
    ///
    /// assert_eq!(TypeKey::of::<Vec<String>>().short_name(), "Vec<String>");
    /// ```
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();
        for ch in self.name.chars() {
            match ch {
                ':' => segment.clear(),
                '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' | '*' => {
                    out.push_str(&segment);
                    segment.clear();
                    out.push(ch);
                }
                _ => segment.push(ch),
            }
        }
        out.push_str(&segment);
        out
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.id == other.id {
            return Ordering::Equal;
        }
        self.name.cmp(other.name).then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
