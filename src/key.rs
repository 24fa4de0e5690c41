//! Keys used to look up bindings
//!
//! Rust has no runtime reflection, so the container identifies types through
//! an explicit registry key: the `TypeId` assigned by the compiler, paired
//! with the type name for diagnostics.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a requested or concrete type.
///
/// Equality and hashing only look at the `TypeId`; the name is carried for
/// error messages and logs. Unsized contracts such as `dyn Logger` have keys
/// too.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of type `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Discriminator for named bindings and multiton instances.
///
/// # Examples
///
/// ```rust
/// use simple_container::Identifier;
///
/// let a = Identifier::from("primary");
/// let b = Identifier::from(String::from("primary"));
/// assert_eq!(a, b);
/// assert_eq!(Identifier::from(7u32).as_str(), "7");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Cow<'static, str>);

impl Identifier {
    /// Identifier backed by a static string (no allocation)
    #[inline]
    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    /// String view
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Identifier {
    #[inline]
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Identifier {
    #[inline]
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&Identifier> for Identifier {
    #[inline]
    fn from(value: &Identifier) -> Self {
        value.clone()
    }
}

macro_rules! identifier_from_int {
    ($($int:ty),+) => {
        $(
            impl From<$int> for Identifier {
                #[inline]
                fn from(value: $int) -> Self {
                    Self(Cow::Owned(value.to_string()))
                }
            }
        )+
    };
}

identifier_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form label used for bulk unbinding
pub type Tag = Cow<'static, str>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Shape: Send + Sync {}

    #[test]
    fn test_type_key_equality_ignores_name() {
        assert_eq!(TypeKey::of::<u32>(), TypeKey::of::<u32>());
        assert_ne!(TypeKey::of::<u32>(), TypeKey::of::<u64>());
        assert_ne!(TypeKey::of::<dyn Shape>(), TypeKey::of::<u32>());
        assert!(TypeKey::of::<dyn Shape>().name().contains("Shape"));
    }

    #[test]
    fn test_identifier_hash_matches_across_sources() {
        let mut set = HashSet::new();
        set.insert(Identifier::from("42"));
        assert!(set.contains(&Identifier::from(42i32)));
        assert!(set.contains(&Identifier::from(String::from("42"))));
    }
}
