//! Lifecycle extensions
//!
//! An extension is registered once per concrete type and is told when it
//! joins a container, when the container is initialised, and when it leaves
//! (either unregistered explicitly or at disposal).

use crate::container::Container;
use crate::key::TypeKey;
use crate::Result;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// A participant in the container lifecycle.
///
/// Every hook defaults to doing nothing. A failing hook aborts the operation
/// that called it; extensions processed before it keep their new state.
///
/// # Examples
///
/// ```rust
/// use simple_container::{Container, Extension, Result};
/// use std::sync::Arc;
///
/// struct Banner;
///
/// impl Extension for Banner {
///     fn on_init(&self, container: &Container) -> Result<()> {
///         container.bind_singleton::<String>().to_instance(String::from("ready")).done()?;
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container.register_extension(Arc::new(Banner)).unwrap();
/// container.init().unwrap();
/// assert_eq!(container.resolve::<String>().unwrap().as_str(), "ready");
/// ```
pub trait Extension: Send + Sync + 'static {
    /// Called right after the extension joins the container
    fn on_register(&self, container: &Container) -> Result<()> {
        let _ = container;
        Ok(())
    }

    /// Called once when the container is initialised, or right after
    /// `on_register` if it already was
    fn on_init(&self, container: &Container) -> Result<()> {
        let _ = container;
        Ok(())
    }

    /// Called when the extension leaves the container
    fn on_unregister(&self, container: &Container) -> Result<()> {
        let _ = container;
        Ok(())
    }
}

/// Lifecycle state of a registered extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionState {
    Registered,
    Initialized,
    Unregistered,
}

struct Slot {
    key: TypeKey,
    hooks: Arc<dyn Extension>,
    instance: Arc<dyn Any + Send + Sync>,
    state: ExtensionState,
}

/// Ordered extension list; hooks are always called by the container with
/// the lock released
pub(crate) struct ExtensionList {
    slots: Mutex<Vec<Slot>>,
}

impl ExtensionList {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Append `extension` unless its type is already present
    pub(crate) fn insert<E: Extension>(&self, extension: Arc<E>) -> Option<Arc<dyn Extension>> {
        let key = TypeKey::of::<E>();
        let mut slots = self.slots.lock();
        if slots.iter().any(|slot| slot.key == key) {
            return None;
        }

        let hooks: Arc<dyn Extension> = Arc::clone(&extension) as Arc<dyn Extension>;
        slots.push(Slot {
            key,
            hooks: Arc::clone(&hooks),
            instance: extension as Arc<dyn Any + Send + Sync>,
            state: ExtensionState::Registered,
        });
        Some(hooks)
    }

    /// Hooks and current state of the slot of `key`
    pub(crate) fn entry(&self, key: TypeKey) -> Option<(Arc<dyn Extension>, ExtensionState)> {
        self.slots
            .lock()
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| (Arc::clone(&slot.hooks), slot.state))
    }

    /// Detach the slot of `key`
    pub(crate) fn remove(&self, key: TypeKey) -> Option<Arc<dyn Extension>> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(|slot| slot.key == key)?;
        Some(slots.remove(index).hooks)
    }

    /// Key of the slot holding the allocation at `addr`
    pub(crate) fn key_of(&self, addr: usize) -> Option<TypeKey> {
        self.slots
            .lock()
            .iter()
            .find(|slot| Arc::as_ptr(&slot.instance) as *const () as usize == addr)
            .map(|slot| slot.key)
    }

    pub(crate) fn get<E: Extension>(&self) -> Option<Arc<E>> {
        let key = TypeKey::of::<E>();
        let instance = self
            .slots
            .lock()
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| Arc::clone(&slot.instance))?;
        instance.downcast::<E>().ok()
    }

    pub(crate) fn state(&self, key: TypeKey) -> Option<ExtensionState> {
        self.slots
            .lock()
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| slot.state)
    }

    pub(crate) fn set_state(&self, key: TypeKey, state: ExtensionState) {
        if let Some(slot) = self.slots.lock().iter_mut().find(|slot| slot.key == key) {
            slot.state = state;
        }
    }

    /// Extensions currently in `state`, in registration order
    pub(crate) fn in_state(&self, state: ExtensionState) -> Vec<(TypeKey, Arc<dyn Extension>)> {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.state == state)
            .map(|slot| (slot.key, Arc::clone(&slot.hooks)))
            .collect()
    }

    /// Extensions not yet torn down, in registration order
    pub(crate) fn active(&self) -> Vec<(TypeKey, Arc<dyn Extension>)> {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.state != ExtensionState::Unregistered)
            .map(|slot| (slot.key, Arc::clone(&slot.hooks)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct First;
    impl Extension for First {}

    struct Second;
    impl Extension for Second {}

    #[test]
    fn test_insert_once_per_type() {
        let list = ExtensionList::new();
        assert!(list.insert(Arc::new(First)).is_some());
        assert!(list.insert(Arc::new(First)).is_none());
        assert!(list.insert(Arc::new(Second)).is_some());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_state_transitions_and_order() {
        let list = ExtensionList::new();
        list.insert(Arc::new(First));
        list.insert(Arc::new(Second));

        let first = TypeKey::of::<First>();
        assert_eq!(list.state(first), Some(ExtensionState::Registered));
        list.set_state(first, ExtensionState::Initialized);

        let pending: Vec<TypeKey> = list
            .in_state(ExtensionState::Registered)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(pending, vec![TypeKey::of::<Second>()]);

        list.set_state(first, ExtensionState::Unregistered);
        assert_eq!(list.active().len(), 1);
    }

    #[test]
    fn test_lookup_by_type_and_address() {
        let list = ExtensionList::new();
        let first = Arc::new(First);
        list.insert(Arc::clone(&first));

        let found = list.get::<First>().unwrap();
        assert!(Arc::ptr_eq(&found, &first));
        assert!(list.get::<Second>().is_none());

        let addr = Arc::as_ptr(&first) as *const () as usize;
        assert_eq!(list.key_of(addr), Some(TypeKey::of::<First>()));
        let (_, state) = list.entry(TypeKey::of::<First>()).unwrap();
        assert_eq!(state, ExtensionState::Registered);
        assert!(list.remove(TypeKey::of::<First>()).is_some());
        assert!(list.get::<First>().is_none());
    }
}
