use std::fmt;

/// A generation-checked slot reference.
///
/// Packs into a `u64` as `(generation << 32) | index`. Generations start at
/// 1, so the all-zero value is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    pub fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub fn from_bits(bits: u64) -> Self {
        RawHandle {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(RawHandle);

        impl $name {
            /// The opaque integer form handed across the C ABI.
            pub fn to_bits(self) -> u64 {
                self.0.to_bits()
            }

            /// Rebuild a handle from its integer form. The result is only
            /// meaningful if the runtime still holds the slot it names.
            pub fn from_bits(bits: u64) -> Self {
                $name(RawHandle::from_bits(bits))
            }

            pub(crate) fn raw(self) -> RawHandle {
                self.0
            }

            pub(crate) fn from_raw(raw: RawHandle) -> Self {
                $name(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}.{}", $label, self.0.index, self.0.generation)
            }
        }
    };
}

typed_handle!(
    /// Names a loaded graph.
    GraphHandle,
    "graph"
);
typed_handle!(
    /// Names an execution context.
    ContextHandle,
    "context"
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena issuing generation-checked handles.
///
/// Removing a value bumps the slot's generation before the slot is reused,
/// so a stale handle can never alias a newer value. A slot whose generation
/// would wrap is retired instead of reused.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        HandleTable {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store `value`, returning its handle, or `None` once every index is in
    /// use or retired.
    pub fn insert(&mut self, value: T) -> Option<RawHandle> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).ok()?;
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.len += 1;
        Some(RawHandle {
            index,
            generation: slot.generation,
        })
    }

    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn remove(&mut self, handle: RawHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        self.len -= 1;
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(handle.index);
        }
        Some(value)
    }

    /// Remove every live value. All outstanding handles become stale.
    pub fn drain(&mut self) -> Vec<T> {
        let live: Vec<RawHandle> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some())
            .map(|(i, slot)| RawHandle {
                index: i as u32,
                generation: slot.generation,
            })
            .collect();
        live.into_iter().filter_map(|h| self.remove(h)).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let mut table = HandleTable::new();
        let a = table.insert("a").unwrap();
        let b = table.insert("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_bits_never_zero() {
        let mut table = HandleTable::new();
        let h = table.insert(()).unwrap();
        assert_eq!(h.index(), 0);
        assert_ne!(h.to_bits(), 0);
        assert_eq!(RawHandle::from_bits(h.to_bits()), h);
    }

    #[test]
    fn test_stale_handle_does_not_alias() {
        let mut table = HandleTable::new();
        let old = table.insert(1).unwrap();
        assert_eq!(table.remove(old), Some(1));

        let new = table.insert(2).unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert_eq!(table.get(old), None);
        assert_eq!(table.remove(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn test_double_remove() {
        let mut table = HandleTable::new();
        let h = table.insert("x").unwrap();
        assert!(table.remove(h).is_some());
        assert!(table.remove(h).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_unissued_handles() {
        let table: HandleTable<u8> = HandleTable::new();
        assert!(table.get(RawHandle::from_bits(0)).is_none());
        assert!(table.get(RawHandle::from_bits(u64::MAX)).is_none());
    }

    #[test]
    fn test_retired_slot_not_reused() {
        let mut table = HandleTable::new();
        let h = table.insert(0).unwrap();
        table.slots[0].generation = u32::MAX;
        let last = RawHandle {
            index: h.index(),
            generation: u32::MAX,
        };
        assert_eq!(table.remove(last), Some(0));
        let next = table.insert(1).unwrap();
        assert_eq!(next.index(), 1);
    }

    #[test]
    fn test_drain() {
        let mut table = HandleTable::new();
        let a = table.insert(10).unwrap();
        let b = table.insert(20).unwrap();
        table.remove(a);
        let c = table.insert(30).unwrap();

        let mut drained = table.drain();
        drained.sort();
        assert_eq!(drained, vec![20, 30]);
        assert!(table.is_empty());
        assert!(table.get(b).is_none());
        assert!(table.get(c).is_none());
    }

    #[test]
    fn test_typed_handle_display() {
        let raw = RawHandle::from_bits((3u64 << 32) | 7);
        assert_eq!(GraphHandle::from_raw(raw).to_string(), "graph#7.3");
        assert_eq!(ContextHandle::from_bits(raw.to_bits()).raw(), raw);
    }
}
