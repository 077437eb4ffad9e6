//! Open-addressing hash table used for a single scope frame.

use crate::syntax::ast::Name;
use crate::value::Value;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const INITIAL_CAPACITY: usize = 8;

/// FNV-1a over the key bytes.
#[inline]
pub fn fnv1a(key: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in key.as_bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// One binding in a frame.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: Name,
    pub value: Value,
    pub is_const: bool,
}

/// Maps identifier names to bindings.
///
/// The capacity is always a power of two so the hash can be masked instead of
/// divided. Collisions probe linearly; the table grows (doubling, full
/// rehash) before the load factor would pass 0.8, so a probe always reaches
/// an empty slot. Bindings are never removed: a frame is dropped as a whole.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    slots: Vec<Option<Binding>>,
    len: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.find(name).and_then(|idx| self.slots[idx].as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        let idx = self.find(name)?;
        self.slots[idx].as_mut()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Inserts a new binding. Returns the binding back if `name` is taken.
    pub fn insert(&mut self, binding: Binding) -> Result<(), Binding> {
        if self.contains(&binding.name) {
            return Err(binding);
        }
        if (self.len + 1) * 5 > self.capacity() * 4 {
            self.grow();
        }
        let idx = self.probe_empty(&binding.name);
        self.slots[idx] = Some(binding);
        self.len += 1;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.slots.iter().flatten()
    }

    fn find(&self, name: &str) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let mask = self.capacity() - 1;
        let mut idx = fnv1a(name) as usize & mask;
        loop {
            match &self.slots[idx] {
                Some(binding) if &*binding.name == name => return Some(idx),
                Some(_) => idx = (idx + 1) & mask,
                None => return None,
            }
        }
    }

    fn probe_empty(&self, name: &str) -> usize {
        let mask = self.capacity() - 1;
        let mut idx = fnv1a(name) as usize & mask;
        while self.slots[idx].is_some() {
            idx = (idx + 1) & mask;
        }
        idx
    }

    fn grow(&mut self) {
        let capacity = (self.capacity() * 2).max(INITIAL_CAPACITY);
        let old = std::mem::replace(&mut self.slots, (0..capacity).map(|_| None).collect());
        for binding in old.into_iter().flatten() {
            let idx = self.probe_empty(&binding.name);
            self.slots[idx] = Some(binding);
        }
    }
}
