//! Shared string pool for attribute and property strings
//!
//! Each unique string is stored once. Interning hands out a [`StringRef`]
//! that stays valid for as long as anything holds it, and two references
//! for the same content compare equal by identity.
//!
//! The pool interns through `&self` so one pool can back every dictionary
//! of a document at the same time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Interned string ID (1-indexed, 0 = invalid/none)
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct StringId(pub u32);

impl StringId {
    pub const NONE: StringId = StringId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reference to a pooled string.
///
/// Equality is identity: two refs are equal only when they point at the
/// same pooled allocation.
#[derive(Clone)]
pub struct StringRef {
    id: StringId,
    text: Rc<str>,
}

impl StringRef {
    pub fn id(&self) -> StringId {
        self.id
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for StringRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.text, &other.text)
    }
}

impl Eq for StringRef {}

impl Deref for StringRef {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl AsRef<str> for StringRef {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl PartialEq<str> for StringRef {
    fn eq(&self, other: &str) -> bool {
        &*self.text == other
    }
}

impl PartialEq<&str> for StringRef {
    fn eq(&self, other: &&str) -> bool {
        &*self.text == *other
    }
}

impl fmt::Debug for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.text, f)
    }
}

impl fmt::Display for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

struct PoolInner {
    /// Interned string storage (1-indexed, index 0 unused)
    strings: Vec<Rc<str>>,
    /// Fast string-to-ID mapping
    lookup: HashMap<Rc<str>, StringId>,
}

/// String pool shared by the dictionaries of one document
pub struct StringPool {
    inner: RefCell<PoolInner>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    /// Create a new empty string pool
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(PoolInner {
                strings: vec![Rc::from("")], // Index 0 is reserved (NONE)
                lookup: HashMap::new(),
            }),
        }
    }

    /// Intern a string and return a reference to the pooled copy
    ///
    /// If the string already exists in the pool, returns the existing entry
    /// without allocating new storage. Table growth failure leaves the pool
    /// unchanged.
    pub fn intern(&self, s: &str) -> Result<StringRef> {
        let mut inner = self.inner.borrow_mut();

        if let Some(&id) = inner.lookup.get(s) {
            return Ok(StringRef {
                id,
                text: Rc::clone(&inner.strings[id.index()]),
            });
        }

        let count = inner.strings.len();
        let id = u32::try_from(count)
            .map(StringId)
            .map_err(|_| Error::PoolExhausted { count })?;

        inner.strings.try_reserve(1).map_err(Error::PoolAlloc)?;
        inner.lookup.try_reserve(1).map_err(Error::PoolAlloc)?;

        let text: Rc<str> = Rc::from(s);
        inner.strings.push(Rc::clone(&text));
        inner.lookup.insert(Rc::clone(&text), id);
        log::trace!("interned {:?} as {}", s, id.0);

        Ok(StringRef { id, text })
    }

    /// Get the string associated with the given ID
    ///
    /// Returns None if ID is out of range or is StringId::NONE
    pub fn get(&self, id: StringId) -> Option<StringRef> {
        if !id.is_valid() {
            return None;
        }
        let inner = self.inner.borrow();
        inner.strings.get(id.index()).map(|text| StringRef {
            id,
            text: Rc::clone(text),
        })
    }

    /// Look up the ID for a string without interning it
    pub fn get_id(&self, s: &str) -> Option<StringId> {
        self.inner.borrow().lookup.get(s).copied()
    }

    /// Get the number of interned strings (excluding NONE)
    pub fn len(&self) -> usize {
        self.inner.borrow().strings.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for StringPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringPool").field("len", &self.len()).finish()
    }
}
