//! Interned identifiers for entities, links and regions.
//!
//! Every entity and link carries a stable uid that doubles as its node name in
//! the layout request text (`ent0003`, `lnk0002`). Because the same names are
//! compared again while the engine response is parsed, they are interned once
//! and compared by symbol.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for identifier storage.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock")
}

/// Interned identifier.
///
/// # Examples
///
/// ```
/// use strata_core::identifier::Id;
///
/// let entity = Id::entity(3);
/// let link = Id::link(2);
/// assert_eq!(entity, "ent0003");
/// assert_eq!(link, "lnk0002");
/// assert_eq!(Id::new("ent0003"), entity);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from &str.
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Creates the uid of the entity stored at arena slot `idx`.
    pub fn entity(idx: usize) -> Self {
        Self::new(&format!("ent{idx:04}"))
    }

    /// Creates the uid of the link stored at arena slot `idx`.
    pub fn link(idx: usize) -> Self {
        Self::new(&format!("lnk{idx:04}"))
    }

    /// Creates a derived identifier by appending `suffix` to this one.
    ///
    /// Used for auxiliary request nodes such as the invisible anchor point of
    /// a region.
    ///
    /// ```
    /// use strata_core::identifier::Id;
    ///
    /// let anchor = Id::entity(7).with_suffix("a");
    /// assert_eq!(anchor, "ent0007a");
    /// ```
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let mut interner = interner();
        let base = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner")
            .to_string();
        Self(interner.get_or_intern(format!("{base}{suffix}")))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = interner();
        let str_value = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        write!(f, "{str_value}")
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        let interner = interner();
        let self_str = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        self_str == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_new() {
        let id1 = Id::new("Rectangle");
        let id2 = Id::new("Rectangle");
        let id3 = Id::new("Oval");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(id1, "Rectangle");
    }

    #[test]
    fn test_entity_and_link_are_distinct() {
        assert_ne!(Id::entity(1), Id::link(1));
        assert_eq!(Id::entity(1), Id::entity(1));
        assert_eq!(Id::entity(12345), "ent12345");
    }

    #[test]
    fn test_with_suffix() {
        let base = Id::entity(4);
        assert_eq!(base.with_suffix("a"), "ent0004a");
        assert_eq!(base, "ent0004");
    }

    #[test]
    fn test_display_trait() {
        let id = Id::link(9);
        assert_eq!(format!("{id}"), "lnk0009");
    }

    #[test]
    fn test_hash_and_eq() {
        let mut map = HashMap::new();
        map.insert(Id::entity(0), "value1");
        map.insert(Id::entity(1), "value2");

        assert_eq!(map.get(&Id::new("ent0000")), Some(&"value1"));
        assert_eq!(map.len(), 2);
    }
}
