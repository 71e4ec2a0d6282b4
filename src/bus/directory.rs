//! Component directory.

use heapless::Vec;

use crate::error::{Error, Table};
use crate::util::{Name, to_name};

/// Handle assigned to a component when it registers.
///
/// Ids are dense and handed out in registration order, starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the component in the directory.
    pub fn index(self) -> usize {
        self.0
    }
}

struct Entry {
    name: Name,
    id: NodeId,
}

/// A bounded registry mapping a unique component name to its [`NodeId`].
///
/// The directory owns copies of the names, so a component may register with a
/// temporary string. Entries live as long as the directory.
pub struct Directory<const MAX_NODES: usize> {
    entries: Vec<Entry, MAX_NODES>,
}

impl<const MAX_NODES: usize> Directory<MAX_NODES> {
    /// Create an empty directory.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `name`, returning the id assigned to it.
    ///
    /// Refuses names that are already present, names that do not fit in a
    /// [`Name`], and any registration once the directory is full. A refused
    /// registration leaves the directory untouched.
    pub fn register(&mut self, name: &str) -> Result<NodeId, Error> {
        if self.lookup(name).is_some() {
            return Err(Error::AlreadyRegistered);
        }
        if self.entries.is_full() {
            return Err(Error::CapacityExceeded(Table::Directory));
        }
        let name = to_name(name)?;
        let id = NodeId(self.entries.len());
        self.entries
            .push(Entry { name, id })
            .map_err(|_| Error::CapacityExceeded(Table::Directory))?;
        Ok(id)
    }

    /// Find the id registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|entry| entry.name.as_str() == name)
            .map(|entry| entry.id)
    }

    /// Find the name registered under `id`.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.entries.get(id.index()).map(|entry| entry.name.as_str())
    }

    /// Iterate over registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Get the number of registered components.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no component is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const MAX_NODES: usize> Default for Directory<MAX_NODES> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::format;

    #[test]
    fn assigns_ids_in_registration_order() {
        let mut directory = Directory::<4>::new();
        let a = directory.register("plugin1").unwrap();
        let b = directory.register("plugin2").unwrap();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(directory.lookup("plugin2"), Some(b));
        assert_eq!(directory.name_of(a), Some("plugin1"));
    }

    #[test]
    fn lookup_miss_is_none() {
        let directory = Directory::<4>::new();
        assert_eq!(directory.lookup("ghost"), None);
        assert!(directory.is_empty());
    }

    #[test]
    fn refuses_duplicate_names() {
        let mut directory = Directory::<4>::new();
        directory.register("imu").unwrap();

        assert_eq!(directory.register("imu"), Err(Error::AlreadyRegistered));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn refuses_registration_past_capacity() {
        let mut directory = Directory::<2>::new();
        directory.register("a").unwrap();
        directory.register("b").unwrap();

        assert_eq!(
            directory.register("c"),
            Err(Error::CapacityExceeded(Table::Directory))
        );
        assert_eq!(directory.len(), 2);
        assert!(directory.names().eq(["a", "b"]));
    }

    #[test]
    fn ids_are_not_limited_to_a_byte() {
        let mut directory = Directory::<300>::new();
        for i in 0..300 {
            let id = directory.register(&format!("node{i}")).unwrap();
            assert_eq!(id.index(), i);
        }

        assert_eq!(
            directory.register("one-more"),
            Err(Error::CapacityExceeded(Table::Directory))
        );
        assert_eq!(directory.lookup("node299").map(NodeId::index), Some(299));
    }
}
