//! Plugin factory registration.

use heapless::Vec;

use crate::config::MAX_REGISTERED_PLUGINS;
use crate::error::{Error, Table};
use crate::util::{Name, to_name};

/// A registered plugin: its name and the factory that builds and launches it.
pub struct RegistryEntry<F> {
    name: Name,
    factory: F,
}

impl<F> RegistryEntry<F> {
    /// Get the plugin name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }
}

/// A registry of plugin factories, enumerated by the [`Runtime`](super::Runtime)
/// at startup.
///
/// This registry owns the plugin names (copies them on add). `F` is whatever
/// the host uses to build a plugin, typically a function pointer receiving
/// the bus and the shared stop flag.
///
/// # Example
///
/// ```ignore
/// let mut registry = PluginRegistry::<fn(&'static Bus, &'static StopFlag)>::new();
/// registry.add("plugin1", start_plugin1);
/// registry.add("plugin2", start_plugin2);
///
/// for entry in registry.iter() {
///     (entry.factory())(&BUS, &STOP);
/// }
/// ```
pub struct PluginRegistry<F, const MAX_PLUGINS: usize = MAX_REGISTERED_PLUGINS> {
    entries: Vec<RegistryEntry<F>, MAX_PLUGINS>,
}

impl<F, const MAX_PLUGINS: usize> PluginRegistry<F, MAX_PLUGINS> {
    /// Create a new empty plugin registry.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a factory to the registry, copying the name.
    ///
    /// Returns `true` if successful, `false` if the registry is full, the
    /// name is too long, or the name is already registered.
    pub fn add(&mut self, name: &str, factory: F) -> bool {
        match self.try_add(name, factory) {
            Ok(()) => true,
            Err(err) => {
                warn!("plugin '{}' not registered: {}", name, err);
                false
            }
        }
    }

    /// Add a factory to the registry, reporting why a refused one was refused.
    pub fn try_add(&mut self, name: &str, factory: F) -> Result<(), Error> {
        if self.get(name).is_some() {
            return Err(Error::AlreadyRegistered);
        }
        if self.entries.is_full() {
            return Err(Error::CapacityExceeded(Table::Registry));
        }
        let entry = RegistryEntry {
            name: to_name(name)?,
            factory,
        };
        self.entries
            .push(entry)
            .map_err(|_| Error::CapacityExceeded(Table::Registry))?;
        debug!("plugin '{}' registered ({} total)", name, self.entries.len());
        Ok(())
    }

    /// Find the entry registered under `name`.
    pub fn get(&self, name: &str) -> Option<&RegistryEntry<F>> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    /// Get an iterator over the entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry<F>> {
        self.entries.iter()
    }

    /// Get the number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<F, const MAX_PLUGINS: usize> Default for PluginRegistry<F, MAX_PLUGINS> {
    fn default() -> Self {
        Self::new()
    }
}
