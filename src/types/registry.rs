use std::collections::HashMap;

use super::expr::Expr;
use super::unit::CompiledUnit;

/// Maps predefined type names to their compiled units.
///
/// Written by `$.type` and `$.dict` during compilation. Entries are never
/// replaced or removed.
#[derive(Debug, Clone)]
pub struct TypeRegistry<E = Expr> {
    units: HashMap<String, CompiledUnit<E>>,
}

impl<E> Default for TypeRegistry<E> {
    fn default() -> Self {
        Self {
            units: HashMap::new(),
        }
    }
}

impl<E> TypeRegistry<E> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a unit. Returns the unit back if the name is already taken.
    pub(crate) fn insert(
        &mut self,
        name: &str,
        unit: CompiledUnit<E>,
    ) -> Result<(), CompiledUnit<E>> {
        if self.units.contains_key(name) {
            return Err(unit);
        }
        self.units.insert(name.to_owned(), unit);
        Ok(())
    }

    /// Look up a unit by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CompiledUnit<E>> {
        self.units.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// The number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterate over all (name, unit) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CompiledUnit<E>)> {
        self.units.iter().map(|(k, v)| (k.as_str(), v))
    }
}
