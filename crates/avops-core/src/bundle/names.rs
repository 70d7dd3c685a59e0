use std::collections::HashMap;

use avops_types::name::name_key;

/// Case-insensitive name index used to detect collisions during import.
///
/// Values are `None` for entities a dry run would have created: they take
/// part in collision and reference checks but have no id.
#[derive(Debug, Clone)]
pub struct NameIndex<Id> {
    entries: HashMap<String, Option<Id>>,
}

impl<Id: Copy> NameIndex<Id> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn from_existing<'a>(items: impl IntoIterator<Item = (&'a str, Id)>) -> Self {
        let mut index = Self::new();
        for (name, id) in items {
            index.insert(name, Some(id));
        }
        index
    }

    /// `Some(id)` when the name is taken; the inner id is `None` for dry-run
    /// placeholders.
    pub fn lookup(&self, name: &str) -> Option<Option<Id>> {
        self.entries.get(&name_key(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name_key(name))
    }

    pub fn insert(&mut self, name: &str, id: Option<Id>) {
        self.entries.insert(name_key(name), id);
    }

    /// First free name of the form `"{name} (2)"`, `"{name} (3)"`, ...
    pub fn rename_candidate(&self, name: &str) -> String {
        (2u32..)
            .map(|i| format!("{name} ({i})"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| format!("{name} (copy)"))
    }
}

impl<Id: Copy> Default for NameIndex<Id> {
    fn default() -> Self {
        Self::new()
    }
}
