use protocol::FontSpec;
use std::collections::HashMap;

/// Custom fonts announced by font snapshots, keyed by font id.
#[derive(Debug, Default)]
pub struct FontRegistry {
    fonts: HashMap<i32, FontSpec>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a font. A later registration with the same id replaces the
    /// earlier one; returns true when the font was not known before.
    pub fn register(&mut self, spec: FontSpec) -> bool {
        let is_new = !self.fonts.contains_key(&spec.id);
        if !is_new {
            log::debug!("Replacing custom font {}", spec.id);
        }
        self.fonts.insert(spec.id, spec);
        is_new
    }

    pub fn get(&self, id: i32) -> Option<&FontSpec> {
        self.fonts.get(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&FontSpec> {
        self.fonts.values().find(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
