use std::collections::HashMap;

pub const UNNAMED_GROUP: &str = "[Unnamed Group]";

/// Thread id to display name. Entries are only ever added: the first name
/// stored for a thread wins for the rest of the run.
#[derive(Debug, Default)]
pub struct NameCache {
    names: HashMap<String, String>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: &str) -> Option<&str> {
        self.names.get(thread_id).map(String::as_str)
    }

    /// Name for display, falling back to the placeholder for unknown threads.
    pub fn display_name(&self, thread_id: &str) -> &str {
        self.get(thread_id).unwrap_or(UNNAMED_GROUP)
    }

    /// Stores `name` (or the placeholder when the backend had none) unless the
    /// thread already has an entry, and returns the name now on record.
    pub fn remember(&mut self, thread_id: &str, name: Option<String>) -> &str {
        self.names
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                name.filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNNAMED_GROUP.to_string())
            })
            .as_str()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}
