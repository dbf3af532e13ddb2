use std::collections::HashMap;

use uuid::Uuid;

/// Resolves the provider's owner reference to an account id. Account
/// management lives outside this service; the default implementation is a
/// configuration-supplied map.
pub trait OwnerDirectory: Send + Sync {
    fn resolve(&self, external_ref: &str) -> Option<Uuid>;
}

pub struct FixedOwnerDirectory {
    refs: HashMap<String, Uuid>,
}

impl FixedOwnerDirectory {
    pub fn new(refs: HashMap<String, Uuid>) -> Self {
        Self { refs }
    }
}

impl OwnerDirectory for FixedOwnerDirectory {
    fn resolve(&self, external_ref: &str) -> Option<Uuid> {
        self.refs.get(external_ref).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_directory_lookup() {
        let id = Uuid::new_v4();
        let directory = FixedOwnerDirectory::new(HashMap::from([("acme".to_string(), id)]));
        assert_eq!(directory.resolve("acme"), Some(id));
        assert_eq!(directory.resolve("unknown"), None);
    }
}
