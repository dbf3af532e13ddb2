use uuid::Uuid;

/// Authorization check delegated to the external auth subsystem. The
/// default posture is owner-only access.
pub trait AccessPolicy: Send + Sync {
    fn is_authorized_for(&self, requester: Uuid, owner_id: Uuid) -> bool;
}

pub struct OwnerOnlyPolicy;

impl AccessPolicy for OwnerOnlyPolicy {
    fn is_authorized_for(&self, requester: Uuid, owner_id: Uuid) -> bool {
        requester == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_only_policy() {
        let owner = Uuid::new_v4();
        let policy = OwnerOnlyPolicy;
        assert!(policy.is_authorized_for(owner, owner));
        assert!(!policy.is_authorized_for(Uuid::new_v4(), owner));
    }
}
