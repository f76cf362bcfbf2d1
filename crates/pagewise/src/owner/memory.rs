use std::collections::HashMap;
use std::sync::Mutex;

use super::{OwnerData, OwnerStore};
use crate::error::OwnerStoreError;
use crate::jobs::OwnerId;

/// Owner store that lives for the process only.
#[derive(Default)]
pub struct InMemoryOwnerStore {
    owners: Mutex<HashMap<OwnerId, OwnerData>>,
}

impl InMemoryOwnerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OwnerStore for InMemoryOwnerStore {
    fn apply_update(
        &self,
        owner: &OwnerId,
        f: &mut dyn FnMut(&mut OwnerData),
    ) -> Result<OwnerData, OwnerStoreError> {
        let mut owners = self
            .owners
            .lock()
            .map_err(|_| OwnerStoreError::LockPoisoned)?;
        let data = owners.entry(owner.clone()).or_default();
        f(data);
        Ok(data.clone())
    }

    fn load(&self, owner: &OwnerId) -> Result<OwnerData, OwnerStoreError> {
        let owners = self
            .owners
            .lock()
            .map_err(|_| OwnerStoreError::LockPoisoned)?;
        Ok(owners.get(owner).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Job;
    use crate::model::AnalysisKind;

    #[test]
    fn test_owners_are_isolated() {
        let store = InMemoryOwnerStore::new();
        let alice = OwnerId::from("alice");
        let bob = OwnerId::from("bob");

        let job = Job::new(alice.clone(), AnalysisKind::ManuscriptAnalysis, "a.txt", "m");
        store
            .apply_update(&alice, &mut |data| data.upsert_job(job.clone()))
            .unwrap();

        assert_eq!(store.load(&alice).unwrap().jobs.len(), 1);
        assert!(store.load(&bob).unwrap().jobs.is_empty());
    }

    #[test]
    fn test_load_of_unknown_owner_does_not_create_it() {
        let store = InMemoryOwnerStore::new();
        let ghost = OwnerId::from("ghost");

        assert_eq!(store.load(&ghost).unwrap(), OwnerData::default());
        assert!(store.owners.lock().unwrap().is_empty());
    }
}
