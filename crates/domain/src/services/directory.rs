//! Collaborator interfaces into the surrounding platform.
//!
//! Gate scope and resident lookup live outside this subsystem; the traits
//! here are the narrow seams through which the visiting workflow consumes
//! them. Production implementations are database-backed (persistence
//! crate); tests use the in-memory variants below.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::VisitError;

/// Resolves a gate keeper's destination scope from their assigned
/// buildings.
#[async_trait::async_trait]
pub trait LocationScope: Send + Sync {
    /// All destination ids the gate keeper may act on.
    async fn assigned_destinations(&self, gate_keeper_id: Uuid)
        -> Result<HashSet<Uuid>, VisitError>;
}

/// Resolves the resident responsible for a destination, if any.
#[async_trait::async_trait]
pub trait ResidentDirectory: Send + Sync {
    async fn resident_for_destination(
        &self,
        destination_id: Uuid,
    ) -> Result<Option<Uuid>, VisitError>;
}

/// In-memory scope for tests: a fixed gate keeper to destination-set map.
#[derive(Debug, Default)]
pub struct StaticLocationScope {
    assignments: std::collections::HashMap<Uuid, HashSet<Uuid>>,
}

impl StaticLocationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(mut self, gate_keeper_id: Uuid, destinations: impl IntoIterator<Item = Uuid>) -> Self {
        self.assignments
            .entry(gate_keeper_id)
            .or_default()
            .extend(destinations);
        self
    }
}

#[async_trait::async_trait]
impl LocationScope for StaticLocationScope {
    async fn assigned_destinations(
        &self,
        gate_keeper_id: Uuid,
    ) -> Result<HashSet<Uuid>, VisitError> {
        Ok(self
            .assignments
            .get(&gate_keeper_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory resident directory for tests.
#[derive(Debug, Default)]
pub struct StaticResidentDirectory {
    residents: std::collections::HashMap<Uuid, Uuid>,
}

impl StaticResidentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resident(mut self, destination_id: Uuid, resident_id: Uuid) -> Self {
        self.residents.insert(destination_id, resident_id);
        self
    }
}

#[async_trait::async_trait]
impl ResidentDirectory for StaticResidentDirectory {
    async fn resident_for_destination(
        &self,
        destination_id: Uuid,
    ) -> Result<Option<Uuid>, VisitError> {
        Ok(self.residents.get(&destination_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_scope_assignments() {
        let keeper = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let scope = StaticLocationScope::new().assign(keeper, [a, b]);

        let destinations = scope.assigned_destinations(keeper).await.unwrap();
        assert!(destinations.contains(&a));
        assert!(destinations.contains(&b));

        let other = scope.assigned_destinations(Uuid::new_v4()).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_static_resident_directory() {
        let destination = Uuid::new_v4();
        let resident = Uuid::new_v4();
        let directory = StaticResidentDirectory::new().with_resident(destination, resident);

        assert_eq!(
            directory
                .resident_for_destination(destination)
                .await
                .unwrap(),
            Some(resident)
        );
        assert_eq!(
            directory
                .resident_for_destination(Uuid::new_v4())
                .await
                .unwrap(),
            None
        );
    }
}
