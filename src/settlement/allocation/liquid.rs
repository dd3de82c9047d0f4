//! Liquid volume claims

use serde::{Deserialize, Serialize};

use crate::settlement::dictionaries::MaterialId;
use crate::settlement::types::{AllocationId, EntityId};

/// A claim on a volume of one liquid material inside one container
///
/// Same over-claim rule as stack claims, scoped per (container, material):
/// the sum of live claimed volumes never exceeds the container's volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidAllocation {
    pub id: AllocationId,
    pub container: EntityId,
    pub material: MaterialId,
    pub volume: f32,
    /// Entity on whose behalf the claim was made
    pub owner: EntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liquid_allocation_record() {
        let allocation = LiquidAllocation {
            id: AllocationId(0),
            container: EntityId(5),
            material: MaterialId(2),
            volume: 1.5,
            owner: EntityId(8),
        };
        assert_eq!(allocation.container, EntityId(5));
        assert!(allocation.volume > 0.0);
    }
}
