//! Resource claim primitives
//!
//! Claims ("allocations") on shared divisible resources prevent two
//! producers from double-spending the same unit between reconciliation
//! passes.

pub mod hauling;
pub mod item;
pub mod liquid;

pub use hauling::{HaulingAllocation, HauledEntityKind, PositionKind};
pub use item::{AllocationPurpose, ItemAllocation};
pub use liquid::LiquidAllocation;
