// ============================================
// Instances Module - Размещаемые объекты окружения
// ============================================

pub mod group;
pub mod recent;
pub mod registry;
pub mod transform;

pub use group::{InstanceData, InstanceError, InstanceGroup, InstanceId};
pub use recent::RecentPlacements;
pub use registry::InstanceRegistry;
pub use transform::InstanceTransform;
