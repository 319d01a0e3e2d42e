// ============================================
// Spatial Module - Индекс, батчи, admission control
// ============================================

pub mod batch;
pub mod cell;
pub mod index;
pub mod loader;
pub mod scheduler;

pub use batch::{RawBatch, UpdateBatch, UpdateOptions};
pub use cell::{CellPos, ChunkKey, OccupantId, EMPTY, ENV_MARKER};
pub use index::{SolidQuery, SpatialIndex, TerrainSnapshot, UpdateResult};
pub use loader::{LoadProgress, TerrainLoadQueue};
pub use scheduler::{DropReason, UpdateOutcome, UpdateScheduler};
