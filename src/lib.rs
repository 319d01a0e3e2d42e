// ============================================
// VoxEdit - Пространственное ядро воксельного редактора
// ============================================
// Chunk-партиционированный индекс разреженного воксельного поля,
// admission control для батчей правок, frustum-видимость чанков
// и instanced-слой размещаемых объектов.
//
// Ядро однопоточное и кооперативное: все мутации выполняются
// синхронно, отложенная работа разгребается явным tick() из
// внешнего кадрового цикла.

pub mod core;
pub mod spatial;
pub mod visibility;
pub mod instances;
pub mod pool;

// Реэкспорт основных типов
pub use crate::core::config::EditorConfig;
pub use crate::core::context::EditorContext;
pub use crate::spatial::cell::{CellPos, ChunkKey, OccupantId, EMPTY, ENV_MARKER};
pub use crate::spatial::batch::{UpdateBatch, UpdateOptions};
pub use crate::spatial::index::{SolidQuery, SpatialIndex};
pub use crate::spatial::scheduler::{UpdateOutcome, UpdateScheduler};
pub use crate::visibility::camera::{CameraView, MotionTracker};
pub use crate::instances::registry::InstanceRegistry;
