// ============================================
// Visibility Module - Видимость чанков и объектов
// ============================================

pub mod camera;
pub mod chunks;
pub mod frustum;

pub use camera::{CameraView, MotionTracker};
pub use chunks::ChunkVisibility;
pub use frustum::Frustum;
