// ============================================
// Core Module - Конфиг и контекст редактора
// ============================================

pub mod config;
pub mod context;

pub use config::EditorConfig;
pub use context::EditorContext;
