// ============================================
// Editor Config - Настройки ядра
// ============================================
// Все пороги admission control и размеры мира в одном месте.
// Загружается из JSON, недостающие поля берут значения по умолчанию.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Настройки пространственного ядра
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Ребро чанка в ячейках
    pub chunk_size: i32,
    /// Нижняя граница мира по Y (включительно)
    pub world_floor: i32,
    /// Верхняя граница мира по Y (исключительно)
    pub world_ceiling: i32,
    /// Дистанция обзора для фильтрации чанков
    pub view_distance: f32,

    /// Окно rate-лимита между нефорсированными применениями
    pub rate_window_ms: u64,
    /// Мелкий батч (<=): коалесцируется отложенным повтором вместо дропа
    pub small_batch: usize,
    /// Крупный нефорсированный батч (>): дроп как фоновая подсказка
    pub large_batch: usize,
    /// Очень крупный батч (>): применяется без frustum-фильтрации
    pub huge_batch: usize,

    /// TTL исключения "только что размещён" для recompute видимости
    pub recent_ttl_ms: u64,
    /// Сколько ячеек грузить за один кооперативный tick при bulk-загрузке
    pub load_slice: usize,

    /// Потолок инстансов на группу по умолчанию (фиксируется при создании группы)
    pub group_capacity: u32,
    /// Радиус ограничивающей сферы инстанса при единичном масштабе
    pub instance_radius: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            world_floor: -64,
            world_ceiling: 320,
            view_distance: 128.0,
            rate_window_ms: 1000,
            small_batch: 10,
            large_batch: 100,
            huge_batch: 1000,
            recent_ttl_ms: 1000,
            load_slice: 512,
            group_capacity: 4096,
            instance_radius: 1.0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    #[inline]
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    #[inline]
    pub fn recent_ttl(&self) -> Duration {
        Duration::from_millis(self.recent_ttl_ms)
    }
}
