// ============================================
// Batch - Батчи правок ячеек
// ============================================
// Инструменты редактирования шлют пары (added, removed).
// Ключ, попавший в обе стороны батча, трактуется как add-only:
// добавление побеждает, удаление подавляется.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::cell::{CellPos, ChunkKey, OccupantId};

/// Опции применения батча
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Обходит весь admission control, применяется синхронно и без фильтрации
    pub force: bool,
    /// Подавить progress-колбэки
    pub silent: bool,
    /// Молча пропустить вызов, если индекс занят (фоновые обновления)
    pub skip_if_busy: bool,
    /// UI-подсказка "показать экран загрузки", на семантику не влияет
    pub show_loading: bool,
}

impl UpdateOptions {
    /// Гарантированная запись: подтверждение размещения, undo/redo, очистка
    pub fn forced() -> Self {
        Self { force: true, ..Self::default() }
    }
}

/// Батч правок: добавленные и удалённые ячейки
#[derive(Debug, Clone, Default)]
pub struct UpdateBatch {
    pub added: Vec<(CellPos, OccupantId)>,
    pub removed: Vec<(CellPos, OccupantId)>,
}

/// Сырой батч с строковыми ключами "x,y,z" (внешний импорт)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBatch {
    pub added: Vec<(String, OccupantId)>,
    pub removed: Vec<(String, OccupantId)>,
}

impl UpdateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Батч из одной добавляемой ячейки
    pub fn single_add(pos: CellPos, occupant: OccupantId) -> Self {
        Self { added: vec![(pos, occupant)], removed: Vec::new() }
    }

    /// Батч из одной удаляемой ячейки
    pub fn single_remove(pos: CellPos, occupant: OccupantId) -> Self {
        Self { added: Vec::new(), removed: vec![(pos, occupant)] }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Суммарный размер батча (added + removed)
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Слить другой батч в этот (коалесценция мелких правок)
    pub fn merge(&mut self, other: UpdateBatch) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
    }

    /// Подавить удаления ключей, присутствующих в added.
    /// После вызова ни одно наблюдаемое "removed" событие для таких ключей не возникнет.
    pub fn suppress_replaced_removals(&mut self) {
        if self.added.is_empty() || self.removed.is_empty() {
            return;
        }
        let added_keys: HashSet<CellPos> = self.added.iter().map(|(pos, _)| *pos).collect();
        self.removed.retain(|(pos, _)| !added_keys.contains(pos));
    }

    /// Оставить только записи, чьи чанки входят в набор видимых
    pub fn retain_chunks(&mut self, visible: &HashSet<ChunkKey>, chunk_size: i32) {
        self.added.retain(|(pos, _)| visible.contains(&pos.chunk_key(chunk_size)));
        self.removed.retain(|(pos, _)| visible.contains(&pos.chunk_key(chunk_size)));
    }

    /// Разбор сырого батча. Кривые ключи пропускаются по одному,
    /// остальной батч не отравляют.
    pub fn from_raw(raw: &RawBatch) -> Self {
        let mut batch = Self::new();
        for (key, occupant) in &raw.added {
            match CellPos::parse(key) {
                Some(pos) => batch.added.push((pos, *occupant)),
                None => log::warn!("Пропуск кривого ключа в added: {:?}", key),
            }
        }
        for (key, occupant) in &raw.removed {
            match CellPos::parse(key) {
                Some(pos) => batch.removed.push((pos, *occupant)),
                None => log::warn!("Пропуск кривого ключа в removed: {:?}", key),
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppress_replaced_removals() {
        let pos = CellPos::new(1, 2, 3);
        let other = CellPos::new(4, 5, 6);
        let mut batch = UpdateBatch {
            added: vec![(pos, 7)],
            removed: vec![(pos, 3), (other, 2)],
        };
        batch.suppress_replaced_removals();
        assert_eq!(batch.added, vec![(pos, 7)]);
        assert_eq!(batch.removed, vec![(other, 2)]);
    }

    #[test]
    fn test_from_raw_skips_malformed() {
        let raw = RawBatch {
            added: vec![
                ("1,0,1".to_string(), 7),
                ("не координата".to_string(), 9),
                ("2,0,2".to_string(), 8),
            ],
            removed: vec![("3,0".to_string(), 1)],
        };
        let batch = UpdateBatch::from_raw(&raw);
        assert_eq!(batch.added.len(), 2);
        assert_eq!(batch.added[0], (CellPos::new(1, 0, 1), 7));
        assert_eq!(batch.added[1], (CellPos::new(2, 0, 2), 8));
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_retain_chunks() {
        let mut visible = HashSet::new();
        visible.insert(ChunkKey::new(0, 0, 0));
        let mut batch = UpdateBatch {
            added: vec![
                (CellPos::new(1, 1, 1), 5),   // чанк (0,0,0)
                (CellPos::new(85, 85, 85), 5), // чанк (5,5,5)
            ],
            removed: vec![(CellPos::new(-1, 0, 0), 5)], // чанк (-1,0,0)
        };
        batch.retain_chunks(&visible, 16);
        assert_eq!(batch.added, vec![(CellPos::new(1, 1, 1), 5)]);
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_merge_and_len() {
        let mut a = UpdateBatch::single_add(CellPos::new(0, 0, 0), 1);
        let b = UpdateBatch::single_remove(CellPos::new(1, 0, 0), 2);
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert!(!a.is_empty());
    }
}
