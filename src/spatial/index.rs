// ============================================
// Spatial Index - Плоский индекс занятости ячеек
// ============================================
// Авторитетное отображение координата -> occupant. Хранение плоское
// (HashMap), чанки выводятся из координат на лету: точечный запрос
// O(1) без материализации плотного объёма. Raycast и физика читают
// индекс только через has_occupant / SolidQuery.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::config::EditorConfig;
use crate::visibility::camera::CameraView;
use crate::visibility::chunks::ChunkVisibility;
use super::batch::{UpdateBatch, UpdateOptions};
use super::cell::{CellPos, ChunkKey, OccupantId, EMPTY};

/// Прогресс применения батча (для индикатора загрузки в UI)
#[derive(Debug, Clone, Copy)]
pub struct UpdateProgress {
    /// Сколько записей реально изменило индекс
    pub applied: usize,
    /// Размер батча после нормализации
    pub total: usize,
    /// UI-подсказка: показать экран загрузки
    pub show_loading: bool,
}

pub type ProgressCallback = Box<dyn Fn(UpdateProgress)>;

/// Применённая дельта: что реально добавилось и удалилось.
/// Вызывающий скармливает её undo-логу и персистентному стору.
#[derive(Debug, Clone, Default)]
pub struct UpdateResult {
    pub added: Vec<(CellPos, OccupantId)>,
    pub removed: Vec<CellPos>,
}

/// Результат вызова update()
#[derive(Debug)]
pub enum ApplyStatus {
    Applied(UpdateResult),
    /// skip_if_busy: индекс занят, вызов молча пропущен
    SkippedBusy,
}

/// Интерфейс "ячейка твёрдая?" для физики.
/// Инжектируется явно вместо глобального хука.
pub trait SolidQuery {
    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool;
}

/// Полный снапшот террейна для персистентного стора (ключ "current")
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainSnapshot {
    pub cells: Vec<(i32, i32, i32, OccupantId)>,
}

impl TerrainSnapshot {
    pub fn to_map(&self) -> HashMap<CellPos, OccupantId> {
        self.cells
            .iter()
            .map(|&(x, y, z, occupant)| (CellPos::new(x, y, z), occupant))
            .collect()
    }

    pub fn from_index(index: &SpatialIndex) -> Self {
        Self {
            cells: index
                .iter()
                .map(|(pos, occupant)| (pos.x, pos.y, pos.z, *occupant))
                .collect(),
        }
    }
}

/// Пространственный индекс занятости
pub struct SpatialIndex {
    /// Плоская карта ячейка -> occupant. Нулевых значений после
    /// применения батча здесь не бывает.
    cells: HashMap<CellPos, OccupantId>,

    visibility: ChunkVisibility,

    /// Кэш чанков в frustum. None = камеры нет, принимать без фильтрации.
    in_frustum: Option<HashSet<ChunkKey>>,

    /// Выполняется update (реентерабельный вызов пропускается при skip_if_busy)
    busy: bool,
    /// Идёт пошаговая bulk-загрузка (TerrainLoadQueue)
    bulk_loading: bool,

    on_progress: Option<ProgressCallback>,
}

impl SpatialIndex {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            cells: HashMap::new(),
            visibility: ChunkVisibility::new(
                config.chunk_size,
                config.world_floor,
                config.world_ceiling,
            ),
            in_frustum: None,
            busy: false,
            bulk_loading: false,
            on_progress: None,
        }
    }

    /// Колбэк прогресса (подавляется опцией silent)
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.on_progress = Some(callback);
    }

    #[inline]
    pub fn chunk_size(&self) -> i32 {
        self.visibility.chunk_size()
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy || self.bulk_loading
    }

    /// Пометить индекс занятым на время многотиковой bulk-загрузки
    pub(crate) fn begin_bulk(&mut self) {
        self.bulk_loading = true;
    }

    pub(crate) fn end_bulk(&mut self) {
        self.bulk_loading = false;
    }

    /// O(1) точечный тест занятости; безопасен в покадровом цикле, без аллокаций
    #[inline]
    pub fn has_occupant(&self, x: i32, y: i32, z: i32) -> bool {
        self.cells.contains_key(&CellPos::new(x, y, z))
    }

    /// Occupant ячейки (EMPTY если пусто)
    #[inline]
    pub fn occupant_at(&self, x: i32, y: i32, z: i32) -> OccupantId {
        self.cells
            .get(&CellPos::new(x, y, z))
            .copied()
            .unwrap_or(EMPTY)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellPos, &OccupantId)> + '_ {
        self.cells.iter()
    }

    /// Применить батч правок. Идемпотентно для пары (координата, occupant):
    /// повторное добавление - no-op, не дубликат. added с occupant 0
    /// трактуется как удаление; нулевые записи в карте не оседают.
    pub fn update(&mut self, mut batch: UpdateBatch, options: &UpdateOptions) -> ApplyStatus {
        if options.skip_if_busy && self.is_busy() {
            log::debug!("SpatialIndex занят, вызов с skip_if_busy пропущен");
            return ApplyStatus::SkippedBusy;
        }

        self.busy = true;
        batch.suppress_replaced_removals();
        let total = batch.len();

        let mut result = UpdateResult::default();
        for (pos, occupant) in batch.added {
            if occupant == EMPTY {
                if self.cells.remove(&pos).is_some() {
                    result.removed.push(pos);
                }
                continue;
            }
            match self.cells.get(&pos) {
                Some(current) if *current == occupant => {} // идемпотентный повтор
                _ => {
                    self.cells.insert(pos, occupant);
                    result.added.push((pos, occupant));
                }
            }
        }
        for (pos, _occupant) in batch.removed {
            if self.cells.remove(&pos).is_some() {
                result.removed.push(pos);
            }
        }
        self.busy = false;

        if !options.silent {
            if let Some(callback) = &self.on_progress {
                callback(UpdateProgress {
                    applied: result.added.len() + result.removed.len(),
                    total,
                    show_loading: options.show_loading,
                });
            }
        }
        ApplyStatus::Applied(result)
    }

    /// Сбросить всё состояние (очистка карты / смена проекта)
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Пересчитать кэш чанков в frustum. Камеры нет - кэш сбрасывается,
    /// фильтрация деградирует до "принимать всё" вместо отказа.
    pub fn update_frustum_cache(&mut self, camera: Option<&CameraView>, view_distance: f32) {
        self.in_frustum = camera.map(|cam| self.visibility.visible_chunks(cam, view_distance));
    }

    /// Текущий кэш видимых чанков (None = без фильтрации)
    #[inline]
    pub fn in_frustum(&self) -> Option<&HashSet<ChunkKey>> {
        self.in_frustum.as_ref()
    }

    /// Полная пересборка из авторитетного снапшота. Для "visible-only"
    /// пересборки вызывающий заранее фильтрует снапшот по дистанции.
    pub fn update_from_terrain(&mut self, snapshot: &HashMap<CellPos, OccupantId>) {
        self.cells.clear();
        self.cells.reserve(snapshot.len());
        for (pos, occupant) in snapshot {
            if *occupant != EMPTY {
                self.cells.insert(*pos, *occupant);
            }
        }
        log::debug!("Индекс пересобран из снапшота: {} ячеек", self.cells.len());
    }
}

impl SolidQuery for SpatialIndex {
    #[inline]
    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.has_occupant(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultraviolet::Vec3;

    fn index() -> SpatialIndex {
        SpatialIndex::new(&EditorConfig::default())
    }

    fn applied(status: ApplyStatus) -> UpdateResult {
        match status {
            ApplyStatus::Applied(result) => result,
            ApplyStatus::SkippedBusy => panic!("неожиданный SkippedBusy"),
        }
    }

    #[test]
    fn test_add_remove_roundtrip() {
        let mut idx = index();
        let opts = UpdateOptions::forced();
        applied(idx.update(UpdateBatch::single_add(CellPos::new(1, 0, 1), 7), &opts));
        assert!(idx.has_occupant(1, 0, 1));
        assert_eq!(idx.occupant_at(1, 0, 1), 7);

        applied(idx.update(UpdateBatch::single_remove(CellPos::new(1, 0, 1), 7), &opts));
        assert!(!idx.has_occupant(1, 0, 1));
        assert_eq!(idx.len(), 0);
    }

    #[test]
    fn test_idempotent_add() {
        let mut idx = index();
        let opts = UpdateOptions::forced();
        let first = applied(idx.update(UpdateBatch::single_add(CellPos::new(2, 3, 4), 5), &opts));
        assert_eq!(first.added.len(), 1);
        let size = idx.len();

        let second = applied(idx.update(UpdateBatch::single_add(CellPos::new(2, 3, 4), 5), &opts));
        assert!(second.added.is_empty());
        assert_eq!(idx.len(), size);
        assert!(idx.has_occupant(2, 3, 4));
    }

    #[test]
    fn test_replacement_wins_over_removal() {
        let mut idx = index();
        let opts = UpdateOptions::forced();
        let pos = CellPos::new(0, 1, 0);
        applied(idx.update(UpdateBatch::single_add(pos, 3), &opts));

        // Ключ и в added, и в removed: добавление побеждает,
        // событие удаления не всплывает
        let batch = UpdateBatch {
            added: vec![(pos, 9)],
            removed: vec![(pos, 3)],
        };
        let result = applied(idx.update(batch, &opts));
        assert_eq!(idx.occupant_at(0, 1, 0), 9);
        assert!(!result.removed.contains(&pos));
    }

    #[test]
    fn test_zero_occupant_add_is_removal() {
        let mut idx = index();
        let opts = UpdateOptions::forced();
        let pos = CellPos::new(5, 5, 5);
        applied(idx.update(UpdateBatch::single_add(pos, 11), &opts));
        applied(idx.update(UpdateBatch::single_add(pos, EMPTY), &opts));
        assert!(!idx.has_occupant(5, 5, 5));
        assert_eq!(idx.len(), 0);
    }

    #[test]
    fn test_skip_if_busy() {
        let mut idx = index();
        idx.begin_bulk();
        let opts = UpdateOptions { skip_if_busy: true, ..Default::default() };
        let status = idx.update(UpdateBatch::single_add(CellPos::new(1, 1, 1), 2), &opts);
        assert!(matches!(status, ApplyStatus::SkippedBusy));
        assert!(!idx.has_occupant(1, 1, 1));

        idx.end_bulk();
        let status = idx.update(UpdateBatch::single_add(CellPos::new(1, 1, 1), 2), &opts);
        assert!(matches!(status, ApplyStatus::Applied(_)));
        assert!(idx.has_occupant(1, 1, 1));
    }

    #[test]
    fn test_update_from_terrain_skips_empty() {
        let mut idx = index();
        let mut snapshot = HashMap::new();
        snapshot.insert(CellPos::new(0, 0, 0), 1);
        snapshot.insert(CellPos::new(1, 0, 0), EMPTY); // нулевые не оседают
        snapshot.insert(CellPos::new(2, 0, 0), 4);
        idx.update_from_terrain(&snapshot);
        assert_eq!(idx.len(), 2);
        assert!(!idx.has_occupant(1, 0, 0));
    }

    #[test]
    fn test_frustum_cache_absent_camera() {
        let mut idx = index();
        idx.update_frustum_cache(None, 128.0);
        assert!(idx.in_frustum().is_none());

        let camera = CameraView::from_view_proj(
            Vec3::zero(),
            crate::visibility::camera::mat4_to_cols(&ultraviolet::Mat4::identity()),
        );
        idx.update_frustum_cache(Some(&camera), 64.0);
        assert!(idx.in_frustum().is_some());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut idx = index();
        let opts = UpdateOptions::forced();
        applied(idx.update(UpdateBatch::single_add(CellPos::new(-3, 10, 8), 42), &opts));
        applied(idx.update(UpdateBatch::single_add(CellPos::new(0, 0, 0), 1), &opts));

        let snapshot = TerrainSnapshot::from_index(&idx);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: TerrainSnapshot = serde_json::from_str(&json).unwrap();

        let mut other = index();
        other.update_from_terrain(&restored.to_map());
        assert_eq!(other.len(), 2);
        assert_eq!(other.occupant_at(-3, 10, 8), 42);
    }

    #[test]
    fn test_progress_callback_and_silent() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut idx = index();
        let calls = Rc::new(Cell::new(0usize));
        let seen = calls.clone();
        idx.set_progress_callback(Box::new(move |progress| {
            assert_eq!(progress.total, 1);
            seen.set(seen.get() + 1);
        }));

        let loud = UpdateOptions::forced();
        idx.update(UpdateBatch::single_add(CellPos::new(1, 2, 3), 4), &loud);
        assert_eq!(calls.get(), 1);

        let quiet = UpdateOptions { silent: true, ..UpdateOptions::forced() };
        idx.update(UpdateBatch::single_add(CellPos::new(4, 5, 6), 4), &quiet);
        assert_eq!(calls.get(), 1);
    }
}
