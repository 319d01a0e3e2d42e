// ============================================
// Terrain Load Queue - Пошаговая bulk-загрузка
// ============================================
// Полный снапшот террейна заливается ломтями фиксированного размера,
// по одному на кооперативный tick, чтобы не вешать кадровый цикл.
// Явная очередь работы вместо рекурсивных таймеров: отменяемо и
// проверяемо. На время загрузки индекс помечен занятым, и фоновые
// вызовы со skip_if_busy пропускаются.

use std::collections::HashMap;

use super::batch::{UpdateBatch, UpdateOptions};
use super::cell::{CellPos, OccupantId, EMPTY};
use super::scheduler::UpdateScheduler;

/// Прогресс bulk-загрузки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProgress {
    /// Очередь пуста
    Idle,
    InProgress { applied: usize, total: usize },
    Finished { total: usize },
}

/// Очередь пошаговой загрузки террейна
pub struct TerrainLoadQueue {
    cells: Vec<(CellPos, OccupantId)>,
    cursor: usize,
    slice_len: usize,
}

impl TerrainLoadQueue {
    pub fn new(slice_len: usize) -> Self {
        debug_assert!(slice_len > 0);
        Self {
            cells: Vec::new(),
            cursor: 0,
            slice_len,
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.cursor >= self.cells.len()
    }

    /// Начать загрузку снапшота. Индекс очищается сразу, ячейки
    /// доливаются по ломтям. Нулевые occupant'ы отбрасываются на входе.
    pub fn start(&mut self, scheduler: &mut UpdateScheduler, snapshot: &HashMap<CellPos, OccupantId>) {
        self.cells = snapshot
            .iter()
            .filter(|(_, occupant)| **occupant != EMPTY)
            .map(|(pos, occupant)| (*pos, *occupant))
            .collect();
        self.cursor = 0;
        scheduler.index_mut().clear();
        scheduler.index_mut().begin_bulk();
        log::debug!("Bulk-загрузка: {} ячеек по {} за tick", self.cells.len(), self.slice_len);
    }

    /// Применить следующий ломоть. Вызывается кадровым циклом.
    pub fn tick(&mut self, scheduler: &mut UpdateScheduler) -> LoadProgress {
        if self.is_idle() {
            return LoadProgress::Idle;
        }
        let end = (self.cursor + self.slice_len).min(self.cells.len());
        let mut batch = UpdateBatch::new();
        batch.added.extend_from_slice(&self.cells[self.cursor..end]);
        self.cursor = end;

        // Форсированно и тихо: загрузка не должна спотыкаться об admission control
        let options = UpdateOptions { silent: true, ..UpdateOptions::forced() };
        scheduler.update(batch, &options, None);

        if self.is_idle() {
            let total = self.cells.len();
            self.cells = Vec::new();
            self.cursor = 0;
            scheduler.index_mut().end_bulk();
            LoadProgress::Finished { total }
        } else {
            LoadProgress::InProgress {
                applied: self.cursor,
                total: self.cells.len(),
            }
        }
    }

    /// Отменить загрузку (смена проекта на полпути)
    pub fn cancel(&mut self, scheduler: &mut UpdateScheduler) {
        if !self.is_idle() {
            log::debug!("Bulk-загрузка отменена на {}/{}", self.cursor, self.cells.len());
        }
        self.cells = Vec::new();
        self.cursor = 0;
        scheduler.index_mut().end_bulk();
    }
}
