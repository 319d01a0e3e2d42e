// ============================================
// Editor Context - Все подсистемы в одном месте
// ============================================
// Явно конструируемый владелец ядра вместо модульных синглтонов:
// планировщик с индексом, реестр инстансов, пул примитивов и очередь
// bulk-загрузки. Передаётся по ссылке во все точки вызова.

use std::collections::HashMap;
use std::time::Instant;

use crate::instances::group::{InstanceError, InstanceId};
use crate::instances::registry::InstanceRegistry;
use crate::instances::transform::InstanceTransform;
use crate::pool::TransientPool;
use crate::spatial::batch::{UpdateBatch, UpdateOptions};
use crate::spatial::cell::{CellPos, OccupantId, ENV_MARKER};
use crate::spatial::loader::{LoadProgress, TerrainLoadQueue};
use crate::spatial::scheduler::{UpdateOutcome, UpdateScheduler};
use crate::visibility::camera::{CameraView, MotionTracker};
use super::config::EditorConfig;

/// Контекст пространственного ядра редактора
pub struct EditorContext {
    pub scheduler: UpdateScheduler,
    pub instances: InstanceRegistry,
    pub pool: TransientPool,
    loader: TerrainLoadQueue,
}

impl EditorContext {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            scheduler: UpdateScheduler::new(config.clone()),
            instances: InstanceRegistry::new(&config),
            pool: TransientPool::new(),
            loader: TerrainLoadQueue::new(config.load_slice),
        }
    }

    /// Действующие настройки ядра
    #[inline]
    pub fn config(&self) -> &EditorConfig {
        self.scheduler.config()
    }

    /// Инжекция внешнего трекера движения камеры
    pub fn set_motion_tracker(&mut self, tracker: Box<dyn MotionTracker>) {
        self.scheduler.set_motion_tracker(tracker);
    }

    /// Батч правок террейна от инструментов редактирования
    pub fn update_terrain(
        &mut self,
        batch: UpdateBatch,
        options: &UpdateOptions,
        camera: Option<&CameraView>,
    ) -> UpdateOutcome {
        self.scheduler.update(batch, options, camera)
    }

    /// O(1) запрос занятости для raycast/физики
    #[inline]
    pub fn has_occupant(&self, x: i32, y: i32, z: i32) -> bool {
        self.scheduler.index().has_occupant(x, y, z)
    }

    /// Кооперативный tick из кадрового цикла: отложенные повторы
    /// rate-лимитера и очередной ломоть bulk-загрузки
    pub fn tick(&mut self, camera: Option<&CameraView>) -> LoadProgress {
        self.scheduler.tick(camera);
        self.loader.tick(&mut self.scheduler)
    }

    /// Начать пошаговую загрузку полного снапшота террейна
    pub fn start_terrain_load(&mut self, snapshot: &HashMap<CellPos, OccupantId>) {
        self.loader.start(&mut self.scheduler, snapshot);
    }

    pub fn cancel_terrain_load(&mut self) {
        self.loader.cancel(&mut self.scheduler);
    }

    /// Разместить объект окружения: инстанс в группе + маркер ENV_MARKER
    /// в ячейке под объектом (форсированная запись, мимо троттлов)
    pub fn place_object(
        &mut self,
        group: &str,
        transform: InstanceTransform,
    ) -> Result<InstanceId, InstanceError> {
        let id = self.instances.place(group, transform, None, &mut self.pool)?;
        let cell = cell_under(&transform);
        self.scheduler.update(
            UpdateBatch::single_add(cell, ENV_MARKER),
            &UpdateOptions::forced(),
            None,
        );
        Ok(id)
    }

    /// Убрать объект окружения и его маркер из индекса
    pub fn remove_object(&mut self, group: &str, id: InstanceId) -> Result<(), InstanceError> {
        let cell = self
            .instances
            .group(group)
            .and_then(|g| g.record(id))
            .map(|record| cell_under(&record.transform));
        self.instances.remove(group, id)?;
        if let Some(cell) = cell {
            self.scheduler.update(
                UpdateBatch::single_remove(cell, ENV_MARKER),
                &UpdateOptions::forced(),
                None,
            );
        }
        Ok(())
    }

    /// Разрушительная очистка мира: стрим обновлений гасится на время
    /// операции, чтобы не гонялись частичные записи
    pub fn clear_world(&mut self) {
        self.scheduler.set_disable_updates(true);
        self.cancel_terrain_load();
        self.scheduler.index_mut().clear();
        self.instances.clear();
        self.scheduler.set_disable_updates(false);
    }
}

/// Ячейка под опорной точкой трансформа
fn cell_under(transform: &InstanceTransform) -> CellPos {
    CellPos::new(
        transform.position[0].floor() as i32,
        transform.position[1].floor() as i32,
        transform.position[2].floor() as i32,
    )
}
