// ============================================
// Instance Group - Таблица инстансов одного ассета
// ============================================
// Id стабильны: удаление не уплотняет таблицу, слот в draw-буфере
// прячется нулевым масштабом. Уплотнение ломало бы контракт id->слот
// под гонку со свежими размещениями, поэтому буфер только растёт.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use ultraviolet::{Mat4, Vec3};

use crate::pool::TransientPool;
use crate::visibility::frustum::Frustum;
use super::transform::InstanceTransform;

/// Стабильный id инстанса внутри группы
pub type InstanceId = u32;

/// Ошибки работы с инстансами. Переполнение группы - ожидаемое,
/// восстановимое состояние: UI показывает "мир переполнен", не краш.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstanceError {
    #[error("превышен потолок группы: {capacity} инстансов")]
    CapacityExceeded { capacity: u32 },
    #[error("инстанс {0} не найден")]
    UnknownId(InstanceId),
    #[error("группа \"{0}\" не найдена")]
    UnknownGroup(String),
}

/// Элемент draw-буфера: матрица модели, готовая к заливке на GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
}

impl InstanceData {
    fn from_matrix(m: &Mat4) -> Self {
        Self { model: crate::visibility::camera::mat4_to_cols(m) }
    }

    /// Слот скрыт нулевым масштабом?
    pub fn is_hidden(&self) -> bool {
        self.model == [[0.0; 4]; 4]
    }
}

/// Живая запись инстанса
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub transform: InstanceTransform,
    pub matrix: Mat4,
    pub visible: bool,
}

/// Контекст видимости для recompute (камера присутствует)
pub struct VisibilityContext {
    pub camera_pos: Vec3,
    pub frustum: Frustum,
    pub view_distance_sq: f32,
}

/// Группа инстансов одного ассета
pub struct InstanceGroup {
    /// Потолок фиксируется при создании группы; буфер не перевыделяется
    capacity: u32,
    /// Радиус ограничивающей сферы меша при единичном масштабе
    bounding_radius: f32,
    instances: HashMap<InstanceId, InstanceRecord>,
    /// Draw-буфер. Длина только растёт - до max(живой id)+1
    draw: Vec<InstanceData>,
}

impl InstanceGroup {
    pub fn new(capacity: u32, bounding_radius: f32) -> Self {
        Self {
            capacity,
            bounding_radius,
            instances: HashMap::new(),
            draw: Vec::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    /// Число живых инстансов
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn record(&self, id: InstanceId) -> Option<&InstanceRecord> {
        self.instances.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.keys().copied()
    }

    /// Первый свободный id: начинаем с числа живых, шагаем мимо коллизий
    fn probe_free_id(&self) -> InstanceId {
        let mut id = self.instances.len() as InstanceId;
        while self.instances.contains_key(&id) {
            id += 1;
        }
        id
    }

    /// Разместить инстанс. explicit_id - повтор undo/redo или десериализация;
    /// повторное размещение на занятый id переиспользует его слот.
    /// За потолком - ошибка без частичного состояния.
    pub fn place(
        &mut self,
        transform: InstanceTransform,
        explicit_id: Option<InstanceId>,
        pool: &mut TransientPool,
    ) -> Result<InstanceId, InstanceError> {
        let id = explicit_id.unwrap_or_else(|| self.probe_free_id());
        if id >= self.capacity {
            log::warn!("Группа переполнена: id {} >= потолка {}", id, self.capacity);
            return Err(InstanceError::CapacityExceeded { capacity: self.capacity });
        }
        let matrix = transform.matrix(pool);
        self.instances.insert(id, InstanceRecord {
            transform,
            matrix,
            visible: true,
        });
        Ok(id)
    }

    /// Удалить запись. Слот draw-буфера не освобождается - прячется
    /// при следующем recompute.
    pub fn remove(&mut self, id: InstanceId) -> Result<(), InstanceError> {
        self.instances
            .remove(&id)
            .map(|_| ())
            .ok_or(InstanceError::UnknownId(id))
    }

    /// Передвинуть/повернуть инстанс. Объект под манипуляцией не отсекается.
    pub fn move_instance(
        &mut self,
        id: InstanceId,
        transform: InstanceTransform,
        pool: &mut TransientPool,
    ) -> Result<(), InstanceError> {
        let matrix = transform.matrix(pool);
        let record = self
            .instances
            .get_mut(&id)
            .ok_or(InstanceError::UnknownId(id))?;
        record.transform = transform;
        record.matrix = matrix;
        record.visible = true;
        Ok(())
    }

    /// Пересчитать видимость и переписать draw-буфер.
    /// recently_exempt форсирует видимость свежеразмещённых; без камеры
    /// видимы все. Слоты без живого id зануляются, буфер не сжимается.
    pub fn recompute_visible<F>(&mut self, ctx: Option<&VisibilityContext>, recently_exempt: F)
    where
        F: Fn(InstanceId) -> bool,
    {
        for (id, record) in &mut self.instances {
            record.visible = if recently_exempt(*id) {
                true
            } else {
                match ctx {
                    Some(ctx) => {
                        let pos = record.transform.position_vec();
                        let radius = record.transform.bounding_radius(self.bounding_radius);
                        (pos - ctx.camera_pos).mag_sq() <= ctx.view_distance_sq
                            && ctx.frustum.intersects_sphere(pos, radius)
                    }
                    None => true,
                }
            };
        }

        // Буфер покрывает max(живой id)+1 и никогда не укорачивается
        let needed = self
            .instances
            .keys()
            .max()
            .map_or(0, |max_id| *max_id as usize + 1);
        if needed > self.draw.len() {
            self.draw.resize(needed, InstanceData::zeroed());
        }
        for (slot, data) in self.draw.iter_mut().enumerate() {
            *data = match self.instances.get(&(slot as InstanceId)) {
                Some(record) if record.visible => InstanceData::from_matrix(&record.matrix),
                _ => InstanceData::zeroed(),
            };
        }
    }

    /// Содержимое draw-буфера (для заливки инстансированного дро-колла)
    #[inline]
    pub fn draw_data(&self) -> &[InstanceData] {
        &self.draw
    }

    /// Число элементов дро-колла
    #[inline]
    pub fn draw_count(&self) -> u32 {
        self.draw.len() as u32
    }
}
