// ============================================
// Instance Registry - Группы инстансов по ассетам
// ============================================
// Одна группа на идентичность ассета. Потолок группы приходит от
// внешнего загрузчика ассетов при создании. После каждой мутации
// вызывающий гонит recompute_visible, и draw-буферы переписываются.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::config::EditorConfig;
use crate::pool::TransientPool;
use crate::visibility::camera::CameraView;
use crate::visibility::frustum::Frustum;
use super::group::{InstanceError, InstanceGroup, InstanceId, VisibilityContext};
use super::recent::RecentPlacements;
use super::transform::InstanceTransform;

/// Сериализуемый снапшот группы для персистентного стора
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub capacity: u32,
    pub bounding_radius: f32,
    pub instances: Vec<(InstanceId, InstanceTransform)>,
}

/// Реестр групп инстансов
pub struct InstanceRegistry {
    groups: HashMap<String, InstanceGroup>,
    recent: RecentPlacements,
    view_distance: f32,
}

impl InstanceRegistry {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            groups: HashMap::new(),
            recent: RecentPlacements::new(config.recent_ttl()),
            view_distance: config.view_distance,
        }
    }

    /// Создать группу под ассет. Потолок и радиус сферы дают метаданные
    /// ассета. Повторное создание существующей группы игнорируется.
    pub fn create_group(&mut self, key: &str, capacity: u32, bounding_radius: f32) -> bool {
        if self.groups.contains_key(key) {
            log::debug!("Группа \"{}\" уже существует", key);
            return false;
        }
        self.groups
            .insert(key.to_string(), InstanceGroup::new(capacity, bounding_radius));
        true
    }

    pub fn group(&self, key: &str) -> Option<&InstanceGroup> {
        self.groups.get(key)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Суммарное число живых инстансов по всем группам
    pub fn total_instances(&self) -> usize {
        self.groups.values().map(|g| g.len()).sum()
    }

    pub fn place(
        &mut self,
        key: &str,
        transform: InstanceTransform,
        explicit_id: Option<InstanceId>,
        pool: &mut TransientPool,
    ) -> Result<InstanceId, InstanceError> {
        self.place_at(key, transform, explicit_id, pool, Instant::now())
    }

    /// Разместить инстанс и взять его под защиту "только что размещён"
    pub fn place_at(
        &mut self,
        key: &str,
        transform: InstanceTransform,
        explicit_id: Option<InstanceId>,
        pool: &mut TransientPool,
        now: Instant,
    ) -> Result<InstanceId, InstanceError> {
        let group = self
            .groups
            .get_mut(key)
            .ok_or_else(|| InstanceError::UnknownGroup(key.to_string()))?;
        let id = group.place(transform, explicit_id, pool)?;
        self.recent.insert_at(key, id, now);
        Ok(id)
    }

    pub fn remove(&mut self, key: &str, id: InstanceId) -> Result<(), InstanceError> {
        let group = self
            .groups
            .get_mut(key)
            .ok_or_else(|| InstanceError::UnknownGroup(key.to_string()))?;
        group.remove(id)?;
        self.recent.forget(key, id);
        Ok(())
    }

    pub fn move_instance(
        &mut self,
        key: &str,
        id: InstanceId,
        transform: InstanceTransform,
        pool: &mut TransientPool,
    ) -> Result<(), InstanceError> {
        let group = self
            .groups
            .get_mut(key)
            .ok_or_else(|| InstanceError::UnknownGroup(key.to_string()))?;
        group.move_instance(id, transform, pool)
    }

    pub fn recompute_visible(&mut self, camera: Option<&CameraView>) {
        self.recompute_visible_at(camera, Instant::now())
    }

    /// Пересчитать видимость всех групп. Без камеры - все видимы.
    pub fn recompute_visible_at(&mut self, camera: Option<&CameraView>, now: Instant) {
        self.recent.purge_at(now);
        let ctx = camera.map(|cam| VisibilityContext {
            camera_pos: cam.position,
            frustum: Frustum::from_view_proj(cam.view_proj()),
            view_distance_sq: self.view_distance * self.view_distance,
        });
        for (key, group) in &mut self.groups {
            let recent = &self.recent;
            group.recompute_visible(ctx.as_ref(), |id| recent.contains_at(key, id, now));
        }
    }

    /// Снапшот группы для персистентного стора
    pub fn snapshot_group(&self, key: &str) -> Option<GroupSnapshot> {
        let group = self.groups.get(key)?;
        let mut instances: Vec<(InstanceId, InstanceTransform)> = group
            .ids()
            .filter_map(|id| group.record(id).map(|r| (id, r.transform)))
            .collect();
        instances.sort_by_key(|(id, _)| *id);
        Some(GroupSnapshot {
            capacity: group.capacity(),
            bounding_radius: group.bounding_radius(),
            instances,
        })
    }

    /// Восстановить группу из снапшота (explicit id). Кривые трансформы
    /// пропускаются по одному и не отравляют остальной список.
    pub fn restore_group(
        &mut self,
        key: &str,
        snapshot: &GroupSnapshot,
        pool: &mut TransientPool,
    ) -> usize {
        let group = self
            .groups
            .entry(key.to_string())
            .and_modify(|g| *g = InstanceGroup::new(snapshot.capacity, snapshot.bounding_radius))
            .or_insert_with(|| InstanceGroup::new(snapshot.capacity, snapshot.bounding_radius));

        let mut restored = 0;
        for (id, transform) in &snapshot.instances {
            if !transform.is_finite() {
                log::warn!("Пропуск кривого трансформа инстанса {} в \"{}\"", id, key);
                continue;
            }
            match group.place(*transform, Some(*id), pool) {
                Ok(_) => restored += 1,
                Err(err) => log::warn!("Не восстановлен инстанс {} в \"{}\": {}", id, key, err),
            }
        }
        restored
    }

    /// Полный сброс всех групп (очистка окружения).
    /// Единственный момент, когда слоты буферов реально освобождаются.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use ultraviolet::{Mat4, Vec3};
    use crate::visibility::camera::mat4_to_cols;

    fn registry() -> (InstanceRegistry, TransientPool) {
        (
            InstanceRegistry::new(&EditorConfig::default()),
            TransientPool::new(),
        )
    }

    fn far_camera() -> CameraView {
        CameraView::from_view_proj(
            Vec3::new(10_000.0, 0.0, 0.0),
            mat4_to_cols(&Mat4::identity()),
        )
    }

    #[test]
    fn test_unknown_group() {
        let (mut reg, mut pool) = registry();
        let err = reg.place("ghost", InstanceTransform::at(0.0, 0.0, 0.0), None, &mut pool);
        assert!(matches!(err, Err(InstanceError::UnknownGroup(_))));
    }

    #[test]
    fn test_capacity_scenario_three_plus_one() {
        let (mut reg, mut pool) = registry();
        let t0 = Instant::now();
        assert!(reg.create_group("rock", 3, 1.0));

        for i in 0..3 {
            let id = reg
                .place_at("rock", InstanceTransform::at(i as f32, 0.0, 0.0), None, &mut pool, t0)
                .unwrap();
            assert_eq!(id, i);
        }
        let err = reg.place_at("rock", InstanceTransform::at(9.0, 0.0, 0.0), None, &mut pool, t0);
        assert_eq!(err, Err(InstanceError::CapacityExceeded { capacity: 3 }));
        assert_eq!(reg.group("rock").unwrap().len(), 3);
    }

    #[test]
    fn test_recent_placement_survives_far_camera_until_ttl() {
        let (mut reg, mut pool) = registry();
        let t0 = Instant::now();
        reg.create_group("tree", 64, 1.0);
        let id = reg
            .place_at("tree", InstanceTransform::at(0.0, 0.0, 0.0), None, &mut pool, t0)
            .unwrap();

        // Камера далеко, но свежеразмещённый объект не мигает
        reg.recompute_visible_at(Some(&far_camera()), t0 + Duration::from_millis(100));
        assert!(!reg.group("tree").unwrap().draw_data()[id as usize].is_hidden());

        // TTL истёк - обычное отсечение по дистанции
        reg.recompute_visible_at(Some(&far_camera()), t0 + Duration::from_millis(1500));
        assert!(reg.group("tree").unwrap().draw_data()[id as usize].is_hidden());
    }

    #[test]
    fn test_removed_id_stability_via_registry() {
        let (mut reg, mut pool) = registry();
        let t0 = Instant::now();
        reg.create_group("rock", 16, 1.0);
        for i in 0..5 {
            reg.place_at("rock", InstanceTransform::at(i as f32, 0.0, 0.0), None, &mut pool, t0)
                .unwrap();
        }
        reg.remove("rock", 2).unwrap();
        reg.recompute_visible_at(None, t0 + Duration::from_millis(2000));

        let group = reg.group("rock").unwrap();
        assert!(group.draw_data()[2].is_hidden());
        for slot in [0usize, 1, 3, 4] {
            assert!(!group.draw_data()[slot].is_hidden());
        }
    }

    #[test]
    fn test_group_snapshot_roundtrip() {
        let (mut reg, mut pool) = registry();
        let t0 = Instant::now();
        reg.create_group("rock", 8, 1.0);
        reg.place_at("rock", InstanceTransform::at(1.0, 2.0, 3.0), None, &mut pool, t0).unwrap();
        reg.place_at("rock", InstanceTransform::at(4.0, 5.0, 6.0), None, &mut pool, t0).unwrap();
        reg.remove("rock", 0).unwrap();

        let snapshot = reg.snapshot_group("rock").unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: GroupSnapshot = serde_json::from_str(&json).unwrap();

        let (mut other, mut pool2) = registry();
        other.create_group("rock", 8, 1.0);
        assert_eq!(other.restore_group("rock", &restored, &mut pool2), 1);
        let group = other.group("rock").unwrap();
        assert!(group.contains(1));
        assert!(!group.contains(0));
        assert_eq!(group.record(1).unwrap().transform.position, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_restore_skips_malformed_transform() {
        let (mut reg, mut pool) = registry();
        let snapshot = GroupSnapshot {
            capacity: 8,
            bounding_radius: 1.0,
            instances: vec![
                (0, InstanceTransform::at(1.0, 0.0, 0.0)),
                (1, InstanceTransform::new([f32::NAN, 0.0, 0.0], [0.0; 3], [1.0; 3])),
                (2, InstanceTransform::at(2.0, 0.0, 0.0)),
            ],
        };
        assert_eq!(reg.restore_group("rock", &snapshot, &mut pool), 2);
        let group = reg.group("rock").unwrap();
        assert!(group.contains(0) && group.contains(2));
        assert!(!group.contains(1));
    }
}
