// ============================================
// Chunk Visibility - Видимые чанки
// ============================================
// По снимку камеры и дистанции обзора строит набор ключей чанков,
// чей AABB пересекает frustum и лежит в пределах дистанции.
// Вызывается один раз на принятый батч, не раз в кадр, поэтому
// достаточно дёшев: одно извлечение плоскостей + O(кандидатов).

use std::collections::HashSet;

use ultraviolet::Vec3;

use crate::spatial::cell::ChunkKey;
use super::camera::CameraView;
use super::frustum::Frustum;

/// Вычислитель видимых чанков.
/// Отображение координата->чанк обязано побитово совпадать с SpatialIndex
/// (div_euclid по chunk_size), иначе фильтрация батчей рассыпается.
#[derive(Debug, Clone, Copy)]
pub struct ChunkVisibility {
    chunk_size: i32,
    /// Вертикальная полоса мира (ячейки вне неё не редактируются)
    world_floor: i32,
    world_ceiling: i32,
}

impl ChunkVisibility {
    pub fn new(chunk_size: i32, world_floor: i32, world_ceiling: i32) -> Self {
        debug_assert!(chunk_size > 0);
        Self { chunk_size, world_floor, world_ceiling }
    }

    #[inline]
    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    /// Набор чанков в пределах view_distance, пересекающих frustum камеры
    pub fn visible_chunks(&self, camera: &CameraView, view_distance: f32) -> HashSet<ChunkKey> {
        let frustum = Frustum::from_view_proj(camera.view_proj());
        let cs = self.chunk_size as f32;
        let half_diag = cs * 0.5 * 3.0_f32.sqrt();
        // Дистанция по центрам чанков, с запасом на полудиагональ
        let max_dist_sq = {
            let d = view_distance + half_diag;
            d * d
        };

        let cam = camera.position;
        let radius = (view_distance / cs).ceil() as i32 + 1;
        let center_x = (cam.x.floor() as i32).div_euclid(self.chunk_size);
        let center_y = (cam.y.floor() as i32).div_euclid(self.chunk_size);
        let center_z = (cam.z.floor() as i32).div_euclid(self.chunk_size);

        let floor_chunk = self.world_floor.div_euclid(self.chunk_size);
        let ceiling_chunk = (self.world_ceiling - 1).div_euclid(self.chunk_size);
        let y_min = (center_y - radius).max(floor_chunk);
        let y_max = (center_y + radius).min(ceiling_chunk);

        let mut visible = HashSet::new();
        for cx in (center_x - radius)..=(center_x + radius) {
            for cy in y_min..=y_max {
                for cz in (center_z - radius)..=(center_z + radius) {
                    let min = Vec3::new(
                        (cx * self.chunk_size) as f32,
                        (cy * self.chunk_size) as f32,
                        (cz * self.chunk_size) as f32,
                    );
                    let max = min + Vec3::broadcast(cs);
                    let center = min + Vec3::broadcast(cs * 0.5);

                    if (center - cam).mag_sq() > max_dist_sq {
                        continue;
                    }
                    if frustum.intersects_aabb(min, max) {
                        visible.insert(ChunkKey::new(cx, cy, cz));
                    }
                }
            }
        }
        visible
    }
}
