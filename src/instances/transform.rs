// ============================================
// Instance Transform - Позиция/поворот/масштаб
// ============================================

use serde::{Deserialize, Serialize};
use ultraviolet::{Mat4, Rotor3, Vec3};

use crate::pool::TransientPool;

/// Трансформ инстанса: позиция, поворот Эйлера (радианы), масштаб
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceTransform {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl InstanceTransform {
    pub fn new(position: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> Self {
        Self { position, rotation, scale }
    }

    /// Трансформ в точке с единичным масштабом и без поворота
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }

    #[inline]
    pub fn position_vec(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }

    #[inline]
    pub fn scale_vec(&self) -> Vec3 {
        Vec3::new(self.scale[0], self.scale[1], self.scale[2])
    }

    /// Все компоненты конечны (кривой импортированный трансформ отбрасывается)
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation.iter().all(|v| v.is_finite())
            && self.scale.iter().all(|v| v.is_finite())
    }

    /// Радиус ограничивающей сферы при базовом радиусе меша
    #[inline]
    pub fn bounding_radius(&self, base_radius: f32) -> f32 {
        let s = self.scale_vec();
        base_radius * s.x.abs().max(s.y.abs()).max(s.z.abs())
    }

    /// Собрать матрицу модели: T * R * S.
    /// Промежуточные примитивы берутся из пула, а не аллоцируются.
    pub fn matrix(&self, pool: &mut TransientPool) -> Mat4 {
        let mut rotor = pool.rotors.acquire();
        rotor = rotor
            * Rotor3::from_euler_angles(self.rotation[2], self.rotation[0], self.rotation[1]);

        let mut m = pool.matrices.acquire();
        m = m * Mat4::from_translation(self.position_vec());
        m = m * rotor.into_matrix().into_homogeneous();
        m = m * Mat4::from_nonuniform_scale(self.scale_vec());

        pool.rotors.release(rotor);
        let composed = m;
        pool.matrices.release(m);
        composed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultraviolet::Vec4;

    #[test]
    fn test_matrix_translation_only() {
        let mut pool = TransientPool::new();
        let t = InstanceTransform::at(3.0, -2.0, 5.0);
        let m = t.matrix(&mut pool);
        let origin = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.x - 3.0).abs() < 1e-6);
        assert!((origin.y + 2.0).abs() < 1e-6);
        assert!((origin.z - 5.0).abs() < 1e-6);
        // Всё возвращено в пул
        assert_eq!(pool.matrices.outstanding(), 0);
        assert_eq!(pool.rotors.outstanding(), 0);
    }

    #[test]
    fn test_matrix_applies_scale() {
        let mut pool = TransientPool::new();
        let t = InstanceTransform::new([0.0; 3], [0.0; 3], [2.0, 1.0, 1.0]);
        let m = t.matrix(&mut pool);
        let p = m * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_is_finite() {
        assert!(InstanceTransform::at(0.0, 0.0, 0.0).is_finite());
        let bad = InstanceTransform::new([f32::NAN, 0.0, 0.0], [0.0; 3], [1.0; 3]);
        assert!(!bad.is_finite());
    }

    #[test]
    fn test_bounding_radius_uses_max_scale() {
        let t = InstanceTransform::new([0.0; 3], [0.0; 3], [1.0, -3.0, 2.0]);
        assert_eq!(t.bounding_radius(1.5), 4.5);
    }
}
