// ============================================
// Frustum - Плоскости отсечения камеры
// ============================================

use ultraviolet::Vec3;

/// Шесть плоскостей frustum в нормализованном виде.
/// Плоскость: (nx, ny, nz, d), nx*x + ny*y + nz*z + d >= 0 означает "внутри".
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [[f32; 4]; 6],
}

/// Извлекает 6 плоскостей frustum из view-projection матрицы (column-major)
pub fn extract_frustum_planes(vp: &[[f32; 4]; 4]) -> [[f32; 4]; 6] {
    let m = vp;
    [
        // Left:   row3 + row0
        [m[0][3] + m[0][0], m[1][3] + m[1][0], m[2][3] + m[2][0], m[3][3] + m[3][0]],
        // Right:  row3 - row0
        [m[0][3] - m[0][0], m[1][3] - m[1][0], m[2][3] - m[2][0], m[3][3] - m[3][0]],
        // Bottom: row3 + row1
        [m[0][3] + m[0][1], m[1][3] + m[1][1], m[2][3] + m[2][1], m[3][3] + m[3][1]],
        // Top:    row3 - row1
        [m[0][3] - m[0][1], m[1][3] - m[1][1], m[2][3] - m[2][1], m[3][3] - m[3][1]],
        // Near:   row3 + row2
        [m[0][3] + m[0][2], m[1][3] + m[1][2], m[2][3] + m[2][2], m[3][3] + m[3][2]],
        // Far:    row3 - row2
        [m[0][3] - m[0][2], m[1][3] - m[1][2], m[2][3] - m[2][2], m[3][3] - m[3][2]],
    ]
}

/// Проверяет, находится ли AABB полностью снаружи плоскости
#[inline]
fn is_aabb_outside_plane(plane: &[f32; 4], min: Vec3, max: Vec3) -> bool {
    // Берём "положительную" вершину AABB относительно нормали
    let px = if plane[0] >= 0.0 { max.x } else { min.x };
    let py = if plane[1] >= 0.0 { max.y } else { min.y };
    let pz = if plane[2] >= 0.0 { max.z } else { min.z };

    plane[0] * px + plane[1] * py + plane[2] * pz + plane[3] < 0.0
}

impl Frustum {
    /// Строит frustum из view-projection матрицы.
    /// Плоскости нормализуются, чтобы тест сферы давал честные дистанции.
    pub fn from_view_proj(vp: &[[f32; 4]; 4]) -> Self {
        let mut planes = extract_frustum_planes(vp);
        for plane in &mut planes {
            let len = (plane[0] * plane[0] + plane[1] * plane[1] + plane[2] * plane[2]).sqrt();
            if len > f32::EPSILON {
                plane[0] /= len;
                plane[1] /= len;
                plane[2] /= len;
                plane[3] /= len;
            }
        }
        Self { planes }
    }

    /// AABB пересекает frustum (консервативно: false только если полностью снаружи)
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        for plane in &self.planes {
            if is_aabb_outside_plane(plane, min, max) {
                return false;
            }
        }
        true
    }

    /// Ограничивающая сфера пересекает frustum
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes {
            let dist = plane[0] * center.x + plane[1] * center.y + plane[2] * center.z + plane[3];
            if dist < -radius {
                return false;
            }
        }
        true
    }
}
