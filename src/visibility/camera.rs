// ============================================
// Camera View - Снимок состояния камеры
// ============================================
// Ядро не владеет камерой: внешний scene-провайдер отдаёт позицию
// и матрицы по запросу. Если провайдера нет, фильтрация видимости
// деградирует до "принимать всё" (см. SpatialIndex::update_frustum_cache).

use ultraviolet::{Mat4, Vec3};

/// Снимок камеры на момент вызова: позиция + view-projection
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    pub position: Vec3,
    view_proj: [[f32; 4]; 4],
}

impl CameraView {
    /// Из проекционной матрицы и обратной мировой матрицы камеры (view)
    pub fn new(position: Vec3, projection: Mat4, view: Mat4) -> Self {
        Self {
            position,
            view_proj: mat4_to_cols(&(projection * view)),
        }
    }

    /// Из готовой view-projection матрицы (column-major)
    pub fn from_view_proj(position: Vec3, view_proj: [[f32; 4]; 4]) -> Self {
        Self { position, view_proj }
    }

    #[inline]
    pub fn view_proj(&self) -> &[[f32; 4]; 4] {
        &self.view_proj
    }
}

/// Внешний трекер движения камеры: пока камера панорамируется,
/// нефорсированные обновления индекса отбрасываются
pub trait MotionTracker {
    fn is_moving(&self) -> bool;
}

/// Mat4 -> column-major массив для извлечения плоскостей frustum
#[inline]
pub fn mat4_to_cols(m: &Mat4) -> [[f32; 4]; 4] {
    let c = m.cols;
    [
        [c[0].x, c[0].y, c[0].z, c[0].w],
        [c[1].x, c[1].y, c[1].z, c[1].w],
        [c[2].x, c[2].y, c[2].z, c[2].w],
        [c[3].x, c[3].y, c[3].z, c[3].w],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mat4_to_cols_identity() {
        let cols = mat4_to_cols(&Mat4::identity());
        for (i, col) in cols.iter().enumerate() {
            for (j, v) in col.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(*v, expected);
            }
        }
    }

    #[test]
    fn test_camera_view_combines_matrices() {
        let proj = Mat4::from_nonuniform_scale(Vec3::new(0.5, 0.5, 0.5));
        let view = Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0));
        let cam = CameraView::new(Vec3::zero(), proj, view);
        // (proj * view) переносит x=1 в 0, затем масштабирует
        let vp = cam.view_proj();
        assert_eq!(vp[3][0], -0.5);
    }
}
