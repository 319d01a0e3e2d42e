// ============================================
// Transient Pool - Пул transform-примитивов
// ============================================
// Перерасчёт трансформов берёт по несколько примитивов
// (вектор, ротор, матрица) на операцию; пул убирает аллокационный
// шторм на горячем пути. Однопоточный, реентерабельный внутри
// одного синхронного стека вызовов. Утечка (не вернули значение) -
// не ошибка: пул просто создаст новое.

use ultraviolet::{Mat4, Rotor3, Vec3};

/// Свободный список одного типа примитива.
/// release() сбрасывает значение к нейтральному, acquire() всегда
/// отдаёт чистый примитив.
pub struct Pool<T> {
    free: Vec<T>,
    fresh: fn() -> T,
    outstanding: usize,
    high_water: usize,
}

impl<T> Pool<T> {
    pub fn new(fresh: fn() -> T) -> Self {
        Self {
            free: Vec::new(),
            fresh,
            outstanding: 0,
            high_water: 0,
        }
    }

    /// Взять примитив из пула (или создать новый)
    pub fn acquire(&mut self) -> T {
        self.outstanding += 1;
        self.high_water = self.high_water.max(self.outstanding);
        self.free.pop().unwrap_or_else(self.fresh)
    }

    /// Вернуть примитив в пул. Значение сбрасывается к нейтральному.
    pub fn release(&mut self, _value: T) {
        // Значения Copy-типов дешевле пересоздать, чем хранить грязными
        self.outstanding = self.outstanding.saturating_sub(1);
        self.free.push((self.fresh)());
    }

    /// Сколько примитивов сейчас на руках
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Пиковое число одновременно взятых примитивов
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Сколько примитивов лежит свободными
    #[inline]
    pub fn pooled(&self) -> usize {
        self.free.len()
    }
}

/// Пулы всех transform-примитивов ядра
pub struct TransientPool {
    pub vectors: Pool<Vec3>,
    pub rotors: Pool<Rotor3>,
    pub matrices: Pool<Mat4>,
}

impl TransientPool {
    pub fn new() -> Self {
        Self {
            vectors: Pool::new(Vec3::zero),
            rotors: Pool::new(Rotor3::identity),
            matrices: Pool::new(Mat4::identity),
        }
    }
}

impl Default for TransientPool {
    fn default() -> Self {
        Self::new()
    }
}
