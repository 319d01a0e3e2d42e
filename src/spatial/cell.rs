// ============================================
// Cell - Ключи ячеек и чанков
// ============================================
// Ячейка = целочисленная координата в бесконечном поле.
// Чанк выводится из координат делением с округлением вниз,
// отдельного владения ячейками у чанка нет.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор занимающего ячейку: id блока или маркер объекта
pub type OccupantId = u16;

/// Пустая ячейка (отсутствие записи и occupant 0 логически неразличимы)
pub const EMPTY: OccupantId = 0;

/// Зарезервированный маркер "размещённый объект окружения"
pub const ENV_MARKER: OccupantId = 1000;

/// Позиция ячейки в мировых координатах
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Ключ чанка (координаты чанка по трём осям)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkKey {
    #[inline]
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

// 21 бит на ось при упаковке в u64
const PACK_BITS: u32 = 21;
const PACK_MASK: u64 = (1 << PACK_BITS) - 1;

#[inline]
fn sign_extend_21(v: u64) -> i32 {
    ((v << (64 - PACK_BITS)) as i64 >> (64 - PACK_BITS)) as i32
}

impl CellPos {
    #[inline]
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn from_array(arr: [i32; 3]) -> Self {
        Self { x: arr[0], y: arr[1], z: arr[2] }
    }

    /// Ключ чанка, содержащего эту ячейку
    #[inline]
    pub fn chunk_key(&self, chunk_size: i32) -> ChunkKey {
        ChunkKey {
            x: self.x.div_euclid(chunk_size),
            y: self.y.div_euclid(chunk_size),
            z: self.z.div_euclid(chunk_size),
        }
    }

    /// Канонический 64-битный ключ: 21 бит со знаком на ось
    #[inline]
    pub fn packed(&self) -> u64 {
        debug_assert!(self.x.unsigned_abs() < (1u32 << (PACK_BITS - 1)));
        debug_assert!(self.y.unsigned_abs() < (1u32 << (PACK_BITS - 1)));
        debug_assert!(self.z.unsigned_abs() < (1u32 << (PACK_BITS - 1)));
        ((self.x as u64 & PACK_MASK) << (2 * PACK_BITS))
            | ((self.y as u64 & PACK_MASK) << PACK_BITS)
            | (self.z as u64 & PACK_MASK)
    }

    #[inline]
    pub fn from_packed(key: u64) -> Self {
        Self {
            x: sign_extend_21((key >> (2 * PACK_BITS)) & PACK_MASK),
            y: sign_extend_21((key >> PACK_BITS) & PACK_MASK),
            z: sign_extend_21(key & PACK_MASK),
        }
    }

    /// Разбор строкового ключа вида "x,y,z" (импорт из внешних батчей).
    /// Кривой ключ не валит весь батч: возвращаем None, вызывающий пропускает запись.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split(',');
        let x = parts.next()?.trim().parse().ok()?;
        let y = parts.next()?.trim().parse().ok()?;
        let z = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { x, y, z })
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_roundtrip() {
        let positions = [
            CellPos::new(0, 0, 0),
            CellPos::new(1, 2, 3),
            CellPos::new(-1, -64, 319),
            CellPos::new(-100_000, 100_000, -54321),
        ];
        for pos in positions {
            assert_eq!(CellPos::from_packed(pos.packed()), pos);
        }
    }

    #[test]
    fn test_chunk_key_negative_coords() {
        // div_euclid: -1 попадает в чанк -1, а не в 0
        assert_eq!(CellPos::new(-1, 0, -16).chunk_key(16), ChunkKey::new(-1, 0, -1));
        assert_eq!(CellPos::new(-17, 5, 15).chunk_key(16), ChunkKey::new(-2, 0, 0));
        assert_eq!(CellPos::new(31, 16, 0).chunk_key(16), ChunkKey::new(1, 1, 0));
    }

    #[test]
    fn test_parse() {
        assert_eq!(CellPos::parse("1,2,3"), Some(CellPos::new(1, 2, 3)));
        assert_eq!(CellPos::parse(" -4, 0 , 7 "), Some(CellPos::new(-4, 0, 7)));
        assert_eq!(CellPos::parse("1,2"), None);
        assert_eq!(CellPos::parse("1,2,3,4"), None);
        assert_eq!(CellPos::parse("a,b,c"), None);
        assert_eq!(CellPos::parse(""), None);
    }

    #[test]
    fn test_display_matches_parse() {
        let pos = CellPos::new(-7, 12, 0);
        assert_eq!(CellPos::parse(&pos.to_string()), Some(pos));
    }
}
