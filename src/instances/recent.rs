// ============================================
// Recent Placements - Исключения "только что размещён"
// ============================================
// Свежеразмещённый объект обязан остаться видимым до следующего
// цикла recompute, иначе он мигает из-за устаревшего кэша дистанции
// камеры. Короткий TTL, записи чистятся лениво при recompute.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::group::InstanceId;

/// Набор пар (группа, инстанс) с коротким TTL, форсирующих видимость
pub struct RecentPlacements {
    /// группа -> (инстанс -> дедлайн)
    entries: HashMap<String, HashMap<InstanceId, Instant>>,
    ttl: Duration,
}

impl RecentPlacements {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    pub fn insert(&mut self, group: &str, id: InstanceId) {
        self.insert_at(group, id, Instant::now())
    }

    pub fn insert_at(&mut self, group: &str, id: InstanceId, now: Instant) {
        self.entries
            .entry(group.to_string())
            .or_default()
            .insert(id, now + self.ttl);
    }

    /// Инстанс ещё под защитой от отсечения?
    pub fn contains_at(&self, group: &str, id: InstanceId, now: Instant) -> bool {
        self.entries
            .get(group)
            .and_then(|ids| ids.get(&id))
            .is_some_and(|deadline| now < *deadline)
    }

    /// Убрать протухшие записи
    pub fn purge_at(&mut self, now: Instant) {
        for ids in self.entries.values_mut() {
            ids.retain(|_, deadline| now < *deadline);
        }
        self.entries.retain(|_, ids| !ids.is_empty());
    }

    /// Снять защиту с инстанса (например, при удалении)
    pub fn forget(&mut self, group: &str, id: InstanceId) {
        if let Some(ids) = self.entries.get_mut(group) {
            ids.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|ids| ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
