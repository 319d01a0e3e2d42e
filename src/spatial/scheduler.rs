// ============================================
// Update Scheduler - Admission control батчей
// ============================================
// Rate-лимитер и очередь отсрочки перед SpatialIndex. Нефорсированным
// путям разрешено дропать и откладывать ради стабильности кадра;
// force обходит все троттлы и применяется синхронно.
//
// Отложенный повтор (коалесценция мелких правок) - это явная запись
// PendingRetry, разгребаемая tick() из кадрового цикла, а не
// рекурсивный таймер.

use std::time::Instant;

use crate::core::config::EditorConfig;
use crate::visibility::camera::{CameraView, MotionTracker};
use super::batch::{UpdateBatch, UpdateOptions};
use super::index::{ApplyStatus, SpatialIndex, UpdateResult};

/// Причина молчаливого дропа батча
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Стрим выключен на время разрушительной операции
    Disabled,
    /// Крупный нефорсированный батч: фоновая подсказка, дроп по размеру
    TooLarge,
    /// Окно rate-лимита (в т.ч. документированный разрыв 11..=100 записей)
    Throttled,
    /// Камера в движении, результат устареет за миллисекунды
    CameraMoving,
}

/// Исход вызова update()
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Батч применён (возможно, отфильтрованный по frustum)
    Applied(UpdateResult),
    /// Пустой батч
    NoOp,
    /// Режим DEFERRED: накоплен в pending-буфере
    Deferred,
    /// Слит в отложенный повтор rate-лимитера
    Coalesced,
    /// skip_if_busy: индекс занят
    SkippedBusy,
    Dropped(DropReason),
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Отложенный повтор мелких правок
struct PendingRetry {
    batch: UpdateBatch,
    due: Instant,
}

/// Планировщик обновлений поверх SpatialIndex
pub struct UpdateScheduler {
    index: SpatialIndex,
    config: EditorConfig,

    /// DISABLED: всё дропается молча (разрушительные операции)
    disabled: bool,
    /// DEFERRED: нефорсированное копится в pending
    deferred: bool,
    pending: UpdateBatch,

    last_applied: Option<Instant>,
    retry: Option<PendingRetry>,
    /// До этого момента новый отложенный повтор не планируется
    retry_cooldown_until: Option<Instant>,

    motion: Option<Box<dyn MotionTracker>>,
}

impl UpdateScheduler {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            index: SpatialIndex::new(&config),
            config,
            disabled: false,
            deferred: false,
            pending: UpdateBatch::new(),
            last_applied: None,
            retry: None,
            retry_cooldown_until: None,
            motion: None,
        }
    }

    /// Инжекция внешнего трекера движения камеры
    pub fn set_motion_tracker(&mut self, tracker: Box<dyn MotionTracker>) {
        self.motion = Some(tracker);
    }

    #[inline]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[inline]
    pub fn index_mut(&mut self) -> &mut SpatialIndex {
        &mut self.index
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Сколько записей накоплено в pending-буфере
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn has_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Включить/выключить DISABLED. При включении pending и отложенный
    /// повтор сбрасываются: частичным записям нечего догонять после
    /// разрушительной операции.
    pub fn set_disable_updates(&mut self, disabled: bool) {
        self.disabled = disabled;
        if disabled {
            self.pending = UpdateBatch::new();
            self.retry = None;
        }
    }

    /// Включить/выключить DEFERRED. Выключение автоматически
    /// сливает pending-буфер одним форсированным применением.
    pub fn set_defer_updates(&mut self, deferred: bool) {
        self.set_defer_updates_at(deferred, Instant::now())
    }

    pub fn set_defer_updates_at(&mut self, deferred: bool, now: Instant) {
        let was = self.deferred;
        self.deferred = deferred;
        if was && !deferred {
            self.apply_deferred_updates_at(now);
        }
    }

    /// Слить pending-буфер одним форсированным вызовом в индекс
    pub fn apply_deferred_updates(&mut self) -> UpdateOutcome {
        self.apply_deferred_updates_at(Instant::now())
    }

    pub fn apply_deferred_updates_at(&mut self, now: Instant) -> UpdateOutcome {
        if self.pending.is_empty() {
            return UpdateOutcome::NoOp;
        }
        let batch = std::mem::take(&mut self.pending);
        log::debug!("Слив pending-буфера: {} записей", batch.len());
        self.apply_unfiltered(batch, &UpdateOptions::forced(), now)
    }

    /// Точка входа для инструментов редактирования
    pub fn update(
        &mut self,
        batch: UpdateBatch,
        options: &UpdateOptions,
        camera: Option<&CameraView>,
    ) -> UpdateOutcome {
        self.update_at(batch, options, camera, Instant::now())
    }

    /// Политика допуска, в порядке приоритета (см. DropReason)
    pub fn update_at(
        &mut self,
        batch: UpdateBatch,
        options: &UpdateOptions,
        camera: Option<&CameraView>,
        now: Instant,
    ) -> UpdateOutcome {
        // 1. DISABLED: дроп молча, даже форсированных
        if self.disabled {
            return UpdateOutcome::Dropped(DropReason::Disabled);
        }

        // 2. Пустой батч
        if batch.is_empty() {
            return UpdateOutcome::NoOp;
        }

        // 3. DEFERRED: копим, в индекс не ходим
        if self.deferred && !options.force {
            self.pending.merge(batch);
            return UpdateOutcome::Deferred;
        }

        let total = batch.len();

        // 4. Крупный нефорсированный батч: rate-лимит по размеру, не по времени
        if !options.force && total > self.config.large_batch {
            log::debug!("Дроп крупного нефорсированного батча: {} записей", total);
            return UpdateOutcome::Dropped(DropReason::TooLarge);
        }

        // 5. Окно rate-лимита
        if !options.force {
            if let Some(last) = self.last_applied {
                if now.duration_since(last) < self.config.rate_window() {
                    if total <= self.config.small_batch {
                        // Мелкие правки коалесцируются в один отложенный повтор
                        if let Some(retry) = &mut self.retry {
                            retry.batch.merge(batch);
                            return UpdateOutcome::Coalesced;
                        }
                        let cooled =
                            self.retry_cooldown_until.is_none_or(|until| now >= until);
                        if cooled {
                            self.retry = Some(PendingRetry {
                                batch,
                                due: now + self.config.rate_window(),
                            });
                            return UpdateOutcome::Coalesced;
                        }
                    }
                    // Батчи 11..=large_batch под троттлом дропаются молча:
                    // поведение исходника сохранено как документированное
                    return UpdateOutcome::Dropped(DropReason::Throttled);
                }
            }
        }

        // 6. Камера в движении: нефорсированное не считаем
        if !options.force {
            if let Some(motion) = &self.motion {
                if motion.is_moving() {
                    return UpdateOutcome::Dropped(DropReason::CameraMoving);
                }
            }
        }

        // 7. Применение
        if options.force || total > self.config.huge_batch {
            // Фильтровать такой объём дороже, чем применить целиком
            self.apply_unfiltered(batch, options, now)
        } else {
            self.apply_filtered(batch, options, camera, now)
        }
    }

    /// Разгрести созревший отложенный повтор. Вызывается кадровым циклом.
    pub fn tick(&mut self, camera: Option<&CameraView>) -> UpdateOutcome {
        self.tick_at(camera, Instant::now())
    }

    pub fn tick_at(&mut self, camera: Option<&CameraView>, now: Instant) -> UpdateOutcome {
        let retry = match self.retry.take() {
            Some(retry) if now >= retry.due => retry,
            Some(retry) => {
                self.retry = Some(retry);
                return UpdateOutcome::NoOp;
            }
            None => return UpdateOutcome::NoOp,
        };
        self.retry_cooldown_until = Some(now + self.config.rate_window());

        if self.disabled {
            return UpdateOutcome::Dropped(DropReason::Disabled);
        }
        if self.deferred {
            self.pending.merge(retry.batch);
            return UpdateOutcome::Deferred;
        }
        // Повтор пере-оценивает frustum-фильтрацию на актуальной камере
        self.apply_filtered(retry.batch, &UpdateOptions::default(), camera, now)
    }

    fn apply_unfiltered(
        &mut self,
        batch: UpdateBatch,
        options: &UpdateOptions,
        now: Instant,
    ) -> UpdateOutcome {
        match self.index.update(batch, options) {
            ApplyStatus::Applied(result) => {
                self.last_applied = Some(now);
                UpdateOutcome::Applied(result)
            }
            ApplyStatus::SkippedBusy => UpdateOutcome::SkippedBusy,
        }
    }

    fn apply_filtered(
        &mut self,
        mut batch: UpdateBatch,
        options: &UpdateOptions,
        camera: Option<&CameraView>,
        now: Instant,
    ) -> UpdateOutcome {
        // Камеры нет - кэш сбрасывается и батч идёт без фильтрации
        self.index
            .update_frustum_cache(camera, self.config.view_distance);
        if let Some(visible) = self.index.in_frustum() {
            batch.retain_chunks(visible, self.config.chunk_size);
            if batch.is_empty() {
                // Всё вне поля зрения: индекс не трогаем
                return UpdateOutcome::Applied(UpdateResult::default());
            }
        }
        self.apply_unfiltered(batch, options, now)
    }
}
