//! Task ready queue implementation (internal use only).
//!
//! **This module is exempt from the API stability guarantee.**
use core::fmt;

use osek_core::TaskId;

use crate::{
    klock::{CpuLockCell, CpuLockToken},
    utils::{Init, PrioBitmap},
    KernelTraits,
};

/// Represents a task ready queue, which holds one entry per pending run of
/// every Ready task, sorted by level.
///
/// This trait is not intended to be implemented on custom types.
pub trait Queue<Traits>: Init + fmt::Debug + 'static + private::Sealed {
    /// Insert an entry for `task` at the back of its level.
    ///
    /// Panics (in debug builds) if the level's capacity is exhausted, which
    /// means the activation-count bookkeeping is broken.
    fn push_back_task(&self, ctx: Ctx<'_>, task: TaskId)
    where
        Traits: KernelTraits;

    /// Choose the next task to schedule based on `prev_task_level`, the level
    /// of the running task. If there's no running task, `prev_task_level`
    /// should be `usize::MAX`, in which case this method will return
    /// `SwitchTo(_)`.
    ///
    /// The head entry is only taken if its level is *strictly* more urgent
    /// (numerically lower) than `prev_task_level`. If this method returns
    /// `SwitchTo(Some(task))`, the entry is removed from the queue.
    ///
    /// | Running task? | `prev_task_level` | Ready task outranks it? |       Returns       |
    /// | ------------- | ----------------- | ----------------------- | ------------------- |
    /// |      no       |   `usize::MAX`    |     (queue empty)       |  `SwitchTo(None)`   |
    /// |      no       |   `usize::MAX`    |     (queue nonempty)    | `SwitchTo(Some(_))` |
    /// |      yes      |   `< usize::MAX`  |           no            |       `Keep`        |
    /// |      yes      |   `< usize::MAX`  |           yes           | `SwitchTo(Some(_))` |
    fn pop_front_task(
        &self,
        ctx: Ctx<'_>,
        prev_task_level: usize,
    ) -> ScheduleDecision<TaskId>
    where
        Traits: KernelTraits;

    /// Count the entries of `task`.
    fn count_for(&self, ctx: Ctx<'_>, task: TaskId) -> usize
    where
        Traits: KernelTraits;

    /// Count all entries.
    fn len(&self, ctx: Ctx<'_>) -> usize
    where
        Traits: KernelTraits;
}

/// Implements [the sealed trait pattern], which prevents [`Queue`] against
/// downstream implementations.
///
/// [the sealed trait pattern]: https://rust-lang.github.io/api-guidelines/future-proofing.html
mod private {
    pub trait Sealed {}
}

/// The result type of [`Queue::pop_front_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision<T> {
    /// The kernel should not perform context switch and should continue to
    /// schedule the current task.
    Keep,
    /// The kernel should perform context switch to the specified task.
    SwitchTo(Option<T>),
}

/// The context type for [`Queue`].
pub struct Ctx<'a> {
    lock: &'a CpuLockToken,
}

impl<'a> Ctx<'a> {
    #[inline]
    pub(crate) fn new(lock: &'a CpuLockToken) -> Self {
        Self { lock }
    }
}

/// The ready queue implementation that stores the entries of each level in a
/// ring buffer carved out of one slot array, plus a bitmap of nonempty
/// levels.
///
/// The slot ranges are given by [`KernelCfg1::READY_QUEUE_LAYOUT`]. A level
/// never holds more entries than the sum of `max_activations` of its tasks,
/// so the rings never overflow.
///
/// [`KernelCfg1::READY_QUEUE_LAYOUT`]: crate::KernelCfg1::READY_QUEUE_LAYOUT
pub struct BitmapQueue<Bitmap, const LEVELS: usize, const CAPACITY: usize> {
    /// The bitmap of nonempty levels.
    ///
    /// Invariant: `(lens[i] != 0) == bitmap.get(i)`
    bitmap: CpuLockCell<Bitmap>,

    /// The position of each level's first entry, relative to the level's
    /// base slot.
    heads: [CpuLockCell<usize>; LEVELS],

    /// The number of entries at each level.
    lens: [CpuLockCell<usize>; LEVELS],

    slots: [CpuLockCell<TaskId>; CAPACITY],
}

impl<Bitmap: PrioBitmap, const LEVELS: usize, const CAPACITY: usize> Init
    for BitmapQueue<Bitmap, LEVELS, CAPACITY>
{
    const INIT: Self = Self {
        bitmap: Init::INIT,
        heads: Init::INIT,
        lens: Init::INIT,
        slots: Init::INIT,
    };
}

impl<Bitmap, const LEVELS: usize, const CAPACITY: usize> fmt::Debug
    for BitmapQueue<Bitmap, LEVELS, CAPACITY>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BitmapQueue")
            .field("levels", &LEVELS)
            .field("capacity", &CAPACITY)
            .finish_non_exhaustive()
    }
}

impl<Bitmap, const LEVELS: usize, const CAPACITY: usize> private::Sealed
    for BitmapQueue<Bitmap, LEVELS, CAPACITY>
{
}

impl<Traits, Bitmap: PrioBitmap, const LEVELS: usize, const CAPACITY: usize> Queue<Traits>
    for BitmapQueue<Bitmap, LEVELS, CAPACITY>
{
    fn push_back_task(&self, ctx: Ctx<'_>, task: TaskId)
    where
        Traits: KernelTraits,
    {
        let lock = ctx.lock;
        let level = Traits::TASK_ATTR[task.get()].level;
        let layout = Traits::READY_QUEUE_LAYOUT[level];

        let len = self.lens[level].get(lock);
        debug_assert!(len < layout.capacity, "ready queue level {level} is full");

        let head = self.heads[level].get(lock);
        let slot = layout.base + (head + len) % layout.capacity;
        self.slots[slot].set(lock, task);
        self.lens[level].set(lock, len + 1);

        self.bitmap.modify(lock, |bitmap| bitmap.set(level));
    }

    fn pop_front_task(
        &self,
        ctx: Ctx<'_>,
        prev_task_level: usize,
    ) -> ScheduleDecision<TaskId>
    where
        Traits: KernelTraits,
    {
        let lock = ctx.lock;

        // The level of the most urgent Ready task, or `usize::MAX - 1` if there
        // are none. `usize::MAX` means "no running task"; the difference makes
        // the comparison below yield `SwitchTo(None)` in that case.
        let next_level = self.bitmap.get(lock).find_set().unwrap_or(usize::MAX - 1);

        if prev_task_level <= next_level {
            ScheduleDecision::Keep
        } else if next_level < LEVELS {
            let layout = Traits::READY_QUEUE_LAYOUT[next_level];

            let head = self.heads[next_level].get(lock);
            let task = self.slots[layout.base + head].get(lock);
            self.heads[next_level].set(lock, (head + 1) % layout.capacity);

            let len = self.lens[next_level].get(lock) - 1;
            self.lens[next_level].set(lock, len);
            if len == 0 {
                self.bitmap.modify(lock, |bitmap| bitmap.clear(next_level));
            }

            ScheduleDecision::SwitchTo(Some(task))
        } else {
            ScheduleDecision::SwitchTo(None)
        }
    }

    fn count_for(&self, ctx: Ctx<'_>, task: TaskId) -> usize
    where
        Traits: KernelTraits,
    {
        let lock = ctx.lock;
        let level = Traits::TASK_ATTR[task.get()].level;
        let layout = Traits::READY_QUEUE_LAYOUT[level];
        let head = self.heads[level].get(lock);

        (0..self.lens[level].get(lock))
            .filter(|i| self.slots[layout.base + (head + i) % layout.capacity].get(lock) == task)
            .count()
    }

    fn len(&self, ctx: Ctx<'_>) -> usize
    where
        Traits: KernelTraits,
    {
        let lock = ctx.lock;
        self.lens.iter().map(|len| len.get(lock)).sum()
    }
}
