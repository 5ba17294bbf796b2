//! Static configuration mechanism for the kernel
//!
//! A system is described by a `const` [`CfgBuilder`] value. [`build!`]
//! finalizes it at compile time, sizes the kernel data structures from it, and
//! attaches the result to a system type by implementing [`KernelCfg1`].
//! Configuration mistakes are reported by panicking during constant
//! evaluation, i.e., as compile errors.
//!
//! ```
//! use osek_kernel::cfg::{CfgBuilder, TaskDefiner};
//! use osek_core::ErrorChecking;
//!
//! const CFG: CfgBuilder = CfgBuilder::new()
//!     .error_checking(ErrorChecking::Extended)
//!     .num_priority_levels(16)
//!     .task(TaskDefiner::new().priority(5).max_activations(3))
//!     .task(TaskDefiner::new().priority(3).extended(true));
//!
//! const FINAL: CfgBuilder = CFG.finalize();
//! assert_eq!(FINAL.num_tasks(), 2);
//! assert_eq!(FINAL.ready_queue_capacity(), 4);
//! ```
//!
//! [`build!`]: crate::build
//! [`KernelCfg1`]: crate::KernelCfg1
use osek_core::{ErrorChecking, HookSwitch, PriorityOrder};

use crate::utils::WORD_LEN;

/// The maximum number of tasks a system can define.
pub const MAX_TASKS: usize = 256;

/// The maximum number of priority levels supported by the ready queue.
pub const MAX_PRIORITY_LEVELS: usize = WORD_LEN * WORD_LEN;

/// Attach a static configuration to a system type by implementing
/// [`KernelCfg1`].
///
/// The first argument is the system type, which must also implement
/// [`Port`] and [`KernelHooks`] to be usable as a kernel trait type. The
/// second argument is a `const` [`CfgBuilder`] expression.
///
/// [`KernelCfg1`]: crate::KernelCfg1
/// [`Port`]: crate::Port
/// [`KernelHooks`]: crate::KernelHooks
#[macro_export]
macro_rules! build {
    ($Traits:ty, $cfg:expr) => {
        // Every path is fully qualified so that nothing here shadows the names
        // used by `$cfg` and `$Traits`
        const _: () = {
            const __CFG: $crate::cfg::CfgBuilder = $cfg.finalize();
            const __NUM_TASKS: usize = __CFG.num_tasks();
            const __NUM_LEVELS: usize = __CFG.priority_levels();
            const __CAPACITY: usize = __CFG.ready_queue_capacity();

            const __TASK_ATTR_POOL: [$crate::cfg::TaskAttr; __NUM_TASKS] = __CFG.task_attrs();
            const __READY_QUEUE_LAYOUT: [$crate::cfg::LevelLayout; __NUM_LEVELS] =
                __CFG.level_layout();

            // Task ready queue
            type __TaskReadyBitmap = <$crate::utils::Conditional<
                $crate::utils::OneLevelPrioBitmap,
                $crate::utils::TwoLevelPrioBitmap<
                    { (__NUM_LEVELS + $crate::utils::WORD_LEN - 1) / $crate::utils::WORD_LEN },
                >,
                { __NUM_LEVELS <= $crate::utils::WORD_LEN },
            > as $crate::utils::TypeFn>::Output;

            // Safety: We are `build!`, so it's okay to `impl` this
            unsafe impl $crate::KernelCfg1 for $Traits {
                const ERROR_CHECKING: $crate::ErrorChecking = __CFG.error_checking_value();
                const ERROR_HOOK: $crate::HookSwitch = __CFG.error_hook_value();
                const TASK_ATTR: &'static [$crate::cfg::TaskAttr] = &__TASK_ATTR_POOL;
                const READY_QUEUE_LAYOUT: &'static [$crate::cfg::LevelLayout] =
                    &__READY_QUEUE_LAYOUT;
                type TaskCbPool = [$crate::TaskCb; __NUM_TASKS];
                type TaskReadyQueue =
                    $crate::readyqueue::BitmapQueue<__TaskReadyBitmap, __NUM_LEVELS, __CAPACITY>;
            }
        };
    };
}

bitflags::bitflags! {
    /// Boolean properties of a task.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TaskFlags: u8 {
        /// The task is an extended task, i.e., it may wait for events. An
        /// extended task can have at most one outstanding activation.
        const EXTENDED = 1 << 0;
        /// A more urgent task becoming ready takes the processor away from
        /// this task immediately. Otherwise, the task only yields at
        /// rescheduling points (`Schedule`, termination, waiting).
        const PREEMPTIBLE = 1 << 1;
        /// The task is activated by `StartOS`.
        const AUTOSTART = 1 << 2;
    }
}

/// The static properties of a task (the task descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskAttr {
    /// The priority as written in the configuration.
    pub priority: usize,
    /// The ready queue level derived from `priority`. Level `0` is the most
    /// urgent one regardless of [`PriorityOrder`].
    pub level: usize,
    /// The maximum number of outstanding activations (≥ 1).
    pub max_activations: u8,
    pub flags: TaskFlags,
}

impl TaskAttr {
    #[inline]
    pub const fn is_extended(&self) -> bool {
        self.flags.contains(TaskFlags::EXTENDED)
    }

    #[inline]
    pub const fn is_preemptible(&self) -> bool {
        self.flags.contains(TaskFlags::PREEMPTIBLE)
    }

    #[inline]
    pub const fn is_autostart(&self) -> bool {
        self.flags.contains(TaskFlags::AUTOSTART)
    }
}

/// The region of the ready queue's slot array reserved for one priority
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelLayout {
    /// The index of the first slot.
    pub base: usize,
    /// The number of slots. This is the sum of `max_activations` of the tasks
    /// at this level, which bounds the number of entries the level can ever
    /// hold.
    pub capacity: usize,
}

impl LevelLayout {
    const EMPTY: Self = Self {
        base: 0,
        capacity: 0,
    };
}

/// The definer (static builder) for a task.
#[must_use = "must be passed to `CfgBuilder::task` to complete registration"]
#[derive(Debug, Clone, Copy)]
pub struct TaskDefiner {
    priority: Option<usize>,
    max_activations: u8,
    flags: TaskFlags,
}

impl TaskDefiner {
    /// Construct a `TaskDefiner` for a basic, preemptible task with one
    /// permitted activation.
    pub const fn new() -> Self {
        Self {
            priority: None,
            max_activations: 1,
            flags: TaskFlags::PREEMPTIBLE,
        }
    }

    /// \[**Required**\] Specify the task's priority.
    pub const fn priority(self, priority: usize) -> Self {
        Self {
            priority: Some(priority),
            ..self
        }
    }

    /// Specify the maximum number of outstanding activations. Defaults to `1`
    /// when unspecified. Must be `1` for extended tasks.
    pub const fn max_activations(self, max_activations: u8) -> Self {
        Self {
            max_activations,
            ..self
        }
    }

    /// Specify whether the task is an extended task. Defaults to `false`.
    pub const fn extended(self, extended: bool) -> Self {
        self.with_flag(TaskFlags::EXTENDED, extended)
    }

    /// Specify whether the task is preemptible. Defaults to `true`.
    pub const fn preemptible(self, preemptible: bool) -> Self {
        self.with_flag(TaskFlags::PREEMPTIBLE, preemptible)
    }

    /// Specify whether the task is activated by `StartOS`. Defaults to
    /// `false`.
    pub const fn autostart(self, autostart: bool) -> Self {
        self.with_flag(TaskFlags::AUTOSTART, autostart)
    }

    const fn with_flag(self, flag: TaskFlags, value: bool) -> Self {
        let flags = if value {
            self.flags.union(flag)
        } else {
            self.flags.difference(flag)
        };
        Self { flags, ..self }
    }
}

impl Default for TaskDefiner {
    fn default() -> Self {
        Self::new()
    }
}

/// A kernel configuration being constructed.
///
/// Every method is a `const fn` consuming and returning the builder, so a
/// whole configuration can be written as one `const` expression.
#[derive(Clone, Copy)]
pub struct CfgBuilder {
    error_checking: ErrorChecking,
    error_hook: HookSwitch,
    priority_order: PriorityOrder,
    num_priority_levels: usize,
    tasks: [TaskAttr; MAX_TASKS],
    num_tasks: usize,
    finalized: bool,
}

impl CfgBuilder {
    const EMPTY_TASK: TaskAttr = TaskAttr {
        priority: 0,
        level: 0,
        max_activations: 0,
        flags: TaskFlags::empty(),
    };

    /// Construct a `CfgBuilder` with extended error checking, the error hook
    /// enabled, [`PriorityOrder::LowerIsMoreUrgent`], and 16 priority levels.
    pub const fn new() -> Self {
        Self {
            error_checking: ErrorChecking::Extended,
            error_hook: HookSwitch::Enabled,
            priority_order: PriorityOrder::LowerIsMoreUrgent,
            num_priority_levels: 16,
            tasks: [Self::EMPTY_TASK; MAX_TASKS],
            num_tasks: 0,
            finalized: false,
        }
    }

    pub const fn error_checking(self, error_checking: ErrorChecking) -> Self {
        self.assert_not_finalized();
        Self {
            error_checking,
            ..self
        }
    }

    pub const fn error_hook(self, error_hook: HookSwitch) -> Self {
        self.assert_not_finalized();
        Self { error_hook, ..self }
    }

    pub const fn priority_order(self, priority_order: PriorityOrder) -> Self {
        self.assert_not_finalized();
        Self {
            priority_order,
            ..self
        }
    }

    /// Specify the number of priority levels. Task priorities must be in
    /// range `0..num_priority_levels`.
    pub const fn num_priority_levels(self, num_priority_levels: usize) -> Self {
        self.assert_not_finalized();
        if num_priority_levels == 0 {
            panic!("`num_priority_levels` must be greater than zero");
        } else if num_priority_levels > MAX_PRIORITY_LEVELS {
            panic!("`num_priority_levels` must be less than or equal to `MAX_PRIORITY_LEVELS`");
        }
        Self {
            num_priority_levels,
            ..self
        }
    }

    /// Define a task. Tasks are assigned identifiers `0, 1, 2, ...` in the
    /// order of definition.
    pub const fn task(mut self, definer: TaskDefiner) -> Self {
        self.assert_not_finalized();

        let priority = match definer.priority {
            Some(x) => x,
            None => panic!("`priority` must be specified"),
        };

        if definer.max_activations == 0 {
            panic!("`max_activations` must be greater than zero");
        }

        if definer.flags.contains(TaskFlags::EXTENDED) && definer.max_activations != 1 {
            panic!("an extended task must have `max_activations` equal to one");
        }

        if self.num_tasks >= MAX_TASKS {
            panic!("too many tasks");
        }

        self.tasks[self.num_tasks] = TaskAttr {
            priority,
            // Calculated by `finalize`
            level: 0,
            max_activations: definer.max_activations,
            flags: definer.flags,
        };
        self.num_tasks += 1;
        self
    }

    /// Validate the configuration and calculate derived values. Called by
    /// [`build!`](crate::build).
    pub const fn finalize(mut self) -> Self {
        if self.finalized {
            return self;
        }

        let mut i = 0;
        while i < self.num_tasks {
            let priority = self.tasks[i].priority;
            if priority >= self.num_priority_levels {
                panic!("task's `priority` must be less than `num_priority_levels`");
            }

            self.tasks[i].level = match self.priority_order {
                PriorityOrder::LowerIsMoreUrgent => priority,
                PriorityOrder::HigherIsMoreUrgent => self.num_priority_levels - 1 - priority,
            };
            i += 1;
        }

        self.finalized = true;
        self
    }

    const fn assert_not_finalized(&self) {
        if self.finalized {
            panic!("the configuration is already finalized");
        }
    }

    const fn assert_finalized(&self) {
        if !self.finalized {
            panic!("call `finalize` first");
        }
    }

    pub const fn num_tasks(&self) -> usize {
        self.num_tasks
    }

    /// Get the number of priority levels.
    pub const fn priority_levels(&self) -> usize {
        self.num_priority_levels
    }

    #[doc(hidden)]
    pub const fn error_checking_value(&self) -> ErrorChecking {
        self.error_checking
    }

    #[doc(hidden)]
    pub const fn error_hook_value(&self) -> HookSwitch {
        self.error_hook
    }

    /// Get the total number of ready queue slots, i.e., the sum of
    /// `max_activations` of all tasks.
    pub const fn ready_queue_capacity(&self) -> usize {
        let mut capacity = 0;
        let mut i = 0;
        while i < self.num_tasks {
            capacity += self.tasks[i].max_activations as usize;
            i += 1;
        }
        capacity
    }

    /// Get the descriptors of all defined tasks. `LEN` must be equal to
    /// [`Self::num_tasks`].
    #[doc(hidden)]
    pub const fn task_attrs<const LEN: usize>(&self) -> [TaskAttr; LEN] {
        self.assert_finalized();
        if LEN != self.num_tasks {
            panic!("`LEN` must be equal to `num_tasks()`");
        }

        let mut attrs = [Self::EMPTY_TASK; LEN];
        let mut i = 0;
        while i < LEN {
            attrs[i] = self.tasks[i];
            i += 1;
        }
        attrs
    }

    /// Partition the ready queue's slot array among priority levels. `LEN`
    /// must be equal to [`Self::priority_levels`].
    #[doc(hidden)]
    pub const fn level_layout<const LEN: usize>(&self) -> [LevelLayout; LEN] {
        self.assert_finalized();
        if LEN != self.num_priority_levels {
            panic!("`LEN` must be equal to `priority_levels()`");
        }

        let mut layout = [LevelLayout::EMPTY; LEN];

        let mut i = 0;
        while i < self.num_tasks {
            let task = &self.tasks[i];
            layout[task.level].capacity += task.max_activations as usize;
            i += 1;
        }

        let mut base = 0;
        let mut level = 0;
        while level < LEN {
            layout[level].base = base;
            base += layout[level].capacity;
            level += 1;
        }

        layout
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}
