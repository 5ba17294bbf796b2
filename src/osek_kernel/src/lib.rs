//! The task management core of a statically configured OSEK/VDX-style kernel.
//!
//! A system is assembled from three parts:
//!
//!  - A *port* ([`Port`]) that masks interrupts, reports the calling context,
//!    and switches the processor between tasks.
//!  - A *configuration* ([`KernelCfg1`]), generated from a `const`
//!    [`CfgBuilder`](cfg::CfgBuilder) by [`build!`].
//!  - *Hooks* ([`KernelHooks`]) called by the kernel, such as the error hook.
//!
//! All three are implemented on one *kernel trait type*, which parameterizes
//! [`Kernel`]. A `Kernel` value owns all mutable kernel state; system services
//! are its methods.
//!
//! # Kernel state
//!
//! All kernel state is stored in [`CpuLockCell`](klock::CpuLockCell)s, which
//! can only be accessed while holding a CPU Lock guard. Services validate their
//! arguments first, perform the state transition inside one critical section,
//! and perform the context switch (if any) after leaving it.
#![cfg_attr(not(test), no_std)] // Link `std` only when building a test (`cfg(test)`)
#![deny(unsafe_op_in_unsafe_fn)]
use core::fmt;

use osek_core::{CallingContext, ErrorInfo, TaskId};

pub use osek_core::{ErrorChecking, HookSwitch, PriorityOrder};

pub mod utils;

pub mod cfg;
mod error;
mod event;
mod interrupt;
mod klock;
mod task;

pub use self::{
    cfg::{LevelLayout, TaskAttr, TaskFlags},
    interrupt::PortToKernel,
    task::{readyqueue, TaskCb},
};

use crate::utils::Init;

/// Implemented by a port. The kernel calls these methods.
///
/// # Safety
///
/// The implementation must uphold the documented contracts. In particular,
/// `enter_cpu_lock` must really mask every interrupt handler that may call a
/// kernel service, or the kernel state would be corrupted.
pub unsafe trait Port: Sized + 'static {
    /// Disable all kernel-managed interrupts (this state is called *CPU Lock*).
    ///
    /// Precondition: CPU Lock inactive
    unsafe fn enter_cpu_lock(&self);

    /// Re-enable kernel-managed interrupts previously disabled by
    /// `enter_cpu_lock`, thus deactivating the CPU Lock state.
    ///
    /// Precondition: CPU Lock active
    unsafe fn leave_cpu_lock(&self);

    /// Return a flag indicating whether a CPU Lock state is active.
    fn is_cpu_lock_active(&self) -> bool;

    /// Get the context the processor is currently executing in. Never returns
    /// [`CallingContext::ErrorHook`]; the kernel tracks that itself.
    fn calling_context(&self) -> CallingContext;

    /// Transfer the processor from `from` to `to`. `None` means the idle
    /// context. `from` has already been transitioned to Ready, Waiting, or
    /// Suspended, and `to` (if any) to Running. `from == to` means the task
    /// restarts with a fresh activation.
    ///
    /// Precondition: CPU Lock inactive, task context
    fn dispatch(&self, from: Option<TaskId>, to: Option<TaskId>);
}

/// Associates static kernel configuration with a kernel trait type.
/// Implemented by [`build!`].
///
/// # Safety
///
/// This is only intended to be implemented by `build!`. The ready queue type
/// must be sized according to `TASK_ATTR` and `READY_QUEUE_LAYOUT`.
pub unsafe trait KernelCfg1: Sized + 'static {
    const ERROR_CHECKING: ErrorChecking;

    const ERROR_HOOK: HookSwitch;

    /// The task descriptors, indexed by task identifiers.
    const TASK_ATTR: &'static [TaskAttr];

    /// The partition of the ready queue's slot array, indexed by level.
    const READY_QUEUE_LAYOUT: &'static [LevelLayout];

    #[doc(hidden)]
    type TaskCbPool: Init + AsRef<[TaskCb]> + 'static;

    #[doc(hidden)]
    type TaskReadyQueue: readyqueue::Queue<Self>;
}

/// Application-provided callbacks.
pub trait KernelHooks: Sized + 'static {
    /// Called when a system service fails, provided that the error hook is
    /// enabled by the configuration and is not running already.
    ///
    /// Kernel services may be called from here. [`Kernel::calling_context`]
    /// returns [`CallingContext::ErrorHook`] while this method is running.
    #[allow(unused_variables)]
    fn error_hook(kernel: &Kernel<Self>, info: &ErrorInfo)
    where
        Self: KernelTraits,
    {
    }
}

/// Represents a complete kernel trait type.
pub trait KernelTraits: Port + KernelCfg1 + KernelHooks {}

impl<T: Port + KernelCfg1 + KernelHooks> KernelTraits for T {}

/// A kernel instance.
///
/// Constructed by [`Kernel::new`] with every task Suspended, and started by
/// [`Kernel::start_os`].
pub struct Kernel<Traits: KernelTraits> {
    traits: Traits,
    state: State<Traits>,
}

/// Global kernel state.
pub(crate) struct State<Traits: KernelTraits> {
    cpu_lock: klock::CpuLockState,

    task_cb_pool: Traits::TaskCbPool,

    task_ready_queue: Traits::TaskReadyQueue,

    /// The task that owns the processor. When `Some(task)`, `task` is in the
    /// Running state.
    running_task: klock::CpuLockCell<Option<TaskId>>,

    /// The nesting level of category-2 interrupt handlers.
    interrupt_nesting: klock::CpuLockCell<usize>,

    started: klock::CpuLockCell<bool>,

    error_hook: error::ErrorHookState,
}

impl<Traits: KernelTraits> Init for State<Traits> {
    const INIT: Self = Self {
        cpu_lock: Init::INIT,
        task_cb_pool: Init::INIT,
        task_ready_queue: Init::INIT,
        running_task: Init::INIT,
        interrupt_nesting: Init::INIT,
        started: Init::INIT,
        error_hook: Init::INIT,
    };
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Construct a kernel instance. All tasks start in the Suspended state.
    pub fn new(traits: Traits) -> Self {
        Self {
            traits,
            state: Init::INIT,
        }
    }

    /// Get the kernel trait type value, through which the port and the
    /// application state are reachable.
    #[inline]
    pub fn traits(&self) -> &Traits {
        &self.traits
    }

    /// Get the number of configured tasks. The valid task identifiers are
    /// `0..num_tasks()`.
    #[inline]
    pub fn num_tasks(&self) -> usize {
        Traits::TASK_ATTR.len()
    }

    /// Get the descriptor of the specified task. Returns `None` if `task` is
    /// out of range.
    #[inline]
    pub fn task_attr(&self, task: TaskId) -> Option<&'static TaskAttr> {
        Traits::TASK_ATTR.get(task.get())
    }

    /// Get the context the caller is running in (`GetCallingContext`).
    ///
    /// Interrupt handlers that preempt the error hook report their own
    /// context.
    pub fn calling_context(&self) -> CallingContext {
        let context = self.traits.calling_context();
        if self.state.error_hook.is_running() {
            let lock = klock::lock_cpu(self);
            let nesting = self.state.interrupt_nesting.get(&lock);
            if self.state.error_hook.is_origin(context, nesting) {
                return CallingContext::ErrorHook;
            }
        }
        context
    }
}

impl<Traits: KernelTraits> fmt::Debug for Kernel<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lock = klock::lock_cpu(self);
        let state = &self.state;
        let result = f
            .debug_struct("Kernel")
            .field("running_task", &state.running_task.debug_fmt(&lock))
            .field("interrupt_nesting", &state.interrupt_nesting.debug_fmt(&lock))
            .field("started", &state.started.debug_fmt(&lock))
            .field(
                "tasks",
                &task::TaskCbPoolDebug {
                    kernel: self,
                    lock: &lock,
                },
            )
            .field("task_ready_queue", &state.task_ready_queue)
            .finish();
        result
    }
}
