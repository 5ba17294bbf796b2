//! Tasks
use core::fmt;

use osek_core::{
    ActivateTaskError, ChainTaskError, EventMask, GetTaskStateError, ScheduleError, ServiceId,
    TaskId, TaskState, TerminateTaskError,
};

use crate::{
    cfg::TaskAttr,
    error::{self, ActivationLimitError, CallLevelError},
    klock::{self, CpuLockCell, CpuLockGuard, CpuLockToken},
    utils::Init,
    Kernel, KernelTraits,
};

#[doc(hidden)]
pub mod readyqueue;
use self::readyqueue::{Ctx, Queue as _, ScheduleDecision};

/// *Task control block* - the state data of a task.
///
/// Invariants (outside a critical section):
///
///  - `activations <= max_activations`, and `activations == 0` iff the task
///    is Suspended.
///  - The ready queue holds `activations - [st ∈ {Running, Waiting}]` entries
///    of the task.
///  - Only an extended task can be Waiting.
pub struct TaskCb {
    /// The task state.
    pub(super) st: CpuLockCell<TaskState>,

    /// The number of outstanding activations, including the one being
    /// executed.
    pub(super) activations: CpuLockCell<u8>,

    /// The pending events. Only meaningful for extended tasks.
    pub(super) events: CpuLockCell<EventMask>,

    /// The events the task is waiting for. Empty unless the task is Waiting.
    pub(super) wait_mask: CpuLockCell<EventMask>,
}

impl Init for TaskCb {
    const INIT: Self = Self {
        st: Init::INIT,
        activations: Init::INIT,
        events: Init::INIT,
        wait_mask: Init::INIT,
    };
}

/// Debug formatting proxy for the task control block pool.
pub(super) struct TaskCbPoolDebug<'a, Traits: KernelTraits> {
    pub(super) kernel: &'a Kernel<Traits>,
    pub(super) lock: &'a CpuLockToken,
}

impl<Traits: KernelTraits> fmt::Debug for TaskCbPoolDebug<'_, Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lock = self.lock;
        f.debug_list()
            .entries(self.kernel.state.task_cb_pool.as_ref().iter().map(|cb| {
                (
                    cb.st.get(lock),
                    cb.activations.get(lock),
                    cb.events.get(lock),
                )
            }))
            .finish()
    }
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Get the control block of `task`. Panics if `task` is out of range.
    #[inline]
    pub(super) fn task_cb(&self, task: TaskId) -> &TaskCb {
        self.state
            .task_cb_pool
            .as_ref()
            .get(task.get())
            .unwrap_or_else(|| error::bad_id())
    }

    /// Get the descriptor of `task`. Panics if `task` is out of range.
    #[inline]
    pub(super) fn expect_task_attr(&self, task: TaskId) -> &'static TaskAttr {
        Traits::TASK_ATTR
            .get(task.get())
            .unwrap_or_else(|| error::bad_id())
    }

    /// Start the kernel (`StartOS`): activate every task configured to
    /// autostart and dispatch the most urgent ready task.
    ///
    /// Tasks activated before this call are queued but not dispatched until
    /// now.
    pub fn start_os(&self) {
        debug_assert!(self.traits.calling_context().is_task());

        let lock = klock::lock_cpu(self);
        if self.state.started.replace(&lock, true) {
            debug_assert!(false, "`start_os` called twice");
            return;
        }

        for (i, attr) in Traits::TASK_ATTR.iter().enumerate() {
            if attr.is_autostart() {
                // Only fails if the application activated the task beforehand
                activate(&lock, TaskId::new(i)).ok();
            }
        }

        self.reschedule(lock);
    }

    /// Activate the specified task (`ActivateTask`).
    ///
    /// A Suspended task becomes Ready. Otherwise, the activation is queued if
    /// the task is a basic task whose activation limit permits it. When called
    /// at task level, the caller is preempted if the activated task is more
    /// urgent and the running task is preemptible.
    pub fn activate_task(&self, task: TaskId) -> Result<(), ActivateTaskError> {
        let result = self.activate_task_inner(task);
        self.report(
            result,
            ServiceId::ActivateTask,
            Some(task.get()),
            "task activation rejected",
        )
    }

    fn activate_task_inner(&self, task: TaskId) -> Result<(), ActivateTaskError> {
        error::validate_task_id::<Traits>(task)?;

        let lock = klock::lock_cpu(self);
        activate(&lock, task)?;
        drop(lock);

        self.check_preemption_at_task_level();
        Ok(())
    }

    /// Terminate the running task (`TerminateTask`).
    ///
    /// If the task has queued activations, it stays Ready and runs again
    /// later. The most urgent ready task is dispatched in any case.
    pub fn terminate_task(&self) -> Result<(), TerminateTaskError> {
        let result = self.terminate_task_inner();
        self.report(
            result,
            ServiceId::TerminateTask,
            None,
            "task termination rejected",
        )
    }

    fn terminate_task_inner(&self) -> Result<(), TerminateTaskError> {
        error::expect_task_context(self)?;

        let lock = klock::lock_cpu(self);
        let running_task = self
            .state
            .running_task
            .get(&lock)
            .ok_or(CallLevelError::CallLevel)?;

        terminate(&lock, running_task);
        self.switch_away(lock, running_task);
        Ok(())
    }

    /// Terminate the running task and activate the specified task in one
    /// step (`ChainTask`).
    ///
    /// Nothing is changed if the request fails. Chaining to the running task
    /// itself always succeeds and queues a fresh activation.
    pub fn chain_task(&self, task: TaskId) -> Result<(), ChainTaskError> {
        let result = self.chain_task_inner(task);
        self.report(
            result,
            ServiceId::ChainTask,
            Some(task.get()),
            "task chaining rejected",
        )
    }

    fn chain_task_inner(&self, task: TaskId) -> Result<(), ChainTaskError> {
        error::validate_task_id::<Traits>(task)?;
        error::expect_task_context(self)?;

        let lock = klock::lock_cpu(self);
        let running_task = self
            .state
            .running_task
            .get(&lock)
            .ok_or(CallLevelError::CallLevel)?;

        if task != running_task {
            check_activation(&lock, task)?;
        }

        terminate(&lock, running_task);

        // The target was checked above. If the target is the caller, the
        // termination has just released an activation slot.
        let result = activate(&lock, task);
        debug_assert!(result.is_ok());

        self.switch_away(lock, running_task);
        Ok(())
    }

    /// Yield the processor to a more urgent ready task, if any (`Schedule`).
    ///
    /// This is the rescheduling point for non-preemptible tasks.
    pub fn schedule(&self) -> Result<(), ScheduleError> {
        let result = self.schedule_inner();
        self.report(result, ServiceId::Schedule, None, "rescheduling rejected")
    }

    fn schedule_inner(&self) -> Result<(), ScheduleError> {
        error::expect_task_context(self)?;

        let lock = klock::lock_cpu(self);
        if self.state.started.get(&lock) {
            self.reschedule(lock);
        }
        Ok(())
    }

    /// Get the running task (`GetTaskID`). Returns `None` if no task is
    /// running.
    pub fn running_task(&self) -> Option<TaskId> {
        let lock = klock::lock_cpu(self);
        self.state.running_task.get(&lock)
    }

    /// Get the state of the specified task (`GetTaskState`).
    pub fn task_state(&self, task: TaskId) -> Result<TaskState, GetTaskStateError> {
        let result = self.task_state_inner(task);
        self.report(
            result,
            ServiceId::GetTaskState,
            Some(task.get()),
            "task state query rejected",
        )
    }

    fn task_state_inner(&self, task: TaskId) -> Result<TaskState, GetTaskStateError> {
        error::validate_task_id::<Traits>(task)?;
        let lock = klock::lock_cpu(self);
        Ok(self.task_cb(task).st.get(&lock))
    }

    /// Get the number of outstanding activations of the specified task.
    /// Returns `None` if `task` is out of range.
    pub fn activation_count(&self, task: TaskId) -> Option<u8> {
        self.task_attr(task)?;
        let lock = klock::lock_cpu(self);
        Some(self.task_cb(task).activations.get(&lock))
    }

    /// Get the number of ready queue entries of the specified task. Returns
    /// `None` if `task` is out of range.
    pub fn ready_queue_count_for(&self, task: TaskId) -> Option<usize> {
        self.task_attr(task)?;
        let lock = klock::lock_cpu(self);
        Some(
            self.state
                .task_ready_queue
                .count_for(Ctx::new(&lock), task),
        )
    }

    /// Get a flag indicating whether the ready queue holds an entry of the
    /// specified task.
    pub fn ready_queue_contains(&self, task: TaskId) -> bool {
        self.ready_queue_count_for(task).unwrap_or(0) != 0
    }

    /// Get the total number of ready queue entries.
    pub fn ready_queue_len(&self) -> usize {
        let lock = klock::lock_cpu(self);
        self.state.task_ready_queue.len(Ctx::new(&lock))
    }

    /// If the caller is at task level, the kernel is started, and the running
    /// task is preemptible (or there's none), switch to a more urgent ready
    /// task, if any.
    ///
    /// Precondition: CPU Lock inactive
    pub(super) fn check_preemption_at_task_level(&self) {
        if !self.calling_context().is_task() {
            return;
        }

        let lock = klock::lock_cpu(self);
        if !self.state.started.get(&lock) {
            return;
        }

        if let Some(running_task) = self.state.running_task.get(&lock) {
            if !Traits::TASK_ATTR[running_task.get()].is_preemptible() {
                return;
            }
        }

        self.reschedule(lock);
    }

    /// Switch to the most urgent ready task if it outranks the running task,
    /// releasing CPU Lock before dispatching.
    fn reschedule(&self, lock: CpuLockGuard<'_, Traits>) {
        let prev_task = self.state.running_task.get(&lock);
        if let Some(next_task) = choose_next_running_task(&lock) {
            drop(lock);
            if prev_task.is_some() || next_task.is_some() {
                self.traits.dispatch(prev_task, next_task);
            }
        }
    }

    /// Dispatch the most urgent ready task after `prev_task` stopped running
    /// (by terminating or waiting), releasing CPU Lock before dispatching.
    ///
    /// Precondition: There's no running task.
    pub(super) fn switch_away(&self, lock: CpuLockGuard<'_, Traits>, prev_task: TaskId) {
        debug_assert!(self.state.running_task.get(&lock).is_none());

        if !self.calling_context().is_task() {
            // Extended error checking is disabled and the caller is an
            // interrupt handler. The switch happens at the epilogue.
            return;
        }

        let next_task = choose_next_running_task(&lock).flatten();
        drop(lock);
        self.traits.dispatch(Some(prev_task), next_task);
    }
}

/// Check whether `task` can accept another activation.
fn check_activation<Traits: KernelTraits>(
    lock: &CpuLockGuard<'_, Traits>,
    task: TaskId,
) -> Result<(), ActivationLimitError> {
    let kernel = lock.kernel();
    let task_cb = kernel.task_cb(task);
    let attr = kernel.expect_task_attr(task);

    if task_cb.st.get(lock) == TaskState::Suspended {
        Ok(())
    } else if attr.is_extended() || task_cb.activations.get(lock) >= attr.max_activations {
        Err(ActivationLimitError::ActivationLimitExceeded)
    } else {
        Ok(())
    }
}

/// Activate `task`, adding an entry to the ready queue.
pub(super) fn activate<Traits: KernelTraits>(
    lock: &CpuLockGuard<'_, Traits>,
    task: TaskId,
) -> Result<(), ActivationLimitError> {
    check_activation(lock, task)?;

    let task_cb = lock.kernel().task_cb(task);
    let activations = task_cb.activations.get(lock);

    if activations == 0 {
        debug_assert_eq!(task_cb.st.get(lock), TaskState::Suspended);
        task_cb.activations.set(lock, 1);
        task_cb.events.set(lock, EventMask::empty());
        make_ready(lock, task);
    } else {
        // Queue another run without changing the state
        task_cb.activations.set(lock, activations + 1);
        lock.kernel()
            .state
            .task_ready_queue
            .push_back_task(Ctx::new(lock), task);
    }

    Ok(())
}

/// Terminate the running task `task`, consuming one activation.
fn terminate<Traits: KernelTraits>(lock: &CpuLockGuard<'_, Traits>, task: TaskId) {
    let kernel = lock.kernel();
    let task_cb = kernel.task_cb(task);
    debug_assert_eq!(task_cb.st.get(lock), TaskState::Running);
    debug_assert_eq!(kernel.state.running_task.get(lock), Some(task));

    kernel.state.running_task.set(lock, None);

    let activations = task_cb.activations.get(lock) - 1;
    task_cb.activations.set(lock, activations);

    // The remaining activations already have their ready queue entries
    task_cb.st.set(
        lock,
        if activations == 0 {
            TaskState::Suspended
        } else {
            TaskState::Ready
        },
    );
}

/// Transition `task` into the Ready state and add an entry to the ready
/// queue.
pub(super) fn make_ready<Traits: KernelTraits>(lock: &CpuLockGuard<'_, Traits>, task: TaskId) {
    let kernel = lock.kernel();
    kernel.task_cb(task).st.set(lock, TaskState::Ready);
    kernel
        .state
        .task_ready_queue
        .push_back_task(Ctx::new(lock), task);
}

/// Elect the next running task.
///
/// Returns `None` if the running task keeps the processor, or `Some(next)` if
/// the running task (if any) was moved back to the tail of the ready queue and
/// `next` (if any) is now Running.
fn choose_next_running_task<Traits: KernelTraits>(
    lock: &CpuLockGuard<'_, Traits>,
) -> Option<Option<TaskId>> {
    let kernel = lock.kernel();
    let state = &kernel.state;

    let prev_task = state.running_task.get(lock);
    let prev_task_level = prev_task.map_or(usize::MAX, |task| Traits::TASK_ATTR[task.get()].level);

    let next_task = match state
        .task_ready_queue
        .pop_front_task(Ctx::new(lock), prev_task_level)
    {
        ScheduleDecision::Keep => return None,
        ScheduleDecision::SwitchTo(next_task) => next_task,
    };

    if let Some(prev_task) = prev_task {
        debug_assert_eq!(kernel.task_cb(prev_task).st.get(lock), TaskState::Running);
        make_ready(lock, prev_task);
    }

    if let Some(next_task) = next_task {
        debug_assert_eq!(kernel.task_cb(next_task).st.get(lock), TaskState::Ready);
        kernel.task_cb(next_task).st.set(lock, TaskState::Running);
    }

    state.running_task.set(lock, next_task);
    Some(next_task)
}
