//! Events
//!
//! Only what is needed for extended tasks to wait: each extended task owns a
//! set of pending events, and waits until one of a given set of events is
//! pending.
use osek_core::{
    ClearEventError, EventMask, GetEventError, ServiceId, SetEventError, TaskId, TaskState,
    WaitEventError,
};

use crate::{
    error::{self, AccessError, CallLevelError, EventTargetError},
    klock::{self, CpuLockGuard},
    task, Kernel, KernelTraits,
};

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Add events to the pending events of an extended task (`SetEvent`).
    ///
    /// If the task is waiting for any of the events, it becomes Ready and may
    /// preempt the caller.
    pub fn set_event(&self, task: TaskId, mask: EventMask) -> Result<(), SetEventError> {
        let result = self.set_event_inner(task, mask);
        self.report(
            result,
            ServiceId::SetEvent,
            Some(task.get()),
            "event delivery rejected",
        )
    }

    fn set_event_inner(&self, task: TaskId, mask: EventMask) -> Result<(), SetEventError> {
        error::validate_task_id::<Traits>(task)?;

        let lock = klock::lock_cpu(self);
        expect_event_owner(&lock, task)?;

        let task_cb = self.task_cb(task);
        let events = task_cb.events.get(&lock) | mask;
        task_cb.events.set(&lock, events);

        if task_cb.st.get(&lock) == TaskState::Waiting
            && events.intersects(task_cb.wait_mask.get(&lock))
        {
            task_cb.wait_mask.set(&lock, EventMask::empty());
            task::make_ready(&lock, task);
            drop(lock);

            self.check_preemption_at_task_level();
        }

        Ok(())
    }

    /// Remove events from the pending events of the running task
    /// (`ClearEvent`).
    pub fn clear_event(&self, mask: EventMask) -> Result<(), ClearEventError> {
        let result = self.clear_event_inner(mask);
        self.report(result, ServiceId::ClearEvent, None, "event clearing rejected")
    }

    fn clear_event_inner(&self, mask: EventMask) -> Result<(), ClearEventError> {
        error::expect_task_context(self)?;

        let lock = klock::lock_cpu(self);
        let running_task = expect_extended_running_task(&lock)?;

        self.task_cb(running_task)
            .events
            .modify(&lock, |events| events.remove(mask));
        Ok(())
    }

    /// Get the pending events of an extended task (`GetEvent`).
    pub fn event(&self, task: TaskId) -> Result<EventMask, GetEventError> {
        let result = self.event_inner(task);
        self.report(
            result,
            ServiceId::GetEvent,
            Some(task.get()),
            "event query rejected",
        )
    }

    fn event_inner(&self, task: TaskId) -> Result<EventMask, GetEventError> {
        error::validate_task_id::<Traits>(task)?;

        let lock = klock::lock_cpu(self);
        expect_event_owner(&lock, task)?;
        Ok(self.task_cb(task).events.get(&lock))
    }

    /// Wait until any of the specified events is pending (`WaitEvent`).
    ///
    /// Returns immediately if one already is. Otherwise, the running task
    /// enters the Waiting state and the processor is given to the next ready
    /// task.
    pub fn wait_event(&self, mask: EventMask) -> Result<(), WaitEventError> {
        let result = self.wait_event_inner(mask);
        self.report(result, ServiceId::WaitEvent, None, "event wait rejected")
    }

    fn wait_event_inner(&self, mask: EventMask) -> Result<(), WaitEventError> {
        error::expect_task_context(self)?;

        let lock = klock::lock_cpu(self);
        let running_task = expect_extended_running_task(&lock)?;

        let task_cb = self.task_cb(running_task);
        if task_cb.events.get(&lock).intersects(mask) {
            return Ok(());
        }

        task_cb.wait_mask.set(&lock, mask);
        task_cb.st.set(&lock, TaskState::Waiting);
        self.state.running_task.set(&lock, None);

        self.switch_away(lock, running_task);
        Ok(())
    }
}

/// Check that `task` is an extended task that can receive events.
///
/// These checks are made regardless of [`ErrorChecking`] because a basic
/// task has nowhere to put events.
///
/// [`ErrorChecking`]: crate::ErrorChecking
fn expect_event_owner<Traits: KernelTraits>(
    lock: &CpuLockGuard<'_, Traits>,
    task: TaskId,
) -> Result<(), EventTargetError> {
    let kernel = lock.kernel();
    if !kernel.expect_task_attr(task).is_extended() {
        Err(EventTargetError::Access)
    } else if kernel.task_cb(task).st.get(lock) == TaskState::Suspended {
        Err(EventTargetError::State)
    } else {
        Ok(())
    }
}

/// Get the running task, which must be an extended task.
fn expect_extended_running_task<Traits: KernelTraits>(
    lock: &CpuLockGuard<'_, Traits>,
) -> Result<TaskId, ExtendedRunningTaskError> {
    let kernel = lock.kernel();
    let running_task = kernel
        .state
        .running_task
        .get(lock)
        .ok_or(ExtendedRunningTaskError::CallLevel)?;

    if Traits::TASK_ATTR[running_task.get()].is_extended() {
        Ok(running_task)
    } else {
        Err(ExtendedRunningTaskError::Access)
    }
}

/// The error type of [`expect_extended_running_task`].
enum ExtendedRunningTaskError {
    CallLevel,
    Access,
}

impl From<ExtendedRunningTaskError> for ClearEventError {
    #[inline]
    fn from(x: ExtendedRunningTaskError) -> Self {
        match x {
            ExtendedRunningTaskError::CallLevel => CallLevelError::CallLevel.into(),
            ExtendedRunningTaskError::Access => AccessError::Access.into(),
        }
    }
}

impl From<ExtendedRunningTaskError> for WaitEventError {
    #[inline]
    fn from(x: ExtendedRunningTaskError) -> Self {
        match x {
            ExtendedRunningTaskError::CallLevel => CallLevelError::CallLevel.into(),
            ExtendedRunningTaskError::Access => AccessError::Access.into(),
        }
    }
}
