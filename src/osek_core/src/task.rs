//! Tasks
use core::fmt;

use crate::utils::Init;

/// Identifies a statically configured task.
///
/// Task identifiers are dense indices assigned in definition order, so a
/// system with `N` tasks uses the identifiers `0..N`. Constructing a
/// `TaskId` does not check the range; system services do that when extended
/// error checking is enabled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TaskId(usize);

impl TaskId {
    /// Construct a `TaskId` from a raw index.
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index.
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl Init for TaskId {
    const INIT: Self = Self(0);
}

/// The externally visible state of a task (`TaskStateType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// The task is not active and holds no activation.
    Suspended,
    /// The task is runnable and waiting for the processor.
    Ready,
    /// The task owns the processor.
    Running,
    /// The task is an extended task blocked on events.
    Waiting,
}

impl Init for TaskState {
    const INIT: Self = Self::Suspended;
}

bitflags::bitflags! {
    /// A set of events (`EventMaskType`).
    ///
    /// Event bits carry no predefined meaning; an application assigns them
    /// per extended task.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const _ = !0;
    }
}

impl Init for EventMask {
    const INIT: Self = Self::empty();
}
