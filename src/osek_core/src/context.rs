//! Calling contexts

/// The kind of code that is currently executing (`GetCallingContext`).
///
/// The kernel decides whether a service may reschedule, and whether a
/// task-level service is permitted at all, based on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingContext {
    /// Task level. This includes the idle state in which no task is running.
    Task,
    /// A category-2 interrupt handler, which may call kernel services but
    /// never causes a context switch by itself.
    InterruptCategory2,
    /// A category-1 interrupt handler. Such handlers run outside the
    /// kernel's control and must not call kernel services.
    InterruptCategory1,
    /// The error hook.
    ErrorHook,
}

impl CallingContext {
    /// Get a flag indicating whether the context is task level.
    #[inline]
    pub const fn is_task(self) -> bool {
        matches!(self, Self::Task)
    }
}
