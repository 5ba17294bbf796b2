//! Interrupt handling
use crate::{klock, Kernel, KernelTraits};

/// Methods intended to be called by a port.
pub trait PortToKernel {
    /// Notify the kernel that a category-2 interrupt handler is starting.
    ///
    /// Precondition: CPU Lock inactive, [`Port::calling_context`] already
    /// reports [`CallingContext::InterruptCategory2`]
    ///
    /// [`Port::calling_context`]: crate::Port::calling_context
    /// [`CallingContext::InterruptCategory2`]: osek_core::CallingContext::InterruptCategory2
    fn enter_interrupt(&self);

    /// Notify the kernel that a category-2 interrupt handler has completed.
    /// When the outermost handler completes, a context switch requested by the
    /// handlers is performed.
    ///
    /// Precondition: CPU Lock inactive, [`Port::calling_context`] already
    /// reports the interrupted context
    ///
    /// [`Port::calling_context`]: crate::Port::calling_context
    fn leave_interrupt(&self);
}

impl<Traits: KernelTraits> PortToKernel for Kernel<Traits> {
    fn enter_interrupt(&self) {
        let lock = klock::lock_cpu(self);
        self.state
            .interrupt_nesting
            .modify(&lock, |nesting| *nesting += 1);
    }

    fn leave_interrupt(&self) {
        let lock = klock::lock_cpu(self);
        let nesting = self.state.interrupt_nesting.modify(&lock, |nesting| {
            debug_assert_ne!(*nesting, 0, "unbalanced `leave_interrupt`");
            *nesting -= 1;
            *nesting
        });
        drop(lock);

        if nesting == 0 {
            self.check_preemption_at_task_level();
        }
    }
}
