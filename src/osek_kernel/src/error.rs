//! Error classification and the error hook
use core::{cell::Cell, fmt};

use osek_core::{self as errors, CallingContext, ErrorInfo, ServiceId, StatusType, TaskId};

use crate::{klock, utils::Init, Kernel, KernelTraits};

macro_rules! define_suberror {
    (
        $( #[doc $( $doc:tt )*] )*
        $( #[into( $Supererror:path )] )*
        $vis:vis enum $Name:ident {
            $( $Variant:ident, )*
        }
    ) => {
        $( #[doc $( $doc )*] )*
        #[repr(u8)]
        #[derive(PartialEq, Eq, Copy, Clone)]
        $vis enum $Name {
            $( $Variant = StatusType::$Variant as _ ),*
        }

        impl fmt::Debug for $Name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Debug::fmt(&StatusType::from(*self), f)
            }
        }

        define_suberror! {
            @into
            #[into(StatusType)]
            $( #[into( $Supererror )] )*
            enum $Name {
                $( $Variant, )*
            }
        }
    };

    (
        @into
        #[into( $Supererror0:path )]
        $( #[into( $Supererror:path )] )*
        enum $Name:ident {
            $( $Variant:ident, )*
        }
    ) => {
        impl From<$Name> for $Supererror0 {
            #[inline]
            fn from(x: $Name) -> Self {
                match x {
                    $( $Name::$Variant => Self::$Variant ),*
                }
            }
        }

        define_suberror! {
            @into
            $( #[into( $Supererror )] )*
            enum $Name {
                $( $Variant, )*
            }
        }
    };

    ( @into enum $($_:tt)* ) => {};
}

define_suberror! {
    /// `InvalidId`
    #[into(errors::ActivateTaskError)]
    #[into(errors::ChainTaskError)]
    #[into(errors::GetTaskStateError)]
    #[into(errors::SetEventError)]
    #[into(errors::GetEventError)]
    pub(super) enum BadIdError {
        InvalidId,
    }
}

define_suberror! {
    /// `CallLevel`
    #[into(errors::TerminateTaskError)]
    #[into(errors::ChainTaskError)]
    #[into(errors::ScheduleError)]
    #[into(errors::ClearEventError)]
    #[into(errors::WaitEventError)]
    pub(super) enum CallLevelError {
        CallLevel,
    }
}

define_suberror! {
    /// `ActivationLimitExceeded`
    #[into(errors::ActivateTaskError)]
    #[into(errors::ChainTaskError)]
    pub(super) enum ActivationLimitError {
        ActivationLimitExceeded,
    }
}

define_suberror! {
    /// `Access` or `State`. Used by the event services to reject targets
    /// that cannot own events.
    #[into(errors::SetEventError)]
    #[into(errors::GetEventError)]
    pub(super) enum EventTargetError {
        Access,
        State,
    }
}

define_suberror! {
    /// `Access`
    #[into(errors::ClearEventError)]
    #[into(errors::WaitEventError)]
    pub(super) enum AccessError {
        Access,
    }
}

/// If extended error checking is enabled and `task` is out of range, return
/// `Err(InvalidId)`.
///
/// With error checking disabled, an out-of-range identifier is detected later
/// by [`Kernel::task_cb`], which panics.
#[inline]
pub(super) fn validate_task_id<Traits: KernelTraits>(task: TaskId) -> Result<(), BadIdError> {
    if Traits::ERROR_CHECKING.is_extended() && task.get() >= Traits::TASK_ATTR.len() {
        Err(BadIdError::InvalidId)
    } else {
        Ok(())
    }
}

/// If extended error checking is enabled and the caller is not running at
/// task level, return `Err(CallLevel)`.
#[inline]
pub(super) fn expect_task_context<Traits: KernelTraits>(
    kernel: &Kernel<Traits>,
) -> Result<(), CallLevelError> {
    if Traits::ERROR_CHECKING.is_extended() && !kernel.calling_context().is_task() {
        Err(CallLevelError::CallLevel)
    } else {
        Ok(())
    }
}

#[cold]
#[track_caller]
pub(super) fn bad_id() -> ! {
    panic!("task identifier out of range")
}

/// The state of the error hook.
pub(crate) struct ErrorHookState {
    /// Set while the error hook is running. Nested failures are not reported.
    running: Cell<bool>,

    /// The port's calling context and the category-2 interrupt nesting level
    /// at which the running hook was called.
    origin: Cell<(CallingContext, usize)>,
}

impl Init for ErrorHookState {
    const INIT: Self = Self {
        running: Cell::new(false),
        origin: Cell::new((CallingContext::Task, 0)),
    };
}

impl ErrorHookState {
    #[inline]
    pub(super) fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Get a flag indicating whether code running in `context` at the
    /// interrupt nesting level `nesting` is the hook itself rather than an
    /// interrupt handler that preempted it.
    #[inline]
    pub(super) fn is_origin(&self, context: CallingContext, nesting: usize) -> bool {
        self.origin.get() == (context, nesting)
    }
}

/// Clears [`ErrorHookState::running`] when the error hook returns or unwinds.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Pass `result` through, reporting it to the error hook first if it's
    /// an error.
    ///
    /// Precondition: CPU Lock inactive
    pub(super) fn report<T, E: Copy + Into<StatusType>>(
        &self,
        result: Result<T, E>,
        service: ServiceId,
        param: Option<usize>,
        message: &'static str,
    ) -> Result<T, E> {
        if let Err(e) = result {
            self.call_error_hook(&ErrorInfo {
                service,
                param,
                status: e.into(),
                message,
            });
        }
        result
    }

    fn call_error_hook(&self, info: &ErrorInfo) {
        if !Traits::ERROR_HOOK.is_enabled() {
            return;
        }

        let hook_state = &self.state.error_hook;
        let running = &hook_state.running;
        {
            let lock = klock::lock_cpu(self);
            if running.replace(true) {
                return;
            }
            let nesting = self.state.interrupt_nesting.get(&lock);
            hook_state
                .origin
                .set((self.traits.calling_context(), nesting));
        }

        {
            let _guard = RunningGuard(running);
            Traits::error_hook(self, info);
        }

        // Tasks activated by the hook are dispatched now that the caller is
        // back at task level
        if self.traits.calling_context().is_task() {
            self.check_preemption_at_task_level();
        }
    }
}
