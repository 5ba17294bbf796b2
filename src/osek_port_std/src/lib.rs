//! Simulation environment for running `osek_kernel` on a hosted environment.
//!
//! The simulation is deterministic and single-threaded. There is no real
//! processor to switch: the caller plays the role of whatever task the kernel
//! considers running, and every context switch is recorded in a *dispatch
//! log* instead. Interrupts are simulated by [`run_interrupt`], which runs a
//! handler synchronously with the calling context set accordingly.
//!
//! # Usage
//!
//! ```
//! use osek_core::{prelude::*, ActivateTaskError};
//! use osek_kernel::{cfg::{CfgBuilder, TaskDefiner}, Kernel, KernelHooks};
//! use osek_port_std::Dispatch;
//!
//! osek_port_std::use_port!(unsafe struct SystemTraits);
//! impl KernelHooks for SystemTraits {}
//!
//! osek_kernel::build!(
//!     SystemTraits,
//!     CfgBuilder::new().task(TaskDefiner::new().priority(1).autostart(true))
//! );
//!
//! let kernel = Kernel::new(SystemTraits::new());
//! kernel.start_os();
//!
//! let task = TaskId::new(0);
//! assert_eq!(kernel.running_task(), Some(task));
//! assert_eq!(
//!     kernel.activate_task(task),
//!     Err(ActivateTaskError::ActivationLimitExceeded),
//! );
//! assert_eq!(
//!     osek_port_std::take_dispatch_log(&kernel),
//!     [Dispatch { from: None, to: Some(task) }],
//! );
//! ```
#![deny(unsafe_op_in_unsafe_fn)]
use std::cell::{Cell, RefCell};

use osek_core::{CallingContext, TaskId};
use osek_kernel::{Kernel, KernelTraits, PortToKernel};

/// Used by `use_port!`
#[doc(hidden)]
pub extern crate osek_kernel;
/// Used by `use_port!`
#[doc(hidden)]
pub extern crate osek_core;

/// Implemented on a kernel trait type by [`use_port!`].
///
/// # Safety
///
/// Only meant to be implemented by [`use_port!`].
pub unsafe trait PortInstance: KernelTraits {
    fn port_state(&self) -> &State;
}

/// A context switch performed by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// The task that gave up the processor. `None` means the idle context.
    pub from: Option<TaskId>,
    /// The task that received the processor. `None` means the idle context.
    pub to: Option<TaskId>,
}

/// The category of a simulated interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptCategory {
    /// A category-1 handler. The kernel is not notified of its execution.
    Category1,
    /// A category-2 handler. A context switch requested by it is performed
    /// when the outermost category-2 handler returns.
    Category2,
}

/// The internal state of the port.
#[doc(hidden)]
pub struct State {
    cpu_lock: Cell<bool>,
    /// The contexts of the active interrupt handlers, innermost last.
    interrupts: RefCell<Vec<CallingContext>>,
    dispatch_log: RefCell<Vec<Dispatch>>,
}

impl State {
    pub const fn new() -> Self {
        Self {
            cpu_lock: Cell::new(false),
            interrupts: RefCell::new(Vec::new()),
            dispatch_log: RefCell::new(Vec::new()),
        }
    }

    /// Implements [`osek_kernel::Port::enter_cpu_lock`].
    ///
    /// # Safety
    ///
    /// Only meant to be called by the kernel.
    pub unsafe fn enter_cpu_lock(&self) {
        log::trace!("enter_cpu_lock");
        assert!(!self.cpu_lock.replace(true), "CPU Lock is already active");
    }

    /// Implements [`osek_kernel::Port::leave_cpu_lock`].
    ///
    /// # Safety
    ///
    /// Only meant to be called by the kernel.
    pub unsafe fn leave_cpu_lock(&self) {
        log::trace!("leave_cpu_lock");
        assert!(self.cpu_lock.replace(false), "CPU Lock is not active");
    }

    pub fn is_cpu_lock_active(&self) -> bool {
        self.cpu_lock.get()
    }

    pub fn calling_context(&self) -> CallingContext {
        self.interrupts
            .borrow()
            .last()
            .copied()
            .unwrap_or(CallingContext::Task)
    }

    /// Implements [`osek_kernel::Port::dispatch`].
    pub fn dispatch(&self, from: Option<TaskId>, to: Option<TaskId>) {
        log::debug!("dispatch: {from:?} -> {to:?}");
        assert!(!self.is_cpu_lock_active(), "dispatch with CPU Lock active");
        assert_eq!(
            self.calling_context(),
            CallingContext::Task,
            "dispatch from an interrupt handler"
        );
        self.dispatch_log.borrow_mut().push(Dispatch { from, to });
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Instantiate the port. Generates a kernel trait type with a `new`
/// constructor and implements [`osek_kernel::Port`] on it.
///
/// The generated type still needs [`osek_kernel::KernelHooks`] and
/// [`osek_kernel::build!`] to become a complete kernel trait type.
#[macro_export]
macro_rules! use_port {
    (unsafe $vis:vis struct $Traits:ident) => {
        $vis struct $Traits {
            port_state: $crate::State,
        }

        impl $Traits {
            #[allow(dead_code)]
            pub const fn new() -> Self {
                Self {
                    port_state: $crate::State::new(),
                }
            }
        }

        // Safety: We are `use_port!`, so it's okay to `impl` this
        unsafe impl $crate::PortInstance for $Traits {
            #[inline]
            fn port_state(&self) -> &$crate::State {
                &self.port_state
            }
        }

        // Safety: The simulated CPU Lock masks every simulated interrupt
        unsafe impl $crate::osek_kernel::Port for $Traits {
            #[inline]
            unsafe fn enter_cpu_lock(&self) {
                // Safety: Just forwarding the call
                unsafe { self.port_state.enter_cpu_lock() }
            }

            #[inline]
            unsafe fn leave_cpu_lock(&self) {
                // Safety: Just forwarding the call
                unsafe { self.port_state.leave_cpu_lock() }
            }

            #[inline]
            fn is_cpu_lock_active(&self) -> bool {
                self.port_state.is_cpu_lock_active()
            }

            #[inline]
            fn calling_context(&self) -> $crate::osek_core::CallingContext {
                self.port_state.calling_context()
            }

            fn dispatch(
                &self,
                from: ::core::option::Option<$crate::osek_core::TaskId>,
                to: ::core::option::Option<$crate::osek_core::TaskId>,
            ) {
                self.port_state.dispatch(from, to)
            }
        }
    };
}

/// Initialize the logger for tests. Does nothing if a logger is already
/// installed.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run `handler` as an interrupt handler of the specified category.
///
/// Panics if CPU Lock is active, as the interrupt would be masked in that
/// case. Handlers may nest by calling this function again.
pub fn run_interrupt<Traits: PortInstance>(
    kernel: &Kernel<Traits>,
    category: InterruptCategory,
    handler: impl FnOnce(&Kernel<Traits>),
) {
    let state = kernel.traits().port_state();
    assert!(!state.is_cpu_lock_active(), "interrupts are masked");

    let context = match category {
        InterruptCategory::Category1 => CallingContext::InterruptCategory1,
        InterruptCategory::Category2 => CallingContext::InterruptCategory2,
    };

    log::debug!("interrupt entry ({category:?})");
    state.interrupts.borrow_mut().push(context);
    if category == InterruptCategory::Category2 {
        kernel.enter_interrupt();
    }

    handler(kernel);

    state.interrupts.borrow_mut().pop();
    log::debug!("interrupt exit ({category:?})");
    if category == InterruptCategory::Category2 {
        kernel.leave_interrupt();
    }
}

/// Remove and return the context switches recorded so far.
pub fn take_dispatch_log<Traits: PortInstance>(kernel: &Kernel<Traits>) -> Vec<Dispatch> {
    kernel.traits().port_state().dispatch_log.take()
}
