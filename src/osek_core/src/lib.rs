//! API definitions for a statically configured, priority-based task core
//! conforming to the OSEK/VDX OS multitasking model.
//!
//! This crate only defines the vocabulary shared by kernel implementations,
//! ports, and applications: task identifiers and states, event masks, calling
//! contexts, status codes, and the information handed to the error hook. The
//! kernel itself lives in `osek_kernel`.
//!
//! # Status codes
//!
//! Every system service reports failures through a service-specific error
//! enum (e.g., [`ActivateTaskError`]). Each variant has the same discriminant
//! as the corresponding [`StatusType`], so converting an error to a status
//! code is free:
//!
//! ```
//! use osek_core::{ActivateTaskError, StatusType};
//! let result: Result<(), ActivateTaskError> = Err(ActivateTaskError::ActivationLimitExceeded);
//! assert_eq!(StatusType::from(result), StatusType::ActivationLimitExceeded);
//! assert_eq!(StatusType::ActivationLimitExceeded as u8, 4);
//! ```
#![cfg_attr(not(test), no_std)] // Link `std` only when building a test (`cfg(test)`)
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cfg;
pub mod context;
mod error;
pub mod hook;
pub mod task;
pub mod utils;

pub use self::{
    cfg::{ErrorChecking, HookSwitch, PriorityOrder},
    context::CallingContext,
    error::*,
    hook::{ErrorInfo, ServiceId},
    task::{EventMask, TaskId, TaskState},
};

/// The prelude module.
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{utils::Init, CallingContext, EventMask, StatusType, TaskId, TaskState};
}
