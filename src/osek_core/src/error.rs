//! Status codes
use core::{fmt, mem::transmute};

/// The macro to define [`StatusType`].
macro_rules! define_status_type {
    (
        $( #[$meta:meta] )*
        pub enum StatusType {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident = $vd:expr
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        pub enum StatusType {
            $(
                $( #[$vmeta] )*
                $vname = $vd
            ),*
        }

        impl StatusType {
            /// Get the short name of the status code.
            ///
            /// # Examples
            ///
            /// ```
            /// use osek_core::StatusType;
            /// assert_eq!(StatusType::CallLevel.as_str(), "CallLevel");
            /// ```
            pub fn as_str(self) -> &'static str {
                match self {
                    $(
                        Self::$vname => stringify!($vname),
                    )*
                }
            }

            fn fmt(self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl fmt::Debug for StatusType {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                (*self).fmt(f)
            }
        }
    };
}

define_status_type! {
    /// All status codes (including success) that a system service can return.
    ///
    /// The discriminants are the OSEK/VDX `E_OK` and `E_OS_*` values, so a
    /// `StatusType` can cross a C API boundary unchanged.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(u8)]
    pub enum StatusType {
        /// The service completed. (`E_OK`)
        Ok = 0,
        /// The target object cannot be used in the requested way, e.g., events
        /// were sent to a basic task. (`E_OS_ACCESS`)
        Access = 1,
        /// The service was called from a context that does not allow it, e.g.,
        /// a task-level service was called from an interrupt handler.
        /// (`E_OS_CALLEVEL`)
        CallLevel = 2,
        /// The object identifier is outside the configured range. Only
        /// reported when extended error checking is enabled. (`E_OS_ID`)
        InvalidId = 3,
        /// Too many activations of the task are outstanding. (`E_OS_LIMIT`)
        ActivationLimitExceeded = 4,
        /// The target object is in a state that disallows the operation, e.g.,
        /// events were sent to a suspended task. (`E_OS_STATE`)
        State = 7,
    }
}

impl StatusType {
    /// Get a flag indicating whether the code represents a failure.
    #[inline]
    pub fn is_err(self) -> bool {
        self != Self::Ok
    }

    /// Get a flag indicating whether the code represents a success.
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (*self).fmt(f)
    }
}

macro_rules! define_error {
    (
        mod $mod_name:ident {}
        $( #[$meta:meta] )*
        $vis:vis enum $name:ident $(: $($subty:ident),* $(,)*)? {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        ///
        /// See [`StatusType`] for all status codes and generic descriptions.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        $vis enum $name {
            $(
                $( #[$vmeta] )*
                // Use the same discriminants as `StatusType` for cost-free
                // conversion
                $vname = StatusType::$vname as u8
            ),*
        }

        impl fmt::Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                StatusType::from(*self).fmt(f)
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                StatusType::from(*self).fmt(f)
            }
        }

        impl From<Result<(), $name>> for StatusType {
            #[inline]
            fn from(x: Result<(), $name>) -> Self {
                match x {
                    Ok(()) => Self::Ok,
                    Err(e) => Self::from(e),
                }
            }
        }

        impl From<$name> for StatusType {
            #[inline]
            fn from(x: $name) -> Self {
                // Safety: `StatusType` and `$name` has the same representation
                //         type, and the representation of `StatusType` is a
                //         superset of `x`.
                unsafe { transmute(x) }
            }
        }

        #[cfg(test)]
        mod $mod_name {
            use super::*;

            #[test]
            fn to_status_type() {
                $(
                    assert_eq!(
                        StatusType::$vname,
                        StatusType::from($name::$vname),
                    );
                )*
            }

            #[test]
            fn result_to_status_type() {
                $(
                    assert_eq!(
                        StatusType::$vname,
                        StatusType::from(Err($name::$vname)),
                    );
                )*
                assert_eq!(
                    StatusType::Ok,
                    StatusType::from(Result::<(), $name>::Ok(())),
                );
            }
        }

        $($(
            $subty!(impl From<_> for $name);
        )*)?

        #[allow(unused_macros)]
        macro_rules! $name {
            (impl From<_> for $dest_ty:ty) => {
                impl From<$name> for $dest_ty {
                    #[inline]
                    fn from(x: $name) -> Self {
                        match x {
                            $(
                                $name::$vname => Self::$vname,
                            )*
                        }
                    }
                }
            };
        }
    };
}

define_error! {
    mod activate_task_error {}
    /// Error type for `ActivateTask`.
    pub enum ActivateTaskError {
        /// The task identifier is out of range.
        InvalidId,
        /// The task is an extended task that is not suspended, or a basic task
        /// whose activation count has reached its configured maximum.
        ActivationLimitExceeded,
    }
}

define_error! {
    mod terminate_task_error {}
    /// Error type for `TerminateTask`.
    pub enum TerminateTaskError {
        /// The caller is not a task.
        CallLevel,
    }
}

define_error! {
    mod chain_task_error {}
    /// Error type for `ChainTask`.
    pub enum ChainTaskError: ActivateTaskError, TerminateTaskError {
        /// The task identifier is out of range.
        InvalidId,
        /// The target task cannot accept another activation.
        ActivationLimitExceeded,
        /// The caller is not a task.
        CallLevel,
    }
}

define_error! {
    mod schedule_error {}
    /// Error type for `Schedule`.
    pub enum ScheduleError {
        /// The caller is not a task.
        CallLevel,
    }
}

define_error! {
    mod get_task_state_error {}
    /// Error type for `GetTaskState`.
    pub enum GetTaskStateError {
        /// The task identifier is out of range.
        InvalidId,
    }
}

define_error! {
    mod set_event_error {}
    /// Error type for `SetEvent`.
    pub enum SetEventError {
        /// The task identifier is out of range.
        InvalidId,
        /// The target is not an extended task.
        Access,
        /// The target task is suspended.
        State,
    }
}

define_error! {
    mod get_event_error {}
    /// Error type for `GetEvent`.
    pub enum GetEventError {
        /// The task identifier is out of range.
        InvalidId,
        /// The target is not an extended task.
        Access,
        /// The target task is suspended.
        State,
    }
}

define_error! {
    mod clear_event_error {}
    /// Error type for `ClearEvent`.
    pub enum ClearEventError {
        /// The running task is not an extended task.
        Access,
        /// The caller is not a task.
        CallLevel,
    }
}

define_error! {
    mod wait_event_error {}
    /// Error type for `WaitEvent`.
    pub enum WaitEventError {
        /// The running task is not an extended task.
        Access,
        /// The caller is not a task.
        CallLevel,
    }
}
