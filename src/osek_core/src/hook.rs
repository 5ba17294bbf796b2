//! Error hook interface
use crate::StatusType;

/// Identifies the system service that produced an error (`OSServiceIdType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    ActivateTask,
    TerminateTask,
    ChainTask,
    Schedule,
    GetTaskState,
    SetEvent,
    ClearEvent,
    GetEvent,
    WaitEvent,
}

/// The information supplied to the error hook.
///
/// This corresponds to the `OSErrorGetServiceId` and `OSError_*` accessors
/// of an OSEK/VDX system, bundled into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorInfo {
    /// The service that failed.
    pub service: ServiceId,
    /// The first parameter of the failed call, if it had one (usually a
    /// task identifier).
    pub param: Option<usize>,
    /// The status the service returned to its caller.
    pub status: StatusType,
    /// A human-readable description.
    pub message: &'static str,
}
