//! Build-time configuration options shared by kernel implementations

/// Selects how thoroughly system services validate their arguments
/// (`ERROR_CHECKING_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorChecking {
    /// Standard status only. Services report `ActivationLimitExceeded` and
    /// similar runtime conditions but do not validate identifiers or calling
    /// contexts.
    Disabled,
    /// Extended status. Out-of-range identifiers are reported as `InvalidId`
    /// and task-level services called from elsewhere as `CallLevel`.
    Extended,
}

impl ErrorChecking {
    /// Get a flag indicating whether extended validation is enabled.
    #[inline]
    pub const fn is_extended(self) -> bool {
        matches!(self, Self::Extended)
    }
}

/// Enables or disables a hook routine (`HOOK_ERRORHOOK` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSwitch {
    Enabled,
    Disabled,
}

impl HookSwitch {
    #[inline]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Selects which end of the numeric priority range is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityOrder {
    /// Priority `0` is the most urgent.
    LowerIsMoreUrgent,
    /// The largest configured priority is the most urgent, as in the OSEK/VDX
    /// OIL convention.
    HigherIsMoreUrgent,
}
