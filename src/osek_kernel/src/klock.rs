//! Kernel state locking mechanism
use core::{cell::Cell, fmt, ops};

use crate::{utils::Init, Kernel, KernelTraits};

/// The proof of an active CPU Lock. Only obtainable by borrowing a
/// [`CpuLockGuard`].
pub(crate) struct CpuLockToken {
    _private: (),
}

/// Cell type that can be accessed by presenting a [`CpuLockToken`] (which can
/// be borrowed from the guard returned by [`lock_cpu`]).
pub(crate) struct CpuLockCell<T>(Cell<T>);

impl<T> CpuLockCell<T> {
    pub(crate) const fn new(x: T) -> Self {
        Self(Cell::new(x))
    }
}

impl<T: Copy> CpuLockCell<T> {
    #[inline]
    pub(crate) fn get(&self, _: &CpuLockToken) -> T {
        self.0.get()
    }

    #[inline]
    pub(crate) fn set(&self, _: &CpuLockToken, x: T) {
        self.0.set(x);
    }

    #[inline]
    pub(crate) fn replace(&self, _: &CpuLockToken, x: T) -> T {
        self.0.replace(x)
    }

    /// Apply `f` to a copy of the contents and store the result back.
    #[inline]
    pub(crate) fn modify<R>(&self, _: &CpuLockToken, f: impl FnOnce(&mut T) -> R) -> R {
        let mut x = self.0.get();
        let ret = f(&mut x);
        self.0.set(x);
        ret
    }

    /// Return a debug formatting proxy that prints the contents as seen by
    /// the holder of `lock`.
    pub(crate) fn debug_fmt<'a>(&'a self, lock: &'a CpuLockToken) -> impl fmt::Debug + 'a
    where
        T: fmt::Debug,
    {
        struct DebugFmt<'a, T>(&'a CpuLockCell<T>, &'a CpuLockToken);

        impl<T: Copy + fmt::Debug> fmt::Debug for DebugFmt<'_, T> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                self.0.get(self.1).fmt(f)
            }
        }

        DebugFmt(self, lock)
    }
}

impl<T: Init> Init for CpuLockCell<T> {
    const INIT: Self = Self::new(T::INIT);
}

/// The CPU Lock nesting state of a kernel instance.
pub(crate) struct CpuLockState {
    /// The number of live [`CpuLockGuard`]s. Only modified while the
    /// interrupts are masked.
    depth: Cell<usize>,
}

impl Init for CpuLockState {
    const INIT: Self = Self {
        depth: Cell::new(0),
    };
}

/// Enter a CPU Lock state and get an RAII guard.
///
/// CPU Lock nests. Only the outermost guard masks and unmasks interrupts
/// through the port; inner guards just bump the depth counter.
pub(crate) fn lock_cpu<Traits: KernelTraits>(kernel: &Kernel<Traits>) -> CpuLockGuard<'_, Traits> {
    let depth = &kernel.state.cpu_lock.depth;
    if depth.get() == 0 {
        // Safety: The depth counter proves no CPU Lock state is owned by us
        unsafe { kernel.traits.enter_cpu_lock() };
    }
    debug_assert!(kernel.traits.is_cpu_lock_active());
    depth.set(depth.get() + 1);

    CpuLockGuard { kernel }
}

/// RAII guard for a CPU Lock state.
///
/// [`CpuLockToken`] can be borrowed from this type.
pub(crate) struct CpuLockGuard<'a, Traits: KernelTraits> {
    kernel: &'a Kernel<Traits>,
}

impl<'a, Traits: KernelTraits> CpuLockGuard<'a, Traits> {
    /// Get the kernel instance this guard belongs to.
    #[inline]
    pub(crate) fn kernel(&self) -> &'a Kernel<Traits> {
        self.kernel
    }
}

impl<Traits: KernelTraits> Drop for CpuLockGuard<'_, Traits> {
    fn drop(&mut self) {
        let depth = &self.kernel.state.cpu_lock.depth;
        debug_assert_ne!(depth.get(), 0);
        depth.set(depth.get() - 1);
        if depth.get() == 0 {
            // Safety: CPU Lock is currently active, and it's us (the kernel)
            // who entered it
            unsafe { self.kernel.traits.leave_cpu_lock() };
        }
    }
}

impl<Traits: KernelTraits> ops::Deref for CpuLockGuard<'_, Traits> {
    type Target = CpuLockToken;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &CpuLockToken { _private: () }
    }
}
