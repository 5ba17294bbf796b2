//! Utility
//!
//! **This module is exempt from the API stability guarantee.** It's exposed
//! only because it's needed by [`build!`](crate::build).
use core::marker::PhantomData;

mod prio_bitmap;
pub use self::prio_bitmap::*;
pub use osek_core::utils::Init;

/// A "type function" producing a type.
#[doc(hidden)]
pub trait TypeFn {
    type Output;
}

/// Selects `T` if `B` is `true` and `F` otherwise, through [`TypeFn`].
#[doc(hidden)]
pub struct Conditional<T, F, const B: bool>(PhantomData<(T, F)>);

impl<T, F> TypeFn for Conditional<T, F, false> {
    type Output = F;
}
impl<T, F> TypeFn for Conditional<T, F, true> {
    type Output = T;
}
