//! Crate-local logging shims.
//!
//! With the `tracing` feature enabled these forward to the [`tracing`]
//! crate; otherwise they compile to nothing, so call sites stay free of
//! `cfg` clutter.

#[cfg(feature = "tracing")]
macro_rules! trace {
    ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "tracing")]
macro_rules! debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

pub(crate) use debug;
pub(crate) use trace;
