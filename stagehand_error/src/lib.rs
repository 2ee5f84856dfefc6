//! The `Error` type shared by the stagehand crates.
//!
//! Every crate in the workspace defines its own closed error enum for the failures it can
//! name (`SceneError`, `PrefabError`, `ConfigError`, ...). Those convert into this type with
//! `?`, which keeps the causal chain and, when `RUST_BACKTRACE` is set, a backtrace of the
//! place where the error was first boxed.

#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    rust_2018_compatibility
)]
#![warn(clippy::all)]

#[cfg(feature = "backtrace")]
pub use backtrace::Backtrace;
use std::{
    borrow::Cow,
    error, fmt, result,
};

/// `std::result::Result` with the stagehand error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
struct Inner {
    source: Option<Box<Error>>,
    #[cfg(feature = "backtrace")]
    backtrace: Option<Backtrace>,
    error: Box<dyn error::Error + Send + Sync>,
}

/// The error type used by stagehand.
///
/// Wraps a domain error or a message, together with the error that caused it.
pub struct Error {
    inner: Box<Inner>,
}

impl Error {
    /// Wraps anything that is an error.
    pub fn new<E>(error: E) -> Self
    where
        E: 'static + error::Error + Send + Sync,
    {
        Self::from_boxed(Box::new(error))
    }

    fn from_boxed(error: Box<dyn error::Error + Send + Sync>) -> Self {
        Self {
            inner: Box::new(Inner {
                source: None,
                #[cfg(feature = "backtrace")]
                backtrace: backtrace_support::new_backtrace(),
                error,
            }),
        }
    }

    /// Sets the error that caused this one.
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: 'static + Into<Error>,
    {
        self.inner.source = Some(Box::new(source.into()));
        self
    }

    /// Constructs an error from a message.
    pub fn from_string<M>(message: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        #[derive(Debug)]
        struct StringError(Cow<'static, str>);

        impl fmt::Display for StringError {
            fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(fmt)
            }
        }

        impl error::Error for StringError {}

        Self::from_boxed(Box::new(StringError(message.into())))
    }

    /// The backtrace captured when this error was constructed, if backtraces are enabled.
    #[cfg(feature = "backtrace")]
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace.as_ref()
    }

    /// The error that caused this one.
    ///
    /// ```rust
    /// use stagehand_error::{Error, ResultExt};
    /// use std::io;
    ///
    /// let e = io::Error::new(io::ErrorKind::Other, "wrapped");
    /// let res = Result::Err::<(), _>(e).with_context(|_| Error::from_string("top"));
    /// let e = res.expect_err("no error");
    ///
    /// assert_eq!("top", e.to_string());
    /// assert_eq!("wrapped", e.source().expect("no source").to_string());
    /// ```
    pub fn source(&self) -> Option<&Error> {
        self.inner.source.as_deref()
    }

    /// Iterates this error and all of its causes, outermost first.
    pub fn causes(&self) -> Causes<'_> {
        Causes {
            current: Some(self),
        }
    }

    /// Returns the wrapped error if it is of type `E`.
    ///
    /// Only the outermost error is inspected; walk [`causes`](#method.causes) to search the chain.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: 'static + error::Error,
    {
        self.inner.error.downcast_ref::<E>()
    }

    /// Access the wrapped error as a `std::error::Error` trait object.
    pub fn as_error(&self) -> &(dyn error::Error + 'static) {
        &*self.inner.error
    }
}

impl<T> From<T> for Error
where
    T: 'static + error::Error + Send + Sync,
{
    fn from(value: T) -> Error {
        Error::new(value)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.error, fmt)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Error")
            .field("inner", &self.inner)
            .finish()
    }
}

/// Extra convenience functions for results.
pub trait ResultExt<T>
where
    Self: Sized,
{
    /// Replaces the error with the one returned by `chain`, keeping the original as its
    /// [`source`](struct.Error.html#method.source).
    ///
    /// ```rust
    /// use stagehand_error::{Error, ResultExt};
    ///
    /// fn failing_function() -> Result<(), Error> {
    ///     Err(Error::from_string("failing"))
    /// }
    ///
    /// fn other_function() -> Result<(), Error> {
    ///     Ok(failing_function().with_context(|_| Error::from_string("other"))?)
    /// }
    ///
    /// let e = other_function().expect_err("no error");
    /// let messages = e.causes().map(|e| e.to_string()).collect::<Vec<_>>();
    /// assert_eq!(vec!["other", "failing"], messages);
    /// ```
    fn with_context<C, D>(self, chain: C) -> Result<T>
    where
        C: FnOnce(&Error) -> D,
        D: Into<Error>;
}

impl<T, E> ResultExt<T> for result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context<C, D>(self, chain: C) -> Result<T>
    where
        C: FnOnce(&Error) -> D,
        D: Into<Error>,
    {
        match self {
            Err(e) => {
                let e = e.into();
                Err(chain(&e).into().with_source(e))
            }
            Ok(value) => Ok(value),
        }
    }
}

/// An iterator over an error and its causes.
///
/// Created using [`Error::causes`](struct.Error.html#method.causes).
#[derive(Debug, Clone)]
pub struct Causes<'a> {
    current: Option<&'a Error>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a Error;

    fn next(&mut self) -> Option<Self::Item> {
        let e = self.current?;
        self.current = e.source();
        Some(e)
    }
}

/// Constructs an `Error` using the standard string interpolation syntax.
///
/// ```rust
/// #[macro_use] extern crate stagehand_error;
///
/// fn main() {
///     let err = format_err!("template {} is missing", 42);
///     assert_eq!("template 42 is missing", err.to_string());
/// }
/// ```
#[macro_export]
macro_rules! format_err {
    ($($arg:tt)*) => { $crate::Error::from_string(format!($($arg)*)) }
}

#[cfg(feature = "backtrace")]
mod backtrace_support {
    use super::Backtrace;
    use std::{
        env,
        sync::atomic::{AtomicU8, Ordering},
    };

    pub(super) const UNKNOWN: u8 = 0;
    pub(super) const OFF: u8 = 1;
    pub(super) const ON: u8 = 2;

    /// Whether backtraces are captured, read from `RUST_BACKTRACE` on first use.
    pub(super) static CAPTURE: AtomicU8 = AtomicU8::new(UNKNOWN);

    pub(super) fn new_backtrace() -> Option<Backtrace> {
        let mut status = CAPTURE.load(Ordering::Relaxed);
        if status == UNKNOWN {
            let enabled = env::var_os("RUST_BACKTRACE").map_or(false, |v| v != "0");
            status = if enabled { ON } else { OFF };
            CAPTURE.store(status, Ordering::Relaxed);
        }
        if status == ON {
            Some(Backtrace::new())
        } else {
            None
        }
    }
}
