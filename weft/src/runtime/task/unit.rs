use super::core::{Body, Value};
use crate::error::TaskError;
use crate::runtime::suspend::{Suspend, Suspension};
use crate::runtime::yield_now::yield_now;

use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A suspendable unit of work producing a `T`.
///
/// A unit is inert until it is either registered with a scheduler as a
/// top-level task, or awaited from inside another task. Awaiting it makes
/// the awaiting task yield it as a nested unit: the scheduler runs it as a
/// child and resumes the parent with the child's result, or raises the
/// child's error at the `.await`.
///
/// # Examples
///
/// ```rust,ignore
/// let child = Unit::new(async { Ok::<_, TaskError>(21) });
///
/// scheduler.register(Unit::new(async move {
///     let half = child.await?;
///     assert_eq!(half * 2, 42);
///     Ok(())
/// }));
/// ```
pub struct Unit<T> {
    body: Body,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Unit<T> {
    /// Creates a unit from a future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, TaskError>> + 'static,
    {
        Self {
            body: Box::pin(async move { future.await.map(|value| Box::new(value) as Value) }),
            _marker: PhantomData,
        }
    }

    /// Wraps an already computed value.
    ///
    /// The unit performs one plain yield and then completes with `value`,
    /// so synchronous results are scheduled like any other unit.
    pub fn ready(value: T) -> Self {
        Self::new(async move {
            yield_now().await;
            Ok(value)
        })
    }

    /// Creates a unit that fails with `error` as soon as it is resumed.
    pub fn fail(error: TaskError) -> Self {
        Self::new(async move { Err(error) })
    }

    pub(crate) fn into_body(self) -> Body {
        self.body
    }
}

impl<T> fmt::Debug for Unit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("output", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> IntoFuture for Unit<T> {
    type Output = Result<T, TaskError>;
    type IntoFuture = Nested<T>;

    fn into_future(self) -> Self::IntoFuture {
        Nested {
            inner: Suspension::new(Suspend::Nested(self.body)),
            _marker: PhantomData,
        }
    }
}

/// Suspension point awaiting a nested unit.
pub struct Nested<T> {
    inner: Suspension,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Future for Nested<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|payload| payload.downcast::<T>())
    }
}

/// Conversion into a [`Unit`].
///
/// Implemented for units themselves and for synchronous results, so code
/// that produces work can return either a multi-step suspending procedure
/// or a plain value and be scheduled the same way.
pub trait IntoUnit {
    type Output: 'static;

    fn into_unit(self) -> Unit<Self::Output>;
}

impl<T: 'static> IntoUnit for Unit<T> {
    type Output = T;

    fn into_unit(self) -> Unit<T> {
        self
    }
}

impl<T: 'static> IntoUnit for Result<T, TaskError> {
    type Output = T;

    fn into_unit(self) -> Unit<T> {
        match self {
            Ok(value) => Unit::ready(value),
            Err(error) => Unit::fail(error),
        }
    }
}

impl IntoUnit for () {
    type Output = ();

    fn into_unit(self) -> Unit<()> {
        Unit::ready(())
    }
}

/// Calls `f` and turns whatever it returns into a unit.
///
/// # Examples
///
/// ```rust,ignore
/// let sync = weft::from_fn(|| Ok::<_, TaskError>(7));
/// let suspending = weft::from_fn(|| Unit::new(async { Ok::<_, TaskError>(7) }));
/// ```
pub fn from_fn<F, R>(f: F) -> Unit<R::Output>
where
    F: FnOnce() -> R,
    R: IntoUnit,
{
    f().into_unit()
}
