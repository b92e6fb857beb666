//! Composable asynchronous transformations.
//!
//! An [`Arrow`] is an opaque, cloneable `In -> Out` async function value.
//! Arrows compose sequentially with [`Arrow::then`], transform outputs
//! with [`Arrow::map`], observe results with [`Arrow::tap`], and convert
//! unexpected panics into explicit failures with [`Arrow::catch`].
//!
//! [`TryArrow`] and [`MaybeArrow`] are the `Result`- and `Option`-carrying
//! variants: their `then` short-circuits, never invoking the second arrow
//! when the first produced `Err` / `None`.
//!
//! Composition is associative: `f.then(g).then(h)` and `f.then(g.then(h))`
//! are observationally equivalent for any input. The whole pipeline relies
//! on that law; `tests/arrow_laws.rs` exercises it property-based.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future type used by arrow internals.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A composable asynchronous function from `A` to `B`.
pub struct Arrow<A, B> {
    f: Arc<dyn Fn(A) -> BoxFuture<B> + Send + Sync>,
}

impl<A, B> Clone for Arrow<A, B> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<A, B> Arrow<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    /// Wrap an async function as an arrow.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = B> + Send + 'static,
    {
        Self {
            f: Arc::new(move |a| Box::pin(f(a))),
        }
    }

    /// Evaluate the arrow on an input.
    pub async fn run(&self, input: A) -> B {
        (self.f)(input).await
    }

    /// Sequential composition: run `self`, await its result, feed it to `next`.
    pub fn then<C>(self, next: Arrow<B, C>) -> Arrow<A, C>
    where
        C: Send + 'static,
    {
        Arrow::new(move |a: A| {
            let first = self.clone();
            let second = next.clone();
            async move { second.run(first.run(a).await).await }
        })
    }

    /// Transform the output value without another await point.
    pub fn map<C>(self, f: impl Fn(B) -> C + Send + Sync + 'static) -> Arrow<A, C>
    where
        C: Send + 'static,
    {
        let f = Arc::new(f);
        Arrow::new(move |a: A| {
            let this = self.clone();
            let f = Arc::clone(&f);
            async move { f(this.run(a).await) }
        })
    }

    /// Run a side-effecting action on the result without altering it.
    pub fn tap(self, action: impl Fn(&B) + Send + Sync + 'static) -> Arrow<A, B> {
        let action = Arc::new(action);
        Arrow::new(move |a: A| {
            let this = self.clone();
            let action = Arc::clone(&action);
            async move {
                let out = this.run(a).await;
                action(&out);
                out
            }
        })
    }

    /// Convert an arrow that may panic into one that returns `Err`.
    ///
    /// The evaluation runs on a separate task so an unwind is trapped and
    /// surfaced as the panic payload text. Only this arrow's evaluation is
    /// wrapped; composition outside the trap still fails loudly.
    pub fn catch(self) -> TryArrow<A, B, String> {
        TryArrow::from_fn(move |a: A| {
            let this = self.clone();
            async move {
                match tokio::task::spawn(async move { this.run(a).await }).await {
                    Ok(value) => Ok(value),
                    Err(join_err) => Err(panic_message(join_err)),
                }
            }
        })
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                format!("arrow panicked: {}", s)
            } else if let Some(s) = payload.downcast_ref::<String>() {
                format!("arrow panicked: {}", s)
            } else {
                "arrow panicked".to_string()
            }
        }
        Err(join_err) => format!("arrow evaluation aborted: {}", join_err),
    }
}

/// A `Result`-carrying arrow `A -> Result<B, E>` with short-circuiting
/// composition.
pub struct TryArrow<A, B, E> {
    inner: Arrow<A, Result<B, E>>,
}

impl<A, B, E> Clone for TryArrow<A, B, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, B, E> TryArrow<A, B, E>
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
{
    /// Wrap an async fallible function as an arrow.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<B, E>> + Send + 'static,
    {
        Self {
            inner: Arrow::new(f),
        }
    }

    /// Lift an infallible arrow into the `Result`-carrying variant.
    pub fn lift(arrow: Arrow<A, B>) -> Self {
        Self {
            inner: arrow.map(Ok),
        }
    }

    /// Evaluate the arrow on an input.
    pub async fn run(&self, input: A) -> Result<B, E> {
        self.inner.run(input).await
    }

    /// Kleisli composition: `next` is not invoked when `self` returns `Err`.
    pub fn then<C>(self, next: TryArrow<B, C, E>) -> TryArrow<A, C, E>
    where
        C: Send + 'static,
    {
        TryArrow::from_fn(move |a: A| {
            let first = self.clone();
            let second = next.clone();
            async move {
                match first.run(a).await {
                    Ok(mid) => second.run(mid).await,
                    Err(e) => Err(e),
                }
            }
        })
    }

    /// Transform only the success payload.
    pub fn map<C>(self, f: impl Fn(B) -> C + Send + Sync + 'static) -> TryArrow<A, C, E>
    where
        C: Send + 'static,
    {
        let f = Arc::new(f);
        TryArrow {
            inner: self.inner.map(move |res| res.map(|b| f(b))),
        }
    }

    /// Transform only the error payload.
    pub fn map_err<E2>(self, f: impl Fn(E) -> E2 + Send + Sync + 'static) -> TryArrow<A, B, E2>
    where
        E2: Send + 'static,
    {
        let f = Arc::new(f);
        TryArrow {
            inner: self.inner.map(move |res| res.map_err(|e| f(e))),
        }
    }

    /// Run a side-effecting action on the result without altering it.
    pub fn tap(self, action: impl Fn(&Result<B, E>) + Send + Sync + 'static) -> Self {
        Self {
            inner: self.inner.tap(action),
        }
    }
}

/// An `Option`-carrying arrow `A -> Option<B>` with short-circuiting
/// composition.
pub struct MaybeArrow<A, B> {
    inner: Arrow<A, Option<B>>,
}

impl<A, B> Clone for MaybeArrow<A, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, B> MaybeArrow<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    /// Wrap an async partial function as an arrow.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<B>> + Send + 'static,
    {
        Self {
            inner: Arrow::new(f),
        }
    }

    /// Evaluate the arrow on an input.
    pub async fn run(&self, input: A) -> Option<B> {
        self.inner.run(input).await
    }

    /// Composition: `next` is not invoked when `self` returns `None`.
    pub fn then<C>(self, next: MaybeArrow<B, C>) -> MaybeArrow<A, C>
    where
        C: Send + 'static,
    {
        MaybeArrow::from_fn(move |a: A| {
            let first = self.clone();
            let second = next.clone();
            async move {
                match first.run(a).await {
                    Some(mid) => second.run(mid).await,
                    None => None,
                }
            }
        })
    }

    /// Transform only the present payload.
    pub fn map<C>(self, f: impl Fn(B) -> C + Send + Sync + 'static) -> MaybeArrow<A, C>
    where
        C: Send + 'static,
    {
        let f = Arc::new(f);
        MaybeArrow {
            inner: self.inner.map(move |opt| opt.map(|b| f(b))),
        }
    }
}
