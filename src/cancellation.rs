//! Cancellation and deadlines passed through to generators.
//!
//! The engine does not manage cancellation itself. A [`CallContext`] travels
//! with a resolution request and is handed to every generator that declares a
//! `CallContext` parameter; honoring it is the generator's job. What the engine
//! does guarantee is that a result produced under a cancelled or expired context
//! is never memoized, so a later call retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A token that signals cancellation to generators.
///
/// Child tokens observe their parent's cancellation, which maps naturally
/// onto nested request scopes.
///
/// # Examples
///
/// ```
/// use stratum_di::CancellationToken;
///
/// let request = CancellationToken::new();
/// let step = request.child_token();
///
/// request.cancel();
/// assert!(step.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// Creates a new, uncancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Creates a token that is cancelled when either it or `self` is.
    pub fn child_token(&self) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Returns true if this token or any ancestor was cancelled.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match &self.inner.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Completes once cancellation is requested.
    #[cfg(feature = "async")]
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The call-scoped context of one resolution request.
///
/// Declare a `CallContext` parameter on a generator to receive it:
///
/// ```
/// use stratum_di::{CallContext, CancellationToken, Layer, Resolver, ResolveError};
/// use std::sync::Arc;
///
/// struct Report(String);
///
/// let layer = Layer::builder()
///     .generator(|ctx: CallContext| {
///         if ctx.is_cancelled() {
///             return Err("gave up");
///         }
///         Ok(Arc::new(Report("done".into())))
///     })
///     .build()
///     .unwrap();
///
/// let token = CancellationToken::new();
/// token.cancel();
/// let ctx = CallContext::background().with_token(token);
/// assert!(matches!(
///     layer.resolve_with::<Report>(&ctx),
///     Err(ResolveError::Canceled { .. })
/// ));
///
/// // Nothing was memoized, so a fresh request still runs the generator.
/// assert_eq!(layer.resolve::<Report>().unwrap().0, "done");
/// ```
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Replaces the cancellation token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// True when the token is cancelled or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
