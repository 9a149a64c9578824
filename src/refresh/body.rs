// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Response body that recycles connections once it has been consumed

use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use super::Recycle;

/// Scope guard running the recycle (or the test skip) exactly once, on drop
pub(crate) struct RecycleGuard {
    recycler: Option<Arc<dyn Recycle>>,
    skip: bool,
}

impl RecycleGuard {
    pub(crate) fn recycling(recycler: Arc<dyn Recycle>) -> Self {
        Self {
            recycler: Some(recycler),
            skip: false,
        }
    }

    pub(crate) fn skipping(recycler: Arc<dyn Recycle>) -> Self {
        Self {
            recycler: Some(recycler),
            skip: true,
        }
    }
}

impl Drop for RecycleGuard {
    fn drop(&mut self) {
        let Some(recycler) = self.recycler.take() else {
            return;
        };
        if self.skip {
            recycler.skip();
        } else {
            recycler.recycle();
        }
    }
}

pin_project! {
    /// Wraps a response body and recycles connections after its last frame.
    ///
    /// The recycle runs when the inner body reports the end of the stream,
    /// yields an error, or is dropped before being read to the end.
    pub struct RecycleBody<B> {
        #[pin]
        inner: B,
        guard: Option<RecycleGuard>,
    }
}

impl<B> RecycleBody<B> {
    pub(crate) fn new(inner: B, guard: Option<RecycleGuard>) -> Self {
        Self { inner, guard }
    }

    /// Whether the recycle is still pending
    pub fn is_armed(&self) -> bool {
        self.guard.is_some()
    }
}

impl<B: Body> Body for RecycleBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));
        if !matches!(frame, Some(Ok(_))) {
            drop(this.guard.take());
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::RecycleKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        recycles: AtomicUsize,
        skips: AtomicUsize,
    }

    impl Recycle for Counting {
        fn recycle(&self) -> RecycleKind {
            self.recycles.fetch_add(1, Ordering::SeqCst);
            RecycleKind::All
        }

        fn skip(&self) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_recycles_once_on_drop() {
        let counting = Arc::new(Counting::default());
        let guard = RecycleGuard::recycling(counting.clone());
        drop(guard);

        assert_eq!(counting.recycles.load(Ordering::SeqCst), 1);
        assert_eq!(counting.skips.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_skipping_guard_never_recycles() {
        let counting = Arc::new(Counting::default());
        drop(RecycleGuard::skipping(counting.clone()));

        assert_eq!(counting.recycles.load(Ordering::SeqCst), 0);
        assert_eq!(counting.skips.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unread_body_recycles_on_drop() {
        let counting = Arc::new(Counting::default());
        let body = RecycleBody::new(
            String::from("unread"),
            Some(RecycleGuard::recycling(counting.clone())),
        );
        assert!(body.is_armed());
        assert_eq!(counting.recycles.load(Ordering::SeqCst), 0);

        drop(body);
        assert_eq!(counting.recycles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_size_hint_passes_through() {
        let body = RecycleBody::new(String::from("four"), None);
        assert_eq!(body.size_hint().exact(), Some(4));
        assert!(!body.is_end_stream());
    }
}
