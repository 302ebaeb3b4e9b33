//! The rendering engine seam.
//!
//! An engine reads the [`Configuration`] once in [`TypesetEngine::initialize`]
//! and afterwards reprocesses the current page on every
//! [`TypesetEngine::typeset`] call. Reprocessing is asynchronous: the returned
//! [`Typesetting`] handle may be awaited, or dropped to let the pass run on
//! its own. Overlapping passes are allowed.

pub mod math;
pub mod script;
mod typeset;

pub use math::{MathJaxRenderer, MathRenderer};
pub use script::{inject_config, macro_bootstrap, render_config_script, InjectOptions};
pub use typeset::{Page, Region, Typesetter};

use crate::config::Configuration;
use crate::error::{RenderError, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// A math-rendering engine.
pub trait TypesetEngine: Send + Sync {
    /// Read the configuration. Called once, before any `typeset`.
    fn initialize(&mut self, config: Configuration) -> Result<()>;

    /// Start a reprocessing pass over the current content.
    fn typeset(&self) -> Typesetting;
}

/// Outcome of one reprocessing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypesetReport {
    /// Regions whose math was rendered.
    pub processed: usize,
    /// Regions rejected by the class filter.
    pub skipped: usize,
    /// Math segments rendered across all processed regions.
    pub math: usize,
    /// Math segments that failed and were rendered as error spans.
    pub errors: usize,
    /// The page was swapped during the pass and nothing was written.
    pub stale: bool,
}

/// Completion handle of a reprocessing pass.
///
/// Dropping the handle does not cancel the pass.
#[derive(Debug)]
pub struct Typesetting {
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Running(JoinHandle<Result<TypesetReport>>),
    Ready(Option<Result<TypesetReport>>),
}

impl Typesetting {
    /// Run `pass` on the ambient tokio runtime. Without a runtime the handle
    /// completes immediately with an error.
    pub fn spawn<F>(pass: F) -> Self
    where
        F: Future<Output = Result<TypesetReport>> + Send + 'static,
    {
        let state = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => HandleState::Running(runtime.spawn(pass)),
            Err(e) => HandleState::Ready(Some(Err(RenderError::Task(e.to_string()).into()))),
        };
        Self { state }
    }

    /// A handle that is already complete.
    pub fn ready(result: Result<TypesetReport>) -> Self {
        Self {
            state: HandleState::Ready(Some(result)),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Running(handle) => handle.is_finished(),
            HandleState::Ready(_) => true,
        }
    }

    /// Let the pass run to completion unobserved.
    pub fn detach(self) {}
}

impl Future for Typesetting {
    type Output = Result<TypesetReport>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Running(handle) => Pin::new(handle).poll(cx).map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(RenderError::Task(e.to_string()).into()),
            }),
            HandleState::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(RenderError::Task("polled after completion".into()).into())),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_spawned_pass_completes() {
        let handle = Typesetting::spawn(async {
            Ok(TypesetReport {
                processed: 1,
                ..Default::default()
            })
        });
        let report = handle.await.unwrap();
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let handle = Typesetting::ready(Err(RenderError::NotInitialized.into()));
        assert!(handle.is_finished());
        assert!(matches!(handle.await, Err(Error::Render(RenderError::NotInitialized))));
    }

    #[test]
    fn test_spawn_without_runtime() {
        let handle = Typesetting::spawn(async { Ok(TypesetReport::default()) });
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_panicking_pass_reports_task_error() {
        let handle = Typesetting::spawn(async {
            let report: Option<TypesetReport> = None;
            Ok(report.expect("engine bug"))
        });
        assert!(matches!(handle.await, Err(Error::Render(RenderError::Task(_)))));
    }
}
