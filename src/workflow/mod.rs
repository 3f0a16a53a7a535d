// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Step Workflow Engine
//!
//! A linear multi-step form: each step validates its part of the input,
//! and advancing from the last step performs the workflow's submit.
//!
//! ## Transitions
//!
//! ```text
//!  Step(0) ──advance()──► Step(1) ── … ──► Step(N-1) ──advance()/submit ok──► Success
//!     ▲                                        │
//!     │ reset()                                │ submit failed: stay, keep input,
//!     └────────────────────────────────────────┘ record last_error
//! ```
//!
//! | Call | While submitting | After success |
//! |------|------------------|---------------|
//! | `advance()` | `Ignored`, no second submit | `Ignored` |
//! | `update()` | refused | refused |
//! | `reset()` | refused | allowed |
//! | `cancel()` | discards the in-flight result | no-op |
//!
//! Validation failures never change the position. There is no backward
//! step other than `reset()`, which clears all input.

pub mod add_money;

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ValidationErrors};

pub use add_money::{
    AddMoneyInput, AddMoneyReceipt, AddMoneyStep, AddMoneyWorkflow, DepositAccount,
    PaymentMethod, PaymentMode, DEPOSIT_ACCOUNT, QUICK_AMOUNTS,
};

/// A concrete multi-step form.
pub trait Workflow: Send + Sync {
    type Step: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync;
    type Input: Clone + Default + Send;
    type Output: Clone + Send;

    /// Input steps in order. Must not be empty.
    fn steps(&self) -> &[Self::Step];

    /// Errors that block leaving `step`. Empty means the step is complete.
    fn validate(&self, step: Self::Step, input: &Self::Input) -> ValidationErrors;

    /// Side effect performed when the last step is completed.
    fn submit(
        &self,
        input: Self::Input,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Self::Output, ClientError>> + Send;
}

/// Where the wizard currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum Position<S, O> {
    Step(S),
    Success(O),
}

/// Result of [`StepWizard::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Advance<S> {
    Moved(S),
    Completed,
    Rejected(ValidationErrors),
    /// A submit is already in flight, or the wizard has finished.
    Ignored,
    Failed(ClientError),
}

struct WizardState<W: Workflow> {
    index: usize,
    input: W::Input,
    output: Option<W::Output>,
    last_error: Option<ClientError>,
    submitting: bool,
    /// Bumped by `cancel()` and `reset()`; a submit started under an older
    /// generation must not touch the state.
    generation: u64,
    in_flight: CancellationToken,
}

pub struct StepWizard<W: Workflow> {
    workflow: W,
    state: Mutex<WizardState<W>>,
}

impl<W: Workflow> fmt::Debug for StepWizard<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("StepWizard")
            .field("index", &state.index)
            .field("submitting", &state.submitting)
            .field("finished", &state.output.is_some())
            .finish_non_exhaustive()
    }
}

impl<W: Workflow> StepWizard<W> {
    pub fn new(workflow: W) -> Result<Self, ClientError> {
        if workflow.steps().is_empty() {
            return Err(ClientError::Configuration("workflow has no steps".into()));
        }
        Ok(Self {
            workflow,
            state: Mutex::new(WizardState {
                index: 0,
                input: W::Input::default(),
                output: None,
                last_error: None,
                submitting: false,
                generation: 0,
                in_flight: CancellationToken::new(),
            }),
        })
    }

    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    pub fn position(&self) -> Position<W::Step, W::Output> {
        let state = self.lock();
        match &state.output {
            Some(output) => Position::Success(output.clone()),
            None => Position::Step(self.workflow.steps()[state.index]),
        }
    }

    /// 1-based step number; `Success` counts as the step after the last.
    pub fn step_number(&self) -> usize {
        let state = self.lock();
        if state.output.is_some() {
            self.workflow.steps().len() + 1
        } else {
            state.index + 1
        }
    }

    /// Current input step, or `None` once finished.
    pub fn current_step(&self) -> Option<W::Step> {
        let state = self.lock();
        if state.output.is_some() {
            None
        } else {
            Some(self.workflow.steps()[state.index])
        }
    }

    pub fn input(&self) -> W::Input {
        self.lock().input.clone()
    }

    pub fn output(&self) -> Option<W::Output> {
        self.lock().output.clone()
    }

    pub fn last_error(&self) -> Option<ClientError> {
        self.lock().last_error.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().submitting
    }

    /// Edit the input. Returns `false` (and leaves the input alone) while a
    /// submit is in flight or after success.
    pub fn update(&self, edit: impl FnOnce(&mut W::Input)) -> bool {
        let mut state = self.lock();
        if state.submitting || state.output.is_some() {
            return false;
        }
        edit(&mut state.input);
        true
    }

    /// Validate the current step and move forward, submitting from the last one.
    pub async fn advance(&self) -> Advance<W::Step> {
        let (input, generation, cancel) = {
            let mut state = self.lock();
            if state.submitting || state.output.is_some() {
                return Advance::Ignored;
            }

            let steps = self.workflow.steps();
            let step = steps[state.index];
            let errors = self.workflow.validate(step, &state.input);
            if !errors.is_empty() {
                debug!(%step, fields = errors.len(), "Step incomplete");
                return Advance::Rejected(errors);
            }

            if let Some(&next) = steps.get(state.index + 1) {
                state.index += 1;
                state.last_error = None;
                debug!(from = %step, to = %next, "Step advanced");
                return Advance::Moved(next);
            }

            state.submitting = true;
            state.last_error = None;
            state.in_flight = CancellationToken::new();
            info!(%step, "Submitting workflow");
            (state.input.clone(), state.generation, state.in_flight.clone())
        };

        let _reset = SubmitFlag {
            wizard: self,
            generation,
        };
        let result = self.workflow.submit(input, cancel).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!("Discarding result of a cancelled submit");
            return Advance::Failed(ClientError::Cancelled);
        }
        state.submitting = false;
        match result {
            Ok(output) => {
                state.output = Some(output);
                info!("Workflow completed");
                Advance::Completed
            }
            Err(e) => {
                warn!(error = %e, "Workflow submit failed");
                state.last_error = Some(e.clone());
                Advance::Failed(e)
            }
        }
    }

    /// Back to the first step with empty input. Refused while submitting.
    pub fn reset(&self) -> bool {
        let mut state = self.lock();
        if state.submitting {
            return false;
        }
        state.index = 0;
        state.input = W::Input::default();
        state.output = None;
        state.last_error = None;
        state.generation += 1;
        true
    }

    /// Abandon an in-flight submit. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        if !state.submitting {
            return false;
        }
        state.in_flight.cancel();
        state.generation += 1;
        state.submitting = false;
        info!("Workflow submit cancelled");
        true
    }

    fn lock(&self) -> MutexGuard<'_, WizardState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears `submitting` if the `advance()` future is dropped mid-submit.
struct SubmitFlag<'a, W: Workflow> {
    wizard: &'a StepWizard<W>,
    generation: u64,
}

impl<W: Workflow> Drop for SubmitFlag<'_, W> {
    fn drop(&mut self) {
        let mut state = self.wizard.lock();
        if state.generation == self.generation && state.submitting {
            state.submitting = false;
        }
    }
}
