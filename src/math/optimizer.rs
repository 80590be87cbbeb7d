// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Skeleton of iterative optimization algorithms.

/// Returned by `stop_criterion` to tell whether to iterate again.
pub enum Continue {
    /// Stop iterations.
    Stop,
    /// Do one more iteration.
    Forward,
}

/// State of an iterative minimization.
///
/// * `Observations`: fixed data the energy is evaluated against.
/// * `EvalState`: result of the evaluation of a candidate model,
///   possibly partial so that rejected candidates stay cheap.
/// * `Model`: what is optimized.
/// * `Error`: reason for aborting, when no step can be computed.
pub trait OptimizerState<Observations, EvalState, Model, Error>
where
    Self: std::marker::Sized,
{
    /// Initial state, from an initial model.
    fn init(obs: &Observations, model: Model) -> Self;

    /// Candidate model for the next iteration.
    fn step(&self) -> Result<Model, Error>;

    /// Evaluate a candidate model.
    fn eval(&self, obs: &Observations, new_model: Model) -> EvalState;

    /// Decide between the current state and the evaluated candidate,
    /// and whether to continue.
    fn stop_criterion(self, nb_iter: usize, eval_state: EvalState) -> (Self, Continue);

    /// Iterate until `stop_criterion` says so.
    /// Returns the final state and the number of iterations,
    /// or the error of the first step that could not be computed.
    fn iterative_solve(obs: &Observations, initial_model: Model) -> Result<(Self, usize), Error> {
        let mut state = Self::init(obs, initial_model);
        let mut nb_iter = 0;
        loop {
            nb_iter += 1;
            let new_model = state.step()?;
            let eval_state = state.eval(obs, new_model);
            let (kept_state, continuation) = state.stop_criterion(nb_iter, eval_state);
            state = kept_state;
            if let Continue::Stop = continuation {
                return Ok((state, nb_iter));
            }
        }
    }
}
