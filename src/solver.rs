// Time integration of an `OdeSystem` onto a fixed output grid
//
// The system only supplies derivatives; stepping, error control and output
// sampling all live here.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::ModelError;
use crate::model::OdeSystem;

// Hard cap on internal steps per output interval for the adaptive solver
const MAX_STEPS_PER_INTERVAL: usize = 100_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Classic fixed-step Runge-Kutta
    Rk4,
    /// Adaptive Dormand-Prince 5(4)
    #[default]
    Dopri5,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Rk4 => write!(f, "rk4"),
            SolverKind::Dopri5 => write!(f, "dopri5"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolverSettings {
    pub kind: SolverKind,
    /// RK4 steps per output interval
    pub substeps: usize,
    pub rtol: f64,
    pub atol: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            kind: SolverKind::Dopri5,
            substeps: 4,
            rtol: 1e-6,
            atol: 1e-9,
        }
    }
}

/// `points` evenly spaced values from 0 to `t_max` inclusive
pub fn linspace(t_max: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let dt = t_max / (points - 1) as f64;
            (0..points)
                .map(|i| if i == points - 1 { t_max } else { i as f64 * dt })
                .collect()
        }
    }
}

/// Sampled solution: `states[i]` is the state vector at `times[i]`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Summed population at each time point
    pub fn totals(&self) -> Vec<f64> {
        self.states.iter().map(|x| x.iter().sum()).collect()
    }

    /// Time series of a single strain
    pub fn series(&self, j: usize) -> Vec<f64> {
        self.states.iter().map(|x| x[j]).collect()
    }

    pub fn final_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }
}

/// Integrate `system` from its initial state, sampling at each entry of `times`.
///
/// `times` must be increasing; the first entry is the initial time. `label`
/// names the system in errors.
pub fn integrate<S: OdeSystem + ?Sized>(
    system: &S,
    label: &str,
    times: &[f64],
    settings: &SolverSettings,
) -> Result<Trajectory, ModelError> {
    let mut trajectory = Trajectory {
        times: times.to_vec(),
        states: Vec::with_capacity(times.len()),
    };
    if times.is_empty() {
        return Ok(trajectory);
    }

    let mut x = system.initial_state();
    trajectory.states.push(x.clone());

    let mut stepper = match settings.kind {
        SolverKind::Rk4 => Stepper::Rk4(Rk4::new(system.dimension(), settings.substeps.max(1))),
        SolverKind::Dopri5 => Stepper::Dopri5(Dopri5::new(system.dimension(), settings)),
    };

    for window in times.windows(2) {
        let (t0, t1) = (window[0], window[1]);
        match &mut stepper {
            Stepper::Rk4(rk) => rk.advance(system, &mut x, t0, t1),
            Stepper::Dopri5(dp) => dp.advance(system, &mut x, t0, t1).map_err(|reason| {
                ModelError::Integration {
                    environment: label.to_string(),
                    t: t0,
                    reason,
                }
            })?,
        }

        if let Some(bad) = x.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::Integration {
                environment: label.to_string(),
                t: t1,
                reason: format!("state component {} is {}", bad, x[bad]),
            });
        }
        trajectory.states.push(x.clone());
    }

    if let Stepper::Dopri5(dp) = &stepper {
        debug!(
            system = label,
            accepted = dp.accepted,
            rejected = dp.rejected,
            "adaptive integration finished"
        );
    }
    Ok(trajectory)
}

enum Stepper {
    Rk4(Rk4),
    Dopri5(Dopri5),
}

// Classic RK4 with a fixed number of equal steps per output interval
struct Rk4 {
    substeps: usize,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk4 {
    fn new(n: usize, substeps: usize) -> Self {
        Self {
            substeps,
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            tmp: vec![0.0; n],
        }
    }

    fn advance<S: OdeSystem + ?Sized>(&mut self, system: &S, x: &mut [f64], t0: f64, t1: f64) {
        let h = (t1 - t0) / self.substeps as f64;
        for i in 0..self.substeps {
            let t = t0 + i as f64 * h;
            self.step(system, x, t, h);
        }
    }

    fn step<S: OdeSystem + ?Sized>(&mut self, system: &S, x: &mut [f64], t: f64, h: f64) {
        system.derivatives(x, t, &mut self.k1);

        for i in 0..x.len() {
            self.tmp[i] = x[i] + 0.5 * h * self.k1[i];
        }
        system.derivatives(&self.tmp, t + 0.5 * h, &mut self.k2);

        for i in 0..x.len() {
            self.tmp[i] = x[i] + 0.5 * h * self.k2[i];
        }
        system.derivatives(&self.tmp, t + 0.5 * h, &mut self.k3);

        for i in 0..x.len() {
            self.tmp[i] = x[i] + h * self.k3[i];
        }
        system.derivatives(&self.tmp, t + h, &mut self.k4);

        for i in 0..x.len() {
            x[i] += h / 6.0 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
        }
    }
}

// Dormand-Prince 5(4) tableau
const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A: [[f64; 6]; 7] = [
    [0.0; 6],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];
// Fifth-order weights (same as the last stage row)
const B: [f64; 7] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
// Fifth minus fourth order weights
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

struct Dopri5 {
    rtol: f64,
    atol: f64,
    // Proposed next step size, carried across output intervals
    h: Option<f64>,
    k: [Vec<f64>; 7],
    stage: Vec<f64>,
    next: Vec<f64>,
    accepted: usize,
    rejected: usize,
}

impl Dopri5 {
    fn new(n: usize, settings: &SolverSettings) -> Self {
        Self {
            rtol: settings.rtol,
            atol: settings.atol,
            h: None,
            k: std::array::from_fn(|_| vec![0.0; n]),
            stage: vec![0.0; n],
            next: vec![0.0; n],
            accepted: 0,
            rejected: 0,
        }
    }

    fn advance<S: OdeSystem + ?Sized>(
        &mut self,
        system: &S,
        x: &mut [f64],
        t0: f64,
        t1: f64,
    ) -> Result<(), String> {
        let span = t1 - t0;
        let mut h = self.h.unwrap_or(span);
        let mut t = t0;
        let mut steps = 0;

        while t < t1 {
            if steps >= MAX_STEPS_PER_INTERVAL {
                return Err(format!(
                    "more than {} steps needed between t = {} and t = {}",
                    MAX_STEPS_PER_INTERVAL, t0, t1
                ));
            }
            steps += 1;

            let remaining = t1 - t;
            // Stretch a step that would stop just short of t1 rather than leave a sliver
            let clamped = h * 1.01 >= remaining;
            let step = if clamped { remaining } else { h };
            if step <= f64::EPSILON * t.abs().max(1.0) {
                return Err(format!("step size underflow at t = {}", t));
            }

            let err = self.trial(system, x, t, step);
            if !err.is_finite() {
                self.rejected += 1;
                h = step * 0.2;
                continue;
            }

            let factor = if err == 0.0 {
                5.0
            } else {
                (0.9 * err.powf(-0.2)).clamp(0.2, 5.0)
            };

            if err <= 1.0 {
                self.accepted += 1;
                x.copy_from_slice(&self.next);
                t = if clamped { t1 } else { t + step };
                // A step shortened to hit t1 says nothing about the natural step size
                h = if clamped { h.max(step * factor) } else { step * factor };
            } else {
                self.rejected += 1;
                h = step * factor.min(1.0);
            }
        }

        self.h = Some(h);
        Ok(())
    }

    // One trial step of size h from (t, x): fills `next`, returns the scaled error norm
    fn trial<S: OdeSystem + ?Sized>(&mut self, system: &S, x: &[f64], t: f64, h: f64) -> f64 {
        let n = x.len();
        for s in 0..7 {
            for i in 0..n {
                let mut acc = 0.0;
                for (j, a) in A[s].iter().enumerate().take(s) {
                    acc += a * self.k[j][i];
                }
                self.stage[i] = x[i] + h * acc;
            }
            system.derivatives(&self.stage, t + C[s] * h, &mut self.k[s]);
        }

        let mut sum = 0.0;
        for i in 0..n {
            let mut acc = 0.0;
            let mut err = 0.0;
            for s in 0..7 {
                acc += B[s] * self.k[s][i];
                err += E[s] * self.k[s][i];
            }
            self.next[i] = x[i] + h * acc;
            let scale = self.atol + self.rtol * x[i].abs().max(self.next[i].abs());
            let ratio = h * err / scale;
            sum += ratio * ratio;
        }
        if n == 0 {
            0.0
        } else {
            (sum / n as f64).sqrt()
        }
    }
}
