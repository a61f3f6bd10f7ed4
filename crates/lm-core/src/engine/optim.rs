//! Optimizers updating named parameters in place.
//!
//! Per-parameter state (velocities, moment estimates) is keyed by parameter
//! name and persists across steps.

use super::checkpoint::{Tensor, TensorMap};
use crate::error::{MachineError, Result};
use std::collections::HashMap;

pub trait Optimizer: Send {
    /// Apply one update from `grads`.
    ///
    /// Every gradient is checked against its parameter before anything is
    /// written, so a failed step leaves `params` untouched.
    fn step(&mut self, params: &mut TensorMap, grads: &TensorMap) -> Result<()>;
}

/// Stochastic gradient descent with momentum.
///
/// ```text
/// velocity = momentum * velocity + learning_rate * gradient
/// parameter = parameter - velocity
/// ```
pub struct Sgd {
    pub learning_rate: f32,
    pub momentum: f32,
    velocities: HashMap<String, Vec<f32>>,
}

impl Sgd {
    pub fn new(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocities: HashMap::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut TensorMap, grads: &TensorMap) -> Result<()> {
        check_gradients(params, grads)?;
        for (name, grad) in grads {
            let Some(param) = params.get_mut(name) else {
                continue;
            };
            let velocity = self
                .velocities
                .entry(name.clone())
                .or_insert_with(|| vec![0.0; grad.len()]);
            for ((p, v), g) in param.data.iter_mut().zip(velocity.iter_mut()).zip(&grad.data) {
                *v = self.momentum * *v + self.learning_rate * g;
                *p -= *v;
            }
        }
        Ok(())
    }
}

/// Adam (adaptive moment estimation) with bias correction.
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    first_moments: HashMap<String, Vec<f32>>,
    second_moments: HashMap<String, Vec<f32>>,
    t: i32,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            first_moments: HashMap::new(),
            second_moments: HashMap::new(),
            t: 0,
        }
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut TensorMap, grads: &TensorMap) -> Result<()> {
        check_gradients(params, grads)?;
        self.t = self.t.saturating_add(1);
        let bias1 = 1.0 - self.beta1.powi(self.t);
        let bias2 = 1.0 - self.beta2.powi(self.t);

        for (name, grad) in grads {
            let Some(param) = params.get_mut(name) else {
                continue;
            };
            let m = self
                .first_moments
                .entry(name.clone())
                .or_insert_with(|| vec![0.0; grad.len()]);
            let v = self
                .second_moments
                .entry(name.clone())
                .or_insert_with(|| vec![0.0; grad.len()]);

            for i in 0..grad.len() {
                let g = grad.data[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                param.data[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
        Ok(())
    }
}

fn check_gradients(params: &TensorMap, grads: &TensorMap) -> Result<()> {
    for (name, grad) in grads {
        let param: &Tensor = params.get(name).ok_or_else(|| MachineError::Shape {
            message: format!("gradient for unknown parameter '{}'", name),
        })?;
        if param.shape != grad.shape {
            return Err(MachineError::Shape {
                message: format!(
                    "gradient for '{}' has shape {:?}, parameter has {:?}",
                    name, grad.shape, param.shape
                ),
            });
        }
        if grad.data.iter().any(|g| !g.is_finite()) {
            return Err(MachineError::Shape {
                message: format!("gradient for '{}' is not finite", name),
            });
        }
    }
    Ok(())
}
