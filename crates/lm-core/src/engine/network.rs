//! Reference networks.
//!
//! The engine treats a network as `forward(batch) -> rows of C scores` plus a
//! `backward` that turns output gradients into named parameter gradients.
//! Parameters are kept in a [`TensorMap`] under the same names they use in
//! checkpoint files.

use super::checkpoint::{Tensor, TensorMap};
use crate::error::{MachineError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A differentiable batch function with named parameters.
pub trait Network: Send {
    fn input_len(&self) -> usize;

    fn output_len(&self) -> usize;

    /// One output row per input row, in input order.
    fn forward(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>>;

    /// Gradient of the loss for every parameter, given the gradient with
    /// respect to each output row. Does not modify the parameters.
    fn backward(&self, inputs: &[Vec<f32>], grad_outputs: &[Vec<f32>]) -> Result<TensorMap>;

    fn parameters(&self) -> &TensorMap;

    fn parameters_mut(&mut self) -> &mut TensorMap;
}

/// Single fully connected layer: `y = W x + b`.
pub struct DenseNet {
    params: TensorMap,
    input_len: usize,
    output_len: usize,
}

impl DenseNet {
    pub const WEIGHT: &'static str = "weight";
    pub const BIAS: &'static str = "bias";

    pub fn from_tensors(tensors: TensorMap, input_len: usize, output_len: usize) -> Result<Self> {
        expect_shape(&tensors, Self::WEIGHT, &[output_len, input_len])?;
        expect_shape(&tensors, Self::BIAS, &[output_len])?;
        Ok(Self {
            params: tensors,
            input_len,
            output_len,
        })
    }

    /// Freshly initialized parameters.
    pub fn initial_tensors(input_len: usize, output_len: usize, seed: u64) -> TensorMap {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tensors = TensorMap::new();
        let (weight, bias) = init_affine(&mut rng, input_len, output_len);
        tensors.insert(Self::WEIGHT.to_string(), weight);
        tensors.insert(Self::BIAS.to_string(), bias);
        tensors
    }
}

impl Network for DenseNet {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn forward(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        check_rows("input", inputs, self.input_len)?;
        let weight = param(&self.params, Self::WEIGHT)?;
        let bias = param(&self.params, Self::BIAS)?;
        Ok(inputs.iter().map(|x| affine(weight, bias, x)).collect())
    }

    fn backward(&self, inputs: &[Vec<f32>], grad_outputs: &[Vec<f32>]) -> Result<TensorMap> {
        check_rows("input", inputs, self.input_len)?;
        check_rows("output gradient", grad_outputs, self.output_len)?;
        check_batch(inputs, grad_outputs)?;

        let mut grad_weight = Tensor::zeros(vec![self.output_len, self.input_len]);
        let mut grad_bias = Tensor::zeros(vec![self.output_len]);
        for (x, g) in inputs.iter().zip(grad_outputs) {
            accumulate_affine(&mut grad_weight, &mut grad_bias, x, g);
        }

        let mut grads = TensorMap::new();
        grads.insert(Self::WEIGHT.to_string(), grad_weight);
        grads.insert(Self::BIAS.to_string(), grad_bias);
        Ok(grads)
    }

    fn parameters(&self) -> &TensorMap {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut TensorMap {
        &mut self.params
    }
}

/// Two fully connected layers with a ReLU in between.
pub struct MlpNet {
    params: TensorMap,
    input_len: usize,
    hidden_len: usize,
    output_len: usize,
}

impl MlpNet {
    pub const HIDDEN_WEIGHT: &'static str = "hidden.weight";
    pub const HIDDEN_BIAS: &'static str = "hidden.bias";
    pub const OUTPUT_WEIGHT: &'static str = "output.weight";
    pub const OUTPUT_BIAS: &'static str = "output.bias";

    /// Build from checkpoint tensors; the hidden width is read from them.
    pub fn from_tensors(tensors: TensorMap, input_len: usize, output_len: usize) -> Result<Self> {
        let hidden_len = param(&tensors, Self::HIDDEN_BIAS)?
            .shape
            .first()
            .copied()
            .unwrap_or(0);
        expect_shape(&tensors, Self::HIDDEN_WEIGHT, &[hidden_len, input_len])?;
        expect_shape(&tensors, Self::HIDDEN_BIAS, &[hidden_len])?;
        expect_shape(&tensors, Self::OUTPUT_WEIGHT, &[output_len, hidden_len])?;
        expect_shape(&tensors, Self::OUTPUT_BIAS, &[output_len])?;
        Ok(Self {
            params: tensors,
            input_len,
            hidden_len,
            output_len,
        })
    }

    pub fn initial_tensors(
        input_len: usize,
        hidden_len: usize,
        output_len: usize,
        seed: u64,
    ) -> TensorMap {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tensors = TensorMap::new();
        let (w1, b1) = init_affine(&mut rng, input_len, hidden_len);
        let (w2, b2) = init_affine(&mut rng, hidden_len, output_len);
        tensors.insert(Self::HIDDEN_WEIGHT.to_string(), w1);
        tensors.insert(Self::HIDDEN_BIAS.to_string(), b1);
        tensors.insert(Self::OUTPUT_WEIGHT.to_string(), w2);
        tensors.insert(Self::OUTPUT_BIAS.to_string(), b2);
        tensors
    }

    pub fn hidden_len(&self) -> usize {
        self.hidden_len
    }

    fn hidden(&self, x: &[f32]) -> Result<Vec<f32>> {
        let weight = param(&self.params, Self::HIDDEN_WEIGHT)?;
        let bias = param(&self.params, Self::HIDDEN_BIAS)?;
        Ok(affine(weight, bias, x).into_iter().map(|v| v.max(0.0)).collect())
    }
}

impl Network for MlpNet {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn forward(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        check_rows("input", inputs, self.input_len)?;
        let weight = param(&self.params, Self::OUTPUT_WEIGHT)?;
        let bias = param(&self.params, Self::OUTPUT_BIAS)?;
        inputs
            .iter()
            .map(|x| -> Result<Vec<f32>> { Ok(affine(weight, bias, &self.hidden(x)?)) })
            .collect()
    }

    fn backward(&self, inputs: &[Vec<f32>], grad_outputs: &[Vec<f32>]) -> Result<TensorMap> {
        check_rows("input", inputs, self.input_len)?;
        check_rows("output gradient", grad_outputs, self.output_len)?;
        check_batch(inputs, grad_outputs)?;
        let output_weight = param(&self.params, Self::OUTPUT_WEIGHT)?;

        let mut grad_w1 = Tensor::zeros(vec![self.hidden_len, self.input_len]);
        let mut grad_b1 = Tensor::zeros(vec![self.hidden_len]);
        let mut grad_w2 = Tensor::zeros(vec![self.output_len, self.hidden_len]);
        let mut grad_b2 = Tensor::zeros(vec![self.output_len]);

        for (x, g) in inputs.iter().zip(grad_outputs) {
            let h = self.hidden(x)?;
            accumulate_affine(&mut grad_w2, &mut grad_b2, &h, g);

            // Back through the output layer, then the ReLU.
            let grad_h: Vec<f32> = (0..self.hidden_len)
                .map(|j| {
                    if h[j] <= 0.0 {
                        return 0.0;
                    }
                    (0..self.output_len)
                        .map(|c| output_weight.data[c * self.hidden_len + j] * g[c])
                        .sum::<f32>()
                })
                .collect();
            accumulate_affine(&mut grad_w1, &mut grad_b1, x, &grad_h);
        }

        let mut grads = TensorMap::new();
        grads.insert(Self::HIDDEN_WEIGHT.to_string(), grad_w1);
        grads.insert(Self::HIDDEN_BIAS.to_string(), grad_b1);
        grads.insert(Self::OUTPUT_WEIGHT.to_string(), grad_w2);
        grads.insert(Self::OUTPUT_BIAS.to_string(), grad_b2);
        Ok(grads)
    }

    fn parameters(&self) -> &TensorMap {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut TensorMap {
        &mut self.params
    }
}

fn param<'a>(tensors: &'a TensorMap, name: &str) -> Result<&'a Tensor> {
    tensors.get(name).ok_or_else(|| MachineError::Checkpoint {
        message: format!("missing tensor '{}'", name),
    })
}

fn expect_shape(tensors: &TensorMap, name: &str, shape: &[usize]) -> Result<()> {
    let tensor = param(tensors, name)?;
    if tensor.shape != shape {
        return Err(MachineError::Checkpoint {
            message: format!(
                "tensor '{}' has shape {:?}, expected {:?}",
                name, tensor.shape, shape
            ),
        });
    }
    Ok(())
}

fn check_rows(what: &str, rows: &[Vec<f32>], len: usize) -> Result<()> {
    match rows.iter().position(|r| r.len() != len) {
        Some(i) => Err(MachineError::Shape {
            message: format!(
                "{} row {} has {} values, expected {}",
                what,
                i,
                rows[i].len(),
                len
            ),
        }),
        None => Ok(()),
    }
}

fn check_batch(inputs: &[Vec<f32>], grad_outputs: &[Vec<f32>]) -> Result<()> {
    if inputs.len() != grad_outputs.len() {
        return Err(MachineError::Shape {
            message: format!(
                "{} inputs but {} output gradients",
                inputs.len(),
                grad_outputs.len()
            ),
        });
    }
    Ok(())
}

/// `W x + b` for `W` of shape `[rows, cols]`.
fn affine(weight: &Tensor, bias: &Tensor, x: &[f32]) -> Vec<f32> {
    let cols = x.len();
    bias.data
        .iter()
        .enumerate()
        .map(|(r, b)| {
            let row = &weight.data[r * cols..(r + 1) * cols];
            b + row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>()
        })
        .collect()
}

/// Add the gradients of one affine application to the running sums.
fn accumulate_affine(grad_weight: &mut Tensor, grad_bias: &mut Tensor, x: &[f32], g: &[f32]) {
    let cols = x.len();
    for (r, &gr) in g.iter().enumerate() {
        grad_bias.data[r] += gr;
        if gr == 0.0 {
            continue;
        }
        for (w, &v) in grad_weight.data[r * cols..(r + 1) * cols].iter_mut().zip(x) {
            *w += gr * v;
        }
    }
}

/// Uniform init in `±1/sqrt(fan_in)`.
fn init_affine(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> (Tensor, Tensor) {
    let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
    let mut sample =
        |n: usize| -> Vec<f32> { (0..n).map(|_| rng.random_range(-bound..bound)).collect() };
    let weight = Tensor {
        shape: vec![fan_out, fan_in],
        data: sample(fan_out * fan_in),
    };
    let bias = Tensor {
        shape: vec![fan_out],
        data: sample(fan_out),
    };
    (weight, bias)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_2x3() -> DenseNet {
        let mut tensors = TensorMap::new();
        tensors.insert(
            DenseNet::WEIGHT.to_string(),
            Tensor::new(vec![2, 3], vec![1.0, 0.0, -1.0, 0.5, 0.5, 0.5]).unwrap(),
        );
        tensors.insert(
            DenseNet::BIAS.to_string(),
            Tensor::new(vec![2], vec![0.1, -0.1]).unwrap(),
        );
        DenseNet::from_tensors(tensors, 3, 2).unwrap()
    }

    #[test]
    fn test_dense_forward() {
        let net = dense_2x3();
        let out = net.forward(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert!((out[0][0] - (1.0 - 3.0 + 0.1)).abs() < 1e-6);
        assert!((out[0][1] - (3.0 - 0.1)).abs() < 1e-6);
    }

    #[test]
    fn test_dense_backward() {
        let net = dense_2x3();
        let grads = net
            .backward(&[vec![1.0, 2.0, 3.0], vec![0.0, 1.0, 0.0]], &[vec![1.0, 0.0], vec![0.0, 2.0]])
            .unwrap();
        assert_eq!(grads[DenseNet::WEIGHT].data, vec![1.0, 2.0, 3.0, 0.0, 2.0, 0.0]);
        assert_eq!(grads[DenseNet::BIAS].data, vec![1.0, 2.0]);
    }

    #[test]
    fn test_dense_rejects_wrong_input_len() {
        let net = dense_2x3();
        assert!(matches!(
            net.forward(&[vec![1.0, 2.0]]),
            Err(MachineError::Shape { .. })
        ));
    }

    #[test]
    fn test_from_tensors_checks_shapes() {
        let tensors = DenseNet::initial_tensors(4, 2, 0);
        assert!(DenseNet::from_tensors(tensors.clone(), 4, 2).is_ok());
        assert!(matches!(
            DenseNet::from_tensors(tensors, 5, 2),
            Err(MachineError::Checkpoint { .. })
        ));
        assert!(DenseNet::from_tensors(TensorMap::new(), 4, 2).is_err());
    }

    #[test]
    fn test_initial_tensors_are_seeded() {
        assert_eq!(
            MlpNet::initial_tensors(6, 4, 3, 9),
            MlpNet::initial_tensors(6, 4, 3, 9)
        );
        assert_ne!(
            DenseNet::initial_tensors(6, 3, 1),
            DenseNet::initial_tensors(6, 3, 2)
        );
    }

    #[test]
    fn test_mlp_backward_matches_finite_difference() {
        let net = MlpNet::from_tensors(MlpNet::initial_tensors(3, 4, 2, 5), 3, 2).unwrap();
        let x = vec![vec![0.2, 0.7, 0.4]];
        // Loss = sum of outputs, so every output gradient is 1.
        let grads = net.backward(&x, &[vec![1.0, 1.0]]).unwrap();

        let eps = 1e-3;
        for name in [MlpNet::HIDDEN_WEIGHT, MlpNet::OUTPUT_BIAS] {
            for i in 0..net.parameters()[name].len() {
                let mut plus = net.parameters().clone();
                plus.get_mut(name).unwrap().data[i] += eps;
                let mut minus = net.parameters().clone();
                minus.get_mut(name).unwrap().data[i] -= eps;
                let f = |t: TensorMap| -> f32 {
                    MlpNet::from_tensors(t, 3, 2).unwrap().forward(&x).unwrap()[0]
                        .iter()
                        .sum()
                };
                let numeric = (f(plus) - f(minus)) / (2.0 * eps);
                let analytic = grads[name].data[i];
                assert!(
                    (numeric - analytic).abs() < 1e-2,
                    "{}[{}]: numeric {} vs analytic {}",
                    name,
                    i,
                    numeric,
                    analytic
                );
            }
        }
    }
}
