use parking_lot::Mutex;

use crate::errors::Result;
use crate::tensor::Tensor;

/// The external inference engine: one input tensor in, one output tensor out.
///
/// Implementations must be safe to call from several threads at once. An engine that is not
/// reentrant either locks internally (as `OnnxEngine` does) or is wrapped in [`Serialized`].
/// Failures are reported as `RemoveBgError::Inference` and are never retried by the pipeline.
pub trait InferenceEngine: Send + Sync {
    /// Run the model on a 1×3×H×W tensor, returning its 1×1×H×W foreground probabilities.
    fn invoke(&self, input: &Tensor) -> Result<Tensor>;
}

/// Plain callbacks act as engines.
impl<F> InferenceEngine for F
where
    F: Fn(&Tensor) -> Result<Tensor> + Send + Sync,
{
    fn invoke(&self, input: &Tensor) -> Result<Tensor> {
        self(input)
    }
}

/// Puts a non-reentrant engine behind a single lock so concurrent pipelines take turns.
pub struct Serialized<F> {
    inner: Mutex<F>,
}

impl<F> Serialized<F>
where
    F: FnMut(&Tensor) -> Result<Tensor> + Send,
{
    pub fn new(engine: F) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }
}

impl<F> InferenceEngine for Serialized<F>
where
    F: FnMut(&Tensor) -> Result<Tensor> + Send,
{
    fn invoke(&self, input: &Tensor) -> Result<Tensor> {
        let mut engine = self.inner.lock();
        (*engine)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_closure_is_an_engine() -> Result<()> {
        let engine = |input: &Tensor| -> Result<Tensor> {
            let [n, _, h, w] = input.shape();
            Ok(Tensor::zeros([n, 1, h, w]))
        };
        let output = engine.invoke(&Tensor::zeros([1, 3, 4, 4]))?;
        assert_eq!(output.shape(), [1, 1, 4, 4]);
        Ok(())
    }

    #[test]
    fn test_serialized_engine_runs_one_call_at_a_time() -> Result<()> {
        let mut calls = 0usize;
        let engine = Serialized::new(move |input: &Tensor| {
            calls += 1;
            let [n, _, h, w] = input.shape();
            Tensor::from_shape_vec([n, 1, h, w], vec![calls as f32; n * h * w])
        });

        let outputs = (0..16)
            .into_par_iter()
            .map(|_| engine.invoke(&Tensor::zeros([1, 3, 2, 2])))
            .collect::<Result<Vec<_>>>()?;

        let mut seen: Vec<usize> = outputs.iter().map(|t| t.as_slice()[0] as usize).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=16).collect::<Vec<_>>());
        Ok(())
    }
}
