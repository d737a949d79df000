//! Affine and reshaping layers.

use std::fmt;
use std::ops::AddAssign;

use ndarray::*;
use num_traits::Float;
use rand::distributions::uniform::SampleUniform;
use rand::Rng;

use crate::init::uniform;
use crate::layer::Layer;
use crate::{Error, Result};

/// A simple affine transformation: y = x W^T + b.
///
/// Weight has shape (out features, in features), bias (out features).
pub struct Linear<F: Float> {
    pub(crate) weight: Array2<F>,
    pub(crate) bias: Option<Array1<F>>,
}

impl<F: 'static + Float + AddAssign> Linear<F> {
    /// Creates a layer with parameters drawn from
    /// U(-sqrt(1 / in_features), sqrt(1 / in_features)).
    pub fn new(in_features: usize, out_features: usize, bias: bool) -> Result<Linear<F>>
    where
        F: SampleUniform,
    {
        Self::new_with_rng(in_features, out_features, bias, &mut rand::thread_rng())
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Linear<F>>
    where
        F: SampleUniform,
    {
        let weight = uniform((out_features, in_features), in_features, rng)?;
        let bias = if bias {
            Some(uniform(out_features, in_features, rng)?)
        } else {
            None
        };
        Ok(Linear { weight, bias })
    }

    pub fn from_weights(weight: Array2<F>, bias: Option<Array1<F>>) -> Result<Linear<F>> {
        if let Some(b) = &bias {
            if b.len() != weight.nrows() {
                return Err(Error::ShapeMismatch(format!(
                    "bias has {} entries for {} output features",
                    b.len(),
                    weight.nrows()
                )));
            }
        }
        Ok(Linear { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn weight(&self) -> ArrayView2<'_, F> {
        self.weight.view()
    }

    pub fn bias(&self) -> Option<ArrayView1<'_, F>> {
        self.bias.as_ref().map(|b| b.view())
    }
}

impl<F: 'static + Float + AddAssign> Layer<F> for Linear<F> {
    /// x: shape (*, in_features), returns shape (*, out_features).
    fn forward(&self, x: ArrayViewD<'_, F>) -> Result<ArrayD<F>> {
        let in_features = self.in_features();
        match x.shape().last() {
            Some(&last) if last == in_features => {}
            _ => {
                return Err(Error::ShapeMismatch(format!(
                    "expected input of shape (*, {}), got {:?}",
                    in_features,
                    x.shape()
                )))
            }
        }
        let mut out_shape = x.shape().to_vec();
        let rows: usize = out_shape[..out_shape.len() - 1].iter().product();
        if let Some(last) = out_shape.last_mut() {
            *last = self.out_features();
        }

        let x2 = x.as_standard_layout().into_shape((rows, in_features))?;
        let mut y = x2.dot(&self.weight.t());
        if let Some(b) = &self.bias {
            y += b;
        }
        Ok(y.into_shape(out_shape)?)
    }

    fn extra_repr(&self) -> String {
        format!(
            "in_features: {}, out_features: {}, bias_shape: {:?}",
            self.in_features(),
            self.out_features(),
            self.bias.as_ref().map(|b| b.dim())
        )
    }
}

impl<F: 'static + Float + AddAssign> fmt::Display for Linear<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Linear({})", self.extra_repr())
    }
}

/// Merges the axes `start_dim..=end_dim` into a single axis.
///
/// A negative `end_dim` counts from the last axis, so the default
/// (1, -1) keeps the batch axis and flattens everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flatten {
    start_dim: usize,
    end_dim: isize,
}

impl Default for Flatten {
    fn default() -> Self {
        Flatten {
            start_dim: 1,
            end_dim: -1,
        }
    }
}

impl Flatten {
    pub fn new(start_dim: usize, end_dim: isize) -> Flatten {
        Flatten { start_dim, end_dim }
    }

    /// Resolves the merged range for an input of rank `ndim`.
    fn axes(&self, ndim: usize) -> Result<(usize, usize)> {
        let end = if self.end_dim < 0 {
            ndim as isize + self.end_dim
        } else {
            self.end_dim
        };
        if end < 0 || end as usize >= ndim || self.start_dim > end as usize {
            return Err(Error::Precondition(format!(
                "cannot flatten dims {}..={} of an input of rank {}",
                self.start_dim, self.end_dim, ndim
            )));
        }
        Ok((self.start_dim, end as usize))
    }
}

impl<F: Clone> Layer<F> for Flatten {
    fn forward(&self, x: ArrayViewD<'_, F>) -> Result<ArrayD<F>> {
        let (start, end) = self.axes(x.ndim())?;
        let in_shape = x.shape();
        let mut shape = in_shape[..start].to_vec();
        shape.push(in_shape[start..=end].iter().product());
        shape.extend_from_slice(&in_shape[end + 1..]);

        Ok(x.as_standard_layout().into_owned().into_shape(shape)?)
    }

    fn extra_repr(&self) -> String {
        format!("start_dim: {}, end_dim: {}", self.start_dim, self.end_dim)
    }
}

impl fmt::Display for Flatten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flatten({})", Layer::<f32>::extra_repr(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn linear_forward() {
        let weight = arr2(&[[1., 0., 2.], [0., 1., -1.]]);
        let layer = Linear::from_weights(weight, Some(arr1(&[1., -1.]))).unwrap();
        let x = arr2(&[[1., 2., 3.], [0., 0., 1.]]).into_dyn();

        let y = layer.forward(x.view()).unwrap();

        assert_eq!(y, arr2(&[[8., -2.], [3., -2.]]).into_dyn());
    }

    #[test]
    fn linear_keeps_leading_axes() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer: Linear<f32> = Linear::new_with_rng(4, 6, false, &mut rng).unwrap();
        let x = Array::<f32, _>::ones(IxDyn(&[2, 3, 4]));

        let y = layer.forward(x.view()).unwrap();

        assert_eq!(y.shape(), &[2, 3, 6]);
        assert!(layer.bias().is_none());
        assert!(layer.weight().iter().all(|w| w.abs() <= 0.5));
    }

    #[test]
    fn linear_rejects_wrong_features() {
        let layer = Linear::from_weights(Array2::<f64>::zeros((2, 3)), None).unwrap();
        let x = Array::<f64, _>::zeros(IxDyn(&[5, 4]));

        let err = layer.forward(x.view()).unwrap_err();

        assert!(matches!(err, Error::ShapeMismatch(_)));
        assert_eq!(
            layer.to_string(),
            "Linear(in_features: 3, out_features: 2, bias_shape: None)"
        );
    }

    #[test]
    fn flatten_default() {
        let x = Array::from_shape_vec(IxDyn(&[2, 3, 4, 5]), (0..120).collect()).unwrap();

        let y = Flatten::default().forward(x.view()).unwrap();

        assert_eq!(y.shape(), &[2, 60]);
        assert_eq!(y.iter().copied().collect::<Vec<_>>(), (0..120).collect::<Vec<_>>());
    }

    #[test]
    fn flatten_inner_range() {
        let x = Array::<f32, _>::zeros(IxDyn(&[2, 3, 4, 5]));

        let y = Flatten::new(1, 2).forward(x.view()).unwrap();
        assert_eq!(y.shape(), &[2, 12, 5]);

        let y = Flatten::new(0, -2).forward(x.view()).unwrap();
        assert_eq!(y.shape(), &[24, 5]);
    }

    #[test]
    fn flatten_bad_dims() {
        let x = Array::<f32, _>::zeros(IxDyn(&[2, 3]));

        assert!(matches!(
            Flatten::new(1, 5).forward(x.view()),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            Flatten::new(2, -1).forward(x.view()),
            Err(Error::Precondition(_))
        ));
    }
}
