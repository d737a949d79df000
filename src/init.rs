use ndarray::*;
use num_traits::Float;
use rand::distributions::uniform::SampleUniform;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::{Error, Result};

/// Samples an array from U(-sqrt(1 / fan_in), sqrt(1 / fan_in)), the default
/// initialisation of Pytorch's linear and convolution layers.
pub(crate) fn uniform<F, Sh, R>(shape: Sh, fan_in: usize, rng: &mut R) -> Result<Array<F, Sh::Dim>>
where
    F: Float + SampleUniform,
    Sh: ShapeBuilder,
    R: Rng + ?Sized,
{
    if fan_in == 0 {
        return Err(Error::Precondition(
            "cannot initialise parameters with zero fan-in".to_string(),
        ));
    }
    let fan_in: F = num_traits::cast(fan_in).ok_or_else(|| {
        Error::Precondition(format!("fan-in {} is not representable", fan_in))
    })?;
    let bound = fan_in.recip().sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    Ok(Array::from_shape_simple_fn(shape, || dist.sample(rng)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_within_bound() {
        let mut rng = StdRng::seed_from_u64(0);

        let a: Array2<f64> = uniform((16_usize, 4_usize), 4, &mut rng).unwrap();

        assert_eq!(a.shape(), &[16, 4]);
        assert!(a.iter().all(|v| v.abs() <= 0.5));
        assert!(a.iter().any(|&v| v != a[[0, 0]]));
    }

    #[test]
    fn zero_fan_in() {
        let mut rng = StdRng::seed_from_u64(0);

        let res: Result<Array1<f32>> = uniform(3_usize, 0, &mut rng);

        assert!(matches!(res, Err(Error::Precondition(_))));
    }
}
