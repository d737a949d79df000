use ndarray::*;

use crate::{Error, Result};

/// Something that maps an input array to an output array, such as the
/// linear, flatten and convolution layers of this crate.
///
/// Inputs are taken with dynamic rank so that layers of different kinds can
/// be chained; each layer checks the rank it needs.
pub trait Layer<F> {
    fn forward(&self, x: ArrayViewD<'_, F>) -> Result<ArrayD<F>>;

    /// Hyper-parameters of the layer, used by the `Display` impls.
    fn extra_repr(&self) -> String {
        String::new()
    }
}

/// Applies `layers` one after another.
pub fn forward_all<F: Clone>(layers: &[&dyn Layer<F>], x: ArrayViewD<'_, F>) -> Result<ArrayD<F>> {
    let mut output = x.to_owned();
    for layer in layers {
        output = layer.forward(output.view())?;
    }
    Ok(output)
}

pub(crate) fn expect_rank<'a, F>(x: ArrayViewD<'a, F>, rank: usize) -> Result<ArrayViewD<'a, F>> {
    if x.ndim() != rank {
        return Err(Error::ShapeMismatch(format!(
            "expected an input of rank {}, got shape {:?}",
            rank,
            x.shape()
        )));
    }
    Ok(x)
}
