//! Constant padding of the spatial axes of channel-first arrays.
//!
//! Every variant allocates the padded shape filled with the pad value and then
//! writes the input into the interior region, one spatial axis at a time.
//! Batch and channel axes are never touched.

use ndarray::*;
use num_traits::Float;
use tracing::debug;

use crate::{Device, Error, Result};

/// Pads the trailing `pads.len()` axes of `x` with `pad_value`.
///
/// `pads[i]` holds the `(before, after)` amounts for the `i`-th padded axis,
/// counted from the first padded axis. Leading axes keep their size.
///
/// Fails with [`Error::ShapeMismatch`] if more axes are to be padded than `x` has.
pub fn pad_nd<'a, T, F>(
    x: T,
    pads: &[(usize, usize)],
    pad_value: F,
    device: Device,
) -> Result<ArrayD<F>>
where
    T: AsArray<'a, F, IxDyn>,
    F: 'a + Float,
{
    let x: ArrayViewD<F> = x.into();
    if pads.len() > x.ndim() {
        return Err(Error::ShapeMismatch(format!(
            "cannot pad {} axes of an array with shape {:?}",
            pads.len(),
            x.shape()
        )));
    }
    let lead = x.ndim() - pads.len();

    let mut padded_shape = x.shape().to_vec();
    for (len, &(before, after)) in padded_shape[lead..].iter_mut().zip(pads) {
        *len += before + after;
    }
    debug!(input = ?x.shape(), output = ?padded_shape, ?pads, %device, "pad");

    let mut padded = ArrayD::from_elem(padded_shape, pad_value);
    let mut interior = padded.view_mut();
    for (i, &(before, _)) in pads.iter().enumerate() {
        let axis = Axis(lead + i);
        let len = x.len_of(axis);
        interior.slice_axis_inplace(axis, Slice::from(before..before + len));
    }
    interior.assign(&x);

    Ok(padded)
}

/// Pads the width axis of a `(batch, channels, width)` array.
///
/// Output shape is `(batch, channels, left + width + right)`.
pub fn pad1d<'a, T, F>(
    x: T,
    left: usize,
    right: usize,
    pad_value: F,
    device: Device,
) -> Result<Array3<F>>
where
    T: AsArray<'a, F, Ix3>,
    F: 'a + Float,
{
    let x: ArrayView3<F> = x.into();
    let padded = pad_nd(x.into_dyn(), &[(left, right)], pad_value, device)?;
    Ok(padded.into_dimensionality::<Ix3>()?)
}

/// Pads height and width of a `(batch, channels, height, width)` array.
///
/// The first pair of amounts pads the height axis (`top`, `bottom`), the
/// second pair the width axis (`left`, `right`); the corners are filled with
/// `pad_value` as well.
/// Output shape is `(batch, channels, top + height + bottom, left + width + right)`.
pub fn pad2d<'a, T, F>(
    x: T,
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
    pad_value: F,
    device: Device,
) -> Result<Array4<F>>
where
    T: AsArray<'a, F, Ix4>,
    F: 'a + Float,
{
    let x: ArrayView4<F> = x.into();
    let padded = pad_nd(
        x.into_dyn(),
        &[(top, bottom), (left, right)],
        pad_value,
        device,
    )?;
    Ok(padded.into_dimensionality::<Ix4>()?)
}
