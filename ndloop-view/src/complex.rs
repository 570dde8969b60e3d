//! Reinterpretation of complex views as interleaved real components.

use bytemuck::Pod;
use num_complex::Complex;

use crate::view::{Order, StridedView, StridedViewMut};
use crate::{NdLoopError, Result};

/// Geometry of the real-component view of a complex view.
///
/// The component axis (extent 2, stride 1) becomes the fastest-varying axis
/// of the view's logical order: appended for row-major, prepended for
/// column-major.
fn real_geometry(
    dims: &[usize],
    strides: &[isize],
    offset: isize,
    order: Order,
) -> Result<(Vec<usize>, Vec<isize>, isize)> {
    let mut new_strides = Vec::with_capacity(strides.len() + 1);
    for &s in strides {
        new_strides.push(s.checked_mul(2).ok_or(NdLoopError::OffsetOverflow)?);
    }
    let mut new_dims = dims.to_vec();
    match order {
        Order::RowMajor => {
            new_dims.push(2);
            new_strides.push(1);
        }
        Order::ColumnMajor => {
            new_dims.insert(0, 2);
            new_strides.insert(0, 1);
        }
    }
    let new_offset = offset.checked_mul(2).ok_or(NdLoopError::OffsetOverflow)?;
    Ok((new_dims, new_strides, new_offset))
}

impl<'a, F: Pod> StridedView<'a, Complex<F>> {
    /// View the same buffer as real components, with one extra axis of
    /// extent 2 (real, imaginary). Zero-copy; the lifetime is preserved.
    pub fn as_real_components(&self) -> Result<StridedView<'a, F>> {
        let (dims, strides, offset) =
            real_geometry(self.dims(), self.strides(), self.offset(), self.order())?;
        let data: &'a [F] = bytemuck::cast_slice(self.data());
        StridedView::new(data, &dims, &strides, offset, self.order())
    }
}

impl<'a, F: Pod> StridedViewMut<'a, Complex<F>> {
    /// Mutable counterpart of [`StridedView::as_real_components`].
    pub fn into_real_components(self) -> Result<StridedViewMut<'a, F>> {
        let (dims, strides, offset) =
            real_geometry(self.dims(), self.strides(), self.offset(), self.order())?;
        let order = self.order();
        let data: &'a mut [F] = bytemuck::cast_slice_mut(self.into_data());
        StridedViewMut::new(data, &dims, &strides, offset, order)
    }
}
