use crate::Real;
use std::fmt;
use std::fmt::{Debug, Formatter};

/// Information about the quadrature point an action is applied at.
#[derive(Debug, Copy, Clone)]
pub struct ActionContext<'c, T> {
    /// The assembly item, a cell or face index.
    pub item: usize,
    /// The region of the assembly item.
    pub region: usize,
    /// Index of the quadrature point within the item.
    pub qp: usize,
    /// Physical coordinates of the quadrature point, if the action requested them.
    pub x: Option<&'c [T]>,
}

type Kernel<T> = dyn Fn(&mut [T], &[T], &ActionContext<T>) + Send + Sync;

/// A numerical kernel applied to operator evaluations at quadrature points.
///
/// The kernel is called as `kernel(result, input, context)`, where `input` holds the
/// concatenated operator outputs of the arguments the action is applied to and `result` has
/// [`result_len`](Self::result_len) entries, zeroed before each call.
pub struct Action<T> {
    kernel: Box<Kernel<T>>,
    result_len: usize,
    argument_len: usize,
    bonus_quadorder: i32,
    needs_coordinates: bool,
}

impl<T> Debug for Action<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("result_len", &self.result_len)
            .field("argument_len", &self.argument_len)
            .field("bonus_quadorder", &self.bonus_quadorder)
            .field("needs_coordinates", &self.needs_coordinates)
            .finish_non_exhaustive()
    }
}

impl<T: Real> Action<T> {
    pub fn new(
        result_len: usize,
        argument_len: usize,
        kernel: impl Fn(&mut [T], &[T], &ActionContext<T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            kernel: Box::new(kernel),
            result_len,
            argument_len,
            bonus_quadorder: 0,
            needs_coordinates: false,
        }
    }

    /// Like [`new`](Self::new), for kernels that use the physical coordinates of the point.
    pub fn with_coordinates(
        result_len: usize,
        argument_len: usize,
        kernel: impl Fn(&mut [T], &[T], &ActionContext<T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            needs_coordinates: true,
            ..Self::new(result_len, argument_len, kernel)
        }
    }

    /// Passes its input through unchanged.
    pub fn identity(len: usize) -> Self {
        Self::new(len, len, |result, input, _| result.copy_from_slice(input))
    }

    /// Multiplies its input by a constant.
    pub fn scaled(len: usize, factor: T) -> Self {
        Self::new(len, len, move |result, input, _| {
            for (r, i) in result.iter_mut().zip(input) {
                *r = factor * *i;
            }
        })
    }

    /// Raises the quadrature order used with this action, e.g. for non-polynomial data.
    pub fn with_bonus_quadorder(self, bonus_quadorder: i32) -> Self {
        Self { bonus_quadorder, ..self }
    }

    pub fn result_len(&self) -> usize {
        self.result_len
    }

    pub fn argument_len(&self) -> usize {
        self.argument_len
    }

    pub fn bonus_quadorder(&self) -> i32 {
        self.bonus_quadorder
    }

    pub fn needs_coordinates(&self) -> bool {
        self.needs_coordinates
    }

    /// Applies the kernel. `result` is zeroed first.
    pub fn apply(&self, result: &mut [T], input: &[T], context: &ActionContext<T>) {
        result.fill(T::zero());
        (self.kernel)(result, input, context);
    }
}
