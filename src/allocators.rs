//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// Allocators needed for points, vectors and fault frames in a single spatial dimension.
pub trait DimAllocator<T: Scalar, D: DimName>:
    Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D> + Allocator<f64, D> + Allocator<usize, D>
{
}

impl<T, D> DimAllocator<T, D> for DefaultAllocator
where
    T: Scalar,
    D: DimName,
    DefaultAllocator:
        Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D> + Allocator<f64, D> + Allocator<usize, D>,
{
}
