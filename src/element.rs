//! Element types and buffer shapes.

use alloc::vec::Vec;

use crate::{Error, Result};

/// The scalar type stored in a coherent buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl ElementType {
    /// Size of one element, in bytes.
    pub const fn width(self) -> usize {
        match self {
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::U32 | ElementType::I32 => 4,
            ElementType::U64 | ElementType::I64 => 8,
        }
    }
}

/// A scalar that can live in a coherent buffer.
///
/// Implemented for the fixed-width integers. The `Pod` bound lets buffers
/// hand out typed views over their raw bytes.
pub trait Element: bytemuck::Pod + Send + Sync {
    /// The runtime tag for this type.
    const TYPE: ElementType;
}

macro_rules! element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$tag;
            }
        )*
    };
}

element! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
}

/// The ordered dimension sizes of a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: &[usize]) -> Self {
        Shape(dims.to_vec())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of elements the shape denotes.
    ///
    /// A shape without dimensions denotes zero elements. Returns `None` if
    /// the product overflows.
    pub fn elements(&self) -> Option<usize> {
        if self.0.is_empty() {
            return Some(0);
        }
        self.0.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Number of bytes a buffer of this shape and type occupies.
    ///
    /// Fails if the shape denotes zero elements, or if the size overflows.
    pub fn byte_len(&self, ty: ElementType) -> Result<usize> {
        match self.elements() {
            Some(0) => Err(Error::InvalidArgument("shape denotes zero elements")),
            Some(n) => n
                .checked_mul(ty.width())
                .ok_or(Error::InvalidArgument("shape is too large")),
            None => Err(Error::InvalidArgument("shape is too large")),
        }
    }
}

impl From<usize> for Shape {
    fn from(len: usize) -> Self {
        Shape(alloc::vec![len])
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}
