//! Binary layout model for coercions.
//!
//! `(*[]T)(b)` views `b` as `len(b) / sizeof(T)` elements of `T`. A
//! remainder is always an error. When the requested byte order differs from
//! the platform order every scalar is swapped, which needs a full copy;
//! native order borrows.
//!
//! Sizes follow Go on 64-bit targets.

use std::borrow::Cow;
use thiserror::Error;

/// Byte order requested by a coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Native,
    Little,
    Big,
}

impl ByteOrder {
    /// Resolve an order constant, qualified or not (`binary.BigEndian`, `LittleEndian`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.rsplit('.').next()? {
            "NativeEndian" => Some(ByteOrder::Native),
            "LittleEndian" => Some(ByteOrder::Little),
            "BigEndian" => Some(ByteOrder::Big),
            _ => None,
        }
    }

    /// Constant name in the runtime package.
    pub fn runtime_name(&self) -> &'static str {
        match self {
            ByteOrder::Native => "NativeEndian",
            ByteOrder::Little => "LittleEndian",
            ByteOrder::Big => "BigEndian",
        }
    }

    pub fn platform() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn is_native(&self) -> bool {
        *self == ByteOrder::Native || *self == Self::platform()
    }
}

/// Size of one element and of the scalars it is swapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElemLayout {
    pub size: usize,
    pub scalar: usize,
}

impl ElemLayout {
    const fn scalar(size: usize) -> Self {
        Self { size, scalar: size }
    }
}

/// Layout of a fixed-width Go type, including arrays of them (`[4]uint16`).
pub fn elem_layout(ty: &str) -> Option<ElemLayout> {
    let ty = ty.trim();
    if let Some(rest) = ty.strip_prefix('[') {
        let (len, elem) = rest.split_once(']')?;
        let len: usize = len.trim().parse().ok()?;
        let inner = elem_layout(elem)?;
        return Some(ElemLayout {
            size: inner.size.checked_mul(len)?,
            scalar: inner.scalar,
        });
    }
    let layout = match ty {
        "byte" | "uint8" | "int8" | "bool" => ElemLayout::scalar(1),
        "int16" | "uint16" => ElemLayout::scalar(2),
        "int32" | "uint32" | "float32" | "rune" => ElemLayout::scalar(4),
        "int64" | "uint64" | "float64" | "int" | "uint" | "uintptr" => ElemLayout::scalar(8),
        "complex64" => ElemLayout { size: 8, scalar: 4 },
        "complex128" => ElemLayout { size: 16, scalar: 8 },
        _ => return None,
    };
    Some(layout)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("{len} bytes is not a whole number of {size}-byte elements ({remainder} left over)")]
    Remainder {
        len: usize,
        size: usize,
        remainder: usize,
    },
    #[error("element type has zero size")]
    ZeroSize,
}

/// Number of whole elements in `len` bytes.
pub fn element_count(len: usize, layout: ElemLayout) -> Result<usize, LayoutError> {
    if layout.size == 0 {
        return Err(LayoutError::ZeroSize);
    }
    match len % layout.size {
        0 => Ok(len / layout.size),
        remainder => Err(LayoutError::Remainder {
            len,
            size: layout.size,
            remainder,
        }),
    }
}

/// Bytes of `bytes` viewed as elements in `order`, in platform order.
///
/// Borrows when no swap is needed.
pub fn reinterpret(
    bytes: &[u8],
    layout: ElemLayout,
    order: ByteOrder,
) -> Result<Cow<'_, [u8]>, LayoutError> {
    element_count(bytes.len(), layout)?;
    if order.is_native() || layout.scalar <= 1 {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut swapped = bytes.to_vec();
    for scalar in swapped.chunks_exact_mut(layout.scalar) {
        scalar.reverse();
    }
    Ok(Cow::Owned(swapped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_orders() {
        assert_eq!(ByteOrder::from_name("binary.BigEndian"), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_name("LittleEndian"), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::from_name("sugar.NativeEndian"), Some(ByteOrder::Native));
        assert_eq!(ByteOrder::from_name("MiddleEndian"), None);
        assert!(ByteOrder::Native.is_native());
    }

    #[test]
    fn test_element_counts() {
        let four = elem_layout("uint32").unwrap();
        let eight = elem_layout("float64").unwrap();
        assert_eq!(element_count(4, four), Ok(1));
        assert_eq!(
            element_count(4, eight),
            Err(LayoutError::Remainder {
                len: 4,
                size: 8,
                remainder: 4
            })
        );
        assert_eq!(element_count(0, eight), Ok(0));
    }

    #[test]
    fn test_array_and_complex_layouts() {
        assert_eq!(
            elem_layout("[3]uint16"),
            Some(ElemLayout { size: 6, scalar: 2 })
        );
        assert_eq!(
            elem_layout("complex128"),
            Some(ElemLayout { size: 16, scalar: 8 })
        );
        assert_eq!(elem_layout("MyStruct"), None);
    }

    #[test]
    fn test_oversized_array_has_no_layout() {
        assert_eq!(elem_layout("[4611686018427387904]uint64"), None);
        assert_eq!(elem_layout("[2][4611686018427387904]uint32"), None);
        assert_eq!(
            elem_layout("[1024]uint64"),
            Some(ElemLayout { size: 8192, scalar: 8 })
        );
    }

    #[test]
    fn test_native_borrows() {
        let bytes = [1u8, 2, 3, 4];
        let view = reinterpret(&bytes, elem_layout("uint16").unwrap(), ByteOrder::Native).unwrap();
        assert!(matches!(view, Cow::Borrowed(_)));
    }

    #[test]
    fn test_foreign_order_swaps_scalars() {
        let foreign = match ByteOrder::platform() {
            ByteOrder::Little => ByteOrder::Big,
            _ => ByteOrder::Little,
        };
        let bytes = [1u8, 2, 3, 4];
        let view = reinterpret(&bytes, elem_layout("uint16").unwrap(), foreign).unwrap();
        assert_eq!(view.as_ref(), &[2, 1, 4, 3]);
    }

    fn fixed_width() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "uint8", "int16", "uint32", "float64", "complex64", "complex128", "[2]uint32",
        ])
    }

    fn orders() -> impl Strategy<Value = ByteOrder> {
        prop::sample::select(vec![ByteOrder::Native, ByteOrder::Little, ByteOrder::Big])
    }

    proptest! {
        #[test]
        fn coercion_round_trip_is_identity(
            ty in fixed_width(),
            order in orders(),
            count in 0usize..16,
            seed in any::<u8>(),
        ) {
            let layout = elem_layout(ty).unwrap();
            let bytes: Vec<u8> = (0..count * layout.size)
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
                .collect();
            let there = reinterpret(&bytes, layout, order).unwrap();
            let back = reinterpret(&there, layout, order).unwrap();
            prop_assert_eq!(back.as_ref(), bytes.as_slice());
        }

        #[test]
        fn remainder_is_always_an_error(ty in fixed_width(), extra in 1usize..8) {
            let layout = elem_layout(ty).unwrap();
            prop_assume!(extra % layout.size != 0);
            let bytes = vec![0u8; layout.size * 3 + extra];
            prop_assert!(reinterpret(&bytes, layout, ByteOrder::Native).is_err());
        }
    }
}
