//! Byte-level copies between foreign data buffers and typed host vectors.

use std::ptr;

use matlink_abi::MxHandle;
use matlink_mx::{MxAlloc, MxQuery};
use matlink_value::Element;

use crate::MarshalError;

/// Copy `dest.len()` bytes out of a foreign buffer.
///
/// # Safety
///
/// `src` must be valid for reads of `dest.len()` bytes.
pub(crate) unsafe fn copy_in(src: *const u8, dest: &mut [u8]) {
    ptr::copy_nonoverlapping(src, dest.as_mut_ptr(), dest.len());
}

/// Copy `src` into a foreign buffer.
///
/// # Safety
///
/// `dest` must be valid for writes of `src.len()` bytes.
pub(crate) unsafe fn copy_out(src: &[u8], dest: *mut u8) {
    ptr::copy_nonoverlapping(src.as_ptr(), dest, src.len());
}

pub(crate) fn zeroed<T: Element>(count: usize) -> Vec<T> {
    vec![T::zeroed(); count]
}

/// Real-part data of an array holding `count` elements of `T`.
pub(crate) fn read_real<M, T>(mx: &M, array: MxHandle, count: usize) -> Result<Vec<T>, MarshalError>
where
    M: MxQuery + ?Sized,
    T: Element,
{
    let mut out = zeroed::<T>(count);
    if count > 0 {
        let src = mx.real_data(array)?;
        unsafe { copy_in(src, bytemuck::cast_slice_mut(&mut out)) };
    }
    Ok(out)
}

/// Fill the real-part buffer of a freshly allocated array.
pub(crate) fn write_real<M, T>(mx: &M, array: MxHandle, data: &[T]) -> Result<(), MarshalError>
where
    M: MxAlloc + ?Sized,
    T: Element,
{
    if data.is_empty() {
        return Ok(());
    }
    let dest = mx.real_data_mut(array)?;
    unsafe { copy_out(bytemuck::cast_slice(data), dest) };
    Ok(())
}

pub(crate) fn check_element_size(
    class: &str,
    actual: usize,
    expected: usize,
) -> Result<(), MarshalError> {
    if actual == expected {
        Ok(())
    } else {
        Err(MarshalError::malformed(format!(
            "{class} array reports element size {actual}, expected {expected}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matlink_mx::{HeapMx, MxClassId, MxComplexity};

    #[test]
    fn real_data_round_trips_through_bytes() {
        let mx = HeapMx::default();
        let arr = mx
            .create_numeric(&[1, 3], MxClassId::Int16, MxComplexity::Real)
            .unwrap();
        write_real(&mx, arr, &[-1i16, 0, 300]).unwrap();
        let back: Vec<i16> = read_real(&mx, arr, 3).unwrap();
        assert_eq!(back, vec![-1, 0, 300]);
    }

    #[test]
    fn empty_arrays_skip_the_data_pointer() {
        let mx = HeapMx::default();
        let arr = mx
            .create_numeric(&[0, 0], MxClassId::Double, MxComplexity::Real)
            .unwrap();
        write_real::<_, f64>(&mx, arr, &[]).unwrap();
        let back: Vec<f64> = read_real(&mx, arr, 0).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn element_size_mismatch_is_malformed() {
        assert!(check_element_size("double", 8, 8).is_ok());
        let err = check_element_size("double", 4, 8).unwrap_err();
        assert!(matches!(err, MarshalError::MalformedContainer(_)));
    }
}
