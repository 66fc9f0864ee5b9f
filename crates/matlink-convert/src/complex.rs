//! Complex storage strategies.
//!
//! Older matrix libraries keep the imaginary part in a second buffer
//! (`mxGetImagData`); newer ones store `re, im` pairs in one buffer
//! (`mxGetComplex<Type>s`). The converter picks one strategy per library.
//!
//! Both traits work on raw bytes: `real` and `imag` hold `count * width`
//! bytes each, in column-major element order.

use matlink_abi::MxHandle;
use matlink_mx::{MxAlloc, MxQuery};

use crate::buffers::{copy_in, copy_out};
use crate::MarshalError;

pub trait ComplexBufferReader<M: MxQuery + ?Sized> {
    /// Element size the library reports for a complex array whose parts
    /// are `width` bytes wide.
    fn element_size(&self, width: usize) -> usize;

    fn read(
        &self,
        mx: &M,
        array: MxHandle,
        width: usize,
        real: &mut [u8],
        imag: &mut [u8],
    ) -> Result<(), MarshalError>;
}

pub trait ComplexBufferWriter<M: MxAlloc + ?Sized> {
    fn write(
        &self,
        mx: &M,
        array: MxHandle,
        width: usize,
        real: &[u8],
        imag: &[u8],
    ) -> Result<(), MarshalError>;
}

/// Separate real and imaginary buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitComplex;

/// One buffer of interleaved `re, im` pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterleavedComplex;

impl<M: MxQuery + ?Sized> ComplexBufferReader<M> for SplitComplex {
    fn element_size(&self, width: usize) -> usize {
        width
    }

    fn read(
        &self,
        mx: &M,
        array: MxHandle,
        _width: usize,
        real: &mut [u8],
        imag: &mut [u8],
    ) -> Result<(), MarshalError> {
        if real.is_empty() {
            return Ok(());
        }
        let re = mx.real_data(array)?;
        let im = mx.imag_data(array)?;
        unsafe {
            copy_in(re, real);
            copy_in(im, imag);
        }
        Ok(())
    }
}

impl<M: MxAlloc + ?Sized> ComplexBufferWriter<M> for SplitComplex {
    fn write(
        &self,
        mx: &M,
        array: MxHandle,
        _width: usize,
        real: &[u8],
        imag: &[u8],
    ) -> Result<(), MarshalError> {
        if real.is_empty() {
            return Ok(());
        }
        let re = mx.real_data_mut(array)?;
        let im = mx.imag_data_mut(array)?;
        unsafe {
            copy_out(real, re);
            copy_out(imag, im);
        }
        Ok(())
    }
}

impl<M: MxQuery + ?Sized> ComplexBufferReader<M> for InterleavedComplex {
    fn element_size(&self, width: usize) -> usize {
        width * 2
    }

    fn read(
        &self,
        mx: &M,
        array: MxHandle,
        width: usize,
        real: &mut [u8],
        imag: &mut [u8],
    ) -> Result<(), MarshalError> {
        if real.is_empty() || width == 0 {
            return Ok(());
        }
        let src = mx.complex_data(array)?;
        let pairs = unsafe { std::slice::from_raw_parts(src, real.len() * 2) };
        for ((pair, re), im) in pairs
            .chunks_exact(width * 2)
            .zip(real.chunks_exact_mut(width))
            .zip(imag.chunks_exact_mut(width))
        {
            re.copy_from_slice(&pair[..width]);
            im.copy_from_slice(&pair[width..]);
        }
        Ok(())
    }
}

impl<M: MxAlloc + ?Sized> ComplexBufferWriter<M> for InterleavedComplex {
    fn write(
        &self,
        mx: &M,
        array: MxHandle,
        width: usize,
        real: &[u8],
        imag: &[u8],
    ) -> Result<(), MarshalError> {
        if real.is_empty() || width == 0 {
            return Ok(());
        }
        let mut pairs = Vec::with_capacity(real.len() * 2);
        for (re, im) in real.chunks_exact(width).zip(imag.chunks_exact(width)) {
            pairs.extend_from_slice(re);
            pairs.extend_from_slice(im);
        }
        let dest = mx.complex_data_mut(array)?;
        unsafe { copy_out(&pairs, dest) };
        Ok(())
    }
}
