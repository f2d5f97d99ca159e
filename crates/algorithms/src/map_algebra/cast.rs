//! Explicit narrowing of promoted grids

use geocomp_core::raster::{Raster, RasterElement};
use geocomp_core::{Error, Result};
use num_traits::{AsPrimitive, NumCast};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to do with a value that does not fit the target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Return [`Error::TypeOverflow`] on the first value that would change
    Fail,
    /// Clamp to the target's range
    Saturate,
    /// Keep the low bits (`as` semantics). Float sources are truncated
    /// toward zero and saturate, since `as` does not wrap them.
    Wrap,
}

fn overflow<T: RasterElement, U: RasterElement>(value: T) -> Error {
    Error::TypeOverflow {
        value: value.to_string(),
        target: U::data_type().name(),
    }
}

fn exact<T: RasterElement, U: RasterElement>(value: T) -> Option<U> {
    let cast: U = NumCast::from(value)?;
    if U::is_float() {
        // float targets only fail when the magnitude is out of range
        let back = cast.to_f64()?;
        return back.is_finite().then_some(cast);
    }
    let back: T = NumCast::from(cast)?;
    (back == value).then_some(cast)
}

fn saturate<T: RasterElement + AsPrimitive<U>, U: RasterElement>(value: T) -> U {
    if let Some(v) = exact::<T, U>(value) {
        return v;
    }
    let (lo, hi) = (U::lowest().to_f64(), U::highest().to_f64());
    match (value.to_f64(), lo, hi) {
        (Some(v), Some(lo), _) if v < lo => U::lowest(),
        (Some(v), _, Some(hi)) if v > hi => U::highest(),
        _ => value.as_(),
    }
}

/// Convert a grid to a narrower cell type under an explicit policy.
///
/// The input sentinel is carried over when `U` represents it exactly.
/// Otherwise `U`'s default sentinel is declared, but only if some cell is
/// no-data. A valid value that narrows onto the declared sentinel fails
/// with [`Error::NoDataInUse`].
pub fn narrow<T, U>(raster: &Raster<T>, policy: OverflowPolicy) -> Result<Raster<U>>
where
    T: RasterElement + AsPrimitive<U>,
    U: RasterElement,
{
    debug!(from = %T::data_type(), to = %U::data_type(), ?policy, "narrow");
    let src_nodata = raster.nodata();
    let carried = src_nodata.and_then(exact::<T, U>);
    let nodata = carried.unwrap_or_else(U::default_nodata);

    let cast = |v: T| -> Result<U> {
        match policy {
            OverflowPolicy::Fail => exact::<T, U>(v).ok_or_else(|| overflow::<T, U>(v)),
            OverflowPolicy::Saturate => Ok(saturate(v)),
            OverflowPolicy::Wrap => Ok(v.as_()),
        }
    };
    let (mut missing, mut clash) = (0usize, None);
    let mut bands = Vec::with_capacity(raster.band_count());
    for band in raster.bands() {
        let mut out = ndarray::Array2::from_elem(band.dim(), nodata);
        for (dst, &src) in out.iter_mut().zip(band.iter()) {
            if src.is_nodata(src_nodata) {
                missing += 1;
                continue;
            }
            *dst = cast(src)?;
            if *dst == nodata {
                clash.get_or_insert(src);
            }
        }
        bands.push(out);
    }

    if carried.is_none() && missing == 0 {
        return raster.with_bands(bands, None);
    }
    if let Some(value) = clash {
        return Err(Error::NoDataInUse {
            value: value.to_string(),
            dtype: U::data_type().name(),
        });
    }
    raster.with_bands(bands, Some(nodata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_algebra::{local_arithmetic, ArithOp};

    #[test]
    fn test_narrowing_without_policy_fails() {
        let a = Raster::from_vec(vec![16u8; 4], 2, 2).unwrap();
        let squared = local_arithmetic(&a, &a, ArithOp::Mul).unwrap();
        assert_eq!(squared.get(1, 1).unwrap(), 256u16);

        let err = narrow::<u16, u8>(&squared, OverflowPolicy::Fail).unwrap_err();
        assert!(matches!(err, Error::TypeOverflow { target: "uint8", .. }));
        let saturated = narrow::<u16, u8>(&squared, OverflowPolicy::Saturate).unwrap();
        assert_eq!(saturated.get(0, 0).unwrap(), 255);
        assert!(!saturated.is_nodata_at(0, 0).unwrap());
        assert_eq!(narrow::<u16, u8>(&squared, OverflowPolicy::Wrap).unwrap().get(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_lossless_narrowing_passes() {
        let a = Raster::from_vec(vec![1u16, 2, 250, 0], 2, 2).unwrap();
        let b = narrow::<u16, u8>(&a, OverflowPolicy::Fail).unwrap();
        assert_eq!(b.data().iter().copied().collect::<Vec<u8>>(), vec![1, 2, 250, 0]);
    }

    #[test]
    fn test_fractional_float_to_int() {
        let a = Raster::from_vec(vec![1.5f64, -300.0], 1, 2).unwrap();
        assert!(narrow::<f64, i8>(&a, OverflowPolicy::Fail).is_err());
        let s = narrow::<f64, i8>(&a, OverflowPolicy::Saturate).unwrap();
        assert_eq!(s.get(0, 0).unwrap(), 1);
        assert_eq!(s.get(0, 1).unwrap(), -128);
    }

    #[test]
    fn test_zero_survives_narrowing_without_sentinel() {
        let a = Raster::from_vec(vec![0u16, 7], 1, 2).unwrap();
        let b = narrow::<u16, u8>(&a, OverflowPolicy::Fail).unwrap();
        assert_eq!(b.nodata(), None);
        assert_eq!(b.statistics().valid_count, 2);

        let nan = Raster::from_vec(vec![f64::NAN, 0.0, 3.0], 1, 3).unwrap();
        let c = narrow::<f64, u8>(&nan, OverflowPolicy::Fail).unwrap();
        assert_eq!(c.nodata(), Some(u8::MAX));
        assert!(c.is_nodata_at(0, 0).unwrap());
        assert_eq!(c.statistics().valid_count, 2);

        let high = Raster::from_vec(vec![f64::NAN, 900.0], 1, 2).unwrap();
        let err = narrow::<f64, u8>(&high, OverflowPolicy::Saturate).unwrap_err();
        assert!(matches!(err, Error::NoDataInUse { dtype: "uint8", .. }));
    }

    #[test]
    fn test_nodata_sentinel_carried() {
        let mut a = Raster::from_vec(vec![-9999i32, 5], 1, 2).unwrap();
        a.set_nodata(Some(-9999));
        let b = narrow::<i32, i16>(&a, OverflowPolicy::Fail).unwrap();
        assert_eq!(b.nodata(), Some(-9999i16));
        assert!(b.is_nodata_at(0, 0).unwrap());
    }
}
