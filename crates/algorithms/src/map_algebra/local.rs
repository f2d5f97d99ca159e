//! Local (cell-by-cell) operations
//!
//! Arithmetic between integer grids never overflows silently: operands are
//! promoted to [`RasterElement::Wide`] first and the result stays in the
//! wider type until the caller narrows it explicitly (see [`super::narrow`]).

use geocomp_core::raster::{Raster, RasterElement};
use geocomp_core::{Error, Result};
use ndarray::Array2;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::maybe_rayon::*;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    /// Division by zero yields no-data
    Div,
}

/// Comparison operator; results are 0/1 grids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    fn test<T: PartialOrd>(&self, a: T, b: T) -> bool {
        match self {
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
        }
    }
}

/// Logical operator over 0/1 grids (any non-zero cell is true)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

/// No-data sentinel of boolean grids
pub const BOOL_NODATA: u8 = u8::MAX;

fn ensure_same_bands<T: RasterElement, U: RasterElement>(a: &Raster<T>, b: &Raster<U>) -> Result<()> {
    a.ensure_co_registered(b)?;
    if a.band_count() != b.band_count() {
        return Err(Error::LengthMismatch {
            left: a.band_count(),
            right: b.band_count(),
        });
    }
    Ok(())
}

fn map_band<T, U, F>(band: &Array2<T>, f: &F) -> Result<Array2<U>>
where
    T: RasterElement,
    U: RasterElement,
    F: Fn(T) -> Result<U> + Sync + Send,
{
    let (rows, cols) = band.dim();
    let data = (0..rows)
        .into_par_iter()
        .map(|row| band.row(row).iter().map(|&v| f(v)).collect::<Result<Vec<U>>>())
        .collect::<Result<Vec<_>>>()?;
    Array2::from_shape_vec((rows, cols), data.into_iter().flatten().collect())
        .map_err(|e| Error::Other(e.to_string()))
}

fn zip_band<T, U, V, F>(a: &Array2<T>, b: &Array2<U>, f: &F) -> Result<Array2<V>>
where
    T: RasterElement,
    U: RasterElement,
    V: RasterElement,
    F: Fn(T, U) -> Result<V> + Sync + Send,
{
    let (rows, cols) = a.dim();
    let data = (0..rows)
        .into_par_iter()
        .map(|row| {
            a.row(row)
                .iter()
                .zip(b.row(row).iter())
                .map(|(&x, &y)| f(x, y))
                .collect::<Result<Vec<V>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Array2::from_shape_vec((rows, cols), data.into_iter().flatten().collect())
        .map_err(|e| Error::Other(e.to_string()))
}

/// Apply `f` to every valid cell of every band. No-data cells, and cells
/// for which `f` returns `None`, are set to `nodata`.
pub fn local_map<T, U, F>(raster: &Raster<T>, nodata: U, f: F) -> Result<Raster<U>>
where
    T: RasterElement,
    U: RasterElement,
    F: Fn(T) -> Option<U> + Sync + Send,
{
    let src_nodata = raster.nodata();
    let cell = |v: T| -> Result<U> {
        if v.is_nodata(src_nodata) {
            return Ok(nodata);
        }
        Ok(f(v).unwrap_or(nodata))
    };
    let bands = raster
        .bands()
        .iter()
        .map(|b| map_band(b, &cell))
        .collect::<Result<Vec<_>>>()?;
    raster.with_bands(bands, Some(nodata))
}

/// Combine two co-registered grids cell by cell. A cell is no-data in the
/// output when it is no-data in either input or `f` returns `None`; errors
/// from `f` abort the operation.
pub fn local_combine<T, U, V, F>(a: &Raster<T>, b: &Raster<U>, nodata: V, f: F) -> Result<Raster<V>>
where
    T: RasterElement,
    U: RasterElement,
    V: RasterElement,
    F: Fn(T, U) -> Result<Option<V>> + Sync + Send,
{
    ensure_same_bands(a, b)?;
    let (na, nb) = (a.nodata(), b.nodata());
    let cell = |x: T, y: U| -> Result<V> {
        if x.is_nodata(na) || y.is_nodata(nb) {
            return Ok(nodata);
        }
        Ok(f(x, y)?.unwrap_or(nodata))
    };
    let bands = a
        .bands()
        .iter()
        .zip(b.bands())
        .map(|(x, y)| zip_band(x, y, &cell))
        .collect::<Result<Vec<_>>>()?;
    a.with_bands(bands, Some(nodata))
}

fn arith<W: RasterElement>(x: W, y: W, op: ArithOp) -> Result<Option<W>> {
    let out = match op {
        ArithOp::Add => x.try_add(y),
        ArithOp::Sub => x.try_sub(y),
        ArithOp::Mul => x.try_mul(y),
        ArithOp::Div if y.is_zero() => return Ok(None),
        ArithOp::Div => x.try_div(y),
    };
    match out {
        Some(v) => Ok(Some(v)),
        None => Err(Error::TypeOverflow {
            value: format!("{x} {op:?} {y}"),
            target: W::data_type().name(),
        }),
    }
}

/// `a op b` on the promoted type.
///
/// Integer operands are widened before computing, so `u8 * u8` yields a
/// `u16` grid. Only the widest integer types can still overflow, which is
/// reported as [`Error::TypeOverflow`]. The wide type's default sentinel
/// lies outside the range one operation on narrower operands can reach.
pub fn local_arithmetic<T: RasterElement>(a: &Raster<T>, b: &Raster<T>, op: ArithOp) -> Result<Raster<T::Wide>> {
    debug!(?op, rows = a.rows(), cols = a.cols(), dtype = %T::data_type(), "local arithmetic");
    local_combine(a, b, <T::Wide as RasterElement>::default_nodata(), |x, y| arith(x.widen(), y.widen(), op))
}

/// `a op scalar` on the promoted type
pub fn local_scalar<T: RasterElement>(a: &Raster<T>, scalar: T, op: ArithOp) -> Result<Raster<T::Wide>> {
    let s = scalar.widen();
    let nodata = <T::Wide as RasterElement>::default_nodata();
    let src_nodata = a.nodata();
    let cell = |v: T| -> Result<T::Wide> {
        if v.is_nodata(src_nodata) {
            return Ok(nodata);
        }
        Ok(arith(v.widen(), s, op)?.unwrap_or(nodata))
    };
    let bands = a
        .bands()
        .iter()
        .map(|b| map_band(b, &cell))
        .collect::<Result<Vec<_>>>()?;
    a.with_bands(bands, Some(nodata))
}

/// Cell-wise comparison of two co-registered grids as a 0/1 grid
pub fn compare<T: RasterElement>(a: &Raster<T>, b: &Raster<T>, op: CompareOp) -> Result<Raster<u8>> {
    local_combine(a, b, BOOL_NODATA, |x, y| Ok(Some(u8::from(op.test(x, y)))))
}

/// Compare every cell against a constant
pub fn compare_scalar<T: RasterElement>(a: &Raster<T>, value: T, op: CompareOp) -> Result<Raster<u8>> {
    local_map(a, BOOL_NODATA, |x| Some(u8::from(op.test(x, value))))
}

/// Logical combination of two 0/1 grids
pub fn logical(a: &Raster<u8>, b: &Raster<u8>, op: LogicalOp) -> Result<Raster<u8>> {
    local_combine(a, b, BOOL_NODATA, |x, y| {
        let (p, q) = (x != 0, y != 0);
        let v = match op {
            LogicalOp::And => p && q,
            LogicalOp::Or => p || q,
            LogicalOp::Xor => p ^ q,
        };
        Ok(Some(u8::from(v)))
    })
}

pub fn logical_not(a: &Raster<u8>) -> Result<Raster<u8>> {
    local_map(a, BOOL_NODATA, |x| Some(u8::from(x == 0)))
}

/// New grid where every cell matching `predicate` is set to no-data.
///
/// When the input declares no sentinel the type's default one is used
/// (see [`Raster::nodata_or_default`]).
pub fn apply_mask<T, F>(raster: &Raster<T>, predicate: F) -> Result<Raster<T>>
where
    T: RasterElement,
    F: Fn(T) -> bool + Sync + Send,
{
    let nodata = raster.nodata_or_default()?;
    local_map(raster, nodata, |v| (!predicate(v)).then_some(v))
}

/// [`apply_mask`] writing into `raster`. The caller must hold the only
/// reference to the grid for the duration of the call.
pub fn apply_mask_in_place<T, F>(raster: &mut Raster<T>, predicate: F) -> Result<usize>
where
    T: RasterElement,
    F: Fn(T) -> bool,
{
    let nodata = raster.nodata_or_default()?;
    let src_nodata = raster.nodata();
    let mut masked = 0;
    for band in raster.bands_mut() {
        for v in band.iter_mut() {
            if !v.is_nodata(src_nodata) && predicate(*v) {
                *v = nodata;
                masked += 1;
            }
        }
    }
    raster.set_nodata(Some(nodata));
    Ok(masked)
}

/// Set to no-data every cell where the co-registered `mask` is non-zero.
/// Mask cells that are themselves no-data also mask.
pub fn mask_with<T: RasterElement>(raster: &Raster<T>, mask: &Raster<u8>) -> Result<Raster<T>> {
    raster.ensure_co_registered(mask)?;
    let nodata = raster.nodata_or_default()?;
    let (src_nodata, flag_nodata) = (raster.nodata(), mask.nodata());
    let cell = |v: T, m: u8| -> Result<T> {
        if m != 0 || m.is_nodata(flag_nodata) || v.is_nodata(src_nodata) {
            Ok(nodata)
        } else {
            Ok(v)
        }
    };
    let bands = raster
        .bands()
        .iter()
        .map(|b| zip_band(b, mask.data(), &cell))
        .collect::<Result<Vec<_>>>()?;
    raster.with_bands(bands, Some(nodata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid<T: RasterElement>(values: Vec<T>, rows: usize, cols: usize) -> Raster<T> {
        Raster::from_vec(values, rows, cols).unwrap()
    }

    #[test]
    fn test_square_promotes() {
        let a = grid(vec![16u8; 4], 2, 2);
        let sq = local_arithmetic(&a, &a, ArithOp::Mul).unwrap();
        assert_eq!(sq.get(0, 0).unwrap(), 256u16);
        assert_eq!(u16::data_type(), <u8 as RasterElement>::Wide::data_type());
    }

    #[test]
    fn test_promoted_sentinel_is_unreachable() {
        let a = grid(vec![255u8, 0, 7, 255], 2, 2);
        let b = grid(vec![255u8, 0, 0, 1], 2, 2);
        let sum = local_arithmetic(&a, &b, ArithOp::Add).unwrap();
        assert_eq!(sum.nodata(), Some(u16::MAX));
        assert_eq!(sum.get(0, 0).unwrap(), 510);
        assert_eq!(sum.get(0, 1).unwrap(), 0);
        assert!(!sum.is_nodata_at(0, 1).unwrap());
    }

    #[test]
    fn test_divide_by_zero_is_nodata() {
        let a = grid(vec![10i16, 9, 8, 7], 2, 2);
        let b = grid(vec![2i16, 0, 4, -7], 2, 2);
        let q = local_arithmetic(&a, &b, ArithOp::Div).unwrap();
        assert_eq!(q.get(0, 0).unwrap(), 5i32);
        assert!(q.is_nodata_at(0, 1).unwrap());
        assert_eq!(q.get(1, 1).unwrap(), -1);
    }

    #[test]
    fn test_widest_type_overflow_fails() {
        let a = grid(vec![i128::MAX; 1], 1, 1);
        let err = local_arithmetic(&a, &a, ArithOp::Add).unwrap_err();
        assert!(matches!(err, Error::TypeOverflow { .. }));
    }

    #[test]
    fn test_nodata_propagates() {
        let mut a = grid(vec![1.0f32, f32::NAN, 3.0, -9999.0], 2, 2);
        a.set_nodata(Some(-9999.0));
        let out = local_scalar(&a, 1.0, ArithOp::Add).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 2.0f64);
        assert!(out.is_nodata_at(0, 1).unwrap());
        assert!(out.is_nodata_at(1, 1).unwrap());
    }

    #[test]
    fn test_compare_and_logical() {
        let a = grid(vec![1, 5, 10, 3], 2, 2);
        let gt = compare_scalar(&a, 4, CompareOp::Gt).unwrap();
        assert_eq!(gt.data().iter().copied().collect::<Vec<u8>>(), vec![0, 1, 1, 0]);
        let lt = compare_scalar(&a, 6, CompareOp::Lt).unwrap();
        let both = logical(&gt, &lt, LogicalOp::And).unwrap();
        assert_eq!(both.data().iter().copied().collect::<Vec<u8>>(), vec![0, 1, 0, 0]);
        let not = logical_not(&both).unwrap();
        assert_eq!(not.data().iter().copied().collect::<Vec<u8>>(), vec![1, 0, 1, 1]);
    }

    #[test]
    fn test_compare_requires_co_registration() {
        let a = grid(vec![1.0f64; 4], 2, 2);
        let b = grid(vec![1.0f64; 6], 2, 3);
        assert!(matches!(compare(&a, &b, CompareOp::Eq), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_apply_mask() {
        let a = grid(vec![1.0f64, 200.0, 3.0, 400.0], 2, 2);
        let masked = apply_mask(&a, |v| v > 100.0).unwrap();
        assert_eq!(masked.get(0, 0).unwrap(), 1.0);
        assert!(masked.get(0, 1).unwrap().is_nan());
        assert_eq!(masked.statistics().valid_count, 2);
        // input untouched
        assert_eq!(a.get(0, 1).unwrap(), 200.0);

        let mut b = a.clone();
        assert_eq!(apply_mask_in_place(&mut b, |v| v > 100.0).unwrap(), 2);
        assert!(b.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_mask_keeps_unsigned_zero_valid() {
        let a = grid(vec![0u8, 5, 200], 1, 3);
        let masked = apply_mask(&a, |v| v > 100).unwrap();
        assert_eq!(masked.nodata(), Some(u8::MAX));
        assert_eq!(masked.statistics().valid_count, 2);
        assert!(!masked.is_nodata_at(0, 0).unwrap());
        assert!(masked.is_nodata_at(0, 2).unwrap());

        let saturated = grid(vec![0u8, 255], 1, 2);
        assert!(matches!(apply_mask(&saturated, |v| v > 100), Err(Error::NoDataInUse { .. })));
        let mut declared = saturated.clone();
        declared.set_nodata(Some(7));
        assert_eq!(apply_mask_in_place(&mut declared, |v| v > 100).unwrap(), 1);
        assert!(declared.is_nodata_at(0, 1).unwrap());
    }

    #[test]
    fn test_mask_with_grid() {
        let a = grid(vec![1i32, 2, 3, 4], 2, 2);
        let m = grid(vec![0u8, 1, 0, 0], 2, 2);
        let out = mask_with(&a, &m).unwrap();
        assert_eq!(out.nodata(), Some(i32::MIN));
        assert!(out.is_nodata_at(0, 1).unwrap());
        assert_eq!(out.get(1, 1).unwrap(), 4);
    }
}
