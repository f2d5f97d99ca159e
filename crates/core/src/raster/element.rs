//! Raster element trait for generic cell values

use num_traits::{Bounded, Num, NumCast};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

/// Numeric cell type identifiers, spelled the way common raster tooling
/// names them (`uint8`, `int16`, `float32`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Float32,
    Float64,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Int128 => "int128",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::UInt128 => "uint128",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }

    /// Width of one cell in bits
    pub fn bits(&self) -> u32 {
        match self {
            DataType::Int8 | DataType::UInt8 => 8,
            DataType::Int16 | DataType::UInt16 => 16,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 32,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 64,
            DataType::Int128 | DataType::UInt128 => 128,
        }
    }

    /// 128-bit integers only exist as promotion targets and have no
    /// counterpart in external raster formats.
    pub fn is_interchange(&self) -> bool {
        !matches!(self, DataType::Int128 | DataType::UInt128)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// Integer types mark missing cells with an in-range sentinel; floating
/// types additionally treat NaN as missing regardless of the sentinel.
pub trait RasterElement:
    Copy + Clone + Debug + Display + PartialOrd + PartialEq + Num + NumCast + Bounded + Send + Sync + 'static
{
    /// Next wider type used by arithmetic so that a single operation on
    /// two promoted operands cannot overflow.
    type Wide: RasterElement;

    /// Identifier of this cell type
    fn data_type() -> DataType;

    /// Minimum value representable by this type
    fn lowest() -> Self {
        <Self as Bounded>::min_value()
    }

    /// Maximum value representable by this type
    fn highest() -> Self {
        <Self as Bounded>::max_value()
    }

    /// Default no-data value for this type: NaN for floats, the minimum
    /// for signed and the maximum for unsigned integers, so that zero is
    /// never the sentinel.
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Lossless conversion into [`Self::Wide`]
    fn widen(self) -> Self::Wide;

    fn try_add(self, rhs: Self) -> Option<Self>;
    fn try_sub(self, rhs: Self) -> Option<Self>;
    fn try_mul(self, rhs: Self) -> Option<Self>;
    /// `None` on overflow; callers handle a zero divisor themselves
    fn try_div(self, rhs: Self) -> Option<Self>;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64 only if the value survives the round trip exactly
    fn from_f64_exact(value: f64) -> Option<Self> {
        if Self::is_float() {
            return NumCast::from(value);
        }
        if !value.is_finite() {
            return None;
        }
        let cast: Self = NumCast::from(value)?;
        (cast.to_f64()? == value).then_some(cast)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $wide:ty, $dt:ident, $nodata:ident) => {
        impl RasterElement for $t {
            type Wide = $wide;

            fn data_type() -> DataType {
                DataType::$dt
            }

            fn default_nodata() -> Self {
                <$t>::$nodata
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }

            fn is_float() -> bool {
                false
            }

            fn widen(self) -> $wide {
                <$wide as From<$t>>::from(self)
            }

            fn try_add(self, rhs: Self) -> Option<Self> {
                <$t>::checked_add(self, rhs)
            }

            fn try_sub(self, rhs: Self) -> Option<Self> {
                <$t>::checked_sub(self, rhs)
            }

            fn try_mul(self, rhs: Self) -> Option<Self> {
                <$t>::checked_mul(self, rhs)
            }

            fn try_div(self, rhs: Self) -> Option<Self> {
                <$t>::checked_div(self, rhs)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $dt:ident) => {
        impl RasterElement for $t {
            type Wide = f64;

            fn data_type() -> DataType {
                DataType::$dt
            }

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }

            fn widen(self) -> f64 {
                <f64 as From<$t>>::from(self)
            }

            fn try_add(self, rhs: Self) -> Option<Self> {
                Some(self + rhs)
            }

            fn try_sub(self, rhs: Self) -> Option<Self> {
                Some(self - rhs)
            }

            fn try_mul(self, rhs: Self) -> Option<Self> {
                Some(self * rhs)
            }

            fn try_div(self, rhs: Self) -> Option<Self> {
                Some(self / rhs)
            }
        }
    };
}

impl_raster_element_int!(i8, i16, Int8, MIN);
impl_raster_element_int!(i16, i32, Int16, MIN);
impl_raster_element_int!(i32, i64, Int32, MIN);
impl_raster_element_int!(i64, i128, Int64, MIN);
impl_raster_element_int!(i128, i128, Int128, MIN);
impl_raster_element_int!(u8, u16, UInt8, MAX);
impl_raster_element_int!(u16, u32, UInt16, MAX);
impl_raster_element_int!(u32, u64, UInt32, MAX);
impl_raster_element_int!(u64, u128, UInt64, MAX);
impl_raster_element_int!(u128, u128, UInt128, MAX);
impl_raster_element_float!(f32, Float32);
impl_raster_element_float!(f64, Float64);
