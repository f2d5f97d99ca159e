//! Moving-window shapes for focal operations

use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Shape of the window centered on each cell by a focal operation.
///
/// All shapes have odd extents so the window has a well-defined center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Neighborhood {
    /// Full `height x width` rectangle
    Rectangle { height: usize, width: usize },
    /// Cells whose center lies within `radius` cells of the window center
    Circle(usize),
    /// Explicit boolean footprint; `true` cells take part in the window
    Footprint(Array2<bool>),
}

impl Neighborhood {
    /// Square window of side `2 * radius + 1`
    pub fn square(radius: usize) -> Self {
        let side = radius * 2 + 1;
        Neighborhood::Rectangle {
            height: side,
            width: side,
        }
    }

    /// 3x3 without corners
    pub fn rook() -> Self {
        Neighborhood::Footprint(Array2::from_shape_fn((3, 3), |(r, c)| r == 1 || c == 1))
    }

    /// Window extents as (height, width)
    pub fn extent(&self) -> (usize, usize) {
        match self {
            Neighborhood::Rectangle { height, width } => (*height, *width),
            Neighborhood::Circle(r) => (r * 2 + 1, r * 2 + 1),
            Neighborhood::Footprint(mask) => mask.dim(),
        }
    }

    /// Half extents (row radius, column radius)
    pub fn radii(&self) -> (usize, usize) {
        let (h, w) = self.extent();
        (h / 2, w / 2)
    }

    pub fn validate(&self) -> Result<()> {
        let (h, w) = self.extent();
        if h == 0 || w == 0 || h % 2 == 0 || w % 2 == 0 {
            return Err(Error::InvalidParameter {
                name: "neighborhood",
                value: format!("{h}x{w}"),
                reason: "window extents must be odd and non-zero".into(),
            });
        }
        if let Neighborhood::Footprint(mask) = self
            && !mask.iter().any(|&b| b)
        {
            return Err(Error::InvalidParameter {
                name: "neighborhood",
                value: format!("{h}x{w}"),
                reason: "footprint selects no cells".into(),
            });
        }
        Ok(())
    }

    /// Whether a position relative to the center takes part in the window
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        let (rr, rc) = self.radii();
        let (rr, rc) = (rr as isize, rc as isize);
        if dr.abs() > rr || dc.abs() > rc {
            return false;
        }
        match self {
            Neighborhood::Rectangle { .. } => true,
            Neighborhood::Circle(r) => {
                let r = *r as isize;
                dr * dr + dc * dc <= r * r
            }
            Neighborhood::Footprint(mask) => mask[((dr + rr) as usize, (dc + rc) as usize)],
        }
    }

    /// Relative (row, col) offsets of the window's active cells, row-major
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let (rr, rc) = self.radii();
        let (rr, rc) = (rr as isize, rc as isize);
        let mut offsets = Vec::new();
        for dr in -rr..=rr {
            for dc in -rc..=rc {
                if self.contains(dr, dc) {
                    offsets.push((dr, dc));
                }
            }
        }
        offsets
    }
}
