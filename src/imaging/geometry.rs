//! Pure crop-rectangle calculations.
//!
//! All functions here are pure and testable without any I/O or images.
//! A crop box is expressed as `(left, top, right, bottom)` where `right` and
//! `bottom` are exclusive edges, so the retained region is
//! `right - left` pixels wide and `bottom - top` pixels tall.

use std::fmt;

/// How much of each image to cut away.
///
/// Chosen once per batch run and applied to every image in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropSpec {
    /// Remove a strip of `n` pixels from the bottom edge.
    BottomMargin(u32),
    /// Keep a square of side `2 * n` centred on the image centre.
    CenteredSquare(u32),
    /// Remove independent margins from each edge.
    EdgeMargins {
        top: u32,
        right: u32,
        bottom: u32,
        left: u32,
    },
}

impl fmt::Display for CropSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropSpec::BottomMargin(px) => write!(f, "bottom margin {px}px"),
            CropSpec::CenteredSquare(half) => {
                let side = u64::from(*half) * 2;
                write!(f, "centered square {side}x{side}px")
            }
            CropSpec::EdgeMargins {
                top,
                right,
                bottom,
                left,
            } => write!(
                f,
                "edge margins top {top}px, right {right}px, bottom {bottom}px, left {left}px"
            ),
        }
    }
}

/// Rectangle retained from a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// `(left, top, right, bottom)`, handy for assertions.
    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.left, self.top, self.right, self.bottom)
    }
}

/// Compute the crop rectangle for an image of `width` x `height`.
///
/// Returns `None` when the crop is infeasible: the rectangle would leave the
/// image bounds or would have zero area.
///
/// # Examples
/// ```
/// # use batch_crop::imaging::{CropSpec, compute_crop_box};
/// let b = compute_crop_box(100, 200, &CropSpec::BottomMargin(175)).unwrap();
/// assert_eq!(b.as_tuple(), (0, 0, 100, 25));
///
/// assert!(compute_crop_box(100, 100, &CropSpec::BottomMargin(175)).is_none());
/// ```
pub fn compute_crop_box(width: u32, height: u32, spec: &CropSpec) -> Option<CropBox> {
    let candidate = match *spec {
        CropSpec::BottomMargin(px) => {
            if px >= height {
                return None;
            }
            CropBox {
                left: 0,
                top: 0,
                right: width,
                bottom: height - px,
            }
        }
        CropSpec::CenteredSquare(half) => {
            let cx = width / 2;
            let cy = height / 2;
            // checked_sub catches the left/top edge, the bound check below the right/bottom one
            CropBox {
                left: cx.checked_sub(half)?,
                top: cy.checked_sub(half)?,
                right: cx.checked_add(half)?,
                bottom: cy.checked_add(half)?,
            }
        }
        CropSpec::EdgeMargins {
            top,
            right,
            bottom,
            left,
        } => CropBox {
            left,
            top,
            right: width.checked_sub(right)?,
            bottom: height.checked_sub(bottom)?,
        },
    };

    is_feasible(&candidate, width, height).then_some(candidate)
}

/// Inside `[0, width] x [0, height]` with positive area.
fn is_feasible(b: &CropBox, width: u32, height: u32) -> bool {
    b.right <= width && b.bottom <= height && b.left < b.right && b.top < b.bottom
}
