//! Camera framing over rendered geometry.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use tracing::debug;

use crate::error::SurfaceError;
use crate::geometry::Bounds;
use crate::surface::{FitOptions, Surface};

/// Frame `bounds` on `surface`. Returns whether the camera was asked to move.
///
/// Empty bounds (nothing rendered) leave the camera alone.
///
/// # Errors
///
/// Propagates the surface's camera failure.
pub fn fit(surface: &mut dyn Surface, bounds: &Bounds, options: FitOptions) -> Result<bool, SurfaceError> {
    if bounds.is_empty() {
        debug!("no coordinates to fit; camera unchanged");
        return Ok(false);
    }
    surface.fit_bounds(*bounds, options)?;
    Ok(true)
}
