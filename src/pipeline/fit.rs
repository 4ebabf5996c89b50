//! Aspect-ratio preserving image fitting.

/// Display size of an image in points after fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedSize {
    pub width: f64,
    pub height: f64,
}

/// Scale an image of `image_width × image_height` to the largest size that
/// fits inside `frame_width × frame_height` with the same aspect ratio.
///
/// Returns `None` for zero, negative or non-finite input.
pub fn fit_image(
    image_width: f64,
    image_height: f64,
    frame_width: f64,
    frame_height: f64,
) -> Option<FittedSize> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if ![image_width, image_height, frame_width, frame_height]
        .into_iter()
        .all(valid)
    {
        return None;
    }

    let aspect = image_width / image_height;
    let height_at_full_width = frame_width / aspect;
    let fitted = if height_at_full_width <= frame_height {
        FittedSize {
            width: frame_width,
            height: height_at_full_width,
        }
    } else {
        FittedSize {
            width: frame_height * aspect,
            height: frame_height,
        }
    };
    Some(fitted)
}
