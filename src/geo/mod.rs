use crate::error::AppError;

/// Rejects malformed coordinates at ingest. The device is expected to
/// resend on its own cadence, so there is no retry path here.
pub fn validate_coords(latitude: f64, longitude: f64) -> Result<(), AppError> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(AppError::BadRequest(
            "latitude and longitude must be finite numbers".to_string(),
        ));
    }

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::BadRequest(format!(
            "latitude {latitude} out of range [-90, 90]"
        )));
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::BadRequest(format!(
            "longitude {longitude} out of range [-180, 180]"
        )));
    }

    Ok(())
}
