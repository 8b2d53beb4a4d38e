use crate::cluster::ClusterCenters;
use crate::config::InhibitionParams;

/// Relative contrast drop above which a pellet's surroundings count as
/// "much flatter than the dish".
pub(crate) const BIG_CONTRAST_DIFFERENCE: f32 = 0.65;

const CONTACT_SENSITIVITY: f32 = 0.7;
const LOW_CONTRAST_SENSITIVITY: f32 = 0.05;
const MAX_AUTO_SENSITIVITY: f32 = 0.8;

/// `(global contrast - local contrast) / global contrast`, or 0 when the dish
/// has no contrast at all.
pub(crate) fn relative_contrast_difference(
    local: &ClusterCenters,
    global: &ClusterCenters,
) -> f32 {
    let global_contrast = global.contrast();
    if global_contrast == 0.0 {
        return 0.0;
    }
    (global_contrast - local.contrast()) / global_contrast
}

/// Reading sensitivity in [0, 1] for one pellet.
///
/// A configured sensitivity > 0 is returned unchanged. Otherwise:
/// - bacteria touching the pellet (local contrast collapsed and the local
///   bacteria level sits on the global bacteria level) gives 0.7,
/// - a local contrast at or below `min_contrast` gives 0.05,
/// - else `(r^3 + 1) / 2` clamped to [0, 0.8], with `r` the relative contrast
///   difference. Equal local and global contrast gives exactly 0.5.
pub fn reading_sensitivity(
    local: &ClusterCenters,
    global: &ClusterCenters,
    params: &InhibitionParams,
) -> f32 {
    if params.sensitivity > 0.0 {
        return params.sensitivity;
    }

    let rel = relative_contrast_difference(local, global);
    let is_contact = rel >= BIG_CONTRAST_DIFFERENCE
        && (local.bacteria - global.inhibition).abs() > (local.bacteria - global.bacteria).abs();

    if is_contact {
        CONTACT_SENSITIVITY
    } else if local.contrast() <= params.min_contrast {
        LOW_CONTRAST_SENSITIVITY
    } else {
        ((rel.powi(3) + 1.0) * 0.5).clamp(0.0, MAX_AUTO_SENSITIVITY)
    }
}
