//! Error type shared by every measurement stage.

use std::path::PathBuf;

use thiserror::Error;

/// Abstract error category of a [`MeasureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Impossible or out-of-bounds geometry (pellets too close, regions
    /// leaving the image).
    Geometry,
    /// The caller handed in something of the wrong shape (empty image,
    /// bad pellet index, unknown profile kind).
    InputShape,
    /// Not enough signal to measure (short profile, nothing to cluster).
    InsufficientData,
    /// The configuration is inconsistent.
    Config,
    /// Image could not be read from disk.
    Io,
}

/// Errors raised by context construction, profiling and estimation.
///
/// Every error is fatal to the call that raised it. Domain outcomes such as
/// "no inhibition" are not errors, see [`crate::ZoneOutcome`].
#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("pellet {index} is too close to its nearest neighbour (roi radius {radius_px} px)")]
    PelletsTooClose { index: usize, radius_px: i64 },

    #[error("roi of pellet {index} is degenerate ({left},{top})..({right},{bottom})")]
    DegenerateRoi {
        index: usize,
        left: i64,
        top: i64,
        right: i64,
        bottom: i64,
    },

    #[error("{region} region [{x0:.1},{y0:.1}]..[{x1:.1},{y1:.1}] leaves the {width}x{height} image")]
    RegionOutOfBounds {
        region: &'static str,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        width: u32,
        height: u32,
    },

    #[error("empty {what} image")]
    EmptyImage { what: &'static str },

    #[error("pellet index {index} out of range ({count} pellets)")]
    PelletIndexOutOfRange { index: usize, count: usize },

    #[error("unknown radial profile kind '{0}'")]
    UnknownProfileKind(String),

    #[error("at least one pellet circle is required")]
    NoPellets,

    #[error("intensity profile of pellet {index} is too short ({len} <= pellet radius {pellet_radius_px} px)")]
    ProfileTooShort {
        index: usize,
        len: usize,
        pellet_radius_px: usize,
    },

    #[error("no valid pixels to cluster in {what}")]
    NoClusterSamples { what: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl MeasureError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PelletsTooClose { .. }
            | Self::DegenerateRoi { .. }
            | Self::RegionOutOfBounds { .. } => ErrorKind::Geometry,
            Self::EmptyImage { .. }
            | Self::PelletIndexOutOfRange { .. }
            | Self::UnknownProfileKind(_)
            | Self::NoPellets => ErrorKind::InputShape,
            Self::ProfileTooShort { .. } | Self::NoClusterSamples { .. } => {
                ErrorKind::InsufficientData
            }
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::ImageLoad { .. } => ErrorKind::Io,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MeasureError>;
