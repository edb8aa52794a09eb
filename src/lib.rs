//! Radar target acquisition and tracking.
//!
//! This crate tracks moving contacts across successive rotations of a
//! scanning radar and produces stabilized position, course and speed
//! estimates for collision avoidance and display overlay. It owns a rolling
//! polar image of the most recent rotation, walks blob boundaries in it,
//! runs an extended Kalman filter per target in a local tangent plane, and
//! re-locates every target once per rotation in three passes of increasing
//! search tolerance.
//!
//! The receive pipeline feeds legend-coded spokes in through
//! [`Arpa::process_spoke`]; a navigation feed supplies the own-ship fix via
//! [`Arpa::set_position`]. Once per rotation the host calls
//! [`Arpa::refresh_all`], which returns the [`TargetReport`] records for the
//! outbound message encoder, and optionally
//! [`Arpa::search_doppler_targets`] to auto-acquire contacts flagged by the
//! sensor's Doppler processing. Everything here is synchronous and free of
//! I/O; the host keeps the whole [`Arpa`] value under the same exclusion
//! scope it uses for the receive pipeline.

use thiserror::Error;

pub mod arpa;
pub mod contour;
pub mod doppler;
pub mod geo;
pub mod polar;

mod history;
mod kalman;
mod setup;
mod target;

pub use arpa::{Arpa, Legend, Spoke, TargetContour, TargetReport};
pub use doppler::Doppler;
pub use geo::{ExtendedPosition, GeoPosition};
pub use polar::Polar;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything that can go wrong while re-locating a single target. None of
/// these abort the sweep; the registry logs them and the target either
/// retries on a later pass or transitions to lost per the lifecycle rules.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackError {
    #[error("range beyond the outer edge of the image")]
    RangeTooHigh,
    #[error("range inside the main bang")]
    RangeTooLow,
    #[error("no echo at the starting cell")]
    NoEchoAtStart,
    #[error("starting cell is not on the blob boundary")]
    StartPointNotOnContour,
    #[error("boundary walk found no next cell")]
    BrokenContour,
    #[error("no blob within the search pattern")]
    NoContourFound,
    #[error("contour too long, treated as clutter")]
    ContourTooLong,
    #[error("contour length rejected by the running average")]
    ContourLengthRejected,
    #[error("target already refreshed this rotation")]
    AlreadyRefreshed,
    #[error("the next rotation has not reached the target yet")]
    WaitForRefresh,
    #[error("capture fix outside valid latitude/longitude")]
    InvalidCaptureFix,
    #[error("sensor has no Doppler capability")]
    DopplerNotSupported,
    #[error("target lost")]
    Lost,
}
