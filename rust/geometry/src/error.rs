// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for spherical geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, combining or loading regions
#[derive(Error, Debug)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("invalid Ra,Dec pair: {0}")]
    InvalidRaDec(String),

    #[error("missing sky contours description required for spherical geometry elements")]
    MissingContours,

    /// A polygon contour that cannot describe an area
    #[error("invalid contour: {0}")]
    InvalidContour(String),

    /// `["CAP", [ra, dec], aperture]` token with the wrong shape
    #[error("invalid CAP description: {0}")]
    InvalidCap(String),

    #[error("invalid texture coordinates: {0}")]
    InvalidTexCoords(String),

    #[error("contour is not convex: {0}")]
    InvalidConvexContour(String),

    /// Unknown `type` tag or a map missing a mandatory key
    #[error("invalid region description: {0}")]
    InvalidRegion(String),

    /// Geometric combination the engine does not implement
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
