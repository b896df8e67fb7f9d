use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Rasters do not overlap")]
    NoOverlap,
    #[error("Raster resolutions do not match within tolerance")]
    ResolutionMismatch,
    #[error("Raster rotation parameters do not match")]
    RotationMismatch,
    #[error("No tie points were retained after filtering")]
    NoTiePointsRetained,
    #[error("Numeric solve did not converge: {0}")]
    NumericFailure(String),
    #[error(transparent)]
    Geo(#[from] geo::Error),
}

pub type Result<T = ()> = std::result::Result<T, Error>;
