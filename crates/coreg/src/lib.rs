//! Image co-registration and warping engine: tie-point discovery, sub-pixel
//! local matching, two tie-point solvers (independent and elastic), and a
//! tie-point-driven warp engine. See `SPEC_FULL.md` at the workspace root
//! for the component map (C1-C12).

pub type Result<T = ()> = std::result::Result<T, Error>;

mod basic;
mod error;
mod gcpcarrier;
mod matcher;
mod metric;
mod overlap;
mod pixelshift;
mod polyfit;
mod singlelayer;
mod tiepoint;
pub mod tiepointio;
pub mod warp;

#[doc(inline)]
pub use {
    basic::{register as register_basic, seed_grid, BasicConfig},
    error::Error,
    gcpcarrier::{copy_pixels, read_gcp_file, Gcp},
    matcher::{match_tie_point, MatcherConfig},
    metric::SimilarityMetric,
    overlap::{compute_overlap, shifted_overlap, OverlapRegion, ShiftedOverlap},
    pixelshift::{plan as plan_pixel_shift, register as register_pixel_shift},
    singlelayer::{register as register_single_layer, SingleLayerConfig},
    tiepoint::{build_neighbour_graph, TiePoint, TiePointNode},
    tiepointio::TiePointFormat,
};
