pub type Result<T = ()> = std::result::Result<T, Error>;

mod cell;
mod error;
mod georeference;
mod geotransform;
mod memraster;
mod point;
pub mod raster;
mod rastersize;
mod rect;

#[cfg(feature = "gdal")]
pub mod gdalinterop;
#[cfg(feature = "gdal")]
mod gdalraster;

#[doc(inline)]
pub use {
    cell::Cell, error::Error, georeference::GeoReference, geotransform::GeoTransform, memraster::MemRaster, point::Point,
    raster::PixelWindow, raster::Raster, raster::RasterIO, raster::RasterWriter, rastersize::RasterSize, rect::Rect,
};

#[cfg(feature = "gdal")]
#[doc(inline)]
pub use gdalraster::GdalRaster;
