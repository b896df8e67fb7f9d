use std::ffi::c_void;
use std::path::Path;

use gdal::raster::GdalType;
use gdal::{Dataset, DatasetOptions, GdalOpenFlags, Metadata};

use crate::gdalinterop::check_gdal_rc;
use crate::raster::PixelWindow;
use crate::{Error, GeoReference, GeoTransform, Raster, RasterIO, RasterSize, Result};

/// A raster backed by a GDAL dataset opened from disk. This is the adapter
/// the registration tools use for their reference/floating/output images;
/// the algorithms themselves only ever see the [`Raster`]/[`RasterWriter`](crate::RasterWriter)
/// trait objects.
pub struct GdalRaster {
    dataset: Dataset,
    geo_reference: GeoReference,
}

impl GdalRaster {
    fn geo_reference_from_dataset(dataset: &Dataset) -> Result<GeoReference> {
        let (cols, rows) = dataset.raster_size();
        let band_count = dataset.raster_count();
        let geo_transform = GeoTransform::new(dataset.geo_transform()?);
        Ok(GeoReference::new(
            RasterSize::with_rows_cols(rows, cols),
            band_count,
            geo_transform,
            dataset.projection(),
        ))
    }
}

impl Raster for GdalRaster {
    fn geo_reference(&self) -> &GeoReference {
        &self.geo_reference
    }

    fn read_window(&self, band: usize, window: PixelWindow) -> Result<Vec<f32>> {
        let cols = self.geo_reference.columns() as i32;
        let rows = self.geo_reference.rows() as i32;

        let mut out = vec![f32::NAN; window.width * window.height];

        let read_col_off = window.col_off.max(0);
        let read_row_off = window.row_off.max(0);
        let read_col_end = (window.col_off + window.width as i32).min(cols);
        let read_row_end = (window.row_off + window.height as i32).min(rows);

        if read_col_end <= read_col_off || read_row_end <= read_row_off {
            return Ok(out);
        }

        let read_width = (read_col_end - read_col_off) as usize;
        let read_height = (read_row_end - read_row_off) as usize;

        let mut staging = vec![0f32; read_width * read_height];
        let rasterband = self.dataset.rasterband(band + 1).map_err(Error::Gdal)?;

        unsafe {
            check_gdal_rc(gdal_sys::GDALRasterIOEx(
                rasterband.c_rasterband(),
                gdal_sys::GDALRWFlag::GF_Read,
                read_col_off,
                read_row_off,
                read_width as i32,
                read_height as i32,
                staging.as_mut_ptr() as *mut c_void,
                read_width as i32,
                read_height as i32,
                f32::gdal_ordinal(),
                0,
                read_width as gdal_sys::GSpacing * std::mem::size_of::<f32>() as gdal_sys::GSpacing,
                core::ptr::null_mut(),
            ))
            .map_err(Error::Gdal)?;
        }

        let dst_col_off = (read_col_off - window.col_off) as usize;
        let dst_row_off = (read_row_off - window.row_off) as usize;

        for r in 0..read_height {
            let dst_row = dst_row_off + r;
            let dst_start = dst_row * window.width + dst_col_off;
            let src_start = r * read_width;
            out[dst_start..dst_start + read_width].copy_from_slice(&staging[src_start..src_start + read_width]);
        }

        Ok(out)
    }
}

impl RasterIO for GdalRaster {
    fn open_read_only(path: &Path) -> Result<Self> {
        let ds_opts = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_RASTER,
            ..Default::default()
        };
        let dataset = Dataset::open_ex(path, ds_opts).map_err(Error::Gdal)?;
        let geo_reference = GdalRaster::geo_reference_from_dataset(&dataset)?;
        Ok(GdalRaster { dataset, geo_reference })
    }

    fn create(path: &Path, geo_reference: GeoReference, band_descriptions: &[&str]) -> Result<Self> {
        let driver_name = driver_name_for_path(path)?;
        let driver = gdal::DriverManager::get_driver_by_name(driver_name).map_err(Error::Gdal)?;

        let mut dataset = driver
            .create_with_band_type::<f32, _>(
                path,
                geo_reference.columns(),
                geo_reference.rows(),
                band_descriptions.len().max(geo_reference.band_count()),
            )
            .map_err(Error::Gdal)?;

        dataset
            .set_geo_transform(&geo_reference.geo_transform().coefficients())
            .map_err(Error::Gdal)?;
        dataset.set_projection(geo_reference.projection()).map_err(Error::Gdal)?;

        for (idx, description) in band_descriptions.iter().enumerate() {
            let mut band = dataset.rasterband(idx + 1).map_err(Error::Gdal)?;
            band.set_description(description).map_err(Error::Gdal)?;
        }

        Ok(GdalRaster { dataset, geo_reference })
    }
}

impl crate::RasterWriter for GdalRaster {
    fn write_row(&mut self, band: usize, row: usize, data: &[f32]) -> Result<()> {
        let mut rasterband = self.dataset.rasterband(band + 1).map_err(Error::Gdal)?;
        let buffer = gdal::raster::Buffer::new((data.len(), 1), data.to_vec());
        rasterband
            .write((0, row as isize as isize), (data.len(), 1), &buffer)
            .map_err(Error::Gdal)
    }
}

impl GdalRaster {
    /// Attach ground control points to this dataset's metadata, replacing
    /// any geotransform-based georeferencing with GCP-based georeferencing
    /// (GDAL's convention: a dataset carries either a geotransform or GCPs,
    /// not both). `pixel`/`line` are 0-based; callers porting 1-based pixel
    /// coordinates from a tie-point file must subtract 1 first. Grounded on
    /// `RSGISAddGCPsGDAL::convertRSGIS2GDALGCP`.
    pub fn set_gcps(&mut self, gcps: &[(f64, f64, f64, f64)], projection: &str) -> Result<()> {
        use std::ffi::CString;

        let id_strings: Vec<CString> = (0..gcps.len()).map(|i| CString::new(format!("gcp_{i}")).unwrap()).collect();
        let info_string = CString::new("").unwrap();

        let mut gdal_gcps: Vec<gdal_sys::GDAL_GCP> = gcps
            .iter()
            .zip(id_strings.iter())
            .map(|(&(pixel, line, x, y), id)| gdal_sys::GDAL_GCP {
                pszId: id.as_ptr() as *mut _,
                pszInfo: info_string.as_ptr() as *mut _,
                dfGCPPixel: pixel,
                dfGCPLine: line,
                dfGCPX: x,
                dfGCPY: y,
                dfGCPZ: 0.0,
            })
            .collect();

        let projection_c = CString::new(projection).unwrap();

        unsafe {
            check_gdal_rc(gdal_sys::GDALSetGCPs(
                self.dataset.c_dataset(),
                gdal_gcps.len() as i32,
                gdal_gcps.as_mut_ptr(),
                projection_c.as_ptr(),
            ))
            .map_err(Error::Gdal)?;
        }

        Ok(())
    }
}

fn driver_name_for_path(path: &Path) -> Result<&'static str> {
    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
    let name = match ext.as_str() {
        "tif" | "tiff" => "GTiff",
        "img" => "HFA",
        "" => "MEM",
        _ => {
            return Err(Error::InvalidArgument(format!(
                "could not determine a GDAL driver for output path {}",
                path.display()
            )))
        }
    };
    Ok(name)
}
