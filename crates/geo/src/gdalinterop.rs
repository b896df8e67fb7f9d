//! Low-level GDAL plumbing: error-code translation and logging setup.
//! [`GdalRaster`](crate::GdalRaster) is built on top of these helpers; they
//! are exposed separately so a CLI entry point can wire up GDAL's error
//! handler before opening any dataset.

use gdal::errors::GdalError;

/// Route GDAL's own error/warning/debug messages through the `log` facade
/// instead of stderr, so they interleave with the rest of a tool's output.
pub fn setup_logging(debug: bool) {
    if debug && gdal::config::set_config_option("CPL_DEBUG", "ON").is_err() {
        log::debug!("failed to set GDAL debug level");
    }

    gdal::config::set_error_handler(|sev, _ec, msg| {
        use gdal::errors::CplErrType;
        match sev {
            CplErrType::Debug => log::debug!("GDAL: {msg}"),
            CplErrType::Warning => log::warn!("GDAL: {msg}"),
            CplErrType::Failure | CplErrType::Fatal => log::error!("GDAL: {msg}"),
            CplErrType::None => {}
        }
    });
}

pub(crate) fn check_gdal_rc(rc: gdal_sys::CPLErr::Type) -> std::result::Result<(), GdalError> {
    if rc != 0 {
        let msg = last_error_message();
        let number = unsafe { gdal_sys::CPLGetLastErrorNo() };
        Err(GdalError::CplError { class: rc, number, msg })
    } else {
        Ok(())
    }
}

fn last_error_message() -> String {
    let raw = unsafe { gdal_sys::CPLGetLastErrorMsg() };
    unsafe { std::ffi::CStr::from_ptr(raw) }.to_string_lossy().into_owned()
}
