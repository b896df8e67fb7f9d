//! Tie-point text I/O (C8): four line-oriented formats, all UTF-8 with `#`
//! or `;` comment markers and blank lines allowed. Grounded on
//! `RSGISImageRegistration::exportTiePoints*Impl` (export) and the
//! corresponding import routines used by the warp tools.

use std::io::{BufRead, Write};

use geo::Point;

use crate::error::{Error, Result};
use crate::tiepoint::TiePoint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TiePointFormat {
    EnviImageToImage,
    EnviImageToMap,
    RsgisImageToMap,
    RsgisMapOffsets,
}

/// Write `points` to `writer` in the given format, with ≥10 significant
/// digits per numeric value (spec.md §6).
pub fn write<W: Write>(writer: &mut W, points: &[TiePoint], format: TiePointFormat) -> Result<()> {
    match format {
        TiePointFormat::EnviImageToImage => write_envi_image_to_image(writer, points),
        TiePointFormat::EnviImageToMap => write_envi_image_to_map(writer, points),
        TiePointFormat::RsgisImageToMap => write_rsgis_image_to_map(writer, points),
        TiePointFormat::RsgisMapOffsets => write_rsgis_map_offsets(writer, points),
    }
}

fn write_envi_image_to_image<W: Write>(writer: &mut W, points: &[TiePoint]) -> Result<()> {
    writeln!(writer, "; ENVI Image to Image GCP File")?;
    writeln!(writer, "; Base Image (x,y), Warp Image (x,y)")?;
    writeln!(writer, ";")?;
    for point in points {
        writeln!(writer, "\t{:.12}\t{:.12}\t{:.12}\t{:.12}", point.x_ref, point.y_ref, point.x_float, point.y_float)?;
    }
    Ok(())
}

fn write_envi_image_to_map<W: Write>(writer: &mut W, points: &[TiePoint]) -> Result<()> {
    writeln!(writer, "; ENVI Image to Map GCP File")?;
    writeln!(writer, "; Map (x,y), Image (x,y)")?;
    writeln!(writer, ";")?;
    for point in points {
        writeln!(writer, "\t{:.12}\t{:.12}\t{:.12}\t{:.12}", point.map.x(), point.map.y(), point.x_float, point.y_float)?;
    }
    Ok(())
}

fn write_rsgis_image_to_map<W: Write>(writer: &mut W, points: &[TiePoint]) -> Result<()> {
    writeln!(writer, "# RSGISLib Image to Map GCP File")?;
    writeln!(writer, "# Reference Map (E,N), Floating Image (x,y), Metric Value")?;
    writeln!(writer, "#")?;
    for point in points {
        writeln!(
            writer,
            "{:.12},{:.12},{:.12},{:.12},{:.12}",
            point.map.x(),
            point.map.y(),
            point.x_float,
            point.y_float,
            point.metric
        )?;
    }
    writeln!(writer, "# End Of File")?;
    Ok(())
}

fn write_rsgis_map_offsets<W: Write>(writer: &mut W, points: &[TiePoint]) -> Result<()> {
    writeln!(writer, "# RSGISLib Map offsets GCP File")?;
    writeln!(writer, "# Eastings, Northings, Offset to correct location for floating image (E,N), Metric Value")?;
    writeln!(writer, "#")?;
    for point in points {
        writeln!(
            writer,
            "{:.12},{:.12},{:.12},{:.12},{:.12}",
            point.map.x(),
            point.map.y(),
            point.x_shift,
            point.y_shift,
            point.metric
        )?;
    }
    writeln!(writer, "# End Of File")?;
    Ok(())
}

/// Parse tie points out of `reader` in the given format. Blank lines and
/// lines starting with `#` or `;` (after leading whitespace) are skipped,
/// regardless of which marker the format's own header uses.
pub fn read<R: BufRead>(reader: R, format: TiePointFormat) -> Result<Vec<TiePoint>> {
    let mut points = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        points.push(parse_line(trimmed, format)?);
    }
    Ok(points)
}

fn parse_line(line: &str, format: TiePointFormat) -> Result<TiePoint> {
    let fields: Vec<&str> = line.split(|c: char| c == '\t' || c == ',').map(str::trim).filter(|s| !s.is_empty()).collect();

    let parse = |s: &str| -> Result<f64> { s.parse::<f64>().map_err(|_| Error::Config(format!("invalid numeric field: {s}"))) };

    match format {
        TiePointFormat::EnviImageToImage => {
            if fields.len() < 4 {
                return Err(Error::Config(format!("expected 4 fields, got {}: {line}", fields.len())));
            }
            let x_ref = parse(fields[0])?;
            let y_ref = parse(fields[1])?;
            let x_float = parse(fields[2])?;
            let y_float = parse(fields[3])?;
            Ok(TiePoint::seed(Point::new(f64::NAN, f64::NAN), x_ref, y_ref, x_float, y_float))
        }
        TiePointFormat::EnviImageToMap => {
            if fields.len() < 4 {
                return Err(Error::Config(format!("expected 4 fields, got {}: {line}", fields.len())));
            }
            let easting = parse(fields[0])?;
            let northing = parse(fields[1])?;
            let x_float = parse(fields[2])?;
            let y_float = parse(fields[3])?;
            Ok(TiePoint::seed(Point::new(easting, northing), f64::NAN, f64::NAN, x_float, y_float))
        }
        TiePointFormat::RsgisImageToMap => {
            if fields.len() != 4 && fields.len() != 5 {
                return Err(Error::Config(format!("expected 4 or 5 fields, got {}: {line}", fields.len())));
            }
            let easting = parse(fields[0])?;
            let northing = parse(fields[1])?;
            let x_float = parse(fields[2])?;
            let y_float = parse(fields[3])?;
            let mut point = TiePoint::seed(Point::new(easting, northing), f64::NAN, f64::NAN, x_float, y_float);
            if fields.len() >= 5 {
                point.metric = parse(fields[4])? as f32;
            }
            Ok(point)
        }
        TiePointFormat::RsgisMapOffsets => {
            if fields.len() < 4 {
                return Err(Error::Config(format!("expected at least 4 fields, got {}: {line}", fields.len())));
            }
            let easting = parse(fields[0])?;
            let northing = parse(fields[1])?;
            let x_shift = parse(fields[2])?;
            let y_shift = parse(fields[3])?;
            let mut point = TiePoint::seed(Point::new(easting, northing), f64::NAN, f64::NAN, f64::NAN, f64::NAN);
            point.x_shift = x_shift;
            point.y_shift = y_shift;
            if fields.len() >= 5 {
                point.metric = parse(fields[4])? as f32;
            }
            Ok(point)
        }
    }
}
