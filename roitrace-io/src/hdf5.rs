//! HDF5 document persistence.
//!
//! Layout:
//!
//! ```text
//! /overlay                         binary mask, `threshold` attribute
//! /data                            optional 3-D dataset
//! /branches/<name>/data            N x 4 (x, y, z, radius)
//! /branches/<name>/outline         2N x 2
//! /branches/<name>/segments/<child>/{data, outline}
//! /circles/<name>                  [cx, cy, r]
//! /pixels/<name>                   N x 2 (x, y)
//! /polygons/<name>                 outline, 2N x 2
//! /segmentations/<name>/data       integer label image
//! /traces/<name>                   leaf traces
//! /traces/<name>/{trace, linescan, <child>} hierarchical masks
//! ```

use std::path::Path;

use hdf5::{Dataset, File, Group};
use hdf5::types::H5Type;
use ndarray::{Array2, Array3, ArrayView1, ArrayView2};

use roitrace_core::{
    Branch, BranchMask, CircleMask, Document, Mask, PixelMask, Point, PolygonMask, Sample,
    Segmentation, Traceable,
};

use crate::error::{Error, Result};

/// Selects which parts of a document are written.
#[derive(Clone, Copy, Debug)]
pub struct SaveOptions {
    /// Write the overlay dataset with its threshold attribute.
    pub overlay: bool,
    /// Write the full 3-D dataset.
    pub data: bool,
    /// Write the traces group.
    pub traces: bool,
    /// Apply the document overlay while extracting traces.
    pub apply_overlay: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overlay: true,
            data: false,
            traces: true,
            apply_overlay: true,
        }
    }
}

/// Writes a document to an HDF5 file.
///
/// # Errors
/// Returns HDF5 errors and propagates trace-extraction errors (e.g. a
/// mask whose weights vanish under the overlay).
pub fn save_document<P: AsRef<Path>>(
    path: P,
    document: &Document,
    options: &SaveOptions,
) -> Result<()> {
    let file = File::create(path)?;

    if options.overlay {
        let overlay = document.overlay().mapv(u8::from);
        let ds = file
            .new_dataset::<u8>()
            .shape(overlay.dim())
            .create("overlay")?;
        ds.write(overlay.view())?;
        ds.new_attr::<f64>()
            .create("threshold")?
            .write_scalar(&document.threshold())?;
    }

    if options.data {
        let data = document.data();
        let ds = file
            .new_dataset::<f64>()
            .shape(data.dim())
            .create("data")?;
        ds.write(data.view())?;
    }

    for mask in document.masks.iter() {
        write_mask(&file, mask)?;
    }

    if options.traces {
        write_traces(&file, document, options.apply_overlay)?;
    }

    Ok(())
}

/// Reads a document from an HDF5 file. The `data` dataset is required;
/// overlay, threshold and masks are restored when present.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] when the data dataset is missing and
/// propagates HDF5 and geometry errors.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    let file = File::open(path)?;

    if !file.link_exists("data") {
        return Err(Error::InvalidFormat(
            "data not stored in given HDF5 file".to_string(),
        ));
    }
    let data = read_array3(&file.dataset("data")?)?;
    let mut document = Document::new(data, None)?;

    if file.link_exists("overlay") {
        let ds = file.dataset("overlay")?;
        let threshold: f64 = ds.attr("threshold")?.read_scalar()?;
        document.set_threshold(threshold);
        let overlay = read_array2::<u8>(&ds)?;
        document.set_overlay(overlay.mapv(|v| v != 0))?;
    }

    for mask in read_masks(&file)? {
        document.masks.add(mask);
    }

    Ok(document)
}

/// Reads every persisted mask from an opened file.
///
/// # Errors
/// Propagates HDF5 and geometry errors.
pub fn read_masks(file: &File) -> Result<Vec<Mask>> {
    let mut masks: Vec<Mask> = Vec::new();

    if file.link_exists("circles") {
        let group = file.group("circles")?;
        for name in sorted_members(&group)? {
            let values = group.dataset(&name)?.read_raw::<f64>()?;
            if values.len() != 3 {
                return Err(Error::InvalidFormat(format!(
                    "circle {name:?} needs [cx, cy, r], got {} values",
                    values.len()
                )));
            }
            let mask =
                CircleMask::new(name, Point::new(values[0], values[1]), values[2])?;
            masks.push(mask.into());
        }
    }

    if file.link_exists("pixels") {
        let group = file.group("pixels")?;
        for name in sorted_members(&group)? {
            let table = read_array2::<i64>(&group.dataset(&name)?)?;
            let x = table.column(0).iter().map(|&v| v as usize).collect();
            let y = table.column(1).iter().map(|&v| v as usize).collect();
            masks.push(PixelMask::new(name, x, y)?.into());
        }
    }

    if file.link_exists("polygons") {
        let group = file.group("polygons")?;
        for name in sorted_members(&group)? {
            let outline = read_array2::<f64>(&group.dataset(&name)?)?;
            masks.push(PolygonMask::new(name, to_points(&outline))?.into());
        }
    }

    if file.link_exists("branches") {
        let group = file.group("branches")?;
        for name in sorted_members(&group)? {
            let branch_group = group.group(&name)?;
            let table = read_array2::<f64>(&branch_group.dataset("data")?)?;
            let mut mask = BranchMask::new(name, branch_from_table(&table)?)?;

            if branch_group.link_exists("segments") {
                let segments_group = branch_group.group("segments")?;
                let mut segments = Vec::new();
                for child in sorted_members(&segments_group)? {
                    let table =
                        read_array2::<f64>(&segments_group.group(&child)?.dataset("data")?)?;
                    segments.push(branch_from_table(&table)?);
                }
                if !segments.is_empty() {
                    mask.restore_segments(segments)?;
                }
            }
            masks.push(mask.into());
        }
    }

    if file.link_exists("segmentations") {
        let group = file.group("segmentations")?;
        for name in sorted_members(&group)? {
            let labels = read_array2::<i64>(&group.group(&name)?.dataset("data")?)?;
            masks.push(Segmentation::new(name, labels).into());
        }
    }

    Ok(masks)
}

fn write_mask(file: &File, mask: &Mask) -> Result<()> {
    match mask {
        Mask::Circle(circle) => {
            let group = ensure_group(file, "circles")?;
            let values = [circle.center().x, circle.center().y, circle.radius()];
            write_vec(&group, mask.name(), &values)
        }
        Mask::Pixels(pixels) => {
            let group = ensure_group(file, "pixels")?;
            let mut table = Array2::<i64>::zeros((pixels.len(), 2));
            for (i, (&x, &y)) in pixels.x().iter().zip(pixels.y().iter()).enumerate() {
                table[[i, 0]] = x as i64;
                table[[i, 1]] = y as i64;
            }
            write_array2_i64(&group, mask.name(), table.view())
        }
        Mask::Polygon(polygon) => {
            let group = ensure_group(file, "polygons")?;
            write_array2(&group, mask.name(), outline_table(polygon.outline()).view())
        }
        Mask::Branch(branch) => {
            let root = ensure_group(file, "branches")?;
            let group = root.create_group(mask.name())?;
            write_branch(&group, branch.branch())?;
            if !branch.segments().is_empty() {
                let segments_group = group.create_group("segments")?;
                for segment in branch.segments() {
                    let child = segments_group.create_group(segment.name())?;
                    write_branch(&child, segment.branch())?;
                }
            }
            Ok(())
        }
        Mask::Segmentation(segmentation) => {
            let root = ensure_group(file, "segmentations")?;
            let group = root.create_group(mask.name())?;
            write_array2_i64(&group, "data", segmentation.labels().view())
        }
    }
}

fn write_traces(file: &File, document: &Document, apply_overlay: bool) -> Result<()> {
    let traces = ensure_group(file, "traces")?;
    let data = document.data();
    let overlay = apply_overlay.then(|| document.overlay());

    for mask in document.masks.iter() {
        let trace = document.postprocess(mask.apply(data, overlay)?);
        let children = mask.children();
        if children.is_empty() {
            write_vec(&traces, mask.name(), trace.as_slice().unwrap_or(&[]))?;
        } else {
            let group = traces.create_group(mask.name())?;
            write_vec(&group, "trace", trace.as_slice().unwrap_or(&[]))?;
            for child in &children {
                let child_trace = document.postprocess(child.apply(data, overlay)?);
                write_vec(&group, child.name(), child_trace.as_slice().unwrap_or(&[]))?;
            }
            if let Mask::Branch(branch) = mask {
                if !branch.segments().is_empty() {
                    let linescan = branch.linescan(data, overlay)?;
                    write_array2(&group, "linescan", linescan.view())?;
                }
            }
        }
    }
    Ok(())
}

fn write_branch(group: &Group, branch: &Branch) -> Result<()> {
    let samples = branch.samples();
    let mut table = Array2::<f64>::zeros((samples.len(), 4));
    for (i, s) in samples.iter().enumerate() {
        table[[i, 0]] = s.x;
        table[[i, 1]] = s.y;
        table[[i, 2]] = s.z;
        table[[i, 3]] = s.radius;
    }
    write_array2(group, "data", table.view())?;
    write_array2(group, "outline", outline_table(&branch.outline()).view())
}

fn branch_from_table(table: &Array2<f64>) -> Result<Branch> {
    if table.ncols() != 4 {
        return Err(Error::InvalidFormat(format!(
            "branch data needs 4 columns (x, y, z, radius), got {}",
            table.ncols()
        )));
    }
    let samples = table
        .rows()
        .into_iter()
        .map(|row| Sample::new(row[0], row[1], row[2], row[3]))
        .collect();
    Ok(Branch::new(samples)?)
}

fn outline_table(outline: &[Point]) -> Array2<f64> {
    let mut table = Array2::<f64>::zeros((outline.len(), 2));
    for (i, p) in outline.iter().enumerate() {
        table[[i, 0]] = p.x;
        table[[i, 1]] = p.y;
    }
    table
}

fn to_points(table: &Array2<f64>) -> Vec<Point> {
    table
        .rows()
        .into_iter()
        .map(|row| Point::new(row[0], row[1]))
        .collect()
}

fn ensure_group(file: &File, name: &str) -> Result<Group> {
    if file.link_exists(name) {
        Ok(file.group(name)?)
    } else {
        Ok(file.create_group(name)?)
    }
}

/// Member names with numeric suffixes ordered naturally (`segment#2`
/// before `segment#10`).
fn sorted_members(group: &Group) -> Result<Vec<String>> {
    let mut names = group.member_names()?;
    names.sort_by_key(|n| (n.len(), n.clone()));
    Ok(names)
}

fn read_array2<T: H5Type>(dataset: &Dataset) -> Result<Array2<T>> {
    let shape = dataset.shape();
    if shape.len() != 2 {
        return Err(Error::InvalidFormat(format!(
            "dataset must be 2-D, got {} dimensions",
            shape.len()
        )));
    }
    let raw = dataset.read_raw::<T>()?;
    Array2::from_shape_vec((shape[0], shape[1]), raw)
        .map_err(|e| Error::InvalidFormat(format!("dataset shape mismatch: {e}")))
}

fn read_array3(dataset: &Dataset) -> Result<Array3<f64>> {
    let shape = dataset.shape();
    if shape.len() != 3 {
        return Err(Error::InvalidFormat(format!(
            "data must be 3-D (rows, cols, frames), got {} dimensions",
            shape.len()
        )));
    }
    let raw = dataset.read_raw::<f64>()?;
    Array3::from_shape_vec((shape[0], shape[1], shape[2]), raw)
        .map_err(|e| Error::InvalidFormat(format!("data shape mismatch: {e}")))
}

fn write_vec(group: &Group, name: &str, values: &[f64]) -> Result<()> {
    let ds = group
        .new_dataset::<f64>()
        .shape((values.len(),))
        .create(name)?;
    ds.write(ArrayView1::from(values))?;
    Ok(())
}

fn write_array2(group: &Group, name: &str, data: ArrayView2<f64>) -> Result<()> {
    let ds = group.new_dataset::<f64>().shape(data.dim()).create(name)?;
    ds.write(data)?;
    Ok(())
}

fn write_array2_i64(group: &Group, name: &str, data: ArrayView2<i64>) -> Result<()> {
    let ds = group.new_dataset::<i64>().shape(data.dim()).create(name)?;
    ds.write(data)?;
    Ok(())
}
