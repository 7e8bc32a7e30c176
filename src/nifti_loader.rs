use crate::volume::Volume;

use flate2::read::GzDecoder;
use log::{debug, info};
use ndarray::{ArrayD, Axis, Ix3};
use nifti::error::NiftiError;
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject, ReaderOptions};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NiftiLoaderError {
    #[error("Expected a 3D or 4D volume, got {0} dimensions")]
    UnsupportedDimensionality(usize),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] NiftiError),
}

pub struct NiftiLoader;

impl NiftiLoader {
    /// Load a volume from a .nii or .nii.gz file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or holds fewer than three
    /// dimensions
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Volume, NiftiLoaderError> {
        let object = ReaderOptions::new().read_file(path.as_ref())?;
        Self::volume_from_object(object)
    }

    /// Load a volume from an in-memory NIfTI file; gzip compression is
    /// detected by magic number
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Volume, NiftiLoaderError> {
        let object = if Self::is_gzip(bytes) {
            InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))?
        } else {
            InMemNiftiObject::from_reader(Cursor::new(bytes))?
        };
        Self::volume_from_object(object)
    }

    fn is_gzip(bytes: &[u8]) -> bool {
        bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
    }

    fn volume_from_object(object: InMemNiftiObject) -> Result<Volume, NiftiLoaderError> {
        let header = object.header();
        let spacing = (header.pixdim[1], header.pixdim[2], header.pixdim[3]);
        let affine = Self::affine_from_header(header);

        // Intensity scaling (scl_slope/scl_inter) is applied by the library
        let array = object.into_volume().into_ndarray::<f32>()?;
        let data = Self::to_zyx_array(array)?;
        info!(
            "loaded NIfTI volume of {:?} at spacing {:?} mm",
            data.dim(),
            spacing
        );

        let mut volume = Volume::new(data, spacing);
        volume.affine = Some(affine);
        Ok(volume)
    }

    /// Reorder the library's (x, y, z[, t]) array into this crate's
    /// (z, y, x) convention, keeping only the first timepoint of 4D+ input.
    fn to_zyx_array(mut array: ArrayD<f32>) -> Result<ndarray::Array3<f32>, NiftiLoaderError> {
        let dimensionality = array.ndim();
        if dimensionality < 3 {
            return Err(NiftiLoaderError::UnsupportedDimensionality(dimensionality));
        }
        if dimensionality > 3 {
            debug!(
                "collapsing {}D volume to its first timepoint",
                dimensionality
            );
        }
        while array.ndim() > 3 {
            let last_axis = array.ndim() - 1;
            array = array.index_axis_move(Axis(last_axis), 0);
        }

        let array = array
            .into_dimensionality::<Ix3>()
            .map_err(|_| NiftiLoaderError::UnsupportedDimensionality(dimensionality))?;
        Ok(array.permuted_axes([2, 1, 0]).as_standard_layout().to_owned())
    }

    fn affine_from_header(header: &NiftiHeader) -> [[f32; 4]; 4] {
        if header.sform_code > 0 {
            [
                header.srow_x,
                header.srow_y,
                header.srow_z,
                [0.0, 0.0, 0.0, 1.0],
            ]
        } else {
            // No stored transform, fall back to voxel scaling
            [
                [header.pixdim[1], 0.0, 0.0, 0.0],
                [0.0, header.pixdim[2], 0.0, 0.0],
                [0.0, 0.0, header.pixdim[3], 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
        }
    }
}
