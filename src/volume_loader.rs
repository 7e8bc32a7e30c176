use crate::{enums::SortBy, meta, volume::Volume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use log::{debug, info, warn};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{collections::HashSet, fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Objects span {0} different series")]
    MixedSeries(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if the objects mix series, no valid images are found,
    /// dimensions are inconsistent or no spacing can be derived
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        Self::check_single_series(dicom_objects)?;

        let mut images_with_order: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_image_with_order(dicom_object, &sort_by))
            .collect();

        if images_with_order.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        if images_with_order.len() < dicom_objects.len() {
            warn!(
                "skipped {} of {} objects without decodable pixel data or sort key",
                dicom_objects.len() - images_with_order.len(),
                dicom_objects.len()
            );
        }

        Self::sort_images(&mut images_with_order, sort_by);

        let images: Vec<_> = images_with_order
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        Self::validate_dimensions(&images)?;

        let volume_array = Self::build_volume_array(&images);
        let spacing = Self::get_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        info!(
            "stacked {} slices of {}x{} at spacing {:?} mm",
            volume_array.dim().0,
            volume_array.dim().1,
            volume_array.dim().2,
            spacing
        );

        let mut volume = Volume::new(volume_array, spacing);
        volume.affine = Self::get_affine(dicom_objects, spacing);
        Ok(volume)
    }

    /// Load a volume from file paths; files are parsed in parallel
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> = paths
            .par_iter()
            .map(|path| open_file(path.as_ref()))
            .collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        debug!("found {} .dcm files in {}", paths.len(), path.as_ref().display());

        Self::load_from_file_paths(&paths, sort_by)
    }

    fn check_single_series(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
    ) -> Result<(), VolumeLoaderError> {
        let uids: HashSet<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| {
                dicom_object
                    .element(tags::SERIES_INSTANCE_UID)
                    .ok()?
                    .to_str()
                    .ok()
                    .map(|uid| uid.trim().to_owned())
            })
            .collect();

        if uids.len() > 1 {
            return Err(VolumeLoaderError::MixedSeries(uids.len()));
        }
        Ok(())
    }

    fn extract_image_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<(Option<f32>, Array2<f32>)> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image_2d = Self::decode_image(dicom_object)?;
        Some((order, image_2d))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::SliceLocation => {
                let location = dicom_object
                    .element(tags::SLICE_LOCATION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(location)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        // Always the first frame and sample
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(images_with_order: &mut [(Option<f32>, Array2<f32>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            images_with_order.reverse();
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<f32>]) -> Array3<f32> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }

    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f32, f32, f32)> {
        let (pixel_spacing, slice_thickness) = dicom_objects.iter().find_map(|dicom_object| {
            let values = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;
            let pixel_spacing = [*values.first()?, *values.get(1)?];

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()
                .and_then(|element| element.to_float32().ok());

            Some((pixel_spacing, slice_thickness))
        })?;

        // Prefer the actual gap between slice positions over the nominal
        // thickness, which overlapping or gapped acquisitions misstate
        let mut positions: Vec<f32> = dicom_objects
            .iter()
            .filter_map(|dicom_object| meta::image_position(dicom_object).map(|pos| pos[2]))
            .collect();
        positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let z_spacing = match Self::slice_spacing_from_positions(&positions) {
            Some(gap) => gap,
            None => {
                debug!("no usable slice positions, falling back to SliceThickness");
                slice_thickness?
            }
        };

        Some((pixel_spacing[0], pixel_spacing[1], z_spacing))
    }

    fn slice_spacing_from_positions(sorted_positions: &[f32]) -> Option<f32> {
        if sorted_positions.len() < 2 {
            return None;
        }
        let mut gaps: Vec<f32> = sorted_positions
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).abs())
            .collect();
        gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = gaps[gaps.len() / 2];
        (median > 0.0).then_some(median)
    }

    fn get_affine(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        spacing: (f32, f32, f32),
    ) -> Option<[[f32; 4]; 4]> {
        dicom_objects.iter().find_map(|dicom_object| {
            let (row, col) = meta::direction_cosines(dicom_object)?;
            let position = meta::image_position(dicom_object)?;
            Some(meta::affine_from_geometry(row, col, position, spacing))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn slice(fill: f32) -> Array2<f32> {
        Array2::from_elem((2, 2), fill)
    }

    #[test]
    fn sort_by_instance_number_orders_ascending() {
        let mut images = vec![
            (Some(3.0), slice(3.0)),
            (Some(1.0), slice(1.0)),
            (Some(2.0), slice(2.0)),
        ];
        VolumeLoader::sort_images(&mut images, SortBy::InstanceNumber);
        let order: Vec<f32> = images.iter().map(|(key, _)| key.unwrap()).collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sort_by_position_orders_descending() {
        let mut images = vec![
            (Some(-12.5), slice(0.0)),
            (Some(7.5), slice(1.0)),
            (Some(-2.5), slice(2.0)),
        ];
        VolumeLoader::sort_images(&mut images, SortBy::ImagePositionPatient);
        let order: Vec<f32> = images.iter().map(|(key, _)| key.unwrap()).collect();
        assert_eq!(order, vec![7.5, -2.5, -12.5]);
    }

    #[test]
    fn sort_none_keeps_file_order() {
        let mut images = vec![
            (Some(0.0), slice(9.0)),
            (Some(0.0), slice(4.0)),
            (Some(0.0), slice(7.0)),
        ];
        VolumeLoader::sort_images(&mut images, SortBy::None);
        let values: Vec<f32> = images.iter().map(|(_, img)| img[[0, 0]]).collect();
        assert_eq!(values, vec![9.0, 4.0, 7.0]);
    }

    #[test]
    fn missing_keys_sort_before_present_keys() {
        let mut images = vec![(Some(1.0), slice(1.0)), (None, slice(0.0))];
        VolumeLoader::sort_images(&mut images, SortBy::InstanceNumber);
        assert!(images[0].0.is_none());
    }

    #[test]
    fn build_volume_stacks_in_slice_order() {
        let images = vec![
            array![[0.0f32, 1.0], [2.0, 3.0]],
            array![[4.0f32, 5.0], [6.0, 7.0]],
        ];
        let volume = VolumeLoader::build_volume_array(&images);
        assert_eq!(volume.dim(), (2, 2, 2));
        assert_eq!(volume[[0, 0, 1]], 1.0);
        assert_eq!(volume[[1, 1, 0]], 6.0);
    }

    #[test]
    fn validate_rejects_mismatched_slices() {
        let images = vec![
            Array2::<f32>::zeros((2, 2)),
            Array2::<f32>::zeros((2, 3)),
        ];
        assert!(matches!(
            VolumeLoader::validate_dimensions(&images),
            Err(VolumeLoaderError::InconsistentDimensions)
        ));
    }

    #[test]
    fn validate_accepts_uniform_slices() {
        let images = vec![slice(0.0), slice(1.0), slice(2.0)];
        assert!(VolumeLoader::validate_dimensions(&images).is_ok());
    }

    #[test]
    fn slice_spacing_uses_median_gap() {
        let positions = [0.0, 2.0, 4.0, 6.0];
        assert_eq!(
            VolumeLoader::slice_spacing_from_positions(&positions),
            Some(2.0)
        );
    }

    #[test]
    fn slice_spacing_ignores_a_single_outlier_gap() {
        // one missing slice should not change the derived spacing
        let positions = [0.0, 2.0, 4.0, 8.0, 10.0];
        assert_eq!(
            VolumeLoader::slice_spacing_from_positions(&positions),
            Some(2.0)
        );
    }

    #[test]
    fn slice_spacing_needs_two_distinct_positions() {
        assert_eq!(VolumeLoader::slice_spacing_from_positions(&[1.0]), None);
        assert_eq!(
            VolumeLoader::slice_spacing_from_positions(&[3.0, 3.0, 3.0]),
            None
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = VolumeLoader::load_from_directory(dir.path(), SortBy::default());
        assert!(matches!(result, Err(VolumeLoaderError::NoValidImages)));
    }

    #[test]
    fn empty_object_list_is_an_error() {
        let result = VolumeLoader::load_from_dicom_objects(&[], SortBy::default());
        assert!(matches!(result, Err(VolumeLoaderError::NoValidImages)));
    }
}
