use crate::enums::Interpolation;
use crate::enums::Orientation;
use crate::interpolator::Interpolator;

use image::ImageBuffer;
use image::Luma;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;

/// An MRI volume in (depth, height, width) = (z, y, x) index order.
///
/// Axial slices are `data[z, .., ..]`. Voxel values are stored as `f32`
/// regardless of the on-disk pixel type so that DICOM and NIfTI sources
/// share one representation.
#[derive(Default)]
pub struct Volume {
    pub data: Array3<f32>,
    /// Voxel spacing in mm, (x, y, z).
    pub spacing: (f32, f32, f32),
    /// Row-major voxel-index to patient-space transform, when the source
    /// carried enough geometry to reconstruct one.
    pub affine: Option<[[f32; 4]; 4]>,
    pub interpolated_dim: (u32, u32, u32),
    intensity_range: (f32, f32),
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        let original_dim = data.dim();
        let intensity_range = Self::compute_intensity_range(&data);
        Self {
            data,
            spacing,
            affine: None,
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, original_dim),
            intensity_range,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Minimum and maximum voxel value, used as the display window.
    pub fn intensity_range(&self) -> (f32, f32) {
        self.intensity_range
    }

    fn compute_intensity_range(data: &Array3<f32>) -> (f32, f32) {
        data.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
            (min.min(v), max.max(v))
        })
    }

    #[inline]
    fn normalize_to_u8(&self, value: f32) -> u8 {
        let (min, max) = self.intensity_range;
        if max <= min {
            return 0;
        }
        (((value - min) / (max - min)) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// Borrow a 2D plane along one of the three medical axes.
    ///
    /// Returns `None` if `index` lies outside the volume.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data().slice(s![index, .., ..]),
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    fn get_output_dimensions(&self, orientation: &Orientation) -> (u32, u32) {
        // Always return (width, height) - standard image convention
        match orientation {
            Orientation::Axial => {
                // Looking down Z-axis: X is width, Y is height
                (self.interpolated_dim.2, self.interpolated_dim.1)
            }
            Orientation::Coronal => {
                // Looking down Y-axis: X is width, Z is height
                (self.interpolated_dim.2, self.interpolated_dim.0)
            }
            Orientation::Sagittal => {
                // Looking down X-axis: Y is width, Z is height
                (self.interpolated_dim.1, self.interpolated_dim.0)
            }
        }
    }

    fn slice_to_image(&self, slice: &ArrayView2<'_, f32>) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&v| self.normalize_to_u8(v))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    /// Extract a plane and render it as an 8-bit grayscale image, windowed
    /// over the volume's intensity range.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        interpolation: Interpolation,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.get_slice_from_axis(index, &orientation)?;

        match interpolation {
            Interpolation::None => self.slice_to_image(&slice),
            Interpolation::Bilinear => {
                // Axial doesn't need interpolation (already isotropic in-plane)
                if matches!(orientation, Orientation::Axial) {
                    return self.slice_to_image(&slice);
                }

                let (width, height) = self.get_output_dimensions(&orientation);
                self.interpolate_slice(&slice, width, height)
            }
        }
    }

    fn interpolate_slice(
        &self,
        slice: &ArrayView2<'_, f32>,
        width: u32,
        height: u32,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (slice_height, slice_width) = slice.dim();

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .map(|x| {
                        // Normalized coordinates with half-pixel offset
                        let norm_x = (x as f32 + 0.5) / width as f32;
                        let norm_y = (y as f32 + 0.5) / height as f32;

                        // Convert back to source coordinates
                        let src_x = norm_x * slice_width as f32 - 0.5;
                        let src_y = norm_y * slice_height as f32 - 0.5;

                        // Clamp to valid range
                        let src_x = src_x.max(0.0).min((slice_width - 1) as f32);
                        let src_y = src_y.max(0.0).min((slice_height - 1) as f32);

                        let value = Interpolator::bilinear_interpolate(slice, src_y, src_x);
                        self.normalize_to_u8(value)
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        ImageBuffer::from_raw(width, height, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn test_volume() -> Volume {
        // 2x3x4 ramp: value encodes the flat index
        let data = Array3::from_shape_fn((2, 3, 4), |(z, y, x)| (z * 12 + y * 4 + x) as f32);
        Volume::new(data, (1.0, 1.0, 2.0))
    }

    #[test]
    fn dim_reports_depth_height_width() {
        assert_eq!(test_volume().dim(), (2, 3, 4));
    }

    #[test]
    fn axial_slice_matches_stored_plane() {
        let volume = test_volume();
        let slice = volume
            .get_slice_from_axis(1, &Orientation::Axial)
            .expect("index inside volume");
        assert_eq!(slice.dim(), (3, 4));
        assert_eq!(slice[[0, 0]], 12.0);
        assert_eq!(slice[[2, 3]], 23.0);
    }

    #[test]
    fn coronal_slice_spans_depth_and_width() {
        let volume = test_volume();
        let slice = volume
            .get_slice_from_axis(2, &Orientation::Coronal)
            .expect("index inside volume");
        assert_eq!(slice.dim(), (2, 4));
        assert_eq!(slice[[0, 0]], 8.0);
        assert_eq!(slice[[1, 3]], 23.0);
    }

    #[test]
    fn sagittal_slice_spans_depth_and_height() {
        let volume = test_volume();
        let slice = volume
            .get_slice_from_axis(0, &Orientation::Sagittal)
            .expect("index inside volume");
        assert_eq!(slice.dim(), (2, 3));
        assert_eq!(slice[[0, 1]], 4.0);
        assert_eq!(slice[[1, 2]], 20.0);
    }

    #[test]
    fn out_of_bounds_index_returns_none() {
        let volume = test_volume();
        assert!(volume.get_slice_from_axis(2, &Orientation::Axial).is_none());
        assert!(volume.get_slice_from_axis(3, &Orientation::Coronal).is_none());
        assert!(volume.get_slice_from_axis(4, &Orientation::Sagittal).is_none());
        assert!(
            volume
                .get_image_from_axis(99, Orientation::Axial, Interpolation::None)
                .is_none()
        );
    }

    #[test]
    fn intensity_range_covers_min_and_max() {
        assert_eq!(test_volume().intensity_range(), (0.0, 23.0));
    }

    #[test]
    fn image_is_windowed_over_intensity_range() {
        let volume = test_volume();
        let image = volume
            .get_image_from_axis(0, Orientation::Axial, Interpolation::None)
            .expect("valid slice");
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
        // voxel 11 of range 0..=23 maps near half intensity
        let mid = image.get_pixel(3, 2).0[0];
        assert!((mid as i32 - 122).abs() <= 1, "got {mid}");
    }

    #[test]
    fn flat_volume_renders_black() {
        let volume = Volume::new(Array3::from_elem((2, 2, 2), 7.0), (1.0, 1.0, 1.0));
        let image = volume
            .get_image_from_axis(0, Orientation::Axial, Interpolation::None)
            .expect("valid slice");
        assert!(image.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn bilinear_coronal_image_uses_isotropic_dimensions() {
        // 2mm slice spacing over 1mm pixels doubles the depth axis
        let volume = test_volume();
        assert_eq!(volume.interpolated_dim, (4, 3, 4));
        let image = volume
            .get_image_from_axis(1, Orientation::Coronal, Interpolation::Bilinear)
            .expect("valid slice");
        assert_eq!(image.dimensions(), (4, 4));
    }

    #[test]
    fn bilinear_axial_image_keeps_native_dimensions() {
        let volume = test_volume();
        let image = volume
            .get_image_from_axis(0, Orientation::Axial, Interpolation::Bilinear)
            .expect("valid slice");
        assert_eq!(image.dimensions(), (4, 3));
    }
}
