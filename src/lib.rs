//! # MRI-volume library
//!
//! This crate serves a high-level API for loading MRI volumes from DICOM
//! series and from NIfTI files
//!
//! DICOM support is part of the dicom-rs ecosystem and leverages its
//! components, NIfTI support builds on the nifti crate. Volumes can either
//! be loaded from multiple [`FileDicomObject<InMemDicomObject>`], from a
//! specified folder where each ".dcm" file is read from, or from a single
//! ".nii"/".nii.gz" file. If the environment supports it the DICOM files
//! are loaded in parallel using rayon. The volume can be sliced in the
//! three different medical axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//!  Library consumers can chose whether the Coronal and Sagittal slices
//!  should be interpolated to preserve the aspect ratios between of the
//!  images. DICOM files are assumed to have the following attributes:
//!   - Axial data set (Only Coronal and Sagittal axes are interpolated)
//!   - No multiframe (always the first frame is used)
//!   - Images from the same series (Series Instance UID); mixed series are
//!     rejected at load time
//!
//!  NIfTI files are reordered from their native (x, y, z) layout into the
//!  crate's (z, y, x) convention; 4D files contribute their first
//!  timepoint. The voxel-to-patient affine is carried along where the
//!  source provides one (NIfTI sform, DICOM direction cosines).
//!
//!   Contributions are highly welcome!
//!
//! # Roadmap
//!
//!  - Trilinear interpolation
//!  - qform quaternion support for NIfTI files without an sform
//!  - Caching of images
//!
//! # Examples
//!
//! ## Reading multiple DICOM files into a volume
//!
//! To read all DICOM files from the dicom/ directory, sort them by
//! InstanceNumber. Then get the image at the center of the volume in the
//! Sagittal axis.
//!
//! ```no_run
//! # use mri_volume::{VolumeLoader, Orientation, Interpolation, SortBy};
//! # use std::path::PathBuf;
//! let volume = VolumeLoader::load_from_directory(&PathBuf::from("dicom"), SortBy::InstanceNumber)
//!     .expect("should have loaded files from directory");
//! let image = volume
//!     .get_image_from_axis(
//!         volume.dim().2 / 2,
//!         Orientation::Sagittal,
//!         Interpolation::Bilinear,
//!     )
//!     .expect("should have returned image at center of volume");
//! image.save("result.png");
//! ```
//!
//! ## Reading a NIfTI file into a volume
//!
//! ```no_run
//! # use mri_volume::{NiftiLoader, Orientation, Interpolation};
//! let volume = NiftiLoader::load_from_file("brain.nii.gz")
//!     .expect("should have loaded the NIfTI file");
//! let image = volume
//!     .get_image_from_axis(volume.dim().0 / 2, Orientation::Axial, Interpolation::None)
//!     .expect("should have returned image at center of volume");
//! image.save("axial.png");
//! ```
//!
//! [`FileDicomObject<InMemDicomObject>`]: https://docs.rs/dicom-object/latest/dicom_object/struct.FileDicomObject.html

pub mod enums;
mod interpolator;
pub mod meta;
pub mod nifti_loader;
pub mod volume;
pub mod volume_loader;

pub use enums::{Interpolation, Orientation, SortBy};
pub use meta::SeriesMeta;
pub use nifti_loader::{NiftiLoader, NiftiLoaderError};
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
