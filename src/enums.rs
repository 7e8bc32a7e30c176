#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Default)]
pub enum Interpolation {
    /// Resample off-axis planes to isotropic output dimensions.
    Bilinear,
    // TODO:
    // Trilinear,
    #[default]
    None,
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    SliceLocation,
    InstanceNumber,
    None,
}
