use std::fmt;

use dicom::object::{FileDicomObject, InMemDicomObject};
use dicom_dictionary_std::tags;

/// Clinical metadata of a DICOM series.
///
/// Every field is optional; a missing tag is simply absent.
#[derive(Debug, Default, Clone)]
pub struct SeriesMeta {
    pub modality: Option<String>,
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub study_description: Option<String>,
    pub series_description: Option<String>,
    pub series_instance_uid: Option<String>,
    pub acquisition_number: Option<i32>,
}

impl SeriesMeta {
    pub fn from_dicom_object(dicom_object: &FileDicomObject<InMemDicomObject>) -> Self {
        Self {
            modality: string_element(dicom_object, tags::MODALITY),
            patient_name: string_element(dicom_object, tags::PATIENT_NAME),
            patient_id: string_element(dicom_object, tags::PATIENT_ID),
            study_description: string_element(dicom_object, tags::STUDY_DESCRIPTION),
            series_description: string_element(dicom_object, tags::SERIES_DESCRIPTION),
            series_instance_uid: string_element(dicom_object, tags::SERIES_INSTANCE_UID),
            acquisition_number: dicom_object
                .element(tags::ACQUISITION_NUMBER)
                .ok()
                .and_then(|element| element.to_int::<i32>().ok()),
        }
    }
}

impl fmt::Display for SeriesMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown = "<unknown>";
        writeln!(f, "Modality:           {}", self.modality.as_deref().unwrap_or(unknown))?;
        writeln!(f, "Patient name:       {}", self.patient_name.as_deref().unwrap_or(unknown))?;
        writeln!(f, "Patient ID:         {}", self.patient_id.as_deref().unwrap_or(unknown))?;
        writeln!(
            f,
            "Study description:  {}",
            self.study_description.as_deref().unwrap_or(unknown)
        )?;
        writeln!(
            f,
            "Series description: {}",
            self.series_description.as_deref().unwrap_or(unknown)
        )?;
        write!(
            f,
            "Series UID:         {}",
            self.series_instance_uid.as_deref().unwrap_or(unknown)
        )
    }
}

fn string_element(
    dicom_object: &FileDicomObject<InMemDicomObject>,
    tag: dicom::core::Tag,
) -> Option<String> {
    dicom_object
        .element(tag)
        .ok()?
        .to_str()
        .ok()
        .map(|value| value.trim().to_owned())
}

/// Row and column direction cosines from ImageOrientationPatient.
pub fn direction_cosines(
    dicom_object: &FileDicomObject<InMemDicomObject>,
) -> Option<([f32; 3], [f32; 3])> {
    let values = dicom_object
        .element(tags::IMAGE_ORIENTATION_PATIENT)
        .ok()?
        .to_multi_float32()
        .ok()?;
    parse_direction_cosines(&values)
}

pub(crate) fn parse_direction_cosines(values: &[f32]) -> Option<([f32; 3], [f32; 3])> {
    if values.len() < 6 {
        return None;
    }
    let row = [values[0], values[1], values[2]];
    let col = [values[3], values[4], values[5]];
    Some((row, col))
}

pub fn image_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<[f32; 3]> {
    let values = dicom_object
        .element(tags::IMAGE_POSITION_PATIENT)
        .ok()?
        .to_multi_float32()
        .ok()?;
    if values.len() < 3 {
        return None;
    }
    Some([values[0], values[1], values[2]])
}

pub(crate) fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Assemble a voxel-index to patient-space affine from slice geometry.
///
/// The slice normal is the cross product of the direction cosines, so a
/// right-handed stacking order is assumed.
pub fn affine_from_geometry(
    row: [f32; 3],
    col: [f32; 3],
    position: [f32; 3],
    spacing: (f32, f32, f32),
) -> [[f32; 4]; 4] {
    let (dx, dy, dz) = spacing;
    let normal = cross(row, col);
    [
        [row[0] * dx, col[0] * dy, normal[0] * dz, position[0]],
        [row[1] * dx, col[1] * dy, normal[1] * dz, position[1]],
        [row[2] * dx, col[2] * dy, normal[2] * dz, position[2]],
        [0.0, 0.0, 0.0, 1.0],
    ]
}
