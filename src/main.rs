use std::env;
use std::path::PathBuf;

use mri_volume::{
    Interpolation, NiftiLoader, Orientation, SeriesMeta, SortBy, Volume, VolumeLoader,
};

const USAGE: &str = "usage: mri-volume <dicom-dir | volume.nii[.gz]> [axial|coronal|sagittal] [index] [output.png]";

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let input = PathBuf::from(args.next().expect(USAGE));
    let orientation = match args.next().as_deref() {
        None | Some("axial") => Orientation::Axial,
        Some("coronal") => Orientation::Coronal,
        Some("sagittal") => Orientation::Sagittal,
        Some(other) => panic!("unknown orientation '{other}', {USAGE}"),
    };
    let index = args.next().map(|arg| arg.parse().expect("index must be a number"));
    let output = args.next().unwrap_or_else(|| String::from("slice.png"));

    let volume = if input.is_dir() {
        print_series_meta(&input);
        VolumeLoader::load_from_directory(&input, SortBy::default())
            .expect("should have loaded files from directory")
    } else {
        NiftiLoader::load_from_file(&input).expect("should have loaded the NIfTI file")
    };

    let index = index.unwrap_or_else(|| center_index(&volume, orientation));
    let image = volume
        .get_image_from_axis(index, orientation, Interpolation::Bilinear)
        .expect("slice index should be inside the volume");
    image.save(&output).expect("should have saved the image");
    println!("saved {orientation:?} slice {index} to {output}");
}

fn center_index(volume: &Volume, orientation: Orientation) -> usize {
    let dim = volume.dim();
    match orientation {
        Orientation::Axial => dim.0 / 2,
        Orientation::Coronal => dim.1 / 2,
        Orientation::Sagittal => dim.2 / 2,
    }
}

fn print_series_meta(directory: &PathBuf) {
    let first_file = std::fs::read_dir(directory)
        .ok()
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
        });

    if let Some(path) = first_file
        && let Ok(dicom_object) = dicom::object::open_file(&path)
    {
        println!("{}", SeriesMeta::from_dicom_object(&dicom_object));
    }
}
