use super::*;
use chrono::NaiveDate;
use image::{ImageBuffer, Rgb};
use tempfile::TempDir;

fn item(description: Option<&str>, images: &[&str]) -> Item {
    Item {
        id: 1,
        url: "https://shop.example/produit/tv/".to_string(),
        name: "TV 55 pouces".to_string(),
        price_before: None,
        price_after: None,
        discount: None,
        category: None,
        sub_category: None,
        description: description.map(str::to_string),
        images: images.iter().map(|s| (*s).to_string()).collect(),
        harvested_on: NaiveDate::from_ymd_opt(2025, 2, 2).expect("valid date"),
    }
}

fn write_png(path: &Path) {
    std::fs::create_dir_all(path.parent().expect("parent dir")).expect("create dir");
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 4, Rgb([200, 10, 10]));
    image.save(path).expect("write png");
}

#[test]
fn text_joins_name_and_description() {
    let input = text_input(&item(Some("4K UHD, Smart TV  "), &[]));
    assert_eq!(input, Extraction::Ready("TV 55 pouces\n4K UHD, Smart TV".to_string()));
}

#[test]
fn text_without_description_is_the_name() {
    let input = text_input(&item(None, &[]));
    assert_eq!(input, Extraction::Ready("TV 55 pouces".to_string()));
}

#[test]
fn item_without_images_is_skipped() {
    let temp_dir = TempDir::new().expect("temp dir");
    let resolver = ImageInputResolver::new(temp_dir.path(), temp_dir.path().join("dataset"));

    assert!(matches!(
        resolver.extract(&item(None, &[])),
        Extraction::Skipped(SkipReason::NoImages)
    ));
}

#[test]
fn missing_file_under_both_bases_is_skipped() {
    let temp_dir = TempDir::new().expect("temp dir");
    let resolver = ImageInputResolver::new(temp_dir.path(), temp_dir.path().join("dataset"));

    let extraction = resolver.extract(&item(None, &["dataset/ImagesTech/absent.png"]));
    assert!(matches!(
        extraction,
        Extraction::Skipped(SkipReason::MissingFile(path))
            if path == Path::new("dataset/ImagesTech/absent.png")
    ));
}

#[test]
fn root_relative_path_is_found() {
    let temp_dir = TempDir::new().expect("temp dir");
    let file = temp_dir.path().join("dataset/ImagesTech/tv.png");
    write_png(&file);

    let resolver = ImageInputResolver::new(temp_dir.path(), temp_dir.path().join("dataset"));
    match resolver.extract(&item(None, &["dataset/ImagesTech/tv.png"])) {
        Extraction::Ready(input) => {
            assert_eq!(input.path, file);
            assert_eq!((input.image.width(), input.image.height()), (4, 4));
        }
        Extraction::Skipped(reason) => panic!("expected a decoded image, got {:?}", reason),
    }
}

#[test]
fn legacy_dataset_relative_path_is_found() {
    let temp_dir = TempDir::new().expect("temp dir");
    let file = temp_dir.path().join("dataset/ImagesTech/old.png");
    write_png(&file);

    let resolver = ImageInputResolver::new(temp_dir.path(), temp_dir.path().join("dataset"));
    assert_eq!(resolver.resolve("ImagesTech/old.png"), Some(file));
}

#[test]
fn only_first_image_is_used() {
    let temp_dir = TempDir::new().expect("temp dir");
    write_png(&temp_dir.path().join("dataset/ImagesTech/second.png"));

    let resolver = ImageInputResolver::new(temp_dir.path(), temp_dir.path().join("dataset"));
    let extraction = resolver.extract(&item(
        None,
        &["dataset/ImagesTech/first.png", "dataset/ImagesTech/second.png"],
    ));
    assert!(matches!(
        extraction,
        Extraction::Skipped(SkipReason::MissingFile(_))
    ));
}

#[test]
fn undecodable_file_is_skipped() {
    let temp_dir = TempDir::new().expect("temp dir");
    let file = temp_dir.path().join("dataset/ImagesTech/broken.jpg");
    std::fs::create_dir_all(file.parent().expect("parent dir")).expect("create dir");
    std::fs::write(&file, b"<html>not an image</html>").expect("write file");

    let resolver = ImageInputResolver::new(temp_dir.path(), temp_dir.path().join("dataset"));
    let extraction = resolver.extract(&item(None, &["dataset/ImagesTech/broken.jpg"]));
    assert!(matches!(
        extraction,
        Extraction::Skipped(SkipReason::Unreadable(_))
    ));
}

#[test]
fn absolute_paths_are_used_as_is() {
    let resolver = ImageInputResolver::new("/srv/project", "/srv/project/dataset");
    assert_eq!(
        resolver.candidates("/data/images/a.png"),
        vec![PathBuf::from("/data/images/a.png")]
    );
    assert_eq!(
        resolver.candidates("dataset/ImagesTech/a.png"),
        vec![
            PathBuf::from("/srv/project/dataset/ImagesTech/a.png"),
            PathBuf::from("/srv/project/dataset/dataset/ImagesTech/a.png"),
        ]
    );
}
