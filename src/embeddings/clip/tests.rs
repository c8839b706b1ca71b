use super::*;

#[test]
fn known_model_names() {
    assert!(matches!(
        parse_model_name("clip-vit-b32"),
        Ok(ImageEmbeddingModel::ClipVitB32)
    ));
    assert!(matches!(
        parse_model_name("CLIP-ViT-B32"),
        Ok(ImageEmbeddingModel::ClipVitB32)
    ));
    assert!(matches!(
        parse_model_name("resnet50"),
        Ok(ImageEmbeddingModel::Resnet50)
    ));
}

#[test]
fn unknown_model_name_is_rejected() {
    let err = parse_model_name("vgg16").expect_err("unsupported model");
    assert!(err.to_string().contains("vgg16"));
}

#[test]
#[ignore = "requires model download"]
fn embeds_one_vector_per_image() {
    use image::{ImageBuffer, Rgb};

    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let image_path = temp_dir.path().join("red.png");
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(32, 32, Rgb([255, 0, 0]));
    image.save(&image_path).expect("write png");

    let input = ImageInput {
        image: image::open(&image_path).expect("decode png"),
        path: image_path,
    };

    let mut embedder =
        ClipImageEmbedder::new("clip-vit-b32", &temp_dir.path().join("models")).expect("model");
    let vectors = embedder
        .embed_batch(&[&input, &input])
        .expect("embedding succeeds");

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0].len(), 512);
}
