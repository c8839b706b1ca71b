use criterion::{Criterion, criterion_group, criterion_main};
use smartsearch::harvester::extractor::{extract_item_links, extract_product};
use std::fs::{self};
use std::hint::black_box;
use std::path::Path;
use url::Url;

pub fn criterion_benchmark(c: &mut Criterion) {
    let test_page_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("benches/testpage_product.html");
    let test_page = fs::read_to_string(test_page_path).expect("can read test file");
    let page_url = Url::parse("https://nowtechcenter.com/produit/hp-elitebook-840-g8/")
        .expect("valid url");

    c.bench_function("extract_product", |b| {
        b.iter(|| extract_product(black_box(&test_page)))
    });
    c.bench_function("extract_item_links", |b| {
        b.iter(|| extract_item_links(black_box(&test_page), &page_url))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
