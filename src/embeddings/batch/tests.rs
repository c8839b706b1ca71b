use super::*;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;

/// Returns a one-hot vector at the input's position so every stored vector
/// identifies the item it was computed from
struct MarkerEmbedder {
    dimension: usize,
    calls: Vec<Vec<usize>>,
}

impl MarkerEmbedder {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: Vec::new(),
        }
    }
}

impl Embedder for MarkerEmbedder {
    type Input = usize;

    fn model_name(&self) -> &str {
        "marker"
    }

    fn embed_batch(&mut self, inputs: &[&usize]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.push(inputs.iter().map(|&&i| i).collect());
        Ok(inputs
            .iter()
            .map(|&&i| {
                let mut vector = vec![0.0; self.dimension];
                vector[i] = 1.0;
                vector
            })
            .collect())
    }
}

/// Drops the last vector of every batch
struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    type Input = usize;

    fn model_name(&self) -> &str {
        "short"
    }

    fn embed_batch(&mut self, inputs: &[&usize]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(vec![vec![1.0]; inputs.len().saturating_sub(1)])
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    type Input = usize;

    fn model_name(&self) -> &str {
        "failing"
    }

    fn embed_batch(&mut self, _inputs: &[&usize]) -> anyhow::Result<Vec<Vec<f32>>> {
        Err(anyhow!("model crashed"))
    }
}

/// Returns the same non-unit vector for every input
struct ConstantEmbedder(Vec<f32>);

impl Embedder for ConstantEmbedder {
    type Input = usize;

    fn model_name(&self) -> &str {
        "constant"
    }

    fn embed_batch(&mut self, inputs: &[&usize]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(vec![self.0.clone(); inputs.len()])
    }
}

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<(String, Vec<f32>, String)>>,
}

impl MemorySink {
    fn records(&self) -> Vec<(String, Vec<f32>, String)> {
        self.records.lock().expect("sink lock").clone()
    }
}

#[async_trait]
impl EmbeddingSink for MemorySink {
    async fn upsert(&self, item_url: &str, vector: Vec<f32>, model: &str) -> anyhow::Result<()> {
        self.records
            .lock()
            .expect("sink lock")
            .push((item_url.to_string(), vector, model.to_string()));
        Ok(())
    }
}

fn items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| Item {
            id: i as i64 + 1,
            url: format!("https://shop.example/produit/{i}/"),
            name: format!("{i}"),
            price_before: None,
            price_after: None,
            discount: None,
            category: None,
            sub_category: None,
            description: None,
            images: Vec::new(),
            harvested_on: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
        })
        .collect()
}

fn position(item: &Item) -> usize {
    item.name.parse().expect("numeric name")
}

#[tokio::test]
async fn surviving_inputs_keep_their_identifiers() {
    let items = items(7);
    let mut embedder = MarkerEmbedder::new(7);
    let sink = MemorySink::default();

    let report = run_batches(
        &items,
        3,
        |item| match position(item) {
            2 | 5 => Extraction::Skipped(SkipReason::MissingFile(PathBuf::from("gone.jpg"))),
            i => Extraction::Ready(i),
        },
        &mut embedder,
        &sink,
    )
    .await
    .expect("batches should run");

    assert_eq!(embedder.calls, vec![vec![0, 1], vec![3, 4], vec![6]]);
    assert_eq!(report.items_seen, 7);
    assert_eq!(report.batches_total, 3);
    assert_eq!(report.batches_skipped, 0);
    assert_eq!(report.inputs_skipped, 2);
    assert_eq!(report.skip_reasons.get("missing_file"), Some(&2));
    assert_eq!(report.vectors_written, 5);

    let records = sink.records();
    assert_eq!(records.len(), 5);
    for (url, vector, model) in records {
        let i: usize = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .expect("position in url");
        let hot: Vec<usize> = vector
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == 1.0)
            .map(|(j, _)| j)
            .collect();
        assert_eq!(hot, vec![i], "vector for {url} carries another item's marker");
        assert_eq!(model, "marker");
    }
}

#[tokio::test]
async fn fully_skipped_batch_is_not_embedded() {
    let items = items(4);
    let mut embedder = MarkerEmbedder::new(4);
    let sink = MemorySink::default();

    let report = run_batches(
        &items,
        2,
        |item| match position(item) {
            0 | 1 => Extraction::Skipped(SkipReason::NoImages),
            i => Extraction::Ready(i),
        },
        &mut embedder,
        &sink,
    )
    .await
    .expect("batches should run");

    assert_eq!(embedder.calls, vec![vec![2, 3]]);
    assert_eq!(report.batches_skipped, 1);
    assert_eq!(report.vectors_written, 2);
}

#[tokio::test]
async fn vectors_are_normalized_before_upsert() {
    let items = items(2);
    let mut embedder = ConstantEmbedder(vec![3.0, 4.0]);
    let sink = MemorySink::default();

    run_batches(&items, 8, |item| Extraction::Ready(position(item)), &mut embedder, &sink)
        .await
        .expect("batches should run");

    for (_, vector, _) in sink.records() {
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
    }
}

#[tokio::test]
async fn zero_vector_is_stored_unchanged() {
    let items = items(1);
    let mut embedder = ConstantEmbedder(vec![0.0, 0.0, 0.0]);
    let sink = MemorySink::default();

    run_batches(&items, 1, |item| Extraction::Ready(position(item)), &mut embedder, &sink)
        .await
        .expect("zero vectors are not an error");

    assert_eq!(sink.records()[0].1, vec![0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn vector_count_mismatch_aborts() {
    let items = items(3);
    let sink = MemorySink::default();

    let err = run_batches(
        &items,
        3,
        |item| Extraction::Ready(position(item)),
        &mut ShortEmbedder,
        &sink,
    )
    .await
    .expect_err("mismatch must fail");

    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn embedding_failure_aborts() {
    let items = items(2);
    let sink = MemorySink::default();

    let err = run_batches(
        &items,
        2,
        |item| Extraction::Ready(position(item)),
        &mut FailingEmbedder,
        &sink,
    )
    .await
    .expect_err("embed failure must fail");

    assert!(err.to_string().contains("model crashed"));
}

#[tokio::test]
async fn empty_item_list_is_a_no_op() {
    let mut embedder = MarkerEmbedder::new(1);
    let sink = MemorySink::default();

    let report = run_batches(&[], 16, |item| Extraction::Ready(position(item)), &mut embedder, &sink)
        .await
        .expect("empty run succeeds");

    assert_eq!(report, BatchReport::default());
    assert!(embedder.calls.is_empty());
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let items = items(1);
    let mut embedder = MarkerEmbedder::new(1);
    let sink = MemorySink::default();

    let err = run_batches(&items, 0, |item| Extraction::Ready(position(item)), &mut embedder, &sink)
        .await
        .expect_err("zero batch size");

    assert!(matches!(err, PipelineError::Config(_)));
}
