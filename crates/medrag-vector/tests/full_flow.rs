use medrag_core::aggregate::aggregate;
use medrag_core::chunker::{chunk_entity, ChunkingConfig, WordCodec};
use medrag_core::lookup::lookup;
use medrag_core::traits::{Embedder, VectorIndex};
use medrag_core::types::{CollectionSpec, EntityEntry};
use medrag_embed::FakeEmbedder;
use medrag_vector::LanceIndex;
use tempfile::TempDir;

const DIM: usize = 64;

fn open(tmp: &TempDir) -> LanceIndex {
    LanceIndex::open(tmp.path().to_string_lossy().as_ref()).expect("open")
}

#[test]
fn lancedb_chunked_flow() {
    let tmp = TempDir::new().expect("tmp");
    let index = open(&tmp);
    let spec = CollectionSpec::chunked("disease_kb_chunks", DIM);
    index.ensure_collection(&spec).expect("ensure");
    index.ensure_collection(&spec).expect("ensure is idempotent");

    let embedder = FakeEmbedder::new(DIM);
    let codec = WordCodec::new();
    let cfg = ChunkingConfig { max_tokens: 6, overlap_tokens: 2 };
    let docs = [
        ("D1", "Influenza", "fever cough chills body aches fatigue headache sore throat runny nose"),
        ("D2", "Eczema", "itchy dry skin red patches rash scaling cracked skin"),
    ];
    let mut total = 0;
    for (id, name, text) in docs {
        let chunks = chunk_entity(&codec, id, name, text, &cfg, 65535).expect("chunk");
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).expect("embed");
        total += index.insert_chunks(&spec.name, &chunks, &vectors).expect("insert");
    }
    assert_eq!(index.count(&spec.name).unwrap(), total);

    let query = embedder.embed_batch(&["itchy dry skin red patches".to_string()]).unwrap().remove(0);
    let hits = index.search_chunks(&spec.name, &query, 10).expect("search");
    assert!(!hits.is_empty() && hits.len() <= 10);
    assert!(hits.windows(2).all(|p| p[0].score >= p[1].score));
    assert_eq!(hits[0].entity_id, "D2");
    assert!(hits[0].score <= 1.0 + 1e-4);

    let ranked = aggregate(hits, 2, 5);
    assert_eq!(ranked[0].entity_name, "Eczema");
    index.close();
}

#[test]
fn lancedb_single_row_lookup() {
    let tmp = TempDir::new().expect("tmp");
    let index = open(&tmp);
    let spec = CollectionSpec::single_row("disease_treatments", DIM);
    index.ensure_collection(&spec).expect("ensure");

    let embedder = FakeEmbedder::new(DIM);
    let query = embedder.embed_batch(&["pneumonia".to_string()]).unwrap().remove(0);
    assert!(lookup(&index, &spec.name, &query, 1).expect("empty lookup").is_empty());

    let entries = vec![
        EntityEntry { entity_id: "D1".into(), entity_name: "Pneumonia".into(), payload: "Rest, Fluids, Antibiotics".into() },
        EntityEntry { entity_id: "D2".into(), entity_name: "Migraine".into(), payload: "Dark room".into() },
    ];
    let names: Vec<String> = entries.iter().map(|e| e.entity_name.clone()).collect();
    let vectors = embedder.embed_batch(&names).unwrap();
    assert_eq!(index.insert_entries(&spec.name, &entries, &vectors).unwrap(), 2);

    let matches = lookup(&index, &spec.name, &query, 1).expect("lookup");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].entity_id, "D1");
    assert_eq!(matches[0].payload, vec!["Rest", "Fluids", "Antibiotics"]);
}

#[test]
fn lancedb_rejects_layout_and_dimension_mismatch() {
    let tmp = TempDir::new().expect("tmp");
    let index = open(&tmp);
    index.ensure_collection(&CollectionSpec::chunked("kb", DIM)).unwrap();
    assert!(index.ensure_collection(&CollectionSpec::single_row("kb", DIM)).is_err());
    assert!(index.ensure_collection(&CollectionSpec::chunked("kb", DIM * 2)).is_err());
    assert!(index.search_chunks("missing", &vec![0.0; DIM], 3).is_err());

    let entry = EntityEntry { entity_id: "D1".into(), entity_name: "X".into(), payload: String::new() };
    index.ensure_collection(&CollectionSpec::single_row("t", DIM)).unwrap();
    assert!(index.insert_entries("t", &[entry], &[vec![1.0; DIM + 1]]).is_err());
}

#[test]
fn lancedb_reset_clears_rows_and_keeps_layout() {
    let tmp = TempDir::new().expect("tmp");
    let index = open(&tmp);
    let spec = CollectionSpec::single_row("t", DIM);
    index.reset_collection(&spec).expect("reset creates missing table");
    let entry = EntityEntry { entity_id: "D1".into(), entity_name: "Flu".into(), payload: "Rest".into() };
    let vector = FakeEmbedder::new(DIM).embed_batch(&["flu".to_string()]).unwrap();
    index.insert_entries("t", &[entry.clone()], &vector).unwrap();
    index.reset_collection(&spec).expect("reset");
    assert_eq!(index.count("t").unwrap(), 0);
    index.insert_entries("t", &[entry], &vector).unwrap();
    assert_eq!(index.count("t").unwrap(), 1);
    assert!(index.reset_collection(&CollectionSpec::chunked("t", DIM)).is_err());
}

#[test]
fn lancedb_ann_index_skips_small_tables_and_serves_search() {
    let tmp = TempDir::new().expect("tmp");
    let spec = CollectionSpec::single_row("t", DIM);
    let embedder = FakeEmbedder::new(DIM);
    let entries: Vec<EntityEntry> = (0..300)
        .map(|i| EntityEntry { entity_id: format!("D{i}"), entity_name: format!("disease{i} marker{}", i % 7), payload: format!("T{i}") })
        .collect();
    let names: Vec<String> = entries.iter().map(|e| e.entity_name.clone()).collect();
    let vectors = embedder.embed_batch(&names).unwrap();

    let small = open(&tmp).with_ann_min_rows(1_000);
    small.ensure_collection(&spec).unwrap();
    small.insert_entries("t", &entries, &vectors).unwrap();
    assert!(!small.build_ann_index("t").unwrap());
    small.close();

    let index = open(&tmp).with_ann_min_rows(256);
    assert!(index.build_ann_index("t").expect("build index"));
    let hits = index.search_entries("t", &vectors[42], 5).unwrap();
    assert!(!hits.is_empty() && hits.len() <= 5);
    assert!(hits.windows(2).all(|p| p[0].score >= p[1].score));
}
