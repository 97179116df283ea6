use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use medrag_core::config::{Config, Pooling, Settings};
use medrag_core::kb::{load_diseases, load_treatments};
use medrag_core::types::RankedResult;
use medrag_embed::{get_default_provider, EmbeddingProvider};
use medrag_engine::{Ingestor, SymptomSearch, TreatmentOutcome, TreatmentSearch};
use medrag_vector::LanceIndex;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: medrag <command> [args...]

Commands:
  ingest-diseases <kb.jsonl>
  ingest-treatments <treatments.json>
  diseases \"<symptoms>\" [--json]
  treatments \"<disease>\" [--limit N] [--json]";

const SNIPPET_CHARS: usize = 200;
const CONTEXT_PREVIEW_CHARS: usize = 300;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Split `--json` and `--limit N` out of the positional arguments.
struct Flags { positional: Vec<String>, json: bool, limit: Option<usize> }

fn parse_flags(args: Vec<String>) -> anyhow::Result<Flags> {
    let mut flags = Flags { positional: Vec::new(), json: false, limit: None };
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--json" => flags.json = true,
            "--limit" => {
                let n = it.next().context("--limit needs a value")?;
                let limit: usize = n.parse().with_context(|| format!("invalid --limit '{n}'"))?;
                if limit == 0 { bail!("--limit must be greater than zero"); }
                flags.limit = Some(limit);
            }
            _ => flags.positional.push(arg),
        }
    }
    Ok(flags)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect::<String>().replace('\n', " ")
}

fn provider(config: &Config, settings: &Settings, model_dir: &str, pooling: Pooling, max_len: usize) -> anyhow::Result<EmbeddingProvider> {
    get_default_provider(&config.resolve(model_dir), pooling, max_len, settings.index.dim)
}

fn open_index(config: &Config, settings: &Settings) -> anyhow::Result<Arc<LanceIndex>> {
    let uri = config.resolve(&settings.index.uri);
    Ok(Arc::new(LanceIndex::open(&uri.to_string_lossy())?.with_ann_min_rows(settings.index.ann_min_rows)))
}

fn close_index(index: Arc<LanceIndex>) {
    if let Ok(index) = Arc::try_unwrap(index) { index.close(); }
}

fn print_diseases(query: &str, results: &[RankedResult]) {
    if results.is_empty() { println!("No diseases found for {query}."); return; }
    println!("\n=== Top disease candidates ===\n");
    for (i, item) in results.iter().enumerate() {
        println!("{}. {} ({}) agg_score={:.4}", i + 1, item.entity_name, item.entity_id, item.score);
        println!("   Top chunks:");
        for ev in &item.evidence {
            println!("     - score={:.4} idx={} snippet={}...", ev.score, ev.chunk_index, preview(&ev.text, SNIPPET_CHARS));
        }
        println!("   Combined context (first {CONTEXT_PREVIEW_CHARS} chars):");
        println!("{}...\n", preview(&item.context, CONTEXT_PREVIEW_CHARS));
    }
}

fn print_treatments(outcome: &TreatmentOutcome) {
    match outcome {
        TreatmentOutcome::NoMatch { .. } => println!("{outcome}"),
        TreatmentOutcome::Found(matches) => {
            println!("\n=== Top treatment candidates ===\n");
            for (i, item) in matches.iter().enumerate() {
                println!("{}. {} ({}) score={:.4}", i + 1, item.entity_name, item.entity_id, item.score);
                println!("   Treatments:");
                for t in &item.payload { println!("     - {t}"); }
                println!();
            }
        }
    }
}

fn first_arg(flags: &Flags, what: &str) -> anyhow::Result<String> {
    match flags.positional.first() {
        Some(v) => Ok(v.clone()),
        None => bail!("missing {what}\n\n{USAGE}"),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    let flags = parse_flags(args)?;
    tracing::debug!(command = %cmd, uri = %settings.index.uri, "starting");
    match cmd.as_str() {
        "ingest-diseases" => {
            let path = PathBuf::from(first_arg(&flags, "disease KB path")?);
            let records = load_diseases(&path)?;
            let s = &settings.symptoms;
            let p = provider(&config, &settings, &s.model_dir, s.pooling, s.max_len)?;
            let index = open_index(&config, &settings)?;
            let ingestor = Ingestor::new(p.embedder, p.codec, index.clone(), settings.chunking.clone());
            let written = ingestor.ingest_diseases(&settings.index.chunks_collection, &records)?;
            drop(ingestor);
            println!("✅ Ingested {} diseases as {} chunks into '{}'", records.len(), written, settings.index.chunks_collection);
            close_index(index);
        }
        "ingest-treatments" => {
            let path = PathBuf::from(first_arg(&flags, "treatments path")?);
            let records = load_treatments(&path)?;
            let t = &settings.treatments;
            let p = provider(&config, &settings, &t.model_dir, t.pooling, t.max_len)?;
            let index = open_index(&config, &settings)?;
            let ingestor = Ingestor::new(p.embedder, p.codec, index.clone(), settings.chunking.clone());
            let written = ingestor.ingest_treatments(&settings.index.treatments_collection, &records)?;
            drop(ingestor);
            println!("✅ Ingested {} treatment rows into '{}'", written, settings.index.treatments_collection);
            close_index(index);
        }
        "diseases" => {
            let query = first_arg(&flags, "symptom query")?;
            let s = &settings.symptoms;
            let p = provider(&config, &settings, &s.model_dir, s.pooling, s.max_len)?;
            let index = open_index(&config, &settings)?;
            let search = SymptomSearch::new(p.embedder, index.clone(), &settings.index.chunks_collection, s.clone())?;
            let results = search.search(&query)?;
            drop(search);
            if flags.json { println!("{}", serde_json::to_string_pretty(&results)?); } else { print_diseases(&query, &results); }
            close_index(index);
        }
        "treatments" => {
            let query = first_arg(&flags, "disease name")?;
            let t = &settings.treatments;
            let p = provider(&config, &settings, &t.model_dir, t.pooling, t.max_len)?;
            let index = open_index(&config, &settings)?;
            let search = TreatmentSearch::new(p.embedder, index.clone(), &settings.index.treatments_collection, flags.limit.unwrap_or(t.top_k))?;
            let outcome = search.lookup(&query)?;
            drop(search);
            if flags.json {
                let body = match &outcome {
                    TreatmentOutcome::Found(matches) => serde_json::json!({ "query": query, "matches": matches }),
                    TreatmentOutcome::NoMatch { .. } => serde_json::json!({ "query": query, "matches": [], "message": outcome.to_string() }),
                };
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_treatments(&outcome);
            }
            close_index(index);
        }
        "help" | "--help" | "-h" => println!("{USAGE}"),
        _ => { eprintln!("Unknown command: {}\n\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn flags_split_from_positionals() {
        let flags = parse_flags(args(&["Pneumonia", "--limit", "3", "--json"])).unwrap();
        assert_eq!(flags.positional, vec!["Pneumonia"]);
        assert_eq!(flags.limit, Some(3));
        assert!(flags.json);
    }

    #[test]
    fn zero_or_missing_limit_is_rejected() {
        assert!(parse_flags(args(&["Flu", "--limit", "0"])).is_err());
        assert!(parse_flags(args(&["Flu", "--limit"])).is_err());
        assert!(parse_flags(args(&["Flu", "--limit", "two"])).is_err());
    }
}
