//! CLI `query` command: run one query through the SIFT loop and print the
//! annotated evidence.

use anyhow::Result;
use std::time::Duration;

use ember::config::EmberConfig;
use ember::engine::MemoryEngine;
use ember::sift::TraceWarning;

pub struct QueryArgs {
    pub text: String,
    pub max_memories: Option<usize>,
    pub no_requery: bool,
    pub deadline_ms: Option<u64>,
    pub require_original: bool,
    pub json: bool,
}

pub async fn query(config: EmberConfig, args: QueryArgs) -> Result<()> {
    let engine = MemoryEngine::open(config)?;

    let mut options = engine.query_options();
    if let Some(n) = args.max_memories {
        options.max_memories = n;
    }
    if args.no_requery {
        options.enable_requery = false;
    }
    if let Some(ms) = args.deadline_ms {
        options.deadline = Some(Duration::from_millis(ms));
    }
    if args.require_original {
        options.require_original = true;
    }

    let response = engine.query(&args.text, &options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.passages.is_empty() {
        println!("No evidence found.");
    }
    for passage in &response.passages {
        println!("{}", passage.render());
    }

    if !response.conflicts.is_empty() {
        println!();
        println!("Conflicts:");
        for record in &response.conflicts {
            let status = match record.resolution_source_category {
                Some(category) if record.resolved => format!("resolved by {category}"),
                _ => "unresolved".to_string(),
            };
            println!("  {} ({status})", record.claim);
            for position in &record.positions {
                let stance = if position.stance.affirms { "affirms" } else { "denies" };
                let value = if position.stance.value.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", position.stance.value.join(" "))
                };
                println!(
                    "    {stance:<8} {}:{}{value}  {}",
                    position.source_category,
                    position.identifier,
                    ember::text::truncate(&position.passage, 60),
                );
            }
        }
    }

    for failure in &response.failures {
        eprintln!(
            "warning: round {} {} retrieval failed: {}",
            failure.round,
            failure
                .category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "(all)".into()),
            failure.reason
        );
    }
    for category in &response.skipped_categories {
        eprintln!("note: {category} source not configured, skipped");
    }
    for warning in &response.warnings {
        eprintln!("sourcing: {}", describe(warning));
    }

    println!();
    println!(
        "{} passages, {} conflicts ({} resolved), {} re-query rounds, {:?} in {} ms",
        response.passages.len(),
        response.conflicts.len(),
        response.conflicts_resolved,
        response.sift_iterations,
        response.termination,
        response.elapsed_ms,
    );
    Ok(())
}

fn describe(warning: &TraceWarning) -> String {
    match warning {
        TraceWarning::EmotionalTriggers { triggers } => {
            format!("query uses charged framing ({})", triggers.join(", "))
        }
        TraceWarning::NoPrimarySource { external } => {
            format!("none of {external} external passages is from a primary source")
        }
        TraceWarning::NoOriginalSource { best, tier } => {
            format!("no original source found; best is {best} ({tier})")
        }
        TraceWarning::OriginalRequired => "an original source was required and none was found".into(),
    }
}
