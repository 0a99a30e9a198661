// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `strata add`, `capture`, `recall`, `surface` and `startup`.

use std::fmt::Write;

use serde::Serialize;
use strata_core::StrataError;
use strata_memory::{format_surfaced, IngestOutcome, IngestRequest, MemoryEngine};

use crate::output::{heading, to_json, truncate};
use crate::OutputMode;

fn describe_outcome(out: &IngestOutcome) -> String {
    let mut line = format!(
        "stored #{} in {} (salience {:.2})",
        out.id, out.layer, out.salience
    );
    if let Some(at) = out.expires_at {
        let _ = write!(line, ", expires {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
    for edge in &out.edges {
        let _ = write!(
            line,
            "\n    {} #{} (confidence {:.2})",
            edge.relation, edge.target_id, edge.confidence
        );
    }
    line
}

pub async fn run_add(
    engine: &MemoryEngine,
    content: &str,
    memory_type: Option<String>,
    salience: Option<f64>,
    mode: OutputMode,
) -> Result<String, StrataError> {
    let mut request = IngestRequest::new(content);
    if let Some(t) = memory_type {
        request = request.memory_type(t);
    }
    if let Some(s) = salience {
        request = request.base_salience(s);
    }
    let outcome = engine.ingest(request).await?;
    if mode.json {
        return Ok(to_json(&outcome));
    }
    Ok(describe_outcome(&outcome))
}

pub async fn run_capture(
    engine: &MemoryEngine,
    text: &str,
    min_confidence: f64,
    mode: OutputMode,
) -> Result<String, StrataError> {
    let outcomes = engine.capture_text(text, min_confidence).await?;
    if mode.json {
        return Ok(to_json(&outcomes));
    }
    if outcomes.is_empty() {
        return Ok("nothing worth remembering found".to_string());
    }
    let noun = if outcomes.len() == 1 { "memory" } else { "memories" };
    let mut out = format!("captured {} {noun}", outcomes.len());
    for outcome in &outcomes {
        let _ = write!(out, "\n  {}", describe_outcome(outcome));
    }
    Ok(out)
}

pub async fn run_recall(
    engine: &MemoryEngine,
    query: &str,
    limit: usize,
    min_salience: f64,
    mode: OutputMode,
) -> Result<String, StrataError> {
    let results = engine.recall(query, limit, min_salience).await?;
    if mode.json {
        return Ok(to_json(&results));
    }
    if results.is_empty() {
        return Ok("no matching memories".to_string());
    }
    let mut out = heading(&format!("recall: {query}"), mode.color);
    for (i, r) in results.iter().enumerate() {
        let _ = write!(
            out,
            "\n  {}. [{}] #{} {} (relevance {:.2})",
            i + 1,
            r.record.memory_type,
            r.record.id,
            truncate(&r.record.content, 120),
            r.relevance
        );
        if let Some(old) = r.supersedes {
            let _ = write!(out, "\n     supersedes #{old}");
        }
        if let Some(ctx) = &r.extended_context {
            let _ = write!(out, "\n     also: {ctx}");
        }
    }
    Ok(out)
}

pub async fn run_surface(
    engine: &MemoryEngine,
    context: &str,
    limit: usize,
    min_confidence: f64,
    verbose: bool,
    mode: OutputMode,
) -> Result<String, StrataError> {
    let candidates = engine.surface(context, limit, min_confidence).await?;
    if mode.json {
        return Ok(to_json(&candidates));
    }
    if candidates.is_empty() {
        return Ok("nothing to surface".to_string());
    }
    Ok(format_surfaced(&candidates, verbose))
}

#[derive(Debug, Serialize)]
struct StartupOutput {
    context: String,
    surfaced: Vec<strata_memory::SurfacedCandidate>,
}

pub async fn run_startup(engine: &MemoryEngine, mode: OutputMode) -> Result<String, StrataError> {
    let context = engine.startup_context().await?;
    let surfaced = engine.startup().await?;
    if mode.json {
        return Ok(to_json(&StartupOutput { context, surfaced }));
    }
    let mut sections = Vec::new();
    if !context.is_empty() {
        sections.push(context);
    }
    if !surfaced.is_empty() {
        sections.push(format_surfaced(&surfaced, false));
    }
    Ok(sections.join("\n\n"))
}
