// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Predictive surfacing of records relevant to a conversational context.
//!
//! Candidates come from three tiers, highest confidence first:
//!
//! 1. entities mentioned in the context (people, projects, tasks, quoted terms)
//! 2. semantic similarity to the whole context
//! 3. a look-back window named in the context ("yesterday", "last week", ...)
//!
//! A record id appears once, from the first tier that found it.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use strata_config::model::SurfacingConfig;
use strata_core::StrataError;
use strum::Display;
use tracing::debug;

use crate::graph::MemoryGraph;
use crate::patterns::{captures, compile_all};
use crate::store::MemoryStore;
use crate::temporal::TemporalCues;
use crate::types::{MemoryId, ResolvedMemory, SurfacedCandidate};

const PERSON_PATTERNS: &[&str] = &[
    r"(?:with|from|to|by)\s+([A-Z][a-z]+)(?:\s|,|$|\.)",
    r"\b([A-Z][a-z]+)\s+(?:said|wants|asks|asked|mentioned|prefers|did)",
    r"(?:@)([a-zA-Z0-9_]+)",
    r"\b([A-Z][a-z]+)\b(?:\s+(?:is|are|was|were|and))",
];

const PROJECT_PATTERNS: &[&str] = &[
    r#"(?:project|building|working on|developing)\s+["']?([A-Za-z\-_0-9]+)"#,
    r"(?:~|#)([a-z-]+)",
];

const TASK_PATTERNS: &[&str] = &[
    r"(?i)(?:need to|should|let's|can you)\s+([a-z][a-zA-Z\s]+?)(?:\?|\.)",
    r"(?i)(?:task|goal|objective):\s+([^\.]+)",
];

const QUOTED_PATTERN: &str = r#""([^"]+)""#;

/// Kind of entity found in a surfacing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Person,
    Project,
    Task,
    Quoted,
}

/// Entities found in a context, sorted and de-duplicated per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextEntities {
    pub people: BTreeSet<String>,
    pub projects: BTreeSet<String>,
    pub tasks: BTreeSet<String>,
    pub quoted: BTreeSet<String>,
}

impl ContextEntities {
    /// Every entity with its kind, people first.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &str)> {
        [
            (EntityKind::Person, &self.people),
            (EntityKind::Project, &self.projects),
            (EntityKind::Task, &self.tasks),
            (EntityKind::Quoted, &self.quoted),
        ]
        .into_iter()
        .flat_map(|(kind, set)| set.iter().map(move |e| (kind, e.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
            && self.projects.is_empty()
            && self.tasks.is_empty()
            && self.quoted.is_empty()
    }
}

/// Entity patterns, tier thresholds and confidences.
#[derive(Debug, Clone)]
pub struct SurfacingRules {
    pub people: Vec<Regex>,
    pub projects: Vec<Regex>,
    pub tasks: Vec<Regex>,
    pub quoted: Vec<Regex>,
    pub entity_results: usize,
    pub entity_min_relevance: f64,
    pub entity_confidence: f64,
    pub semantic_min_relevance: f64,
    pub semantic_confidence: f64,
    pub temporal_relevance: f64,
    pub temporal_confidence: f64,
    pub fingerprint_chars: usize,
}

impl Default for SurfacingRules {
    fn default() -> Self {
        Self {
            people: compile_all(PERSON_PATTERNS),
            projects: compile_all(PROJECT_PATTERNS),
            tasks: compile_all(TASK_PATTERNS),
            quoted: compile_all(&[QUOTED_PATTERN]),
            entity_results: 2,
            entity_min_relevance: 0.4,
            entity_confidence: 0.85,
            semantic_min_relevance: 0.55,
            semantic_confidence: 0.65,
            temporal_relevance: 0.5,
            temporal_confidence: 0.4,
            fingerprint_chars: 50,
        }
    }
}

impl SurfacingRules {
    pub fn extract_entities(&self, text: &str) -> ContextEntities {
        let collect = |patterns: &[Regex], min_len: usize| -> BTreeSet<String> {
            captures(patterns, text)
                .into_iter()
                .map(str::trim)
                .filter(|m| m.chars().count() > min_len)
                .map(str::to_string)
                .collect()
        };
        ContextEntities {
            people: collect(&self.people, 1),
            projects: collect(&self.projects, 1),
            tasks: collect(&self.tasks, 3),
            quoted: captures(&self.quoted, text)
                .into_iter()
                .filter(|q| q.chars().count() > 2)
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Flag every candidate whose lower-cased leading characters collide with another's.
pub fn flag_contradictions(candidates: &mut [SurfacedCandidate], fingerprint_chars: usize) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        let key: String = c.content.chars().take(fingerprint_chars).collect::<String>().to_lowercase();
        groups.entry(key).or_default().push(i);
    }
    for members in groups.values().filter(|m| m.len() > 1) {
        for &i in members {
            candidates[i].may_contradict = true;
        }
    }
}

/// Render candidates as a markdown block for prompt injection.
///
/// Returns an empty string when there is nothing to show.
pub fn format_surfaced(candidates: &[SurfacedCandidate], verbose: bool) -> String {
    if candidates.is_empty() {
        return String::new();
    }
    let mut lines = vec![
        "# Relevant Context (Predictively Surfaced)".to_string(),
        String::new(),
    ];
    for (i, c) in candidates.iter().enumerate() {
        lines.push(format!("{}. **[{}]** {}", i + 1, c.memory_type, c.content));
        lines.push(format!("   - Reason: {}", c.reason));
        if verbose {
            lines.push(format!("   - Confidence: {}%", (c.confidence * 100.0) as i64));
            if !c.tags.is_empty() {
                lines.push(format!("   - Tags: {}", c.tags.join(", ")));
            }
            if c.may_contradict {
                lines.push("   - Warning: may contradict other surfaced memories".to_string());
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

fn candidate(
    resolved: ResolvedMemory,
    confidence: f64,
    reason: String,
    tags: Vec<String>,
) -> SurfacedCandidate {
    SurfacedCandidate {
        record_id: resolved.record.id,
        content: resolved.record.content,
        memory_type: resolved.record.memory_type,
        relevance: resolved.relevance,
        confidence,
        reason,
        tags,
        may_contradict: false,
        supersedes: resolved.supersedes,
        extended_context: resolved.extended_context,
    }
}

/// Proposes records relevant to a context before they are asked for.
pub struct Surfacer {
    store: Arc<MemoryStore>,
    graph: Arc<MemoryGraph>,
    rules: SurfacingRules,
    cues: TemporalCues,
    config: SurfacingConfig,
}

impl Surfacer {
    pub fn new(store: Arc<MemoryStore>, graph: Arc<MemoryGraph>, config: SurfacingConfig) -> Self {
        Self {
            store,
            graph,
            rules: SurfacingRules::default(),
            cues: TemporalCues::default(),
            config,
        }
    }

    pub fn with_rules(mut self, rules: SurfacingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_cues(mut self, cues: TemporalCues) -> Self {
        self.cues = cues;
        self
    }

    pub fn rules(&self) -> &SurfacingRules {
        &self.rules
    }

    async fn resolved_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ResolvedMemory>, StrataError> {
        let hits = self.store.search(query, limit, 0.0).await?;
        self.graph.resolve_all(hits).await
    }

    /// Surface up to `limit` candidates at or above `min_confidence`.
    pub async fn surface(
        &self,
        context: &str,
        limit: usize,
        min_confidence: f64,
    ) -> Result<Vec<SurfacedCandidate>, StrataError> {
        self.surface_at(context, limit, min_confidence, Utc::now()).await
    }

    pub async fn surface_at(
        &self,
        context: &str,
        limit: usize,
        min_confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<SurfacedCandidate>, StrataError> {
        let mut surfaced: Vec<SurfacedCandidate> = Vec::new();
        let mut seen: HashSet<MemoryId> = HashSet::new();

        let entities = self.rules.extract_entities(context);
        debug!(?entities, "surfacing entities");
        for (kind, entity) in entities.iter() {
            if entity.chars().count() < 2 {
                continue;
            }
            for r in self.resolved_search(entity, self.rules.entity_results).await? {
                if r.relevance > self.rules.entity_min_relevance && seen.insert(r.record.id) {
                    surfaced.push(candidate(
                        r,
                        self.rules.entity_confidence,
                        format!("mentions {kind}: '{entity}'"),
                        vec![format!("entity:{kind}"), entity.to_string()],
                    ));
                }
            }
        }

        if surfaced.len() < limit {
            let want = limit - surfaced.len() + 2;
            for r in self.resolved_search(context, want).await? {
                if r.relevance > self.rules.semantic_min_relevance && seen.insert(r.record.id) {
                    surfaced.push(candidate(
                        r,
                        self.rules.semantic_confidence,
                        "semantically relevant to context".to_string(),
                        vec!["semantic".to_string()],
                    ));
                }
            }
        }

        if surfaced.len() < limit
            && let Some(cue) = self.cues.find(context)
        {
            let since = now.checked_sub_signed(cue.window).unwrap_or(now);
            for record in self.store.records_since(since, limit - surfaced.len()).await? {
                if seen.insert(record.id) {
                    surfaced.push(SurfacedCandidate {
                        record_id: record.id,
                        content: record.content,
                        memory_type: record.memory_type,
                        relevance: self.rules.temporal_relevance,
                        confidence: self.rules.temporal_confidence,
                        reason: format!("created {}", cue.description),
                        tags: vec![format!("temporal:{}", cue.description), "date-range".into()],
                        may_contradict: false,
                        supersedes: None,
                        extended_context: None,
                    });
                }
            }
        }

        flag_contradictions(&mut surfaced, self.rules.fingerprint_chars);

        surfaced.retain(|c| c.confidence >= min_confidence);
        surfaced.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        });
        surfaced.truncate(limit);
        Ok(surfaced)
    }

    /// Session cold-start: records about the active task, then recent decisions.
    pub async fn surface_for_startup(&self) -> Result<Vec<SurfacedCandidate>, StrataError> {
        let limit = self.config.startup_limit;
        let mut surfaced: Vec<SurfacedCandidate> = Vec::new();
        let mut seen: HashSet<MemoryId> = HashSet::new();

        let mut task = None;
        for key in ["current_task", "session_state"] {
            if let Some(value) = self.store.get_active(key).await?
                && !value.trim().is_empty()
            {
                task = Some(value);
                break;
            }
        }

        if let Some(task) = task {
            for r in self.resolved_search(&task, 3).await? {
                if seen.insert(r.record.id) {
                    surfaced.push(candidate(
                        r,
                        0.9,
                        "active task context".to_string(),
                        vec!["task".to_string(), "startup".to_string()],
                    ));
                }
            }
        }

        for record in self.store.recent_by_type("decision", 2).await? {
            if surfaced.len() >= limit {
                break;
            }
            if seen.insert(record.id) {
                surfaced.push(SurfacedCandidate {
                    record_id: record.id,
                    content: record.content,
                    memory_type: record.memory_type,
                    relevance: 0.7,
                    confidence: 0.75,
                    reason: "recent decision".to_string(),
                    tags: vec!["decision".to_string(), "startup".to_string()],
                    may_contradict: false,
                    supersedes: None,
                    extended_context: None,
                });
            }
        }

        surfaced.truncate(limit);
        Ok(surfaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::EmbeddingCapability;
    use crate::types::NewMemory;
    use strata_config::model::GraphConfig;
    use strata_storage::Database;

    async fn setup() -> (Arc<MemoryStore>, Surfacer) {
        let db = Database::open_in_memory().await.unwrap();
        let store = Arc::new(MemoryStore::new(db.clone(), EmbeddingCapability::none()));
        let graph = Arc::new(MemoryGraph::new(db, GraphConfig::default()));
        let surfacer = Surfacer::new(store.clone(), graph, SurfacingConfig::default());
        (store, surfacer)
    }

    fn sample(content: &str, relevance: f64, confidence: f64) -> SurfacedCandidate {
        SurfacedCandidate {
            record_id: MemoryId(1),
            content: content.to_string(),
            memory_type: "fact".into(),
            relevance,
            confidence,
            reason: "test".into(),
            tags: vec!["semantic".into()],
            may_contradict: false,
            supersedes: None,
            extended_context: None,
        }
    }

    #[test]
    fn built_in_patterns_all_compile() {
        let rules = SurfacingRules::default();
        assert_eq!(rules.people.len(), PERSON_PATTERNS.len());
        assert_eq!(rules.projects.len(), PROJECT_PATTERNS.len());
        assert_eq!(rules.tasks.len(), TASK_PATTERNS.len());
        assert_eq!(rules.quoted.len(), 1);
    }

    #[test]
    fn extracts_people() {
        let e = SurfacingRules::default().extract_entities("Bill mentioned the pricing plan with Stevie.");
        assert_eq!(
            e.people.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Bill", "Stevie"]
        );
        let e = SurfacingRules::default().extract_entities("ping @dev_ops about it");
        assert!(e.people.contains("dev_ops"));
    }

    #[test]
    fn extracts_projects_tasks_and_quotes() {
        let rules = SurfacingRules::default();
        let e = rules.extract_entities(
            "We are working on strata-core. We need to fix the flaky test. See \"release plan\" and #infra",
        );
        assert!(e.projects.contains("strata-core"));
        assert!(e.projects.contains("infra"));
        assert!(e.tasks.contains("fix the flaky test"));
        assert!(e.quoted.contains("release plan"));
    }

    #[test]
    fn short_matches_are_ignored() {
        let e = SurfacingRules::default().extract_entities("say \"ok\" and let's go.");
        assert!(e.quoted.is_empty());
        assert!(e.tasks.is_empty());
    }

    #[test]
    fn entity_iteration_order() {
        let e = SurfacingRules::default()
            .extract_entities("Alex said we should ship the beta. Also \"launch\"");
        let kinds: Vec<EntityKind> = e.iter().map(|(k, _)| k).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
    }

    #[test]
    fn prefix_collisions_flag_both() {
        let mut c = vec![
            sample(
                "The production database lives in the Frankfurt region, managed by Alex",
                0.8,
                0.85,
            ),
            sample(
                "THE PRODUCTION DATABASE LIVES IN THE FRANKFURT REGION, per the ops runbook",
                0.7,
                0.65,
            ),
            sample("Unrelated", 0.6, 0.65),
        ];
        flag_contradictions(&mut c, 50);
        assert!(c[0].may_contradict);
        assert!(c[1].may_contradict);
        assert!(!c[2].may_contradict);
    }

    #[test]
    fn format_plain_and_verbose() {
        assert_eq!(format_surfaced(&[], true), "");

        let mut c = sample("We use Postgres", 0.9, 0.85);
        c.may_contradict = true;
        let plain = format_surfaced(std::slice::from_ref(&c), false);
        assert_eq!(
            plain,
            "# Relevant Context (Predictively Surfaced)\n\n1. **[fact]** We use Postgres\n   - Reason: test\n"
        );

        let verbose = format_surfaced(&[c], true);
        assert!(verbose.contains("   - Confidence: 85%"));
        assert!(verbose.contains("   - Tags: semantic"));
        assert!(verbose.contains("may contradict"));
    }

    #[tokio::test]
    async fn entity_tier_surfaces_person_mentions() {
        let (store, surfacer) = setup().await;
        let id = store
            .add(NewMemory::new("Bill prefers annual billing"))
            .await
            .unwrap();
        store.add(NewMemory::new("Unrelated note")).await.unwrap();

        let found = surfacer
            .surface("Bill mentioned the pricing plan", 5, 0.3)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record_id, id);
        assert!((found[0].confidence - 0.85).abs() < f64::EPSILON);
        assert_eq!(found[0].tags, vec!["entity:person".to_string(), "Bill".to_string()]);
        assert_eq!(found[0].reason, "mentions person: 'Bill'");
    }

    #[tokio::test]
    async fn temporal_tier_uses_window() {
        let (store, surfacer) = setup().await;
        let id = store.add(NewMemory::new("shipped the beta")).await.unwrap();
        let found = surfacer
            .surface("what happened yesterday", 5, 0.3)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record_id, id);
        assert_eq!(found[0].reason, "created yesterday");
        assert!((found[0].confidence - 0.4).abs() < f64::EPSILON);

        // temporal confidence is below the threshold
        assert!(surfacer
            .surface("what happened yesterday", 5, 0.5)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn each_record_surfaces_once() {
        let (store, surfacer) = setup().await;
        store.add(NewMemory::new("Alex owns the deploy pipeline")).await.unwrap();
        let found = surfacer
            .surface("Alex said the deploy failed yesterday", 5, 0.0)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].tags[0].starts_with("entity:"));
    }

    #[tokio::test]
    async fn startup_prefers_task_then_decisions() {
        let (store, surfacer) = setup().await;
        let task_record = store
            .add(NewMemory::new("migration to postgres is half done"))
            .await
            .unwrap();
        let decision = store
            .add(NewMemory::new("use sqlx for queries").memory_type("decision"))
            .await
            .unwrap();
        store.set_active("current_task", "migration").await.unwrap();

        let found = surfacer.surface_for_startup().await.unwrap();
        let ids: Vec<MemoryId> = found.iter().map(|c| c.record_id).collect();
        assert_eq!(ids, vec![task_record, decision]);
        assert!((found[0].confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(found[1].reason, "recent decision");
    }

    #[tokio::test]
    async fn startup_falls_back_to_session_state() {
        let (store, surfacer) = setup().await;
        let id = store.add(NewMemory::new("refactor of the CLI")).await.unwrap();
        store.set_active("session_state", "refactor").await.unwrap();
        let found = surfacer.surface_for_startup().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record_id, id);
    }

    #[tokio::test]
    async fn startup_is_capped() {
        let (store, surfacer) = setup().await;
        for i in 0..6 {
            store
                .add(NewMemory::new(format!("deploy step {i}")))
                .await
                .unwrap();
        }
        store.set_active("current_task", "deploy").await.unwrap();
        let found = surfacer.surface_for_startup().await.unwrap();
        assert_eq!(found.len(), 3);
    }
}
