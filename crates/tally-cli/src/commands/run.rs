//! Script replay.
//!
//! A script is a TOML document with an ordered list of operations:
//!
//! ```toml
//! start = 100            # initial clock reading (default: now)
//! caller = "coordinator" # default caller (default: registry.coordinator)
//!
//! [[ops]]
//! op = "init"
//! quorum = 0
//!
//! [[ops]]
//! op = "register"
//! member = "A"
//! quorums = [0]
//! at = 105
//!
//! [[ops]]
//! op = "deregister"
//! member = "A"
//! quorums = [0]
//! at = 110
//! caller = "someone-else"
//! ```
//!
//! Operations without `at` run on the current clock reading. The first
//! failing operation aborts the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tally::{
    CallerId, CoordinatorOnly, ManualClock, MemberId, MemoryEventSink, QuorumId,
    QuorumIndexUpdate, Registry, RegistryConfig, Timestamp,
};
use tally_config::TallyConfig;
use tracing::info;

/// A parsed script.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub start: Option<u64>,
    pub caller: Option<String>,
    #[serde(default)]
    pub ops: Vec<Op>,
}

/// One registry operation.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    Init {
        quorum: u8,
        at: Option<u64>,
        caller: Option<String>,
    },
    Register {
        member: String,
        quorums: Vec<u8>,
        at: Option<u64>,
        caller: Option<String>,
    },
    Deregister {
        member: String,
        quorums: Vec<u8>,
        at: Option<u64>,
        caller: Option<String>,
    },
}

impl Op {
    fn at(&self) -> Option<u64> {
        match self {
            Op::Init { at, .. } | Op::Register { at, .. } | Op::Deregister { at, .. } => *at,
        }
    }

    fn caller(&self) -> Option<&str> {
        match self {
            Op::Init { caller, .. } | Op::Register { caller, .. } | Op::Deregister { caller, .. } => {
                caller.as_deref()
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Op::Init { quorum, .. } => format!("init {quorum}"),
            Op::Register {
                member, quorums, ..
            } => format!("register {member} {quorums:?}"),
            Op::Deregister {
                member, quorums, ..
            } => format!("deregister {member} {quorums:?}"),
        }
    }
}

/// Outcome of a successful replay.
#[derive(Debug, Serialize)]
pub struct Report {
    pub registry_id: String,
    pub ops_applied: usize,
    pub results: Vec<String>,
    pub quorums: BTreeMap<u8, Vec<String>>,
    pub events: Vec<QuorumIndexUpdate>,
    pub state_digest: String,
}

/// Replays the script at `path` and prints the report.
pub fn run(path: &Path, config: &TallyConfig, json: bool) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let script: Script = toml::from_str(&content)
        .with_context(|| format!("Failed to parse script {}", path.display()))?;

    let report = replay(&script, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(())
}

/// Runs `script` against a fresh registry built from `config`.
pub fn replay(script: &Script, config: &TallyConfig) -> Result<Report> {
    let start = script.start.unwrap_or_else(|| Timestamp::now().as_secs());
    let clock = ManualClock::at(start);
    let sink = MemoryEventSink::new();

    let mut registry_config = RegistryConfig::new().with_initial_quorums(
        config.registry.quorums.iter().copied().map(QuorumId::new),
    );
    if let Some(max) = config.registry.max_members_per_quorum {
        registry_config = registry_config.with_max_members_per_quorum(max);
    }

    let registry = Registry::open(
        clock.clone(),
        sink.clone(),
        CoordinatorOnly::new(config.registry.coordinator.as_str()),
        registry_config,
    )
    .context("Failed to open registry")?;

    let default_caller = script
        .caller
        .as_deref()
        .unwrap_or(config.registry.coordinator.as_str());

    let mut results = Vec::with_capacity(script.ops.len());
    for (n, op) in script.ops.iter().enumerate() {
        if let Some(at) = op.at() {
            clock.set(at);
        }
        let caller = CallerId::new(op.caller().unwrap_or(default_caller));

        let result = apply(&registry, &caller, op)
            .with_context(|| format!("operation {} ({}) failed", n + 1, op.describe()))?;
        info!(op = n + 1, result = %result, "applied");
        results.push(result);
    }

    let snapshot = registry.snapshot()?;
    let quorums = snapshot
        .quorums()
        .iter()
        .map(|(q, slots)| {
            let members = slots.members().iter().map(ToString::to_string).collect();
            (q.as_u8(), members)
        })
        .collect();

    Ok(Report {
        registry_id: registry.registry_id().to_string(),
        ops_applied: results.len(),
        results,
        quorums,
        events: sink.events(),
        state_digest: blake3::Hash::from(registry.state_hash()?).to_hex().to_string(),
    })
}

fn apply(
    registry: &Registry<ManualClock, MemoryEventSink>,
    caller: &CallerId,
    op: &Op,
) -> Result<String> {
    let result = match op {
        Op::Init { quorum, .. } => {
            registry.init_quorum(caller, QuorumId::new(*quorum))?;
            format!("init {quorum}: ok")
        }
        Op::Register {
            member, quorums, ..
        } => {
            let member_id = MemberId::new(member.as_str());
            let counts = registry.register_operator(caller, &member_id, &ids(quorums))?;
            format!("register {member}: counts {counts:?}")
        }
        Op::Deregister {
            member, quorums, ..
        } => {
            let member_id = MemberId::new(member.as_str());
            registry.deregister_operator(caller, &member_id, &ids(quorums))?;
            format!("deregister {member}: ok")
        }
    };
    Ok(result)
}

fn ids(quorums: &[u8]) -> Vec<QuorumId> {
    quorums.iter().copied().map(QuorumId::new).collect()
}

fn print_text(report: &Report) {
    println!("registry {}", report.registry_id);
    println!("applied {} operations", report.ops_applied);
    for result in &report.results {
        println!("  {result}");
    }

    for (quorum, members) in &report.quorums {
        println!("quorum {quorum} ({} members)", members.len());
        for (index, member) in members.iter().enumerate() {
            println!("  {index}: {member}");
        }
    }

    println!("events:");
    for event in &report.events {
        println!("  {event}");
    }

    println!("digest {}", report.state_digest);
}
