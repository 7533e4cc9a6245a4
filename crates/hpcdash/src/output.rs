//! Text and JSON rendering for the section subcommands.

use hpcdash_modules::{ModuleFamily, by_category};
use hpcdash_parsers::CommandRunner;
use hpcdash_quota::QuotaRecord;
use hpcdash_slurm::{ClusterLoad, Partition, PartitionReference, PartitionSummary};
use hpcdash_state::{Dashboard, Section};
use hpcdash_store::StateStore;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value).into_diagnostic()?;
    json.push('\n');
    Ok(json)
}

pub fn render_modules(families: &[ModuleFamily], json: bool) -> Result<String> {
    if json {
        return to_json(families);
    }

    let mut out = String::new();
    for (category, members) in by_category(families) {
        let _ = writeln!(out, "{category}");
        for family in members {
            if family.description.is_empty() {
                let _ = writeln!(out, "  {}", family.name);
            } else {
                let _ = writeln!(out, "  {}  {}", family.name, family.description);
            }
            if !family.versions.is_empty() {
                let _ = writeln!(out, "      {}", family.versions.join(", "));
            }
        }
    }
    Ok(out)
}

#[derive(Serialize)]
struct PartitionReport<'a> {
    partitions: &'a [Partition],
    summary: &'a PartitionSummary,
    reference: &'a BTreeMap<String, Vec<PartitionReference>>,
    load: Option<&'a ClusterLoad>,
}

pub fn render_partitions(
    partitions: &[Partition],
    summary: &PartitionSummary,
    reference: &BTreeMap<String, Vec<PartitionReference>>,
    load: Option<&ClusterLoad>,
    json: bool,
) -> Result<String> {
    if json {
        return to_json(&PartitionReport {
            partitions,
            summary,
            reference,
            load,
        });
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<6} {:<20} {:>15} {:>7}  CATEGORY",
        "PARTITION", "AVAIL", "TIMELIMIT", "NODES(A/I/O/T)", "IDLE%"
    );
    for p in partitions {
        let name = if p.is_default {
            format!("{}*", p.name)
        } else {
            p.name.clone()
        };
        let nodes = format!("{}/{}/{}/{}", p.alloc, p.idle, p.other, p.total);
        let _ = writeln!(
            out,
            "{:<16} {:<6} {:<20} {:>15} {:>6.1}%  {}",
            name,
            p.avail,
            p.time_limit_display(),
            nodes,
            p.availability_pct,
            p.category
        );
    }
    let _ = writeln!(
        out,
        "\n{} partitions, {} nodes ({} idle, {} allocated)",
        summary.partitions, summary.total_nodes, summary.idle_nodes, summary.allocated_nodes
    );

    render_reference(&mut out, reference);

    match load {
        Some(load) => {
            let pct = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{v:.1}%"));
            let count = |v: Option<u64>| v.map_or("-".to_string(), |v| v.to_string());
            let _ = writeln!(
                out,
                "Cluster load: cores {} used, nodes {} used, jobs {} running / {} pending",
                pct(load.cores_pct),
                pct(load.nodes_pct),
                count(load.running_jobs),
                count(load.pending_jobs)
            );
        }
        None => {
            let _ = writeln!(out, "Cluster load: unavailable");
        }
    }
    Ok(out)
}

fn render_reference(out: &mut String, reference: &BTreeMap<String, Vec<PartitionReference>>) {
    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    for (category, entries) in reference {
        let _ = writeln!(out, "\n{category}");
        for entry in entries {
            let _ = writeln!(
                out,
                "  {:<16} {:>5} nodes  per researcher: {:<8} tier: {}",
                entry.name,
                entry.nodes,
                text(&entry.nodes_per_researcher),
                text(&entry.priority_tier)
            );
        }
    }
    if !reference.is_empty() {
        out.push('\n');
    }
}

pub fn render_quotas(quotas: &[QuotaRecord], json: bool) -> Result<String> {
    if json {
        return to_json(quotas);
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<28} {:>7} {:>7} {:>7} {:>5}  MOUNTED ON",
        "LABEL", "PATH", "SIZE", "USED", "AVAIL", "USE%"
    );
    for q in quotas {
        let use_percent = q.use_percent.map_or("-".to_string(), |p| format!("{p}%"));
        let _ = writeln!(
            out,
            "{:<10} {:<28} {:>7} {:>7} {:>7} {:>5}  {}",
            q.label, q.path, q.size, q.used, q.available, use_percent, q.mount_point
        );
    }
    Ok(out)
}

/// One line per section: when it was refreshed and whether it is stale.
pub fn render_status<R, S>(dashboard: &Dashboard<R, S>) -> String
where
    R: CommandRunner + 'static,
    S: StateStore,
{
    let mut out = String::new();
    for section in Section::ALL {
        let status = dashboard.section_status(section);
        let when = status
            .artifact_modified
            .map_or("never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        let state = match (&status.last_error, status.stale) {
            (Some(e), _) => format!("stale: {e}"),
            (None, true) => "stale".to_string(),
            (None, false) => "ok".to_string(),
        };
        let _ = writeln!(out, "{:<11} {:<24} {}", section.as_str(), when, state);
    }
    out
}
