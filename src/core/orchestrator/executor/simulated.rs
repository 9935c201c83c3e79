//! Default step implementations. Test tools are simulated with a seedable RNG;
//! the clone step can optionally resolve the branch head with `git ls-remote`.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tokio::process::Command;
use tracing::info;

use super::report::{aggregate_report, ledger_entry, voice_summary};
use super::{StepInput, StepOutput, StepRunner};
use crate::core::orchestrator::{StepKind, WorkflowContext};

const SEVERITIES: [&str; 4] = ["low", "medium", "high", "critical"];
const BUG_SEVERITIES: [&str; 3] = ["low", "medium", "high"];

#[derive(Debug, Clone, Default)]
pub struct SimulatedSteps {
    git_probe: bool,
    seed: Option<u64>,
}

impl SimulatedSteps {
    pub fn new(git_probe: bool, seed: Option<u64>) -> Self {
        Self { git_probe, seed }
    }

    fn rng_for(&self, step: StepKind) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(step as u64)),
            None => StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl StepRunner for SimulatedSteps {
    async fn run(&self, input: &StepInput) -> Result<StepOutput> {
        let mut rng = self.rng_for(input.step);
        let ctx = &input.context;
        match input.step {
            StepKind::RepoClone => clone_step(ctx, self.git_probe, &mut rng).await,
            StepKind::Fuzz => Ok(fuzz_step(&mut rng)),
            StepKind::UnitTest => Ok(unit_test_step(&mut rng)),
            StepKind::IntegrationTest => Ok(integration_step(&mut rng)),
            StepKind::BugAnalysis => Ok(bug_analysis_step(ctx, &mut rng)),
            StepKind::SecurityScan => Ok(security_step(&mut rng)),
            StepKind::Aggregate => Ok(aggregate_report(ctx)),
            StepKind::LedgerLog => Ok(ledger_entry(ctx)),
            StepKind::VoiceSummary => Ok(voice_summary(ctx)),
        }
    }
}

async fn clone_step(ctx: &WorkflowContext, git_probe: bool, rng: &mut StdRng) -> Result<StepOutput> {
    let repo = &ctx.repository;
    let parsed = url::Url::parse(&repo.github_url)
        .map_err(|e| anyhow!("invalid repository url '{}': {}", repo.github_url, e))?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    let (owner, name) = match segments.as_slice() {
        [owner, name, ..] => (owner.to_string(), name.trim_end_matches(".git").to_string()),
        _ => bail!("repository url '{}' has no owner/name path", repo.github_url),
    };

    let clone_url = repo.effective_clone_url();
    check_remote_arg("clone url", &clone_url)?;
    check_remote_arg("branch", &repo.branch)?;
    let (commit, probe) = if git_probe {
        (ls_remote_head(&clone_url, &repo.branch).await?, "git")
    } else {
        let bytes: Vec<u8> = (0..20).map(|_| rng.gen_range(0..=255u8)).collect();
        (hex::encode(bytes), "simulated")
    };
    let files_analyzed = rng.gen_range(20..=400u64);

    Ok(StepOutput::new(json!({
        "owner": owner,
        "repository": name,
        "host": parsed.host_str().unwrap_or_default(),
        "clone_url": clone_url,
        "branch": repo.branch,
        "commit": commit,
        "files_analyzed": files_analyzed,
        "probe": probe,
    }))
    .line(format!("resolved {}/{}@{} -> {}", owner, name, repo.branch, commit))
    .line(format!("{} files queued for analysis", files_analyzed)))
}

/// Remote and ref names are handed to git as positional arguments and must not
/// be readable as options.
fn check_remote_arg(what: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{} is empty", what);
    }
    if trimmed.starts_with('-') {
        bail!("{} '{}' must not start with '-'", what, value);
    }
    Ok(())
}

async fn ls_remote_head(clone_url: &str, branch: &str) -> Result<String> {
    info!("Probing {} ({}) with git ls-remote", clone_url, branch);
    let output = Command::new("git")
        .args(["ls-remote", "--", clone_url, branch])
        .kill_on_drop(true)
        .output()
        .await?;
    if !output.status.success() {
        bail!(
            "git ls-remote failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("branch '{}' not found on remote", branch))
}

fn fuzz_step(rng: &mut StdRng) -> StepOutput {
    let total_inputs = rng.gen_range(1_000..=50_000u64);
    let crashes = rng.gen_range(0..=3u64);
    let hangs = rng.gen_range(0..=2u64);
    let coverage = rng.gen_range(40.0..95.0f64);
    StepOutput::new(json!({
        "total_inputs": total_inputs,
        "crashes": crashes,
        "hangs": hangs,
        "unique_paths": rng.gen_range(50..=2_000u64),
        "coverage_percent": (coverage * 10.0).round() / 10.0,
    }))
    .line(format!("{} inputs, {} crashes, {} hangs", total_inputs, crashes, hangs))
}

fn unit_test_step(rng: &mut StdRng) -> StepOutput {
    let total = rng.gen_range(20..=200u64);
    let failed = rng.gen_range(0..=total / 10);
    let skipped = rng.gen_range(0..=5u64).min(total - failed);
    let passed = total - failed - skipped;
    let coverage = rng.gen_range(50.0..98.0f64);
    StepOutput::new(json!({
        "total": total,
        "passed": passed,
        "failed": failed,
        "skipped": skipped,
        "coverage_percent": (coverage * 10.0).round() / 10.0,
    }))
    .line(format!("{} passed, {} failed, {} skipped", passed, failed, skipped))
}

fn integration_step(rng: &mut StdRng) -> StepOutput {
    let total = rng.gen_range(5..=40u64);
    let failed = rng.gen_range(0..=3u64).min(total);
    StepOutput::new(json!({
        "total": total,
        "passed": total - failed,
        "failed": failed,
        "endpoints_tested": rng.gen_range(1..=total),
    }))
    .line(format!("{} of {} integration tests passed", total - failed, total))
}

/// One finding per upstream failure signal, capped at ten.
fn bug_analysis_step(ctx: &WorkflowContext, rng: &mut StdRng) -> StepOutput {
    let sources = [
        ("unit-test", ctx.metric(StepKind::UnitTest, "failed")),
        ("integration-test", ctx.metric(StepKind::IntegrationTest, "failed")),
        ("fuzz", ctx.metric(StepKind::Fuzz, "crashes")),
    ];
    let mut bugs = Vec::new();
    for (source, count) in sources {
        for _ in 0..count {
            if bugs.len() >= 10 {
                break;
            }
            let severity = BUG_SEVERITIES[rng.gen_range(0..BUG_SEVERITIES.len())];
            bugs.push(json!({
                "id": format!("BUG-{:03}", bugs.len() + 1),
                "severity": severity,
                "source": source,
                "description": format!("{} severity defect traced from {} failure", severity, source),
            }));
        }
    }
    let high = bugs.iter().filter(|b| b["severity"] == "high").count();
    StepOutput::new(json!({
        "total_bugs": bugs.len(),
        "high_severity_count": high,
        "bugs": bugs,
        "model": "simulated",
    }))
    .line(format!("{} findings, {} high severity", bugs.len(), high))
}

fn security_step(rng: &mut StdRng) -> StepOutput {
    let total = rng.gen_range(0..=4usize);
    let mut counts = [0u64; 4];
    let mut findings = Vec::new();
    for i in 0..total {
        let idx = rng.gen_range(0..SEVERITIES.len());
        counts[idx] += 1;
        findings.push(json!({
            "id": format!("VULN-{:03}", i + 1),
            "severity": SEVERITIES[idx],
        }));
    }
    StepOutput::new(json!({
        "total": total,
        "low": counts[0],
        "medium": counts[1],
        "high": counts[2],
        "critical": counts[3],
        "vulnerabilities": findings,
    }))
    .line(format!("{} vulnerabilities found", total))
}
