//! The reporting tail of the workflow: aggregate score, ledger entry and the
//! spoken summary. All three are pure functions of the workflow context.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::StepOutput;
use crate::core::orchestrator::{StepKind, WorkflowContext};

pub const FAILED_TEST_PENALTY: u64 = 2;
pub const VULNERABILITY_PENALTY: u64 = 5;
pub const HIGH_SEVERITY_BUG_PENALTY: u64 = 10;
pub const FUZZ_CRASH_PENALTY: u64 = 3;

fn verdict(score: u64) -> &'static str {
    if score >= 80 {
        "pass"
    } else if score >= 50 {
        "warn"
    } else {
        "fail"
    }
}

pub fn aggregate_report(ctx: &WorkflowContext) -> StepOutput {
    let both = |field: &str| {
        ctx.metric(StepKind::UnitTest, field)
            .saturating_add(ctx.metric(StepKind::IntegrationTest, field))
    };
    let failed_tests = both("failed");
    let total_tests = both("total");
    let passed_tests = both("passed");
    let vulnerabilities = ctx.metric(StepKind::SecurityScan, "total");
    let high_severity_bugs = ctx.metric(StepKind::BugAnalysis, "high_severity_count");
    let fuzz_crashes = ctx.metric(StepKind::Fuzz, "crashes");

    // Step payloads come from pluggable runners, so counts are untrusted.
    let penalty = [
        (failed_tests, FAILED_TEST_PENALTY),
        (vulnerabilities, VULNERABILITY_PENALTY),
        (high_severity_bugs, HIGH_SEVERITY_BUG_PENALTY),
        (fuzz_crashes, FUZZ_CRASH_PENALTY),
    ]
    .into_iter()
    .fold(0u64, |acc, (count, weight)| {
        acc.saturating_add(count.saturating_mul(weight))
    });
    let score = 100u64.saturating_sub(penalty);
    let verdict = verdict(score);

    let missing: Vec<&str> = [
        StepKind::Fuzz,
        StepKind::UnitTest,
        StepKind::IntegrationTest,
        StepKind::BugAnalysis,
        StepKind::SecurityScan,
    ]
    .into_iter()
    .filter(|s| ctx.result(*s).is_none())
    .map(|s| s.step_key())
    .collect();

    StepOutput::new(json!({
        "score": score,
        "verdict": verdict,
        "total_tests": total_tests,
        "passed_tests": passed_tests,
        "failed_tests": failed_tests,
        "vulnerabilities": vulnerabilities,
        "high_severity_bugs": high_severity_bugs,
        "fuzz_crashes": fuzz_crashes,
        "coverage_percent": ctx.metric_f64(StepKind::UnitTest, "coverage_percent"),
        "missing_steps": missing,
    }))
    .line(format!("score {} ({}), penalty {}", score, verdict, penalty))
}

/// Content-address the aggregate and derive a transaction id from it. The
/// payload is serialized from a `serde_json::Map`, whose keys are sorted, so
/// the hash is stable for equal inputs.
pub fn ledger_entry(ctx: &WorkflowContext) -> StepOutput {
    let payload = json!({
        "run_id": ctx.run_id,
        "repository": ctx.repository.github_url,
        "aggregate": ctx.result(StepKind::Aggregate).cloned().unwrap_or(Value::Null),
    });
    let canonical = payload.to_string();
    let content_hash = hex::encode(Sha256::digest(canonical.as_bytes()));
    let transaction_hash = format!(
        "0x{}",
        hex::encode(Sha256::digest(format!("ledger:{}", content_hash).as_bytes()))
    );

    StepOutput::new(json!({
        "content_hash": content_hash,
        "transaction_hash": transaction_hash,
        "network": "simulated",
        "payload_bytes": canonical.len(),
    }))
    .line(format!("logged {} as {}", content_hash, transaction_hash))
}

pub fn voice_summary(ctx: &WorkflowContext) -> StepOutput {
    let name = &ctx.repository.name;
    let text = match ctx.result(StepKind::Aggregate) {
        Some(agg) if agg.get("score").is_some() => {
            let n = |k: &str| agg.get(k).and_then(Value::as_u64).unwrap_or(0);
            let verdict = agg.get("verdict").and_then(Value::as_str).unwrap_or("unknown");
            format!(
                "Quality report for {}. Overall score {} out of 100, verdict {}. \
                 {} of {} tests passed. {} {} found. {} high severity {}.",
                name,
                n("score"),
                verdict,
                n("passed_tests"),
                n("total_tests"),
                n("vulnerabilities"),
                plural(n("vulnerabilities"), "vulnerability", "vulnerabilities"),
                n("high_severity_bugs"),
                plural(n("high_severity_bugs"), "bug", "bugs"),
            )
        }
        _ => format!("No aggregate score is available for {}.", name),
    };

    StepOutput::new(json!({
        "summary_text": text,
        "characters": text.chars().count(),
        "audio_url": Value::Null,
    }))
    .line(text.clone())
}

fn plural(n: u64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}
