//! CLI tests

use crate::{
    Cli, Commands, ConfigAction, OutputFormat, RunOverrides, apply_overrides, build_scheduler,
    render_report,
};
use clap::Parser;
use forge_core::config::Config;
use forge_core::scheduler::{GateMode, RunReport};

#[test]
fn test_run_args_parsing() {
    let cli = Cli::try_parse_from([
        "forge",
        "--format",
        "json",
        "run",
        "plan.json",
        "--agent-cmd",
        "my-agent --fast",
        "--max-concurrency",
        "5",
        "--sequential",
        "--blocking-gates",
    ])
    .unwrap();

    assert_eq!(cli.format, OutputFormat::Json);
    match cli.command {
        Commands::Run { plan, overrides } => {
            assert_eq!(plan.to_str(), Some("plan.json"));
            assert_eq!(overrides.agent_cmd.as_deref(), Some("my-agent --fast"));
            assert_eq!(overrides.max_concurrency, Some(5));
            assert!(overrides.sequential && overrides.blocking_gates);
            assert!(!overrides.no_pre_validate);
        }
        _ => panic!("expected run"),
    }
}

#[test]
fn test_config_args_parsing() {
    let cli = Cli::try_parse_from([
        "forge",
        "-q",
        "config",
        "set",
        "scheduler.gate_mode",
        "blocking",
    ])
    .unwrap();
    assert!(cli.quiet);
    assert!(matches!(
        cli.command,
        Commands::Config { action: ConfigAction::Set { ref key, ref value } }
            if key == "scheduler.gate_mode" && value == "blocking"
    ));

    assert!(Cli::try_parse_from(["forge", "run"]).is_err());
    assert!(Cli::try_parse_from(["forge", "--format", "yaml", "validate", "p.json"]).is_err());
}

#[test]
fn test_overrides_apply_to_config() {
    let mut config = Config::default();
    let overrides = RunOverrides {
        review_cmd: Some("reviewer".into()),
        max_concurrency: Some(8),
        sequential: true,
        no_post_verify: true,
        blocking_gates: true,
        ..Default::default()
    };

    apply_overrides(&mut config, &overrides).unwrap();

    assert_eq!(config.review.command.as_deref(), Some("reviewer"));
    assert_eq!(config.scheduler.max_concurrency, 8);
    assert!(!config.scheduler.parallel);
    assert!(config.scheduler.pre_validate);
    assert!(!config.scheduler.post_verify);
    assert_eq!(config.scheduler.gate_mode, GateMode::Blocking);
}

#[test]
fn test_zero_concurrency_override_is_rejected() {
    let mut config = Config::default();
    let overrides = RunOverrides {
        max_concurrency: Some(0),
        ..Default::default()
    };
    assert!(apply_overrides(&mut config, &overrides).is_err());
}

#[test]
fn test_scheduler_requires_agent_command() {
    let err = build_scheduler(&Config::default(), "s1").err().unwrap();
    assert!(err.to_string().contains("--agent-cmd"));

    let mut config = Config::default();
    config.set("agent.command", "my-agent").unwrap();
    let scheduler = build_scheduler(&config, "s1").unwrap();
    assert_eq!(scheduler.config().max_concurrency, 3);
}

#[test]
fn test_render_report() {
    let report: RunReport = serde_json::from_value(serde_json::json!({
        "sessionId": "s1",
        "startedAt": "2026-01-01T00:00:00Z",
        "finishedAt": "2026-01-01T00:00:02Z",
        "layers": [{
            "index": 0,
            "batches": [{
                "index": 0,
                "tasks": [
                    {"taskId": "a", "kind": "api", "status": "succeeded",
                     "warnings": [], "durationMs": 12},
                    {"taskId": "b", "kind": "ui", "status": "timed-out", "error": "deadline",
                     "warnings": [], "durationMs": 900}
                ],
                "crossReference": {
                    "conflicts": [{"path": "src/app.tsx", "tasks": ["a", "b"]}],
                    "links": [],
                    "warnings": []
                }
            }]
        }]
    }))
    .unwrap();

    let text = render_report(&report);
    assert!(text.contains("succeeded  a (12 ms)"));
    assert!(text.contains("error: deadline"));
    assert!(text.contains("conflict: src/app.tsx claimed by a, b"));
    assert!(text.contains("1 succeeded, 0 failed, 1 timed out, 0 rejected in 2.0s"));
}

#[test]
fn test_core_errors_carry_code_and_hint() {
    let err = crate::with_hint(forge_core::Error::DependencyCycle("a -> b -> a".into()));
    let text = err.to_string();
    assert!(text.starts_with("[E003] Dependency cycle detected: a -> b -> a"));
    assert!(text.contains("hint: forge validate <plan>"));
}
