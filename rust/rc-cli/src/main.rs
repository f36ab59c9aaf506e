//! racecar: CLI for the online race planner.
//!
//! Subcommands:
//! - run
//! - legal
//! - check

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

use rc_core::{legal_actions, Config, ProblemSpec};
use rc_logging::{EpisodeSummaryV1, NdjsonWriter, PlanStepEventV1, RunManifestV1};
use rc_mcts::{PlannerConfig, SearchBudget};
use rc_runtime::{Episode, StepRecord};

fn print_help() {
    eprintln!(
        r#"racecar - online MCTS race planner

USAGE:
    racecar <COMMAND> [OPTIONS]

COMMANDS:
    run                 Run episodes on a problem file
    legal               Print the legal actions at the start state
    check               Validate a problem file

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version

Run `racecar <COMMAND> --help` for command options.
"#
    );
}

fn print_version() {
    println!("racecar {}", env!("CARGO_PKG_VERSION"));
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(v) => v,
        None => {
            eprintln!("Missing value for {flag}");
            process::exit(1);
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let raw = value_of(args, i, flag);
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Invalid {flag} value: {raw}");
        process::exit(1);
    })
}

fn load_problem(path: &str) -> ProblemSpec {
    ProblemSpec::load(path).unwrap_or_else(|e| {
        eprintln!("Failed to load problem {path}: {e}");
        process::exit(1);
    })
}

/// Shared `--problem` parsing for the single-argument subcommands.
fn problem_arg(cmd: &str, args: &[String], usage: &str) -> Option<String> {
    let mut problem: Option<String> = None;
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("{usage}");
                return None;
            }
            "--problem" => {
                problem = Some(value_of(args, i, "--problem").to_string());
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `racecar {cmd}`: {other}");
                eprintln!("Run `racecar {cmd} --help` for usage.");
                process::exit(1);
            }
        }
    }
    Some(problem.unwrap_or_else(|| {
        eprintln!("Missing --problem");
        process::exit(1);
    }))
}

fn cmd_check(args: &[String]) {
    let Some(path) = problem_arg(
        "check",
        args,
        r#"racecar check

USAGE:
    racecar check --problem problem.yaml

OPTIONS:
    --problem PATH    Problem file to validate (required)
"#,
    ) else {
        return;
    };

    let spec = load_problem(&path);
    println!(
        "ok: level {} n={} max_t={} cars={} drivers={} tires={} terrains={}",
        spec.level,
        spec.n,
        spec.max_t,
        spec.cars.len(),
        spec.drivers.len(),
        spec.tires.len(),
        spec.terrains.len()
    );
}

fn cmd_legal(args: &[String]) {
    let Some(path) = problem_arg(
        "legal",
        args,
        r#"racecar legal

USAGE:
    racecar legal --problem problem.yaml

OPTIONS:
    --problem PATH    Problem file (required)
"#,
    ) else {
        return;
    };

    let spec = load_problem(&path);
    let start = spec.start_state();
    println!("start: {start}");
    for (i, a) in legal_actions(&spec, &start).iter().enumerate() {
        println!("{i:>3}  {a}");
    }
}

fn plan_step_event(run_id: &str, episode: u32, r: &StepRecord) -> PlanStepEventV1 {
    PlanStepEventV1 {
        event: "plan_step",
        ts_ms: rc_logging::now_ms(),
        run_id: run_id.to_string(),
        episode,
        index: r.index,
        pos_before: r.before.pos,
        action: r.action.to_string(),
        greedy: r.stats.greedy.as_ref().map(|a| a.to_string()),
        overridden: r.stats.overridden,
        pos_after: r.after.pos,
        steps: r.steps,
        reward: r.reward,
        reuse: r.reuse.map(|u| u.as_str()),
        sweeps: r.stats.sweeps,
        simulations: r.stats.simulations,
        state_nodes: r.stats.state_nodes as u64,
        root_value: r.stats.root_value,
        plan_ms: r.stats.elapsed.as_millis() as u64,
    }
}

fn cmd_run(args: &[String]) {
    let mut problem_path: Option<String> = None;
    let mut config_path: Option<String> = None;
    let mut seed: Option<u64> = None;
    let mut episodes: Option<u32> = None;
    let mut budget_ms: Option<u64> = None;
    let mut sweeps: Option<u32> = None;
    let mut log: Option<PathBuf> = None;
    let mut quiet = false;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"racecar run

USAGE:
    racecar run --problem problem.yaml [--config cfg.yaml] [--seed S] [--episodes N] [--budget-ms MS] [--sweeps N] [--log events.ndjson] [--quiet]

OPTIONS:
    --problem PATH      Problem file (required)
    --config PATH       Run configuration (default: built-in defaults)
    --seed S            Seed of the first episode; episode k uses S+k (default: config run.seed)
    --episodes N        Number of episodes (default: config run.episodes)
    --budget-ms MS      Planning time per real step (default: config planner.budget_ms)
    --sweeps N          Plan a fixed number of sweeps per step instead of a time budget
    --log PATH          Append NDJSON events to PATH and write a run manifest next to it
    --quiet             Only print episode summaries
"#
                );
                return;
            }
            "--problem" => {
                problem_path = Some(value_of(args, i, "--problem").to_string());
                i += 2;
            }
            "--config" => {
                config_path = Some(value_of(args, i, "--config").to_string());
                i += 2;
            }
            "--seed" => {
                seed = Some(parse_value(args, i, "--seed"));
                i += 2;
            }
            "--episodes" => {
                episodes = Some(parse_value(args, i, "--episodes"));
                i += 2;
            }
            "--budget-ms" => {
                budget_ms = Some(parse_value(args, i, "--budget-ms"));
                i += 2;
            }
            "--sweeps" => {
                sweeps = Some(parse_value(args, i, "--sweeps"));
                i += 2;
            }
            "--log" => {
                log = Some(PathBuf::from(value_of(args, i, "--log")));
                i += 2;
            }
            "--quiet" => {
                quiet = true;
                i += 1;
            }
            other => {
                eprintln!("Unknown option for `racecar run`: {other}");
                eprintln!("Run `racecar run --help` for usage.");
                process::exit(1);
            }
        }
    }

    let problem_path = problem_path.unwrap_or_else(|| {
        eprintln!("Missing --problem");
        process::exit(1);
    });
    let spec = Arc::new(load_problem(&problem_path));

    let (mut cfg, config_hash) = match &config_path {
        Some(p) => {
            let cfg = Config::load(p).unwrap_or_else(|e| {
                eprintln!("Failed to load config: {e}");
                process::exit(1);
            });
            let bytes = std::fs::read(p).unwrap_or_else(|e| {
                eprintln!("Failed to read config file: {e}");
                process::exit(1);
            });
            (cfg, Some(rc_logging::hash_config_bytes(&bytes)))
        }
        None => (Config::default(), None),
    };
    if let Some(s) = seed {
        cfg.run.seed = s;
    }
    if let Some(n) = episodes {
        cfg.run.episodes = n;
    }
    if let Some(ms) = budget_ms {
        cfg.planner.budget_ms = ms;
        cfg.planner.sweeps = None;
    }
    if sweeps.is_some() {
        cfg.planner.sweeps = sweeps;
    }

    let planner_cfg = PlannerConfig::from(&cfg);
    let budget = SearchBudget::from_config(&cfg.planner);

    let run_id = format!("race-{}", rc_logging::now_ms());
    let mut writer = log.as_ref().map(|p| {
        NdjsonWriter::open_append_with_flush(p, cfg.run.log_flush_every).unwrap_or_else(|e| {
            eprintln!("Failed to open log {}: {e}", p.display());
            process::exit(1);
        })
    });
    let manifest_path = log.as_ref().map(|p| p.with_extension("run.json"));
    let mut manifest = RunManifestV1 {
        run_manifest_version: rc_logging::RUN_MANIFEST_VERSION,
        run_id: run_id.clone(),
        created_ts_ms: rc_logging::now_ms(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
        problem_path: problem_path.clone(),
        problem_level: spec.level,
        seed: cfg.run.seed,
        episodes: cfg.run.episodes,
        git_hash: rc_logging::try_git_hash(),
        config_hash,
        problem_hash: std::fs::read(&problem_path)
            .ok()
            .map(|b| rc_logging::hash_config_bytes(&b)),
        episodes_completed: 0,
        successes: 0,
        mean_steps: None,
        mean_reward: None,
    };
    write_manifest(manifest_path.as_deref(), &manifest);

    println!(
        "Problem {problem_path}: level {} n={} max_t={}",
        spec.level, spec.n, spec.max_t
    );
    println!("Budget: {budget:?}, rollout depth {}", planner_cfg.rollout_depth);

    let mut total_steps = 0u64;
    let mut total_reward = 0.0f64;
    for k in 0..cfg.run.episodes {
        let ep_seed = cfg.run.seed.wrapping_add(k as u64);
        let started = Instant::now();
        let mut episode = Episode::simulated(spec.clone(), planner_cfg, budget, ep_seed)
            .unwrap_or_else(|e| {
                eprintln!("Failed to build planner: {e}");
                process::exit(1);
            });

        let report = episode
            .run_with(|r| {
                if !quiet {
                    println!(
                        "  t={:<3} {:<24} pos {:>3} -> {:<3} reward={:.4} sweeps={} {}",
                        r.steps,
                        r.action.to_string(),
                        r.before.pos,
                        r.after.pos,
                        r.reward,
                        r.stats.sweeps,
                        r.reuse.map_or("", |u| u.as_str()),
                    );
                }
                if let Some(w) = writer.as_mut() {
                    if let Err(e) = w.write_event(&plan_step_event(&run_id, k, r)) {
                        eprintln!("Failed to write log event: {e}");
                        process::exit(1);
                    }
                }
            })
            .unwrap_or_else(|e| {
                eprintln!("Episode {} failed: {e}", k + 1);
                process::exit(1);
            });
        let wall_ms = started.elapsed().as_millis() as u64;

        println!(
            "Episode {}: {} steps={} moves={} reward={:.4} time={:.2}s",
            k + 1,
            if report.success { "pass" } else { "fail" },
            report.steps,
            report.moves,
            report.total_reward,
            wall_ms as f64 / 1000.0
        );

        if let Some(w) = writer.as_mut() {
            let summary = EpisodeSummaryV1 {
                event: "episode",
                ts_ms: rc_logging::now_ms(),
                run_id: run_id.clone(),
                episode: k,
                seed: ep_seed,
                success: report.success,
                steps: report.steps,
                moves: report.moves,
                total_reward: report.total_reward,
                wall_ms,
            };
            if let Err(e) = w.write_event(&summary).and_then(|_| w.flush()) {
                eprintln!("Failed to write log event: {e}");
                process::exit(1);
            }
        }

        total_steps += report.steps as u64;
        total_reward += report.total_reward;
        manifest.episodes_completed += 1;
        if report.success {
            manifest.successes += 1;
        }
        let done = manifest.episodes_completed as f64;
        manifest.mean_steps = Some(total_steps as f64 / done);
        manifest.mean_reward = Some(total_reward / done);
        write_manifest(manifest_path.as_deref(), &manifest);
    }

    if manifest.episodes_completed > 0 {
        let done = manifest.episodes_completed as f64;
        println!();
        println!("Summary:");
        println!("  - Episodes: {}", manifest.episodes_completed);
        println!(
            "  - Success rate: {:.1}%",
            manifest.successes as f64 / done * 100.0
        );
        println!("  - Mean steps: {:.2}", total_steps as f64 / done);
        println!("  - Mean reward: {:.4}", total_reward / done);
    }
}

fn write_manifest(path: Option<&Path>, m: &RunManifestV1) {
    let Some(path) = path else {
        return;
    };
    if let Err(e) = rc_logging::write_manifest_atomic(path, m) {
        eprintln!("Failed to write run manifest: {e}");
        process::exit(1);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        process::exit(0);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => {
            print_help();
        }
        "-V" | "--version" => {
            print_version();
        }
        "run" => {
            cmd_run(&args[2..]);
        }
        "legal" => {
            cmd_legal(&args[2..]);
        }
        "check" => {
            cmd_check(&args[2..]);
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Run `racecar --help` for usage.");
            process::exit(1);
        }
    }
}
