//! Command-line argument parsing.

use std::env;
use std::path::PathBuf;

/// Default port for the status API.
pub const DEFAULT_PORT: u16 = 3000;

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    /// TOML configuration file.
    pub config: Option<PathBuf>,
    /// Built-in preset name; `default` when neither this nor `config` is given.
    pub preset: Option<String>,
    /// Generate measurements instead of reading them from stdin.
    pub synthetic: bool,
    /// Per-tick CSV telemetry destination.
    pub telemetry_out: Option<PathBuf>,
    /// Serve the status API (requires the `api` feature).
    pub serve: bool,
    pub port: u16,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            config: None,
            preset: None,
            synthetic: false,
            telemetry_out: None,
            serve: false,
            port: DEFAULT_PORT,
        }
    }
}

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(CliOptions),
    Help,
}

/// Parses the process arguments.
///
/// # Errors
///
/// Returns a message describing the first invalid argument.
pub fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses an argument list (without the program name).
///
/// # Errors
///
/// Returns a message describing the first invalid argument.
pub fn parse_args_from(args: Vec<String>) -> Result<Command, String> {
    let mut i = 0usize;
    let mut opts = CliOptions::default();

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if opts.config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name =
                    args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--synthetic" => opts.synthetic = true,
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --telemetry-out (expected a file path)",
                )?;
                if opts.telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--serve" => opts.serve = true,
            "--port" => {
                i += 1;
                let port = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                opts.port = port
                    .parse()
                    .map_err(|_| format!("--port value \"{port}\" is not a valid u16"))?;
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.config.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    Ok(Command::Run(opts))
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("energy-sim: home solar, inverter and battery power-flow simulator");
    eprintln!();
    eprintln!("Usage: energy-sim [OPTIONS]");
    eprintln!();
    eprintln!("Reads `topic payload` lines on stdin and writes published messages");
    eprintln!("as `topic payload` lines on stdout. Logs go to stderr (RUST_LOG).");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load configuration from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (default, ceiling_limited)");
    eprintln!("  --synthetic              Generate measurements instead of reading stdin");
    eprintln!("  --telemetry-out <path>   Write one CSV row per tick");
    eprintln!("  --serve                  Serve the status API (api feature)");
    eprintln!("  --port <u16>             API server port (default: {DEFAULT_PORT})");
    eprintln!("  --help                   Show this help message");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_runs_with_defaults() {
        assert_eq!(parse_args_from(vec![]), Ok(Command::Run(CliOptions::default())));
    }

    #[test]
    fn supports_config_cli() {
        let cmd = parse_args_from(args(&["--config", "site.toml", "--synthetic"]))
            .expect("parse should succeed");
        let Command::Run(opts) = cmd else {
            panic!("expected run");
        };
        assert_eq!(
            opts.config.as_deref().and_then(|p| p.to_str()),
            Some("site.toml")
        );
        assert!(opts.synthetic);
        assert!(opts.preset.is_none());
    }

    #[test]
    fn supports_preset_and_port() {
        let cmd = parse_args_from(args(&[
            "--preset",
            "ceiling_limited",
            "--serve",
            "--port",
            "8080",
        ]))
        .expect("parse should succeed");
        let Command::Run(opts) = cmd else {
            panic!("expected run");
        };
        assert_eq!(opts.preset.as_deref(), Some("ceiling_limited"));
        assert!(opts.serve);
        assert_eq!(opts.port, 8080);
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse_args_from(args(&["--synthetic", "-h"])), Ok(Command::Help));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args_from(args(&["--config"])).is_err());
        assert!(parse_args_from(args(&["--port", "70000"])).is_err());
        assert!(parse_args_from(args(&["--bogus"])).is_err());
        assert!(parse_args_from(args(&["--preset", "a", "--preset", "b"])).is_err());
        let both = parse_args_from(args(&["--config", "x.toml", "--preset", "default"]));
        assert!(both.is_err_and(|e| e.contains("mutually exclusive")));
    }
}
