//! CLI command definitions and handlers

mod query;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use heapscope::config::UserConfig;
use heapscope::{load_path, GraphManager, LoadOptions};
use std::path::{Path, PathBuf};
use tracing::info;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse an object address, decimal or `0x` hex
fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("'{}' is not a valid address", s))
}

/// heapscope - inspect a process memory dump
#[derive(Parser, Debug)]
#[command(name = "heapscope")]
#[command(
    version,
    about = "Object-graph analysis for process memory dumps",
    after_help = "\
Examples:
  heapscope dump.json                      Per-type summary
  heapscope dump.json.gz top -n 20         Objects keeping the most memory reachable
  heapscope dump.json top --type dict      Largest dicts by total size
  heapscope dump.json show 0x7f3a10        One object, its refs and referrers
  heapscope dump.json --prune top          Size after cutting module-to-module edges
  heapscope config init                    Write an example config file"
)]
pub struct Cli {
    /// Dump file (plain or gzip, one JSON record per line)
    pub dump: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: config or all cores)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Hide the load progress display
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Cut references between namespaces before computing sizes
    #[arg(long, global = true)]
    pub prune: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Object count and shallow size per type (default)
    Summary,

    /// Show one object with its references and referrers
    Show {
        /// Object address (decimal or 0x hex)
        #[arg(value_parser = parse_address)]
        address: u64,

        /// Print the object as a dump record instead
        #[arg(long)]
        json: bool,
    },

    /// List the objects that refer to an address
    Referrers {
        /// Object address (decimal or 0x hex)
        #[arg(value_parser = parse_address)]
        address: u64,
    },

    /// Objects with the largest total (reachable) size
    Top {
        /// Only objects of this type
        #[arg(long = "type", short = 't')]
        type_str: Option<String>,

        /// How many objects to list
        #[arg(long, short = 'n', default_value = "10")]
        count: usize,
    },

    /// Manage user configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Initialize config file with example settings
    Init,
    /// Show current config and paths
    Show,
}

/// Which derived fields a command needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Derived {
    Nothing,
    Referrers,
    All,
}

pub fn run(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Some(Commands::Config { action }) => return run_config_action(&action),
        other => other,
    };

    let config = UserConfig::load()?;
    let dump = cli.dump.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "No dump file given. Usage: {}",
            style("heapscope <DUMP> [COMMAND]").cyan()
        )
    })?;
    let load = LoadSettings {
        show_progress: config.show_progress() && !cli.no_progress,
        prune: cli.prune || config.prune_on_load(),
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = cli.workers.or(config.workers()) {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build().context("Failed to start worker threads")?;

    pool.install(|| match command {
        Some(Commands::Show { address, json }) => {
            let graph = open_graph(dump, &config, load, Derived::All)?;
            query::show(&graph, address, json)
        }
        Some(Commands::Referrers { address }) => {
            let graph = open_graph(dump, &config, load, Derived::Referrers)?;
            query::referrers(&graph, address)
        }
        Some(Commands::Top { type_str, count }) => {
            let graph = open_graph(dump, &config, load, Derived::All)?;
            query::top(&graph, type_str.as_deref(), count);
            Ok(())
        }
        _ => {
            let graph = open_graph(dump, &config, load, Derived::Nothing)?;
            query::summary(&graph);
            Ok(())
        }
    })
}

#[derive(Debug, Clone, Copy)]
struct LoadSettings {
    show_progress: bool,
    prune: bool,
}

/// Load the dump, prune if asked, and fill the derived fields `needs` asks for.
fn open_graph(dump: &Path, config: &UserConfig, load: LoadSettings, needs: Derived) -> Result<GraphManager> {
    let options = LoadOptions::with_progress(load.show_progress);
    let mut graph = load_path(dump, &options)
        .with_context(|| format!("Failed to load dump {}", dump.display()))?;

    if load.prune {
        let severed = graph.remove_expensive_references_with(&config.namespace_rule());
        info!("Pruned {} references", severed);
    }
    if needs != Derived::Nothing {
        graph.compute_referrers();
    }
    if needs == Derived::All {
        graph.compute_total_size();
    }
    Ok(graph)
}

fn run_config_action(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = UserConfig::init_user_config()?;
            println!("{} Config initialized at: {}", style("✓").green(), path.display());
            Ok(())
        }
        ConfigAction::Show => show_config(),
    }
}

fn show_config() -> Result<()> {
    let config = UserConfig::load()?;
    if let Some(user_path) = UserConfig::user_config_path() {
        let status = if user_path.exists() { "✓" } else { "(not found)" };
        println!("Config: {} {}", user_path.display(), status);
    }
    println!();
    let rule = config.namespace_rule();
    println!("  show_progress:   {}", config.show_progress());
    println!("  prune_on_load:   {}", config.prune_on_load());
    println!("  namespace_types: {}", rule.namespace_types().join(", "));
    println!("  table_types:     {}", rule.table_types().join(", "));
    match config.workers() {
        Some(n) => println!("  workers:         {}", n),
        None => println!("  workers:         (all cores)"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers("8"), Ok(8));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("1234"), Ok(1234));
        assert_eq!(parse_address("0x7f3a10"), Ok(0x7f3a10));
        assert_eq!(parse_address("0XFF"), Ok(255));
        assert!(parse_address("-1").is_err());
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn test_dump_then_subcommand() {
        let cli = Cli::try_parse_from(["heapscope", "dump.json", "top", "-n", "3", "--type", "dict"]).unwrap();
        assert_eq!(cli.dump, Some(PathBuf::from("dump.json")));
        match cli.command {
            Some(Commands::Top { type_str, count }) => {
                assert_eq!(type_str.as_deref(), Some("dict"));
                assert_eq!(count, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["heapscope", "dump.json", "show", "0x10", "--prune", "--workers", "2"]).unwrap();
        assert!(cli.prune);
        assert_eq!(cli.workers, Some(2));
        assert!(matches!(cli.command, Some(Commands::Show { address: 16, json: false })));
    }

    #[test]
    fn test_config_without_dump() {
        let cli = Cli::try_parse_from(["heapscope", "config", "show"]).unwrap();
        assert!(cli.dump.is_none());
        assert!(matches!(cli.command, Some(Commands::Config { action: ConfigAction::Show })));
    }
}
