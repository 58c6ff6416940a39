use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;
use unitload_core::model::UnitShape;
use unitload_core::{
    CollisionPolicy, ContextConfig, ContextLoader, EngineBuilder, EngineOptions, EngineRegistry,
    MissingPathPolicy, ResolutionEngine, Root,
};

#[derive(Parser)]
#[command(
    name = "unitload",
    version,
    about = "Resolve units and resources from jars, class directories and remote archives",
    long_about = "Unitload builds a resolution engine from the given roots (jar files, class \
                  directories or remote URLs) or from a JSON context file, then resolves logical \
                  names through its prioritized chain of sources."
)]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct EngineArgs {
    /// Jar, directory or URL to load (repeatable)
    #[arg(long = "root", value_name = "PATH|URL", global = true)]
    pub roots: Vec<String>,

    /// JSON context describing named engines
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Engine to use from the context
    #[arg(long, value_name = "NAME", global = true, default_value = "default")]
    pub engine: String,

    /// Fail when two roots provide the same entry instead of keeping the first
    #[arg(long, global = true)]
    pub reject_collisions: bool,

    /// Fail when a root path does not exist instead of skipping it
    #[arg(long, global = true)]
    pub fail_missing: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a unit by its dotted name
    #[command(long_about = "Resolves NAME (e.g. com.acme.Widget) through the engine and prints \
                            where it came from, its size and its digest.")]
    Resolve {
        #[arg(value_name = "NAME")]
        name: String,
        /// Skip eager linking
        #[arg(long)]
        no_link: bool,
    },
    /// Resolve a resource and write its bytes to stdout
    Resource {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// List every locator for a resource
    Locators {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// List the entries loaded into the local store
    Ls,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Digest")]
    digest: String,
    #[tabled(rename = "Origin")]
    origin: String,
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    }
}

impl EngineArgs {
    fn options(&self) -> EngineOptions {
        let mut options = EngineOptions::from_env();
        self.apply_flags(&mut options);
        options
    }

    fn apply_flags(&self, options: &mut EngineOptions) {
        if self.reject_collisions {
            options.collision = CollisionPolicy::Reject;
        }
        if self.fail_missing {
            options.missing_path = MissingPathPolicy::Fail;
        }
    }

    /// The selected engine with every `--root` loaded into it.
    fn build(&self) -> Result<Arc<ResolutionEngine>, Box<dyn std::error::Error>> {
        let engine = match &self.config {
            Some(path) => {
                let mut config = ContextConfig::from_file(path)?;
                for engine in &mut config.engines {
                    self.apply_flags(&mut engine.options);
                }
                let registry = EngineRegistry::new();
                ContextLoader::new().load(&config, &registry)?;
                registry.require(&self.engine)?
            }
            None => Arc::new(EngineBuilder::new(self.engine.clone()).options(self.options()).build()?),
        };

        for raw in &self.roots {
            engine.add(&Root::parse(raw))?;
        }
        info!("Engine {} ready with {} entries", engine.name(), engine.store().len());
        Ok(engine)
    }
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = unitload_core::logging::init_logging("cli", false);

    let engine = cli.engine.build()?;

    match cli.command {
        Commands::Resolve { name, no_link } => {
            let unit = engine.resolve_with(&name, !no_link)?;
            println!("Name:    {}", unit.name());
            println!("Origin:  {}", serde_json::to_string(unit.origin())?);
            println!("Size:    {}", format_size(unit.payload().len() as u64));
            println!("Digest:  {:016x}", unit.digest());
            println!("Linked:  {}", unit.is_linked());
            if let UnitShape::Class { kind, methods } = unit.shape() {
                println!("Kind:    {:?}", kind);
                println!("Methods: {}", methods.join(", "));
            }
        }
        Commands::Resource { name } => {
            let mut stream = engine.resolve_resource(&name)?;
            let mut stdout = std::io::stdout().lock();
            std::io::copy(&mut stream, &mut stdout)?;
            stdout.flush()?;
        }
        Commands::Locators { name } => {
            let locators = engine.resolve_all_locators(&name)?;
            if locators.is_empty() {
                println!("No locators found for {}.", name);
            }
            for locator in locators {
                println!("{}", locator);
            }
        }
        Commands::Ls => {
            let rows: Vec<EntryRow> = engine
                .store()
                .entries()
                .into_iter()
                .map(|entry| EntryRow {
                    key: entry.key().to_string(),
                    size: format_size(entry.metadata().size),
                    digest: format!("{:016x}", entry.metadata().digest),
                    origin: entry.metadata().origin.as_str().to_string(),
                })
                .collect();

            if rows.is_empty() {
                println!("No entries loaded.");
            } else {
                println!("{}", Table::new(rows));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "unitload",
            "resolve",
            "com.acme.Widget",
            "--root",
            "a.jar",
            "--root",
            "https://repo.example.com/b.jar",
            "--reject-collisions",
        ])
        .unwrap();

        assert_eq!(cli.engine.roots, vec!["a.jar", "https://repo.example.com/b.jar"]);
        assert!(cli.engine.reject_collisions);
        assert!(!cli.engine.fail_missing);
        assert_eq!(cli.engine.engine, "default");
        assert!(matches!(cli.command, Commands::Resolve { ref name, no_link: false } if name == "com.acme.Widget"));
    }

    #[test]
    fn test_flags_override_options() {
        let cli = Cli::try_parse_from(["unitload", "--fail-missing", "ls"]).unwrap();
        let mut options = EngineOptions::default();
        cli.engine.apply_flags(&mut options);

        assert_eq!(options.missing_path, MissingPathPolicy::Fail);
        assert_eq!(options.collision, CollisionPolicy::IgnoreKeepFirst);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
