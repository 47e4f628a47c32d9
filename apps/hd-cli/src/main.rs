use clap::{Parser, Subcommand};
use hd_core::Locale;
use hd_document::{Drawing, RawDrawing};
use hd_graph::SystemIndexMap;
use hd_project::{
    CURRENT_VERSION, FileDefaults, MigrationError, Migrator, ProjectError, ProjectResult, Registry,
    ValidationError, ValidationResult, fingerprint, validate_drawing,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "hd-cli")]
#[command(about = "HydroDraw CLI - drawing migration and integrity checks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DefaultsArgs {
    /// Locale whose defaults fill metadata older drawings lack
    #[arg(long, default_value = "en-au")]
    locale: Locale,
    /// Locale defaults file
    #[arg(long, default_value = "config/defaults.yaml")]
    defaults: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a current-version drawing without migrating it
    Validate {
        /// Path to the drawing (JSON or YAML)
        drawing_path: PathBuf,
    },
    /// Upgrade drawings to the current schema version
    Migrate {
        /// Drawings to migrate
        #[arg(required = true)]
        drawing_paths: Vec<PathBuf>,
        /// Write results here instead of overwriting the inputs
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        defaults: DefaultsArgs,
    },
    /// Summarise levels, entities and flow systems of a drawing
    Inspect {
        /// Path to the drawing (JSON or YAML)
        drawing_path: PathBuf,
        #[command(flatten)]
        defaults: DefaultsArgs,
    },
}

fn main() -> ProjectResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { drawing_path } => cmd_validate(&drawing_path),
        Commands::Migrate {
            drawing_paths,
            out_dir,
            defaults,
        } => cmd_migrate(&drawing_paths, out_dir.as_deref(), &defaults),
        Commands::Inspect {
            drawing_path,
            defaults,
        } => cmd_inspect(&drawing_path, &defaults),
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

fn read_raw(path: &Path) -> ProjectResult<RawDrawing> {
    let content = std::fs::read_to_string(path)?;
    let raw = if is_yaml(path) {
        RawDrawing::from_yaml_str(&content)?
    } else {
        RawDrawing::from_json_str(&content)?
    };
    Ok(raw)
}

fn load_defaults(args: &DefaultsArgs) -> ProjectResult<Arc<FileDefaults>> {
    let defaults = FileDefaults::load(&args.defaults)?;
    if !defaults.locales().any(|l| l == args.locale) {
        warn!(locale = %args.locale, "no defaults for locale, falling back to {}", Locale::default());
    }
    Ok(Arc::new(defaults))
}

fn cmd_validate(drawing_path: &Path) -> ProjectResult<()> {
    println!("Validating drawing: {}", drawing_path.display());
    let raw = read_raw(drawing_path)?;
    let version = raw.version()?;
    if version < u64::from(CURRENT_VERSION) {
        println!(
            "Drawing is at version {} (current is {}); run `hd-cli migrate` first",
            version, CURRENT_VERSION
        );
    }

    let drawing = raw.into_drawing()?;
    match validate_drawing(&drawing) {
        ValidationResult::Ok => {
            println!("✓ Drawing is valid");
            Ok(())
        }
        ValidationResult::Violations(violations) => {
            for v in &violations {
                println!("  [{}] {}", v.invariant(), v);
            }
            Err(ValidationError { violations }.into())
        }
    }
}

fn cmd_migrate(
    drawing_paths: &[PathBuf],
    out_dir: Option<&Path>,
    args: &DefaultsArgs,
) -> ProjectResult<()> {
    let registry = Registry::builtin()?;
    let migrator = Migrator::new(registry, load_defaults(args)?, args.locale);

    let raws = drawing_paths
        .iter()
        .map(|p| read_raw(p))
        .collect::<ProjectResult<Vec<_>>>()?;
    let results = migrator.migrate_all(raws);

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let failed = write_migrated(drawing_paths, results, out_dir);
    if failed > 0 {
        println!("{} of {} drawing(s) failed", failed, drawing_paths.len());
        std::process::exit(1);
    }
    Ok(())
}

/// Save each migrated drawing and report every outcome. Returns how many
/// drawings failed to migrate or to save.
fn write_migrated(
    drawing_paths: &[PathBuf],
    results: Vec<Result<Drawing, MigrationError>>,
    out_dir: Option<&Path>,
) -> usize {
    let mut failed = 0usize;
    for (path, result) in drawing_paths.iter().zip(results) {
        let target = match (out_dir, path.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => path.clone(),
        };
        let written = result
            .map_err(ProjectError::from)
            .and_then(|drawing| save_migrated(&target, &drawing).map(|hash| (drawing, hash)));
        match written {
            Ok((drawing, hash)) => {
                info!(path = %target.display(), "wrote migrated drawing");
                println!(
                    "✓ {} -> {} (v{}, {})",
                    path.display(),
                    target.display(),
                    drawing.version,
                    hash
                );
            }
            Err(e) => {
                failed += 1;
                warn!(path = %path.display(), error = %e, "drawing not migrated");
                println!("✗ {}: {}", path.display(), e);
            }
        }
    }
    failed
}

fn save_migrated(target: &Path, drawing: &Drawing) -> ProjectResult<String> {
    if is_yaml(target) {
        hd_project::save_yaml(target, drawing)?;
    } else {
        hd_project::save_json(target, drawing)?;
    }
    Ok(fingerprint(drawing)?)
}

fn cmd_inspect(drawing_path: &Path, args: &DefaultsArgs) -> ProjectResult<()> {
    let registry = Registry::builtin()?;
    let migrator = Migrator::new(registry, load_defaults(args)?, args.locale);
    let drawing = migrator.migrate(read_raw(drawing_path)?)?;
    let graph = hd_graph::resolve(&drawing).map_err(|e| {
        ProjectError::Validation(ValidationError {
            violations: vec![e.into()],
        })
    })?;

    println!("Drawing: {}", drawing_path.display());
    println!("  Version: {}", drawing.version);
    println!("  Fingerprint: {}", fingerprint(&drawing)?);

    println!("Levels (bottom to top):");
    for (_, level) in graph.levels_by_height() {
        println!(
            "  {} - {} at {:.2} m ({} entities)",
            level.abbreviation,
            level.name,
            level.floor_height_m,
            level.entities.len()
        );
    }
    println!("  Shared risers: {}", drawing.shared_risers().count());

    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    for e in graph.entities() {
        *kinds.entry(e.entity.kind().to_string()).or_default() += 1;
    }
    println!("Entities ({} total):", graph.len());
    for (kind, count) in &kinds {
        println!("  {}: {}", kind, count);
    }

    println!("Flow systems:");
    for system in &drawing.metadata.flow_systems {
        match SystemIndexMap::from_graph(&graph, &system.uid) {
            Some(index) => println!(
                "  {} - {} ({} nodes, {} pipes)",
                system.uid,
                system.name,
                index.node_count(),
                index.pipe_count()
            ),
            None => println!("  {} - {} (unused)", system.uid, system.name),
        }
    }

    Ok(())
}
