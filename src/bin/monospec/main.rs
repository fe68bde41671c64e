//! Monospec CLI - browse and validate tagged asset catalogs.

use monospec::catalog::{load_catalog, CatalogOrigin, LoadedCatalog};
use monospec::settings::Settings;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

/// Verbosity selected by the global flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut verbosity = None;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = Some(Verbosity::Debug),
            "-vv" | "--trace" => verbosity = Some(Verbosity::Trace),
            "-q" | "--quiet" => verbosity = Some(Verbosity::Quiet),
            _ => filtered_args.push(arg),
        }
    }

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let command = filtered_args[0];
    if !matches!(command, "view" | "v") {
        init_logging(&log_filter(verbosity, Settings::load().log_filter.as_deref()));
    }

    match command {
        // View command - launch the desktop viewer
        "view" | "v" => {
            #[cfg(feature = "viewer")]
            {
                let root = filtered_args.get(1).map(std::path::PathBuf::from);
                let filter = verbosity.map(|v| v.filter().to_string());
                if let Err(e) = monospec::viewer::run(root, filter) {
                    eprintln!("Viewer error: {}", e);
                    std::process::exit(1);
                }
            }
            #[cfg(not(feature = "viewer"))]
            {
                eprintln!("Viewer not available. Rebuild with: cargo build --features viewer");
                std::process::exit(1);
            }
        }

        // Check command - load and validate a catalog
        "check" | "c" => {
            let code = cmd_check(filtered_args.get(1).copied());
            std::process::exit(code);
        }

        // List command - items per collection, optionally filtered
        "list" | "l" => {
            let (root, query) = split_list_args(&filtered_args[1..]);
            cmd_list(root, query.unwrap_or(""));
        }

        "config" => {
            let init = filtered_args[1..].contains(&"--init");
            if let Err(e) = cmd_config(init) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        "version" | "-V" | "--version" => print_version(),

        "help" | "h" | "-h" | "--help" => print_help(),

        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    }
}

/// Filter used when `RUST_LOG` is unset: a verbosity flag wins over the settings file.
fn log_filter(verbosity: Option<Verbosity>, configured: Option<&str>) -> String {
    match (verbosity, configured) {
        (Some(v), _) => v.filter().to_string(),
        (None, Some(f)) if !f.trim().is_empty() => f.trim().to_string(),
        (None, _) => Verbosity::Info.filter().to_string(),
    }
}

fn init_logging(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_help() {
    println!("monospec - tagged asset catalog viewer");
    println!();
    println!("USAGE:");
    println!("    monospec [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    v, view   [root]              Open the catalog in the desktop viewer");
    println!("    c, check  [root]              Load the catalog and report problems");
    println!("    l, list   [root] [query]      List items per collection matching the query");
    println!("    config    [--init]            Show settings (--init writes defaults)");
    println!("    version                       Show version and build date");
    println!("    h, help                       Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("EXAMPLES:");
    println!("    monospec view ./catalog               # Browse a catalog folder");
    println!("    monospec check                        # Validate the current directory");
    println!("    monospec list ./catalog cube          # Items matching \"cube\"");
    println!();
    println!("VIEWER KEYS:");
    println!("    Up/Down   Step selection");
    println!("    Enter     Play/pause video");
    println!("    F         Toggle fullscreen");
}

fn print_version() {
    println!(
        "monospec {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("MONOSPEC_BUILD_DATE"),
        env!("MONOSPEC_BUILD_TIME")
    );
}

fn load(root: Option<&str>) -> LoadedCatalog {
    let settings = Settings::load();
    let root = settings.resolve_root(root.map(Path::new));
    load_catalog(&root, &settings.data_sources)
}

/// `list` takes an optional root directory followed by an optional query.
fn split_list_args<'a>(args: &[&'a str]) -> (Option<&'a str>, Option<&'a str>) {
    match args {
        [] => (None, None),
        [one] if Path::new(one).is_dir() => (Some(*one), None),
        [one] => (None, Some(*one)),
        [root, query, ..] => (Some(*root), Some(*query)),
    }
}

fn cmd_check(root: Option<&str>) -> i32 {
    let loaded = load(root);
    let catalog = &loaded.catalog;

    match &loaded.origin {
        CatalogOrigin::File { name, path } => println!("Source:      {} ({})", name, path.display()),
        CatalogOrigin::Sample => println!("Source:      built-in sample"),
    }
    for (name, reason) in &loaded.failures {
        println!("  skipped {}: {}", name, reason);
    }
    println!("Collections: {}", catalog.collections().len());
    println!("Items:       {}", catalog.item_count());
    println!();

    for col in catalog.collections() {
        println!("  {:<24} {:>4} items  ({})", col.name, col.items.len(), col.id);
    }

    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    for item in catalog.items() {
        *kinds.entry(item.asset.kind().to_string()).or_default() += 1;
    }
    if !kinds.is_empty() {
        println!();
        println!("Asset types:");
        for (kind, count) in &kinds {
            println!("  {:<8} {}", kind, count);
        }
    }

    let mut problems = 0;
    for id in catalog.duplicate_ids() {
        println!("WARNING: duplicate item id {}", id);
        problems += 1;
    }
    for item in catalog.items() {
        if let Err(e) = item.asset.validate() {
            println!("WARNING: {} ({}): {}", item.id, item.name, e);
            problems += 1;
        }
    }

    println!();
    if problems == 0 {
        println!("OK");
        0
    } else {
        println!("{} problem(s)", problems);
        2
    }
}

fn cmd_list(root: Option<&str>, query: &str) {
    let loaded = load(root);
    let needle = query.trim().to_lowercase();

    for col in loaded.catalog.collections() {
        let items: Vec<_> = col.items.iter().filter(|it| it.matches(&needle)).collect();
        println!("{} ({} of {})", col.name, items.len(), col.items.len());
        if items.is_empty() {
            println!("  No items for this filter or collection.");
        }
        for item in items {
            println!("  {:<18} {:<8} {}", item.id, item.asset.kind(), item.name);
            if !item.tags.is_empty() {
                println!("  {:<18} {:<8} {}", "", "", item.tags.join(" * "));
            }
        }
    }
}

fn cmd_config(init: bool) -> monospec::Result<()> {
    let Some(path) = Settings::path() else {
        return Err(monospec::Error::other("no user config directory on this platform"));
    };
    if init {
        if path.exists() {
            println!("Settings already exist at {}", path.display());
        } else {
            Settings::default().save_to(&path)?;
            println!("Wrote defaults to {}", path.display());
        }
    }
    println!("Settings file: {}", path.display());
    let settings = Settings::load();
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
