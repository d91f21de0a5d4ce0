use std::sync::Arc;

use clap::Parser;
use docarchive::{
    Archive,
    Config,
    DocumentFinder,
    Error,
    Result,
    Scheduler,
    Walker,
    cli::{Cli, Command, EditArgs, SearchArgs},
    legacy,
    output,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCARCHIVE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(roots) = cli.roots {
        config.document_paths = roots;
    }
    if config.roots().is_empty() {
        return Err(Error::Config(
            "no document roots configured (set document_paths, \
             DOCARCHIVE_PATHS or --roots)"
                .to_string(),
        ));
    }

    match cli.command {
        Command::Scan(args) => {
            let report = Archive::from_config(&config)?.run_cycle();
            if args.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                print!("{}", output::report_human(&report));
            }
        }
        Command::Watch => cmd_watch(&config)?,
        Command::Search(args) => cmd_search(&config, &args)?,
        Command::Newest(args) => {
            let findings = DocumentFinder::from_config(&config)?.find_newest();
            if args.json {
                println!("{}", output::findings_json(&findings, None)?);
            } else {
                print!("{}", output::findings_human(&findings));
            }
        }
        Command::Edit(args) => cmd_edit(&config, args)?,
        Command::Migrate => {
            let walker = Walker::new(config.exclude_set()?);
            let migrated = legacy::migrate_roots(&walker, &config.roots());
            println!("Migrated {migrated} document(s)");
        }
        Command::Status(args) => {
            let status = Archive::from_config(&config)?.status();
            if args.json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                print!("{}", output::status_human(&status));
            }
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_watch(config: &Config) -> Result<()> {
    if !config.scan_enabled {
        return Err(Error::Config(
            "scanning is disabled (scan_enabled = false)".to_string(),
        ));
    }

    let archive = Arc::new(Archive::from_config(config)?);
    let mut scheduler =
        Scheduler::new(config.initial_delay(), config.polling_interval());
    scheduler.add_task("archive", move || {
        archive.run_cycle();
    });
    scheduler.start()?;
    info!(roots = %config.document_paths, "watching document roots");
    scheduler.wait();
    Ok(())
}

fn cmd_search(config: &Config, args: &SearchArgs) -> Result<()> {
    let mut findings = DocumentFinder::from_config(config)?.find(&args.query);
    if let Some(count) = args.count {
        findings.truncate(count);
    }

    if args.json {
        println!("{}", output::findings_json(&findings, Some(&args.query))?);
    } else {
        print!("{}", output::findings_human(&findings));
    }
    Ok(())
}

fn cmd_edit(config: &Config, args: EditArgs) -> Result<()> {
    let finder = DocumentFinder::from_config(config)?;
    let document = std::path::absolute(&args.document)?;
    let mut metadata = finder.metadata_for(&document)?;

    if let Some(title) = args.title {
        metadata.title = title;
    }
    if !args.tags.is_empty() {
        metadata.tags =
            args.tags.into_iter().filter(|t| !t.is_empty()).collect();
    }
    if let Some(text) = args.text {
        metadata.text = text;
    }

    finder.update(&mut metadata)?;
    println!("Updated {}", document.display());
    Ok(())
}
