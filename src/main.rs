use clap::Parser;
use tracing_subscriber::EnvFilter;

use notesearch::{
    Error,
    Result,
    cli::{Cli, Command, IndexArgs, PaletteArgs, SavedAction},
    data_dir::ProjectDir,
    events::LogSink,
    indexing::{self, IndexOptions, IndexStats},
    palette::{self, TrigramIndex},
    saved_searches::SavedSearches,
    search,
    tantivy_index::{self, SearchIndex},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("NOTESEARCH_LOG") {
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

    let project = ProjectDir::resolve(cli.project.as_deref())?;

    match cli.command {
        Command::Index(args) => cmd_index(&project, &args)?,
        Command::Rebuild => cmd_rebuild(&project)?,
        Command::Search(args) => {
            let index = SearchIndex::open_or_create(&project.index_dir())?;
            let results =
                search::execute_search(&index, &args.query, args.count)?;

            if args.json {
                search::format_json(&results, &args.query)?;
            } else {
                search::format_human(&results);
            }
        }
        Command::Palette(args) => cmd_palette(&project, &args)?,
        Command::Tags(args) => {
            let index = SearchIndex::open_or_create(&project.index_dir())?;
            let tags = search::list_tags(&index)?;

            if args.json {
                println!("{}", serde_json::to_string(&tags)?);
            } else if tags.is_empty() {
                println!("No tags found.");
            } else {
                for t in &tags {
                    println!("{}\t{}", t.tag, t.count);
                }
            }
        }
        Command::Saved { action } => cmd_saved(&project, action)?,
        Command::Status(args) => cmd_status(&project, args.json)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn print_stats(stats: &IndexStats) {
    eprintln!(
        "Indexed {} folder(s): {} written, {} unchanged, {} failed",
        stats.folders, stats.written, stats.unchanged, stats.failed
    );
    eprintln!("{} document(s) in the index", stats.documents);
}

fn cmd_index(project: &ProjectDir, args: &IndexArgs) -> Result<()> {
    let mut options = IndexOptions {
        force: args.force,
        ..IndexOptions::default()
    };
    if let Some(workers) = args.workers {
        options.workers = workers;
    }

    let index = SearchIndex::open_or_create(&project.index_dir())?;
    let stats =
        indexing::index_all(&index, &project.notes_dir(), &options, &LogSink)?;
    index.close()?;

    print_stats(&stats);
    Ok(())
}

fn cmd_rebuild(project: &ProjectDir) -> Result<()> {
    let index = SearchIndex::open_or_create(&project.index_dir())?;
    let (index, stats) = tantivy_index::rebuild(
        index,
        project,
        &IndexOptions::default(),
        &LogSink,
    )?;
    index.close()?;

    print_stats(&stats);
    eprintln!("Rebuild complete.");
    Ok(())
}

fn cmd_palette(project: &ProjectDir, args: &PaletteArgs) -> Result<()> {
    let notes = project.notes_dir();

    if args.similarity {
        let paths = palette::search_by_similarity(&notes, &args.query)?;
        if args.json {
            println!("{}", serde_json::to_string(&paths)?);
        } else if paths.is_empty() {
            println!("No matches.");
        } else {
            for path in &paths {
                println!("{path}");
            }
        }
        return Ok(());
    }

    let matches = TrigramIndex::build(&notes)?.search(&args.query);
    if args.json {
        println!("{}", serde_json::to_string(&matches)?);
    } else if matches.is_empty() {
        println!("No matches.");
    } else {
        for m in &matches {
            println!("{:>4}  {}", m.score, m.path);
        }
    }
    Ok(())
}

fn cmd_saved(project: &ProjectDir, action: SavedAction) -> Result<()> {
    let saved = SavedSearches::new(project);

    match action {
        SavedAction::List(args) => {
            let searches = saved.list();
            if args.json {
                println!("{}", serde_json::to_string(&searches)?);
            } else if searches.is_empty() {
                println!("No saved searches.");
            } else {
                for s in &searches {
                    println!("{}\t{}", s.name, s.query);
                }
            }
        }
        SavedAction::Add { name, query } => {
            if name.trim().is_empty() {
                return Err(Error::Config(
                    "saved search name cannot be empty".into(),
                ));
            }
            saved.add(&name, &query)?;
            println!("Saved search '{name}'");
        }
        SavedAction::Remove { name } => {
            saved.remove(&name)?;
            println!("Removed saved search '{name}'");
        }
    }
    Ok(())
}

fn cmd_status(project: &ProjectDir, json: bool) -> Result<()> {
    let index = SearchIndex::open_or_create(&project.index_dir())?;
    let documents = index.doc_count();
    let saved = SavedSearches::new(project).list().len();

    if json {
        let status = serde_json::json!({
            "project": project.root().display().to_string(),
            "notes": project.notes_dir().display().to_string(),
            "index": project.index_dir().display().to_string(),
            "documents": documents,
            "saved_searches": saved,
        });
        println!("{status}");
    } else {
        println!("Project: {}", project.root().display());
        println!("Notes: {}", project.notes_dir().display());
        println!("Index: {}", project.index_dir().display());
        println!("Documents: {documents}");
        println!("Saved searches: {saved}");
    }
    Ok(())
}
