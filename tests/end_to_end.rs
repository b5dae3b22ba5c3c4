use std::path::Path;

use notesearch::{
    ProjectDir,
    SearchIndex,
    events::NoopSink,
    incremental::{IndexUpdater, NoteRef, Rename},
    indexing::{self, IndexOptions},
    palette::{self, TrigramIndex},
    schema::DocumentType,
    search,
    tantivy_index,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn write_note(
    notes: &Path,
    folder: &str,
    file: &str,
    body: &str,
) -> std::io::Result<()> {
    std::fs::create_dir_all(notes.join(folder))?;
    std::fs::write(notes.join(folder).join(file), body)
}

fn options() -> IndexOptions {
    IndexOptions {
        workers: 2,
        queue_capacity: 4,
        ..IndexOptions::default()
    }
}

fn paths(index: &SearchIndex, query: &str) -> Vec<String> {
    let mut found: Vec<String> = search::execute_search(index, query, 50)
        .unwrap()
        .into_iter()
        .filter(|r| r.kind == DocumentType::Note)
        .map(|r| r.path())
        .collect();
    found.sort();
    found
}

fn hello_goodbye_project()
-> Result<(tempfile::TempDir, ProjectDir), std::io::Error> {
    let tmp = tempfile::tempdir()?;
    let project = ProjectDir::at(tmp.path());
    write_note(&project.notes_dir(), "folder1", "note1.md", "hello world")?;
    write_note(&project.notes_dir(), "folder2", "note2.md", "goodbye")?;
    Ok((tmp, project))
}

#[test]
fn hello_goodbye_queries() -> TestResult {
    let (_tmp, project) = hello_goodbye_project()?;
    let index = SearchIndex::open_or_create(&project.index_dir())?;
    indexing::index_all(&index, &project.notes_dir(), &options(), &NoopSink)?;

    assert_eq!(paths(&index, "hello"), vec!["folder1/note1.md"]);
    assert_eq!(
        paths(&index, "hello OR goodbye"),
        vec!["folder1/note1.md", "folder2/note2.md"]
    );
    assert!(paths(&index, "hello goodbye").is_empty());
    assert_eq!(paths(&index, "\"hello world\""), vec!["folder1/note1.md"]);
    assert!(paths(&index, "\"world hello\"").is_empty());
    Ok(())
}

#[test]
fn reindexing_unchanged_corpus_is_idempotent() -> TestResult {
    let (_tmp, project) = hello_goodbye_project()?;
    write_note(
        &project.notes_dir(),
        "folder1",
        "dated.md",
        "---\nlastUpdated: '2024-01-01'\n---\nstable",
    )?;
    let index = SearchIndex::open_or_create(&project.index_dir())?;

    let notes = project.notes_dir();
    let first = indexing::index_all(&index, &notes, &options(), &NoopSink)?;
    let second = indexing::index_all(&index, &notes, &options(), &NoopSink)?;

    assert_eq!(first.documents, second.documents);
    // Two folders, three notes.
    assert_eq!(second.documents, 5);
    // Only the notes without a freshness marker are written again.
    assert_eq!(second.written, 2);
    assert_eq!(second.unchanged, 3);
    Ok(())
}

#[test]
fn tag_round_trip_with_delete() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let project = ProjectDir::at(tmp.path());
    let notes = project.notes_dir();
    write_note(&notes, "f", "tagged.md", "---\ntags: [a, b]\n---\nbody")?;

    let index = SearchIndex::open_in_ram()?;
    let updater = IndexUpdater::new(&index, &notes, &NoopSink);
    let note = NoteRef::new("f", "tagged.md");
    updater.notes_created(std::slice::from_ref(&note))?;

    assert_eq!(paths(&index, "#a"), vec!["f/tagged.md"]);
    let tags: Vec<String> =
        search::list_tags(&index)?.into_iter().map(|t| t.tag).collect();
    assert_eq!(tags, vec!["a", "b"]);

    std::fs::remove_file(notes.join("f/tagged.md"))?;
    updater.notes_deleted(&[note])?;
    assert!(paths(&index, "#a").is_empty());
    assert!(search::list_tags(&index)?.is_empty());
    Ok(())
}

#[test]
fn rename_moves_search_hits() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let notes = tmp.path().join("notes");
    write_note(&notes, "f", "old.md", "migrating content")?;

    let index = SearchIndex::open_in_ram()?;
    let updater = IndexUpdater::new(&index, &notes, &NoopSink);
    updater.notes_created(&[NoteRef::new("f", "old.md")])?;

    std::fs::rename(notes.join("f/old.md"), notes.join("f/new.md"))?;
    updater.notes_renamed(&[Rename {
        old: NoteRef::new("f", "old.md"),
        new: NoteRef::new("f", "new.md"),
    }])?;

    assert_eq!(paths(&index, "migrating"), vec!["f/new.md"]);
    assert_eq!(paths(&index, "f:new"), vec!["f/new.md"]);
    assert!(paths(&index, "f:old").is_empty());
    Ok(())
}

#[test]
fn rebuild_recreates_index_from_corpus() -> TestResult {
    let (_tmp, project) = hello_goodbye_project()?;
    let index = SearchIndex::open_or_create(&project.index_dir())?;
    indexing::index_all(&index, &project.notes_dir(), &options(), &NoopSink)?;

    write_note(&project.notes_dir(), "folder3", "late.md", "hello again")?;
    let (index, stats) =
        tantivy_index::rebuild(index, &project, &options(), &NoopSink)?;

    assert_eq!(stats.written, 6);
    assert_eq!(
        paths(&index, "hello"),
        vec!["folder1/note1.md", "folder3/late.md"]
    );
    Ok(())
}

#[test]
fn palette_paths_work_without_the_index() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let notes = tmp.path().join("notes");
    write_note(&notes, "user1", "TestNote.md", "x")?;
    write_note(&notes, "user1", "Groceries.md", "x")?;
    write_note(&notes, "work", "chart.png", "x")?;

    let matches = TrigramIndex::build(&notes)?.search("testn");
    assert_eq!(matches[0].path, "user1/TestNote");
    assert_eq!(matches.len(), 1);

    let similar = palette::search_by_similarity(&notes, "groceries")?;
    assert_eq!(similar[0], "user1/Groceries.md");
    Ok(())
}
