//! quire - EPUB inspector

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use quire::navigation::NavPoint;
use quire::pagination::{Paginator, ReadingDirection};
use quire::search::{search_with_options, SearchOptions};
use quire::{ChapterRef, DocumentTree, EpubBook, EpubError};

#[derive(Parser)]
#[command(name = "quire")]
#[command(version, about = "Inspect EPUB containers", long_about = None)]
#[command(after_help = "EXAMPLES:
    quire inspect book.epub           Show package metadata
    quire toc --flat book.epub        List TOC entries with their depth
    quire search book.epub whale      Find text with context snippets")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Fail on a bad mimetype or unreadable navigation
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Package metadata, cover and release identifier
    Inspect { epub: String },
    /// Spine entries in reading order
    Spine { epub: String },
    /// Table of contents
    Toc {
        epub: String,
        /// Flat list with depths instead of a tree
        #[arg(long)]
        flat: bool,
    },
    /// Chapter descriptors in spine order
    Chapters { epub: String },
    /// Chapter XHTML with links rewritten to epub:// URIs
    ChapterHtml {
        epub: String,
        /// Spine index
        index: usize,
    },
    /// Stylesheets scoped to the content root, with column-pagination fix-ups
    Styles { epub: String },
    /// Full-text search over all chapters
    Search {
        epub: String,
        query: String,
        /// Characters of context on each side of a match
        #[arg(long, default_value_t = quire::search::DEFAULT_CONTEXT_CHARS)]
        context: usize,
        /// Stop after this many matches
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Page arithmetic for a scroll offset
    Page {
        /// Column width plus gap
        page_size: f64,
        /// Scroll offset along the reading axis
        offset: f64,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            let rendered = if cli.pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            };
            match rendered {
                Ok(text) => {
                    println!("{text}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::FAILURE
        }
    }
}

fn open(path: &str, strict: bool) -> Result<EpubBook, String> {
    let builder = EpubBook::builder();
    let builder = if strict { builder.strict() } else { builder };
    builder.open_file(path).map_err(display_err)
}

fn display_err(err: EpubError) -> String {
    err.to_string()
}

fn run(cli: &Cli) -> Result<Value, String> {
    match &cli.command {
        Command::Inspect { epub } => {
            let book = open(epub, cli.strict)?;
            let fields: serde_json::Map<String, Value> = book
                .metadata()
                .iter()
                .map(|(name, values)| (name.to_string(), json!(values)))
                .collect();
            let cover = book.cover().map(|c| {
                json!({ "id": c.id, "path": c.path, "media_type": c.media_type, "bytes": c.data.len() })
            });
            Ok(json!({
                "epub": epub,
                "title": book.title(),
                "creators": book.creators(),
                "language": book.language(),
                "release_identifier": book.release_identifier(),
                "cover": cover,
                "metadata": fields,
            }))
        }
        Command::Spine { epub } => {
            let book = open(epub, cli.strict)?;
            let items: Vec<Value> = book
                .spine()
                .items()
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    json!({
                        "index": index,
                        "idref": item.idref,
                        "id": item.id,
                        "linear": item.linear,
                        "properties": item.properties,
                    })
                })
                .collect();
            Ok(json!({ "epub": epub, "count": items.len(), "spine": items }))
        }
        Command::Toc { epub, flat } => {
            let book = open(epub, cli.strict)?;
            let toc: Vec<Value> = if *flat {
                book.navigation()
                    .toc_flat()
                    .into_iter()
                    .map(|(depth, point)| {
                        json!({
                            "depth": depth,
                            "label": point.label,
                            "target": point.target,
                            "children_count": point.children.len(),
                        })
                    })
                    .collect()
            } else {
                book.toc().iter().map(nav_point_json).collect()
            };
            let landmarks: Vec<Value> = book
                .navigation()
                .landmarks
                .iter()
                .map(nav_point_json)
                .collect();
            Ok(json!({
                "epub": epub,
                "count": book.navigation().toc_count(),
                "toc": toc,
                "landmarks": landmarks,
            }))
        }
        Command::Chapters { epub } => {
            let book = open(epub, cli.strict)?;
            let chapters: Vec<Value> = book.chapters().map(|c| chapter_json(&c)).collect();
            Ok(json!({ "epub": epub, "count": chapters.len(), "chapters": chapters }))
        }
        Command::ChapterHtml { epub, index } => {
            let book = open(epub, cli.strict)?;
            let chapter = book.chapter(*index).map_err(display_err)?;
            let html = book.chapter_markup(*index).map_err(display_err)?;
            Ok(json!({ "epub": epub, "chapter": chapter_json(&chapter), "html": html }))
        }
        Command::Styles { epub } => {
            let book = open(epub, cli.strict)?;
            let sheets: Vec<Value> = book
                .stylesheets()
                .into_iter()
                .map(|s| json!({ "key": s.key, "css": s.css }))
                .collect();
            Ok(json!({ "epub": epub, "stylesheets": sheets }))
        }
        Command::Search {
            epub,
            query,
            context,
            limit,
        } => {
            let book = open(epub, cli.strict)?;
            let doc = book.content_document().map_err(display_err)?;
            let Some(root) = doc.content_root() else {
                return Ok(json!({ "epub": epub, "query": query, "matches": [] }));
            };
            let options = SearchOptions::default().with_context_chars(*context);
            let matches: Vec<Value> = search_with_options(&doc, root, query, options)
                .take(limit.unwrap_or(usize::MAX))
                .map(|m| {
                    let anchor = m
                        .anchored_range(&doc)
                        .map(|r| r.start.to_string());
                    json!({
                        "anchor": anchor,
                        "start": m.start,
                        "end": m.end,
                        "context": m.context,
                        "highlighted": m.highlighted,
                    })
                })
                .collect();
            Ok(json!({
                "epub": epub,
                "query": query,
                "count": matches.len(),
                "matches": matches,
            }))
        }
        Command::Page { page_size, offset } => {
            let paginator = Paginator::new(*page_size, ReadingDirection::Horizontal)
                .map_err(|e| e.to_string())?;
            Ok(json!({
                "page_size": page_size,
                "offset": offset,
                "page": paginator.page_from_scroll(*offset),
                "page_start": paginator.align_to_page_start(*offset),
                "page_end": paginator.align_to_page_end(*offset),
                "element_page": paginator.page_of_element(*offset),
            }))
        }
    }
}

fn nav_point_json(point: &NavPoint) -> Value {
    json!({
        "label": point.label,
        "target": point.target,
        "play_order": point.play_order,
        "children": point.children.iter().map(nav_point_json).collect::<Vec<_>>(),
    })
}

fn chapter_json(chapter: &ChapterRef) -> Value {
    json!({
        "index": chapter.index,
        "id": chapter.id,
        "path": chapter.path,
        "uri": chapter.uri,
        "media_type": chapter.media_type,
        "linear": chapter.linear,
    })
}
