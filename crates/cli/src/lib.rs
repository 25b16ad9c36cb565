use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iiif_annotator_core::{
    build_annotation_page, build_annotation_pages, parse_manifest, to_export_json,
    AnnotatorSession, CanvasSave, EXPORT_FILE_NAME,
};
use iiif_model::{SourceType, UserSettings};
use serde::Serialize;
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::ProjectStore;

#[derive(Debug, Parser)]
#[command(name = "iiif-annotator")]
#[command(about = "Transcription annotations for IIIF manifests")]
pub struct Cli {
    /// Directory holding projects and settings.
    #[arg(long, global = true, env = "IIIF_DATA_DIR", value_name = "DIR")]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a machine-readable summary of a manifest file.
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Manage stored projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Import OCR result files into a project, matching files to canvases by name.
    ImportOcr {
        project: String,
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Language tag for imported lines; defaults to the stored setting.
        #[arg(long)]
        language: Option<String>,
    },
    /// Write the manifest with every canvas's annotations embedded.
    Export {
        project: String,
        /// Output file, or `-` for stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write one standalone annotation page per annotated canvas.
    ExportPages {
        project: String,
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,
    },
    /// Show or change user settings.
    Settings {
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        safe_delete: Option<bool>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum ProjectCommand {
    /// Create a project from a local manifest file.
    Create {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
        #[arg(long)]
        name: Option<String>,
        /// URL the manifest was downloaded from; recorded as the project's source.
        #[arg(long, value_name = "URL")]
        source_url: Option<String>,
    },
    /// List projects, most recently updated first.
    List,
    /// Summarize a project's canvases and annotation counts.
    Show { project: String },
    Delete { project: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestSummary {
    id: Option<String>,
    label: String,
    canvas_count: usize,
    canvases: Vec<CanvasSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CanvasSummary {
    index: usize,
    id: String,
    label: String,
    width: Option<f64>,
    height: Option<f64>,
    image: Option<String>,
    annotations: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrImportSummary {
    imported: usize,
    canvases: Vec<usize>,
    errors: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let data = cli.data;

    match cli.command {
        Commands::Inspect { file } => run_inspect(&file),
        Commands::Project { command } => run_project(&open_store(data)?, command),
        Commands::ImportOcr { project, files, language } => {
            run_import_ocr(&open_store(data)?, &project, &files, language)
        }
        Commands::Export { project, output } => {
            run_export(&open_store(data)?, &project, output.as_deref())
        }
        Commands::ExportPages { project, output_dir } => {
            run_export_pages(&open_store(data)?, &project, &output_dir)
        }
        Commands::Settings { language, safe_delete } => {
            run_settings(&open_store(data)?, language, safe_delete)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_store(data: Option<PathBuf>) -> Result<ProjectStore> {
    match data {
        Some(root) => Ok(ProjectStore::with_root(root)),
        None => ProjectStore::from_default_location().context("failed to locate data directory"),
    }
}

fn run_inspect(file: &Path) -> Result<()> {
    let raw = read_json_file(file)?;
    let session = AnnotatorSession::open(raw, &Default::default(), UserSettings::default())
        .context("not a usable IIIF manifest")?;
    print_json(&summarize(&session))
}

fn run_project(store: &ProjectStore, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::Create { manifest, name, source_url } => {
            let raw = read_json_file(&manifest)?;
            let state = parse_manifest(&raw).context("not a usable IIIF manifest")?;
            let name = name.unwrap_or(state.label);
            let (source_type, source_ref) = match source_url {
                Some(url) => (SourceType::ManifestUrl, url),
                None => (SourceType::ManifestFile, manifest.display().to_string()),
            };
            let meta = store.create_project(&name, source_type, &source_ref, &raw)?;
            print_json(&meta)
        }
        ProjectCommand::List => print_json(&store.list_projects()?),
        ProjectCommand::Show { project } => {
            let session = open_project(store, &project)?;
            print_json(&summarize(&session))
        }
        ProjectCommand::Delete { project } => {
            store.delete_project(&project)?;
            println!("deleted:{project}");
            Ok(())
        }
    }
}

fn run_import_ocr(
    store: &ProjectStore,
    project: &str,
    files: &[PathBuf],
    language: Option<String>,
) -> Result<()> {
    let mut session = open_project(store, project)?;
    if let Some(language) = language {
        let settings = UserSettings { default_language: language, ..session.settings().clone() };
        session.set_settings(settings);
    }

    let mut contents = Vec::with_capacity(files.len());
    for file in files {
        let text = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let name = file.file_name().and_then(|name| name.to_str()).unwrap_or_default().to_owned();
        contents.push((name, text));
    }

    let before: usize = session.annotation_counts().iter().sum();
    let (saves, errors) =
        session.import_ocr_files(contents.iter().map(|(name, text)| (name.as_str(), text.as_str())));
    let after: usize = session.annotation_counts().iter().sum();

    write_saves(store, project, &saves)?;

    let summary = OcrImportSummary {
        imported: after - before,
        canvases: saves.iter().map(|save| save.canvas_index).collect(),
        errors: errors.iter().map(ToString::to_string).collect(),
    };
    print_json(&summary)?;

    if saves.is_empty() && !errors.is_empty() {
        anyhow::bail!("no OCR file could be imported");
    }
    Ok(())
}

fn run_export(store: &ProjectStore, project: &str, output: Option<&Path>) -> Result<()> {
    let session = open_project(store, project)?;
    let json = to_export_json(&session.export_manifest())?;

    match output {
        Some(path) if path == Path::new("-") => {
            println!("{json}");
        }
        _ => {
            let path = output.map(ToOwned::to_owned).unwrap_or_else(|| PathBuf::from(EXPORT_FILE_NAME));
            write_file(&path, &json)?;
            tracing::info!(project, path = %path.display(), "exported manifest");
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn run_export_pages(store: &ProjectStore, project: &str, output_dir: &Path) -> Result<()> {
    let session = open_project(store, project)?;
    let pages = build_annotation_pages(session.manifest(), session.annotations_by_canvas());

    for (index, page) in pages {
        let path = output_dir.join(format!("{index}.json"));
        write_file(&path, &to_export_json(&page)?)?;
        println!("{}", path.display());
    }
    Ok(())
}

fn run_settings(store: &ProjectStore, language: Option<String>, safe_delete: Option<bool>) -> Result<()> {
    let mut settings = store.load_settings().context("failed to load settings")?;

    if language.is_some() || safe_delete.is_some() {
        if let Some(language) = language {
            settings.default_language = language;
        }
        if let Some(safe_delete) = safe_delete {
            settings.safe_delete = safe_delete;
        }
        store.save_settings(&settings).context("failed to save settings")?;
    }

    print_json(&settings)
}

fn open_project(store: &ProjectStore, project: &str) -> Result<AnnotatorSession> {
    let stored = store.read_project(project)?;
    let settings = store.load_settings().context("failed to load settings")?;
    tracing::debug!(project, saved_pages = stored.saved_pages.len(), "loaded project");
    AnnotatorSession::open(stored.manifest, &stored.saved_pages, settings)
        .with_context(|| format!("project {project} holds an unusable manifest"))
}

fn write_saves(store: &ProjectStore, project: &str, saves: &[CanvasSave]) -> Result<()> {
    for save in saves {
        let page = build_annotation_page(&save.annotations);
        store
            .write_canvas_annotations(project, save.canvas_index, &page)
            .with_context(|| format!("failed to save annotations for canvas {}", save.canvas_index + 1))?;
    }
    Ok(())
}

fn summarize(session: &AnnotatorSession) -> ManifestSummary {
    let manifest = session.manifest();
    let counts = session.annotation_counts();

    ManifestSummary {
        id: manifest.id.clone(),
        label: manifest.label.clone(),
        canvas_count: manifest.len(),
        canvases: manifest
            .canvases
            .iter()
            .zip(counts)
            .enumerate()
            .map(|(index, (canvas, annotations))| CanvasSummary {
                index,
                id: canvas.id.clone(),
                label: canvas.label.clone(),
                width: canvas.width,
                height: canvas.height,
                image: canvas.image_request_url(),
                annotations,
            })
            .collect(),
    }
}

fn read_json_file(path: &Path) -> Result<Value> {
    ensure_file_exists(path)?;
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
