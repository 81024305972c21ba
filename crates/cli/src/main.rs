mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use facecloak_core::detection::domain::face_detector::FaceDetector;
use facecloak_core::detection::domain::face_embedder::FaceEmbedder;
use facecloak_core::detection::face_recognizer::FaceRecognizer;
use facecloak_core::detection::infrastructure::onnx_arcface_embedder::OnnxArcFaceEmbedder;
use facecloak_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facecloak_core::filtering::domain::filter_config::{FilterConfig, FilterMode};
use facecloak_core::filtering::infrastructure::sticker::load_sticker;
use facecloak_core::pipeline::job::Job;
use facecloak_core::pipeline::job_worker::{spawn_job, JobMessage};
use facecloak_core::pipeline::output_promoter::promote_output;
use facecloak_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecloak_core::registry::domain::image_source::ImageSource;
use facecloak_core::registry::domain::registry_store::RegistryStore;
use facecloak_core::registry::face_registry::FaceRegistry;
use facecloak_core::registry::infrastructure::json_registry_store::JsonRegistryStore;
use facecloak_core::shared::constants::{
    DETECTOR_MODEL_NAME, EMBEDDING_MODEL_NAME, VIDEO_EXTENSIONS,
};
use facecloak_core::shared::face_id::FaceId;
use facecloak_core::shared::model_resolver::ModelResolver;
use facecloak_core::tracking::domain::tracker_config::TrackerConfig;
use facecloak_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facecloak_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

use settings::Settings;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Hide, pixelate or replace faces in videos, with an identity registry
/// for per-person stickers.
#[derive(Parser)]
#[command(name = "facecloak", version)]
struct Cli {
    /// Registry file (defaults to the platform data directory).
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Extra directory searched for model files.
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Download URL for the face detection model if it isn't cached.
    #[arg(long, global = true)]
    detector_url: Option<String>,

    /// Download URL for the face embedding model if it isn't cached.
    #[arg(long, global = true)]
    embedder_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage registered people.
    #[command(subcommand)]
    Person(PersonCommand),
    /// Manage a person's reference face images.
    #[command(subcommand)]
    Encoding(EncodingCommand),
    /// Filter every face in a video.
    Process(ProcessArgs),
    /// Show or create the settings file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum PersonCommand {
    Add { name: String },
    List,
    Rename { id: FaceId, name: String },
    Delete { id: FaceId },
}

#[derive(Subcommand)]
enum EncodingCommand {
    /// Add one encoding per image; images without exactly one face are skipped.
    Add {
        id: FaceId,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    Remove { id: FaceId, reference: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    /// Write the current settings (defaults if none) to the settings file.
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Blur,
    Pixelate,
    Identity,
}

impl From<Mode> for FilterMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Blur => FilterMode::BlurAll,
            Mode::Pixelate => FilterMode::PixelateAll,
            Mode::Identity => FilterMode::IdentityAware,
        }
    }
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Source video.
    input: PathBuf,

    /// Where the filtered video is written.
    output: PathBuf,

    #[arg(long, value_enum, default_value = "blur")]
    mode: Mode,

    /// Sticker for a registered person in identity mode, as ID=IMAGE.
    #[arg(long = "sticker", value_parser = parse_sticker)]
    stickers: Vec<(FaceId, PathBuf)>,

    /// Blur kernel as a fraction of the face size, in (0, 1].
    #[arg(long)]
    blur_strength: Option<f64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Embedding distance below which a face counts as a registered person.
    #[arg(long)]
    match_threshold: Option<f32>,

    /// Consecutive matching frames needed to confirm an identity.
    #[arg(long)]
    confirm_frames: Option<usize>,

    /// Also copy the result into this directory under a timestamped name.
    #[arg(long)]
    promote_to: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> CliResult {
    let cli = Cli::parse();
    let mut settings = Settings::load();
    apply_global_overrides(&cli, &mut settings);

    match cli.command {
        Command::Person(cmd) => run_person(cmd, &settings),
        Command::Encoding(cmd) => run_encoding(cmd, &settings),
        Command::Process(args) => run_process(args, settings),
        Command::Config(cmd) => run_config(cmd, &settings),
    }
}

fn apply_global_overrides(cli: &Cli, settings: &mut Settings) {
    if cli.registry.is_some() {
        settings.registry_path = cli.registry.clone();
    }
    if cli.model_dir.is_some() {
        settings.model_dir = cli.model_dir.clone();
    }
    if cli.detector_url.is_some() {
        settings.detector_url = cli.detector_url.clone();
    }
    if cli.embedder_url.is_some() {
        settings.embedder_url = cli.embedder_url.clone();
    }
}

// ── Registry ─────────────────────────────────────────────────────────

fn open_store(settings: &Settings) -> CliResult<JsonRegistryStore> {
    let path = match &settings.registry_path {
        Some(path) => path.clone(),
        None => JsonRegistryStore::default_path().ok_or("could not determine data directory")?,
    };
    Ok(JsonRegistryStore::new(path))
}

fn load_registry(store: &JsonRegistryStore) -> CliResult<FaceRegistry> {
    Ok(FaceRegistry::from_snapshot(store.load()?))
}

fn run_person(cmd: PersonCommand, settings: &Settings) -> CliResult {
    let store = open_store(settings)?;
    let registry = load_registry(&store)?;

    match cmd {
        PersonCommand::Add { name } => {
            let person = registry.add_person(&name);
            store.save(&registry.snapshot())?;
            println!("{}\t{}", person.face_id, person.face_name);
        }
        PersonCommand::List => {
            for person in registry.people() {
                println!(
                    "{}\t{}\t{} encodings",
                    person.face_id,
                    person.face_name,
                    person.encoding_list.len()
                );
            }
        }
        PersonCommand::Rename { id, name } => {
            registry.rename_person(id, &name)?;
            store.save(&registry.snapshot())?;
        }
        PersonCommand::Delete { id } => {
            let person = registry.delete_person(id)?;
            store.save(&registry.snapshot())?;
            log::info!("Deleted {} ({})", person.face_name, person.face_id);
        }
    }
    Ok(())
}

fn run_encoding(cmd: EncodingCommand, settings: &Settings) -> CliResult {
    let store = open_store(settings)?;
    let registry = load_registry(&store)?;

    match cmd {
        EncodingCommand::Add { id, images } => {
            if !registry.contains(id) {
                return Err(format!("no person with id {id}").into());
            }
            let resolver = model_resolver(settings)?;
            let detector = build_detector(&resolver, settings)?;
            let embedder = build_embedder(&resolver, settings)?;

            let sources: Vec<_> = images.iter().map(|p| ImageSource::Path(p)).collect();
            let report =
                registry.enroll_images(id, &sources, detector.as_ref(), embedder.as_ref(), &|| {
                    false
                })?;
            store.save(&registry.snapshot())?;

            for reference in &report.accepted {
                println!("added\t{reference}");
            }
            for reference in &report.rejected {
                println!("skipped\t{reference}");
            }
        }
        EncodingCommand::Remove { id, reference } => {
            registry.remove_encoding(id, &reference)?;
            store.save(&registry.snapshot())?;
        }
    }
    Ok(())
}

// ── Models ───────────────────────────────────────────────────────────

fn model_resolver(settings: &Settings) -> CliResult<ModelResolver> {
    let mut resolver = ModelResolver::with_default_cache()?;
    if let Some(dir) = &settings.model_dir {
        resolver = resolver.with_search_dir(dir);
    }
    Ok(resolver)
}

fn build_detector(resolver: &ModelResolver, settings: &Settings) -> CliResult<Arc<dyn FaceDetector>> {
    log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
    let path = resolver.resolve(
        DETECTOR_MODEL_NAME,
        settings.detector_url.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    Ok(Arc::new(OnnxYoloDetector::new(&path, settings.confidence)?))
}

fn build_embedder(resolver: &ModelResolver, settings: &Settings) -> CliResult<Arc<dyn FaceEmbedder>> {
    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let path = resolver.resolve(
        EMBEDDING_MODEL_NAME,
        settings.embedder_url.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    Ok(Arc::new(OnnxArcFaceEmbedder::new(&path)?))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}

// ── Processing ───────────────────────────────────────────────────────

fn run_process(args: ProcessArgs, mut settings: Settings) -> CliResult {
    validate(&args)?;
    if let Some(v) = args.blur_strength {
        settings.blur_strength = v;
    }
    if let Some(v) = args.confidence {
        settings.confidence = v;
    }
    if let Some(v) = args.match_threshold {
        settings.match_threshold = v;
    }
    if let Some(v) = args.confirm_frames {
        settings.confirm_frames = v;
    }

    let tracker_config = TrackerConfig::new(
        settings.iou_threshold,
        settings.max_missed,
        settings.match_threshold,
        settings.confirm_frames,
    )?;
    let mode = FilterMode::from(args.mode);
    let mut filter_config = FilterConfig::new(mode).with_blur_strength(settings.blur_strength)?;
    for (id, path) in &args.stickers {
        filter_config = filter_config.with_sticker(*id, Arc::new(load_sticker(path)?));
    }

    let resolver = model_resolver(&settings)?;
    let detector = build_detector(&resolver, &settings)?;
    eprintln!();

    let mut job = Job::new(
        &args.input,
        &args.output,
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new()),
        detector,
    )
    .with_tracker_config(tracker_config)
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    if mode == FilterMode::IdentityAware {
        let store = open_store(&settings)?;
        let registry = Arc::new(load_registry(&store)?);
        if registry.people().is_empty() {
            log::warn!("Registry is empty; every face will be blurred");
        }
        for (id, _) in &args.stickers {
            if !registry.contains(*id) {
                log::warn!("Sticker given for unknown person {id}");
            }
        }
        let embedder = build_embedder(&resolver, &settings)?;
        job = job.with_identity(Arc::new(FaceRecognizer::new(embedder, registry)));
    }

    let handle = spawn_job(job, filter_config);
    let mut outcome = None;
    for message in handle.messages.iter() {
        match message {
            JobMessage::Progress(fraction) => {
                eprint!("\rProcessing... {:.1}%", fraction * 100.0);
            }
            other => outcome = Some(other),
        }
    }
    eprintln!();
    let job = handle.join().map_err(|_| "worker thread panicked")?;

    match outcome {
        Some(JobMessage::Completed(path)) => {
            println!("{}", path.display());
            if let Some(dir) = &args.promote_to {
                let promoted = promote_output(&job, dir)?;
                println!("{}", promoted.display());
            }
            Ok(())
        }
        Some(JobMessage::Canceled) => Err("job canceled".into()),
        Some(JobMessage::Failed(e)) => Err(e.into()),
        _ => Err("job ended without a result".into()),
    }
}

fn validate(args: &ProcessArgs) -> CliResult {
    if !args.input.exists() {
        return Err(format!("Input file not found: {}", args.input.display()).into());
    }
    if !is_video(&args.output) {
        return Err(format!(
            "Output must have a video extension ({}): {}",
            VIDEO_EXTENSIONS.join(", "),
            args.output.display()
        )
        .into());
    }
    if let Some(c) = args.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(format!("Confidence must be between 0.0 and 1.0, got {c}").into());
        }
    }
    if !args.stickers.is_empty() && !matches!(args.mode, Mode::Identity) {
        log::warn!("--sticker only applies in identity mode");
    }
    Ok(())
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_sticker(value: &str) -> Result<(FaceId, PathBuf), String> {
    let (id, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=IMAGE, got '{value}'"))?;
    let id = id
        .trim()
        .parse::<FaceId>()
        .map_err(|e| format!("bad person id '{id}': {e}"))?;
    if path.is_empty() {
        return Err(format!("missing image path in '{value}'"));
    }
    Ok((id, PathBuf::from(path)))
}

// ── Settings ─────────────────────────────────────────────────────────

fn run_config(cmd: ConfigCommand, settings: &Settings) -> CliResult {
    match cmd {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        ConfigCommand::Init => {
            let path = Settings::config_path().ok_or("could not determine config directory")?;
            settings.save_to(&path)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
