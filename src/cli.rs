use crate::config::{Config, load_config};
use crate::export::{
    ArtifactSink, DirectorySink, ExportFormat, ExportTarget, Exporter, StdoutSink,
    ensure_extension,
};
use crate::presets::parse_aspect;
use crate::renderer::{CommandRenderer, RenderSettings, render_or_placeholder};
use crate::theme::ThemeName;
use anyhow::Result;
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "mmdx",
    version,
    about = "Export rendered Mermaid diagrams to SVG, PNG or JPG"
)]
pub struct Args {
    /// Input file (.svg, .mmd, .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file or directory. SVG goes to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format (svg, png, jpg). Inferred from the output extension if omitted.
    #[arg(short = 'e', long = "outputFormat")]
    pub format: Option<ExportFormat>,

    /// Pixel scale for raster output
    #[arg(short = 's', long = "scale")]
    pub scale: Option<f64>,

    /// Background color
    #[arg(short = 'b', long = "backgroundColor")]
    pub background: Option<String>,

    /// Minimum aspect ratio: 3:2, 4:3, 16:9, W:H or a number
    #[arg(short = 'a', long = "aspect", value_parser = parse_aspect)]
    pub aspect: Option<f64>,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Command that renders diagram source to SVG
    #[arg(long = "renderer")]
    pub renderer: Option<String>,

    /// Diagram theme passed to the renderer
    #[arg(long = "theme")]
    pub theme: Option<ThemeName>,

    /// Keep translucent label backgrounds translucent
    #[arg(long = "no-precompose")]
    pub no_precompose: bool,

    /// Upper bound on waiting for fonts
    #[arg(long = "font-timeout-ms")]
    pub font_timeout_ms: Option<u64>,

    /// Extra font directory (repeatable)
    #[arg(long = "font-dir")]
    pub font_dirs: Vec<PathBuf>,

    /// More log output (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Svg,
    Diagram,
    Markdown,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose, args.quiet);

    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);

    let (input, mut kind) = read_input(args.input.as_deref())?;
    if args.renderer.is_some() && kind != InputKind::Markdown {
        kind = InputKind::Diagram;
    }
    let documents = match kind {
        InputKind::Svg => vec![input],
        InputKind::Diagram => vec![render(&config, &input)],
        InputKind::Markdown => extract_mermaid_blocks(&input)
            .iter()
            .map(|block| render(&config, block))
            .collect(),
    };
    if documents.is_empty() {
        return Err(anyhow::anyhow!("No Mermaid diagrams found in input"));
    }

    let exporter = Exporter::new(config.clone());
    let target = ExportTarget::from_config(&config);
    let count = documents.len();
    let mut sink = resolve_sink(args.output.as_deref(), target.format, count);
    for (idx, svg) in documents.iter().enumerate() {
        let mut target = target.clone();
        if count > 1 {
            target.filename = format!("{}-{}", target.filename, idx + 1);
        }
        let mut artifact = exporter.export(svg, &target)?;
        if count == 1
            && let Some(name) = output_file_name(args.output.as_deref(), target.format)
        {
            artifact.filename = name;
        }
        sink.deliver(&artifact)?;
        log::info!(
            "{} ({}x{}, {} bytes)",
            artifact.filename,
            artifact.width,
            artifact.height,
            artifact.bytes.len()
        );
    }
    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) {
    let inferred = args
        .output
        .as_deref()
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse::<ExportFormat>().ok());
    if let Some(format) = args.format.or(inferred) {
        config.export.format = format;
    }
    if let Some(scale) = args.scale {
        config.export.scale = scale;
    }
    if let Some(background) = &args.background {
        config.export.background = background.clone();
    }
    if args.aspect.is_some() {
        config.export.aspect = args.aspect;
    }
    if let Some(stem) = args
        .output
        .as_deref()
        .filter(|p| !p.is_dir())
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
    {
        config.export.filename = stem.to_string();
    }
    if let Some(renderer) = &args.renderer {
        let mut parts = renderer.split_whitespace().map(str::to_string);
        if let Some(program) = parts.next() {
            config.render.command = program;
            config.render.args = parts.collect();
        }
    }
    if let Some(theme) = args.theme {
        config.render.theme = theme;
    }
    if args.no_precompose {
        config.flatten.precompose = false;
    }
    if let Some(timeout) = args.font_timeout_ms {
        config.fonts.timeout_ms = timeout;
    }
    config.fonts.font_dirs.extend(args.font_dirs.iter().cloned());
}

/// The `-o` file name, kept only when its extension matches `format`.
fn output_file_name(output: Option<&Path>, format: ExportFormat) -> Option<String> {
    let name = output
        .filter(|p| !p.is_dir())
        .and_then(Path::file_name)?
        .to_string_lossy()
        .into_owned();
    if ensure_extension(&name, format) == name {
        Some(name)
    } else {
        log::warn!("'{name}' does not end in .{format}, writing the {format} file under its stem");
        None
    }
}

fn render(config: &Config, source: &str) -> String {
    let renderer = CommandRenderer::from_config(&config.render);
    let settings = RenderSettings::from_config(&config.render);
    log::debug!("rendering diagram with '{}'", renderer.program());
    render_or_placeholder(&renderer, source, &settings)
}

fn resolve_sink(output: Option<&Path>, format: ExportFormat, count: usize) -> Box<dyn ArtifactSink> {
    match output {
        Some(path) if path.is_dir() => Box::new(DirectorySink::new(path)),
        Some(path) => {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            Box::new(DirectorySink::new(parent))
        }
        None if format == ExportFormat::Svg && count == 1 => Box::new(StdoutSink),
        None => Box::new(DirectorySink::new(".")),
    }
}

fn read_input(path: Option<&Path>) -> Result<(String, InputKind)> {
    let from_stdin = || -> Result<(String, InputKind)> {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let kind = sniff_kind(&buf);
        Ok((buf, kind))
    };
    let Some(path) = path.filter(|p| *p != Path::new("-")) else {
        return from_stdin();
    };

    let content = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let kind = match ext.as_deref() {
        Some("svg") => InputKind::Svg,
        Some("md" | "markdown") => InputKind::Markdown,
        Some("mmd" | "mermaid") => InputKind::Diagram,
        _ => sniff_kind(&content),
    };
    Ok((content, kind))
}

fn sniff_kind(content: &str) -> InputKind {
    if content.trim_start().starts_with('<') {
        InputKind::Svg
    } else {
        InputKind::Diagram
    }
}

fn extract_mermaid_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut open: Option<(&'static str, Vec<&str>)> = None;

    for line in input.lines() {
        let trimmed = line.trim();
        if let Some((fence, body)) = open.as_mut() {
            if trimmed
                .strip_prefix(*fence)
                .is_some_and(|rest| rest.trim().is_empty())
            {
                blocks.push(body.join("\n"));
                open = None;
            } else {
                body.push(line);
            }
        } else if let Some(fence) = mermaid_fence(trimmed) {
            open = Some((fence, Vec::new()));
        }
    }

    blocks
}

fn mermaid_fence(line: &str) -> Option<&'static str> {
    ["```", "~~~", ":::"].into_iter().find(|fence| {
        let marker = fence.chars().next().unwrap_or('`');
        line.starts_with(fence)
            && line
                .trim_start_matches(marker)
                .trim()
                .starts_with("mermaid")
    })
}

static LOGGER: SimpleLogger = SimpleLogger;

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let target = if record.target().is_empty() {
            record.module_path().unwrap_or_default()
        } else {
            record.target()
        };
        let label = match record.level() {
            log::Level::Error => "Error",
            log::Level::Warn => "Warning",
            log::Level::Info => "Info",
            log::Level::Debug => "Debug",
            log::Level::Trace => "Trace",
        };
        eprintln!("{label} (in {target}): {}", record.args());
    }

    fn flush(&self) {}
}

fn init_logger(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => log::LevelFilter::Error,
        (false, 0) => log::LevelFilter::Warn,
        (false, 1) => log::LevelFilter::Info,
        (false, 2) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
