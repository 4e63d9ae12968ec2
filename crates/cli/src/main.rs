use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gphoto_importer_core::{
    app_paths, generate_plan, load_config, run_plan, Confidence, ExifToolWriter, FfmpegRemuxer,
    ImageCrateTranscoder, ImportOptions, ImportPlan, Outcome, Workers,
};
use std::sync::atomic::AtomicBool;

#[derive(Debug, Parser)]
#[command(name = "gphoto-importer-cli")]
#[command(about = "Google Takeoutの写真・動画をサイドカーJSONと照合して取り込みます")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Import(ImportArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long)]
    takeout_dir: String,
    #[arg(long)]
    output_dir: String,
    #[arg(long)]
    jobs: Option<usize>,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long)]
    exclude_suffix: Vec<String>,
    #[arg(long, default_value_t = false)]
    hash_names: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import(args) => cmd_import(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn cmd_import(args: ImportArgs) -> Result<()> {
    let config = load_config()?;

    let mut extra_edit_suffixes = config.extra_edit_suffixes.clone();
    extra_edit_suffixes.extend(args.exclude_suffix);

    let options = ImportOptions {
        archive_root: args.takeout_dir.into(),
        output_dir: args.output_dir.into(),
        extra_edit_suffixes,
        hash_names: args.hash_names || config.hash_names,
    };

    let plan = generate_plan(&options)?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            print_plan(&plan);
        }
    }

    if !args.apply {
        eprintln!("dry-runモード: 実ファイルは変更していません。取り込むには --apply を指定してください。");
        return Ok(());
    }

    let image = ImageCrateTranscoder;
    let video = FfmpegRemuxer::default();
    let tags = ExifToolWriter::default();
    let workers = Workers {
        image: &image,
        video: &video,
        tags: &tags,
    };
    let abort = AtomicBool::new(false);
    let jobs = args.jobs.or(config.default_jobs);
    let summary = run_plan(&plan, &workers, jobs, &abort)?;

    eprintln!(
        "取り込み完了: 変換 {}件 / メタデータなし {}件 / 失敗 {}件 (未対応 {} / デコード {} / 書き込み {})",
        summary.converted,
        summary.converted_without_metadata,
        summary.failed,
        summary.unsupported_format,
        summary.decode_failures,
        summary.write_failures
    );
    for result in &summary.results {
        if let Outcome::Failed(error) = &result.outcome {
            eprintln!("  失敗: {} ({})", result.source_path.display(), error);
        }
    }

    if !summary.all_succeeded() {
        anyhow::bail!(
            "一部のファイルを取り込めませんでした: 失敗 {}件 / 中断 {}件",
            summary.failed,
            summary.aborted
        );
    }
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_plan(plan: &ImportPlan) {
    println!("元ファイル -> 出力先 (confidence)");
    for item in &plan.items {
        println!(
            "{} -> {} ({})",
            item.pair.asset.path.display(),
            item.target_path.display(),
            confidence_label(item.pair.confidence)
        );
    }

    let stats = &plan.stats;
    println!(
        "\n集計: scanned={} images={} videos={} sidecars={} malformed={} albums={}",
        stats.scan.scanned_files,
        stats.scan.images,
        stats.scan.videos,
        stats.parsed_sidecars,
        stats.malformed_sidecars,
        stats.matches.album_sidecars
    );
    println!(
        "照合: exact={} truncated={} duplicate_resolved={} unmatched={} (ambiguous={} unbound_sidecars={})",
        stats.matches.exact,
        stats.matches.truncated,
        stats.matches.duplicate_resolved,
        stats.matches.unmatched,
        stats.matches.ambiguous,
        stats.matches.unbound_sidecars
    );
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Exact => "exact",
        Confidence::Truncated => "truncated",
        Confidence::DuplicateResolved => "duplicate-resolved",
        Confidence::Unmatched => "unmatched",
    }
}
