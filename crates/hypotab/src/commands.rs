use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hypoconf::{ConfigSources, HypoConfig};
use melodic_features::{
    export_corpus, read_entropy_file, read_information_content_file, Corpus, FeaturePipeline,
    Occurrence, PipelineInputs, TableFormat, TwoFactorModel,
};
use tracing::info;

/// Command-line values; each falls back to the config when absent.
pub struct BuildArgs {
    pub corpus: Option<PathBuf>,
    pub occurrences: Option<PathBuf>,
    pub information_content: Option<PathBuf>,
    pub entropy: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<TableFormat>,
}

fn model_from_config(config: &HypoConfig) -> TwoFactorModel {
    let e = &config.expectancy;
    TwoFactorModel {
        max_implicative: e.max_implicative,
        max_realized: e.max_realized,
        tritone: e.tritone,
        return_tolerance: e.return_tolerance,
        return_weight: e.return_weight,
    }
}

fn load_corpus(arg: Option<PathBuf>, config: &HypoConfig) -> Result<Corpus> {
    let path = arg
        .or_else(|| config.inputs.corpus.clone())
        .context("no corpus given (use --corpus or set inputs.corpus)")?;
    let corpus = Corpus::load_json(&path)
        .with_context(|| format!("loading corpus {}", path.display()))?;
    info!(path = %path.display(), melodies = corpus.len(), "loaded corpus");
    Ok(corpus)
}

pub fn build(config: &HypoConfig, args: BuildArgs) -> Result<()> {
    let corpus = load_corpus(args.corpus, config)?;

    let occurrences_path = args
        .occurrences
        .or_else(|| config.inputs.occurrences.clone())
        .context("no occurrences given (use --occurrences or set inputs.occurrences)")?;
    let occurrences = Occurrence::load(&occurrences_path, config.occurrences_delimiter()?)
        .with_context(|| format!("loading occurrences {}", occurrences_path.display()))?;
    info!(path = %occurrences_path.display(), count = occurrences.len(), "loaded occurrences");

    let mut inputs = PipelineInputs::default();
    if let Some(path) = args
        .information_content
        .or_else(|| config.inputs.information_content.clone())
    {
        let rows = read_information_content_file(&path, config.information_content_delimiter()?)
            .with_context(|| format!("reading information content {}", path.display()))?;
        info!(path = %path.display(), rows = rows.len(), "loaded information content");
        inputs.information_content = Some(rows);
    }
    if let Some(path) = args.entropy.or_else(|| config.inputs.entropy.clone()) {
        let rows = read_entropy_file(&path, config.entropy_delimiter()?)
            .with_context(|| format!("reading entropy {}", path.display()))?;
        info!(path = %path.display(), rows = rows.len(), "loaded entropy");
        inputs.entropy = Some(rows);
    }

    let run = FeaturePipeline::new(model_from_config(config))
        .run(corpus, occurrences, inputs)
        .context("computing features")?;

    let format = match args.format {
        Some(format) => format,
        None => config
            .output
            .format
            .parse()
            .map_err(anyhow::Error::msg)
            .context("output.format")?,
    };
    let output = args.output.or_else(|| config.output.path.clone());

    match &output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_table(&run.table, format, config, std::io::BufWriter::new(file))?;
            info!(
                path = %path.display(),
                rows = run.table.len(),
                %format,
                "wrote hypothesis table"
            );
        }
        None => {
            let stdout = std::io::stdout();
            write_table(&run.table, format, config, stdout.lock())?;
        }
    }

    Ok(())
}

fn write_table<W: Write>(
    table: &melodic_features::HypothesisTable,
    format: TableFormat,
    config: &HypoConfig,
    writer: W,
) -> Result<()> {
    match format {
        TableFormat::Csv => {
            table.write_csv(writer, config.output_delimiter()?, &config.output.missing_value)?
        }
        TableFormat::Json => table.write_json(writer)?,
    }
    Ok(())
}

pub fn export_mcsv(
    config: &HypoConfig,
    corpus: Option<PathBuf>,
    out_dir: &Path,
    ticks: Option<u32>,
) -> Result<()> {
    let corpus = load_corpus(corpus, config)?;
    let ticks = ticks.unwrap_or(config.formats.mcsv_ticks);
    let written = export_corpus(&corpus, out_dir, ticks)
        .with_context(|| format!("exporting MCSV to {}", out_dir.display()))?;
    info!(files = written.len(), dir = %out_dir.display(), "mcsv export finished");
    Ok(())
}

pub fn show_config(config: &HypoConfig, sources: &ConfigSources) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for file in &sources.files {
        writeln!(stdout, "# loaded: {}", file.display())?;
    }
    for var in &sources.env_overrides {
        writeln!(stdout, "# env: {}", var)?;
    }
    write!(stdout, "{}", config.to_toml()?)?;
    Ok(())
}
