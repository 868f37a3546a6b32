use std::path::PathBuf;

use eyre::{bail, eyre, Result, WrapErr};
use libtrees::{ser::WriteMode, table::InventoryTable, zone::ZoneConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: libtrees <zone.json> [--table <table.txt> --pattern <regex>] [--write | --overwrite]";

struct Args {
    zone: PathBuf,
    table: Option<(PathBuf, String)>,
    mode: WriteMode,
}

impl Args {
    fn from_args() -> Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut zone = None;
        let mut table = None;
        let mut pattern = None;
        let mut mode = WriteMode::DryRun;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--table" => table = Some(PathBuf::from(args.next().ok_or_else(|| eyre!(USAGE))?)),
                "--pattern" => pattern = Some(args.next().ok_or_else(|| eyre!(USAGE))?),
                "--write" => mode = WriteMode::Create,
                "--overwrite" => mode = WriteMode::Overwrite,
                _ if zone.is_none() && !arg.starts_with("--") => zone = Some(PathBuf::from(&arg)),
                _ => bail!("unexpected argument `{arg}`\n{USAGE}"),
            }
        }

        let table = match (table, pattern) {
            (Some(table), Some(pattern)) => Some((table, pattern)),
            (None, None) => None,
            _ => bail!("--table and --pattern go together\n{USAGE}"),
        };
        Ok(Self {
            zone: zone.ok_or_else(|| eyre!(USAGE))?,
            table,
            mode,
        })
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("libtrees=info")))
        .init();

    let args = Args::from_args()?;
    let zone = ZoneConfig::open(&args.zone).wrap_err_with(|| format!("loading {}", args.zone.display()))?;
    let svg = zone
        .svg
        .as_ref()
        .ok_or_else(|| eyre!("{} has no `svg` entry", args.zone.display()))?;
    let content = std::fs::read_to_string(svg).wrap_err_with(|| format!("reading {}", svg.display()))?;

    let table = match &args.table {
        Some((path, pattern)) => {
            let text = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
            InventoryTable::parse(&text, pattern)?
        }
        None => InventoryTable::default(),
    };

    let (mut assignments, mut geojson) = (Vec::<u8>::new(), Vec::<u8>::new());
    let outcome = libtrees::extract_zone(&content, &zone, table, &mut assignments, &mut geojson)
        .wrap_err_with(|| format!("extracting zone `{}`", zone.name))?;
    args.mode.persist(&[
        (format!("{}.assignments.json", zone.name), assignments),
        (format!("{}.geojson", zone.name), geojson),
    ])?;

    for matched in outcome.ambiguous() {
        tracing::warn!(
            label = %matched.label.id,
            x = matched.label.coords.x,
            y = matched.label.coords.y,
            distance = ?matched.distance,
            "verify"
        );
    }
    tracing::info!(
        labels = outcome.labels.len(),
        conflicts = outcome.conflicts.len(),
        unmatched = outcome.unmatched().count(),
        mode = ?args.mode,
        "done"
    );
    Ok(())
}
