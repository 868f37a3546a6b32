use std::path::PathBuf;

use eyre::{bail, eyre, Result, WrapErr};
use libtrees::{ser::WriteMode, zone::ZoneConfig, VegetationOptions};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: vegetation <zone.json> <out.geojson> [--rate <units>] [--threshold <degrees>]";

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("libtrees=info")))
        .init();

    let mut options = VegetationOptions::default();
    let mut paths = vec![];

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rate" => {
                let rate = args.next().ok_or_else(|| eyre!(USAGE))?;
                options.rate = rate.parse().wrap_err_with(|| format!("--rate `{rate}`"))?;
            }
            "--threshold" => {
                let threshold = args.next().ok_or_else(|| eyre!(USAGE))?;
                options.threshold = threshold
                    .parse()
                    .wrap_err_with(|| format!("--threshold `{threshold}`"))?;
            }
            flag if flag.starts_with("--") => bail!("unexpected argument `{flag}`\n{USAGE}"),
            path => paths.push(PathBuf::from(path)),
        }
    }
    let [zone_path, out_path] = <[PathBuf; 2]>::try_from(paths).map_err(|_| eyre!(USAGE))?;
    options.validate()?;

    let zone = ZoneConfig::open(&zone_path).wrap_err_with(|| format!("loading {}", zone_path.display()))?;
    let svg = zone
        .svg
        .as_ref()
        .ok_or_else(|| eyre!("{} has no `svg` entry", zone_path.display()))?;
    let content = std::fs::read_to_string(svg).wrap_err_with(|| format!("reading {}", svg.display()))?;

    let mut output = Vec::<u8>::new();
    let lines = libtrees::extract_vegetation(&content, &zone, &options, &mut output)?;
    WriteMode::Overwrite
        .persist(&[(&out_path, output)])
        .wrap_err_with(|| format!("writing {}", out_path.display()))?;

    tracing::info!(lines = lines.len(), out = %out_path.display(), "done");
    Ok(())
}
