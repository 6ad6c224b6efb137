use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use clap::{Arg, App, ArgMatches, SubCommand};
use fern;
use log::info;

use hic_store::genome;
use hic_store::{create_dataset_from_pairs, open_dataset};
use hic_store::{Dataset, DumpFormat, DumpKind, HiCZoom, MatrixZoomData, MissingData, NormalizationType, StoreConfig, Unit};


fn setup_logging(verbosity: u64, log_file: &Path) -> Result<(), fern::InitError> {
    let mut base_config = fern::Dispatch::new();

    base_config = match verbosity {
        0 => base_config.level(log::LevelFilter::Info),
        1 => base_config.level(log::LevelFilter::Debug),
        _ => base_config.level(log::LevelFilter::Trace),
    };

    let file_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(log_file)?);

    // stdout carries dumps
    let stderr_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%H:%M"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(io::stderr());

    base_config
        .chain(file_config)
        .chain(stderr_config)
        .apply()?;

    Ok(())
}

fn dataset_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("dataset")
        .short("d")
        .long("dataset")
        .value_name("FILE")
        .takes_value(true)
        .required(true)
        .help("Dataset in hdf5 format created by the build subcommand.")
}

fn resolution_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(
            Arg::with_name("rsln")
                .short("r")
                .long("rsln")
                .value_name("INT")
                .takes_value(true)
                .required(true)
                .help("Bin size of the resolution to query.")
        )
        .arg(
            Arg::with_name("unit")
                .short("u")
                .long("unit")
                .possible_values(&["BP", "FRAG"])
                .default_value("BP")
                .help("Unit of the bin size.")
        )
        .arg(
            Arg::with_name("norm")
                .short("n")
                .long("norm")
                .possible_values(&["NONE", "VC", "VC_SQRT", "KR", "GW_KR", "GW_VC", "INTER_KR", "INTER_VC"])
                .default_value("NONE")
                .help("Normalization applied to the counts.")
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .takes_value(true)
                .help("Output file, stdout by default.")
        )
}

fn format_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("format")
        .short("f")
        .long("format")
        .possible_values(&["text", "binary"])
        .default_value("text")
        .help("Output format: tab separated text or little-endian binary.")
}

fn store_config(matches: &ArgMatches) -> Result<StoreConfig, Box<dyn Error>> {
    let mut config = StoreConfig::default();
    if let Some(n) = matches.value_of("max-loads") {
        config = config.with_max_concurrent_block_loads(n.parse()?);
    }
    if let Some(n) = matches.value_of("cache-size") {
        config = config.with_block_cache_capacity(n.parse()?);
    }
    if let Some(n) = matches.value_of("pearson-limit") {
        config = config.with_pearson_bin_limit(n.parse()?);
    }
    if matches.is_present("no-cache") {
        config = config.without_caching();
    }
    Ok(config)
}

fn zoom_of(matches: &ArgMatches) -> Result<HiCZoom, Box<dyn Error>> {
    let unit = matches.value_of("unit").unwrap_or("BP").parse::<Unit>()?;
    let bin_size = matches.value_of("rsln").ok_or("resolution is required")?.parse::<u32>()?;
    Ok(HiCZoom::new(unit, bin_size))
}

fn norm_of(matches: &ArgMatches) -> Result<NormalizationType, Box<dyn Error>> {
    Ok(matches.value_of("norm").unwrap_or("NONE").parse::<NormalizationType>()?)
}

fn output_of(matches: &ArgMatches) -> Result<Box<dyn Write>, Box<dyn Error>> {
    Ok(match matches.value_of("output") {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn chromosome_index(dataset: &Dataset, name: &str) -> Result<usize, Box<dyn Error>> {
    genome::find_by_name(dataset.get_chromosomes(), name)
        .map(|c| c.get_index())
        .ok_or_else(|| format!("Unknown chromosome {}", name).into())
}

fn zoom_data(dataset: &Dataset, chr1: &str, chr2: &str, zoom: HiCZoom) -> Result<Arc<MatrixZoomData>, Box<dyn Error>> {
    let (c1, c2) = (chromosome_index(dataset, chr1)?, chromosome_index(dataset, chr2)?);
    let matrix = dataset.matrix(c1, c2)?.ok_or(MissingData::Matrix(c1, c2))?;
    Ok(matrix.zoom_data(zoom).ok_or(MissingData::Zoom(zoom))?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let matches = App::new("hic-store")
        .version("0.1.0")
        .author("Pavel Avdeyev")
        .about("Storage and retrieval of block-partitioned multi-resolution Hi-C contact matrices.")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity.")
        )
        .arg(
            Arg::with_name("log")
                .long("log")
                .value_name("FILE")
                .takes_value(true)
                .default_value("hic-store.log")
                .help("Log file.")
        )
        .arg(
            Arg::with_name("max-loads")
                .long("max-loads")
                .value_name("INT")
                .takes_value(true)
                .help("Maximum number of blocks read in parallel.")
        )
        .arg(
            Arg::with_name("cache-size")
                .long("cache-size")
                .value_name("INT")
                .takes_value(true)
                .help("Number of blocks kept in memory per resolution.")
        )
        .arg(
            Arg::with_name("pearson-limit")
                .long("pearson-limit")
                .value_name("INT")
                .takes_value(true)
                .help("Largest number of bins for which Pearson's correlations are computed.")
        )
        .arg(
            Arg::with_name("no-cache")
                .long("no-cache")
                .help("Do not keep blocks in memory.")
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Bins Hi-C pairs into a dataset.")
                .arg(
                    Arg::with_name("pairs")
                        .short("p")
                        .long("pairs")
                        .value_name("FILE")
                        .takes_value(true)
                        .required(true)
                        .help("A file with Hi-C pairs. File must be tab separated. \
                                1 col - read name, 2 col - first chromosome, 3 col - first coordinate, \
                                4 col - second chromosome, 5 col - second coordinate, \
                                6 col - first strand, 7 col - second strand.")
                )
                .arg(
                    Arg::with_name("sizes")
                        .short("s")
                        .long("sizes")
                        .value_name("FILE")
                        .takes_value(true)
                        .required(true)
                        .help("File with chromosome lengths. First column is the name, \
                                second one is the length.")
                )
                .arg(
                    Arg::with_name("rslns")
                        .short("r")
                        .long("rslns")
                        .multiple(true)
                        .use_delimiter(true)
                        .takes_value(true)
                        .value_name("INT")
                        .required(true)
                        .help("BP resolutions that will be created from pairs.")
                )
                .arg(
                    Arg::with_name("block-bins")
                        .short("b")
                        .long("block-bins")
                        .value_name("INT")
                        .takes_value(true)
                        .help("Number of bins per block side.")
                )
                .arg(
                    Arg::with_name("norms")
                        .short("n")
                        .long("norms")
                        .multiple(true)
                        .use_delimiter(true)
                        .takes_value(true)
                        .possible_values(&["VC", "VC_SQRT", "KR"])
                        .help("Normalization vectors computed for every chromosome.")
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .value_name("FILE")
                        .takes_value(true)
                        .required(true)
                        .help("Output file, where the dataset will be stored in hdf5 format.")
                )
        )
        .subcommand(
            resolution_args(SubCommand::with_name("dump")
                .about("Writes the observed contacts of a chromosome pair.")
                .arg(dataset_arg())
                .arg(Arg::with_name("chr1").long("chr1").takes_value(true).required(true))
                .arg(Arg::with_name("chr2").long("chr2").takes_value(true).required(true))
                .arg(format_arg()))
        )
        .subcommand(
            resolution_args(SubCommand::with_name("dump-oe")
                .about("Writes the dense observed/expected or Pearson's matrix of a chromosome.")
                .arg(dataset_arg())
                .arg(Arg::with_name("chr").long("chr").takes_value(true).required(true))
                .arg(
                    Arg::with_name("kind")
                        .short("k")
                        .long("kind")
                        .possible_values(&["oe", "pearson"])
                        .default_value("oe")
                )
                .arg(format_arg()))
        )
        .subcommand(
            resolution_args(SubCommand::with_name("eigenvector")
                .about("Writes an eigenvector of the Pearson's matrix of a chromosome.")
                .arg(dataset_arg())
                .arg(Arg::with_name("chr").long("chr").takes_value(true).required(true))
                .arg(
                    Arg::with_name("number")
                        .long("number")
                        .value_name("INT")
                        .default_value("0")
                        .help("0 is the eigenvector of the largest eigenvalue.")
                ))
        )
        .get_matches();

    setup_logging(matches.occurrences_of("verbose"), Path::new(matches.value_of("log").unwrap_or("hic-store.log")))?;

    match matches.subcommand() {
        ("build", Some(build_matches)) => {
            let pairs_file = Path::new(build_matches.value_of("pairs").ok_or("pairs file is required")?);
            let sizes_file = Path::new(build_matches.value_of("sizes").ok_or("sizes file is required")?);
            let output = Path::new(build_matches.value_of("output").ok_or("output file is required")?);
            let resolutions = build_matches.values_of("rslns").map(|v| v.collect::<Vec<_>>()).unwrap_or_default()
                .into_iter()
                .map(|x| x.parse::<u32>())
                .collect::<Result<Vec<_>, _>>()?;
            let block_bins = match build_matches.value_of("block-bins") {
                Some(b) => b.parse()?,
                None => hic_store::builders::DEFAULT_BLOCK_BIN_COUNT,
            };
            let norms = build_matches.values_of("norms").map(|v| v.collect::<Vec<_>>()).unwrap_or_default()
                .into_iter()
                .map(|x| x.parse::<NormalizationType>())
                .collect::<Result<Vec<_>, _>>()?;
            create_dataset_from_pairs(pairs_file, sizes_file, output, &resolutions, block_bins, &norms)?;
            info!("Dataset written to {}", output.display());
        },
        ("dump", Some(dump_matches)) => {
            let dataset = open_dataset(Path::new(dump_matches.value_of("dataset").ok_or("dataset is required")?),
                                       store_config(&matches)?)?;
            let zoom = zoom_of(dump_matches)?;
            let norm = norm_of(dump_matches)?;
            let format = dump_matches.value_of("format").unwrap_or("text").parse::<DumpFormat>()?;
            let zd = zoom_data(&dataset, dump_matches.value_of("chr1").unwrap_or(""),
                               dump_matches.value_of("chr2").unwrap_or(""), zoom)?;

            let vectors = match norm {
                NormalizationType::NONE => None,
                _ => {
                    let nv1 = dataset.normalization_vector(zd.get_chr1_idx(), zoom, norm)
                        .ok_or(MissingData::NormalizationVector(zd.get_chr1_idx(), zoom, norm))?;
                    let nv2 = dataset.normalization_vector(zd.get_chr2_idx(), zoom, norm)
                        .ok_or(MissingData::NormalizationVector(zd.get_chr2_idx(), zoom, norm))?;
                    Some((nv1, nv2))
                }
            };
            let mut out = output_of(dump_matches)?;
            let written = zd.dump(&mut out, format, vectors.as_ref().map(|(a, b)| (&**a, &**b)))?;
            out.flush()?;
            info!("{} records written", written);
        },
        ("dump-oe", Some(oe_matches)) => {
            let dataset = open_dataset(Path::new(oe_matches.value_of("dataset").ok_or("dataset is required")?),
                                       store_config(&matches)?)?;
            let zoom = zoom_of(oe_matches)?;
            let norm = norm_of(oe_matches)?;
            let format = oe_matches.value_of("format").unwrap_or("text").parse::<DumpFormat>()?;
            let kind = oe_matches.value_of("kind").unwrap_or("oe").parse::<DumpKind>()?;
            let chr = oe_matches.value_of("chr").unwrap_or("");
            let zd = zoom_data(&dataset, chr, chr, zoom)?;
            let expected = dataset.expected_values(zoom, norm).ok_or(MissingData::ExpectedValues(zoom, norm))?;

            let mut out = output_of(oe_matches)?;
            zd.dump_oe(&mut out, &*expected, kind, norm, format)?;
            out.flush()?;
            info!("{} matrix of {} written", kind, zd.get_chr1());
        },
        ("eigenvector", Some(ev_matches)) => {
            let dataset = open_dataset(Path::new(ev_matches.value_of("dataset").ok_or("dataset is required")?),
                                       store_config(&matches)?)?;
            let zoom = zoom_of(ev_matches)?;
            let norm = norm_of(ev_matches)?;
            let number = ev_matches.value_of("number").unwrap_or("0").parse::<usize>()?;
            let chr_idx = chromosome_index(&dataset, ev_matches.value_of("chr").unwrap_or(""))?;

            let eigenvector = dataset.eigenvector(chr_idx, zoom, number, norm)?;
            let mut out = output_of(ev_matches)?;
            for value in eigenvector.iter() {
                writeln!(out, "{}", value)?;
            }
            out.flush()?;
        },
        ("", None) => println!("None subcommand was used. See help for available one."),
        _ => unreachable!(),
    }
    Ok(())
}
