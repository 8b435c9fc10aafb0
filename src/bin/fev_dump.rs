#![allow(clippy::upper_case_acronyms)]

use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use encoding::all::encodings;
use encoding::types::Encoding;
use log::{LevelFilter, debug, info};

use fev::{FevParser, ParserSettings};
use hashbrown::HashMap;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[cfg(feature = "multithreading")]
use rayon::prelude::*;

#[cfg(all(feature = "fast-alloc", not(windows)))]
use tikv_jemallocator::Jemalloc;

#[cfg(all(feature = "fast-alloc", not(windows)))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[cfg(all(feature = "fast-alloc", windows))]
#[global_allocator]
static GLOBAL: rpmalloc::RpMalloc = rpmalloc::RpMalloc;

const STDIN_INPUT: &str = "-";

enum OutputTarget {
    Stdout,
    File(PathBuf),
    Directory(PathBuf),
}

struct FevDump {
    parser_settings: ParserSettings,
    inputs: Vec<PathBuf>,
    output: OutputTarget,
    confirm_overwrite: bool,
    verbosity_level: Option<LevelFilter>,
}

/// One bank to convert, with its already created output.
struct Job {
    input: PathBuf,
    output: Box<dyn Write + Send>,
}

impl FevDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let inputs: Vec<PathBuf> = matches
            .get_many::<PathBuf>("INPUT")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        if inputs.is_empty() {
            bail!("At least one input is required");
        }

        if inputs
            .iter()
            .filter(|p| p.as_os_str() == STDIN_INPUT)
            .count()
            > 1
        {
            bail!("stdin (`-`) can only be used once as an input");
        }

        let output = match (
            matches.get_one::<PathBuf>("output-target"),
            matches.get_one::<PathBuf>("output-dir"),
        ) {
            (Some(_), Some(_)) => bail!("`--output` and `--output-dir` cannot be used together"),
            (None, Some(dir)) => OutputTarget::Directory(dir.clone()),
            (Some(file), None) if inputs.len() == 1 => OutputTarget::File(file.clone()),
            (None, None) if inputs.len() == 1 => OutputTarget::Stdout,
            _ => bail!(
                "{} inputs were given, `--output-dir` is required to convert more than one bank",
                inputs.len()
            ),
        };

        let num_threads = *matches.get_one::<usize>("num-threads").unwrap_or(&0);
        let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
            (true, number) => number,
            (false, _) => {
                eprintln!(
                    "turned on threads, but fev_dump was compiled without `multithreading` feature! converting sequentially"
                );
                1
            }
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        let codec_name = matches
            .get_one::<String>("ansi-codec")
            .map(String::as_str)
            .unwrap_or("ascii");
        let ansi_codec = encodings()
            .iter()
            .find(|c| c.name() == codec_name)
            .ok_or_else(|| format_err!("Unknown codec `{}`", codec_name))?;

        Ok(FevDump {
            parser_settings: ParserSettings::new()
                .num_threads(num_threads)
                .indent(!matches.get_flag("no-indent"))
                .ansi_codec(*ansi_codec),
            inputs,
            output,
            confirm_overwrite: !matches.get_flag("no-confirm-overwrite"),
            verbosity_level,
        })
    }

    /// Main entry point for `FevDump`.
    pub fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        if let OutputTarget::Directory(dir) = &self.output {
            self.reject_colliding_outputs(dir)?;
        }

        let mut failures = 0_usize;
        let mut jobs = Vec::with_capacity(self.inputs.len());

        // Outputs are created up front and sequentially, so overwrite prompts never interleave.
        for input in &self.inputs {
            match self.open_output(input) {
                Ok(output) => jobs.push(Job {
                    input: input.clone(),
                    output,
                }),
                Err(e) => {
                    eprintln!("Failed to convert {}: {:#}", input.display(), e);
                    failures += 1;
                }
            }
        }

        failures += self.convert_all(jobs);

        if failures > 0 {
            bail!(
                "{} of {} banks failed to convert",
                failures,
                self.inputs.len()
            );
        }

        Ok(())
    }

    #[cfg(feature = "multithreading")]
    fn convert_all(&self, jobs: Vec<Job>) -> usize {
        let settings = &self.parser_settings;

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(settings.get_num_threads())
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                eprintln!("Failed to start worker threads, converting sequentially: {}", e);
                return jobs
                    .into_iter()
                    .map(|job| Self::convert_reporting(job, settings))
                    .filter(|converted| !converted)
                    .count();
            }
        };

        pool.install(|| {
            jobs.into_par_iter()
                .map(|job| Self::convert_reporting(job, settings))
                .filter(|converted| !converted)
                .count()
        })
    }

    #[cfg(not(feature = "multithreading"))]
    fn convert_all(&self, jobs: Vec<Job>) -> usize {
        jobs.into_iter()
            .map(|job| Self::convert_reporting(job, &self.parser_settings))
            .filter(|converted| !converted)
            .count()
    }

    /// Returns `true` on success.
    fn convert_reporting(job: Job, settings: &ParserSettings) -> bool {
        let Job { input, output } = job;
        match Self::convert(&input, settings, output) {
            Ok(()) => {
                info!("Converted {}", input.display());
                true
            }
            Err(e) => {
                eprintln!("Failed to convert {}: {:#}", input.display(), e);
                false
            }
        }
    }

    fn convert(input: &Path, settings: &ParserSettings, output: Box<dyn Write + Send>) -> Result<()> {
        let parser = if input.as_os_str() == STDIN_INPUT {
            FevParser::from_read(io::stdin().lock()).context("Failed to read bank from stdin")?
        } else {
            FevParser::from_path(input)?
        };

        let mut output = BufWriter::new(output);
        parser
            .with_configuration(settings.clone())
            .dump_xml(&mut output)?;
        output.flush()?;
        Ok(())
    }

    fn open_output(&self, input: &Path) -> Result<Box<dyn Write + Send>> {
        match &self.output {
            OutputTarget::Stdout => Ok(Box::new(io::stdout())),
            OutputTarget::File(path) => Ok(Box::new(Self::create_output_file(
                path,
                self.confirm_overwrite,
            )?)),
            OutputTarget::Directory(dir) => {
                if dir.is_file() {
                    bail!(
                        "There is a file at {}, expected an output directory",
                        dir.display()
                    );
                }
                fs::create_dir_all(dir)?;

                let path = Self::directory_output_path(dir, input)?;
                debug!("Writing {} to {}", input.display(), path.display());

                Ok(Box::new(Self::create_output_file(
                    &path,
                    self.confirm_overwrite,
                )?))
            }
        }
    }

    fn directory_output_path(dir: &Path, input: &Path) -> Result<PathBuf> {
        let stem = if input.as_os_str() == STDIN_INPUT {
            "stdin".into()
        } else {
            input
                .file_stem()
                .ok_or_else(|| format_err!("Input {} has no file name", input.display()))?
                .to_os_string()
        };
        Ok(dir.join(stem).with_extension("xml"))
    }

    /// Fails when two inputs would be written to the same file in `dir`.
    fn reject_colliding_outputs(&self, dir: &Path) -> Result<()> {
        let mut claimed: HashMap<PathBuf, &Path> = HashMap::with_capacity(self.inputs.len());

        for input in &self.inputs {
            // Inputs without a file name are reported when their output is opened.
            let Ok(path) = Self::directory_output_path(dir, input) else {
                continue;
            };
            if let Some(previous) = claimed.get(&path) {
                bail!(
                    "{} and {} would both be written to {}",
                    previous.display(),
                    input.display(),
                    path.display()
                );
            }
            claimed.insert(path, input);
        }

        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => Err(format_err!(
                        "Failed to write confirmation prompt to term caused by\n{}",
                        e
                    )),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) => {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                    Ok(File::create(p)?)
                }
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = simplelog::WriteLogger::init(
                level,
                simplelog::Config::default(),
                io::stderr(),
            ) {
                eprintln!("Failed to initialize logging: {:?}", e);
            }
        }
    }
}

fn command() -> Command {
    Command::new("FEV Parser")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to convert FMOD FEV1 event banks to XML")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Banks to convert, `-` reads a bank from stdin."),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Writes output to the file specified instead of stdout, errors will still be printed to stderr. \
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`. \
                       Will create parent directories if needed."),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('d')
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Writes `<stem>.xml` for every input into DIR. Required when converting more than one bank."),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("no-indent")
                .long("no-indent")
                .action(ArgAction::SetTrue)
                .help("When set, output will not be indented."),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .default_value("0")
                .value_parser(clap::value_parser!(usize))
                .help("Sets the number of worker threads used for multiple inputs, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("ansi-codec")
                .long("ansi-codec")
                .value_parser(
                    encodings()
                        .iter()
                        .filter(|&e| e.raw_decoder().is_ascii_compatible())
                        .map(|e| e.name())
                        .collect::<Vec<&'static str>>(),
                )
                .default_value(encoding::all::ASCII.name())
                .help("When set, controls the codec of the strings stored in the bank."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace. trace output is only available in debug builds, as it is extremely verbose"),
        )
}

fn main() {
    let matches = command().get_matches();

    let app = match FevDump::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{:#}", e);
            exit(1)
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{:#}", e);
        exit(1)
    }
}
