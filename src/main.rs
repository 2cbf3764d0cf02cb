mod print;

use std::{env::args, fs::File, io::{self, BufReader, BufWriter, Write}, process::ExitCode};
use anyhow::{bail, Context, Result};
use log::info;
use uw_reader::{read_levels, DecodeOptions, Format, Strictness};

const USAGE: &str = "usage: uwsav [--v1|--v2] [--lenient] <input> [output]";

struct Args {
	format: Option<Format>,
	options: DecodeOptions,
	input: String,
	output: Option<String>,
}

fn parse_args() -> Result<Args> {
	let mut format = None;
	let mut options = DecodeOptions::default();
	let mut paths = vec![];
	for arg in args().skip(1) {
		match arg.as_str() {
			"--v1" => format = Some(Format::V1),
			"--v2" => format = Some(Format::V2),
			"--lenient" => options.strictness = Strictness::Lenient,
			flag if flag.starts_with("--") => bail!("unknown flag {}\n{}", flag, USAGE),
			_ => paths.push(arg),
		}
	}
	let mut paths = paths.into_iter();
	let Some(input) = paths.next() else {
		bail!(USAGE);
	};
	let output = paths.next();
	if paths.next().is_some() {
		bail!("too many arguments\n{}", USAGE);
	}
	Ok(Args { format, options, input, output })
}

fn run() -> Result<()> {
	let Args { format, options, input, output } = parse_args()?;
	let mut reader = BufReader::new(File::open(&input).with_context(|| format!("opening {}", input))?);
	let format = match format {
		Some(format) => format,
		None => Format::detect(&mut reader).with_context(|| format!("detecting format of {}", input))?,
	};
	info!("reading {} as {:?}", input, format);
	let levels = read_levels(&mut reader, format, &options).with_context(|| format!("reading {}", input))?;
	info!("{} levels", levels.len());
	match output {
		Some(output) => {
			let file = File::create(&output).with_context(|| format!("creating {}", output))?;
			let mut out = BufWriter::new(file);
			print::print_levels(&mut out, &levels)?;
			out.flush()?;
		},
		None => {
			let mut out = io::stdout().lock();
			print::print_levels(&mut out, &levels)?;
		},
	}
	Ok(())
}

fn main() -> ExitCode {
	env_logger::init();
	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("{:#}", err);
			ExitCode::FAILURE
		},
	}
}
