// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use linmodel_engine::{Result, eprintln, handoff, json, lower, lower_sparse, mps};

const EXIT_FAILURE: i32 = 1;

#[macro_export]
macro_rules! die(
    ($($arg:tt)*) => { {
        eprintln!($($arg)*);
        std::process::exit(EXIT_FAILURE)
    } }
);

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Fixed-format MPS text
    Mps,
    /// Dense A, b, c and X as JSON
    Matrices,
    /// Sparse rows and objectives as JSON
    Sparse,
    /// Sets, parameters and variables for a solver's modeling layer
    Handoff,
}

/// Lower a JSON linear model to solver input.
#[derive(Parser, Debug)]
#[command(name = "linmodel", version, about, long_about = None)]
struct Args {
    /// Model file (stdin if not specified)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "mps")]
    format: Format,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number substituted for Big-M, overriding the model's options
    #[arg(long)]
    big_m: Option<f64>,

    /// Allow names to be redeclared, replacing earlier entities
    #[arg(long)]
    overwrite: bool,

    /// Emit non-negativity constraints as rows instead of bounds
    #[arg(long)]
    keep_nonneg_rows: bool,
}

fn open_model(path: Option<&PathBuf>) -> Result<json::Model> {
    match path {
        Some(path) => {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(err) => die!("error opening '{}': {}", path.display(), err),
            };
            json::Model::from_reader(BufReader::new(file))
        }
        None => {
            let mut contents = String::new();
            if let Err(err) = std::io::stdin().read_to_string(&mut contents) {
                die!("error reading stdin: {}", err);
            }
            json::Model::from_json(&contents)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(mut s) => {
            s.push('\n');
            s
        }
        Err(err) => die!("error serializing output: {}", err),
    }
}

fn render(model: &linmodel_engine::Model, format: Format) -> Result<String> {
    let text = match format {
        Format::Mps => mps::to_mps(model)?,
        Format::Matrices => to_json(&lower(model)?),
        Format::Sparse => to_json(&lower_sparse(model)?),
        Format::Handoff => to_json(&handoff::collect(model)?),
    };
    Ok(text)
}

fn main() {
    let args = Args::parse();
    let source = args
        .path
        .as_ref()
        .map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string());

    let mut file_model = match open_model(args.path.as_ref()) {
        Ok(model) => model,
        Err(err) => die!("model '{}' error: {}", source, err),
    };
    if let Some(big_m) = args.big_m {
        file_model.options.big_m = big_m;
    }
    file_model.options.overwrite |= args.overwrite;
    file_model.options.keep_nonneg_rows |= args.keep_nonneg_rows;

    let model = match file_model.build() {
        Ok(model) => model,
        Err(err) => die!("model '{}' error: {}", source, err),
    };

    let text = match render(&model, args.format) {
        Ok(text) => text,
        Err(err) => die!("model '{}' error: {}", source, err),
    };

    let written = match args.output {
        Some(path) => File::create(&path).and_then(|mut f| f.write_all(text.as_bytes())),
        None => std::io::stdout().write_all(text.as_bytes()),
    };
    if let Err(err) = written {
        die!("error writing output: {}", err);
    }
}
