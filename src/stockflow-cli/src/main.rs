// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use clap::{Parser, Subcommand};
use log::info;

use stockflow_engine::{Model, Result, SeriesFeeder, SimSpecs, Simulation, Template};

const EXIT_FAILURE: i32 = 1;

#[macro_export]
macro_rules! die(
    ($($arg:tt)*) => { {
        use std;
        eprintln!($($arg)*);
        std::process::exit(EXIT_FAILURE)
    } }
);

#[derive(Parser, Debug)]
#[command(name = "stockflow", version, about = "Simulate stock-and-flow models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in templates
    Templates,
    /// Simulate a template and print its behaviour as TSV
    Simulate {
        template: String,
        /// Simulated time to run for (defaults to the specs' duration)
        #[arg(long)]
        duration: Option<f64>,
        /// Step size (defaults to the specs' dt)
        #[arg(long)]
        dt: Option<f64>,
        /// JSON file with simulation specs
        #[arg(long)]
        specs: Option<String>,
        /// CSV file of external data
        #[arg(long)]
        data: Option<String>,
        /// Feed an element from a CSV column, as ELEMENT=COLUMN
        #[arg(long = "external", requires = "data")]
        externals: Vec<String>,
        /// Path to write output to instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
    /// Print a JSON snapshot of a template's structure
    View { template: String },
}

fn parse_template(name: &str) -> Template {
    match name.parse::<Template>() {
        Ok(template) => template,
        Err(err) => die!("error: {err} (see `stockflow templates`)"),
    }
}

fn load_specs(path: Option<&str>) -> Result<SimSpecs> {
    let Some(path) = path else {
        return Ok(SimSpecs::default());
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => SimSpecs::from_json(&contents),
        Err(err) => die!("error: reading '{path}': {err}"),
    }
}

fn load_feeder(path: &str, externals: &[String], model: &mut Model) -> Result<SeriesFeeder> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => die!("error: opening '{path}': {err}"),
    };
    let mut feeder = SeriesFeeder::load_csv(file)?;
    for external in externals.iter() {
        let Some((element, column)) = external.split_once('=') else {
            die!("error: --external expects ELEMENT=COLUMN, not '{external}'");
        };
        feeder.set_var_source(element, column)?;
        model.set_external(element, true)?;
    }
    Ok(feeder)
}

fn output_writer(path: Option<&str>) -> Box<dyn Write> {
    match path {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(err) => die!("error: creating '{path}': {err}"),
        },
        None => Box::new(io::stdout().lock()),
    }
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    template: &str,
    duration: Option<f64>,
    dt: Option<f64>,
    specs: Option<&str>,
    data: Option<&str>,
    externals: &[String],
    output: Option<&str>,
) -> Result<()> {
    let template = parse_template(template);
    let specs = load_specs(specs)?;
    let mut model = Model::from_template(template)?;
    let feeder = match data {
        Some(path) => Some(load_feeder(path, externals, &mut model)?),
        None => None,
    };

    let mut sim = Simulation::new(model, specs)?;
    if let Some(feeder) = feeder {
        sim = sim.with_source(Box::new(feeder));
    }
    let steps = sim.simulate(duration, dt)?;
    info!("{template}: {steps} steps");

    let mut out = output_writer(output);
    if let Err(err) = sim.results().write_tsv(&mut out).and_then(|_| out.flush()) {
        die!("error: writing results: {err}");
    }
    Ok(())
}

fn view(template: &str) -> Result<()> {
    let model = Model::from_template(parse_template(template))?;
    println!("{}", model.view().to_json()?);
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Templates => {
            for template in Template::ALL.iter() {
                println!("{:<32}{}", template.name(), template.description());
            }
            Ok(())
        }
        Command::Simulate {
            template,
            duration,
            dt,
            specs,
            data,
            externals,
            output,
        } => simulate(
            &template,
            duration,
            dt,
            specs.as_deref(),
            data.as_deref(),
            &externals,
            output.as_deref(),
        ),
        Command::View { template } => view(&template),
    };

    if let Err(err) = result {
        die!("error: {err}");
    }
}
