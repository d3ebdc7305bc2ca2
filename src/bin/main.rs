extern crate clap;
extern crate sandbox_launcher;
extern crate stderrlog;

use error_chain::ChainedError;

use sandbox_launcher::errors::*;
use sandbox_launcher::profile::Profile;
use sandbox_launcher::{report, supervisor};

fn get_arg_matches() -> clap::ArgMatches<'static> {
    clap::App::new("sandbox-launcher")
        .version("0.1.0")
        .author("Lancern <msrlancern@126.com>")
        .about("Runs an untrusted program in a namespaced, rlimited, seccomp-filtered \
                sandbox, sampling telemetry and emitting a termination report.")
        .arg(clap::Arg::with_name("profile")
            .long("profile")
            .takes_value(true)
            .value_name("STRICT|RESOURCE-AWARE|LEARNING")
            .help("isolation and adaptation profile; defaults to STRICT"))
        .arg(clap::Arg::with_name("executable")
            .required(true)
            .index(1)
            .help("path to the untrusted executable"))
        .arg(clap::Arg::with_name("args")
            .index(2)
            .multiple(true)
            .help("arguments passed to the untrusted executable"))
        .get_matches()
}

/// Resolve the `--profile` argument. An unknown value is not a setup
/// failure: it prints a warning and falls back to `STRICT`.
fn resolve_profile(matches: &clap::ArgMatches<'_>) -> Profile {
    match matches.value_of("profile") {
        None => Profile::Strict,
        Some(raw) => match Profile::parse(raw) {
            Some(profile) => profile,
            None => {
                log::warn!("unknown profile '{}', falling back to STRICT", raw);
                Profile::Strict
            }
        }
    }
}

fn do_main() -> Result<()> {
    stderrlog::new()
        .quiet(false)
        .verbosity(3)
        .init()
        .unwrap();

    let matches = get_arg_matches();
    let profile = resolve_profile(&matches);

    let program = matches.value_of("executable").unwrap().to_string();
    let args: Vec<String> = matches
        .values_of("args")
        .map(|values| values.map(str::to_string).collect())
        .unwrap_or_default();

    println!("Launching '{}' under profile {}", program, profile);
    log::info!("launching '{}' under profile {}", program, profile);

    let record = supervisor::run(profile, &program, &args)
        .chain_err(|| ErrorKind::ChildSpawnFailed)?;

    let path = report::emit(&record)?;
    println!("Termination report written to {}", path.display());
    log::info!("termination report written to {}", path.display());

    Ok(())
}

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("error: {}", e.display_chain());
            std::process::exit(1);
        }
    }
}
