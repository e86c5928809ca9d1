#[macro_use] extern crate clap;
#[macro_use] extern crate log;
#[macro_use] extern crate error_chain;

use chartcheck::*;
use chartcheck::helm::{helpers, parallel};
use chartcheck::values::Values;
use clap::{Arg, App, AppSettings, SubCommand, ArgMatches};
use std::collections::BTreeMap;
use std::fs;
use std::process;
use std::sync::Arc;

fn print_error_debug(e: &Error) {
    use std::env;
    // print causes of error if present
    if let Ok(_) = env::var("CI") {
        // only print debug implementation rather than unwinding
        warn!("{:?}", e);
    } else {
        // normal case - unwind the error chain
        for e in e.iter().skip(1) {
            warn!("caused by: {}", e);
        }
    }
}

fn main() {
    let app = App::new("chartcheck")
        .version(crate_version!())
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::DeriveDisplayOrder)
        .global_settings(&[AppSettings::ColoredHelp])
        .about("Render helm chart templates and verify the manifests")
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .global(true)
            .help("Increase verbosity"))
        .arg(Arg::with_name("debug")
            .short("d")
            .long("debug")
            .global(true)
            .help("Adds line numbers to log statements"))
        .arg(Arg::with_name("chart")
            .short("c")
            .long("chart")
            .takes_value(true)
            .global(true)
            .help("Chart directory (overrides chartcheck.yml)"))

        .subcommand(SubCommand::with_name("run")
            .about("Run built in and configured suites against the chart")
            .arg(Arg::with_name("num-jobs")
                .short("j")
                .long("num-jobs")
                .takes_value(true)
                .help("Number of worker threads used"))
            .arg(Arg::with_name("no-builtins")
                .long("no-builtins")
                .help("Skip the built in hpa suites"))
            .arg(Arg::with_name("suites")
                .multiple(true)
                .help("Extra suite files to run")))

        .subcommand(SubCommand::with_name("template")
            .about("Render templates from the chart and print them")
            .arg(Arg::with_name("release")
                .short("r")
                .long("release")
                .takes_value(true)
                .default_value("chartcheck")
                .help("Release name"))
            .arg(Arg::with_name("set")
                .short("s")
                .long("set")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Override a value (key=value)"))
            .arg(Arg::with_name("values")
                .short("f")
                .long("values")
                .takes_value(true)
                .conflicts_with("set")
                .help("Values file to render with"))
            .arg(Arg::with_name("templates")
                .required(true)
                .multiple(true)
                .help("Templates to render, e.g. templates/hpa.yaml")))

        .subcommand(SubCommand::with_name("config")
            .setting(AppSettings::SubcommandRequiredElseHelp)
            .about("Inspect chartcheck configuration")
            .subcommand(SubCommand::with_name("verify")
                .about("Verify the chartcheck config and helm availability"))
            .subcommand(SubCommand::with_name("show")
                .about("Show the resolved chartcheck config")));

    // arg parse
    let args = app.get_matches();
    let name = args.subcommand_name().unwrap_or("chartcheck").to_string();
    let _ = run(&args).map_err(|e| {
        error!("{} error: {}", name, e);
        print_error_debug(&e);
        process::exit(1);
    });
    process::exit(0);
}

fn run(args: &ArgMatches) -> Result<()> {
    // initialise deps and set log default - always show INFO messages (+1)
    loggerv::Logger::new()
        .verbosity(args.occurrences_of("verbose") + 1)
        .module_path(true)
        .line_numbers(args.is_present("debug"))
        .init()
        .map_err(|e| format!("failed to initialise logger: {}", e))?;
    chartcheck::init()?;

    // Ignore SIGPIPE errors to avoid having to use let _ = write! everywhere
    // See https://github.com/rust-lang/rust/issues/46016
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    // Dispatch arguments to internal handlers. Pass on handled result.
    dispatch_commands(args)
}

/// Resolve config from chartcheck.yml with a possible --chart override
///
/// A --chart flag alone is enough when no config file exists.
fn resolve_config(args: &ArgMatches) -> Result<Config> {
    merge_config(Config::maybe_read()?, args.value_of("chart"))
}

fn merge_config(found: Option<Config>, chart: Option<&str>) -> Result<Config> {
    let conf = match (found, chart) {
        (Some(mut conf), Some(c)) => {
            conf.chart = c.into();
            conf
        }
        (Some(conf), None) => conf,
        (None, Some(c)) => Config::for_chart(c),
        (None, None) => bail!("No chartcheck.yml found and no --chart given"),
    };
    conf.verify()?;
    Ok(conf)
}

fn parse_set(pairs: Vec<&str>) -> Result<BTreeMap<String, String>> {
    let mut res = BTreeMap::new();
    for p in pairs {
        let mut split = p.splitn(2, '=');
        match (split.next(), split.next()) {
            (Some(k), Some(v)) if !k.is_empty() => {
                res.insert(k.to_string(), v.to_string());
            }
            _ => bail!("--set {} must be of the form key=value", p),
        }
    }
    Ok(res)
}

/// Dispatch clap arguments to chartcheck handlers
fn dispatch_commands(args: &ArgMatches) -> Result<()> {
    if let Some(a) = args.subcommand_matches("run") {
        let mut conf = resolve_config(args)?;
        if a.is_present("no-builtins") {
            conf.builtins = false;
        }
        if let Some(extra) = a.values_of("suites") {
            conf.suites.extend(extra.map(Into::into));
            conf.verify()?;
        }
        let jobs = match a.value_of("num-jobs") {
            Some(j) => j.parse().map_err(|_| format!("invalid number of jobs '{}'", j))?,
            None => conf.workers,
        };
        let suites = conf.load_suites()?;
        let renderer: Arc<dyn Renderer> = Arc::new(conf.renderer());
        let reports = parallel::run_suites(suites, renderer, jobs);
        return parallel::summarize(&reports);
    }
    else if let Some(a) = args.subcommand_matches("template") {
        let conf = resolve_config(args)?;
        let values = if let Some(f) = a.value_of("values") {
            Values::Raw(fs::read_to_string(f)?)
        } else {
            let pairs = a.values_of("set").map(|v| v.collect::<Vec<_>>()).unwrap_or_default();
            Values::Inline(parse_set(pairs)?)
        };
        let release = a.value_of("release").unwrap_or("chartcheck");
        let templates = a.values_of("templates").map(|v| v.collect::<Vec<_>>()).unwrap_or_default();
        let req = RenderRequest::new(release, &templates, values);
        return match req.render(&conf.renderer())? {
            Rendered::Manifest(tpl) => {
                print!("{}", tpl);
                Ok(())
            }
            Rendered::Failed(diag) => bail!(ErrorKind::UnexpectedRenderFailure(diag)),
        };
    }
    else if let Some(a) = args.subcommand_matches("config") {
        let conf = resolve_config(args)?;
        if a.subcommand_matches("verify").is_some() {
            let version = helpers::version(&conf.helm)?;
            info!("Using {} {} for {}", conf.helm, version, conf.chart.display());
            for s in conf.load_suites()? {
                info!("suite {} has {} cases", s.name, s.cases.len());
            }
            return Ok(());
        }
        else if a.subcommand_matches("show").is_some() {
            print!("{}", serde_yaml::to_string(&conf)?);
            return Ok(());
        }
    }

    unreachable!("Subcommand valid, but not implemented");
}
