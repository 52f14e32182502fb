use crate::prelude::*;
use clap::ArgMatches;
use dc_analysis::report::{ClassOutcome, MethodCalls};
use dc_dex::DexIndex;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufWriter, Write};

pub fn run(args: &ArgMatches) -> DcResult<()> {
    init_logger(args);

    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| DcError::BadArguments("--input needed".to_string()))?;
    let dex = dc_dex::open(input_fname)?;
    log::debug!("opened {input_fname} (dex version {:03})", dex.version());

    let mut options = ReportOptions::default();
    if let Some(jobs) = args.get_one::<usize>("jobs") {
        if *jobs == 0 {
            return Err(DcError::BadArguments("--jobs must be positive".to_string()));
        }
        options = options.jobs(*jobs);
    } else if args.get_flag("parallel") {
        options = options.parallel();
    }
    let report = report::build(&dex, &options)?;

    let filter_class = args.get_one::<String>("filter-class");
    let filter_method = args.get_one::<String>("filter-method");
    let filter = Filter {
        class: filter_class.map(|r| Regex::new(r)).transpose()?,
        method: filter_method.map(|r| Regex::new(r)).transpose()?,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.get_flag("json") {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        write_tree(&mut out, &report, &dex, &filter)?;
    }
    out.flush()?;

    if report.nb_failed_classes() > 0 || report.nb_failed_methods() > 0 {
        log::warn!(
            "{} class(es) and {} method(s) could not be decoded",
            report.nb_failed_classes(),
            report.nb_failed_methods()
        );
    }

    if let Some(dot_filename) = args.get_one::<String>("output") {
        let mut cg = CallGraph::from_report(&report);
        if filter_class.is_some() || filter_method.is_some() {
            cg = cg.filter_matching(
                filter_class.map(String::as_str),
                filter_method.map(String::as_str),
            )?;
        }

        log::info!("callgraph contains {} methods with:", cg.nb_methods());
        log::info!("    - {} external methods", cg.nb_external_methods());
        log::info!("    - {} undecodable methods", cg.nb_failed_methods());

        let mut file = File::create(dot_filename)?;
        file.write_all(cg.to_dot().as_bytes())?;
        log::info!("dot output written in {:?}", dot_filename);
    }

    Ok(())
}

#[derive(Debug, Default)]
pub struct Filter {
    pub class: Option<Regex>,
    pub method: Option<Regex>,
}

impl Filter {
    fn matches(&self, class: &str, method: &MethodCalls) -> bool {
        let name = method
            .name
            .split_once('.')
            .map_or(method.name.as_str(), |(_, name)| name);
        self.class.as_ref().map_or(true, |re| re.is_match(class))
            && self.method.as_ref().map_or(true, |re| re.is_match(name))
    }
}

/// Writes the method table, then each declared method followed by its
/// callees, one per line and indented by two spaces.
pub fn write_tree<W: Write>(out: &mut W, report: &Report, dex: &Dex, filter: &Filter) -> DcResult<()> {
    for signature in &report.methods {
        writeln!(out, "{signature}")?;
    }

    for class in &report.classes {
        if filter.class.as_ref().map_or(false, |re| !re.is_match(&class.class)) {
            continue;
        }
        let methods = match &class.outcome {
            ClassOutcome::Methods(methods) => methods,
            ClassOutcome::Failed(err) => {
                writeln!(out, "{}; <failed: {err}>", class.class)?;
                continue;
            }
        };
        for method in methods.iter().filter(|m| filter.matches(&class.class, m)) {
            writeln!(out, "{}; code size={}", method.name, method.code_size)?;
            match &method.outcome {
                Outcome::Calls(calls) => {
                    for call in calls {
                        let target = call.target().get(dex)?;
                        writeln!(out, "  {}", target.qualified_name(dex)?)?;
                    }
                }
                Outcome::Failed(err) => writeln!(out, "  <failed: {err}>")?,
            }
        }
    }
    Ok(())
}
