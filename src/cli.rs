//! Main `DexCalls` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Input dex file")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_filter_class() -> Arg {
    Arg::new("filter-class")
        .long("filter-class")
        .action(ArgAction::Set)
        .help("Class(es) regex filter")
}

fn arg_filter_method() -> Arg {
    Arg::new("filter-method")
        .long("filter-method")
        .action(ArgAction::Set)
        .help("Method(s) regex filter")
}

#[must_use]
pub fn dexcalls() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(callgraph())
        .subcommand(dissect())
        .subcommand(disas())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn callgraph() -> Command {
    Command::new("callgraph")
        .bin_name("dc-callgraph")
        .version(VERSION)
        .author(AUTHORS)
        .about("Prints the calls of every declared method")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Output dot file"))
        .arg(arg_filter_class())
        .arg(arg_filter_method())
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the calls report as JSON"),
        )
        .arg(
            Arg::new("parallel")
                .short('p')
                .long("parallel")
                .action(ArgAction::SetTrue)
                .help("Analyze classes in parallel"),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .help("Number of analysis threads (implies --parallel)"),
        )
}

#[must_use]
pub fn dissect() -> Command {
    Command::new("dissect")
        .bin_name("dc-dissect")
        .version(VERSION)
        .author(AUTHORS)
        .about("Dumps dex tables")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(
            Arg::new("table")
                .short('t')
                .long("table")
                .action(ArgAction::Set)
                .value_parser(["header", "map", "strings", "types", "protos", "fields", "methods", "classes"])
                .required(true),
        )
}

#[must_use]
pub fn disas() -> Command {
    Command::new("disas")
        .bin_name("dc-disas")
        .version(VERSION)
        .author(AUTHORS)
        .about("Disassembles dalvik bytecode")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_filter_class())
        .arg(arg_filter_method())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_consistent() {
        dexcalls().debug_assert();
    }

    #[test]
    fn callgraph_arguments() {
        let args = callgraph()
            .try_get_matches_from(["dc-callgraph", "-i", "classes.dex", "--jobs", "4", "--json"])
            .unwrap();
        assert_eq!(args.get_one::<String>("input").map(String::as_str), Some("classes.dex"));
        assert_eq!(args.get_one::<usize>("jobs"), Some(&4));
        assert!(args.get_flag("json"));
        assert!(!args.get_flag("parallel"));

        assert!(callgraph().try_get_matches_from(["dc-callgraph"]).is_err());
    }

    #[test]
    fn dissect_tables() {
        assert!(dissect()
            .try_get_matches_from(["dc-dissect", "-i", "a.dex", "-t", "methods"])
            .is_ok());
        assert!(dissect()
            .try_get_matches_from(["dc-dissect", "-i", "a.dex", "-t", "resources"])
            .is_err());
    }
}
