use clap::ArgMatches;
use clap_complete::{generate, Shell};
use dexcalls::prelude::*;
use dexcalls::{cli, dc_callgraph, dc_disas, dc_dissect};
use std::io;

fn main() -> DcResult<()> {
    let args = cli::dexcalls().get_matches();

    match &args.subcommand() {
        Some(("callgraph", cmd_args)) => dc_callgraph::run(cmd_args),
        Some(("dissect", cmd_args)) => dc_dissect::run(cmd_args),
        Some(("disas", cmd_args)) => dc_disas::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(DcError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(DcError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> DcResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| DcError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::dexcalls();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
