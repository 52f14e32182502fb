use dexcalls::prelude::DcResult;
use dexcalls::{cli, dc_callgraph};

fn main() -> DcResult<()> {
    let args = cli::callgraph().get_matches();
    dc_callgraph::run(&args)
}
