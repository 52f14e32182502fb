use dexcalls::prelude::DcResult;
use dexcalls::{cli, dc_disas};

fn main() -> DcResult<()> {
    let args = cli::disas().get_matches();
    dc_disas::run(&args)
}
