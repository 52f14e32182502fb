use dexcalls::prelude::DcResult;
use dexcalls::{cli, dc_dissect};

fn main() -> DcResult<()> {
    let args = cli::dissect().get_matches();
    dc_dissect::run(&args)
}
