use std::env;

use treelox::Treelox;

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let verbose = env::var("TREELOX_DEBUG").map(|v| v == "1").unwrap_or(false);
    let mut args = env::args().skip(1).collect::<Vec<_>>();

    match args.len() {
        0 => {
            let mut treelox = Treelox::new().with_verbose(verbose);
            treelox.run_prompt()
        }
        1 => {
            let mut treelox = Treelox::new().with_verbose(verbose);
            let filename = args.pop().unwrap();
            treelox.run_file(&filename)?;

            if treelox.had_error() {
                std::process::exit(65);
            }
            if treelox.had_runtime_error() {
                std::process::exit(70);
            }

            Ok(())
        }
        _ => {
            let bin_name = env!("CARGO_BIN_NAME");
            eprintln!("Usage: {} [script]", bin_name);
            std::process::exit(64);
        }
    }
}
