use colored::Colorize;
use shape_compat::{cli, logging};

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    if let Err(error) = logging::init_logging(command_line_interface.verbose()) {
        eprintln!("{} could not start logging: {error:#}", "warning:".yellow());
    }
    let exit_code = match command_line_interface.run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red());
            1
        }
    };
    std::process::exit(exit_code);
}
