use std::error::Error;
use std::fs;

use rainmon_service::config::{self, RunConfig};
use rainmon_service::logging::{self, Stage};
use rainmon_service::pipeline;
use rainmon_service::report;

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let config_path = config::config_path_from_env();
    let mut run_config = RunConfig::load(&config_path)?;
    run_config.apply_env_overrides();

    logging::init_logger(
        run_config.logging.level(),
        run_config.logging.file.as_deref(),
        run_config.logging.console_timestamps,
    );
    logging::info(
        Stage::System,
        None,
        &format!("Starting run with config {}", config_path.display()),
    );

    let output = match pipeline::run_from_config(&run_config) {
        Ok(output) => output,
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            return Err(e.into());
        }
    };

    let run_report = report::build_report(&output);
    let json = report::to_json(&run_report)?;

    match &run_config.output.report_path {
        Some(path) => {
            let path = run_config.resolve(path);
            fs::write(&path, json)?;
            logging::info(Stage::System, None, &format!("Report written to {}", path.display()));
        }
        None => println!("{}", json),
    }

    if run_config.output.print_table {
        // stdout carries the JSON when no report path is set
        if run_config.output.report_path.is_some() {
            report::print_summary(&run_report);
        } else {
            eprint!("{}", report::render_table(&run_report));
        }
    }

    Ok(())
}
