use cloudsim_kernel::{generate_simulation, logger};

fn main() {
    logger::init();

    let Some(file_path) = std::env::args().nth(1) else {
        log::error!("Usage: cloudsim_kernel <scenario.json>");
        std::process::exit(2);
    };

    log::info!("Loading scenario from path: '{}'...", file_path);
    let mut simulation = match generate_simulation(&file_path) {
        Ok(simulation) => simulation,
        Err(e) => {
            log::error!("Error during loading of scenario: {}", e);
            std::process::exit(1);
        }
    };

    let end = simulation.start();
    log::info!("Simulation ended at {:.2} after {} event(s).", end, simulation.get_processed_events());
}
