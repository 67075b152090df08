use memds::{
    db::Database, log::{self, log, LogLevel}, server::{cron_loop, serve, Config}
};
use std::{env, process::exit, sync::Arc, thread, time::Instant};

fn main() {
    let args: Vec<String> = env::args().collect();

    let config = if args.len() == 2 {
        Config::load(&args[1])
    } else if args.len() > 2 {
        eprintln!("Usage: ./memds-server [/path/to/memds.conf]");
        exit(1);
    } else {
        log(LogLevel::Warning, "Warning: no config file specified, using the default config. In order to specify a config file use 'memds-server /path/to/memds.conf'");
        Config::default()
    };
    log::init(config.verbosity, &config.log_file);

    let db = Arc::new(Database::new());
    let start = Instant::now();
    match db.load(&config.db_filename) {
        Ok(_) => {
            log(LogLevel::Notice, &format!("DB loaded from disk: {} seconds", start.elapsed().as_secs()));
        },
        Err(_) => {
            log(LogLevel::Notice, "No existing DB found. Starting with an empty database.");
        },
    }

    {
        let config = config.clone();
        let db = db.clone();
        thread::spawn(move || cron_loop(&config, &db));
    }

    if let Err(e) = serve(&config, db) {
        log(LogLevel::Warning, &format!("Opening TCP port {}: {}", config.port, e));
        exit(1);
    }
}
