use std::{env::set_current_dir, fs::{File, OpenOptions}, io::{self, BufRead, BufReader, Read, Write}, net::{TcpListener, TcpStream}, process::exit, sync::Arc, thread, time::Duration};
use crate::{cmd::process_command, db::Database, log::{log, LogLevel}};


///
/// Server driver: configuration, the accept loop and the background cron.
///


pub const IO_BUF_LEN: usize = 1024;
static SERVER_PORT: u16 = 6379;
static DEFAULT_SAVE_SECS: u64 = 5;
static DEFAULT_DB_FILENAME: &str = "dump.myrdb";

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,              // "" = all interfaces
    pub save_secs: u64,
    pub db_filename: String,
    pub log_file: String,               // "" = log on standard output
    pub verbosity: LogLevel,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            port: SERVER_PORT,
            bind_addr: String::new(),
            save_secs: DEFAULT_SAVE_SECS,
            db_filename: DEFAULT_DB_FILENAME.to_string(),
            log_file: String::new(),
            verbosity: LogLevel::Notice,
        }
    }
}

impl Config {
    /// I agree, this is a very rudimental way to load a configuration...
    /// will improve later if the config gets more complex
    pub fn load(filename: &str) -> Config {
        let mut config = Config::default();
        let mut line_num = 0;

        let file = match File::open(filename) {
            Ok(f) => f,
            Err(_) => {
                log(LogLevel::Warning, "Fatal error, can't open config file");
                exit(1);
            },
        };

        let load_err = |err: &str, line: &str, line_num: i32| {
            eprintln!("*** FATAL CONFIG FILE ERROR ***");
            eprintln!("Reading the configuration file, at line {line_num}");
            eprintln!(">>> '{line}'");
            eprintln!("{err}");
            exit(1);
        };

        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            line_num += 1;
            let trimed_line = line.trim();

            // Skip comments and blank lines
            if trimed_line.starts_with('#') || trimed_line.is_empty() {
                continue;
            }

            // Split into arguments
            let argv: Vec<&str> = trimed_line.split_whitespace().collect();
            let argc = argv.len();

            // Execute config directives
            match &argv[0].to_ascii_lowercase()[..] {
                "port" if argc == 2 => {
                    match argv[1].parse::<u16>() {
                        Ok(p) if p >= 1 => { config.port = p; },
                        Ok(_) => load_err("Invalid port", trimed_line, line_num),
                        Err(e) => load_err(&e.to_string(), trimed_line, line_num),
                    }
                },
                "bind" if argc == 2 => { config.bind_addr = argv[1].to_string(); },
                "save" if argc == 2 => {
                    match argv[1].parse::<u64>() {
                        Ok(s) if s >= 1 => { config.save_secs = s; },
                        Ok(_) => load_err("Invalid save interval", trimed_line, line_num),
                        Err(e) => load_err(&e.to_string(), trimed_line, line_num),
                    }
                },
                "dbfilename" if argc == 2 => { config.db_filename = argv[1].to_string(); },
                "dir" if argc == 2 => {
                    if let Err(e) = set_current_dir(argv[1]) {
                        log(LogLevel::Warning, &format!("Can't chdir to '{}': {}", argv[1], e));
                        exit(1);
                    }
                },
                "loglevel" if argc == 2 => {
                    match &argv[1].to_ascii_lowercase()[..] {
                        "debug" => { config.verbosity = LogLevel::Debug; },
                        "verbose" => { config.verbosity = LogLevel::Verbose; },
                        "notice" => { config.verbosity = LogLevel::Notice; },
                        "warning" => { config.verbosity = LogLevel::Warning; },
                        _ => {
                            let err = "Invalid log level. Must be one of debug, verbose, notice or warning";
                            load_err(err, trimed_line, line_num);
                        },
                    }
                },
                "logfile" if argc == 2 => {
                    match &argv[1].to_ascii_lowercase()[..] {
                        "stdout" => { config.log_file = String::new(); },
                        filename if !filename.is_empty() => {
                            // Test if we are able to open the file. The server
                            // will not be able to abort just for this problem
                            // later...
                            match OpenOptions::new().append(true).create(true).open(argv[1]) {
                                Ok(_) => { config.log_file = argv[1].to_string(); },
                                Err(e) => {
                                    let err = format!("Can't open the log file: {}", e);
                                    load_err(&err, trimed_line, line_num);
                                },
                            }
                        },
                        _ => load_err("Invalid log file", trimed_line, line_num),
                    }
                },
                "daemonize" if argc == 2 => {
                    match &argv[1].to_ascii_lowercase()[..] {
                        "no" => {},
                        "yes" => load_err("daemonize is not supported", trimed_line, line_num),
                        _ => load_err("argument must be 'yes' or 'no'", trimed_line, line_num),
                    }
                },
                _ => load_err("Bad directive or wrong number of arguments", trimed_line, line_num),
            }
        }
        config
    }
}

/// Accept loop: one OS thread per connection, all of them sharing the one
/// engine. Runs until the process exits.
pub fn serve(config: &Config, db: Arc<Database>) -> io::Result<()> {
    let addr = if config.bind_addr.is_empty() {
        format!("0.0.0.0:{}", config.port)
    } else {
        format!("{}:{}", config.bind_addr, config.port)
    };
    let listener = TcpListener::bind(&addr)?;
    log(LogLevel::Notice, &format!("The server is now ready to accept connections on port {}", config.port));

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let db = db.clone();
                thread::spawn(move || serve_client(&db, stream));
            },
            Err(e) => {
                log(LogLevel::Verbose, &format!("Accepting client connection: {}", e));
            },
        }
    }
    Ok(())
}

/// One request buffer per read, one reply per request. A connection error
/// only ends this client, never the server.
fn serve_client(db: &Database, mut stream: TcpStream) {
    let mut buf = [0u8; IO_BUF_LEN];
    loop {
        let nread = match stream.read(&mut buf) {
            Ok(0) => {
                log(LogLevel::Verbose, "Client closed connection");
                return;
            },
            Ok(n) => n,
            Err(e) => {
                log(LogLevel::Verbose, &format!("Reading from client: {}", e));
                return;
            },
        };
        let reply = process_command(db, &buf[..nread]);
        if let Err(e) = stream.write_all(reply.as_bytes()) {
            log(LogLevel::Verbose, &format!("Writing to client: {}", e));
            return;
        }
    }
}

/// Background cron: ticks once per second, sweeps keys past their deadline,
/// and dumps the snapshot on the configured cadence. Disk trouble is logged
/// and never touches the in-memory state.
pub fn cron_loop(config: &Config, db: &Database) {
    let save_secs = config.save_secs.max(1);
    let mut loops: u64 = 0;
    loop {
        thread::sleep(Duration::from_secs(1));
        loops += 1;

        let purged = db.purge_expired();
        if purged > 0 {
            log(LogLevel::Verbose, &format!("{} keys expired", purged));
        }

        // Show some info about a non-empty database
        if loops % 30 == 0 {
            let (keys, volatile) = db.counts();
            if keys != 0 || volatile != 0 {
                log(LogLevel::Verbose, &format!("DB: {} keys ({} volatile)", keys, volatile));
            }
        }

        if loops % save_secs == 0 {
            match db.dump(&config.db_filename) {
                Ok(_) => log(LogLevel::Debug, &format!("DB saved on disk: {}", config.db_filename)),
                Err(e) => log(LogLevel::Warning, &format!("Error saving DB on disk: {}", e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use tempfile::tempdir;
    use super::*;

    #[test]
    fn default_config_test() {
        let config = Config::default();
        assert_eq!(config.port, 6379);
        assert!(config.bind_addr.is_empty());
        assert_eq!(config.save_secs, 5);
        assert_eq!(config.db_filename, "dump.myrdb");
        assert_eq!(config.verbosity, LogLevel::Notice);
    }

    #[test]
    fn config_file_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memds.conf");
        fs::write(
            &path,
            "# a comment\n\
             \n\
             port 7777\n\
             bind 127.0.0.1\n\
             save 60\n\
             dbfilename other.myrdb\n\
             loglevel debug\n\
             daemonize no\n",
        )
        .unwrap();

        let config = Config::load(path.to_str().unwrap());
        assert_eq!(config.port, 7777);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.save_secs, 60);
        assert_eq!(config.db_filename, "other.myrdb");
        assert_eq!(config.verbosity, LogLevel::Debug);
    }

    #[test]
    fn client_session_test() {
        let db = Arc::new(Database::new());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_db = db.clone();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve_client(&server_db, stream);
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let mut buf = [0u8; 64];

        client.write_all(b"*1\r\n$4\r\nPING\r\n").unwrap();
        let n = client.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"+PONG\r\n");

        client.write_all(b"SET foo bar\n").unwrap();
        let n = client.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"+OK\r\n");

        drop(client);
        handle.join().unwrap();

        // the engine outlives the connection
        assert_eq!(db.get("foo"), Ok(Some("bar".to_string())));
    }
}
