use std::sync::Arc;
use tokio::sync::RwLock;

/// Server configuration. `dir` and `dbfilename` exist for client
/// compatibility (CONFIG GET/SET); nothing is persisted behind them.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub debug: bool,
    pub dir: String,
    pub dbfilename: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "0.0.0.0".to_string(),
            port: 6379,
            debug: false,
            dir: "/tmp".to_string(),
            dbfilename: "dump.rdb".to_string(),
        }
    }
}

impl Config {
    pub fn from_args(args: &[String]) -> Self {
        let mut config = Config::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    if i + 1 < args.len() {
                        config.bind = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--port" => {
                    if i + 1 < args.len() {
                        if let Ok(p) = args[i + 1].parse() {
                            config.port = p;
                        }
                        i += 1;
                    }
                }
                "--dir" => {
                    if i + 1 < args.len() {
                        config.dir = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--dbfilename" => {
                    if i + 1 < args.len() {
                        config.dbfilename = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--debug" => {
                    config.debug = true;
                }
                _ => {}
            }
            i += 1;
        }
        config
    }

    /// The parameters CONFIG GET can report.
    pub fn parameters(&self) -> [(&'static str, String); 2] {
        [
            ("dir", self.dir.clone()),
            ("dbfilename", self.dbfilename.clone()),
        ]
    }

    /// Set a known parameter. Returns false for anything unrecognized.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> bool {
        match name {
            "dir" => {
                self.dir = value.to_string();
                true
            }
            "dbfilename" => {
                self.dbfilename = value.to_string();
                true
            }
            _ => false,
        }
    }
}

pub type SharedConfig = Arc<RwLock<Config>>;
