use std::path::PathBuf;

use clap::Parser;

use crate::rng::Rng;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Avalon match server")]
pub struct ServerConfig {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    /// Client bundle; `index.html` inside it is served for unknown paths.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
    /// Messages buffered per connection before it is dropped.
    #[arg(long, env = "OUTBOUND_QUEUE", default_value_t = 256)]
    pub outbound_queue: usize,
    #[arg(long, env = "GAME_SEED")]
    pub seed: Option<u64>,
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn match_rng(&self) -> Rng {
        self.seed.map(Rng::new).unwrap_or_else(Rng::from_os)
    }

    /// The configured bundle if it has an `index.html`, else the usual build outputs.
    pub fn resolve_static_dir(&self) -> Option<PathBuf> {
        if let Some(path) = self.static_dir.as_ref() {
            if path.join("index.html").is_file() {
                return Some(path.clone());
            }
        }
        [PathBuf::from("dist/client"), PathBuf::from("../../dist/client")]
            .into_iter()
            .find(|path| path.join("index.html").is_file())
    }
}
