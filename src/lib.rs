use crate::domain::session::arrangement_session::ArrangementSession;
use crate::error::Result;
use crate::loader::parser::load_config;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Opens an arrangement session against the portal described by the JSON
/// config at `file_path`.
pub fn connect_from_config_file(file_path: &str) -> Result<ArrangementSession> {
    logger::init();
    log::info!("Logger initialized. Loading arrangement config.");

    let config = load_config(file_path)?;
    let session = ArrangementSession::connect(config)?;
    log::info!("Arrangement session ready for {}.", session.get_config().base_url());

    Ok(session)
}
