use anyhow::Result;
use tracing::info;

use cesso_uci::UciEngine;

fn main() -> Result<()> {
    // UCI talks to the GUI over stdout, so all logging goes to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    info!("cesso starting");
    UciEngine::new().run()?;
    Ok(())
}
