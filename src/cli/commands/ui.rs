//! skillshare ui - Serve the JSON API for the web dashboard

use clap::Args;
use tracing::warn;

use crate::app::AppContext;
use crate::error::{Result, SkillshareError};
use crate::server::{self, AppState, bind_addr};

#[derive(Args, Debug)]
pub struct UiArgs {
    /// Interface to bind (default from config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default from config)
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Do not open a browser
    #[arg(long)]
    pub no_open: bool,
}

pub fn run(ctx: &mut AppContext, args: &UiArgs) -> Result<()> {
    let host = args.host.clone().unwrap_or_else(|| ctx.config.server.host.clone());
    let port = args.port.unwrap_or(ctx.config.server.port);
    let addr = bind_addr(&host, port);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| SkillshareError::Config(format!("failed to build tokio runtime: {err}")))?;

    if !ctx.robot_mode {
        println!("skillshare API on http://{addr}/api (ctrl-c to stop)");
    }
    if !args.no_open {
        let url = format!("http://{addr}/api/overview");
        if let Err(err) = open::that(&url) {
            warn!(%url, error = %err, "could not open browser");
        }
    }

    let state = AppState::new(ctx.clone());
    runtime.block_on(server::serve(state, addr))
}
