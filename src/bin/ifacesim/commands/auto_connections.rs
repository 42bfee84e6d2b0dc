//! `ifacesim auto-connections` command

use anyhow::Result;

use ifacesim::ops::{render_human, simulate_auto_connect, AutoConnectParams};
use ifacesim::GlobalContext;

use crate::cli::{GlobalOptions, OpArgs};
use crate::commands::{parse_params, Session};

pub fn execute(gctx: &GlobalContext, options: &GlobalOptions, args: OpArgs) -> Result<()> {
    let session = Session::new(gctx, options);

    let result = parse_params::<AutoConnectParams>(&args.params).and_then(|params| {
        let base = session.base()?;
        simulate_auto_connect(&params, &session.loader, &base, &session.settings)
    });

    session.emit(result, render_human)
}
