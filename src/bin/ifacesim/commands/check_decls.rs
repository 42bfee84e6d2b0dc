//! `ifacesim check-decls` command

use anyhow::Result;

use ifacesim::ops::{check_decls, CheckDeclsParams, CheckDeclsReport};
use ifacesim::GlobalContext;

use crate::cli::{GlobalOptions, OpArgs};
use crate::commands::{parse_params, Session};

pub fn execute(gctx: &GlobalContext, options: &GlobalOptions, args: OpArgs) -> Result<()> {
    let session = Session::new(gctx, options);

    let result = parse_params::<CheckDeclsParams>(&args.params)
        .and_then(|params| check_decls(&params, &session.loader));

    session.emit(result, CheckDeclsReport::render_human)
}
