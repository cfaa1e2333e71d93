use clap::CommandFactory;

use crate::Cli;

fn completion_script(shell: clap_complete::Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut out = Vec::new();
    clap_complete::generate(shell, &mut cmd, "ghdata", &mut out);
    out
}

pub(crate) fn handle_completions(shell: clap_complete::Shell) -> std::io::Result<()> {
    use std::io::Write;
    std::io::stdout().write_all(&completion_script(shell))
}
