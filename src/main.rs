use anyhow::Result;

fn main() -> Result<()> {
    panelseq::cli::run()
}
