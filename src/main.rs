use ton_codec::cli::Cli;
use ton_codec::utils::init_logger;

fn main() -> anyhow::Result<()> {
    init_logger()?;
    let cli = Cli::parse_args();
    cli.execute()?;
    Ok(())
}
