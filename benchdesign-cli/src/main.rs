fn main() -> anyhow::Result<()> {
    benchdesign_cli::run()
}
