fn main() -> anyhow::Result<()> {
    hbspreview::cli::run()
}
