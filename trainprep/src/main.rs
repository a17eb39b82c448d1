fn main() -> anyhow::Result<()> {
    trainprep::run()
}
